//! Per-operator draft session driving the save-time and background-refresh
//! conflict flows for a match list.

use thiserror::Error;
use uuid::Uuid;

use crate::state::{
    conflict::{ConflictError, ConflictReport, detect, merge_server_changes},
    matches::{MatchRow, Snapshot, TournamentScope},
};

/// Save flow phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavePhase {
    /// Editing; no save in flight.
    Idle,
    /// Saving would overwrite concurrent edits; waiting for the operator.
    ConfirmOverwrite {
        /// Snapshot version the report was computed against.
        against_version: u64,
        /// Findings shown to the operator.
        report: ConflictReport,
    },
    /// Rows handed to storage, awaiting the commit result.
    Saving,
}

/// Upstream changes awaiting a merge/reject decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMerge {
    /// Server version carrying the changes.
    pub version: u64,
    /// What changed upstream.
    pub report: ConflictReport,
}

/// Result of asking the session to save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveDecision {
    /// Write these rows; the session is now [`SavePhase::Saving`].
    Proceed(Vec<MatchRow>),
    /// Concurrent edits would be overwritten; the session is now
    /// [`SavePhase::ConfirmOverwrite`].
    NeedsConfirmation(ConflictReport),
}

/// What happened to a server snapshot delivered to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Not newer than the last snapshot seen.
    Stale,
    /// Recorded as latest; nothing to tell the operator.
    Absorbed,
    /// The operator has already dismissed this version.
    Suppressed,
    /// Upstream changes need a decision.
    PendingMerge(PendingMerge),
}

/// Errors raised by draft session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    /// The rows failed the list preconditions.
    #[error("invalid match list: {0}")]
    InvalidRows(#[from] ConflictError),
    /// A commit is running.
    #[error("a save is already in flight")]
    SaveInFlight,
    /// Nothing to confirm or cancel.
    #[error("no overwrite confirmation is pending")]
    NoConfirmationPending,
    /// A commit result arrived without a save in flight.
    #[error("no save is in flight")]
    NotSaving,
    /// Nothing to merge or reject.
    #[error("no upstream changes are pending")]
    NoPendingMerge,
}

/// Locally held edit of a tournament's match list.
#[derive(Debug, Clone)]
pub struct DraftSession {
    id: Uuid,
    scope: TournamentScope,
    draft: Vec<MatchRow>,
    baseline: Snapshot,
    latest: Snapshot,
    save_phase: SavePhase,
    pending_merge: Option<PendingMerge>,
    dismissed_version: Option<u64>,
}

impl DraftSession {
    /// Start editing from `snapshot`, which becomes both baseline and latest.
    pub fn open(scope: TournamentScope, snapshot: Snapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope,
            draft: snapshot.matches.clone(),
            baseline: snapshot.clone(),
            latest: snapshot,
            save_phase: SavePhase::Idle,
            pending_merge: None,
            dismissed_version: None,
        }
    }

    /// Draft identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Tournament being edited.
    pub fn scope(&self) -> &TournamentScope {
        &self.scope
    }

    /// Rows as edited by the operator.
    pub fn draft(&self) -> &[MatchRow] {
        &self.draft
    }

    /// Snapshot the draft was last synchronised with.
    pub fn baseline(&self) -> &Snapshot {
        &self.baseline
    }

    /// Newest snapshot the session has seen.
    pub fn latest(&self) -> &Snapshot {
        &self.latest
    }

    /// Where the save flow stands.
    pub fn save_phase(&self) -> &SavePhase {
        &self.save_phase
    }

    /// Upstream changes awaiting a decision.
    pub fn pending_merge(&self) -> Option<&PendingMerge> {
        self.pending_merge.as_ref()
    }

    /// Replace the edited rows. Editing while a confirmation is pending
    /// withdraws it.
    pub fn replace_draft(&mut self, rows: Vec<MatchRow>) -> Result<(), DraftError> {
        if self.save_phase == SavePhase::Saving {
            return Err(DraftError::SaveInFlight);
        }
        detect(&rows, &[], &[])?;
        self.draft = rows;
        self.save_phase = SavePhase::Idle;
        Ok(())
    }

    /// Compare the draft against the latest known snapshot and decide whether
    /// it can be written without confirmation.
    pub fn begin_save(&mut self) -> Result<SaveDecision, DraftError> {
        if self.save_phase == SavePhase::Saving {
            return Err(DraftError::SaveInFlight);
        }
        let report = self.current_report()?;
        if report.requires_confirmation() {
            self.save_phase = SavePhase::ConfirmOverwrite {
                against_version: self.latest.version,
                report: report.clone(),
            };
            return Ok(SaveDecision::NeedsConfirmation(report));
        }
        self.save_phase = SavePhase::Saving;
        Ok(SaveDecision::Proceed(self.rows_to_write(&report)))
    }

    /// Accept overwriting concurrent edits.
    ///
    /// When a newer snapshot arrived since the confirmation was requested the
    /// operator has to look at the fresh report first.
    pub fn confirm_overwrite(&mut self) -> Result<SaveDecision, DraftError> {
        let against_version = match &self.save_phase {
            SavePhase::ConfirmOverwrite {
                against_version, ..
            } => *against_version,
            _ => return Err(DraftError::NoConfirmationPending),
        };

        let report = self.current_report()?;
        if against_version != self.latest.version && report.requires_confirmation() {
            self.save_phase = SavePhase::ConfirmOverwrite {
                against_version: self.latest.version,
                report: report.clone(),
            };
            return Ok(SaveDecision::NeedsConfirmation(report));
        }

        self.save_phase = SavePhase::Saving;
        Ok(SaveDecision::Proceed(self.rows_to_write(&report)))
    }

    /// Back out of a pending confirmation, keeping the draft.
    pub fn cancel_overwrite(&mut self) -> Result<(), DraftError> {
        if !matches!(self.save_phase, SavePhase::ConfirmOverwrite { .. }) {
            return Err(DraftError::NoConfirmationPending);
        }
        self.save_phase = SavePhase::Idle;
        Ok(())
    }

    /// Storage accepted the rows; the committed snapshot becomes the new
    /// baseline and draft.
    pub fn complete_save(&mut self, committed: Snapshot) -> Result<(), DraftError> {
        if self.save_phase != SavePhase::Saving {
            return Err(DraftError::NotSaving);
        }
        self.draft = committed.matches.clone();
        self.baseline = committed.clone();
        self.latest = committed;
        self.save_phase = SavePhase::Idle;
        self.pending_merge = None;
        self.dismissed_version = None;
        Ok(())
    }

    /// Storage rejected the rows; the draft is left untouched for a retry.
    pub fn fail_save(&mut self) {
        if self.save_phase == SavePhase::Saving {
            self.save_phase = SavePhase::Idle;
        }
    }

    /// Record a snapshot pushed by the server and classify its effect.
    pub fn on_server_snapshot(&mut self, snapshot: Snapshot) -> Result<SnapshotOutcome, DraftError> {
        if snapshot.version <= self.latest.version {
            return Ok(SnapshotOutcome::Stale);
        }
        self.latest = snapshot;

        if self.save_phase == SavePhase::Saving {
            return Ok(SnapshotOutcome::Absorbed);
        }

        let report = self.current_report()?;
        if report.is_empty() {
            self.pending_merge = None;
            return Ok(SnapshotOutcome::Absorbed);
        }
        if self.dismissed_version == Some(self.latest.version) {
            return Ok(SnapshotOutcome::Suppressed);
        }

        let pending = PendingMerge {
            version: self.latest.version,
            report,
        };
        self.pending_merge = Some(pending.clone());
        Ok(SnapshotOutcome::PendingMerge(pending))
    }

    /// Adopt upstream changes into the draft and re-baseline onto the latest
    /// snapshot. Returns the merged rows.
    pub fn merge(&mut self) -> Result<&[MatchRow], DraftError> {
        if self.pending_merge.is_none() {
            return Err(DraftError::NoPendingMerge);
        }
        let report = self.current_report()?;
        self.draft = merge_server_changes(&self.draft, &self.latest.matches, &report);
        self.baseline = self.latest.clone();
        self.pending_merge = None;
        Ok(&self.draft)
    }

    /// Dismiss upstream changes and keep the draft; the dismissed version will
    /// not be reported again.
    pub fn reject(&mut self) -> Result<(), DraftError> {
        let pending = self.pending_merge.take().ok_or(DraftError::NoPendingMerge)?;
        self.dismissed_version = Some(pending.version);
        Ok(())
    }

    fn current_report(&self) -> Result<ConflictReport, DraftError> {
        Ok(detect(
            &self.draft,
            &self.baseline.matches,
            &self.latest.matches,
        )?)
    }

    /// Draft rows with server-only changes silently adopted.
    fn rows_to_write(&self, report: &ConflictReport) -> Vec<MatchRow> {
        let adopt_only = ConflictReport {
            details: report.details.clone(),
            added: Vec::new(),
            deleted: Vec::new(),
        };
        merge_server_changes(&self.draft, &self.latest.matches, &adopt_only)
    }
}
