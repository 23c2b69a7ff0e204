use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::state::{
    conflict::ConflictReport,
    draft::{DraftSession, PendingMerge, SavePhase},
    matches::MatchRow,
};

/// Save flow phase as reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SavePhaseView {
    /// Editing.
    Idle,
    /// Waiting for the operator to confirm an overwrite.
    ConfirmOverwrite,
    /// Commit in flight.
    Saving,
}

/// Upstream changes waiting for a merge or reject decision.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingMergeView {
    /// Server version carrying the changes.
    pub version: u64,
    /// What changed upstream.
    pub report: ConflictReport,
}

impl From<&PendingMerge> for PendingMergeView {
    fn from(value: &PendingMerge) -> Self {
        Self {
            version: value.version,
            report: value.report.clone(),
        }
    }
}

/// Full view of a draft session.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DraftResponse {
    /// Draft identifier.
    pub id: Uuid,
    /// Organisation owning the tournament.
    pub org_id: String,
    /// Tournament being edited.
    pub tournament_id: String,
    /// Edited rows.
    pub matches: Vec<MatchRow>,
    /// Version the draft was last synchronised with.
    pub baseline_version: u64,
    /// Newest server version the session has seen.
    pub latest_version: u64,
    /// Where the save flow stands.
    pub save_phase: SavePhaseView,
    /// Report awaiting an overwrite confirmation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<ConflictReport>,
    /// Upstream changes awaiting a decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_merge: Option<PendingMergeView>,
}

impl From<&DraftSession> for DraftResponse {
    fn from(session: &DraftSession) -> Self {
        let (save_phase, confirmation) = match session.save_phase() {
            SavePhase::Idle => (SavePhaseView::Idle, None),
            SavePhase::ConfirmOverwrite { report, .. } => {
                (SavePhaseView::ConfirmOverwrite, Some(report.clone()))
            }
            SavePhase::Saving => (SavePhaseView::Saving, None),
        };

        Self {
            id: session.id(),
            org_id: session.scope().org_id.clone(),
            tournament_id: session.scope().tournament_id.clone(),
            matches: session.draft().to_vec(),
            baseline_version: session.baseline().version,
            latest_version: session.latest().version,
            save_phase,
            confirmation,
            pending_merge: session.pending_merge().map(Into::into),
        }
    }
}

/// Replace the rows of a draft.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDraftRequest {
    /// Complete list of edited rows.
    #[validate(nested)]
    pub matches: Vec<MatchRow>,
}

/// Ask to save a draft.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveDraftRequest {
    /// Confirm overwriting concurrent edits reported by a previous attempt.
    #[serde(default)]
    pub force: bool,
}

/// Outcome of a save request.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SaveDraftResponse {
    /// Rows were committed under `version`.
    Saved { version: u64, matches: Vec<MatchRow> },
    /// Concurrent edits would be overwritten; resend with `force`.
    ConfirmOverwrite { report: ConflictReport },
}

/// Sent on a draft's stream when upstream changes need a decision.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingMergeEvent {
    /// Draft the notification is for.
    pub draft_id: Uuid,
    /// Server version carrying the changes.
    pub version: u64,
    /// What changed upstream.
    pub report: ConflictReport,
}
