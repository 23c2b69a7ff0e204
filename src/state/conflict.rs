//! Three-way comparison of a match-list draft against its baseline and the
//! latest server snapshot.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::matches::{FieldValue, MatchField, MatchRow};

/// Which input list a precondition failure was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// The operator's edited list.
    Draft,
    /// The snapshot the draft started from.
    Baseline,
    /// The latest server snapshot.
    Server,
}

/// Malformed input rejected by [`detect`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    /// A row without identifier cannot be matched across lists.
    #[error("{list:?} list contains a match without id")]
    MissingId { list: ListKind },
    /// Two rows in the same list share an identifier.
    #[error("{list:?} list contains duplicate match id `{id}`")]
    DuplicateId { list: ListKind, id: String },
}

/// A field changed to different values by the draft and by another device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectConflict {
    /// Value in the draft.
    pub draft_value: FieldValue,
    /// Value another device committed.
    pub server_value: FieldValue,
}

/// A field only another device changed since the baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerChange {
    /// Value at the baseline.
    pub initial_value: FieldValue,
    /// Value another device committed.
    pub server_value: FieldValue,
}

/// Per-match findings. Only produced for matches with at least one finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDetail {
    /// Match the findings are about.
    pub match_id: String,
    /// Fields both sides changed to different values.
    #[schema(value_type = Object)]
    pub conflicts: IndexMap<MatchField, DirectConflict>,
    /// Fields only another device changed.
    #[schema(value_type = Object)]
    pub server_changes: IndexMap<MatchField, ServerChange>,
}

/// Outcome of [`detect`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    /// Per-match findings in draft order.
    pub details: Vec<ConflictDetail>,
    /// Rows another device created.
    pub added: Vec<MatchRow>,
    /// Rows another device removed.
    pub deleted: Vec<MatchRow>,
}

impl ConflictReport {
    /// No conflicts, server changes, additions or deletions.
    pub fn is_empty(&self) -> bool {
        self.details.is_empty() && self.added.is_empty() && self.deleted.is_empty()
    }

    /// Whether any field was changed differently on both sides.
    pub fn has_direct_conflicts(&self) -> bool {
        self.details.iter().any(|detail| !detail.conflicts.is_empty())
    }

    /// Whether saving the draft as-is would overwrite another device's work.
    ///
    /// Server-only changes are adopted silently and never require confirmation.
    pub fn requires_confirmation(&self) -> bool {
        self.has_direct_conflicts() || !self.added.is_empty() || !self.deleted.is_empty()
    }

    /// Findings for a single match.
    pub fn detail(&self, match_id: &str) -> Option<&ConflictDetail> {
        self.details.iter().find(|detail| detail.match_id == match_id)
    }
}

fn index(rows: &[MatchRow], list: ListKind) -> Result<IndexMap<&str, &MatchRow>, ConflictError> {
    let mut map = IndexMap::with_capacity(rows.len());
    for row in rows {
        if row.id.is_empty() {
            return Err(ConflictError::MissingId { list });
        }
        if map.insert(row.id.as_str(), row).is_some() {
            return Err(ConflictError::DuplicateId {
                list,
                id: row.id.clone(),
            });
        }
    }
    Ok(map)
}

/// Classify every difference between `draft`, `baseline` and `server`.
///
/// Field comparisons only happen between rows sharing an id. A row present in
/// draft and server but missing from the baseline (both sides created the same
/// id) has no initial value, so any difference is a direct conflict.
pub fn detect(
    draft: &[MatchRow],
    baseline: &[MatchRow],
    server: &[MatchRow],
) -> Result<ConflictReport, ConflictError> {
    let draft_map = index(draft, ListKind::Draft)?;
    let baseline_map = index(baseline, ListKind::Baseline)?;
    let server_map = index(server, ListKind::Server)?;

    let mut report = ConflictReport::default();

    for (id, draft_row) in &draft_map {
        let Some(server_row) = server_map.get(id) else {
            if baseline_map.contains_key(id) {
                report.deleted.push((*draft_row).clone());
            }
            continue;
        };
        let baseline_row = baseline_map.get(id);

        let mut conflicts = IndexMap::new();
        let mut server_changes = IndexMap::new();
        for field in MatchField::ALL {
            let draft_value = field.value(draft_row);
            let server_value = field.value(server_row);

            match baseline_row.map(|row| field.value(row)) {
                Some(initial_value) => {
                    let user_changed = draft_value != initial_value;
                    let server_changed = server_value != initial_value;
                    if user_changed && server_changed && draft_value != server_value {
                        conflicts.insert(
                            field,
                            DirectConflict {
                                draft_value,
                                server_value,
                            },
                        );
                    } else if !user_changed && server_changed {
                        server_changes.insert(
                            field,
                            ServerChange {
                                initial_value,
                                server_value,
                            },
                        );
                    }
                }
                None if draft_value != server_value => {
                    conflicts.insert(
                        field,
                        DirectConflict {
                            draft_value,
                            server_value,
                        },
                    );
                }
                None => {}
            }
        }

        if !conflicts.is_empty() || !server_changes.is_empty() {
            report.details.push(ConflictDetail {
                match_id: (*id).to_owned(),
                conflicts,
                server_changes,
            });
        }
    }

    for (id, server_row) in &server_map {
        if !draft_map.contains_key(id) && !baseline_map.contains_key(id) {
            report.added.push((*server_row).clone());
        }
    }

    Ok(report)
}

/// Fold the safe parts of `report` into `draft`.
///
/// Server-only changes are copied from `server`, additions are appended and
/// deletions dropped. Direct-conflict fields keep the draft value.
pub fn merge_server_changes(
    draft: &[MatchRow],
    server: &[MatchRow],
    report: &ConflictReport,
) -> Vec<MatchRow> {
    let deleted: IndexSet<&str> = report.deleted.iter().map(|row| row.id.as_str()).collect();

    let mut merged: Vec<MatchRow> = draft
        .iter()
        .filter(|row| !deleted.contains(row.id.as_str()))
        .cloned()
        .collect();

    for row in merged.iter_mut() {
        let Some(detail) = report.detail(&row.id) else {
            continue;
        };
        let Some(server_row) = server.iter().find(|candidate| candidate.id == row.id) else {
            continue;
        };
        for field in detail.server_changes.keys() {
            field.copy(server_row, row);
        }
    }

    merged.extend(report.added.iter().cloned());
    merged
}
