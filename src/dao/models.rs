use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::state::matches::{MatchRow, TournamentScope};

/// Persisted match, keyed by its domain id plus the owning tournament.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Domain identifier, unique within the tournament.
    pub match_id: String,
    /// Owning organisation.
    pub org_id: String,
    /// Owning tournament.
    pub tournament_id: String,
    /// Court the match is scheduled on.
    pub court_id: Option<String>,
    /// Round of the match.
    pub round_id: Option<String>,
    /// Team of the first competitor.
    pub player_a_team_id: Option<String>,
    /// First competitor.
    pub player_a_id: Option<String>,
    /// Team of the second competitor.
    pub player_b_team_id: Option<String>,
    /// Second competitor.
    pub player_b_id: Option<String>,
    /// Display position inside the tournament's list.
    pub sort_order: i64,
    /// When the row was last written.
    pub updated_at: SystemTime,
}

impl MatchEntity {
    /// Attach `row` to `scope`, stamped with `updated_at`.
    pub fn from_row(scope: &TournamentScope, row: MatchRow, updated_at: SystemTime) -> Self {
        Self {
            match_id: row.id,
            org_id: scope.org_id.clone(),
            tournament_id: scope.tournament_id.clone(),
            court_id: row.court_id,
            round_id: row.round_id,
            player_a_team_id: row.player_a_team_id,
            player_a_id: row.player_a_id,
            player_b_team_id: row.player_b_team_id,
            player_b_id: row.player_b_id,
            sort_order: row.sort_order,
            updated_at,
        }
    }

    /// Tournament the match belongs to.
    pub fn scope(&self) -> TournamentScope {
        TournamentScope::new(self.org_id.clone(), self.tournament_id.clone())
    }
}

impl From<MatchEntity> for MatchRow {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.match_id,
            court_id: value.court_id,
            round_id: value.round_id,
            player_a_team_id: value.player_a_team_id,
            player_a_id: value.player_a_id,
            player_b_team_id: value.player_b_team_id,
            player_b_id: value.player_b_id,
            sort_order: value.sort_order,
        }
    }
}

/// Order rows for display: by `sort_order`, then by id for a stable result.
pub fn sort_for_display(rows: &mut [MatchRow]) {
    rows.sort_by(|left, right| {
        left.sort_order
            .cmp(&right.sort_order)
            .then_with(|| left.id.cmp(&right.id))
    });
}
