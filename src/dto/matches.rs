use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::validation::validate_identifier,
    state::matches::{MatchRow, Snapshot, TournamentScope},
};

/// `{orgId}/{tournamentId}` path segments naming a tournament.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Path)]
pub struct ScopePath {
    /// Organisation owning the tournament.
    #[validate(custom(function = "validate_identifier"))]
    pub org_id: String,
    /// Tournament within the organisation.
    #[validate(custom(function = "validate_identifier"))]
    pub tournament_id: String,
}

impl From<ScopePath> for TournamentScope {
    fn from(path: ScopePath) -> Self {
        TournamentScope::new(path.org_id, path.tournament_id)
    }
}

/// Latest match list of a tournament.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchListResponse {
    /// Organisation owning the tournament.
    pub org_id: String,
    /// Tournament the list belongs to.
    pub tournament_id: String,
    /// Bumped on every committed save of this tournament.
    pub version: u64,
    /// Rows in display order.
    pub matches: Vec<MatchRow>,
}

impl MatchListResponse {
    /// Response for `snapshot` of `scope`.
    pub fn new(scope: TournamentScope, snapshot: Snapshot) -> Self {
        Self {
            org_id: scope.org_id,
            tournament_id: scope.tournament_id,
            version: snapshot.version,
            matches: snapshot.matches,
        }
    }
}

/// Broadcast on the operator stream after a save committed a new list.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchesSnapshotEvent {
    /// Organisation owning the tournament.
    pub org_id: String,
    /// Tournament whose list changed.
    pub tournament_id: String,
    /// Version just committed.
    pub version: u64,
    /// Number of matches in the list.
    pub count: usize,
}
