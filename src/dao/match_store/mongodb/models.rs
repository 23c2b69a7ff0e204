use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::{dao::models::MatchEntity, state::matches::TournamentScope};

/// Stored shape of a match; `_id` is left to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    org_id: String,
    tournament_id: String,
    match_id: String,
    court_id: Option<String>,
    round_id: Option<String>,
    player_a_team_id: Option<String>,
    player_a_id: Option<String>,
    player_b_team_id: Option<String>,
    player_b_id: Option<String>,
    sort_order: i64,
    updated_at: DateTime,
}

impl MongoMatchDocument {
    /// Identifier of the stored match.
    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    /// Filter addressing this document by its natural key.
    pub fn key(&self) -> Document {
        doc! {
            "org_id": self.org_id.as_str(),
            "tournament_id": self.tournament_id.as_str(),
            "match_id": self.match_id.as_str(),
        }
    }
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            org_id: value.org_id,
            tournament_id: value.tournament_id,
            match_id: value.match_id,
            court_id: value.court_id,
            round_id: value.round_id,
            player_a_team_id: value.player_a_team_id,
            player_a_id: value.player_a_id,
            player_b_team_id: value.player_b_team_id,
            player_b_id: value.player_b_id,
            sort_order: value.sort_order,
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoMatchDocument> for MatchEntity {
    fn from(value: MongoMatchDocument) -> Self {
        Self {
            match_id: value.match_id,
            org_id: value.org_id,
            tournament_id: value.tournament_id,
            court_id: value.court_id,
            round_id: value.round_id,
            player_a_team_id: value.player_a_team_id,
            player_a_id: value.player_a_id,
            player_b_team_id: value.player_b_team_id,
            player_b_id: value.player_b_id,
            sort_order: value.sort_order,
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Filter selecting every match of `scope`.
pub fn scope_filter(scope: &TournamentScope) -> Document {
    doc! {
        "org_id": scope.org_id.as_str(),
        "tournament_id": scope.tournament_id.as_str(),
    }
}
