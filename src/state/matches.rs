//! Match list domain types shared by the conflict detector, draft sessions and storage.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::validation::validate_identifier;

/// A scheduled match as edited on the match-setup screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchRow {
    /// Identifier, unique within a match list.
    #[validate(custom(function = "validate_identifier"))]
    pub id: String,
    /// Court the match is scheduled on.
    #[serde(default)]
    pub court_id: Option<String>,
    /// Round of the match.
    #[serde(default)]
    pub round_id: Option<String>,
    /// Team of the first competitor.
    #[serde(default)]
    pub player_a_team_id: Option<String>,
    /// First competitor.
    #[serde(default)]
    pub player_a_id: Option<String>,
    /// Team of the second competitor.
    #[serde(default)]
    pub player_b_team_id: Option<String>,
    /// Second competitor.
    #[serde(default)]
    pub player_b_id: Option<String>,
    /// Display position of the match on its court.
    #[serde(default)]
    pub sort_order: i64,
}

impl MatchRow {
    /// Build an empty row with only its identifier set.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            court_id: None,
            round_id: None,
            player_a_team_id: None,
            player_a_id: None,
            player_b_team_id: None,
            player_b_id: None,
            sort_order: 0,
        }
    }
}

/// Comparable (non-identifier) fields of a [`MatchRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum MatchField {
    /// `courtId`.
    CourtId,
    /// `roundId`.
    RoundId,
    /// `playerATeamId`.
    PlayerATeamId,
    /// `playerAId`.
    PlayerAId,
    /// `playerBTeamId`.
    PlayerBTeamId,
    /// `playerBId`.
    PlayerBId,
    /// `sortOrder`.
    SortOrder,
}

impl MatchField {
    /// Every tracked field, in display order.
    pub const ALL: [MatchField; 7] = [
        MatchField::CourtId,
        MatchField::RoundId,
        MatchField::PlayerATeamId,
        MatchField::PlayerAId,
        MatchField::PlayerBTeamId,
        MatchField::PlayerBId,
        MatchField::SortOrder,
    ];

    /// Read this field from `row`.
    pub fn value(self, row: &MatchRow) -> FieldValue {
        match self {
            MatchField::CourtId => FieldValue::Ref(row.court_id.clone()),
            MatchField::RoundId => FieldValue::Ref(row.round_id.clone()),
            MatchField::PlayerATeamId => FieldValue::Ref(row.player_a_team_id.clone()),
            MatchField::PlayerAId => FieldValue::Ref(row.player_a_id.clone()),
            MatchField::PlayerBTeamId => FieldValue::Ref(row.player_b_team_id.clone()),
            MatchField::PlayerBId => FieldValue::Ref(row.player_b_id.clone()),
            MatchField::SortOrder => FieldValue::Order(row.sort_order),
        }
    }

    /// Overwrite this field of `target` with the value held by `source`.
    pub fn copy(self, source: &MatchRow, target: &mut MatchRow) {
        match self {
            MatchField::CourtId => target.court_id = source.court_id.clone(),
            MatchField::RoundId => target.round_id = source.round_id.clone(),
            MatchField::PlayerATeamId => target.player_a_team_id = source.player_a_team_id.clone(),
            MatchField::PlayerAId => target.player_a_id = source.player_a_id.clone(),
            MatchField::PlayerBTeamId => target.player_b_team_id = source.player_b_team_id.clone(),
            MatchField::PlayerBId => target.player_b_id = source.player_b_id.clone(),
            MatchField::SortOrder => target.sort_order = source.sort_order,
        }
    }
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchField::CourtId => "courtId",
            MatchField::RoundId => "roundId",
            MatchField::PlayerATeamId => "playerATeamId",
            MatchField::PlayerAId => "playerAId",
            MatchField::PlayerBTeamId => "playerBTeamId",
            MatchField::PlayerBId => "playerBId",
            MatchField::SortOrder => "sortOrder",
        };
        f.write_str(name)
    }
}

/// Value of a single tracked field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum FieldValue {
    /// Reference to a court, round, team or player (absent while unassigned).
    Ref(Option<String>),
    /// Sort position.
    Order(i64),
}

/// Organisation/tournament pair every match list belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TournamentScope {
    /// Organisation owning the tournament.
    pub org_id: String,
    /// Tournament within the organisation.
    pub tournament_id: String,
}

impl TournamentScope {
    /// Scope of `tournament_id` in `org_id`.
    pub fn new(org_id: impl Into<String>, tournament_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            tournament_id: tournament_id.into(),
        }
    }
}

impl fmt::Display for TournamentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org_id, self.tournament_id)
    }
}

/// Match list as stored server-side at a given version.
///
/// Versions increase monotonically per [`TournamentScope`] with every committed
/// save, so a receiver can tell a stale delivery from a newer one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Commit counter of the tournament; 0 before the first save.
    pub version: u64,
    /// Rows in display order.
    pub matches: Vec<MatchRow>,
}

impl Snapshot {
    /// Snapshot of `matches` at `version`.
    pub fn new(version: u64, matches: Vec<MatchRow>) -> Self {
        Self { version, matches }
    }
}
