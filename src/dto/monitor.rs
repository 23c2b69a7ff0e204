use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::validation::validate_identifier,
    state::monitor::{MonitorState, Side, TimerMode, ViewMode},
};

/// Names shown for one side of the match.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInput {
    /// Competitor name.
    #[validate(length(max = 64))]
    pub display_name: String,
    /// Team or club; may be empty.
    #[serde(default)]
    #[validate(length(max = 64))]
    pub team_name: String,
}

/// Put a new pairing on the monitor; scores and penalties restart at zero.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetPlayersRequest {
    /// Match being shown, when it is a scheduled one.
    #[serde(default)]
    #[validate(custom(function = "validate_identifier"))]
    pub match_id: Option<String>,
    /// First competitor.
    #[validate(nested)]
    pub player_a: PlayerInput,
    /// Second competitor.
    #[validate(nested)]
    pub player_b: PlayerInput,
}

/// Largest change a single adjustment may apply.
pub const MAX_ADJUST_STEP: i32 = 10;

/// Signed change applied to a score or penalty counter.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRequest {
    /// Competitor to adjust.
    pub side: Side,
    /// Between `-MAX_ADJUST_STEP` and `MAX_ADJUST_STEP`.
    pub delta: i32,
}

/// Rewind the clock, optionally switching its duration or mode.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetTimerRequest {
    /// New clock duration; keeps the current one when unset.
    #[serde(default)]
    #[validate(range(max = 3_600_000))]
    pub duration_ms: Option<u64>,
    /// New clock mode; keeps the current one when unset.
    #[serde(default)]
    pub mode: Option<TimerMode>,
}

/// Show or hide the monitor contents.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VisibilityRequest {
    /// Whether the audience sees the monitor.
    pub visible: bool,
}

/// Switch the monitor layout.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewModeRequest {
    /// Layout to render.
    pub view_mode: ViewMode,
}

/// Sequence number carried by heartbeat envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HeartbeatPayload {
    /// Ping sequence number being sent or acknowledged.
    pub seq: u64,
}

/// `{type, payload}` envelope sent to monitor displays.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MonitorEnvelope<'a> {
    /// Full monitor state.
    Data(&'a MonitorState),
    /// Heartbeat the display must answer.
    Ping(HeartbeatPayload),
}

/// Envelope a presentation display may send back.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum InboundEnvelope {
    /// Answer to a ping.
    Pong(HeartbeatPayload),
}

/// Connection indicator of the external presentation display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresentationStatus {
    /// Whether a display holds the session.
    pub connected: bool,
    /// A heartbeat went unanswered for longer than the timeout.
    pub stale: bool,
    /// Session of the attached display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// Match the display's token was issued for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    /// Milliseconds since the last answered ping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ack_ms_ago: Option<u64>,
}

impl PresentationStatus {
    /// Status when no display is attached.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            stale: false,
            session_id: None,
            match_id: None,
            last_ack_ms_ago: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelopes_use_type_and_payload() {
        let ping = serde_json::to_value(MonitorEnvelope::Ping(HeartbeatPayload { seq: 3 })).unwrap();
        assert_eq!(ping, serde_json::json!({"type": "ping", "payload": {"seq": 3}}));

        let pong: InboundEnvelope =
            serde_json::from_str(r#"{"type":"pong","payload":{"seq":3}}"#).unwrap();
        assert!(matches!(pong, InboundEnvelope::Pong(HeartbeatPayload { seq: 3 })));
    }

    #[test]
    fn data_envelope_carries_the_camel_case_snapshot() {
        let state = MonitorState::new(120_000);
        let value = serde_json::to_value(MonitorEnvelope::Data(&state)).unwrap();
        assert_eq!(value["type"], "data");
        assert_eq!(value["payload"]["timer"]["remainingMs"], 120_000);
        assert_eq!(value["payload"]["viewMode"], "head_to_head");
    }
}
