use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        draft::PendingMergeEvent, matches::MatchesSnapshotEvent, monitor::PresentationStatus,
        sse::{ServerEvent, SystemStatus},
    },
    state::{
        DraftHandle, SharedState, SseHub,
        draft::PendingMerge,
        matches::{Snapshot, TournamentScope},
    },
};

const EVENT_MATCHES_SNAPSHOT: &str = "matches.snapshot";
const EVENT_PRESENTATION_STATUS: &str = "presentation.status";
const EVENT_SYSTEM_STATUS: &str = "system.status";
const EVENT_DRAFT_PENDING_MERGE: &str = "draft.pending_merge";

/// Tell operators a tournament's list moved to a new version.
pub fn broadcast_matches_snapshot(state: &SharedState, scope: &TournamentScope, snapshot: &Snapshot) {
    let payload = MatchesSnapshotEvent {
        org_id: scope.org_id.clone(),
        tournament_id: scope.tournament_id.clone(),
        version: snapshot.version,
        count: snapshot.matches.len(),
    };
    send_event(state.operator_sse(), EVENT_MATCHES_SNAPSHOT, &payload);
}

/// Broadcast the presentation connection indicator to operators.
pub fn broadcast_presentation_status(state: &SharedState, status: &PresentationStatus) {
    send_event(state.operator_sse(), EVENT_PRESENTATION_STATUS, status);
}

/// Broadcast a degraded mode change to operators.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_event(
        state.operator_sse(),
        EVENT_SYSTEM_STATUS,
        &SystemStatus { degraded },
    );
}

/// Notify the owner of a draft that upstream changes need a decision.
pub fn send_pending_merge(handle: &DraftHandle, pending: &PendingMerge) {
    if let Some(event) = pending_merge_event(handle.id(), pending) {
        handle.events().broadcast(event);
    }
}

/// `draft.pending_merge` event for `pending`.
pub fn pending_merge_event(draft_id: Uuid, pending: &PendingMerge) -> Option<ServerEvent> {
    let payload = PendingMergeEvent {
        draft_id,
        version: pending.version,
        report: pending.report.clone(),
    };
    encode(EVENT_DRAFT_PENDING_MERGE, &payload)
}

fn send_event<T: Serialize>(hub: &SseHub, event: &str, payload: &T) {
    if let Some(event) = encode(event, payload) {
        hub.broadcast(event);
    }
}

fn encode<T: Serialize>(event: &str, payload: &T) -> Option<ServerEvent> {
    ServerEvent::json(Some(event.to_string()), payload)
        .inspect_err(|err| warn!(event, error = %err, "failed to serialize SSE payload"))
        .ok()
}
