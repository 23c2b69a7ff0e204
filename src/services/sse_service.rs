use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::{
        monitor::MonitorEnvelope,
        sse::{Handshake, ServerEvent},
    },
    error::ServiceError,
    services::{draft_service, sse_events},
    state::{SharedState, dispatch::MONITOR_EVENT},
};

/// Identifies the target SSE stream for connection bookkeeping logs.
#[derive(Clone, Copy, Debug)]
pub enum StreamKind {
    /// Operator dashboard stream.
    Operator,
    /// Monitor frame stream.
    Monitor,
    /// Draft session events.
    Draft(Uuid),
}

impl StreamKind {
    fn label(self) -> &'static str {
        match self {
            StreamKind::Operator => "operator",
            StreamKind::Monitor => "monitor",
            StreamKind::Draft(_) => "draft",
        }
    }
}

/// Subscribe to tournament-wide operator notifications.
pub fn subscribe_operator(state: &SharedState) -> (broadcast::Receiver<ServerEvent>, Vec<ServerEvent>) {
    let receiver = state.operator_sse().subscribe();
    (receiver, vec![handshake(state, StreamKind::Operator)])
}

/// Subscribe to monitor frames; the current snapshot is replayed first.
pub async fn subscribe_monitor(
    state: &SharedState,
) -> (broadcast::Receiver<ServerEvent>, Vec<ServerEvent>) {
    let receiver = state.monitor_sse().subscribe();
    let mut initial = vec![handshake(state, StreamKind::Monitor)];
    let snapshot = state.monitor().snapshot().await;
    if let Ok(frame) = ServerEvent::json(
        Some(MONITOR_EVENT.to_string()),
        &MonitorEnvelope::Data(&snapshot),
    ) {
        initial.push(frame);
    }
    (receiver, initial)
}

/// Subscribe to a draft's notifications; a pending merge is replayed first.
pub async fn subscribe_draft(
    state: &SharedState,
    id: Uuid,
) -> Result<(broadcast::Receiver<ServerEvent>, Vec<ServerEvent>), ServiceError> {
    let handle = draft_service::require_draft(state, id)?;
    let receiver = handle.events().subscribe();
    let mut initial = vec![handshake(state, StreamKind::Draft(id))];
    let pending = handle.session().lock().await.pending_merge().cloned();
    if let Some(event) = pending.and_then(|pending| sse_events::pending_merge_event(id, &pending)) {
        initial.push(event);
    }
    Ok((receiver, initial))
}

fn handshake(state: &SharedState, kind: StreamKind) -> ServerEvent {
    let payload = Handshake {
        stream: kind.label().to_string(),
        message: format!("{} stream connected", kind.label()),
        degraded: state.is_degraded(),
    };
    ServerEvent::json(Some("handshake".to_string()), &payload)
        .unwrap_or_else(|_| ServerEvent::new(Some("handshake".to_string()), String::new()))
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    initial: Vec<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: replays the initial events, then reads from broadcast
    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive.
                            continue;
                        }
                    }
                }
            }
        }

        match kind {
            StreamKind::Draft(id) => tracing::info!(draft = %id, "Draft SSE stream disconnected"),
            other => tracing::info!(stream = other.label(), "SSE stream disconnected"),
        }
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
