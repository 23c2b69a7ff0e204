use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::monitor::{HeartbeatPayload, InboundEnvelope, MonitorEnvelope},
    error::ServiceError,
    services::sse_events,
    state::{SharedState, dispatch::PresentationHandle},
};

/// Check the display's token and claim the presentation slot for it.
pub async fn open_presentation(
    state: &SharedState,
    token: &str,
) -> Result<PresentationHandle, ServiceError> {
    let claims = state.tokens().validate(token)?.claims;
    let match_id = claims.match_id.clone();
    let handle = state
        .presentation()
        .attach(claims, Instant::now())
        .await
        .map_err(|_| {
            ServiceError::InvalidState("a presentation display is already connected".into())
        })?;
    info!(session = %handle.id, match_id = %match_id, "presentation display attached");
    Ok(handle)
}

/// Release a slot whose upgrade never completed.
pub async fn abandon_presentation(state: &SharedState, id: Uuid) {
    if state.presentation().detach(id).await {
        warn!(session = %id, "presentation upgrade failed; slot released");
    }
}

/// Drive an attached presentation display until it disconnects or is replaced.
pub async fn handle_presentation_socket(
    state: SharedState,
    socket: WebSocket,
    handle: PresentationHandle,
) {
    let PresentationHandle { id, mut frames } = handle;
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps frames flowing while inbound messages are awaited.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    publish_status(&state).await;

    let snapshot = state.monitor().snapshot().await;
    if send_envelope(&outbound_tx, &MonitorEnvelope::Data(&snapshot)).is_err() {
        close_session(&state, id, writer_task, outbound_tx).await;
        return;
    }

    let mut heartbeat = interval(state.config().monitor().heartbeat_interval());
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    heartbeat.tick().await;
    let mut stale = false;
    let mut sent_revision = snapshot.revision;

    loop {
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = frames.borrow_and_update().clone();
                if let Some(frame) = frame.filter(|frame| frame.revision() > sent_revision) {
                    sent_revision = frame.revision();
                    if outbound_tx.send(Message::Text(frame.json().into())).is_err() {
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                let now = Instant::now();
                let Some(seq) = state.presentation().ping(id, now).await else {
                    info!(session = %id, "presentation session superseded");
                    break;
                };
                if send_envelope(&outbound_tx, &MonitorEnvelope::Ping(HeartbeatPayload { seq })).is_err() {
                    break;
                }

                let status = state.presentation().status(now).await;
                if status.stale != stale {
                    stale = status.stale;
                    warn!(session = %id, "presentation heartbeat timed out");
                    sse_events::broadcast_presentation_status(&state, &status);
                }
            }
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<InboundEnvelope>(&text) {
                    Ok(InboundEnvelope::Pong(HeartbeatPayload { seq })) => {
                        if !state.presentation().ack(id, seq, Instant::now()).await {
                            debug!(session = %id, seq, "ignoring unknown heartbeat sequence");
                        } else if stale {
                            stale = false;
                            info!(session = %id, "presentation heartbeat recovered");
                            publish_status(&state).await;
                        }
                    }
                    Err(err) => warn!(session = %id, error = %err, "unrecognised presentation message"),
                },
                Some(Ok(Message::Ping(payload))) => {
                    if outbound_tx.send(Message::Pong(payload)).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(session = %id, error = %err, "presentation receive error");
                    break;
                }
            }
        }
    }

    close_session(&state, id, writer_task, outbound_tx).await;
}

async fn close_session(
    state: &SharedState,
    id: Uuid,
    writer_task: JoinHandle<()>,
    outbound_tx: mpsc::UnboundedSender<Message>,
) {
    if state.presentation().detach(id).await {
        info!(session = %id, "presentation display detached");
        publish_status(state).await;
    }
    drop(outbound_tx);
    let _ = writer_task.await;
}

async fn publish_status(state: &SharedState) {
    let status = state.presentation().status(Instant::now()).await;
    sse_events::broadcast_presentation_status(state, &status);
}

fn send_envelope<T: Serialize>(
    outbound_tx: &mpsc::UnboundedSender<Message>,
    envelope: &T,
) -> Result<(), ()> {
    let json = match serde_json::to_string(envelope) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to serialize presentation envelope");
            return Ok(());
        }
    };
    outbound_tx.send(Message::Text(json.into())).map_err(|_| ())
}
