//! Fan-out of monitor snapshots to every display surface.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, watch},
    time::Instant,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::{
        monitor::{MonitorEnvelope, PresentationStatus},
        sse::ServerEvent,
        token::MonitorClaims,
    },
    state::{
        heartbeat::{HeartbeatTracker, Liveness},
        monitor::MonitorState,
        sse::SseHub,
    },
};

/// SSE event name carrying monitor frames.
pub const MONITOR_EVENT: &str = "monitor";

/// Serialized `{type, payload}` envelope shared by every sink, tagged with the
/// revision it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    revision: u64,
    json: Arc<str>,
}

impl Frame {
    /// Revision of the monitor state inside the frame.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Wire form of the frame.
    pub fn json(&self) -> &str {
        &self.json
    }
}

/// Whether a sink handed the frame to a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to at least one receiver.
    Sent,
    /// Nobody is listening on this sink right now.
    Skipped,
    /// The sink already holds a frame at least as new.
    Outdated,
}

/// A delivery target for monitor frames.
///
/// Delivery is fire-and-forget: a sink never queues or retries, and a newer
/// frame supersedes any frame it has not delivered yet.
pub trait MonitorSink: Send + Sync {
    /// Label used in dispatch logs.
    fn name(&self) -> &'static str;
    /// Hand `frame` to whoever listens on this sink.
    fn deliver(&self, frame: &Frame) -> Delivery;
}

/// Serializes each monitor snapshot once and hands it to every sink.
pub struct MonitorDispatcher {
    sinks: Vec<Arc<dyn MonitorSink>>,
}

impl MonitorDispatcher {
    /// Dispatcher fanning out to `sinks` in order.
    pub fn new(sinks: Vec<Arc<dyn MonitorSink>>) -> Self {
        Self { sinks }
    }

    /// Deliver `state` to every sink and report what each did with it.
    pub fn dispatch(&self, state: &MonitorState) -> Vec<(&'static str, Delivery)> {
        let frame = match serde_json::to_string(&MonitorEnvelope::Data(state)) {
            Ok(json) => Frame {
                revision: state.revision,
                json: json.into(),
            },
            Err(err) => {
                warn!(revision = state.revision, error = %err, "failed to serialize monitor frame");
                return Vec::new();
            }
        };

        self.sinks
            .iter()
            .map(|sink| {
                let delivery = sink.deliver(&frame);
                debug!(sink = sink.name(), revision = state.revision, ?delivery, "monitor frame dispatched");
                (sink.name(), delivery)
            })
            .collect()
    }
}

/// Same-origin windows listening on the monitor SSE stream.
pub struct ChannelSink {
    hub: SseHub,
}

impl ChannelSink {
    /// Sink publishing on `hub`.
    pub fn new(hub: SseHub) -> Self {
        Self { hub }
    }
}

impl MonitorSink for ChannelSink {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn deliver(&self, frame: &Frame) -> Delivery {
        let event = ServerEvent::new(Some(MONITOR_EVENT.to_string()), frame.json().to_string());
        if self.hub.send(event) {
            Delivery::Sent
        } else {
            Delivery::Skipped
        }
    }
}

/// The external screen currently attached.
struct ActivePresentation {
    id: Uuid,
    claims: MonitorClaims,
    heartbeat: HeartbeatTracker,
}

/// Returned when a live presentation session already owns the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationBusy;

/// Receiving end handed to a presentation socket.
pub struct PresentationHandle {
    /// Session identifier.
    pub id: Uuid,
    /// Always holds the newest frame; intermediate frames are dropped.
    pub frames: watch::Receiver<Option<Frame>>,
}

/// External display attached over a presentation session.
pub struct PresentationSink {
    frames: watch::Sender<Option<Frame>>,
    session: Mutex<Option<ActivePresentation>>,
    heartbeat_timeout: Duration,
}

impl PresentationSink {
    /// Sink whose sessions go stale after `heartbeat_timeout` without a pong.
    pub fn new(heartbeat_timeout: Duration) -> Self {
        let (frames, _rx) = watch::channel(None);
        Self {
            frames,
            session: Mutex::new(None),
            heartbeat_timeout,
        }
    }

    /// Attach a display. A stale session is replaced; a live one is kept.
    pub async fn attach(
        &self,
        claims: MonitorClaims,
        now: Instant,
    ) -> Result<PresentationHandle, PresentationBusy> {
        let mut guard = self.session.lock().await;
        if let Some(active) = guard.as_ref() {
            if active.heartbeat.liveness(now) == Liveness::Live {
                return Err(PresentationBusy);
            }
            warn!(session = %active.id, "replacing stale presentation session");
        }

        let id = Uuid::new_v4();
        guard.replace(ActivePresentation {
            id,
            claims,
            heartbeat: HeartbeatTracker::new(self.heartbeat_timeout),
        });
        Ok(PresentationHandle {
            id,
            frames: self.frames.subscribe(),
        })
    }

    /// Drop the session if it is still the active one.
    pub async fn detach(&self, id: Uuid) -> bool {
        let mut guard = self.session.lock().await;
        if guard.as_ref().is_some_and(|active| active.id == id) {
            guard.take();
            true
        } else {
            false
        }
    }

    /// Whether `id` still owns the screen.
    pub async fn is_active(&self, id: Uuid) -> bool {
        let guard = self.session.lock().await;
        guard.as_ref().is_some_and(|active| active.id == id)
    }

    /// Register an outgoing ping for session `id`.
    pub async fn ping(&self, id: Uuid, now: Instant) -> Option<u64> {
        let mut guard = self.session.lock().await;
        guard
            .as_mut()
            .filter(|active| active.id == id)
            .map(|active| active.heartbeat.ping(now))
    }

    /// Register a pong for session `id`.
    pub async fn ack(&self, id: Uuid, seq: u64, now: Instant) -> bool {
        let mut guard = self.session.lock().await;
        guard
            .as_mut()
            .filter(|active| active.id == id)
            .is_some_and(|active| active.heartbeat.ack(seq, now))
    }

    /// Connection indicator shown to the operator.
    pub async fn status(&self, now: Instant) -> PresentationStatus {
        let guard = self.session.lock().await;
        match guard.as_ref() {
            None => PresentationStatus::disconnected(),
            Some(active) => PresentationStatus {
                connected: true,
                stale: active.heartbeat.liveness(now) == Liveness::Stale,
                session_id: Some(active.id),
                match_id: Some(active.claims.match_id.clone()),
                last_ack_ms_ago: active
                    .heartbeat
                    .last_ack()
                    .map(|at| now.saturating_duration_since(at).as_millis() as u64),
            },
        }
    }
}

impl MonitorSink for PresentationSink {
    fn name(&self) -> &'static str {
        "presentation"
    }

    /// Frames may arrive out of revision order when writers race; an older one
    /// never replaces a newer one.
    fn deliver(&self, frame: &Frame) -> Delivery {
        if self.frames.receiver_count() == 0 {
            return Delivery::Skipped;
        }
        let replaced = self.frames.send_if_modified(|held| {
            if held
                .as_ref()
                .is_some_and(|held| held.revision >= frame.revision)
            {
                return false;
            }
            held.replace(frame.clone());
            true
        });
        if replaced {
            Delivery::Sent
        } else {
            Delivery::Outdated
        }
    }
}
