use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// SSE-specific sub-state carved out from [`AppState`](super::AppState).
pub struct SseState {
    operator: SseHub,
    monitor: SseHub,
}

impl SseState {
    /// Build the SSE sub-tree with per-stream channel capacities.
    pub fn new(operator_capacity: usize, monitor_capacity: usize) -> Self {
        Self {
            operator: SseHub::new(operator_capacity),
            monitor: SseHub::new(monitor_capacity),
        }
    }

    /// Hub carrying tournament-wide operator notifications.
    pub fn operator(&self) -> &SseHub {
        &self.operator
    }

    /// Hub carrying monitor frames to same-origin display windows.
    pub fn monitor(&self) -> &SseHub {
        &self.monitor
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
#[derive(Clone)]
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Send an event and report whether at least one subscriber was listening.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}
