//! Liveness bookkeeping for the presentation session heartbeat.

use std::time::Duration;

use tokio::time::Instant;

/// Liveness of a presentation connection as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Every ping older than the timeout has been acknowledged.
    Live,
    /// A ping has gone unacknowledged for longer than the timeout.
    Stale,
}

/// Tracks pings sent to a display and the acknowledgements coming back.
#[derive(Debug, Clone)]
pub struct HeartbeatTracker {
    timeout: Duration,
    last_seq: u64,
    oldest_unacked: Option<Instant>,
    last_ack: Option<Instant>,
}

impl HeartbeatTracker {
    /// Tracker declaring a ping stale after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_seq: 0,
            oldest_unacked: None,
            last_ack: None,
        }
    }

    /// Register an outgoing ping and return its sequence number.
    pub fn ping(&mut self, now: Instant) -> u64 {
        self.last_seq += 1;
        self.oldest_unacked.get_or_insert(now);
        self.last_seq
    }

    /// Register an acknowledgement. Acknowledging any ping already sent proves
    /// the display is alive; sequence numbers never sent are ignored.
    pub fn ack(&mut self, seq: u64, now: Instant) -> bool {
        if seq == 0 || seq > self.last_seq {
            return false;
        }
        self.oldest_unacked = None;
        self.last_ack = Some(now);
        true
    }

    /// Liveness at `now`.
    pub fn liveness(&self, now: Instant) -> Liveness {
        match self.oldest_unacked {
            Some(sent) if now.saturating_duration_since(sent) >= self.timeout => Liveness::Stale,
            _ => Liveness::Live,
        }
    }

    /// When the display last answered.
    pub fn last_ack(&self) -> Option<Instant> {
        self.last_ack
    }
}
