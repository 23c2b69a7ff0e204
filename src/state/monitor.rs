//! Live state mirrored to the audience-facing monitor.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

/// One competitor as shown on the monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorPlayer {
    /// Competitor name.
    pub display_name: String,
    /// Team or club; may be empty.
    pub team_name: String,
    /// Points scored.
    pub score: u32,
    /// Penalty count.
    pub hansoku: u32,
}

/// Which competitor an operator action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// First competitor.
    A,
    /// Second competitor.
    B,
}

/// How the match clock runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    /// Counts down from the configured duration and stops at zero.
    #[default]
    Countdown,
    /// Counts elapsed time upwards without limit.
    Stopwatch,
}

/// Match clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorTimer {
    /// Remaining time for a countdown, elapsed time for a stopwatch.
    pub remaining_ms: u64,
    /// Value restored by a reset.
    pub duration_ms: u64,
    /// Whether the clock is ticking.
    pub running: bool,
    /// Countdown or stopwatch.
    pub mode: TimerMode,
}

impl MonitorTimer {
    fn new(duration_ms: u64, mode: TimerMode) -> Self {
        Self {
            remaining_ms: match mode {
                TimerMode::Countdown => duration_ms,
                TimerMode::Stopwatch => 0,
            },
            duration_ms,
            running: false,
            mode,
        }
    }

    /// Move the clock forward by `elapsed_ms`. Returns whether anything changed.
    fn advance(&mut self, elapsed_ms: u64) -> bool {
        if !self.running || elapsed_ms == 0 {
            return false;
        }
        match self.mode {
            TimerMode::Countdown => {
                self.remaining_ms = self.remaining_ms.saturating_sub(elapsed_ms);
                if self.remaining_ms == 0 {
                    self.running = false;
                }
            }
            TimerMode::Stopwatch => {
                self.remaining_ms = self.remaining_ms.saturating_add(elapsed_ms);
            }
        }
        true
    }
}

/// Layout the monitor renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Two competitors face to face.
    #[default]
    HeadToHead,
    /// Standings of a pool.
    GroupResult,
    /// Score of a team encounter.
    TeamResult,
}

/// Snapshot of everything the monitor displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorState {
    /// Bumped on every mutation.
    pub revision: u64,
    /// Scheduled match being shown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    /// First competitor.
    pub player_a: MonitorPlayer,
    /// Second competitor.
    pub player_b: MonitorPlayer,
    /// Match clock.
    pub timer: MonitorTimer,
    /// Whether the audience sees the contents.
    pub visible: bool,
    /// Layout being rendered.
    pub view_mode: ViewMode,
}

impl MonitorState {
    /// Blank monitor with a stopped countdown of `duration_ms`.
    pub fn new(duration_ms: u64) -> Self {
        Self {
            revision: 0,
            match_id: None,
            player_a: MonitorPlayer::default(),
            player_b: MonitorPlayer::default(),
            timer: MonitorTimer::new(duration_ms, TimerMode::Countdown),
            visible: false,
            view_mode: ViewMode::default(),
        }
    }

    /// Competitor on `side`.
    pub fn player_mut(&mut self, side: Side) -> &mut MonitorPlayer {
        match side {
            Side::A => &mut self.player_a,
            Side::B => &mut self.player_b,
        }
    }

    /// Apply a signed score delta, never going below zero.
    pub fn adjust_score(&mut self, side: Side, delta: i32) {
        let player = self.player_mut(side);
        player.score = apply_delta(player.score, delta, u32::MAX);
    }

    /// Apply a signed penalty delta within `0..=max`.
    pub fn adjust_hansoku(&mut self, side: Side, delta: i32, max: u32) {
        let player = self.player_mut(side);
        player.hansoku = apply_delta(player.hansoku, delta, max);
    }

    /// Start the clock unless a countdown already reached zero.
    pub fn start_timer(&mut self) {
        if self.timer.mode == TimerMode::Countdown && self.timer.remaining_ms == 0 {
            return;
        }
        self.timer.running = true;
    }

    /// Pause the clock.
    pub fn stop_timer(&mut self) {
        self.timer.running = false;
    }

    /// Stop the clock and rewind it, optionally switching duration or mode.
    pub fn reset_timer(&mut self, duration_ms: Option<u64>, mode: Option<TimerMode>) {
        let duration_ms = duration_ms.unwrap_or(self.timer.duration_ms);
        let mode = mode.unwrap_or(self.timer.mode);
        self.timer = MonitorTimer::new(duration_ms, mode);
    }
}

fn apply_delta(current: u32, delta: i32, max: u32) -> u32 {
    let next = i64::from(current) + i64::from(delta);
    next.clamp(0, i64::from(max)) as u32
}

/// Owner of the single live [`MonitorState`].
pub struct MonitorStore {
    state: RwLock<MonitorState>,
    default_duration_ms: u64,
}

impl MonitorStore {
    /// Store holding a blank monitor.
    pub fn new(default_duration_ms: u64) -> Self {
        Self {
            state: RwLock::new(MonitorState::new(default_duration_ms)),
            default_duration_ms,
        }
    }

    /// Clone the current state.
    pub async fn snapshot(&self) -> MonitorState {
        self.state.read().await.clone()
    }

    /// Mutate the state, bump its revision and return the result.
    pub async fn update<F>(&self, mutate: F) -> MonitorState
    where
        F: FnOnce(&mut MonitorState),
    {
        let mut guard = self.state.write().await;
        mutate(&mut *guard);
        guard.revision += 1;
        guard.clone()
    }

    /// Restore the initial state, keeping the revision counter monotonic.
    pub async fn reset(&self) -> MonitorState {
        let default_duration_ms = self.default_duration_ms;
        self.update(|state| {
            let revision = state.revision;
            *state = MonitorState::new(default_duration_ms);
            state.revision = revision;
        })
        .await
    }

    /// Advance a running clock. Returns the new state only when it changed.
    pub async fn advance_timer(&self, elapsed_ms: u64) -> Option<MonitorState> {
        let mut guard = self.state.write().await;
        if !guard.timer.advance(elapsed_ms) {
            return None;
        }
        guard.revision += 1;
        Some(guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_never_goes_negative() {
        let mut state = MonitorState::new(180_000);
        state.adjust_score(Side::A, 1);
        state.adjust_score(Side::A, -3);
        assert_eq!(state.player_a.score, 0);
        state.adjust_score(Side::B, 2);
        assert_eq!(state.player_b.score, 2);
    }

    #[test]
    fn hansoku_is_capped() {
        let mut state = MonitorState::new(180_000);
        state.adjust_hansoku(Side::B, 5, 2);
        assert_eq!(state.player_b.hansoku, 2);
        state.adjust_hansoku(Side::B, -1, 2);
        assert_eq!(state.player_b.hansoku, 1);
    }

    #[test]
    fn countdown_stops_at_zero() {
        let mut state = MonitorState::new(1_500);
        state.start_timer();
        assert!(state.timer.advance(1_000));
        assert_eq!(state.timer.remaining_ms, 500);
        assert!(state.timer.advance(1_000));
        assert_eq!(state.timer.remaining_ms, 0);
        assert!(!state.timer.running);
        assert!(!state.timer.advance(1_000));

        state.start_timer();
        assert!(!state.timer.running);
    }

    #[test]
    fn stopwatch_counts_up() {
        let mut state = MonitorState::new(0);
        state.reset_timer(None, Some(TimerMode::Stopwatch));
        state.start_timer();
        state.timer.advance(700);
        state.timer.advance(300);
        assert_eq!(state.timer.remaining_ms, 1_000);
        assert!(state.timer.running);
    }

    #[test]
    fn reset_restores_duration_and_stops() {
        let mut state = MonitorState::new(120_000);
        state.start_timer();
        state.timer.advance(10_000);
        state.reset_timer(Some(60_000), None);
        assert_eq!(state.timer.remaining_ms, 60_000);
        assert_eq!(state.timer.duration_ms, 60_000);
        assert!(!state.timer.running);
    }

    #[tokio::test]
    async fn store_bumps_revision_on_every_mutation() {
        let store = MonitorStore::new(180_000);
        let first = store.update(|state| state.visible = true).await;
        let second = store
            .update(|state| state.view_mode = ViewMode::TeamResult)
            .await;
        assert_eq!(first.revision, 1);
        assert_eq!(second.revision, 2);

        let reset = store.reset().await;
        assert_eq!(reset.revision, 3);
        assert!(!reset.visible);
    }

    #[tokio::test]
    async fn idle_timer_does_not_produce_updates() {
        let store = MonitorStore::new(180_000);
        assert!(store.advance_timer(1_000).await.is_none());

        store.update(MonitorState::start_timer).await;
        let next = store.advance_timer(1_000).await.unwrap();
        assert_eq!(next.timer.remaining_ms, 179_000);
    }
}
