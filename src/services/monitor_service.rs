use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::{
    dto::monitor::{
        AdjustRequest, MAX_ADJUST_STEP, PresentationStatus, ResetTimerRequest, SetPlayersRequest,
    },
    error::ServiceError,
    state::{
        SharedState,
        monitor::{MonitorPlayer, MonitorState, ViewMode},
    },
};

/// Current monitor snapshot.
pub async fn current(state: &SharedState) -> MonitorState {
    state.monitor().snapshot().await
}

/// Apply `mutate` and fan the resulting snapshot out to every display.
async fn mutate_and_dispatch<F>(state: &SharedState, mutate: F) -> MonitorState
where
    F: FnOnce(&mut MonitorState),
{
    let next = state.monitor().update(mutate).await;
    state.dispatcher().dispatch(&next);
    next
}

/// Show a new pairing; counters restart from zero.
pub async fn set_players(state: &SharedState, request: SetPlayersRequest) -> MonitorState {
    let SetPlayersRequest {
        match_id,
        player_a,
        player_b,
    } = request;
    info!(match_id = ?match_id, "monitor players set");
    mutate_and_dispatch(state, move |monitor| {
        monitor.match_id = match_id;
        monitor.player_a = MonitorPlayer {
            display_name: player_a.display_name,
            team_name: player_a.team_name,
            ..MonitorPlayer::default()
        };
        monitor.player_b = MonitorPlayer {
            display_name: player_b.display_name,
            team_name: player_b.team_name,
            ..MonitorPlayer::default()
        };
    })
    .await
}

/// Apply a score delta and broadcast.
pub async fn adjust_score(
    state: &SharedState,
    request: AdjustRequest,
) -> Result<MonitorState, ServiceError> {
    ensure_step(request.delta)?;
    Ok(mutate_and_dispatch(state, |monitor| monitor.adjust_score(request.side, request.delta)).await)
}

/// Apply a penalty delta and broadcast.
pub async fn adjust_hansoku(
    state: &SharedState,
    request: AdjustRequest,
) -> Result<MonitorState, ServiceError> {
    ensure_step(request.delta)?;
    let max = state.config().monitor().max_hansoku();
    Ok(mutate_and_dispatch(state, |monitor| {
        monitor.adjust_hansoku(request.side, request.delta, max)
    })
    .await)
}

/// Start the clock and broadcast.
pub async fn start_timer(state: &SharedState) -> MonitorState {
    mutate_and_dispatch(state, MonitorState::start_timer).await
}

/// Pause the clock and broadcast.
pub async fn stop_timer(state: &SharedState) -> MonitorState {
    mutate_and_dispatch(state, MonitorState::stop_timer).await
}

/// Reset the clock and broadcast.
pub async fn reset_timer(state: &SharedState, request: ResetTimerRequest) -> MonitorState {
    mutate_and_dispatch(state, |monitor| {
        monitor.reset_timer(request.duration_ms, request.mode)
    })
    .await
}

/// Toggle visibility and broadcast.
pub async fn set_visibility(state: &SharedState, visible: bool) -> MonitorState {
    mutate_and_dispatch(state, |monitor| monitor.visible = visible).await
}

/// Switch layout and broadcast.
pub async fn set_view_mode(state: &SharedState, view_mode: ViewMode) -> MonitorState {
    mutate_and_dispatch(state, |monitor| monitor.view_mode = view_mode).await
}

/// Restore the default monitor state.
pub async fn reset(state: &SharedState) -> MonitorState {
    let next = state.monitor().reset().await;
    state.dispatcher().dispatch(&next);
    info!(revision = next.revision, "monitor reset");
    next
}

/// Whether a display is attached and how fresh it is.
pub async fn presentation_status(state: &SharedState) -> PresentationStatus {
    state.presentation().status(Instant::now()).await
}

/// Advance a running clock on every tick, dispatching each change. Runs until
/// the task is aborted.
pub async fn run_timer_ticks(state: SharedState) {
    let mut ticker = interval(state.config().monitor().tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        ticker.tick().await;
        let now = Instant::now();
        let elapsed_ms = now.duration_since(last).as_millis() as u64;
        last = now;

        if let Some(next) = state.monitor().advance_timer(elapsed_ms).await {
            if !next.timer.running {
                debug!(revision = next.revision, "monitor countdown reached zero");
            }
            state.dispatcher().dispatch(&next);
        }
    }
}

fn ensure_step(delta: i32) -> Result<(), ServiceError> {
    if delta == 0 || delta.abs() > MAX_ADJUST_STEP {
        return Err(ServiceError::InvalidInput(format!(
            "delta must be between -{MAX_ADJUST_STEP} and {MAX_ADJUST_STEP} and not zero"
        )));
    }
    Ok(())
}
