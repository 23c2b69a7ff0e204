use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};
use validator::Validate;

use crate::{
    dto::{
        monitor::{
            AdjustRequest, PresentationStatus, ResetTimerRequest, SetPlayersRequest,
            ViewModeRequest, VisibilityRequest,
        },
        token::{IssueTokenResponse, MonitorClaims},
    },
    error::{AppError, ErrorBody},
    services::{monitor_service, token_service},
    state::{SharedState, monitor::MonitorState},
};

/// Operator controls of the live monitor.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/monitor", get(get_monitor))
        .route("/monitor/players", put(set_players))
        .route("/monitor/score", post(adjust_score))
        .route("/monitor/hansoku", post(adjust_hansoku))
        .route("/monitor/timer/start", post(start_timer))
        .route("/monitor/timer/stop", post(stop_timer))
        .route("/monitor/timer/reset", post(reset_timer))
        .route("/monitor/visibility", put(set_visibility))
        .route("/monitor/view", put(set_view_mode))
        .route("/monitor/reset", post(reset_monitor))
        .route("/monitor/presentation", get(presentation_status))
        .route("/monitor/tokens", post(issue_token))
}

#[utoipa::path(
    get,
    path = "/monitor",
    tag = "monitor",
    responses((status = 200, description = "Current monitor state", body = MonitorState))
)]
/// Current monitor state.
pub async fn get_monitor(State(state): State<SharedState>) -> Json<MonitorState> {
    Json(monitor_service::current(&state).await)
}

/// Put a pairing on screen; counters restart from zero.
#[utoipa::path(
    put,
    path = "/monitor/players",
    tag = "monitor",
    request_body = SetPlayersRequest,
    responses(
        (status = 200, description = "Players shown", body = MonitorState),
        (status = 400, description = "Invalid players", body = ErrorBody)
    )
)]
pub async fn set_players(
    State(state): State<SharedState>,
    Json(request): Json<SetPlayersRequest>,
) -> Result<Json<MonitorState>, AppError> {
    request.validate()?;
    Ok(Json(monitor_service::set_players(&state, request).await))
}

/// Add to or take from a side's score; never drops below zero.
#[utoipa::path(
    post,
    path = "/monitor/score",
    tag = "monitor",
    request_body = AdjustRequest,
    responses(
        (status = 200, description = "Score adjusted", body = MonitorState),
        (status = 400, description = "Step out of range", body = ErrorBody)
    )
)]
pub async fn adjust_score(
    State(state): State<SharedState>,
    Json(request): Json<AdjustRequest>,
) -> Result<Json<MonitorState>, AppError> {
    Ok(Json(monitor_service::adjust_score(&state, request).await?))
}

/// Add or remove penalties; clamped to the configured maximum.
#[utoipa::path(
    post,
    path = "/monitor/hansoku",
    tag = "monitor",
    request_body = AdjustRequest,
    responses(
        (status = 200, description = "Penalties adjusted", body = MonitorState),
        (status = 400, description = "Step out of range", body = ErrorBody)
    )
)]
pub async fn adjust_hansoku(
    State(state): State<SharedState>,
    Json(request): Json<AdjustRequest>,
) -> Result<Json<MonitorState>, AppError> {
    Ok(Json(monitor_service::adjust_hansoku(&state, request).await?))
}

#[utoipa::path(
    post,
    path = "/monitor/timer/start",
    tag = "monitor",
    responses((status = 200, description = "Timer running", body = MonitorState))
)]
/// Start the match clock.
pub async fn start_timer(State(state): State<SharedState>) -> Json<MonitorState> {
    Json(monitor_service::start_timer(&state).await)
}

#[utoipa::path(
    post,
    path = "/monitor/timer/stop",
    tag = "monitor",
    responses((status = 200, description = "Timer stopped", body = MonitorState))
)]
/// Pause the match clock.
pub async fn stop_timer(State(state): State<SharedState>) -> Json<MonitorState> {
    Json(monitor_service::stop_timer(&state).await)
}

/// Rewind the clock, optionally with a new duration or mode.
#[utoipa::path(
    post,
    path = "/monitor/timer/reset",
    tag = "monitor",
    request_body(content = ResetTimerRequest, description = "Omit to keep duration and mode"),
    responses(
        (status = 200, description = "Timer reset", body = MonitorState),
        (status = 400, description = "Duration out of range", body = ErrorBody)
    )
)]
pub async fn reset_timer(
    State(state): State<SharedState>,
    request: Option<Json<ResetTimerRequest>>,
) -> Result<Json<MonitorState>, AppError> {
    let Json(request) = request.unwrap_or_default();
    request.validate()?;
    Ok(Json(monitor_service::reset_timer(&state, request).await))
}

#[utoipa::path(
    put,
    path = "/monitor/visibility",
    tag = "monitor",
    request_body = VisibilityRequest,
    responses((status = 200, description = "Visibility updated", body = MonitorState))
)]
/// Show or hide the monitor contents.
pub async fn set_visibility(
    State(state): State<SharedState>,
    Json(request): Json<VisibilityRequest>,
) -> Json<MonitorState> {
    Json(monitor_service::set_visibility(&state, request.visible).await)
}

#[utoipa::path(
    put,
    path = "/monitor/view",
    tag = "monitor",
    request_body = ViewModeRequest,
    responses((status = 200, description = "View mode updated", body = MonitorState))
)]
/// Switch the monitor layout.
pub async fn set_view_mode(
    State(state): State<SharedState>,
    Json(request): Json<ViewModeRequest>,
) -> Json<MonitorState> {
    Json(monitor_service::set_view_mode(&state, request.view_mode).await)
}

/// Clear players, scores and the clock.
#[utoipa::path(
    post,
    path = "/monitor/reset",
    tag = "monitor",
    responses((status = 200, description = "Monitor reset", body = MonitorState))
)]
pub async fn reset_monitor(State(state): State<SharedState>) -> Json<MonitorState> {
    Json(monitor_service::reset(&state).await)
}

/// Whether the external display is attached and answering heartbeats.
#[utoipa::path(
    get,
    path = "/monitor/presentation",
    tag = "monitor",
    responses((status = 200, description = "Presentation link status", body = PresentationStatus))
)]
pub async fn presentation_status(State(state): State<SharedState>) -> Json<PresentationStatus> {
    Json(monitor_service::presentation_status(&state).await)
}

/// Mint a short-lived token for a presentation display.
#[utoipa::path(
    post,
    path = "/monitor/tokens",
    tag = "tokens",
    request_body = MonitorClaims,
    responses(
        (status = 200, description = "Token issued", body = IssueTokenResponse),
        (status = 400, description = "Invalid claims", body = ErrorBody)
    )
)]
pub async fn issue_token(
    State(state): State<SharedState>,
    Json(claims): Json<MonitorClaims>,
) -> Result<Json<IssueTokenResponse>, AppError> {
    Ok(Json(token_service::issue_monitor_token(&state, claims)?))
}
