use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/operator",
    tag = "sse",
    params(("operator_key" = Option<String>, Query, description = "Operator key when headers cannot be set")),
    responses((status = 200, description = "Operator SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream tournament-wide notifications: committed lists, presentation and storage status.
pub async fn operator_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (receiver, initial) = sse_service::subscribe_operator(&state);
    info!("New operator SSE connection");
    sse_service::to_sse_stream(receiver, initial, StreamKind::Operator)
}

#[utoipa::path(
    get,
    path = "/sse/monitor",
    tag = "sse",
    responses((status = 200, description = "Monitor frames for same-origin windows", content_type = "text/event-stream", body = String))
)]
/// Stream monitor frames, starting with the current state.
pub async fn monitor_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (receiver, initial) = sse_service::subscribe_monitor(&state).await;
    info!("New monitor SSE connection");
    sse_service::to_sse_stream(receiver, initial, StreamKind::Monitor)
}

#[utoipa::path(
    get,
    path = "/sse/drafts/{id}",
    tag = "sse",
    params(
        ("id" = Uuid, Path, description = "Draft identifier"),
        ("operator_key" = Option<String>, Query, description = "Operator key when headers cannot be set")
    ),
    responses(
        (status = 200, description = "Draft notifications", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown draft", body = crate::error::ErrorBody)
    )
)]
/// Stream `draft.pending_merge` notifications of one draft until it is closed.
pub async fn draft_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (receiver, initial) = sse_service::subscribe_draft(&state, id).await?;
    info!(draft = %id, "New draft SSE connection");
    Ok(sse_service::to_sse_stream(
        receiver,
        initial,
        StreamKind::Draft(id),
    ))
}

/// Operator streams; mounted behind the operator key.
pub fn operator_router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/operator", get(operator_stream))
        .route("/sse/drafts/{id}", get(draft_stream))
}

/// Display streams.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/monitor", get(monitor_stream))
}
