use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{error::AppError, services::websocket_service, state::SharedState};

/// Credentials of a presentation display.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PresentationQuery {
    /// Monitor token from `POST /monitor/tokens`.
    pub token: String,
}

#[utoipa::path(
    get,
    path = "/ws/presentation",
    tag = "presentation",
    params(PresentationQuery),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "Token rejected", body = crate::error::ErrorBody),
        (status = 409, description = "Another display is connected", body = crate::error::ErrorBody)
    )
)]
/// Upgrade an authorised display into the presentation session.
pub async fn presentation_handler(
    State(state): State<SharedState>,
    Query(query): Query<PresentationQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let handle = websocket_service::open_presentation(&state, &query.token).await?;
    let session = handle.id;
    let failed_state = state.clone();

    Ok(ws
        .on_failed_upgrade(move |_| {
            tokio::spawn(async move {
                websocket_service::abandon_presentation(&failed_state, session).await;
            });
        })
        .on_upgrade(move |socket| {
            websocket_service::handle_presentation_socket(state, socket, handle)
        }))
}

/// Configure the presentation WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws/presentation", get(presentation_handler))
}
