use axum::{Router, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Draft editing endpoints.
pub mod drafts;
/// Liveness endpoint.
pub mod health;
/// Committed match list endpoints.
pub mod matches;
/// Monitor control and presentation endpoints.
pub mod monitor;
/// Operator key guard.
pub mod operator;
/// Server-sent event streams.
pub mod sse;
/// Monitor token endpoints.
pub mod tokens;
/// Presentation display socket.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let operator_router = matches::router()
        .merge(drafts::router())
        .merge(monitor::router())
        .merge(sse::operator_router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            operator::require_operator_key,
        ));

    let api_router = health::router()
        .merge(tokens::router())
        .merge(sse::router())
        .merge(websocket::router())
        .merge(operator_router);

    let docs_router: Router<SharedState> = SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into();

    api_router.merge(docs_router).with_state(state)
}
