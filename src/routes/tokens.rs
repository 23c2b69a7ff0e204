use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::token::{TokenClaimsResponse, ValidateTokenRequest},
    error::{AppError, ErrorBody},
    services::token_service,
    state::SharedState,
};

/// Token checks open to displays.
pub fn router() -> Router<SharedState> {
    Router::new().route("/monitor/tokens/validate", post(validate_token))
}

/// Check a monitor token, optionally against the scope the caller expects.
#[utoipa::path(
    post,
    path = "/monitor/tokens/validate",
    tag = "tokens",
    request_body = ValidateTokenRequest,
    responses(
        (status = 200, description = "Token valid", body = TokenClaimsResponse),
        (status = 401, description = "EXPIRED, INVALID, WRONG_ISSUER or WRONG_AUDIENCE", body = ErrorBody),
        (status = 403, description = "SCOPE_MISMATCH", body = ErrorBody)
    )
)]
pub async fn validate_token(
    State(state): State<SharedState>,
    Json(request): Json<ValidateTokenRequest>,
) -> Result<Json<TokenClaimsResponse>, AppError> {
    Ok(Json(token_service::validate_monitor_token(&state, &request)?))
}
