use axum::{
    body::Body,
    extract::{Query, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::{error::AppError, state::SharedState};

/// Header carrying the operator key.
pub const OPERATOR_KEY_HEADER: &str = "x-operator-key";

/// `EventSource` cannot set headers, so streams may pass the key as a query parameter.
#[derive(Debug, Default, Deserialize)]
struct OperatorKeyQuery {
    operator_key: Option<String>,
}

/// Reject operator requests without the configured key. Open when no key is configured.
pub async fn require_operator_key(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config().operator_key() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(OPERATOR_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .or_else(|| {
            Query::<OperatorKeyQuery>::try_from_uri(req.uri())
                .ok()
                .and_then(|Query(query)| query.operator_key)
        })
        .ok_or_else(|| AppError::unauthorized("missing operator key header `X-Operator-Key`"))?;

    if provided == expected {
        Ok(next.run(req).await)
    } else {
        Err(AppError::unauthorized("invalid operator key"))
    }
}
