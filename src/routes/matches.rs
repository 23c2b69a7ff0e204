use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        draft::DraftResponse,
        matches::{MatchListResponse, ScopePath},
    },
    error::AppError,
    services::{draft_service, match_service},
    state::SharedState,
};

/// Tournament match lists and the drafts editing them.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/tournaments/{orgId}/{tournamentId}/matches", get(list_matches))
        .route("/tournaments/{orgId}/{tournamentId}/drafts", post(open_draft))
}

/// Latest authoritative match list of a tournament.
#[utoipa::path(
    get,
    path = "/tournaments/{orgId}/{tournamentId}/matches",
    tag = "matches",
    params(ScopePath),
    responses(
        (status = 200, description = "Latest snapshot", body = MatchListResponse),
        (status = 400, description = "Malformed identifiers", body = crate::error::ErrorBody),
        (status = 503, description = "Storage unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn list_matches(
    State(state): State<SharedState>,
    Path(path): Path<ScopePath>,
) -> Result<Json<MatchListResponse>, AppError> {
    path.validate()?;
    Ok(Json(match_service::list_matches(&state, path.into()).await?))
}

/// Open a draft baselined on the latest list.
#[utoipa::path(
    post,
    path = "/tournaments/{orgId}/{tournamentId}/drafts",
    tag = "drafts",
    params(ScopePath),
    responses(
        (status = 201, description = "Draft opened", body = DraftResponse),
        (status = 503, description = "Storage unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn open_draft(
    State(state): State<SharedState>,
    Path(path): Path<ScopePath>,
) -> Result<(StatusCode, Json<DraftResponse>), AppError> {
    path.validate()?;
    let draft = draft_service::open_draft(&state, path.into()).await?;
    Ok((StatusCode::CREATED, Json(draft)))
}
