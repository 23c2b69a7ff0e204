use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::draft::{DraftResponse, SaveDraftRequest, SaveDraftResponse, UpdateDraftRequest},
    error::{AppError, ErrorBody},
    services::draft_service,
    state::SharedState,
};

/// Draft sessions and their save and merge flows.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/drafts/{id}",
            get(get_draft).put(update_draft).delete(close_draft),
        )
        .route("/drafts/{id}/save", post(save_draft))
        .route("/drafts/{id}/cancel", post(cancel_save))
        .route("/drafts/{id}/merge", post(merge_pending))
        .route("/drafts/{id}/reject", post(reject_pending))
}

#[utoipa::path(
    get,
    path = "/drafts/{id}",
    tag = "drafts",
    params(("id" = Uuid, Path, description = "Draft identifier")),
    responses(
        (status = 200, description = "Draft session", body = DraftResponse),
        (status = 404, description = "Unknown draft", body = ErrorBody)
    )
)]
/// Current state of a draft.
pub async fn get_draft(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DraftResponse>, AppError> {
    Ok(Json(draft_service::get_draft(&state, id).await?))
}

/// Replace the edited rows.
#[utoipa::path(
    put,
    path = "/drafts/{id}",
    tag = "drafts",
    params(("id" = Uuid, Path, description = "Draft identifier")),
    request_body = UpdateDraftRequest,
    responses(
        (status = 200, description = "Draft updated", body = DraftResponse),
        (status = 400, description = "Invalid rows", body = ErrorBody),
        (status = 404, description = "Unknown draft", body = ErrorBody)
    )
)]
pub async fn update_draft(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDraftRequest>,
) -> Result<Json<DraftResponse>, AppError> {
    request.validate()?;
    Ok(Json(
        draft_service::update_draft(&state, id, request.matches).await?,
    ))
}

/// Discard a draft and disconnect its stream.
#[utoipa::path(
    delete,
    path = "/drafts/{id}",
    tag = "drafts",
    params(("id" = Uuid, Path, description = "Draft identifier")),
    responses(
        (status = 204, description = "Draft closed"),
        (status = 404, description = "Unknown draft", body = ErrorBody)
    )
)]
pub async fn close_draft(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    draft_service::close_draft(&state, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Save the draft. Concurrent edits answer `409` with the conflict report
/// until the save is resent with `force`.
#[utoipa::path(
    post,
    path = "/drafts/{id}/save",
    tag = "drafts",
    params(("id" = Uuid, Path, description = "Draft identifier")),
    request_body(content = SaveDraftRequest, description = "Omit or send `{}` for a plain save"),
    responses(
        (status = 200, description = "Rows committed", body = SaveDraftResponse),
        (status = 409, description = "Overwrite needs confirmation", body = SaveDraftResponse),
        (status = 503, description = "Storage unavailable; draft kept", body = ErrorBody)
    )
)]
pub async fn save_draft(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    request: Option<Json<SaveDraftRequest>>,
) -> Result<(StatusCode, Json<SaveDraftResponse>), AppError> {
    let Json(request) = request.unwrap_or_default();
    let outcome = draft_service::save_draft(&state, id, request.force).await?;
    let status = match outcome {
        SaveDraftResponse::Saved { .. } => StatusCode::OK,
        SaveDraftResponse::ConfirmOverwrite { .. } => StatusCode::CONFLICT,
    };
    Ok((status, Json(outcome)))
}

/// Back out of an overwrite confirmation.
#[utoipa::path(
    post,
    path = "/drafts/{id}/cancel",
    tag = "drafts",
    params(("id" = Uuid, Path, description = "Draft identifier")),
    responses(
        (status = 200, description = "Draft back to idle", body = DraftResponse),
        (status = 409, description = "No confirmation pending", body = ErrorBody)
    )
)]
pub async fn cancel_save(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DraftResponse>, AppError> {
    Ok(Json(draft_service::cancel_save(&state, id).await?))
}

/// Adopt the pending upstream changes.
#[utoipa::path(
    post,
    path = "/drafts/{id}/merge",
    tag = "drafts",
    params(("id" = Uuid, Path, description = "Draft identifier")),
    responses(
        (status = 200, description = "Changes merged", body = DraftResponse),
        (status = 409, description = "No pending merge", body = ErrorBody)
    )
)]
pub async fn merge_pending(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DraftResponse>, AppError> {
    Ok(Json(draft_service::merge_pending(&state, id).await?))
}

/// Keep the draft as is and dismiss the pending changes.
#[utoipa::path(
    post,
    path = "/drafts/{id}/reject",
    tag = "drafts",
    params(("id" = Uuid, Path, description = "Draft identifier")),
    responses(
        (status = 200, description = "Changes dismissed", body = DraftResponse),
        (status = 409, description = "No pending merge", body = ErrorBody)
    )
)]
pub async fn reject_pending(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DraftResponse>, AppError> {
    Ok(Json(draft_service::reject_pending(&state, id).await?))
}
