use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for Tatami Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matches::list_matches,
        crate::routes::matches::open_draft,
        crate::routes::drafts::get_draft,
        crate::routes::drafts::update_draft,
        crate::routes::drafts::close_draft,
        crate::routes::drafts::save_draft,
        crate::routes::drafts::cancel_save,
        crate::routes::drafts::merge_pending,
        crate::routes::drafts::reject_pending,
        crate::routes::monitor::get_monitor,
        crate::routes::monitor::set_players,
        crate::routes::monitor::adjust_score,
        crate::routes::monitor::adjust_hansoku,
        crate::routes::monitor::start_timer,
        crate::routes::monitor::stop_timer,
        crate::routes::monitor::reset_timer,
        crate::routes::monitor::set_visibility,
        crate::routes::monitor::set_view_mode,
        crate::routes::monitor::reset_monitor,
        crate::routes::monitor::presentation_status,
        crate::routes::monitor::issue_token,
        crate::routes::tokens::validate_token,
        crate::routes::sse::operator_stream,
        crate::routes::sse::monitor_stream,
        crate::routes::sse::draft_stream,
        crate::routes::websocket::presentation_handler,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::dto::health::HealthResponse,
            crate::dto::matches::MatchListResponse,
            crate::dto::matches::MatchesSnapshotEvent,
            crate::dto::draft::DraftResponse,
            crate::dto::draft::UpdateDraftRequest,
            crate::dto::draft::SaveDraftRequest,
            crate::dto::draft::SaveDraftResponse,
            crate::dto::draft::PendingMergeEvent,
            crate::dto::monitor::SetPlayersRequest,
            crate::dto::monitor::AdjustRequest,
            crate::dto::monitor::ResetTimerRequest,
            crate::dto::monitor::VisibilityRequest,
            crate::dto::monitor::ViewModeRequest,
            crate::dto::monitor::HeartbeatPayload,
            crate::dto::monitor::InboundEnvelope,
            crate::dto::monitor::PresentationStatus,
            crate::dto::token::MonitorClaims,
            crate::dto::token::IssueTokenResponse,
            crate::dto::token::ValidateTokenRequest,
            crate::dto::token::TokenClaimsResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::state::matches::MatchRow,
            crate::state::conflict::ConflictReport,
            crate::state::monitor::MonitorState,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matches", description = "Authoritative match lists"),
        (name = "drafts", description = "Draft editing, saving and merging"),
        (name = "monitor", description = "Live match monitor controls"),
        (name = "tokens", description = "Monitor access tokens"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "presentation", description = "WebSocket session of the external display"),
    )
)]
pub struct ApiDoc;
