/// OpenAPI documentation generation.
pub mod documentation;
/// Draft sessions and their save and merge flows.
pub mod draft_service;
/// Health check service.
pub mod health_service;
/// Match list snapshots backed by the match store.
pub mod match_service;
/// Live monitor mutations and the timer tick.
pub mod monitor_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
/// Monitor token signing and verification.
pub mod token_service;
/// Presentation WebSocket session handling.
pub mod websocket_service;
