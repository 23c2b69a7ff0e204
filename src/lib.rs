//! Library crate for tatami-back, exposing modules for binaries and integration tests.

/// Runtime configuration loading.
pub mod config;
/// Storage abstractions and backends.
pub mod dao;
/// Request, response and event payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP, SSE and WebSocket routes.
pub mod routes;
/// Business operations behind the routes.
pub mod services;
/// Shared in-memory application state.
pub mod state;
