use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Draft session payloads.
pub mod draft;
/// Health check payload.
pub mod health;
/// Match list payloads.
pub mod matches;
/// Monitor control and display payloads.
pub mod monitor;
/// SSE envelopes.
pub mod sse;
/// Monitor token payloads.
pub mod token;
/// Field validators shared by the payloads.
pub mod validation;

fn format_timestamp(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
