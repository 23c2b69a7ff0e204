use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::{format_timestamp, validation::validate_identifier};

/// Scope a monitor token grants access to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MonitorClaims {
    /// Match the display shows.
    #[validate(custom(function = "validate_identifier"))]
    pub match_id: String,
    /// Organisation owning the tournament.
    #[validate(custom(function = "validate_identifier"))]
    pub org_id: String,
    /// Tournament of the match.
    #[validate(custom(function = "validate_identifier"))]
    pub tournament_id: String,
}

/// Freshly signed monitor token.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenResponse {
    /// Compact JWT.
    pub token: String,
    /// RFC 3339 expiry instant.
    pub expires_at: String,
    /// Seconds until expiry.
    pub expires_in: u64,
}

impl IssueTokenResponse {
    /// Response for a token valid from `issued_at` to `expires_at`.
    pub fn new(token: String, issued_at: OffsetDateTime, expires_at: OffsetDateTime) -> Self {
        Self {
            token,
            expires_at: format_timestamp(expires_at),
            expires_in: (expires_at - issued_at).whole_seconds().max(0) as u64,
        }
    }
}

/// Token to check, optionally against an expected scope.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenRequest {
    /// Token to check.
    pub token: String,
    /// Match the token must cover.
    #[serde(default)]
    pub match_id: Option<String>,
    /// Organisation the token must cover.
    #[serde(default)]
    pub org_id: Option<String>,
    /// Tournament the token must cover.
    #[serde(default)]
    pub tournament_id: Option<String>,
}

/// Claims embedded in a valid token.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaimsResponse {
    /// Granted scope.
    #[serde(flatten)]
    pub claims: MonitorClaims,
    /// `iss` claim.
    pub issuer: String,
    /// `aud` claim.
    pub audience: String,
    /// RFC 3339 issue instant.
    pub issued_at: String,
    /// RFC 3339 expiry instant.
    pub expires_at: String,
}

impl TokenClaimsResponse {
    /// Response carrying verified claims and their window.
    pub fn new(
        claims: MonitorClaims,
        issuer: String,
        audience: String,
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Self {
        Self {
            claims,
            issuer,
            audience,
            issued_at: format_timestamp(issued_at),
            expires_at: format_timestamp(expires_at),
        }
    }
}
