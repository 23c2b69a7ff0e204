//! Short-lived HS256 tokens granting a display access to the monitor.

use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use validator::Validate;

use crate::{
    config::TokenConfig,
    dto::token::{IssueTokenResponse, MonitorClaims, TokenClaimsResponse, ValidateTokenRequest},
    error::ServiceError,
    state::SharedState,
};

const SUBJECT: &str = "monitor";

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Past its `exp`.
    #[error("token expired")]
    Expired,
    /// Malformed, badly signed or missing a required claim.
    #[error("token invalid: {0}")]
    Invalid(&'static str),
    /// Signed by this server for another issuer.
    #[error("token issued by an unexpected issuer")]
    WrongIssuer,
    /// Minted for another audience.
    #[error("token issued for another audience")]
    WrongAudience,
    /// Genuine token for another match or tournament.
    #[error("token does not cover this {0}")]
    ScopeMismatch(&'static str),
    /// The server could not produce a token.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    /// Code reported to clients in the error body.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Expired => "EXPIRED",
            TokenError::Invalid(_) => "INVALID",
            TokenError::WrongIssuer => "WRONG_ISSUER",
            TokenError::WrongAudience => "WRONG_AUDIENCE",
            TokenError::ScopeMismatch(_) => "SCOPE_MISMATCH",
            TokenError::Signing(_) => "SIGNING",
        }
    }

    /// The token is genuine but does not grant the requested resource.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, TokenError::ScopeMismatch(_))
    }
}

/// Map a refused decode onto the codes clients see.
fn rejection(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidIssuer => TokenError::WrongIssuer,
        ErrorKind::InvalidAudience => TokenError::WrongAudience,
        ErrorKind::InvalidSignature => TokenError::Invalid("bad signature"),
        ErrorKind::InvalidAlgorithm => TokenError::Invalid("unsupported algorithm"),
        ErrorKind::InvalidSubject => TokenError::Invalid("unexpected subject"),
        ErrorKind::MissingRequiredClaim(_) => TokenError::Invalid("missing claim"),
        other => {
            debug!(kind = ?other, "rejecting malformed token");
            TokenError::Invalid("malformed token")
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payload {
    iss: String,
    aud: String,
    sub: String,
    iat: i64,
    exp: i64,
    jti: String,
    #[serde(flatten)]
    claims: MonitorClaims,
}

/// A token that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    /// Match and tournament the token grants.
    pub claims: MonitorClaims,
    /// `iss` claim.
    pub issuer: String,
    /// `aud` claim.
    pub audience: String,
    /// `iat` claim.
    pub issued_at: OffsetDateTime,
    /// `exp` claim.
    pub expires_at: OffsetDateTime,
}

/// A signed token and its validity window.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWT.
    pub token: String,
    /// Start of the window, whole seconds.
    pub issued_at: OffsetDateTime,
    /// End of the window, exclusive of any leeway.
    pub expires_at: OffsetDateTime,
}

/// Scope a caller expects a token to grant; unset fields are not checked.
#[derive(Debug, Clone, Default)]
pub struct ExpectedScope<'a> {
    /// Match the display shows.
    pub match_id: Option<&'a str>,
    /// Organisation owning the tournament.
    pub org_id: Option<&'a str>,
    /// Tournament of the match.
    pub tournament_id: Option<&'a str>,
}

/// Signs and verifies monitor tokens with the configured secret.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenService {
    /// Service signing with the secret, issuer, audience and lifetime of `config`.
    pub fn new(config: &TokenConfig) -> Self {
        Self::from_parts(
            config.secret().as_bytes(),
            config.issuer(),
            config.audience(),
            config.ttl(),
        )
    }

    fn from_parts(secret: &[u8], issuer: &str, audience: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.sub = Some(SUBJECT.to_string());
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            ttl,
        }
    }

    /// Sign `claims` for a window starting now.
    pub fn issue(&self, claims: MonitorClaims) -> Result<IssuedToken, TokenError> {
        self.issue_at(claims, OffsetDateTime::now_utc())
    }

    /// Sign `claims` for a window starting at `now`.
    pub fn issue_at(
        &self,
        claims: MonitorClaims,
        now: OffsetDateTime,
    ) -> Result<IssuedToken, TokenError> {
        let issued_at = now.replace_nanosecond(0).unwrap_or(now);
        let expires_at = issued_at + self.ttl;
        let payload = Payload {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: SUBJECT.into(),
            iat: issued_at.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
            claims,
        };

        let token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))?;
        Ok(IssuedToken {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Check algorithm, signature, expiry, subject, issuer and audience.
    pub fn validate(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let payload = decode::<Payload>(token, &self.decoding, &self.validation)
            .map_err(rejection)?
            .claims;

        Ok(VerifiedToken {
            claims: payload.claims,
            issuer: payload.iss,
            audience: payload.aud,
            issued_at: timestamp(payload.iat)?,
            expires_at: timestamp(payload.exp)?,
        })
    }
}

impl VerifiedToken {
    /// Refuse tokens minted for another match or tournament.
    pub fn ensure_scope(&self, expected: &ExpectedScope<'_>) -> Result<(), TokenError> {
        let checks = [
            ("match", expected.match_id, self.claims.match_id.as_str()),
            ("organisation", expected.org_id, self.claims.org_id.as_str()),
            ("tournament", expected.tournament_id, self.claims.tournament_id.as_str()),
        ];
        for (what, wanted, actual) in checks {
            if wanted.is_some_and(|wanted| wanted != actual) {
                return Err(TokenError::ScopeMismatch(what));
            }
        }
        Ok(())
    }
}

fn timestamp(seconds: i64) -> Result<OffsetDateTime, TokenError> {
    OffsetDateTime::from_unix_timestamp(seconds).map_err(|_| TokenError::Invalid("bad timestamp"))
}

/// Mint a token for a display showing `claims`.
pub fn issue_monitor_token(
    state: &SharedState,
    claims: MonitorClaims,
) -> Result<IssueTokenResponse, ServiceError> {
    claims.validate()?;
    let issued = state.tokens().issue(claims)?;
    Ok(IssueTokenResponse::new(
        issued.token,
        issued.issued_at,
        issued.expires_at,
    ))
}

/// Verify a token and, when given, that it covers the requested scope.
pub fn validate_monitor_token(
    state: &SharedState,
    request: &ValidateTokenRequest,
) -> Result<TokenClaimsResponse, ServiceError> {
    let verified = state.tokens().validate(&request.token)?;
    verified.ensure_scope(&ExpectedScope {
        match_id: request.match_id.as_deref(),
        org_id: request.org_id.as_deref(),
        tournament_id: request.tournament_id.as_deref(),
    })?;
    Ok(TokenClaimsResponse::new(
        verified.claims,
        verified.issuer,
        verified.audience,
        verified.issued_at,
        verified.expires_at,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn service() -> TokenService {
        let config = AppConfig::default().with_token_secret("test-secret");
        TokenService::new(config.token())
    }

    fn claims() -> MonitorClaims {
        MonitorClaims {
            match_id: "m1".into(),
            org_id: "org".into(),
            tournament_id: "t1".into(),
        }
    }

    fn segments(token: &str) -> Vec<String> {
        token.split('.').map(str::to_string).collect()
    }

    #[test]
    fn round_trip_within_window_returns_the_claims() {
        let service = service();
        let issued = service.issue(claims()).unwrap();
        assert_eq!(issued.expires_at - issued.issued_at, time::Duration::minutes(5));

        let verified = service.validate(&issued.token).unwrap();
        assert_eq!(verified.claims, claims());
        assert_eq!(verified.issued_at, issued.issued_at);
        assert_eq!(verified.expires_at, issued.expires_at);
        assert_eq!(verified.issuer, "tatami-back");
        assert_eq!(verified.audience, "tatami-monitor");
    }

    #[test]
    fn token_past_its_window_is_expired() {
        let service = service();
        let issued_at = OffsetDateTime::now_utc() - Duration::from_secs(301);
        let issued = service.issue_at(claims(), issued_at).unwrap();

        let err = service.validate(&issued.token).unwrap_err();
        assert_eq!(err, TokenError::Expired);
        assert_eq!(err.code(), "EXPIRED");
    }

    #[test]
    fn tampered_signature_is_invalid() {
        let service = service();
        let issued = service.issue(claims()).unwrap();
        let mut parts = segments(&issued.token);

        let mut signature: Vec<char> = parts[2].chars().collect();
        let middle = signature.len() / 2;
        signature[middle] = if signature[middle] == 'A' { 'B' } else { 'A' };
        parts[2] = signature.into_iter().collect();

        let err = service.validate(&parts.join(".")).unwrap_err();
        assert_eq!(err, TokenError::Invalid("bad signature"));
        assert_eq!(err.code(), "INVALID");
    }

    #[test]
    fn payload_swapped_from_another_token_is_invalid() {
        let service = service();
        let issued = service.issue(claims()).unwrap();
        let other = service
            .issue(MonitorClaims {
                match_id: "m2".into(),
                ..claims()
            })
            .unwrap();

        let mut parts = segments(&issued.token);
        parts[1] = segments(&other.token)[1].clone();

        assert_eq!(
            service.validate(&parts.join(".")).unwrap_err(),
            TokenError::Invalid("bad signature")
        );
    }

    #[test]
    fn another_secret_cannot_validate() {
        let issued = service().issue(claims()).unwrap();
        let other = TokenService::new(AppConfig::default().with_token_secret("other").token());
        assert_eq!(
            other.validate(&issued.token).unwrap_err().code(),
            "INVALID"
        );
    }

    #[test]
    fn garbage_is_invalid() {
        let service = service();
        for token in ["", "a.b", "a.b.c.d", "!!.??.**"] {
            assert_eq!(service.validate(token).unwrap_err().code(), "INVALID");
        }
    }

    #[test]
    fn issuer_and_audience_are_checked() {
        let issued = service().issue(claims()).unwrap();
        let ttl = Duration::from_secs(300);

        let other = TokenService::from_parts(b"test-secret", "someone-else", "tatami-monitor", ttl);
        assert_eq!(
            other.validate(&issued.token).unwrap_err(),
            TokenError::WrongIssuer
        );

        let other = TokenService::from_parts(b"test-secret", "tatami-back", "another-screen", ttl);
        assert_eq!(
            other.validate(&issued.token).unwrap_err(),
            TokenError::WrongAudience
        );
    }

    #[test]
    fn scope_mismatch_is_forbidden() {
        let service = service();
        let issued = service.issue(claims()).unwrap();
        let verified = service.validate(&issued.token).unwrap();

        assert!(verified.ensure_scope(&ExpectedScope::default()).is_ok());
        assert!(
            verified
                .ensure_scope(&ExpectedScope {
                    match_id: Some("m1"),
                    org_id: Some("org"),
                    tournament_id: None,
                })
                .is_ok()
        );

        let err = verified
            .ensure_scope(&ExpectedScope {
                tournament_id: Some("t2"),
                ..ExpectedScope::default()
            })
            .unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(err.code(), "SCOPE_MISMATCH");
    }
}
