//! Application-level configuration loading: token signing, monitor timings,
//! draft expiry and the optional operator key.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use rand::{Rng, distr::Alphanumeric};
use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TATAMI_BACK_CONFIG_PATH";
/// Environment variable that overrides the token signing secret.
const TOKEN_SECRET_ENV: &str = "TOKEN_SECRET";

const DEFAULT_ISSUER: &str = "tatami-back";
const DEFAULT_AUDIENCE: &str = "tatami-monitor";
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);
const GENERATED_SECRET_LEN: usize = 48;

#[derive(Debug, Clone)]
/// Monitor access token settings.
pub struct TokenConfig {
    secret: String,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenConfig {
    /// HMAC key for monitor tokens.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// `iss` claim of issued tokens.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// `aud` claim of issued tokens.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Lifetime of issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: generate_secret(),
            issuer: DEFAULT_ISSUER.into(),
            audience: DEFAULT_AUDIENCE.into(),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }
}

#[derive(Debug, Clone)]
/// Timings and limits of the live monitor.
pub struct MonitorConfig {
    heartbeat_interval: Duration,
    heartbeat_timeout: Duration,
    tick_interval: Duration,
    max_hansoku: u32,
    default_duration: Duration,
}

impl MonitorConfig {
    /// Time between pings to the display.
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Silence after which the display counts as stale.
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    /// Cadence of timer frames.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Upper bound of the penalty counter.
    pub fn max_hansoku(&self) -> u32 {
        self.max_hansoku
    }

    /// Match clock duration restored by a reset.
    pub fn default_duration_ms(&self) -> u64 {
        self.default_duration.as_millis() as u64
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(15),
            tick_interval: Duration::from_secs(1),
            max_hansoku: 4,
            default_duration: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone)]
/// Lifetime of draft sessions nobody touches any more.
pub struct DraftConfig {
    idle_ttl: Duration,
    sweep_interval: Duration,
}

impl DraftConfig {
    /// Idle time after which a draft without stream subscribers is evicted.
    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    /// How often idle drafts are looked for.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    token: TokenConfig,
    monitor: MonitorConfig,
    drafts: DraftConfig,
    operator_key: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in
    /// defaults, then apply environment overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        operator_key = app_config.operator_key.is_some(),
                        "loaded config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };
        config.with_env_overrides()
    }

    /// Monitor token settings.
    pub fn token(&self) -> &TokenConfig {
        &self.token
    }

    /// Monitor and presentation settings.
    pub fn monitor(&self) -> &MonitorConfig {
        &self.monitor
    }

    /// Draft lifecycle settings.
    pub fn drafts(&self) -> &DraftConfig {
        &self.drafts
    }

    /// Key operator routes require, when configured.
    pub fn operator_key(&self) -> Option<&str> {
        self.operator_key.as_deref()
    }

    /// Require `key` on operator routes.
    pub fn with_operator_key(mut self, key: impl Into<String>) -> Self {
        self.operator_key = Some(key.into());
        self
    }

    /// Sign monitor tokens with `secret`.
    pub fn with_token_secret(mut self, secret: impl Into<String>) -> Self {
        self.token.secret = secret.into();
        self
    }

    /// Override the presentation heartbeat timings.
    pub fn with_heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.monitor.heartbeat_interval = interval;
        self.monitor.heartbeat_timeout = timeout;
        self
    }

    /// Override how long an untouched draft survives.
    pub fn with_draft_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.drafts.idle_ttl = idle_ttl;
        self
    }

    fn with_env_overrides(self) -> Self {
        match env::var(TOKEN_SECRET_ENV) {
            Ok(secret) if !secret.is_empty() => self.with_token_secret(secret),
            _ => self,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    token: RawTokenConfig,
    #[serde(default)]
    monitor: RawMonitorConfig,
    #[serde(default)]
    drafts: RawDraftConfig,
    #[serde(default)]
    operator_key: Option<String>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenConfig {
    secret: Option<String>,
    issuer: Option<String>,
    audience: Option<String>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default, rename = "ttlSecs")]
    ttl: Option<Duration>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMonitorConfig {
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "heartbeatIntervalMs")]
    heartbeat_interval: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "heartbeatTimeoutMs")]
    heartbeat_timeout: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "tickIntervalMs")]
    tick_interval: Option<Duration>,
    #[serde(default)]
    max_hansoku: Option<u32>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "defaultDurationMs")]
    default_duration: Option<Duration>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDraftConfig {
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default, rename = "idleTtlSecs")]
    idle_ttl: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default, rename = "sweepIntervalSecs")]
    sweep_interval: Option<Duration>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let monitor_defaults = MonitorConfig::default();
        let draft_defaults = DraftConfig::default();
        let RawConfig {
            token,
            monitor,
            drafts,
            operator_key,
        } = value;

        Self {
            token: TokenConfig {
                secret: token
                    .secret
                    .filter(|secret| !secret.is_empty())
                    .unwrap_or_else(generate_secret),
                issuer: token.issuer.unwrap_or_else(|| DEFAULT_ISSUER.into()),
                audience: token.audience.unwrap_or_else(|| DEFAULT_AUDIENCE.into()),
                ttl: token.ttl.unwrap_or(DEFAULT_TOKEN_TTL),
            },
            monitor: MonitorConfig {
                heartbeat_interval: monitor
                    .heartbeat_interval
                    .unwrap_or(monitor_defaults.heartbeat_interval),
                heartbeat_timeout: monitor
                    .heartbeat_timeout
                    .unwrap_or(monitor_defaults.heartbeat_timeout),
                tick_interval: monitor
                    .tick_interval
                    .filter(|interval| !interval.is_zero())
                    .unwrap_or(monitor_defaults.tick_interval),
                max_hansoku: monitor.max_hansoku.unwrap_or(monitor_defaults.max_hansoku),
                default_duration: monitor
                    .default_duration
                    .unwrap_or(monitor_defaults.default_duration),
            },
            drafts: DraftConfig {
                idle_ttl: drafts.idle_ttl.unwrap_or(draft_defaults.idle_ttl),
                sweep_interval: drafts
                    .sweep_interval
                    .filter(|interval| !interval.is_zero())
                    .unwrap_or(draft_defaults.sweep_interval),
            },
            operator_key: operator_key.filter(|key| !key.is_empty()),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Random signing secret used when none is configured. Tokens do not survive a
/// restart in that case.
fn generate_secret() -> String {
    warn!("no token secret configured; generating an ephemeral one");
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "token": { "secret": "s3cret", "ttlSecs": 120 },
                "monitor": { "heartbeatTimeoutMs": 9000, "maxHansoku": 2 },
                "operatorKey": "desk"
            }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.token().secret(), "s3cret");
        assert_eq!(config.token().ttl(), Duration::from_secs(120));
        assert_eq!(config.token().issuer(), DEFAULT_ISSUER);
        assert_eq!(config.monitor().heartbeat_timeout(), Duration::from_millis(9000));
        assert_eq!(config.monitor().heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.monitor().max_hansoku(), 2);
        assert_eq!(config.operator_key(), Some("desk"));
    }

    #[test]
    fn empty_operator_key_disables_the_check() {
        let raw: RawConfig = serde_json::from_str(r#"{ "operatorKey": "" }"#).unwrap();
        assert_eq!(AppConfig::from(raw).operator_key(), None);
    }

    #[test]
    fn zero_tick_interval_falls_back_to_default() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "monitor": { "tickIntervalMs": 0 } }"#).unwrap();
        assert_eq!(
            AppConfig::from(raw).monitor().tick_interval(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn draft_expiry_is_configurable() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "drafts": { "idleTtlSecs": 600, "sweepIntervalSecs": 0 } }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.drafts().idle_ttl(), Duration::from_secs(600));
        assert_eq!(config.drafts().sweep_interval(), Duration::from_secs(60));
    }
}
