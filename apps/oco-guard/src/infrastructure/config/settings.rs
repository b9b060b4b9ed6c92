//! Guard Configuration Settings
//!
//! Configuration types for the guard, loaded from environment variables.

use std::time::Duration;

/// Binance API credentials.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API secret.
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Venue endpoints.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    /// REST base URL.
    pub rest_url: String,
    /// WebSocket base URL; the listen key is appended.
    pub stream_url: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            rest_url: "https://fapi.binance.com".to_string(),
            stream_url: "wss://fstream.binance.com/ws".to_string(),
        }
    }
}

/// Session and transport timing.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Period of listen key renewals.
    pub renewal_interval: Duration,
    /// Timeout applied to every REST call.
    pub http_timeout: Duration,
    /// `recvWindow` sent with signed requests, in milliseconds.
    pub recv_window_ms: u64,
    /// Silence on the stream after which it is treated as closed.
    pub stream_idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            renewal_interval: Duration::from_secs(30 * 60),
            http_timeout: Duration::from_secs(10),
            recv_window_ms: 5000,
            stream_idle_timeout: Duration::from_secs(600),
        }
    }
}

/// In-process reconnection settings.
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    /// Reconnect in-process instead of exiting when the stream ends.
    pub enabled: bool,
    /// Initial reconnection delay.
    pub delay_initial: Duration,
    /// Maximum reconnection delay.
    pub delay_max: Duration,
    /// Attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_initial: Duration::from_millis(1000),
            delay_max: Duration::from_secs(60),
            max_attempts: 0,
        }
    }
}

/// Complete guard configuration.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// API credentials.
    pub credentials: Credentials,
    /// Venue endpoints.
    pub endpoints: EndpointSettings,
    /// Session timing.
    pub session: SessionSettings,
    /// Reconnection behavior.
    pub reconnect: ReconnectSettings,
    /// Prometheus exporter port (0 = disabled).
    pub metrics_port: u16,
}

impl GuardConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `API_KEY` or `API_SECRET` is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `API_KEY` or `API_SECRET` is missing or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = required(&lookup, "API_KEY")?;
        let api_secret = required(&lookup, "API_SECRET")?;

        let endpoints = EndpointSettings {
            rest_url: lookup("BINANCE_REST_URL")
                .unwrap_or_else(|| EndpointSettings::default().rest_url),
            stream_url: lookup("BINANCE_STREAM_URL")
                .unwrap_or_else(|| EndpointSettings::default().stream_url),
        };

        let defaults = SessionSettings::default();
        let session = SessionSettings {
            renewal_interval: parse_duration_secs(
                &lookup,
                "OCO_GUARD_RENEWAL_INTERVAL_SECS",
                defaults.renewal_interval,
            ),
            http_timeout: parse_duration_secs(
                &lookup,
                "OCO_GUARD_HTTP_TIMEOUT_SECS",
                defaults.http_timeout,
            ),
            recv_window_ms: parse_or(&lookup, "OCO_GUARD_RECV_WINDOW_MS", defaults.recv_window_ms),
            stream_idle_timeout: parse_duration_secs(
                &lookup,
                "OCO_GUARD_STREAM_IDLE_TIMEOUT_SECS",
                defaults.stream_idle_timeout,
            ),
        };

        let defaults = ReconnectSettings::default();
        let reconnect = ReconnectSettings {
            enabled: lookup("OCO_GUARD_RECONNECT").is_some_and(|v| parse_bool(&v)),
            delay_initial: parse_duration_millis(
                &lookup,
                "OCO_GUARD_RECONNECT_DELAY_INITIAL_MS",
                defaults.delay_initial,
            ),
            delay_max: parse_duration_secs(
                &lookup,
                "OCO_GUARD_RECONNECT_DELAY_MAX_SECS",
                defaults.delay_max,
            ),
            max_attempts: parse_or(&lookup, "OCO_GUARD_MAX_RECONNECT_ATTEMPTS", defaults.max_attempts),
        };

        Ok(Self {
            credentials: Credentials::new(api_key, api_secret),
            endpoints,
            session,
            reconnect,
            metrics_port: parse_or(&lookup, "OCO_GUARD_METRICS_PORT", 0),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .map_or(default, Duration::from_millis)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_credentials_are_reported() {
        let err = GuardConfig::from_lookup(lookup_from(&[("API_SECRET", "s")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "API_KEY"));

        let err = GuardConfig::from_lookup(lookup_from(&[("API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "API_SECRET"));
    }

    #[test]
    fn empty_credentials_are_reported() {
        let err = GuardConfig::from_lookup(lookup_from(&[("API_KEY", " "), ("API_SECRET", "s")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(ref k) if k == "API_KEY"));
    }

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let config =
            GuardConfig::from_lookup(lookup_from(&[("API_KEY", "k"), ("API_SECRET", "s")])).unwrap();

        assert_eq!(config.credentials.api_key(), "k");
        assert_eq!(config.endpoints.rest_url, "https://fapi.binance.com");
        assert_eq!(config.endpoints.stream_url, "wss://fstream.binance.com/ws");
        assert_eq!(config.session.renewal_interval, Duration::from_secs(1800));
        assert_eq!(config.session.recv_window_ms, 5000);
        assert!(!config.reconnect.enabled);
        assert_eq!(config.metrics_port, 0);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = GuardConfig::from_lookup(lookup_from(&[
            ("API_KEY", "k"),
            ("API_SECRET", "s"),
            ("BINANCE_REST_URL", "https://testnet.binancefuture.com"),
            ("OCO_GUARD_RENEWAL_INTERVAL_SECS", "600"),
            ("OCO_GUARD_RECONNECT", "TRUE"),
            ("OCO_GUARD_RECONNECT_DELAY_INITIAL_MS", "250"),
            ("OCO_GUARD_MAX_RECONNECT_ATTEMPTS", "5"),
            ("OCO_GUARD_METRICS_PORT", "9100"),
        ]))
        .unwrap();

        assert_eq!(config.endpoints.rest_url, "https://testnet.binancefuture.com");
        assert_eq!(config.session.renewal_interval, Duration::from_secs(600));
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.delay_initial, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.metrics_port, 9100);
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = GuardConfig::from_lookup(lookup_from(&[
            ("API_KEY", "k"),
            ("API_SECRET", "s"),
            ("OCO_GUARD_RENEWAL_INTERVAL_SECS", "soon"),
            ("OCO_GUARD_STREAM_IDLE_TIMEOUT_SECS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.session.renewal_interval, Duration::from_secs(1800));
        assert_eq!(config.session.stream_idle_timeout, Duration::from_secs(600));
    }

    #[test]
    fn credentials_redacted_debug() {
        let creds = Credentials::new("key123".to_string(), "secret456".to_string());
        let debug = format!("{creds:?}");
        assert!(!debug.contains("key123"));
        assert!(!debug.contains("secret456"));
        assert!(debug.contains("[REDACTED]"));
    }
}
