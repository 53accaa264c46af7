//! Client configuration resolved from the environment plus overrides.

use std::env;
use std::path::PathBuf;

use chrono_tz::Tz;
use thiserror::Error;

use crate::cache::{CacheMode, CHART_SNAPSHOT_FILE, QUOTE_SNAPSHOT_FILE};
use crate::clock::{parse_timezone, Clock, DEFAULT_TIMEZONE};
use crate::fetcher::IEX_BASE_URL;

/// Startup configuration failure. Fatal for the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0}")]
    UnknownTimezone(String),
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub token: String,
    pub cache_dir: PathBuf,
    pub timezone: Tz,
    pub base_url: String,
    pub quote_cache: CacheMode,
    pub chart_cache: CacheMode,
    pub dump_responses: bool,
    pub dump_dir: PathBuf,
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            cache_dir: default_cache_dir(env::var_os("HOME").map(PathBuf::from)),
            timezone: chrono_tz::America::New_York,
            base_url: String::from(IEX_BASE_URL),
            quote_cache: CacheMode::Memory,
            chart_cache: CacheMode::Persistent,
            dump_responses: false,
            dump_dir: PathBuf::from("."),
            timeout_ms: 10_000,
        }
    }
}

impl ClientConfig {
    /// Read `PONZI_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self {
            cache_dir: default_cache_dir(value("HOME").map(PathBuf::from)),
            ..Self::default()
        };

        if let Some(token) = value("PONZI_IEX_TOKEN").or_else(|| value("IEX_API_TOKEN")) {
            config.token = token.trim().to_owned();
        }
        if let Some(dir) = value("PONZI_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        let timezone = value("PONZI_TIMEZONE").unwrap_or_else(|| String::from(DEFAULT_TIMEZONE));
        config.timezone = parse_timezone(&timezone).map_err(ConfigError::UnknownTimezone)?;
        if let Some(url) = value("PONZI_IEX_BASE_URL") {
            config.base_url = url.trim().trim_end_matches('/').to_owned();
        }
        if let Some(raw) = value("PONZI_TIMEOUT_MS") {
            config.timeout_ms = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    name: "PONZI_TIMEOUT_MS",
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(config)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_quote_cache(mut self, mode: CacheMode) -> Self {
        self.quote_cache = mode;
        self
    }

    pub fn with_chart_cache(mut self, mode: CacheMode) -> Self {
        self.chart_cache = mode;
        self
    }

    pub fn with_dump_responses(mut self, enabled: bool) -> Self {
        self.dump_responses = enabled;
        self
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = dir.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn chart_snapshot_path(&self) -> PathBuf {
        self.cache_dir.join(CHART_SNAPSHOT_FILE)
    }

    pub fn quote_snapshot_path(&self) -> PathBuf {
        self.cache_dir.join(QUOTE_SNAPSHOT_FILE)
    }

    /// System clock in the configured timezone.
    pub fn clock(&self) -> Clock {
        Clock::system(self.timezone)
    }
}

/// `<home>/.cache/ponzi`, or `.cache/ponzi` relative to the working
/// directory when no home is known.
fn default_cache_dir(home: Option<PathBuf>) -> PathBuf {
    home.filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_default()
        .join(".cache")
        .join("ponzi")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_follow_home_directory() {
        let config = ClientConfig::from_lookup(lookup(&[("HOME", "/home/trader")])).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/home/trader/.cache/ponzi"));
        assert_eq!(
            config.chart_snapshot_path(),
            PathBuf::from("/home/trader/.cache/ponzi/iex-chart-cache.bin")
        );
        assert_eq!(config.timezone, chrono_tz::America::New_York);
        assert_eq!(config.base_url, IEX_BASE_URL);
        assert_eq!(config.chart_cache, CacheMode::Persistent);
        assert_eq!(config.quote_cache, CacheMode::Memory);
        assert!(config.token.is_empty());
    }

    #[test]
    fn token_falls_back_to_legacy_variable() {
        let config = ClientConfig::from_lookup(lookup(&[("IEX_API_TOKEN", "pk_legacy")])).unwrap();
        assert_eq!(config.token, "pk_legacy");

        let config = ClientConfig::from_lookup(lookup(&[
            ("IEX_API_TOKEN", "pk_legacy"),
            ("PONZI_IEX_TOKEN", "pk_new"),
        ]))
        .unwrap();
        assert_eq!(config.token, "pk_new");
    }

    #[test]
    fn overrides_are_applied() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("PONZI_CACHE_DIR", "/tmp/ponzi"),
            ("PONZI_TIMEZONE", "Europe/London"),
            ("PONZI_IEX_BASE_URL", "http://127.0.0.1:9000/batch/"),
            ("PONZI_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/ponzi"));
        assert_eq!(config.timezone, chrono_tz::Europe::London);
        assert_eq!(config.base_url, "http://127.0.0.1:9000/batch");
        assert_eq!(config.timeout_ms, 2_500);
    }

    #[test]
    fn unknown_timezone_is_fatal() {
        let error = ClientConfig::from_lookup(lookup(&[("PONZI_TIMEZONE", "Nowhere/Special")]))
            .expect_err("must fail");
        assert!(matches!(error, ConfigError::UnknownTimezone(_)));
    }

    #[test]
    fn invalid_timeout_is_reported() {
        let error = ClientConfig::from_lookup(lookup(&[("PONZI_TIMEOUT_MS", "soon")]))
            .expect_err("must fail");
        assert!(matches!(
            error,
            ConfigError::InvalidValue {
                name: "PONZI_TIMEOUT_MS",
                ..
            }
        ));
    }
}
