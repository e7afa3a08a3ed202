//! Server configuration.
//!
//! Loading flow:
//! 1. Start with compiled [`ServerConfig::default()`]
//! 2. If a settings file is given, deep-merge its values over the defaults
//! 3. Apply `HUDDLE_*` environment variable overrides
//!
//! CLI flags are applied last by the binary.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default bind port.
pub const DEFAULT_PORT: u16 = 8666;

/// Configuration for the Huddle server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `8666`, `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent event streams.
    pub max_connections: usize,
    /// Interval between keep-alive comments on idle event streams.
    pub keep_alive_secs: u64,
    /// Frames buffered per event stream before the client is dropped.
    pub send_queue_capacity: usize,
    /// How long shutdown waits for in-flight requests.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            max_connections: 256,
            keep_alive_secs: 15,
            send_queue_capacity: 64,
            shutdown_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Keep-alive interval.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Shutdown grace period.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Load defaults, merge an optional settings file, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => load_from_path(path)?,
            None => Self::default(),
        };
        apply_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }
}

/// Load a JSON settings file deep-merged over defaults.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_from_path(path: &Path) -> Result<ServerConfig> {
    let defaults = serde_json::to_value(ServerConfig::default())?;
    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        if !user.is_object() {
            return Err(SettingsError::InvalidValue(
                "settings file must contain a JSON object".into(),
            ));
        }
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };
    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `HUDDLE_*` overrides read through `lookup`.
///
/// Out-of-range or unparsable values are logged and ignored.
pub fn apply_overrides<F>(config: &mut ServerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("HUDDLE_HOST").filter(|v| !v.trim().is_empty()) {
        config.host = v;
    }
    if let Some(v) = read_range(&lookup, "HUDDLE_PORT", 0u16, u16::MAX) {
        config.port = v;
    }
    if let Some(v) = read_range(&lookup, "HUDDLE_MAX_CONNECTIONS", 1usize, 100_000) {
        config.max_connections = v;
    }
    if let Some(v) = read_range(&lookup, "HUDDLE_KEEP_ALIVE_SECS", 1u64, 3600) {
        config.keep_alive_secs = v;
    }
    if let Some(v) = read_range(&lookup, "HUDDLE_SEND_QUEUE", 1usize, 65_536) {
        config.send_queue_capacity = v;
    }
    if let Some(v) = read_range(&lookup, "HUDDLE_SHUTDOWN_TIMEOUT_SECS", 0u64, 600) {
        config.shutdown_timeout_secs = v;
    }
}

/// Parse `val` and accept it only within `min..=max`.
pub fn parse_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_range<T, F>(lookup: &F, name: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
    F: Fn(&str) -> Option<String>,
{
    let val = lookup(name)?;
    let result = parse_range(&val, min, max);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
}
