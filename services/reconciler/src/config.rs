//! Configuration
//!
//! Plain structs with defaults, overridable from `LEADERBOARD_*`
//! environment variables.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::feed::DEFAULT_FEED_CAPACITY;

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co/`
    pub url: String,
    /// Public anon key sent as `apikey` on every request
    pub anon_key: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Buffered changes per feed subscriber before it lags
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

fn default_timeout() -> u64 {
    30
}

fn default_feed_capacity() -> usize {
    DEFAULT_FEED_CAPACITY
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:54321/".to_string(),
            anon_key: String::new(),
            timeout_secs: default_timeout(),
            feed_capacity: default_feed_capacity(),
        }
    }
}

impl BackendConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var("LEADERBOARD_URL").map(with_trailing_slash).unwrap_or(defaults.url),
            anon_key: env::var("LEADERBOARD_ANON_KEY").unwrap_or_default(),
            timeout_secs: parse_var("LEADERBOARD_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            feed_capacity: parse_var("LEADERBOARD_FEED_CAPACITY").unwrap_or(defaults.feed_capacity),
        }
    }
}

/// Reconciler behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Skip change-feed inserts whose id is already held locally.
    pub dedup_events: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self { dedup_events: true }
    }
}

impl ReconcilerConfig {
    pub fn from_env() -> Self {
        Self {
            dedup_events: env::var("LEADERBOARD_DEDUP_EVENTS")
                .map(|s| parse_bool(&s))
                .unwrap_or(true),
        }
    }
}

/// Notification bus settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Maximum notifications shown at once; the oldest is dropped on overflow.
    pub capacity: usize,
    /// How long each notification stays active.
    pub ttl: Duration,
    /// Pending publishes buffered before new ones are dropped.
    pub queue_depth: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            ttl: Duration::from_millis(3_000),
            queue_depth: 32,
        }
    }
}

impl NotifyConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: parse_var("LEADERBOARD_NOTIFY_CAPACITY").unwrap_or(defaults.capacity),
            ttl: parse_var("LEADERBOARD_NOTIFY_TTL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.ttl),
            queue_depth: defaults.queue_depth,
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub reconciler: ReconcilerConfig,
    pub notify: NotifyConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            backend: BackendConfig::from_env(),
            reconciler: ReconcilerConfig::from_env(),
            notify: NotifyConfig::from_env(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn parse_bool(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Relative joins drop the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}
