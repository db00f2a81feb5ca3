use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{CatalogError, Result};

pub const DEFAULT_BIND: &str = "0.0.0.0:23455";
pub const DEFAULT_SHORTDRAMA_BASE: &str = "https://api.sansekai.my.id/api";
pub const DEFAULT_DRAMABOS_BASE: &str = "https://dramabos.asia/api";
pub const DEFAULT_RELAYS: [&str; 2] = [
    "https://corsproxy.io/?{url}",
    "https://api.allorigins.win/raw?url={url}",
];

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
    pub debug_log_capacity: usize,
    /// Relay templates, tried in this order. `{url}` is replaced by the encoded target.
    pub relays: Vec<String>,
    pub shortdrama_base: String,
    pub dramabos_base: String,
    pub scroll_threshold_px: f64,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 23455)),
            request_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 1024,
            debug_log_capacity: 100,
            relays: DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect(),
            shortdrama_base: DEFAULT_SHORTDRAMA_BASE.to_string(),
            dramabos_base: DEFAULT_DRAMABOS_BASE.to_string(),
            scroll_threshold_px: 600.0,
            user_agent: "Mozilla/5.0".to_string(),
        }
    }
}

impl Config {
    /// Build from the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(raw) = lookup("REELFRONT_BIND") {
            config.bind = raw
                .trim()
                .parse()
                .map_err(|e| CatalogError::Config(format!("REELFRONT_BIND={raw}: {e}")))?;
        }
        if let Some(secs) = parse_number::<u64>(&lookup, "REELFRONT_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse_number::<u64>(&lookup, "REELFRONT_CACHE_TTL_SECS")? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(cap) = parse_number::<u64>(&lookup, "REELFRONT_CACHE_CAPACITY")? {
            config.cache_capacity = cap.max(1);
        }
        if let Some(cap) = parse_number::<usize>(&lookup, "REELFRONT_DEBUG_LOG_CAPACITY")? {
            config.debug_log_capacity = cap.max(1);
        }
        if let Some(px) = parse_number::<f64>(&lookup, "REELFRONT_SCROLL_THRESHOLD_PX")? {
            config.scroll_threshold_px = px.max(0.0);
        }
        if let Some(raw) = lookup("REELFRONT_RELAYS") {
            let relays: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if let Some(bad) = relays.iter().find(|r| !r.contains("{url}")) {
                return Err(CatalogError::Config(format!(
                    "relay template without {{url}} placeholder: {bad}"
                )));
            }
            config.relays = relays;
        }
        if let Some(base) = lookup("REELFRONT_SHORTDRAMA_BASE") {
            config.shortdrama_base = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(base) = lookup("REELFRONT_DRAMABOS_BASE") {
            config.dramabos_base = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(ua) = lookup("REELFRONT_USER_AGENT").filter(|s| !s.trim().is_empty()) {
            config.user_agent = ua;
        }

        Ok(config)
    }
}

fn parse_number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CatalogError::Config(format!("{key}={raw}: {e}"))),
    }
}
