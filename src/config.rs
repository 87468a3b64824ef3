//! Application configuration
//!
//! Values come from environment variables (optionally seeded from a `.env`
//! file by the binary via `dotenvy`). Anything missing or unparseable falls
//! back to a default.

use std::time::Duration;
use tracing::warn;

pub const DEFAULT_API_URL: &str = "http://localhost:4000";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_LOG_FILTER: &str = "cats_ssr=info,tower_http=debug";

/// Runtime configuration for the render server and the cat API client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Base URL prepended to relative cat API paths
    pub api_url: String,
    /// Port the render server listens on
    pub port: u16,
    /// Upper bound for an origin render pass waiting on its state
    pub render_timeout: Duration,
    /// tracing-subscriber filter directive
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            port: DEFAULT_PORT,
            render_timeout: Duration::from_millis(DEFAULT_RENDER_TIMEOUT_MS),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("CAT_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_url);

        let port = parse_or("PORT", lookup("PORT"), defaults.port);

        let render_timeout = Duration::from_millis(parse_or(
            "RENDER_TIMEOUT_MS",
            lookup("RENDER_TIMEOUT_MS"),
            DEFAULT_RENDER_TIMEOUT_MS,
        ));

        let log_filter = lookup("RUST_LOG").unwrap_or(defaults.log_filter);

        Self {
            api_url,
            port,
            render_timeout,
            log_filter,
        }
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %value, "Invalid value, using default");
            default
        }),
        None => default,
    }
}
