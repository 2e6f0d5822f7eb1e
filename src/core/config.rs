use std::env;

use serde::Deserialize;

use crate::core::types::{GlobalConfig, Site};

// ---------------------------------------------------------------------------
// Settings — env-var driven process configuration
// ---------------------------------------------------------------------------

/// Process-level settings. Every field reads its env var once at startup and
/// falls back to a default suitable for local runs.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Host reserved for the admin surface; proxy traffic on it is refused.
    pub admin_host: String,
    /// Key for session-cookie HMAC signing. At least 32 bytes recommended.
    pub secret_key: String,
    pub rate_limit_requests: usize,
    pub rate_limit_window: u64,
    pub enable_rate_limiting: bool,
    /// Response size cap for non-media content, in megabytes.
    pub max_response_size_mb: u64,
    /// Upstream request timeout, in seconds.
    pub request_timeout: u64,
    /// Upstream connect timeout, in seconds.
    pub connect_timeout: u64,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            admin_host: env_string("ADMIN_HOST", "0.0.0.0"),
            secret_key: env_string(
                "SECRET_KEY",
                "change-me-in-production-0123456789abcdef",
            ),
            rate_limit_requests: env_parse("RATE_LIMIT_REQUESTS", 60),
            rate_limit_window: env_parse("RATE_LIMIT_WINDOW", 60),
            enable_rate_limiting: env_bool("ENABLE_RATE_LIMITING", true),
            max_response_size_mb: env_parse("MAX_RESPONSE_SIZE_MB", 15),
            request_timeout: env_parse("REQUEST_TIMEOUT", 15),
            connect_timeout: env_parse("HTTP_CONNECT_TIMEOUT_SECS", 10),
        }
    }

    pub fn max_response_size_bytes(&self) -> u64 {
        self.max_response_size_mb * 1024 * 1024
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    let Ok(v) = env::var(key) else {
        return default;
    };
    let v = v.trim().to_ascii_lowercase();
    if v.is_empty() {
        return default;
    }
    !matches!(v.as_str(), "0" | "false" | "no" | "off" | "disabled")
}

// ---------------------------------------------------------------------------
// MirrorConfig — file-based site/global config loader (mirrorgate.json)
// ---------------------------------------------------------------------------

/// Top-level shape of `mirrorgate.json`: the sites to serve plus optional
/// global-default overrides. This file is how operators populate the
/// in-memory site registry; a database-backed admin surface would feed the
/// same registry interface instead.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub global: GlobalConfig,
}

/// Load `mirrorgate.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `MIRRORGATE_CONFIG` env var path
/// 2. `./mirrorgate.json`
/// 3. `../mirrorgate.json`
///
/// Missing file → `MirrorConfig::default()` (no sites, default globals).
/// Parse error → log a warning, return defaults.
pub fn load_mirror_config() -> MirrorConfig {
    let candidates: Vec<std::path::PathBuf> = {
        let mut v = vec![
            std::path::PathBuf::from("mirrorgate.json"),
            std::path::PathBuf::from("../mirrorgate.json"),
        ];
        if let Ok(env_path) = env::var("MIRRORGATE_CONFIG") {
            v.insert(0, std::path::PathBuf::from(env_path));
        }
        v
    };

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<MirrorConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!(
                        "mirrorgate.json loaded from {} ({} sites)",
                        path.display(),
                        cfg.sites.len()
                    );
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "mirrorgate.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    return MirrorConfig::default();
                }
            },
            Err(_) => continue, // not at this path — try next
        }
    }

    MirrorConfig::default()
}
