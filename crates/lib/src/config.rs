//! Configuration types and loading.
//!
//! Config is loaded from a JSON file in the profile directory
//! (e.g. `~/.mhoro/config.json`) and environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Remote service settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Profile directory override (session id and username live here).
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,
}

/// Remote service endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Service endpoint. Overridden by MHORO_API_BASE env when set.
    #[serde(default = "default_api_base")]
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
        }
    }
}

fn default_api_base() -> String {
    "https://chat.mhoro.app/api.php".to_string()
}

/// Resolve the API base URL: env MHORO_API_BASE overrides config.
pub fn resolve_api_base(config: &Config) -> String {
    std::env::var("MHORO_API_BASE")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| config.api.base_url.trim().to_string())
}

/// Resolve the profile directory: config override or `~/.mhoro`.
pub fn resolve_profile_dir(config: &Config) -> PathBuf {
    config
        .profile_dir
        .clone()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(crate::profile::default_profile_dir)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MHORO_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| crate::profile::default_profile_dir().join("config.json"))
}

/// Load config from the default path (or MHORO_CONFIG_PATH). Missing file
/// => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Create the config directory and a default config file if missing.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}

/// Periods of the recurring tasks. Defaults match the service contract;
/// tests shrink them.
#[derive(Debug, Clone)]
pub struct Timings {
    /// Presence heartbeat period.
    pub heartbeat: Duration,
    /// Search-poll reschedule delay while the pool says "waiting".
    pub search_waiting: Duration,
    /// Search-poll reschedule delay after an error or unknown reply.
    pub search_backoff: Duration,
    /// Inbound message poll period.
    pub message_poll: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(30),
            search_waiting: Duration::from_millis(2000),
            search_backoff: Duration::from_millis(3000),
            message_poll: Duration::from_millis(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_api_base_is_filled_in() {
        let config: Config = serde_json::from_str("{}").expect("parse empty config");
        assert_eq!(config.api.base_url, default_api_base());
    }

    #[test]
    fn resolve_profile_dir_override() {
        let mut config = Config::default();
        config.profile_dir = Some(PathBuf::from("/tmp/mhoro-here"));
        assert_eq!(resolve_profile_dir(&config), PathBuf::from("/tmp/mhoro-here"));
    }

    #[test]
    fn resolve_profile_dir_ignores_empty_override() {
        let mut config = Config::default();
        config.profile_dir = Some(PathBuf::new());
        assert_eq!(
            resolve_profile_dir(&config),
            crate::profile::default_profile_dir()
        );
    }

    #[test]
    fn default_timings_match_the_service_contract() {
        let t = Timings::default();
        assert_eq!(t.heartbeat, Duration::from_secs(30));
        assert_eq!(t.search_waiting, Duration::from_millis(2000));
        assert_eq!(t.search_backoff, Duration::from_millis(3000));
        assert_eq!(t.message_poll, Duration::from_millis(1000));
    }
}
