// SPDX-License-Identifier: MIT
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::error;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_SUGGEST_URL: &str = "https://api.groq.com/v1/completions";
const DEFAULT_CHUNK_SIZE: usize = 20_000;
const DEFAULT_REQUESTS_PER_MINUTE: u64 = 25;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_SECS: f64 = 1.0;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FILES_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
const DEFAULT_DOCS_BASE_URL: &str = "https://docs.googleapis.com/v1";

// ─── SuggestSection ──────────────────────────────────────────────────────────

/// Suggestion service configuration (`[suggest]` in config.toml).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuggestSection {
    /// Suggestion service endpoint.
    pub api_url: String,
    /// Bearer key for the suggestion service (REDLINE_API_KEY env var wins).
    pub api_key: Option<String>,
    /// Max chars per outbound request; longer text fans out into chunks.
    pub chunk_size: usize,
    /// Requests allowed in any trailing 60-second window.
    pub requests_per_minute: u64,
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt, in seconds; doubles each retry.
    pub backoff_secs: f64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SuggestSection {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_SUGGEST_URL.to_string(),
            api_key: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_secs: DEFAULT_BACKOFF_SECS,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

// ─── StoreSection ────────────────────────────────────────────────────────────

/// Document store configuration (`[store]` in config.toml).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Files/metadata/comments API base URL.
    pub files_base_url: String,
    /// Structured document body API base URL.
    pub docs_base_url: String,
    /// Bearer access token (REDLINE_STORE_TOKEN env var wins). Acquisition
    /// is outside this program.
    pub access_token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            files_base_url: DEFAULT_FILES_BASE_URL.to_string(),
            docs_base_url: DEFAULT_DOCS_BASE_URL.to_string(),
            access_token: None,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

// ─── TOML config file ────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Seconds between poll cycles (default: 60).
    poll_interval_secs: Option<u64>,
    /// Log level filter string, e.g. "debug", "info,redline=trace".
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json".
    log_format: Option<String>,
    /// Suggestion service configuration (`[suggest]`).
    suggest: Option<SuggestSection>,
    /// Document store configuration (`[store]`).
    store: Option<StoreSection>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── ReviewerConfig ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReviewerConfig {
    pub data_dir: PathBuf,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Time between poll cycles.
    pub poll_interval: Duration,
    pub suggest: SuggestSection,
    pub store: StoreSection,
}

impl ReviewerConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        data_dir: Option<PathBuf>,
        log: Option<String>,
        poll_interval_secs: Option<u64>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let toml = load_toml(&data_dir).unwrap_or_default();

        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());
        let log_format = std::env::var("REDLINE_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());
        let poll_interval_secs = poll_interval_secs
            .or(toml.poll_interval_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let mut suggest = toml.suggest.unwrap_or_default();
        if let Some(key) = std::env::var("REDLINE_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
        {
            suggest.api_key = Some(key);
        }
        suggest.max_attempts = suggest.max_attempts.max(1);
        if suggest.backoff_secs <= 0.0 {
            suggest.backoff_secs = DEFAULT_BACKOFF_SECS;
        }

        let mut store = toml.store.unwrap_or_default();
        if let Some(token) = std::env::var("REDLINE_STORE_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
        {
            store.access_token = Some(token);
        }

        Self {
            data_dir,
            log,
            log_format,
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            suggest,
            store,
        }
    }

    pub fn suggest_timeout(&self) -> Duration {
        Duration::from_secs(self.suggest.timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.suggest.backoff_secs)
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("redline");
        }
    }
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("redline");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("redline");
        }
    }
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("redline");
        }
    }
    PathBuf::from(".redline")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ReviewerConfig::new(Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
        assert_eq!(cfg.suggest.chunk_size, 20_000);
        assert_eq!(cfg.suggest.requests_per_minute, 25);
        assert_eq!(cfg.log, "info");
    }

    #[test]
    fn toml_overrides_defaults_and_cli_overrides_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
poll_interval_secs = 120
log = "debug"

[suggest]
chunk_size = 500
requests_per_minute = 5
"#,
        )
        .unwrap();
        let cfg = ReviewerConfig::new(Some(dir.path().to_path_buf()), None, Some(15));
        assert_eq!(cfg.poll_interval, Duration::from_secs(15));
        assert_eq!(cfg.log, "debug");
        assert_eq!(cfg.suggest.chunk_size, 500);
        assert_eq!(cfg.suggest.requests_per_minute, 5);
    }

    #[test]
    fn invalid_retry_settings_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
[suggest]
max_attempts = 0
backoff_secs = -2.0
"#,
        )
        .unwrap();
        let cfg = ReviewerConfig::new(Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.suggest.max_attempts, 1);
        assert!(cfg.suggest.backoff_secs > 0.0);
    }
}
