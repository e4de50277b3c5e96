//! Configuration for the coordinator and for agents.
//!
//! Coordinator resolution order: `--config` → $ROLLCALL_SERVER_CONFIG →
//! $XDG_CONFIG_HOME/rollcall/server.toml → ~/.config/rollcall/server.toml,
//! then ROLLCALL_* env overrides.
//!
//! Agents start from a bootstrap file (`--config` → $ROLLCALL_CONFIG →
//! ~/.rollcall/config.toml) whose `config_file` key names the effective
//! config file. The two may be the same file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::persist::{expand_home, home_dir};
use crate::protocol::AGENT_USER_AGENT_PATTERN;

// ── Coordinator ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub patterns: PatternConfig,
    pub liveness: LivenessConfig,
    pub client_paths: ClientPathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the HTTP server binds to.
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Matched against `User-Agent` to tell agents from browsers.
    pub app_user_agent: String,
    /// Acceptance pattern for agent display names.
    pub display_name: String,
    /// Acceptance pattern for agent user names.
    pub user_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Sessions silent for longer than this are evicted.
    pub disconnect_threshold_ms: u64,
    /// Background sweep period.
    pub sweep_interval_ms: u64,
}

/// Default paths handed to agents in login and update replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientPathsConfig {
    pub config_path: String,
    pub upload_path: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5001,
        }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            app_user_agent: AGENT_USER_AGENT_PATTERN.to_string(),
            display_name: ".*".to_string(),
            user_name: ".*".to_string(),
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            disconnect_threshold_ms: 4_000,
            sweep_interval_ms: 500,
        }
    }
}

impl Default for ClientPathsConfig {
    fn default() -> Self {
        Self {
            config_path: "~/.rollcall/config.toml".to_string(),
            upload_path: None,
        }
    }
}

impl LivenessConfig {
    pub fn disconnect_threshold(&self) -> Duration {
        Duration::from_millis(self.disconnect_threshold_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        // A zero period would make tokio::time::interval panic.
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl ServerConfig {
    /// Coordinator config path when no `--config` flag is given.
    pub fn file_path() -> PathBuf {
        std::env::var("ROLLCALL_SERVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("server.toml"))
    }

    /// Load from `path` (defaults if it does not exist), then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = if path.exists() {
            read_toml(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Write the default config to `path` if nothing is there yet.
    pub fn write_default_if_missing(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            Self::default().save_to(path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        write_toml(path, self)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ROLLCALL_NETWORK__BIND") {
            self.network.bind = v;
        }
        if let Ok(v) = std::env::var("ROLLCALL_NETWORK__PORT") {
            if let Ok(p) = v.parse() {
                self.network.port = p;
            }
        }
        if let Ok(v) = std::env::var("ROLLCALL_LIVENESS__DISCONNECT_THRESHOLD_MS") {
            if let Ok(ms) = v.parse() {
                self.liveness.disconnect_threshold_ms = ms;
            }
        }
    }
}

// ── Agent ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Effective config file. Rewritten when the coordinator relocates it.
    pub config_file: String,
    /// Payload file pushed on the upload cadence.
    pub upload_file: String,
    /// Coordinator address that answered last time.
    pub last_ip: Option<String>,
    /// Token from the last successful registration.
    pub id: Option<String>,
    pub identity: IdentityConfig,
    pub search: SearchConfig,
    pub server: LinkConfig,
}

/// Overrides for the identity reported to the coordinator.
/// Empty = derive from the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub name: Option<String>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Range specs, e.g. "192.168.1.*" or "10.0.{0,3}.1".
    pub ips: Vec<String>,
    /// Per-probe timeout.
    pub timeout_ms: u64,
    /// Concurrent probe workers.
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub port: u16,
    /// Per-request timeout for login and update calls.
    pub timeout_ms: u64,
    /// Payload push cadence.
    pub upload_delay_ms: u64,
    /// Attempts per request before giving up.
    pub ping_times: u32,
    /// Sleep between failed attempts.
    pub ping_delay_ms: u64,
    /// Sleep between reporting iterations. Keep below the coordinator's
    /// disconnect threshold.
    pub heartbeat_interval_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            config_file: "~/.rollcall/config.toml".to_string(),
            upload_file: "~/.rollcall/upload.csv".to_string(),
            last_ip: None,
            id: None,
            identity: IdentityConfig::default(),
            search: SearchConfig::default(),
            server: LinkConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            ips: vec!["192.168.*.*".to_string()],
            timeout_ms: 1_000,
            threads: 10,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: 5001,
            timeout_ms: 1_000,
            upload_delay_ms: 500,
            ping_times: 40,
            ping_delay_ms: 1_000,
            heartbeat_interval_ms: 1_000,
        }
    }
}

/// Attempt budget for one network operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl LinkConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.timeout_ms),
            max_attempts: self.ping_times.max(1),
            retry_delay: Duration::from_millis(self.ping_delay_ms),
        }
    }

    pub fn upload_delay(&self) -> Duration {
        Duration::from_millis(self.upload_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

impl SearchConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AgentConfig {
    /// Bootstrap file path when no `--config` flag is given.
    pub fn bootstrap_path() -> PathBuf {
        std::env::var("ROLLCALL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join(".rollcall").join("config.toml"))
    }

    /// Load agent config through the bootstrap file.
    ///
    /// A missing bootstrap is created with defaults pointing at itself. A
    /// bootstrap pointing at a missing file seeds that file from the
    /// bootstrap's own contents.
    pub fn load(bootstrap: &Path) -> Result<Self, ConfigError> {
        if !bootstrap.exists() {
            let config = Self {
                config_file: bootstrap.to_string_lossy().into_owned(),
                ..Self::default()
            };
            write_toml(bootstrap, &config)?;
            return Ok(config);
        }

        let pointer: Self = read_toml(bootstrap)?;
        let target = expand_home(&pointer.config_file);
        if target == bootstrap {
            return Ok(pointer);
        }
        if !target.exists() {
            write_toml(&target, &pointer)?;
            return Ok(pointer);
        }
        read_toml(&target)
    }

    /// Effective config file with `~` expanded.
    pub fn config_path(&self) -> PathBuf {
        expand_home(&self.config_file)
    }

    pub fn upload_path(&self) -> PathBuf {
        expand_home(&self.upload_file)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("rollcall")
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
    }
    let text = toml::to_string_pretty(value).map_err(ConfigError::SerializeFailed)?;
    std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid pattern {0:?}: {1}")]
    BadPattern(String, String),
}
