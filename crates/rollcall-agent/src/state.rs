//! Persisted client state.
//!
//! The agent remembers its token and the coordinator that answered, and
//! follows the coordinator's instructions to relocate its config or payload
//! file. Every write is merged into the existing file.

use std::path::{Path, PathBuf};

use rollcall_core::config::ConfigError;
use rollcall_core::persist::{expand_home, merge_into_file, same_path, string_table};

#[derive(Debug, Clone)]
pub struct StateStore {
    /// File that holds the `config_file` pointer.
    bootstrap: PathBuf,
    /// Effective config file, as written by the user (may contain `~`).
    config_file: String,
}

impl StateStore {
    pub fn new(bootstrap: PathBuf, config_file: String) -> Self {
        Self {
            bootstrap,
            config_file,
        }
    }

    pub fn bootstrap(&self) -> &Path {
        &self.bootstrap
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    pub fn config_path(&self) -> PathBuf {
        expand_home(&self.config_file)
    }

    /// Record the registered token and coordinator address.
    pub fn save_session(&self, id: &str, last_ip: &str) -> Result<(), ConfigError> {
        merge_into_file(
            &self.config_path(),
            &string_table([("id", id), ("last_ip", last_ip)]),
        )
    }

    /// Move to `new_config` if it names a different file: seed it with the
    /// session and point the bootstrap at it. Returns true if it moved.
    pub fn relocate(&mut self, new_config: &str, id: &str, last_ip: &str) -> Result<bool, ConfigError> {
        if same_path(new_config, &self.config_file) {
            return Ok(false);
        }
        self.config_file = new_config.to_string();
        self.save_session(id, last_ip)?;
        merge_into_file(
            &self.bootstrap,
            &string_table([("config_file", new_config)]),
        )?;
        tracing::info!(config_file = new_config, "config file relocated");
        Ok(true)
    }

    pub fn save_upload_file(&self, upload_file: &str) -> Result<(), ConfigError> {
        merge_into_file(
            &self.config_path(),
            &string_table([("upload_file", upload_file)]),
        )
    }
}
