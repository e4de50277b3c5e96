//! HTTP handlers — the agent protocol and the manager's JSON views.

pub mod agent;
pub mod manager;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use regex::Regex;
use tokio::sync::{Mutex, MutexGuard};

use rollcall_core::config::{ConfigError, ServerConfig};
use rollcall_services::registrar::compile;
use rollcall_services::{new_shared_registry, Registry, SharedRegistry};

#[derive(Clone)]
pub struct ApiState {
    pub registry: SharedRegistry,
    /// Matched against `User-Agent` on `/`.
    pub agent_pattern: Arc<Regex>,
    pub config: Arc<Mutex<ServerConfig>>,
    /// Where `POST /manager/paths` persists the config. `None` keeps
    /// changes in memory only.
    pub config_file: Option<PathBuf>,
}

impl ApiState {
    pub fn new(config: ServerConfig, config_file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let registry = Registry::from_config(&config)?;
        Ok(Self {
            registry: new_shared_registry(registry),
            agent_pattern: Arc::new(compile(&config.patterns.app_user_agent)?),
            config: Arc::new(Mutex::new(config)),
            config_file,
        })
    }

    /// Lock the registry and evict stale sessions before anything else
    /// looks at it.
    pub async fn swept(&self) -> MutexGuard<'_, Registry> {
        let mut registry = self.registry.lock().await;
        registry.sweep(Instant::now());
        registry
    }
}

// Re-export handler functions for use in router setup.
pub use agent::{handle_login, handle_login_page, handle_root, handle_update};
pub use manager::{
    handle_default_paths, handle_export, handle_overview, handle_session_inspect,
    handle_session_paths, handle_track_toggle,
};
