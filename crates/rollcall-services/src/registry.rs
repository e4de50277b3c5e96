//! Registry — the coordinator's single mutable aggregate.
//!
//! Sessions, tracked datasets and default client paths live together
//! behind one async mutex. Every mutation (registration, update, eviction,
//! dataset append) takes that lock, so a duplicate-token check and its
//! insert, or a stale check and its eviction, can never interleave with
//! another request.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use rollcall_core::config::{ClientPathsConfig, ConfigError, ServerConfig};
use rollcall_core::{Record, RegisterOutcome};

use crate::dataset::{DatasetStore, Reattach, TrackedDataset};
use crate::liveness::LivenessMonitor;
use crate::registrar::RegistrarPolicy;
use crate::session::{unix_millis, Session, SessionTable};

pub type SharedRegistry = Arc<Mutex<Registry>>;

pub fn new_shared_registry(registry: Registry) -> SharedRegistry {
    Arc::new(Mutex::new(registry))
}

/// Result of an `/app_update` against the live table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Accepted {
        config: String,
        upload: Option<String>,
    },
    Unauthenticated,
}

/// Result of toggling tracking from one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackToggle {
    Started,
    Stopped,
    /// The identity's dataset is fed by this other live session.
    HeldBy(String),
}

/// Fields carried by one update besides the token.
#[derive(Debug, Clone, Default)]
pub struct UpdateFields {
    pub attributes: BTreeMap<String, String>,
    pub data: Option<Vec<Record>>,
}

#[derive(Debug)]
pub struct Registry {
    policy: RegistrarPolicy,
    monitor: LivenessMonitor,
    sessions: SessionTable,
    datasets: DatasetStore,
    defaults: ClientPathsConfig,
}

impl Registry {
    pub fn new(policy: RegistrarPolicy, monitor: LivenessMonitor, defaults: ClientPathsConfig) -> Self {
        Self {
            policy,
            monitor,
            sessions: SessionTable::new(),
            datasets: DatasetStore::new(),
            defaults,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            RegistrarPolicy::from_config(&config.patterns)?,
            LivenessMonitor::new(config.liveness.disconnect_threshold()),
            config.client_paths.clone(),
        ))
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn datasets(&self) -> &DatasetStore {
        &self.datasets
    }

    pub fn monitor(&self) -> &LivenessMonitor {
        &self.monitor
    }

    pub fn defaults(&self) -> &ClientPathsConfig {
        &self.defaults
    }

    pub fn issue_token(&self, display_name: &str, user: &str) -> String {
        self.policy.issue_token(display_name, user)
    }

    // ── Registration ──────────────────────────────────────────────────────────

    pub fn register(
        &mut self,
        token: &str,
        display_name: &str,
        user: &str,
        now: Instant,
    ) -> RegisterOutcome {
        let outcome = self.policy.check(&self.sessions, token, display_name, user);
        if !outcome.is_accepted() {
            tracing::info!(
                name = display_name,
                user,
                code = outcome.code(),
                reason = outcome.reason(),
                "registration rejected"
            );
            return outcome;
        }

        let session = Session::new(token.to_string(), display_name.to_string(), user.to_string(), now);
        let identity = session.identity();
        let sessions = &self.sessions;
        match self
            .datasets
            .reattach(&identity, token, unix_millis(), |t| sessions.contains(t))
        {
            Reattach::Reattached => {
                tracing::info!(token, name = display_name, user, "session reattached to tracked dataset");
            }
            Reattach::AttachedElsewhere(other) => {
                tracing::warn!(
                    token,
                    other = %other,
                    name = display_name,
                    user,
                    "identity already feeds a dataset from another live session; not attaching"
                );
            }
            Reattach::NotTracked => {}
        }
        self.sessions.insert(session);
        tracing::info!(token, name = display_name, user, live = self.sessions.len(), "session registered");
        outcome
    }

    // ── Updates ───────────────────────────────────────────────────────────────

    pub fn update(&mut self, token: &str, fields: UpdateFields, now: Instant) -> UpdateOutcome {
        let Some(session) = self.sessions.get_mut(token) else {
            return UpdateOutcome::Unauthenticated;
        };
        session.touch(now);
        session.attributes.extend(fields.attributes);

        if let Some(records) = fields.data {
            if let Some(ts) = self.datasets.append_for(token, unix_millis(), &records) {
                tracing::debug!(token, timestamp_ms = ts, records = records.len(), "snapshot appended");
            }
            session.latest_payload = records;
        }

        let (config, upload) = resolve_paths(session, &self.defaults);
        UpdateOutcome::Accepted { config, upload }
    }

    /// Config and upload paths this session should be told about.
    pub fn paths(&self, token: &str) -> Option<(String, Option<String>)> {
        self.sessions
            .get(token)
            .map(|s| resolve_paths(s, &self.defaults))
    }

    // ── Liveness ──────────────────────────────────────────────────────────────

    /// Evict stale sessions. Their datasets are detached, never dropped.
    pub fn sweep(&mut self, now: Instant) -> Vec<Session> {
        let evicted = self.monitor.sweep(&mut self.sessions, now);
        for session in &evicted {
            self.datasets.detach(&session.token);
            tracing::info!(
                token = %session.token,
                name = %session.display_name,
                user = %session.owning_user,
                "session evicted"
            );
        }
        evicted
    }

    // ── Administration ────────────────────────────────────────────────────────

    /// Set per-session path overrides. `None` leaves a field unchanged.
    /// Returns false if the session is not live.
    pub fn set_session_paths(
        &mut self,
        token: &str,
        config_path: Option<String>,
        upload_path: Option<String>,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(token) else {
            return false;
        };
        if config_path.is_some() {
            session.config_path = config_path;
        }
        if upload_path.is_some() {
            session.upload_path = upload_path;
        }
        true
    }

    pub fn set_default_paths(&mut self, defaults: ClientPathsConfig) {
        self.defaults = defaults;
    }

    /// Start or stop tracking the identity behind `token`. `None` if the
    /// session is not live.
    ///
    /// Only the session feeding a dataset can stop it. A session whose
    /// identity is tracked through another live session gets
    /// [`TrackToggle::HeldBy`] and nothing changes.
    pub fn toggle_tracking(&mut self, token: &str) -> Option<TrackToggle> {
        let identity = self.sessions.get(token)?.identity();
        if self.datasets.attached_to(token).is_some() {
            self.datasets.untrack(&identity);
            tracing::info!(name = %identity.name, user = %identity.user, "tracking stopped");
            return Some(TrackToggle::Stopped);
        }
        if !self.datasets.is_tracked(&identity) {
            self.datasets.track(identity.clone(), token, unix_millis());
            tracing::info!(token, name = %identity.name, user = %identity.user, "tracking started");
            return Some(TrackToggle::Started);
        }
        let sessions = &self.sessions;
        match self
            .datasets
            .reattach(&identity, token, unix_millis(), |t| sessions.contains(t))
        {
            Reattach::AttachedElsewhere(other) => {
                tracing::warn!(token, other = %other, "dataset is fed by another live session; not toggling");
                Some(TrackToggle::HeldBy(other))
            }
            Reattach::Reattached | Reattach::NotTracked => {
                tracing::info!(token, name = %identity.name, user = %identity.user, "tracking resumed");
                Some(TrackToggle::Started)
            }
        }
    }

    /// Dataset currently fed by `token`.
    pub fn dataset_for(&self, token: &str) -> Option<&TrackedDataset> {
        self.datasets.attached_to(token)
    }
}

fn resolve_paths(session: &Session, defaults: &ClientPathsConfig) -> (String, Option<String>) {
    let config = session
        .config_path
        .clone()
        .unwrap_or_else(|| defaults.config_path.clone());
    let upload = session
        .upload_path
        .clone()
        .or_else(|| defaults.upload_path.clone());
    (config, upload)
}
