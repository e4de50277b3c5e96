//! Session table — the coordinator's live record of registered agents.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rollcall_core::Record;

use crate::dataset::Identity;

/// A registered agent, keyed by its token.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub display_name: String,
    pub owning_user: String,
    /// Registration time, unix milliseconds.
    pub created_at_ms: u64,
    /// Last contact. Drives eviction.
    pub last_seen: Instant,
    /// Payload from the most recent push.
    pub latest_payload: Vec<Record>,
    /// Extra form fields merged in from updates.
    pub attributes: BTreeMap<String, String>,
    /// Per-session overrides of the coordinator's default client paths.
    pub config_path: Option<String>,
    pub upload_path: Option<String>,
}

impl Session {
    pub fn new(token: String, display_name: String, owning_user: String, now: Instant) -> Self {
        Self {
            token,
            display_name,
            owning_user,
            created_at_ms: unix_millis(),
            last_seen: now,
            latest_payload: Vec::new(),
            attributes: BTreeMap::new(),
            config_path: None,
            upload_path: None,
        }
    }

    /// Time since last contact. Zero if `now` precedes `last_seen`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
    }

    pub fn identity(&self) -> Identity {
        Identity::new(&self.display_name, &self.owning_user)
    }

    /// Widest record in the latest payload.
    pub fn columns(&self) -> usize {
        self.latest_payload.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Live sessions keyed by token.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<String, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.sessions.contains_key(token)
    }

    pub fn get(&self, token: &str) -> Option<&Session> {
        self.sessions.get(token)
    }

    pub fn get_mut(&mut self, token: &str) -> Option<&mut Session> {
        self.sessions.get_mut(token)
    }

    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.token.clone(), session);
    }

    pub fn remove(&mut self, token: &str) -> Option<Session> {
        self.sessions.remove(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Sessions ordered by registration time, oldest first.
    pub fn ordered(&self) -> Vec<&Session> {
        let mut all: Vec<&Session> = self.sessions.values().collect();
        all.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.token.cmp(&b.token))
        });
        all
    }

    /// Remove every session for which `stale` holds and return them.
    pub fn drain_where<F>(&mut self, mut stale: F) -> Vec<Session>
    where
        F: FnMut(&Session) -> bool,
    {
        let tokens: Vec<String> = self
            .sessions
            .values()
            .filter(|s| stale(s))
            .map(|s| s.token.clone())
            .collect();
        tokens
            .iter()
            .filter_map(|t| self.sessions.remove(t))
            .collect()
    }
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
