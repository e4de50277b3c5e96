//! Tracked datasets — payload history that outlives sessions.
//!
//! A dataset is keyed by the (display name, user) identity, not by token,
//! so a client that is evicted and registers again under a new token picks
//! its history back up. At most one live session is attached at a time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rollcall_core::Record;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub user: String,
}

impl Identity {
    pub fn new(name: &str, user: &str) -> Self {
        Self {
            name: name.to_string(),
            user: user.to_string(),
        }
    }
}

/// One timestamped payload push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp_ms: u64,
    pub records: Vec<Record>,
}

/// Transferable form of a dataset. Snapshots are in ascending timestamp order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetExport {
    pub name: String,
    pub user: String,
    pub snapshots: Vec<Snapshot>,
}

#[derive(Debug, Clone)]
pub struct TrackedDataset {
    identity: Identity,
    /// Token of the live session feeding this dataset, if any.
    attached: Option<String>,
    attached_at_ms: u64,
    snapshots: BTreeMap<u64, Vec<Record>>,
}

impl TrackedDataset {
    pub fn new(identity: Identity, token: Option<String>, now_ms: u64) -> Self {
        Self {
            identity,
            attached: token,
            attached_at_ms: now_ms,
            snapshots: BTreeMap::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn attached(&self) -> Option<&str> {
        self.attached.as_deref()
    }

    pub fn attached_at_ms(&self) -> u64 {
        self.attached_at_ms
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Append a snapshot. History is append-only: a timestamp already in
    /// use is bumped to the next free millisecond. Returns the timestamp
    /// actually stored.
    pub fn append(&mut self, timestamp_ms: u64, records: Vec<Record>) -> u64 {
        let mut ts = timestamp_ms;
        while self.snapshots.contains_key(&ts) {
            ts += 1;
        }
        self.snapshots.insert(ts, records);
        ts
    }

    /// Snapshots in ascending timestamp order.
    pub fn snapshots(&self) -> impl Iterator<Item = (u64, &Vec<Record>)> {
        self.snapshots.iter().map(|(ts, r)| (*ts, r))
    }

    pub fn latest(&self) -> Option<&Vec<Record>> {
        self.snapshots.values().next_back()
    }

    pub fn export(&self) -> DatasetExport {
        DatasetExport {
            name: self.identity.name.clone(),
            user: self.identity.user.clone(),
            snapshots: self
                .snapshots
                .iter()
                .map(|(ts, records)| Snapshot {
                    timestamp_ms: *ts,
                    records: records.clone(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.export())
    }

    /// Rebuild a detached dataset from its transferable form. Input order
    /// does not matter.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let export: DatasetExport = serde_json::from_str(text)?;
        let mut dataset = Self::new(Identity::new(&export.name, &export.user), None, 0);
        for snap in export.snapshots {
            dataset.append(snap.timestamp_ms, snap.records);
        }
        Ok(dataset)
    }
}

/// What happened when a newly registered session looked for its history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reattach {
    NotTracked,
    Reattached,
    /// Another live session already feeds this dataset.
    AttachedElsewhere(String),
}

/// All tracked datasets, keyed by identity.
#[derive(Debug, Default)]
pub struct DatasetStore {
    datasets: BTreeMap<Identity, TrackedDataset>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn get(&self, identity: &Identity) -> Option<&TrackedDataset> {
        self.datasets.get(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedDataset> {
        self.datasets.values()
    }

    pub fn is_tracked(&self, identity: &Identity) -> bool {
        self.datasets.contains_key(identity)
    }

    /// Start tracking `identity`, attached to `token`. Returns false if
    /// the identity is already tracked.
    pub fn track(&mut self, identity: Identity, token: &str, now_ms: u64) -> bool {
        if self.datasets.contains_key(&identity) {
            return false;
        }
        let dataset = TrackedDataset::new(identity.clone(), Some(token.to_string()), now_ms);
        self.datasets.insert(identity, dataset);
        true
    }

    pub fn untrack(&mut self, identity: &Identity) -> Option<TrackedDataset> {
        self.datasets.remove(identity)
    }

    /// Attach `token` to the dataset for `identity` unless a live session
    /// (per `is_live`) already feeds it.
    pub fn reattach<F>(&mut self, identity: &Identity, token: &str, now_ms: u64, is_live: F) -> Reattach
    where
        F: Fn(&str) -> bool,
    {
        let Some(dataset) = self.datasets.get_mut(identity) else {
            return Reattach::NotTracked;
        };
        if let Some(current) = dataset.attached.as_deref() {
            if current != token && is_live(current) {
                return Reattach::AttachedElsewhere(current.to_string());
            }
        }
        dataset.attached = Some(token.to_string());
        dataset.attached_at_ms = now_ms;
        Reattach::Reattached
    }

    /// Clear any attachment to `token`. The dataset itself is kept.
    pub fn detach(&mut self, token: &str) {
        for dataset in self.datasets.values_mut() {
            if dataset.attached.as_deref() == Some(token) {
                dataset.attached = None;
            }
        }
    }

    pub fn attached_to(&self, token: &str) -> Option<&TrackedDataset> {
        self.datasets
            .values()
            .find(|d| d.attached.as_deref() == Some(token))
    }

    /// Append to the dataset fed by `token`, if any. Returns the stored
    /// timestamp.
    pub fn append_for(&mut self, token: &str, timestamp_ms: u64, records: &[Record]) -> Option<u64> {
        self.datasets
            .values_mut()
            .find(|d| d.attached.as_deref() == Some(token))
            .map(|d| d.append(timestamp_ms, records.to_vec()))
    }
}
