//! Liveness — evict sessions that have gone quiet.
//!
//! A session is stale when `now - last_seen` is strictly greater than the
//! disconnect threshold. The sweep runs at the start of every request and
//! on a background ticker; both apply the same rule.

use std::time::{Duration, Instant};

use crate::registry::SharedRegistry;
use crate::session::{Session, SessionTable};

#[derive(Debug, Clone, Copy)]
pub struct LivenessMonitor {
    threshold: Duration,
}

impl LivenessMonitor {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn is_stale(&self, session: &Session, now: Instant) -> bool {
        session.age(now) > self.threshold
    }

    /// Remove every stale session from `table` and return them.
    pub fn sweep(&self, table: &mut SessionTable, now: Instant) -> Vec<Session> {
        table.drain_where(|s| self.is_stale(s, now))
    }
}

/// Sweep the registry every `period`.
///
/// Runs forever — cancel by dropping the task handle.
pub async fn expiry_loop(registry: SharedRegistry, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let evicted = registry.lock().await.sweep(Instant::now());
        if !evicted.is_empty() {
            tracing::debug!(removed = evicted.len(), "expired stale sessions");
        }
    }
}
