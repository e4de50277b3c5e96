//! DiscoveryScanner — probe a candidate list concurrently.
//!
//! Candidates are dealt round-robin to `workers` tasks; candidate `i` goes
//! to worker `i % workers`. Each worker probes its group in order and
//! records hits by input index, so the result is the input filtered to
//! positives, independent of completion order. Every candidate is probed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rollcall_core::Endpoint;

use crate::transport::Probe;

/// Progress updates are emitted at least this often while probes run.
pub const PROGRESS_PERIOD: Duration = Duration::from_millis(300);

pub trait ScanObserver: Send + Sync {
    fn progress(&self, done: usize, total: usize);
}

/// Observer that discards progress.
pub struct Quiet;

impl ScanObserver for Quiet {
    fn progress(&self, _done: usize, _total: usize) {}
}

pub async fn scan<P>(
    candidates: &[Endpoint],
    probe: Arc<P>,
    workers: usize,
    observer: &dyn ScanObserver,
) -> Vec<Endpoint>
where
    P: Probe + 'static,
{
    let total = candidates.len();
    if total == 0 {
        observer.progress(0, 0);
        return Vec::new();
    }
    let workers = workers.clamp(1, total);
    let done = Arc::new(AtomicUsize::new(0));

    let mut groups: Vec<Vec<(usize, Endpoint)>> = vec![Vec::new(); workers];
    for (idx, endpoint) in candidates.iter().enumerate() {
        groups[idx % workers].push((idx, *endpoint));
    }

    let tasks = groups.into_iter().map(|group| {
        let probe = probe.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut hits = Vec::new();
            for (idx, endpoint) in group {
                if probe.probe(endpoint).await {
                    hits.push(idx);
                }
                done.fetch_add(1, Ordering::Relaxed);
            }
            hits
        })
    });
    let all = futures::future::join_all(tasks);
    tokio::pin!(all);

    let mut ticker = tokio::time::interval(PROGRESS_PERIOD);
    let results = loop {
        tokio::select! {
            results = &mut all => break results,
            _ = ticker.tick() => observer.progress(done.load(Ordering::Relaxed), total),
        }
    };
    observer.progress(done.load(Ordering::Relaxed), total);

    let mut positive = vec![false; total];
    for result in results {
        match result {
            Ok(hits) => {
                for idx in hits {
                    positive[idx] = true;
                }
            }
            Err(e) => tracing::warn!(error = %e, "probe worker failed"),
        }
    }

    let found: Vec<Endpoint> = candidates
        .iter()
        .zip(positive)
        .filter_map(|(endpoint, hit)| hit.then_some(*endpoint))
        .collect();
    tracing::info!(probed = total, found = found.len(), "scan finished");
    found
}
