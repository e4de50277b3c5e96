//! Find the coordinator: explicit address, cached address, or full scan.

use std::sync::Arc;

use rollcall_core::config::SearchConfig;
use rollcall_core::endpoint::endpoints;
use rollcall_core::Endpoint;

use crate::error::AgentError;
use crate::scanner::{scan, ScanObserver};
use crate::transport::Probe;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// The last known address still answers; no scan ran.
    Cached(Endpoint),
    /// Exactly one coordinator answered the scan.
    Scanned(Endpoint),
    /// Several answered. The caller picks one.
    Ambiguous(Vec<Endpoint>),
}

/// Use `text` (`ip` or `ip:port`) as the coordinator, provided it probes
/// positive.
pub async fn confirm<P: Probe>(probe: &P, text: &str, default_port: u16) -> Result<Endpoint, AgentError> {
    let endpoint = Endpoint::parse(text, default_port)?;
    if probe.probe(endpoint).await {
        Ok(endpoint)
    } else {
        Err(AgentError::NotACoordinator(endpoint.to_string()))
    }
}

/// Try `last_ip` first; scan the configured ranges only if it does not
/// answer. Zero matches is [`AgentError::NoServerFound`].
pub async fn locate<P>(
    probe: Arc<P>,
    search: &SearchConfig,
    port: u16,
    last_ip: Option<&str>,
    observer: &dyn ScanObserver,
) -> Result<Located, AgentError>
where
    P: Probe + 'static,
{
    if let Some(cached) = last_ip.filter(|ip| !ip.is_empty()) {
        match Endpoint::parse(cached, port) {
            Ok(endpoint) if probe.probe(endpoint).await => {
                tracing::info!(%endpoint, "cached coordinator still answers");
                return Ok(Located::Cached(endpoint));
            }
            Ok(endpoint) => tracing::info!(%endpoint, "cached coordinator silent; scanning"),
            Err(e) => tracing::warn!(last_ip = cached, error = %e, "ignoring unparseable last_ip"),
        }
    }

    let candidates = endpoints(&search.ips, port)?;
    tracing::info!(
        candidates = candidates.len(),
        workers = search.threads,
        "scanning for coordinator"
    );
    let mut found = scan(&candidates, probe, search.threads, observer).await;
    match found.len() {
        0 => Err(AgentError::NoServerFound),
        1 => Ok(Located::Scanned(found.remove(0))),
        _ => Ok(Located::Ambiguous(found)),
    }
}
