use std::net::Ipv4Addr;
use std::sync::Arc;

use axum::routing::get;
use rollcall_agent::{locate, scan, HttpProbe, Located, Probe, Quiet};
use rollcall_core::config::SearchConfig;
use rollcall_core::endpoint::endpoints;
use rollcall_core::protocol::user_agent;
use rollcall_core::Endpoint;

use crate::*;

/// A plain web server that is not a coordinator.
async fn start_decoy() -> (Endpoint, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = axum::Router::new().route("/", get(|| async { "hello" }));
    let task = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (Endpoint::new(Ipv4Addr::LOCALHOST, port), task)
}

#[tokio::test]
async fn test_probe_positive_for_coordinator() {
    let coordinator = TestCoordinator::start().await;
    let probe = HttpProbe::new(TIMEOUT).unwrap();
    assert!(probe.probe(coordinator.endpoint).await);
}

#[tokio::test]
async fn test_probe_negative_for_closed_port() {
    let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let probe = HttpProbe::new(TIMEOUT).unwrap();
    assert!(!probe.probe(Endpoint::new(Ipv4Addr::LOCALHOST, port)).await);
}

#[tokio::test]
async fn test_probe_negative_for_other_http_server() {
    let (decoy, task) = start_decoy().await;
    let probe = HttpProbe::new(TIMEOUT).unwrap();
    assert!(!probe.probe(decoy).await);
    task.abort();
}

#[tokio::test]
async fn test_root_redirects_by_user_agent() {
    let coordinator = TestCoordinator::start().await;

    let agent = raw_client(&user_agent("1.2.3"))
        .get(coordinator.url("/"))
        .send()
        .await
        .unwrap();
    assert_eq!(agent.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(agent.headers()["location"], "/app_login");

    let browser = raw_client("Mozilla/5.0")
        .get(coordinator.url("/"))
        .send()
        .await
        .unwrap();
    assert_eq!(browser.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(browser.headers()["location"], "/manager");
}

#[tokio::test]
async fn test_loopback_scan_finds_only_the_coordinator() {
    let coordinator = TestCoordinator::start().await;
    let port = coordinator.endpoint.port;
    let candidates = endpoints(&["127.0.0.{1,4}"], port).unwrap();
    assert_eq!(candidates.len(), 4);

    let probe = Arc::new(HttpProbe::new(TIMEOUT).unwrap());
    let found = scan(&candidates, probe, 3, &Quiet).await;
    assert_eq!(found, vec![coordinator.endpoint]);
}

#[tokio::test]
async fn test_locate_prefers_cached_address() {
    let coordinator = TestCoordinator::start().await;
    let search = SearchConfig {
        // Would be refused; the cached address must win before it is tried.
        ips: vec!["127.0.0.{2,3}".to_string()],
        timeout_ms: 500,
        threads: 2,
    };
    let probe = Arc::new(HttpProbe::new(TIMEOUT).unwrap());
    let cached = coordinator.endpoint.to_string();
    let located = locate(probe, &search, coordinator.endpoint.port, Some(&cached), &Quiet)
        .await
        .unwrap();
    assert_eq!(located, Located::Cached(coordinator.endpoint));
}
