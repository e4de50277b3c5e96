//! Rollcall integration tests.
//!
//! Each test starts an in-process coordinator on 127.0.0.1 with an
//! ephemeral port and talks to it through the agent's real HTTP client.
//!
//!   cargo test --test integration

mod agent;
mod discovery;
mod handshake;
mod liveness;
mod manager;

use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::task::JoinHandle;

use rollcall_agent::{HttpCoordinator, LoginForm};
use rollcall_api::ApiState;
use rollcall_core::config::ServerConfig;
use rollcall_core::protocol::{LoginReply, SessionPaths};
use rollcall_core::Endpoint;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const TIMEOUT: Duration = Duration::from_secs(2);

/// A coordinator serving on loopback. Stops when dropped.
pub struct TestCoordinator {
    pub endpoint: Endpoint,
    pub state: ApiState,
    task: JoinHandle<anyhow::Result<()>>,
}

impl Drop for TestCoordinator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestCoordinator {
    pub async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    pub async fn with_threshold(threshold_ms: u64) -> Self {
        let mut config = ServerConfig::default();
        config.liveness.disconnect_threshold_ms = threshold_ms;
        Self::start_with(config).await
    }

    pub async fn start_with(config: ServerConfig) -> Self {
        let state = ApiState::new(config, None).expect("default patterns compile");
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();
        let task = tokio::spawn(rollcall_api::serve_listener(listener, state.clone()));
        Self {
            endpoint: Endpoint::new(Ipv4Addr::LOCALHOST, port),
            state,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.base_url(), path)
    }

    pub fn client(&self) -> HttpCoordinator {
        HttpCoordinator::new(self.endpoint, TIMEOUT).expect("build client")
    }

    /// Issue a token and register it. Returns the accepted paths.
    pub async fn register(&self, name: &str, user: &str) -> SessionPaths {
        use rollcall_agent::Coordinator;

        let client = self.client();
        let mut form = LoginForm {
            name: name.to_string(),
            user: user.to_string(),
            token: None,
        };
        let token = match client.login(&form).await.expect("issue") {
            LoginReply::Issued(token) => token,
            other => panic!("expected issued token, got {other:?}"),
        };
        form.token = Some(token);
        match client.login(&form).await.expect("register") {
            LoginReply::Accepted(paths) => paths,
            other => panic!("expected acceptance, got {other:?}"),
        }
    }
}

/// A client that does not follow redirects, like a browser inspecting `/`.
pub fn raw_client(user_agent: &str) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(TIMEOUT)
        .build()
        .expect("build raw client")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_coordinator_starts_empty() {
    let coordinator = TestCoordinator::start().await;
    let resp = raw_client("curl/8.0")
        .get(coordinator.url("/manager"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["sessions"].as_array().unwrap().len(), 0);
    assert_eq!(body["datasets"].as_array().unwrap().len(), 0);
}
