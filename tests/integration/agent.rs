use std::path::Path;
use std::time::Duration;

use rollcall_agent::{HostIdentity, StateStore, Step, UploadAgent};
use rollcall_core::config::{AgentConfig, IdentityConfig, LinkConfig};

use crate::*;

/// Agent config living entirely under `dir`, pushing on every step.
fn agent_config(dir: &Path) -> AgentConfig {
    AgentConfig {
        config_file: dir.join("config.toml").to_string_lossy().into_owned(),
        upload_file: dir.join("upload.csv").to_string_lossy().into_owned(),
        identity: IdentityConfig {
            name: Some("bench-3".to_string()),
            user: Some("lee".to_string()),
        },
        server: LinkConfig {
            timeout_ms: 1_000,
            upload_delay_ms: 0,
            ping_times: 3,
            ping_delay_ms: 10,
            heartbeat_interval_ms: 50,
            ..LinkConfig::default()
        },
        ..AgentConfig::default()
    }
}

/// Coordinator that tells agents to keep `config_file` where it is.
async fn coordinator_for(config: &AgentConfig, threshold_ms: u64) -> TestCoordinator {
    let mut server = ServerConfig::default();
    server.liveness.disconnect_threshold_ms = threshold_ms;
    server.client_paths.config_path = config.config_file.clone();
    TestCoordinator::start_with(server).await
}

fn start_agent(coordinator: &TestCoordinator, config: &AgentConfig) -> UploadAgent<HttpCoordinator> {
    let bootstrap = Path::new(&config.config_file).to_path_buf();
    let store = StateStore::new(bootstrap, config.config_file.clone());
    UploadAgent::new(
        coordinator.client(),
        coordinator.endpoint,
        HostIdentity::resolve(&config.identity),
        config,
        store,
    )
}

#[tokio::test]
async fn test_agent_registers_and_pushes_payload_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("upload.csv"), "t,21.5\nh,40\n").unwrap();
    let config = agent_config(dir.path());
    let coordinator = coordinator_for(&config, 10_000).await;

    let mut agent = start_agent(&coordinator, &config);
    agent.handshake().await.unwrap();
    let token = agent.token().unwrap().to_string();
    assert_eq!(token.len(), 32);

    assert_eq!(agent.step().await.unwrap(), Step::Pushed);

    let registry = coordinator.state.swept().await;
    let session = registry.sessions().get(&token).unwrap();
    assert_eq!(session.display_name, "bench-3");
    assert_eq!(session.owning_user, "lee");
    assert_eq!(
        session.latest_payload,
        vec![
            vec!["t".to_string(), "21.5".to_string()],
            vec!["h".to_string(), "40".to_string()],
        ]
    );
    assert_eq!(
        session.attributes.get("upload_file").map(String::as_str),
        Some(config.upload_file.as_str())
    );
    drop(registry);

    // The session was persisted for the next start.
    let saved: toml::Table =
        toml::from_str(&std::fs::read_to_string(dir.path().join("config.toml")).unwrap()).unwrap();
    assert_eq!(saved["id"].as_str(), Some(token.as_str()));
    assert_eq!(
        saved["last_ip"].as_str(),
        Some(coordinator.endpoint.to_string().as_str())
    );
}

#[tokio::test]
async fn test_agent_without_payload_file_only_heartbeats() {
    let dir = tempfile::tempdir().unwrap();
    let config = agent_config(dir.path());
    let coordinator = coordinator_for(&config, 10_000).await;

    let mut agent = start_agent(&coordinator, &config);
    agent.handshake().await.unwrap();
    assert_eq!(agent.step().await.unwrap(), Step::Skipped);

    let token = agent.token().unwrap().to_string();
    let registry = coordinator.state.swept().await;
    assert!(registry.sessions().get(&token).unwrap().latest_payload.is_empty());
}

#[tokio::test]
async fn test_evicted_agent_reauthenticates_with_new_token() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("upload.csv"), "x\n").unwrap();
    let config = agent_config(dir.path());
    let coordinator = coordinator_for(&config, 200).await;

    let mut agent = start_agent(&coordinator, &config);
    agent.handshake().await.unwrap();
    let first = agent.token().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(agent.step().await.unwrap(), Step::Reauthenticated);
    let second = agent.token().unwrap().to_string();
    assert_ne!(first, second);

    let registry = coordinator.state.swept().await;
    assert!(!registry.sessions().contains(&first));
    assert!(registry.sessions().contains(&second));
}
