use rollcall_agent::{Coordinator, LoginForm, UpdateForm};
use rollcall_core::protocol::{LoginReply, UpdateReply};
use rollcall_core::RegisterOutcome;

use crate::*;

fn form(token: Option<&str>) -> LoginForm {
    LoginForm {
        name: "lab-1".into(),
        user: "amy".into(),
        token: token.map(str::to_string),
    }
}

#[tokio::test]
async fn test_issue_then_register() {
    let coordinator = TestCoordinator::start().await;
    let client = coordinator.client();

    let token = match client.login(&form(None)).await.unwrap() {
        LoginReply::Issued(token) => token,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    // Issuance alone registers nothing.
    assert!(coordinator.state.registry.lock().await.sessions().is_empty());

    match client.login(&form(Some(token.as_str()))).await.unwrap() {
        LoginReply::Accepted(paths) => {
            assert_eq!(paths.id, token);
            assert_eq!(
                paths.config.as_deref(),
                Some(ServerConfig::default().client_paths.config_path.as_str())
            );
            assert_eq!(paths.upload, None);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(coordinator.state.registry.lock().await.sessions().len(), 1);
}

#[tokio::test]
async fn test_duplicate_and_malformed_tokens_rejected() {
    let coordinator = TestCoordinator::start().await;
    let paths = coordinator.register("lab-1", "amy").await;
    let client = coordinator.client();

    assert_eq!(
        client.login(&form(Some(paths.id.as_str()))).await.unwrap(),
        LoginReply::Rejected(RegisterOutcome::RejectedTokenDuplicate)
    );
    assert_eq!(
        client.login(&form(Some("a".repeat(31).as_str()))).await.unwrap(),
        LoginReply::Rejected(RegisterOutcome::RejectedTokenLength)
    );
    assert_eq!(
        client.login(&form(Some("a".repeat(33).as_str()))).await.unwrap(),
        LoginReply::Rejected(RegisterOutcome::RejectedTokenLength)
    );
}

#[tokio::test]
async fn test_name_pattern_rejection_code() {
    let mut config = ServerConfig::default();
    config.patterns.display_name = "^lab-".into();
    let coordinator = TestCoordinator::start_with(config).await;
    let client = coordinator.client();

    let mut login = form(Some("0123456789abcdef0123456789abcdef"));
    login.name = "office-2".into();
    assert_eq!(
        client.login(&login).await.unwrap(),
        LoginReply::Rejected(RegisterOutcome::RejectedDisplayName)
    );
}

#[tokio::test]
async fn test_update_with_unknown_token_is_unauthenticated() {
    let coordinator = TestCoordinator::start().await;
    let reply = coordinator
        .client()
        .update(&UpdateForm::heartbeat("ffffffffffffffffffffffffffffffff"))
        .await
        .unwrap();
    assert_eq!(reply, UpdateReply::Unauthenticated);
}

#[tokio::test]
async fn test_update_stores_payload_and_attributes() {
    let coordinator = TestCoordinator::start().await;
    let paths = coordinator.register("lab-1", "amy").await;
    let client = coordinator.client();

    let mut update = UpdateForm::payload(&paths.id, vec![vec!["cpu".into(), "42".into()]]);
    update.upload_file = Some("/data/u.csv".into());
    match client.update(&update).await.unwrap() {
        UpdateReply::Accepted(echo) => assert_eq!(echo.id, paths.id),
        other => panic!("unexpected {other:?}"),
    }

    let registry = coordinator.state.registry.lock().await;
    let session = registry.sessions().get(&paths.id).unwrap();
    assert_eq!(session.latest_payload, vec![vec!["cpu".to_string(), "42".to_string()]]);
    assert_eq!(session.attributes["upload_file"], "/data/u.csv");
}
