use std::time::Duration;

use rollcall_agent::{Coordinator, UpdateForm};
use rollcall_core::protocol::UpdateReply;

use crate::*;

#[tokio::test]
async fn test_silent_session_is_evicted() {
    let coordinator = TestCoordinator::with_threshold(200).await;
    let paths = coordinator.register("lab-1", "amy").await;

    tokio::time::sleep(Duration::from_millis(500)).await;

    let reply = coordinator
        .client()
        .update(&UpdateForm::heartbeat(&paths.id))
        .await
        .unwrap();
    assert_eq!(reply, UpdateReply::Unauthenticated);
    assert!(coordinator.state.registry.lock().await.sessions().is_empty());
}

#[tokio::test]
async fn test_heartbeats_keep_session_alive() {
    let coordinator = TestCoordinator::with_threshold(400).await;
    let paths = coordinator.register("lab-1", "amy").await;
    let client = coordinator.client();

    for _ in 0..8 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let reply = client.update(&UpdateForm::heartbeat(&paths.id)).await.unwrap();
        assert!(matches!(reply, UpdateReply::Accepted(_)), "{reply:?}");
    }
}

#[tokio::test]
async fn test_reregistration_after_eviction_gets_new_token() {
    let coordinator = TestCoordinator::with_threshold(200).await;
    let first = coordinator.register("lab-1", "amy").await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let second = coordinator.register("lab-1", "amy").await;
    assert_ne!(first.id, second.id);

    let registry = coordinator.state.swept().await;
    assert!(!registry.sessions().contains(&first.id));
    assert!(registry.sessions().contains(&second.id));
}
