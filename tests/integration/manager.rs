use std::time::Duration;

use rollcall_agent::{Coordinator, UpdateForm};
use rollcall_core::protocol::UpdateReply;
use rollcall_services::DatasetExport;

use crate::*;

async fn post_form(coordinator: &TestCoordinator, path: &str, form: &[(&str, &str)]) -> serde_json::Value {
    let resp = raw_client("Mozilla/5.0")
        .post(coordinator.url(path))
        .form(form)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success(), "{path}: {}", resp.status());
    resp.json().await.unwrap()
}

async fn push(coordinator: &TestCoordinator, token: &str, value: &str) {
    let reply = coordinator
        .client()
        .update(&UpdateForm::payload(token, vec![vec![value.to_string()]]))
        .await
        .unwrap();
    assert!(matches!(reply, UpdateReply::Accepted(_)));
}

#[tokio::test]
async fn test_session_detail_and_unknown_token() {
    let coordinator = TestCoordinator::start().await;
    let paths = coordinator.register("lab-1", "amy").await;
    push(&coordinator, &paths.id, "7").await;

    let client = raw_client("Mozilla/5.0");
    let detail: serde_json::Value = client
        .get(coordinator.url(&format!("/manager/id/{}", paths.id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["name"], "lab-1");
    assert_eq!(detail["user"], "amy");
    assert_eq!(detail["columns"], 1);
    assert_eq!(detail["payload"][0][0], "7");

    let missing = client
        .get(coordinator.url("/manager/id/nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tracked_dataset_exports_in_order_and_survives_eviction() {
    let coordinator = TestCoordinator::with_threshold(300).await;
    let first = coordinator.register("lab-1", "amy").await;

    let toggled = post_form(&coordinator, &format!("/manager/id/{}/track", first.id), &[]).await;
    assert_eq!(toggled["tracked"], true);

    push(&coordinator, &first.id, "a").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    push(&coordinator, &first.id, "b").await;

    // Let the first session lapse, then come back under a new token.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let second = coordinator.register("lab-1", "amy").await;
    push(&coordinator, &second.id, "c").await;

    let resp = raw_client("Mozilla/5.0")
        .get(coordinator.url(&format!("/manager/id/{}/export", second.id)))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert!(resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .starts_with("attachment"));
    let export: DatasetExport = serde_json::from_str(&resp.text().await.unwrap()).unwrap();

    let values: Vec<&str> = export
        .snapshots
        .iter()
        .map(|s| s.records[0][0].as_str())
        .collect();
    assert_eq!(values, vec!["a", "b", "c"]);
    assert!(export
        .snapshots
        .windows(2)
        .all(|w| w[0].timestamp_ms < w[1].timestamp_ms));
}

#[tokio::test]
async fn test_path_overrides_reach_the_agent() {
    let coordinator = TestCoordinator::start().await;
    let paths = coordinator.register("lab-1", "amy").await;

    let set = post_form(
        &coordinator,
        &format!("/manager/id/{}/paths", paths.id),
        &[("upload_path", "/data/lab-1.csv")],
    )
    .await;
    assert_eq!(set["upload"], "/data/lab-1.csv");

    match coordinator
        .client()
        .update(&UpdateForm::heartbeat(&paths.id))
        .await
        .unwrap()
    {
        UpdateReply::Accepted(echo) => {
            assert_eq!(echo.upload.as_deref(), Some("/data/lab-1.csv"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_default_paths_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("server.toml");
    let state = ApiState::new(ServerConfig::default(), Some(file.clone())).unwrap();
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    let task = tokio::spawn(rollcall_api::serve_listener(listener, state.clone()));
    let coordinator = TestCoordinator {
        endpoint: Endpoint::new(Ipv4Addr::LOCALHOST, port),
        state,
        task,
    };

    let set = post_form(&coordinator, "/manager/paths", &[("upload_path", "/srv/all.csv")]).await;
    assert_eq!(set["upload"], "/srv/all.csv");

    let saved = ServerConfig::load_from(&file).unwrap();
    assert_eq!(saved.client_paths.upload_path.as_deref(), Some("/srv/all.csv"));

    let paths = coordinator.register("lab-1", "amy").await;
    assert_eq!(paths.upload.as_deref(), Some("/srv/all.csv"));
}

#[tokio::test]
async fn test_tracking_cannot_be_stolen_by_a_twin_session() {
    let coordinator = TestCoordinator::start().await;
    let first = coordinator.register("lab-1", "amy").await;
    post_form(&coordinator, &format!("/manager/id/{}/track", first.id), &[]).await;
    push(&coordinator, &first.id, "a").await;

    let second = coordinator.register("lab-1", "amy").await;
    let resp = raw_client("Mozilla/5.0")
        .post(coordinator.url(&format!("/manager/id/{}/track", second.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CONFLICT);

    let registry = coordinator.state.swept().await;
    assert_eq!(registry.datasets().len(), 1);
    assert_eq!(registry.dataset_for(&first.id).unwrap().len(), 1);
}
