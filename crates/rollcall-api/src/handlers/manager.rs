//! /manager handlers — read and administer the live registry.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use axum::extract::{Form, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use rollcall_core::config::ClientPathsConfig;
use rollcall_core::Record;
use rollcall_services::{Registry, Session, TrackToggle};

use super::ApiState;

fn not_live(token: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("no live session {}", token))
}

/// Seconds, rounded to one decimal.
fn age_secs(age: Duration) -> f64 {
    (age.as_secs_f64() * 10.0).round() / 10.0
}

// ── /manager (GET) ────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionSummary {
    pub token: String,
    pub name: String,
    pub user: String,
    pub age_secs: f64,
    pub created_at_ms: u64,
    pub records: usize,
    pub tracked: bool,
}

#[derive(Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub user: String,
    pub attached: Option<String>,
    pub snapshots: usize,
}

#[derive(Serialize)]
pub struct OverviewResponse {
    pub sessions: Vec<SessionSummary>,
    pub datasets: Vec<DatasetSummary>,
}

fn summarize(registry: &Registry, session: &Session, now: Instant) -> SessionSummary {
    SessionSummary {
        token: session.token.clone(),
        name: session.display_name.clone(),
        user: session.owning_user.clone(),
        age_secs: age_secs(session.age(now)),
        created_at_ms: session.created_at_ms,
        records: session.latest_payload.len(),
        tracked: registry.dataset_for(&session.token).is_some(),
    }
}

pub async fn handle_overview(State(state): State<ApiState>) -> Json<OverviewResponse> {
    let registry = state.swept().await;
    let now = Instant::now();

    let sessions = registry
        .sessions()
        .ordered()
        .into_iter()
        .map(|s| summarize(&registry, s, now))
        .collect();
    let datasets = registry
        .datasets()
        .iter()
        .map(|d| DatasetSummary {
            name: d.identity().name.clone(),
            user: d.identity().user.clone(),
            attached: d.attached().map(str::to_string),
            snapshots: d.len(),
        })
        .collect();

    Json(OverviewResponse { sessions, datasets })
}

// ── /manager/id/{token} (GET) ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub columns: usize,
    pub payload: Vec<Record>,
    pub attributes: BTreeMap<String, String>,
    pub config: String,
    pub upload: Option<String>,
}

pub async fn handle_session_inspect(
    State(state): State<ApiState>,
    Path(token): Path<String>,
) -> Result<Json<SessionDetail>, (StatusCode, String)> {
    let registry = state.swept().await;
    let session = registry.sessions().get(&token).ok_or_else(|| not_live(&token))?;
    let (config, upload) = registry.paths(&token).ok_or_else(|| not_live(&token))?;

    Ok(Json(SessionDetail {
        summary: summarize(&registry, session, Instant::now()),
        columns: session.columns(),
        payload: session.latest_payload.clone(),
        attributes: session.attributes.clone(),
        config,
        upload,
    }))
}

// ── /manager/id/{token}/track (POST) ──────────────────────────────────────────

#[derive(Serialize)]
pub struct TrackResponse {
    pub token: String,
    pub tracked: bool,
}

pub async fn handle_track_toggle(
    State(state): State<ApiState>,
    Path(token): Path<String>,
) -> Result<Json<TrackResponse>, (StatusCode, String)> {
    let mut registry = state.swept().await;
    let tracked = match registry
        .toggle_tracking(&token)
        .ok_or_else(|| not_live(&token))?
    {
        TrackToggle::Started => true,
        TrackToggle::Stopped => false,
        TrackToggle::HeldBy(other) => {
            return Err((
                StatusCode::CONFLICT,
                format!("dataset for this identity is fed by live session {}", other),
            ))
        }
    };
    Ok(Json(TrackResponse { token, tracked }))
}

// ── /manager/id/{token}/export (GET) ──────────────────────────────────────────

pub async fn handle_export(
    State(state): State<ApiState>,
    Path(token): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    let registry = state.swept().await;
    let dataset = registry
        .dataset_for(&token)
        .ok_or((StatusCode::NOT_FOUND, format!("{} feeds no tracked dataset", token)))?;

    let body = dataset
        .to_json()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let identity = dataset.identity();
    let disposition = format!(
        "attachment; filename=\"{}.json\"",
        export_filename(&identity.name, &identity.user, &token)
    );

    Ok((
        [
            (CONTENT_TYPE, "application/json".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// `name-user` reduced to header-safe characters. Falls back to the token
/// when nothing survives.
fn export_filename(name: &str, user: &str, token: &str) -> String {
    let safe: String = format!("{}-{}", name, user)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if safe.trim_matches(|c| c == '-' || c == '.').is_empty() {
        token.to_string()
    } else {
        safe
    }
}

// ── Path overrides ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PathsForm {
    pub config_path: Option<String>,
    pub upload_path: Option<String>,
}

impl PathsForm {
    /// Blank form fields mean "unchanged".
    fn normalized(self) -> (Option<String>, Option<String>) {
        let keep = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        (keep(self.config_path), keep(self.upload_path))
    }
}

#[derive(Serialize)]
pub struct PathsResponse {
    pub config: String,
    pub upload: Option<String>,
}

pub async fn handle_session_paths(
    State(state): State<ApiState>,
    Path(token): Path<String>,
    Form(form): Form<PathsForm>,
) -> Result<Json<PathsResponse>, (StatusCode, String)> {
    let (config_path, upload_path) = form.normalized();
    let mut registry = state.swept().await;
    if !registry.set_session_paths(&token, config_path, upload_path) {
        return Err(not_live(&token));
    }
    let (config, upload) = registry.paths(&token).ok_or_else(|| not_live(&token))?;
    tracing::info!(token = %token, config = %config, upload = ?upload, "session paths changed");
    Ok(Json(PathsResponse { config, upload }))
}

// ── /manager/paths (POST) ─────────────────────────────────────────────────────

pub async fn handle_default_paths(
    State(state): State<ApiState>,
    Form(form): Form<PathsForm>,
) -> Result<Json<PathsResponse>, (StatusCode, String)> {
    let (config_path, upload_path) = form.normalized();

    let mut config = state.config.lock().await;
    let defaults = ClientPathsConfig {
        config_path: config_path.unwrap_or_else(|| config.client_paths.config_path.clone()),
        upload_path: upload_path.or_else(|| config.client_paths.upload_path.clone()),
    };
    config.client_paths = defaults.clone();
    if let Some(path) = &state.config_file {
        config
            .save_to(path)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    }
    drop(config);

    state.registry.lock().await.set_default_paths(defaults.clone());
    tracing::info!(config = %defaults.config_path, upload = ?defaults.upload_path, "default client paths changed");

    Ok(Json(PathsResponse {
        config: defaults.config_path,
        upload: defaults.upload_path,
    }))
}
