//! Agent-facing endpoints — discovery redirect, login and update.
//!
//! These always answer 200 with one of the protocol reply shapes; agents
//! branch on the body, not the status.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use axum::extract::{Form, State};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;

use rollcall_core::protocol::{
    decode_records, ErrorReply, IssuedReply, RejectedReply, SessionReply, FIELD_DATA, FIELD_NAME,
    FIELD_TOKEN, FIELD_USER, LOGIN_PATH, MANAGER_PATH,
};
use rollcall_services::registrar::matches_from_start;
use rollcall_services::{UpdateFields, UpdateOutcome};

use super::ApiState;

type FormFields = HashMap<String, String>;

fn field<'a>(form: &'a FormFields, key: &str) -> &'a str {
    form.get(key).map(String::as_str).unwrap_or("")
}

// ── / (GET) ───────────────────────────────────────────────────────────────────

pub async fn handle_root(State(state): State<ApiState>, headers: HeaderMap) -> Redirect {
    let agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ua| matches_from_start(&state.agent_pattern, ua));
    if agent {
        Redirect::to(LOGIN_PATH)
    } else {
        Redirect::to(MANAGER_PATH)
    }
}

// ── /app_login ────────────────────────────────────────────────────────────────

pub async fn handle_login_page() -> Html<&'static str> {
    Html("<!doctype html><title>rollcall</title><p>rollcall coordinator login</p>")
}

pub async fn handle_login(State(state): State<ApiState>, Form(form): Form<FormFields>) -> Response {
    let name = field(&form, FIELD_NAME);
    let user = field(&form, FIELD_USER);
    let token = field(&form, FIELD_TOKEN);

    let mut registry = state.swept().await;

    if token.is_empty() {
        let id = registry.issue_token(name, user);
        tracing::debug!(name, user, token = %id, "token issued");
        return Json(IssuedReply::new(id)).into_response();
    }

    let outcome = registry.register(token, name, user, Instant::now());
    if !outcome.is_accepted() {
        return Json(RejectedReply::new(outcome)).into_response();
    }
    match registry.paths(token) {
        Some((config, upload)) => Json(SessionReply::new(token.to_string(), config, upload)).into_response(),
        None => Json(ErrorReply::unauthenticated()).into_response(),
    }
}

// ── /app_update (POST) ────────────────────────────────────────────────────────

pub async fn handle_update(State(state): State<ApiState>, Form(form): Form<FormFields>) -> Response {
    let token = field(&form, FIELD_TOKEN).to_string();
    let fields = update_fields(form);

    let mut registry = state.swept().await;
    match registry.update(&token, fields, Instant::now()) {
        UpdateOutcome::Accepted { config, upload } => {
            Json(SessionReply::new(token, config, upload)).into_response()
        }
        UpdateOutcome::Unauthenticated => {
            tracing::debug!(token = %token, "update from unknown token");
            Json(ErrorReply::unauthenticated()).into_response()
        }
    }
}

/// Split an update form into session attributes and an optional payload.
/// A `data` field that does not decode is dropped; the update still counts
/// as contact.
fn update_fields(mut form: FormFields) -> UpdateFields {
    form.remove(FIELD_TOKEN);
    let data = form.remove(FIELD_DATA).and_then(|text| match decode_records(&text) {
        Ok(records) => Some(records),
        Err(e) => {
            tracing::warn!(error = %e, "discarding undecodable payload");
            None
        }
    });
    UpdateFields {
        attributes: form.into_iter().collect::<BTreeMap<_, _>>(),
        data,
    }
}
