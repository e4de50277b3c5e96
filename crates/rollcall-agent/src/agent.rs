//! UploadAgent — handshake, then report forever.
//!
//! ```text
//! Handshaking ──accepted──▶ Reporting ──unauthenticated──▶ Handshaking
//! ```
//!
//! Reporting interleaves two cadences on one loop: a heartbeat every
//! iteration and a payload push once `upload_delay` of wall-clock time has
//! passed since the last push (or skipped push).

use std::time::Duration;

use tokio::time::Instant;

use rollcall_core::config::{AgentConfig, RetryPolicy};
use rollcall_core::persist::{expand_home, same_path};
use rollcall_core::protocol::{LoginReply, SessionPaths, UpdateReply};
use rollcall_core::{Endpoint, RegisterOutcome};

use crate::error::{AgentError, TransportError};
use crate::identity::HostIdentity;
use crate::payload::read_payload;
use crate::retry::with_retries;
use crate::state::StateStore;
use crate::transport::{Coordinator, LoginForm, UpdateForm};

/// What one reporting iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Heartbeat only; no push was due.
    Heartbeat,
    Pushed,
    /// A push was due but the payload file was missing.
    Skipped,
    /// The coordinator had forgotten us; a new session was registered.
    Reauthenticated,
}

pub struct UploadAgent<C> {
    coordinator: C,
    endpoint: Endpoint,
    identity: HostIdentity,
    policy: RetryPolicy,
    upload_delay: Duration,
    heartbeat_interval: Duration,
    token: Option<String>,
    upload_file: String,
    /// Upload path the coordinator last told us about.
    server_upload: Option<String>,
    store: StateStore,
    last_push: Instant,
}

impl<C: Coordinator> UploadAgent<C> {
    pub fn new(
        coordinator: C,
        endpoint: Endpoint,
        identity: HostIdentity,
        config: &AgentConfig,
        store: StateStore,
    ) -> Self {
        Self {
            coordinator,
            endpoint,
            identity,
            policy: config.server.retry_policy(),
            upload_delay: config.server.upload_delay(),
            heartbeat_interval: config.server.heartbeat_interval(),
            token: config.id.clone().filter(|t| !t.is_empty()),
            upload_file: config.upload_file.clone(),
            server_upload: None,
            store,
            last_push: Instant::now(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn upload_file(&self) -> &str {
        &self.upload_file
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Handshake, then report until a fatal error.
    pub async fn run(&mut self) -> Result<(), AgentError> {
        self.handshake().await?;
        loop {
            self.step().await?;
            tokio::time::sleep(self.heartbeat_interval).await;
        }
    }

    // ── Handshaking ───────────────────────────────────────────────────────────

    /// Register with the coordinator, requesting a token first if none is
    /// cached. A duplicate-token rejection gets a fresh token; every other
    /// rejection is fatal.
    pub async fn handshake(&mut self) -> Result<(), AgentError> {
        let max_reissues = self.policy.max_attempts;
        let mut reissues = 0;
        loop {
            let token = match self.token.clone() {
                Some(token) => token,
                None => self.request_token().await?,
            };
            let form = LoginForm {
                name: self.identity.name.clone(),
                user: self.identity.user.clone(),
                token: Some(token.clone()),
            };
            match self.login(&form, "register").await? {
                LoginReply::Accepted(paths) => {
                    tracing::info!(token = %paths.id, coordinator = %self.endpoint, "registered");
                    self.token = Some(paths.id.clone());
                    self.store.save_session(&paths.id, &self.endpoint.to_string())?;
                    self.apply_paths(&paths)?;
                    return Ok(());
                }
                LoginReply::Rejected(RegisterOutcome::RejectedTokenDuplicate) => {
                    reissues += 1;
                    if reissues >= max_reissues {
                        return Err(AgentError::ExhaustedRetries {
                            operation: "register",
                            attempts: reissues,
                            last: RegisterOutcome::RejectedTokenDuplicate.reason().to_string(),
                        });
                    }
                    tracing::warn!(token = %token, "token already in use; requesting another");
                    self.token = None;
                }
                LoginReply::Rejected(outcome) => return Err(AgentError::Validation(outcome)),
                LoginReply::Issued(id) => {
                    // Registration answered like issuance. Use the new token.
                    self.token = Some(id);
                }
            }
        }
    }

    async fn request_token(&mut self) -> Result<String, AgentError> {
        let form = LoginForm {
            name: self.identity.name.clone(),
            user: self.identity.user.clone(),
            token: None,
        };
        match self.login(&form, "token request").await? {
            LoginReply::Issued(id) | LoginReply::Accepted(SessionPaths { id, .. }) => {
                tracing::debug!(token = %id, "token issued");
                self.token = Some(id.clone());
                Ok(id)
            }
            LoginReply::Rejected(outcome) => Err(AgentError::Validation(outcome)),
        }
    }

    async fn login(&self, form: &LoginForm, operation: &'static str) -> Result<LoginReply, AgentError> {
        let coordinator = &self.coordinator;
        with_retries(&self.policy, operation, move || coordinator.login(form)).await
    }

    // ── Reporting ─────────────────────────────────────────────────────────────

    /// One reporting iteration: heartbeat, then a payload push if due.
    pub async fn step(&mut self) -> Result<Step, AgentError> {
        let token = self.current_token()?;
        let mut heartbeat = UpdateForm::heartbeat(&token);
        if self.server_upload.is_none() {
            heartbeat.upload_file = Some(self.upload_file.clone());
        }
        match self.update(&heartbeat, "heartbeat").await? {
            UpdateReply::Accepted(paths) => self.apply_paths(&paths)?,
            _ => return self.reauthenticate().await,
        }

        if self.last_push.elapsed() < self.upload_delay {
            return Ok(Step::Heartbeat);
        }

        let Some(records) = read_payload(&expand_home(&self.upload_file))? else {
            tracing::info!(upload_file = %self.upload_file, "payload file not found; skipping push");
            self.last_push = Instant::now();
            return Ok(Step::Skipped);
        };
        let count = records.len();
        match self.update(&UpdateForm::payload(&token, records), "payload push").await? {
            UpdateReply::Accepted(paths) => {
                tracing::debug!(records = count, "payload pushed");
                self.last_push = Instant::now();
                self.apply_paths(&paths)?;
                Ok(Step::Pushed)
            }
            _ => self.reauthenticate().await,
        }
    }

    fn current_token(&self) -> Result<String, AgentError> {
        self.token.clone().ok_or(AgentError::Auth)
    }

    /// Send an update with retries. Refusals other than "unauthenticated"
    /// count as failed attempts.
    async fn update(&self, form: &UpdateForm, operation: &'static str) -> Result<UpdateReply, AgentError> {
        let coordinator = &self.coordinator;
        with_retries(&self.policy, operation, move || async move {
            match coordinator.update(form).await? {
                UpdateReply::Failed(reason) => Err(TransportError::Refused(reason)),
                reply => Ok(reply),
            }
        })
        .await
    }

    async fn reauthenticate(&mut self) -> Result<Step, AgentError> {
        tracing::warn!(token = ?self.token, "coordinator does not recognize session; re-registering");
        self.token = None;
        self.handshake().await?;
        Ok(Step::Reauthenticated)
    }

    /// Follow path instructions from the coordinator.
    fn apply_paths(&mut self, paths: &SessionPaths) -> Result<(), AgentError> {
        if let Some(config) = &paths.config {
            self.store
                .relocate(config, &paths.id, &self.endpoint.to_string())?;
        }
        if let Some(upload) = &paths.upload {
            if !same_path(upload, &self.upload_file) {
                tracing::info!(upload_file = %upload, "payload file relocated");
                self.upload_file = upload.clone();
                self.store.save_upload_file(upload)?;
            }
        }
        self.server_upload = paths.upload.clone();
        Ok(())
    }
}
