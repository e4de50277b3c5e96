//! reqwest-backed probe and coordinator client.
//!
//! Every request carries `User-Agent: RollcallAgent/<version>` so the
//! coordinator's `/` redirect sends us to the login path.

use std::time::Duration;

use rollcall_core::protocol::{
    encode_records, user_agent, LoginReply, Reply, UpdateReply, FIELD_DATA, FIELD_NAME,
    FIELD_TOKEN, FIELD_UPLOAD_FILE, FIELD_USER, LOGIN_PATH, UPDATE_PATH,
};
use rollcall_core::Endpoint;

use crate::error::TransportError;
use crate::transport::{Coordinator, LoginForm, Probe, UpdateForm};

fn client(timeout: Duration) -> Result<reqwest::Client, TransportError> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent(env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?;
    Ok(client)
}

fn send_error(e: reqwest::Error) -> TransportError {
    if e.is_connect() || e.is_timeout() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Http(e)
    }
}

// ── Probe ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: client(timeout)?,
        })
    }
}

impl Probe for HttpProbe {
    async fn probe(&self, endpoint: Endpoint) -> bool {
        match self.client.get(endpoint.base_url()).send().await {
            Ok(resp) => resp.status().is_success() && resp.url().path() == LOGIN_PATH,
            Err(e) => {
                tracing::trace!(%endpoint, error = %e, "probe negative");
                false
            }
        }
    }
}

// ── Coordinator ───────────────────────────────────────────────────────────────

pub struct HttpCoordinator {
    client: reqwest::Client,
    base: String,
}

impl HttpCoordinator {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: client(timeout)?,
            base: endpoint.base_url(),
        })
    }

    async fn post(&self, path: &str, fields: &[(&str, String)]) -> Result<Reply, TransportError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base, path))
            .form(fields)
            .send()
            .await
            .map_err(send_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        resp.json::<Reply>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

impl Coordinator for HttpCoordinator {
    async fn login(&self, form: &LoginForm) -> Result<LoginReply, TransportError> {
        let mut fields = vec![(FIELD_NAME, form.name.clone()), (FIELD_USER, form.user.clone())];
        if let Some(token) = &form.token {
            fields.push((FIELD_TOKEN, token.clone()));
        }
        self.post(LOGIN_PATH, &fields)
            .await?
            .into_login()
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn update(&self, form: &UpdateForm) -> Result<UpdateReply, TransportError> {
        let mut fields = vec![(FIELD_TOKEN, form.token.clone())];
        if let Some(upload) = &form.upload_file {
            fields.push((FIELD_UPLOAD_FILE, upload.clone()));
        }
        if let Some(data) = &form.data {
            fields.push((FIELD_DATA, encode_records(data)));
        }
        self.post(UPDATE_PATH, &fields)
            .await?
            .into_update()
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}
