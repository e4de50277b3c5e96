//! HTTP wire protocol between agents and the coordinator.
//!
//! Requests are form-encoded; replies are flat JSON objects. Field names
//! are part of the protocol and must not change.

use serde::{Deserialize, Serialize};

pub const LOGIN_PATH: &str = "/app_login";
pub const UPDATE_PATH: &str = "/app_update";
pub const MANAGER_PATH: &str = "/manager";

pub const FIELD_TOKEN: &str = "nuc_id";
pub const FIELD_NAME: &str = "nuc_name";
pub const FIELD_USER: &str = "nuc_user";
pub const FIELD_DATA: &str = "data";
pub const FIELD_UPLOAD_FILE: &str = "upload_file";

/// `error` value for an update carrying a token that is not live.
pub const UNAUTHENTICATED: &str = "未登录";

/// Product half of the `User-Agent` every agent request carries.
pub const AGENT_PRODUCT: &str = "RollcallAgent";

/// Default pattern the coordinator uses to tell agents from browsers.
pub const AGENT_USER_AGENT_PATTERN: &str = r"^RollcallAgent/(\d+)\.(\d+)\.(\d+)$";

/// `RollcallAgent/<major>.<minor>.<patch>`
pub fn user_agent(version: &str) -> String {
    format!("{AGENT_PRODUCT}/{version}")
}

/// One opaque payload record (a row of cells).
pub type Record = Vec<String>;

/// Serialize records for the `data` form field.
pub fn encode_records(records: &[Record]) -> String {
    // Vec<Vec<String>> always serializes.
    serde_json::to_string(records).unwrap_or_else(|_| "[]".to_string())
}

pub fn decode_records(text: &str) -> Result<Vec<Record>, serde_json::Error> {
    serde_json::from_str(text)
}

// ── Registration outcome ──────────────────────────────────────────────────────

/// Result of a registration attempt. Each rejection has its own wire code
/// because agents branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterOutcome {
    Accepted,
    RejectedTokenLength,
    RejectedTokenDuplicate,
    RejectedDisplayName,
    RejectedUserName,
}

impl RegisterOutcome {
    pub fn code(self) -> u8 {
        match self {
            Self::Accepted => 0,
            Self::RejectedTokenDuplicate => 1,
            Self::RejectedTokenLength => 2,
            Self::RejectedDisplayName => 11,
            Self::RejectedUserName => 12,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Accepted),
            1 => Some(Self::RejectedTokenDuplicate),
            2 => Some(Self::RejectedTokenLength),
            11 => Some(Self::RejectedDisplayName),
            12 => Some(Self::RejectedUserName),
            _ => None,
        }
    }

    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Operator-facing reason for this outcome.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Accepted => "registration accepted",
            Self::RejectedTokenLength => "token must be exactly 32 characters",
            Self::RejectedTokenDuplicate => "token is already registered to a live session",
            Self::RejectedDisplayName => "display name does not match the coordinator's naming pattern",
            Self::RejectedUserName => "user name does not match the coordinator's naming pattern",
        }
    }
}

// ── Coordinator replies ───────────────────────────────────────────────────────

/// `{"id": ..., "OK": false}` — token issued, not yet registered.
#[derive(Debug, Serialize)]
pub struct IssuedReply {
    pub id: String,
    #[serde(rename = "OK")]
    pub ok: bool,
}

impl IssuedReply {
    pub fn new(id: String) -> Self {
        Self { id, ok: false }
    }
}

/// `{"OK": true, "id", "config", "upload"}` — live session and its paths.
#[derive(Debug, Serialize)]
pub struct SessionReply {
    #[serde(rename = "OK")]
    pub ok: bool,
    pub id: String,
    pub config: String,
    pub upload: Option<String>,
}

impl SessionReply {
    pub fn new(id: String, config: String, upload: Option<String>) -> Self {
        Self {
            ok: true,
            id,
            config,
            upload,
        }
    }
}

/// `{"OK": false, "error-code": n}`
#[derive(Debug, Serialize)]
pub struct RejectedReply {
    #[serde(rename = "OK")]
    pub ok: bool,
    #[serde(rename = "error-code")]
    pub error_code: u8,
}

impl RejectedReply {
    pub fn new(outcome: RegisterOutcome) -> Self {
        Self {
            ok: false,
            error_code: outcome.code(),
        }
    }
}

/// `{"OK": false, "error": "..."}`
#[derive(Debug, Serialize)]
pub struct ErrorReply {
    #[serde(rename = "OK")]
    pub ok: bool,
    pub error: String,
}

impl ErrorReply {
    pub fn unauthenticated() -> Self {
        Self {
            ok: false,
            error: UNAUTHENTICATED.to_string(),
        }
    }
}

// ── Agent-side decoding ───────────────────────────────────────────────────────

/// Every reply shape, decoded permissively. Interpret with
/// [`Reply::into_login`] or [`Reply::into_update`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Reply {
    #[serde(rename = "OK")]
    pub ok: bool,
    pub id: Option<String>,
    pub config: Option<String>,
    pub upload: Option<String>,
    #[serde(rename = "error-code")]
    pub error_code: Option<u8>,
    pub error: Option<String>,
}

/// Paths and identity echoed back for a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub id: String,
    pub config: Option<String>,
    pub upload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginReply {
    Issued(String),
    Accepted(SessionPaths),
    Rejected(RegisterOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateReply {
    Accepted(SessionPaths),
    Unauthenticated,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("reply is missing field {0:?}")]
    MissingField(&'static str),
    #[error("reply carries unknown error-code {0}")]
    UnknownCode(u8),
}

impl Reply {
    fn into_paths(self) -> Result<SessionPaths, ProtocolError> {
        Ok(SessionPaths {
            id: self.id.ok_or(ProtocolError::MissingField("id"))?,
            config: self.config,
            upload: self.upload,
        })
    }

    pub fn into_login(self) -> Result<LoginReply, ProtocolError> {
        if self.ok {
            return self.into_paths().map(LoginReply::Accepted);
        }
        if let Some(code) = self.error_code {
            return RegisterOutcome::from_code(code)
                .filter(|o| !o.is_accepted())
                .map(LoginReply::Rejected)
                .ok_or(ProtocolError::UnknownCode(code));
        }
        self.id
            .map(LoginReply::Issued)
            .ok_or(ProtocolError::MissingField("id"))
    }

    pub fn into_update(self) -> Result<UpdateReply, ProtocolError> {
        if self.ok {
            return self.into_paths().map(UpdateReply::Accepted);
        }
        match self.error {
            Some(e) if e == UNAUTHENTICATED => Ok(UpdateReply::Unauthenticated),
            Some(e) => Ok(UpdateReply::Failed(e)),
            None => Err(ProtocolError::MissingField("error")),
        }
    }
}
