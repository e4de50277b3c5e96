//! Agent error taxonomy.

use rollcall_core::config::ConfigError;
use rollcall_core::{RangeError, RegisterOutcome};

/// One failed exchange with a coordinator. Always worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("coordinator answered {0}")]
    Status(u16),
    #[error("undecodable reply: {0}")]
    Decode(String),
    #[error("cannot connect: {0}")]
    Connect(String),
    /// The coordinator answered but refused for a reason the agent does
    /// not act on.
    #[error("coordinator refused: {0}")]
    Refused(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("bad address: {0}")]
    Format(#[from] RangeError),
    #[error(transparent)]
    Network(#[from] TransportError),
    /// The coordinator no longer knows our token.
    #[error("session not recognized by coordinator")]
    Auth,
    #[error("registration rejected (code {}): {}", .0.code(), .0.reason())]
    Validation(RegisterOutcome),
    #[error("{operation} failed after {attempts} attempts: {last}")]
    ExhaustedRetries {
        operation: &'static str,
        attempts: u32,
        last: String,
    },
    #[error("no coordinator found")]
    NoServerFound,
    #[error("{0} does not answer as a coordinator")]
    NotACoordinator(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Errors that only an operator can fix.
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            Self::Format(_) | Self::Validation(_) | Self::Config(_) | Self::NotACoordinator(_)
        )
    }
}
