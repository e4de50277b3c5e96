//! Seams between the agent and the network.
//!
//! [`Probe`] answers "is there a coordinator here?" for the scanner.
//! [`Coordinator`] carries login and update exchanges once one is chosen.

use std::future::Future;

use rollcall_core::protocol::{LoginReply, UpdateReply};
use rollcall_core::{Endpoint, Record};

use crate::error::TransportError;

pub trait Probe: Send + Sync {
    /// True iff `endpoint` answers `/` by landing on the login path.
    /// Every failure is a negative.
    fn probe(&self, endpoint: Endpoint) -> impl Future<Output = bool> + Send;
}

/// Form sent to `/app_login`. No token means "issue one".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub name: String,
    pub user: String,
    pub token: Option<String>,
}

/// Form sent to `/app_update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateForm {
    pub token: String,
    /// Tells the coordinator which payload file this agent reads.
    pub upload_file: Option<String>,
    pub data: Option<Vec<Record>>,
}

impl UpdateForm {
    pub fn heartbeat(token: &str) -> Self {
        Self {
            token: token.to_string(),
            ..Self::default()
        }
    }

    pub fn payload(token: &str, data: Vec<Record>) -> Self {
        Self {
            token: token.to_string(),
            data: Some(data),
            ..Self::default()
        }
    }
}

pub trait Coordinator: Send + Sync {
    fn login(&self, form: &LoginForm) -> impl Future<Output = Result<LoginReply, TransportError>> + Send;

    fn update(&self, form: &UpdateForm) -> impl Future<Output = Result<UpdateReply, TransportError>> + Send;
}
