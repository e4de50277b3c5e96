//! Registration policy — token shape, uniqueness and identity patterns.
//!
//! Checks run in a fixed order: token length, token uniqueness, display
//! name, user name. The first failing check decides the outcome.

use regex::Regex;

use rollcall_core::config::{ConfigError, PatternConfig};
use rollcall_core::token::{self, has_valid_length};
use rollcall_core::RegisterOutcome;

use crate::session::SessionTable;

#[derive(Debug, Clone)]
pub struct RegistrarPolicy {
    display_name: Regex,
    user_name: Regex,
}

impl RegistrarPolicy {
    pub fn new(display_name: &str, user_name: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            display_name: compile(display_name)?,
            user_name: compile(user_name)?,
        })
    }

    pub fn from_config(patterns: &PatternConfig) -> Result<Self, ConfigError> {
        Self::new(&patterns.display_name, &patterns.user_name)
    }

    /// Accept any display name and user.
    #[cfg(test)]
    pub(crate) fn permissive() -> Self {
        Self {
            display_name: Regex::new(".*").expect("static pattern"),
            user_name: Regex::new(".*").expect("static pattern"),
        }
    }

    /// Mint a token for this identity. Nothing is registered.
    pub fn issue_token(&self, display_name: &str, user: &str) -> String {
        token::issue_token(display_name, user)
    }

    /// Decide whether `token` may be registered for this identity.
    pub fn check(
        &self,
        live: &SessionTable,
        token: &str,
        display_name: &str,
        user: &str,
    ) -> RegisterOutcome {
        if !has_valid_length(token) {
            return RegisterOutcome::RejectedTokenLength;
        }
        if live.contains(token) {
            return RegisterOutcome::RejectedTokenDuplicate;
        }
        if !matches_from_start(&self.display_name, display_name) {
            return RegisterOutcome::RejectedDisplayName;
        }
        if !matches_from_start(&self.user_name, user) {
            return RegisterOutcome::RejectedUserName;
        }
        RegisterOutcome::Accepted
    }
}

pub fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::BadPattern(pattern.to_string(), e.to_string()))
}

/// True if `re` matches a prefix of `text`. Patterns are anchored at the
/// start only; add `$` to anchor the end.
pub fn matches_from_start(re: &Regex, text: &str) -> bool {
    re.find(text).is_some_and(|m| m.start() == 0)
}
