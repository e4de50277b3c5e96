//! rollcall-core — shared types for the coordinator and its agents.
//! Address ranges, tokens, the HTTP wire protocol and configuration.

pub mod config;
pub mod endpoint;
pub mod persist;
pub mod protocol;
pub mod token;

pub use endpoint::{Endpoint, RangeError};
pub use protocol::{Record, RegisterOutcome};
