//! rollcall-agent — find a coordinator, register, and keep reporting.

pub mod agent;
pub mod discovery;
pub mod error;
pub mod http;
pub mod identity;
pub mod payload;
pub mod retry;
pub mod scanner;
pub mod state;
pub mod transport;

pub use agent::{Step, UploadAgent};
pub use discovery::{confirm, locate, Located};
pub use error::{AgentError, TransportError};
pub use http::{HttpCoordinator, HttpProbe};
pub use identity::HostIdentity;
pub use scanner::{scan, Quiet, ScanObserver};
pub use state::StateStore;
pub use transport::{Coordinator, LoginForm, Probe, UpdateForm};
