//! rollcall-services — coordinator state: live sessions, registration
//! policy, liveness eviction and tracked payload history.

pub mod dataset;
pub mod liveness;
pub mod registrar;
pub mod registry;
pub mod session;

pub use dataset::{DatasetExport, DatasetStore, Identity, Reattach, Snapshot, TrackedDataset};
pub use liveness::{expiry_loop, LivenessMonitor};
pub use registrar::RegistrarPolicy;
pub use registry::{
    new_shared_registry, Registry, SharedRegistry, TrackToggle, UpdateFields,
    UpdateOutcome,
};
pub use session::{unix_millis, Session, SessionTable};
