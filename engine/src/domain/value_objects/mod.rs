pub mod event;
pub mod service_snapshot;
pub mod service_state;

pub use event::{EventKind, ServiceEvent};
pub use service_snapshot::ServiceSnapshot;
pub use service_state::ServiceState;
