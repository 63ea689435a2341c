pub mod entities;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::WatchlistEntry;
pub use error::{DomainError, Result};
pub use services::{EventBroadcaster, EventPublisher, MonitorService, Subscription, WatchlistRegistry};
pub use value_objects::{EventKind, ServiceEvent, ServiceSnapshot, ServiceState};
