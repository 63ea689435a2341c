pub mod event_broadcaster;
pub mod event_publisher;
pub mod monitor_service;
pub mod watchlist_registry;

pub use event_broadcaster::{EventBroadcaster, Subscription};
pub use event_publisher::EventPublisher;
pub use monitor_service::{EntryOutcome, MonitorService, TickSummary};
pub use watchlist_registry::WatchlistRegistry;
