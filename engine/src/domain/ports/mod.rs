pub mod event_sink;
pub mod fake_controller;
pub mod mock_store;
pub mod service_controller;
pub mod watchlist_manager;
pub mod watchlist_store;

pub use event_sink::EventSink;
pub use fake_controller::FakeServiceController;
pub use mock_store::MockWatchlistStore;
pub use service_controller::ServiceController;
pub use watchlist_manager::WatchlistManager;
pub use watchlist_store::WatchlistStore;

#[cfg(test)]
pub use service_controller::MockServiceController;
#[cfg(test)]
pub use watchlist_manager::MockWatchlistManager;
