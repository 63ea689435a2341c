//! Driving Adapters Layer
//!
//! Adapters that accept external requests and translate them into calls on the
//! [`Application`](crate::application::Application).
//!
//! ```rust,no_run
//! use sw_engine::adapters::rest::build_router;
//! use sw_engine::application::Application;
//! use sw_engine::domain::ports::{FakeServiceController, MockWatchlistStore, ServiceController};
//! use sw_engine::domain::{EventBroadcaster, EventPublisher, WatchlistRegistry};
//! use std::sync::Arc;
//!
//! # fn example() -> sw_engine::domain::Result<()> {
//! let controller: Arc<dyn ServiceController> = Arc::new(FakeServiceController::new());
//! let registry = WatchlistRegistry::load(Arc::new(MockWatchlistStore::new()), controller.clone())?;
//! let publisher = Arc::new(EventPublisher::new(Arc::new(EventBroadcaster::new())));
//! let app = Arc::new(Application::new(Arc::new(registry), controller, publisher));
//!
//! let router = build_router(app);
//! # Ok(())
//! # }
//! ```

pub mod rest;
