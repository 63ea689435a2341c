//! Application
//! Composition root wiring the watchlist, controller and event publisher together
//!
//! Driving adapters (REST, the daemon) talk to the service through this type.
//! Watchlist mutations made here also publish the matching watchlist event.

use crate::domain::ports::{ServiceController, WatchlistManager};
use crate::domain::services::{EventBroadcaster, EventPublisher, MonitorService};
use crate::domain::{DomainError, Result, ServiceEvent, ServiceSnapshot, Subscription, WatchlistEntry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

pub struct Application {
    watchlist: Arc<dyn WatchlistManager>,
    controller: Arc<dyn ServiceController>,
    publisher: Arc<EventPublisher>,
    started_at: Instant,
}

impl Application {
    pub fn new(
        watchlist: Arc<dyn WatchlistManager>,
        controller: Arc<dyn ServiceController>,
        publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            watchlist,
            controller,
            publisher,
            started_at: Instant::now(),
        }
    }

    pub fn watchlist(&self) -> &Arc<dyn WatchlistManager> {
        &self.watchlist
    }

    pub fn controller(&self) -> &Arc<dyn ServiceController> {
        &self.controller
    }

    pub fn publisher(&self) -> &Arc<EventPublisher> {
        &self.publisher
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        self.publisher.broadcaster()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Monitor sharing this application's watchlist, controller and publisher
    pub fn monitor(&self, interval: Duration) -> MonitorService {
        MonitorService::new(
            self.watchlist.clone(),
            self.controller.clone(),
            self.publisher.clone(),
        )
        .with_interval(interval)
    }

    pub fn subscribe(&self) -> Subscription {
        self.broadcaster().subscribe()
    }

    // ===== Services =====

    pub async fn list_services(&self) -> Result<Vec<ServiceSnapshot>> {
        self.controller.list().await
    }

    pub async fn get_service(&self, name: &str) -> Result<ServiceSnapshot> {
        self.controller.get(name).await
    }

    pub async fn start_service(&self, name: &str) -> Result<()> {
        info!(service = name, "Start requested");
        self.controller.start(name).await
    }

    pub async fn stop_service(&self, name: &str) -> Result<()> {
        info!(service = name, "Stop requested");
        self.controller.stop(name).await
    }

    pub async fn restart_service(&self, name: &str) -> Result<()> {
        info!(service = name, "Restart requested");
        self.controller.restart(name).await
    }

    // ===== Watchlist =====

    pub async fn list_watchlist(&self) -> Result<Vec<WatchlistEntry>> {
        self.watchlist.list().await
    }

    pub async fn get_watchlist_entry(&self, name: &str) -> Result<WatchlistEntry> {
        self.watchlist.get(name).await
    }

    pub async fn add_to_watchlist(&self, name: &str, auto_restart: bool) -> Result<WatchlistEntry> {
        let result = self.watchlist.add(name, auto_restart).await;
        if applied(&result) {
            self.publisher
                .publish(ServiceEvent::watchlist_added(name, auto_restart));
        }
        result
    }

    pub async fn remove_from_watchlist(&self, name: &str) -> Result<()> {
        let result = self.watchlist.remove(name).await;
        if applied(&result) {
            self.publisher.publish(ServiceEvent::watchlist_removed(name));
        }
        result
    }

    pub async fn update_watchlist(&self, name: &str, auto_restart: bool) -> Result<WatchlistEntry> {
        let result = self.watchlist.update(name, auto_restart).await;
        if applied(&result) {
            self.publisher
                .publish(ServiceEvent::watchlist_updated(name, auto_restart));
        }
        result
    }
}

/// A mutation took effect in memory. Persistence failures keep the change.
fn applied<T>(result: &Result<T>) -> bool {
    matches!(result, Ok(_) | Err(DomainError::Persistence(_)))
}
