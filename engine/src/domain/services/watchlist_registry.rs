//! Watchlist registry
//! Durable, keyed store of monitored services and their restart state
//!
//! Reads share the lock, writes take it exclusively. Every mutation rewrites
//! the full snapshot through the store before returning; if that write fails
//! the in-memory change stays applied and the caller gets `Persistence`.
//! The lock is never held across a service controller call.

use crate::domain::ports::{ServiceController, WatchlistManager, WatchlistStore};
use crate::domain::{DomainError, Result, WatchlistEntry};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use tracing::{debug, error, info};

pub struct WatchlistRegistry {
    entries: RwLock<BTreeMap<String, WatchlistEntry>>,
    store: Arc<dyn WatchlistStore>,
    controller: Arc<dyn ServiceController>,
}

impl WatchlistRegistry {
    /// Load the registry from `store`. Called once at process start.
    pub fn load(
        store: Arc<dyn WatchlistStore>,
        controller: Arc<dyn ServiceController>,
    ) -> Result<Self> {
        let entries: BTreeMap<String, WatchlistEntry> = store
            .load()?
            .into_iter()
            .map(|entry| (entry.service_name().to_string(), entry.persisted()))
            .collect();

        info!(entries = entries.len(), "Watchlist loaded");

        Ok(Self {
            entries: RwLock::new(entries),
            store,
            controller,
        })
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_entries(&self) -> Vec<WatchlistEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, BTreeMap<String, WatchlistEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rewrite the full snapshot. Must be called with the write lock held.
    fn persist(&self, entries: &BTreeMap<String, WatchlistEntry>) -> Result<()> {
        let snapshot: Vec<WatchlistEntry> = entries.values().map(WatchlistEntry::persisted).collect();
        self.store.save(&snapshot).map_err(|e| {
            error!(error = %e, "Failed to persist watchlist, change kept in memory only");
            match e {
                DomainError::Persistence(_) => e,
                other => DomainError::Persistence(other.to_string()),
            }
        })
    }

    /// Apply `f` to the named entry and persist
    fn mutate<T>(&self, name: &str, f: impl FnOnce(&mut WatchlistEntry) -> T) -> Result<T> {
        let mut entries = self.write_lock();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| DomainError::NotFound(name.to_string()))?;
        let result = f(entry);
        self.persist(&entries)?;
        Ok(result)
    }

    async fn enrich(&self, entry: WatchlistEntry) -> WatchlistEntry {
        let snapshot = match self.controller.get(entry.service_name()).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!(
                    service = %entry.service_name(),
                    error = %e,
                    "Live snapshot unavailable"
                );
                None
            }
        };
        entry.with_snapshot(snapshot)
    }
}

#[async_trait]
impl WatchlistManager for WatchlistRegistry {
    async fn list(&self) -> Result<Vec<WatchlistEntry>> {
        let entries = self.read_entries();

        let mut enriched = Vec::with_capacity(entries.len());
        for entry in entries {
            enriched.push(self.enrich(entry).await);
        }
        Ok(enriched)
    }

    async fn get(&self, name: &str) -> Result<WatchlistEntry> {
        let entry = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(name.to_string()))?;

        Ok(self.enrich(entry).await)
    }

    async fn add(&self, name: &str, auto_restart: bool) -> Result<WatchlistEntry> {
        // Resolve before locking
        let snapshot = self.controller.get(name).await.map_err(|e| {
            debug!(service = %name, error = %e, "Cannot resolve service");
            DomainError::NotFound(name.to_string())
        })?;

        let entry = WatchlistEntry::new(name, auto_restart);
        {
            let mut entries = self.write_lock();
            if entries.contains_key(name) {
                return Err(DomainError::AlreadyExists(name.to_string()));
            }
            entries.insert(name.to_string(), entry.clone());
            info!(
                service = %name,
                auto_restart = auto_restart,
                total_entries = entries.len(),
                "Service added to watchlist"
            );
            self.persist(&entries)?;
        }

        Ok(entry.with_snapshot(Some(snapshot)))
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let mut entries = self.write_lock();
        if entries.remove(name).is_none() {
            return Err(DomainError::NotFound(name.to_string()));
        }
        info!(
            service = %name,
            remaining_entries = entries.len(),
            "Service removed from watchlist"
        );
        self.persist(&entries)
    }

    async fn update(&self, name: &str, auto_restart: bool) -> Result<WatchlistEntry> {
        let entry = self.mutate(name, |entry| {
            entry.set_auto_restart(auto_restart);
            entry.clone()
        })?;
        info!(service = %name, auto_restart = auto_restart, "Watchlist entry updated");
        Ok(entry)
    }

    async fn increment_restart_count(&self, name: &str) -> Result<WatchlistEntry> {
        self.mutate(name, |entry| {
            entry.record_restart(Utc::now());
            entry.clone()
        })
    }

    async fn increment_fail_count(&self, name: &str) -> Result<u32> {
        self.mutate(name, WatchlistEntry::record_failure)
    }

    async fn disable_exhausted(&self, name: &str, threshold: u32) -> Result<Option<u32>> {
        let mut entries = self.write_lock();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| DomainError::NotFound(name.to_string()))?;

        if !entry.auto_restart() || entry.fail_count() < threshold {
            return Ok(None);
        }

        let fail_count = entry.fail_count();
        entry.set_auto_restart(false);
        info!(service = %name, fail_count = fail_count, "Auto-restart disabled");
        self.persist(&entries)?;
        Ok(Some(fail_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{FakeServiceController, MockWatchlistStore};
    use crate::domain::ServiceState;

    fn registry_with(
        controller: FakeServiceController,
        store: MockWatchlistStore,
    ) -> WatchlistRegistry {
        WatchlistRegistry::load(Arc::new(store), Arc::new(controller)).unwrap()
    }

    fn controller() -> FakeServiceController {
        FakeServiceController::new()
            .with_service("nginx", ServiceState::Running)
            .with_service("redis", ServiceState::Stopped)
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let store = MockWatchlistStore::new();
        let registry = registry_with(controller(), store.clone());

        let added = registry.add("nginx", true).await.unwrap();
        assert_eq!(added.service_name(), "nginx");
        assert!(added.auto_restart());
        assert_eq!(store.saved().len(), 1);

        let entry = registry.get("nginx").await.unwrap();
        assert_eq!(entry.service().unwrap().state, ServiceState::Running);
    }

    #[tokio::test]
    async fn test_add_unknown_service_is_not_found() {
        let store = MockWatchlistStore::new();
        let registry = registry_with(controller(), store.clone());

        let err = registry.add("ghost", true).await.unwrap_err();
        assert_eq!(err, DomainError::NotFound("ghost".to_string()));
        assert!(registry.is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_add_duplicate_is_rejected() {
        let store = MockWatchlistStore::new();
        let registry = registry_with(controller(), store.clone());

        registry.add("nginx", true).await.unwrap();
        let err = registry.add("nginx", false).await.unwrap_err();

        assert_eq!(err, DomainError::AlreadyExists("nginx".to_string()));
        assert!(registry.get("nginx").await.unwrap().auto_restart());
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_add_remove_get_is_not_found() {
        let registry = registry_with(controller(), MockWatchlistStore::new());

        registry.add("nginx", true).await.unwrap();
        registry.remove("nginx").await.unwrap();

        assert!(registry.get("nginx").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_names_are_not_found() {
        let registry = registry_with(controller(), MockWatchlistStore::new());

        assert!(registry.remove("nginx").await.unwrap_err().is_not_found());
        assert!(registry.update("nginx", true).await.unwrap_err().is_not_found());
        assert!(registry
            .increment_restart_count("nginx")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(registry
            .increment_fail_count("nginx")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_list_tolerates_snapshot_failures() {
        let fake = controller();
        let registry = registry_with(fake.clone(), MockWatchlistStore::new());
        registry.add("nginx", true).await.unwrap();
        registry.add("redis", false).await.unwrap();

        fake.fail_queries("redis", true);
        let entries = registry.list().await.unwrap();

        assert_eq!(entries.len(), 2);
        let nginx = entries.iter().find(|e| e.service_name() == "nginx").unwrap();
        let redis = entries.iter().find(|e| e.service_name() == "redis").unwrap();
        assert!(nginx.service().is_some());
        assert!(redis.service().is_none());
    }

    #[tokio::test]
    async fn test_update_reenable_resets_fail_count() {
        let store = MockWatchlistStore::new();
        let registry = registry_with(controller(), store.clone());
        registry.add("redis", true).await.unwrap();

        registry.increment_fail_count("redis").await.unwrap();
        assert_eq!(registry.increment_fail_count("redis").await.unwrap(), 2);

        let disabled = registry.update("redis", false).await.unwrap();
        assert!(!disabled.auto_restart());
        assert_eq!(disabled.fail_count(), 2);

        let enabled = registry.update("redis", true).await.unwrap();
        assert_eq!(enabled.fail_count(), 0);
        assert_eq!(store.saved()[0].fail_count(), 0);
    }

    #[tokio::test]
    async fn test_disable_exhausted_checks_stored_entry() {
        let store = MockWatchlistStore::new();
        let registry = registry_with(controller(), store.clone());
        registry.add("redis", true).await.unwrap();
        registry.increment_fail_count("redis").await.unwrap();
        registry.increment_fail_count("redis").await.unwrap();

        assert_eq!(registry.disable_exhausted("redis", 3).await.unwrap(), None);
        assert!(registry.get("redis").await.unwrap().auto_restart());

        registry.increment_fail_count("redis").await.unwrap();
        assert_eq!(registry.disable_exhausted("redis", 3).await.unwrap(), Some(3));

        let entry = registry.get("redis").await.unwrap();
        assert!(!entry.auto_restart());
        assert_eq!(entry.fail_count(), 3);
        assert!(!store.saved()[0].auto_restart());

        // Already off: nothing to do, nothing written
        let saves = store.save_count();
        assert_eq!(registry.disable_exhausted("redis", 3).await.unwrap(), None);
        assert_eq!(store.save_count(), saves);

        assert!(registry
            .disable_exhausted("ghost", 3)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_disable_exhausted_skips_reenabled_entry() {
        let registry = registry_with(controller(), MockWatchlistStore::new());
        registry.add("redis", true).await.unwrap();
        for _ in 0..3 {
            registry.increment_fail_count("redis").await.unwrap();
        }

        // Re-enabling clears the counter, so the entry no longer qualifies
        registry.update("redis", true).await.unwrap();

        assert_eq!(registry.disable_exhausted("redis", 3).await.unwrap(), None);
        let entry = registry.get("redis").await.unwrap();
        assert!(entry.auto_restart());
        assert_eq!(entry.fail_count(), 0);
    }

    #[tokio::test]
    async fn test_increment_restart_count_sets_timestamp() {
        let registry = registry_with(controller(), MockWatchlistStore::new());
        registry.add("redis", true).await.unwrap();
        registry.increment_fail_count("redis").await.unwrap();

        let before = Utc::now();
        let entry = registry.increment_restart_count("redis").await.unwrap();

        assert_eq!(entry.restart_count(), 1);
        assert!(entry.last_restart().unwrap() >= before);
        assert_eq!(entry.fail_count(), 1, "success never resets failures");

        let entry = registry.increment_restart_count("redis").await.unwrap();
        assert_eq!(entry.restart_count(), 2);
    }

    #[tokio::test]
    async fn test_fail_count_is_persisted() {
        let store = MockWatchlistStore::new();
        let registry = registry_with(controller(), store.clone());
        registry.add("redis", true).await.unwrap();

        registry.increment_fail_count("redis").await.unwrap();

        assert_eq!(store.saved()[0].fail_count(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_mutation() {
        let store = MockWatchlistStore::new();
        let registry = registry_with(controller(), store.clone());
        registry.add("nginx", true).await.unwrap();

        store.fail_saves(true);
        let err = registry.update("nginx", false).await.unwrap_err();
        assert!(matches!(err, DomainError::Persistence(_)));

        // Applied in memory, not on disk
        assert!(!registry.get("nginx").await.unwrap().auto_restart());
        assert!(store.saved()[0].auto_restart());

        let err = registry.add("redis", true).await.unwrap_err();
        assert!(matches!(err, DomainError::Persistence(_)));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_load_reproduces_saved_entries() {
        let store = MockWatchlistStore::new();
        let registry = registry_with(controller(), store.clone());
        registry.add("nginx", true).await.unwrap();
        registry.add("redis", false).await.unwrap();
        registry.increment_restart_count("nginx").await.unwrap();
        registry.increment_fail_count("redis").await.unwrap();

        let reloaded = registry_with(controller(), MockWatchlistStore::with_entries(store.saved()));

        let strip = |entries: Vec<WatchlistEntry>| -> Vec<WatchlistEntry> {
            entries.iter().map(WatchlistEntry::persisted).collect()
        };
        assert_eq!(
            strip(reloaded.list().await.unwrap()),
            strip(registry.list().await.unwrap())
        );
    }
}
