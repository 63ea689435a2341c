//! Mock store implementation for testing
//! Keeps the last saved snapshot in memory and can be told to fail writes

use crate::domain::{DomainError, Result, WatchlistEntry};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::WatchlistStore;

#[derive(Clone, Default)]
pub struct MockWatchlistStore {
    snapshot: Arc<Mutex<Vec<WatchlistEntry>>>,
    fail_saves: Arc<AtomicBool>,
    save_count: Arc<AtomicUsize>,
}

impl MockWatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with entries, as if loaded from disk
    pub fn with_entries(entries: Vec<WatchlistEntry>) -> Self {
        let store = Self::new();
        *store.snapshot.lock().unwrap() = entries;
        store
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    pub fn saved(&self) -> Vec<WatchlistEntry> {
        self.snapshot.lock().unwrap().clone()
    }
}

impl WatchlistStore for MockWatchlistStore {
    fn load(&self) -> Result<Vec<WatchlistEntry>> {
        Ok(self.snapshot.lock().unwrap().clone())
    }

    fn save(&self, entries: &[WatchlistEntry]) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(DomainError::Persistence("disk full".to_string()));
        }
        self.save_count.fetch_add(1, Ordering::SeqCst);
        *self.snapshot.lock().unwrap() = entries.to_vec();
        Ok(())
    }
}
