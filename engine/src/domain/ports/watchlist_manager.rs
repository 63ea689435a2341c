//! WatchlistManager port
//! Registry operations used by the monitor loop and the REST adapter

use crate::domain::{Result, WatchlistEntry};
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WatchlistManager: Send + Sync {
    /// Every entry, each enriched with a best-effort live snapshot
    async fn list(&self) -> Result<Vec<WatchlistEntry>>;

    /// One entry with a best-effort live snapshot
    async fn get(&self, name: &str) -> Result<WatchlistEntry>;

    /// Register a service the controller can resolve
    async fn add(&self, name: &str, auto_restart: bool) -> Result<WatchlistEntry>;

    async fn remove(&self, name: &str) -> Result<()>;

    /// Set the restart policy; enabling it clears the failure counter
    async fn update(&self, name: &str, auto_restart: bool) -> Result<WatchlistEntry>;

    /// Count a successful restart and stamp its time
    async fn increment_restart_count(&self, name: &str) -> Result<WatchlistEntry>;

    /// Count a failed restart, returning the new consecutive-failure count
    async fn increment_fail_count(&self, name: &str) -> Result<u32>;

    /// Turn auto-restart off only if the stored entry still has it on with at
    /// least `threshold` consecutive failures. Returns the failure count when
    /// the entry was disabled, `None` when it no longer qualifies.
    async fn disable_exhausted(&self, name: &str, threshold: u32) -> Result<Option<u32>>;
}
