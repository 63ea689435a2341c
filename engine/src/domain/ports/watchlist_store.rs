//! WatchlistStore port
//! Durable storage for the full watchlist snapshot

use crate::domain::{Result, WatchlistEntry};

/// Synchronous by contract: the registry rewrites the snapshot while it holds
/// its write lock, before reporting a mutation as done.
pub trait WatchlistStore: Send + Sync {
    /// Load every persisted entry. A store that was never written loads empty.
    fn load(&self) -> Result<Vec<WatchlistEntry>>;

    /// Replace the stored snapshot with `entries`
    fn save(&self, entries: &[WatchlistEntry]) -> Result<()>;
}
