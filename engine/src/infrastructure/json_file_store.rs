//! JSON file watchlist store
//! Persists the watchlist as a pretty-printed JSON array, replaced atomically

use crate::domain::{ports::WatchlistStore, DomainError, Result, WatchlistEntry};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct JsonFileWatchlistStore {
    path: PathBuf,
}

impl JsonFileWatchlistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WatchlistStore for JsonFileWatchlistStore {
    fn load(&self) -> Result<Vec<WatchlistEntry>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No watchlist file, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(DomainError::Persistence(format!(
                    "reading {}: {e}",
                    self.path.display()
                )))
            }
        };

        let entries: Vec<WatchlistEntry> = serde_json::from_slice(&data).map_err(|e| {
            DomainError::Persistence(format!("parsing {}: {e}", self.path.display()))
        })?;
        Ok(entries.iter().map(WatchlistEntry::persisted).collect())
    }

    fn save(&self, entries: &[WatchlistEntry]) -> Result<()> {
        let persisted: Vec<WatchlistEntry> = entries.iter().map(WatchlistEntry::persisted).collect();
        let data = serde_json::to_vec_pretty(&persisted)
            .map_err(|e| DomainError::Persistence(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DomainError::Persistence(format!("creating {}: {e}", parent.display()))
                })?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &data).map_err(|e| {
            DomainError::Persistence(format!("writing {}: {e}", tmp_path.display()))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            DomainError::Persistence(format!("replacing {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), entries = entries.len(), "Watchlist saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ServiceSnapshot, ServiceState};
    use chrono::Utc;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileWatchlistStore::new(dir.path().join("watchlist.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileWatchlistStore::new(dir.path().join("watchlist.json"));

        let mut nginx = WatchlistEntry::new("nginx", true);
        nginx.record_restart(Utc::now());
        nginx.record_failure();
        let redis = WatchlistEntry::new("redis", false)
            .with_snapshot(Some(ServiceSnapshot::new("redis", ServiceState::Running)));

        store.save(&[nginx.clone(), redis.clone()]).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, vec![nginx, redis.persisted()]);
    }

    #[test]
    fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchlist.json");
        let store = JsonFileWatchlistStore::new(&path);

        let entry = WatchlistEntry::new("sshd", true)
            .with_snapshot(Some(ServiceSnapshot::new("sshd", ServiceState::Running)));
        store.save(&[entry]).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let record = &value[0];
        assert_eq!(record["serviceName"], "sshd");
        assert_eq!(record["autoRestart"], true);
        assert_eq!(record["restartCount"], 0);
        assert_eq!(record["failCount"], 0);
        assert!(record.get("service").is_none());
        assert!(!dir.path().join("watchlist.json.tmp").exists());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileWatchlistStore::new(dir.path().join("state/watchlist.json"));
        store.save(&[WatchlistEntry::new("a", true)]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchlist.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileWatchlistStore::new(&path).load().unwrap_err();
        assert!(matches!(err, DomainError::Persistence(_)));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("watchlist.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let err = JsonFileWatchlistStore::new(&path)
            .save(&[WatchlistEntry::new("a", true)])
            .unwrap_err();
        assert!(matches!(err, DomainError::Persistence(_)));
    }
}
