//! WatchlistEntry entity
//! A registered service plus its restart policy and failure/restart counters

use crate::domain::ServiceSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistEntry {
    service_name: String,
    auto_restart: bool,
    #[serde(default)]
    restart_count: u64,
    /// Consecutive failed restart attempts
    #[serde(default)]
    fail_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_restart: Option<DateTime<Utc>>,

    // Read-time enrichment, never written by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service: Option<ServiceSnapshot>,
}

impl WatchlistEntry {
    pub fn new(service_name: impl Into<String>, auto_restart: bool) -> Self {
        Self {
            service_name: service_name.into(),
            auto_restart,
            restart_count: 0,
            fail_count: 0,
            last_restart: None,
            service: None,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    pub fn restart_count(&self) -> u64 {
        self.restart_count
    }

    pub fn fail_count(&self) -> u32 {
        self.fail_count
    }

    pub fn last_restart(&self) -> Option<DateTime<Utc>> {
        self.last_restart
    }

    pub fn service(&self) -> Option<&ServiceSnapshot> {
        self.service.as_ref()
    }

    /// Change the restart policy. Re-enabling clears the failure counter.
    pub fn set_auto_restart(&mut self, auto_restart: bool) {
        if auto_restart {
            self.fail_count = 0;
        }
        self.auto_restart = auto_restart;
    }

    /// Record a successful restart. Leaves the failure counter untouched.
    pub fn record_restart(&mut self, at: DateTime<Utc>) {
        self.restart_count += 1;
        self.last_restart = Some(at);
    }

    /// Record a failed restart attempt, returning the new counter value
    pub fn record_failure(&mut self) -> u32 {
        self.fail_count += 1;
        self.fail_count
    }

    pub fn with_snapshot(mut self, snapshot: Option<ServiceSnapshot>) -> Self {
        self.service = snapshot;
        self
    }

    /// Copy suitable for persistence (live snapshot stripped)
    pub fn persisted(&self) -> Self {
        Self {
            service: None,
            ..self.clone()
        }
    }
}
