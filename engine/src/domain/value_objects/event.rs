//! ServiceEvent value object
//! State-change notification delivered to subscribers and the event journal

use super::ServiceSnapshot;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    WatcherStarted,
    ServiceRestarting,
    RestartSuccess,
    RestartFailed,
    /// Retries exhausted, auto-restart has been switched off
    ServiceFailed,
    ServiceStatus,
    WatchlistAdded,
    WatchlistRemoved,
    WatchlistUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::WatcherStarted => "watcher_started",
            EventKind::ServiceRestarting => "service_restarting",
            EventKind::RestartSuccess => "restart_success",
            EventKind::RestartFailed => "restart_failed",
            EventKind::ServiceFailed => "service_failed",
            EventKind::ServiceStatus => "service_status",
            EventKind::WatchlistAdded => "watchlist_added",
            EventKind::WatchlistRemoved => "watchlist_removed",
            EventKind::WatchlistUpdated => "watchlist_updated",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, EventKind::RestartFailed | EventKind::ServiceFailed)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl ServiceEvent {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn watcher_started(interval_secs: u64) -> Self {
        Self::new(
            EventKind::WatcherStarted,
            json!({ "interval_seconds": interval_secs }),
        )
    }

    pub fn restarting(service: &str, snapshot: &ServiceSnapshot) -> Self {
        Self::new(
            EventKind::ServiceRestarting,
            json!({
                "service_name": service,
                "state": snapshot.state,
            }),
        )
    }

    pub fn restart_success(service: &str, restart_count: u64) -> Self {
        Self::new(
            EventKind::RestartSuccess,
            json!({
                "service_name": service,
                "restart_count": restart_count,
            }),
        )
    }

    pub fn restart_failed(service: &str, fail_count: u32, error: &str) -> Self {
        Self::new(
            EventKind::RestartFailed,
            json!({
                "service_name": service,
                "fail_count": fail_count,
                "error": error,
                "message": "Service failed to restart",
            }),
        )
    }

    pub fn service_failed(service: &str, fail_count: u32) -> Self {
        Self::new(
            EventKind::ServiceFailed,
            json!({
                "service_name": service,
                "fail_count": fail_count,
                "message": "Service has failed multiple times, manual intervention required",
            }),
        )
    }

    pub fn status(snapshot: &ServiceSnapshot) -> Self {
        Self::new(
            EventKind::ServiceStatus,
            json!({
                "service_name": snapshot.name,
                "state": snapshot.state,
                "pid": snapshot.pid,
                "cpu_percent": snapshot.cpu_percent,
                "memory_mb": snapshot.memory_mb,
                "uptime_seconds": snapshot.uptime_seconds,
            }),
        )
    }

    pub fn watchlist_added(service: &str, auto_restart: bool) -> Self {
        Self::new(
            EventKind::WatchlistAdded,
            json!({ "service_name": service, "auto_restart": auto_restart }),
        )
    }

    pub fn watchlist_removed(service: &str) -> Self {
        Self::new(EventKind::WatchlistRemoved, json!({ "service_name": service }))
    }

    pub fn watchlist_updated(service: &str, auto_restart: bool) -> Self {
        Self::new(
            EventKind::WatchlistUpdated,
            json!({ "service_name": service, "auto_restart": auto_restart }),
        )
    }

    pub fn service_name(&self) -> Option<&str> {
        self.payload.get("service_name").and_then(Value::as_str)
    }

    /// Payload with the emission time folded in, as sent on the wire
    pub fn data(&self) -> Value {
        let mut data = self.payload.clone();
        if let Value::Object(ref mut map) = data {
            map.insert(
                "timestamp".to_string(),
                Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }
        data
    }

    /// `event: <type>\ndata: <json>\n\n`
    pub fn to_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.kind, self.data())
    }
}
