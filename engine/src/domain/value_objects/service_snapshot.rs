use super::ServiceState;
use serde::{Deserialize, Serialize};

/// Point-in-time read of a service's state and resource usage.
/// Produced fresh on every query and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub state: ServiceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default)]
    pub cpu_percent: f64,
    #[serde(default, rename = "memoryMB")]
    pub memory_mb: f64,
    #[serde(default)]
    pub uptime_seconds: u64,
}

impl ServiceSnapshot {
    /// Snapshot with no resource usage attached
    pub fn new(name: impl Into<String>, state: ServiceState) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            state,
            pid: None,
            cpu_percent: 0.0,
            memory_mb: 0.0,
            uptime_seconds: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }
}
