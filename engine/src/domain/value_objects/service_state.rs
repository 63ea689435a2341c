//! ServiceState value object
//! Live state of an OS service as reported by the service controller

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Running,
    Stopped,
    /// Start requested, service not yet up
    Starting,
    /// Stop requested, service not yet down
    Stopping,
    /// The controller could not map the platform state
    #[default]
    Unknown,
}

impl ServiceState {
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceState::Running)
    }

    /// Map a systemd `ActiveState` value
    pub fn from_systemd(active_state: &str) -> Self {
        match active_state.trim() {
            "active" | "reloading" => ServiceState::Running,
            "inactive" | "failed" | "dead" => ServiceState::Stopped,
            "activating" => ServiceState::Starting,
            "deactivating" => ServiceState::Stopping,
            _ => ServiceState::Unknown,
        }
    }

    /// Map the state name printed by `sc.exe query` (e.g. `RUNNING`, `STOP_PENDING`)
    pub fn from_windows(state: &str) -> Self {
        match state.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => ServiceState::Running,
            "STOPPED" => ServiceState::Stopped,
            "START_PENDING" | "CONTINUE_PENDING" => ServiceState::Starting,
            "STOP_PENDING" | "PAUSE_PENDING" => ServiceState::Stopping,
            _ => ServiceState::Unknown,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Running => write!(f, "running"),
            ServiceState::Stopped => write!(f, "stopped"),
            ServiceState::Starting => write!(f, "starting"),
            ServiceState::Stopping => write!(f, "stopping"),
            ServiceState::Unknown => write!(f, "unknown"),
        }
    }
}
