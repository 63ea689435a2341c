//! Infrastructure layer
//! Platform service controllers, watchlist persistence and the event journal

pub mod command;
pub mod event_journal;
pub mod json_file_store;
pub mod systemd_controller;
pub mod windows_controller;

pub use event_journal::EventJournal;
pub use json_file_store::JsonFileWatchlistStore;
pub use systemd_controller::SystemdServiceController;
pub use windows_controller::WindowsServiceController;

use crate::domain::{ports::ServiceController, DomainError};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which platform service manager to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerKind {
    /// systemd on Unix, the SCM on Windows
    #[default]
    Auto,
    Systemd,
    Windows,
}

impl ControllerKind {
    /// Resolve `Auto` for the host platform
    pub fn resolve(self) -> Self {
        match self {
            ControllerKind::Auto if cfg!(windows) => ControllerKind::Windows,
            ControllerKind::Auto => ControllerKind::Systemd,
            other => other,
        }
    }
}

impl FromStr for ControllerKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(ControllerKind::Auto),
            "systemd" => Ok(ControllerKind::Systemd),
            "windows" | "scm" => Ok(ControllerKind::Windows),
            other => Err(DomainError::InvalidConfiguration(format!(
                "unknown service controller '{other}' (expected auto, systemd or windows)"
            ))),
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerKind::Auto => write!(f, "auto"),
            ControllerKind::Systemd => write!(f, "systemd"),
            ControllerKind::Windows => write!(f, "windows"),
        }
    }
}

pub fn create_controller(kind: ControllerKind) -> Arc<dyn ServiceController> {
    match kind.resolve() {
        ControllerKind::Windows => Arc::new(WindowsServiceController::new()),
        _ => Arc::new(SystemdServiceController::new()),
    }
}
