//! ServiceController port
//! Platform capability to query and control OS services by name

use crate::domain::{Result, ServiceSnapshot};
use async_trait::async_trait;

/// Port for the OS service manager.
///
/// The core makes no assumption about how an implementation talks to the
/// platform; any timeout enforcement belongs to the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceController: Send + Sync {
    /// List every service known to the platform
    async fn list(&self) -> Result<Vec<ServiceSnapshot>>;

    /// Live snapshot of one service. Fails with `NotFound` for unknown names.
    async fn get(&self, name: &str) -> Result<ServiceSnapshot>;

    async fn start(&self, name: &str) -> Result<()>;

    async fn stop(&self, name: &str) -> Result<()>;

    async fn restart(&self, name: &str) -> Result<()>;
}
