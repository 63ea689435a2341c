//! Windows service controller
//! Drives the Service Control Manager through the `windows-service` crate
//!
//! SCM calls block, so each one runs on the blocking pool. Enumeration has no
//! counterpart in the crate and goes through `sc.exe query` instead.

use super::command::{self, CommandOutput};
use crate::constants::controller::{RESTART_PAUSE_MILLIS, STATE_POLL_MILLIS, STATE_WAIT_TIMEOUT_SECS};
use crate::domain::{ports::ServiceController, DomainError, Result, ServiceSnapshot, ServiceState};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// The specified service does not exist as an installed service
pub const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;
pub const ERROR_SERVICE_ALREADY_RUNNING: i32 = 1056;
pub const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;

/// One service as reported by the SCM
#[derive(Debug, Clone, PartialEq)]
pub struct ScmStatus {
    pub state: ServiceState,
    pub pid: Option<u32>,
    pub display_name: Option<String>,
}

/// A failed SCM call, with its Win32 error code when there is one
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ScmError {
    pub code: Option<i32>,
    pub message: String,
}

impl ScmError {
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Blocking access to the Service Control Manager
pub trait ScmClient: Send + Sync {
    fn query(&self, name: &str) -> std::result::Result<ScmStatus, ScmError>;

    /// Ask the SCM to start the service. Returns once the request is accepted.
    fn start(&self, name: &str) -> std::result::Result<(), ScmError>;

    /// Send the stop control. Returns once the request is accepted.
    fn stop(&self, name: &str) -> std::result::Result<(), ScmError>;
}

#[cfg(windows)]
mod win32 {
    use super::{ScmClient, ScmError, ScmStatus};
    use crate::domain::ServiceState;
    use std::ffi::OsStr;
    use windows_service::service::{Service, ServiceAccess, ServiceState as Win32State};
    use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

    impl From<windows_service::Error> for ScmError {
        fn from(e: windows_service::Error) -> Self {
            let code = match &e {
                windows_service::Error::Winapi(io) => io.raw_os_error(),
                _ => None,
            };
            ScmError::new(code, e.to_string())
        }
    }

    fn state_from_scm(state: Win32State) -> ServiceState {
        match state {
            Win32State::Running => ServiceState::Running,
            Win32State::Stopped => ServiceState::Stopped,
            Win32State::StartPending | Win32State::ContinuePending => ServiceState::Starting,
            Win32State::StopPending | Win32State::PausePending => ServiceState::Stopping,
            _ => ServiceState::Unknown,
        }
    }

    /// The local SCM, opened per call
    pub struct LocalScm;

    impl LocalScm {
        fn open(&self, name: &str, access: ServiceAccess) -> Result<Service, ScmError> {
            let manager =
                ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)?;
            Ok(manager.open_service(name, access)?)
        }
    }

    impl ScmClient for LocalScm {
        fn query(&self, name: &str) -> Result<ScmStatus, ScmError> {
            let service = self.open(name, ServiceAccess::QUERY_STATUS | ServiceAccess::QUERY_CONFIG)?;
            let status = service.query_status()?;
            let display_name = service
                .query_config()
                .ok()
                .map(|config| config.display_name.to_string_lossy().into_owned())
                .filter(|name| !name.is_empty());

            Ok(ScmStatus {
                state: state_from_scm(status.current_state),
                pid: status.process_id.filter(|pid| *pid != 0),
                display_name,
            })
        }

        fn start(&self, name: &str) -> Result<(), ScmError> {
            let service = self.open(name, ServiceAccess::START | ServiceAccess::QUERY_STATUS)?;
            service.start(&[] as &[&OsStr])?;
            Ok(())
        }

        fn stop(&self, name: &str) -> Result<(), ScmError> {
            let service = self.open(name, ServiceAccess::STOP | ServiceAccess::QUERY_STATUS)?;
            service.stop()?;
            Ok(())
        }
    }
}

/// Stand-in on hosts without an SCM; every call fails
#[cfg(not(windows))]
struct UnavailableScm;

#[cfg(not(windows))]
impl ScmClient for UnavailableScm {
    fn query(&self, _name: &str) -> std::result::Result<ScmStatus, ScmError> {
        Err(unavailable())
    }

    fn start(&self, _name: &str) -> std::result::Result<(), ScmError> {
        Err(unavailable())
    }

    fn stop(&self, _name: &str) -> std::result::Result<(), ScmError> {
        Err(unavailable())
    }
}

#[cfg(not(windows))]
fn unavailable() -> ScmError {
    ScmError::new(None, "the Service Control Manager is only available on Windows")
}

fn local_scm() -> Arc<dyn ScmClient> {
    #[cfg(windows)]
    {
        Arc::new(win32::LocalScm)
    }
    #[cfg(not(windows))]
    {
        Arc::new(UnavailableScm)
    }
}

#[derive(Clone)]
pub struct WindowsServiceController {
    scm: Arc<dyn ScmClient>,
    wait_timeout: Duration,
    poll_interval: Duration,
}

impl WindowsServiceController {
    pub fn new() -> Self {
        Self::with_client(local_scm())
    }

    pub fn with_client(scm: Arc<dyn ScmClient>) -> Self {
        Self {
            scm,
            wait_timeout: Duration::from_secs(STATE_WAIT_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(STATE_POLL_MILLIS),
        }
    }

    /// Override how long start/stop wait for the target state and how often
    /// they poll while waiting
    pub fn with_timing(mut self, wait_timeout: Duration, poll_interval: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Run a blocking SCM call on the blocking pool
    async fn call<T, F>(&self, name: &str, f: F) -> std::result::Result<T, ScmError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ScmClient, &str) -> std::result::Result<T, ScmError> + Send + 'static,
    {
        let scm = self.scm.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || f(scm.as_ref(), &name))
            .await
            .unwrap_or_else(|e| Err(ScmError::new(None, format!("SCM call aborted: {e}"))))
    }

    /// Poll until the service reports `target` or the wait deadline passes
    async fn wait_for_state(&self, name: &str, target: ServiceState) -> Result<()> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            let snapshot = self.get(name).await?;
            if snapshot.state == target {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DomainError::control(
                    name,
                    format!(
                        "timed out after {}ms waiting for state {target} (last seen {})",
                        self.wait_timeout.as_millis(),
                        snapshot.state
                    ),
                ));
            }
            debug!(service = name, state = %snapshot.state, target = %target, "Waiting for service state");
            sleep(self.poll_interval).await;
        }
    }

    /// Map a start/stop result; `already` is the error code meaning the
    /// service is already in the requested state
    fn control_result(
        name: &str,
        action: &str,
        result: std::result::Result<(), ScmError>,
        already: i32,
    ) -> Result<()> {
        match result {
            Ok(()) => {
                info!(service = name, action = action, "SCM accepted control request");
                Ok(())
            }
            Err(e) if e.code == Some(already) => {
                debug!(service = name, action = action, "Service already in requested state");
                Ok(())
            }
            Err(e) if e.code == Some(ERROR_SERVICE_DOES_NOT_EXIST) => {
                Err(DomainError::NotFound(name.to_string()))
            }
            Err(e) => {
                warn!(service = name, action = action, error = %e, "SCM control request failed");
                Err(DomainError::control(name, e))
            }
        }
    }
}

impl Default for WindowsServiceController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceController for WindowsServiceController {
    async fn list(&self) -> Result<Vec<ServiceSnapshot>> {
        let output = command::run("sc.exe", &["query", "type=", "service", "state=", "all"])
            .await
            .map_err(|reason| DomainError::query("*", reason))?;
        if sc_error_code(&output).is_some() {
            return Err(DomainError::query("*", output.reason()));
        }
        Ok(parse_query_list(&output.stdout))
    }

    async fn get(&self, name: &str) -> Result<ServiceSnapshot> {
        match self.call(name, |scm, name| scm.query(name)).await {
            Ok(status) => Ok(snapshot_from_status(name, status)),
            Err(e) if e.code == Some(ERROR_SERVICE_DOES_NOT_EXIST) => {
                Err(DomainError::NotFound(name.to_string()))
            }
            Err(e) => Err(DomainError::query(name, e)),
        }
    }

    async fn start(&self, name: &str) -> Result<()> {
        let result = self.call(name, |scm, name| scm.start(name)).await;
        Self::control_result(name, "start", result, ERROR_SERVICE_ALREADY_RUNNING)?;
        self.wait_for_state(name, ServiceState::Running).await
    }

    async fn stop(&self, name: &str) -> Result<()> {
        let result = self.call(name, |scm, name| scm.stop(name)).await;
        Self::control_result(name, "stop", result, ERROR_SERVICE_NOT_ACTIVE)?;
        self.wait_for_state(name, ServiceState::Stopped).await
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.stop(name).await?;
        sleep(Duration::from_millis(RESTART_PAUSE_MILLIS)).await;
        self.start(name).await
    }
}

fn snapshot_from_status(name: &str, status: ScmStatus) -> ServiceSnapshot {
    let mut snapshot = ServiceSnapshot::new(name, status.state);
    snapshot.display_name = status.display_name;
    if status.state.is_running() {
        snapshot.pid = status.pid;
    }
    snapshot
}

/// Win32 error code from a failed sc.exe run (`[SC] OpenService FAILED 1060:`)
fn sc_error_code(output: &CommandOutput) -> Option<i32> {
    if output.success() {
        return None;
    }
    let text = format!("{}\n{}", output.stdout, output.stderr);
    text.split("FAILED")
        .nth(1)
        .and_then(|rest| {
            rest.trim_start()
                .split(|c: char| !c.is_ascii_digit())
                .next()
                .and_then(|code| code.parse().ok())
        })
        .or(output.code)
}

/// Value part of an `sc.exe` field line such as `STATE : 4  RUNNING`
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (k, v) = line.split_once(':')?;
    (k.trim() == key).then(|| v.trim())
}

/// Parse the blocks printed by `sc.exe query type= service state= all`
fn parse_query_list(output: &str) -> Vec<ServiceSnapshot> {
    let mut services: Vec<ServiceSnapshot> = Vec::new();
    for line in output.lines() {
        if let Some(name) = field(line, "SERVICE_NAME") {
            services.push(ServiceSnapshot::new(name, ServiceState::Unknown));
        } else if let Some(current) = services.last_mut() {
            if let Some(display) = field(line, "DISPLAY_NAME") {
                current.display_name = Some(display.to_string());
            } else if let Some(value) = field(line, "STATE") {
                // `4  RUNNING` -> `RUNNING`
                let state = value.split_whitespace().nth(1).unwrap_or("");
                current.state = ServiceState::from_windows(state);
            }
        }
    }
    services
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory SCM. A missing service answers 1060 to everything.
    #[derive(Default)]
    struct FakeScm {
        state: Mutex<Option<ServiceState>>,
        /// Whether accepted start/stop requests change the state
        settles: bool,
        start_error: Option<i32>,
        stop_error: Option<i32>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeScm {
        fn with_state(state: ServiceState) -> Self {
            Self {
                state: Mutex::new(Some(state)),
                settles: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn control(
            &self,
            op: &'static str,
            error: Option<i32>,
            target: ServiceState,
        ) -> std::result::Result<(), ScmError> {
            self.calls.lock().unwrap().push(op);
            let mut state = self.state.lock().unwrap();
            if state.is_none() {
                return Err(ScmError::new(Some(ERROR_SERVICE_DOES_NOT_EXIST), "no such service"));
            }
            if let Some(code) = error {
                return Err(ScmError::new(Some(code), format!("{op} failed")));
            }
            if self.settles {
                *state = Some(target);
            }
            Ok(())
        }
    }

    impl ScmClient for FakeScm {
        fn query(&self, _name: &str) -> std::result::Result<ScmStatus, ScmError> {
            match *self.state.lock().unwrap() {
                Some(state) => Ok(ScmStatus {
                    state,
                    pid: Some(4242),
                    display_name: Some("Print Spooler".to_string()),
                }),
                None => Err(ScmError::new(Some(ERROR_SERVICE_DOES_NOT_EXIST), "no such service")),
            }
        }

        fn start(&self, _name: &str) -> std::result::Result<(), ScmError> {
            self.control("start", self.start_error, ServiceState::Running)
        }

        fn stop(&self, _name: &str) -> std::result::Result<(), ScmError> {
            self.control("stop", self.stop_error, ServiceState::Stopped)
        }
    }

    fn controller(scm: FakeScm) -> (WindowsServiceController, Arc<FakeScm>) {
        let scm = Arc::new(scm);
        let controller = WindowsServiceController::with_client(scm.clone())
            .with_timing(Duration::from_millis(100), Duration::from_millis(10));
        (controller, scm)
    }

    #[tokio::test]
    async fn test_get_maps_status() {
        let (controller, _) = controller(FakeScm::with_state(ServiceState::Running));

        let snapshot = controller.get("Spooler").await.unwrap();
        assert_eq!(snapshot.state, ServiceState::Running);
        assert_eq!(snapshot.pid, Some(4242));
        assert_eq!(snapshot.display_name.as_deref(), Some("Print Spooler"));
    }

    #[tokio::test]
    async fn test_stopped_service_has_no_pid() {
        let (controller, _) = controller(FakeScm::with_state(ServiceState::Stopped));

        let snapshot = controller.get("Spooler").await.unwrap();
        assert_eq!(snapshot.pid, None);
    }

    #[tokio::test]
    async fn test_unknown_service_is_not_found() {
        let (controller, _) = controller(FakeScm::default());

        assert!(controller.get("ghost").await.unwrap_err().is_not_found());
        assert!(controller.start("ghost").await.unwrap_err().is_not_found());
        assert!(controller.stop("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_start_waits_for_running() {
        let (controller, scm) = controller(FakeScm::with_state(ServiceState::Stopped));

        controller.start("Spooler").await.unwrap();

        assert_eq!(scm.calls(), vec!["start"]);
        assert_eq!(controller.get("Spooler").await.unwrap().state, ServiceState::Running);
    }

    #[tokio::test]
    async fn test_already_running_is_success() {
        let (controller, _) = controller(FakeScm {
            start_error: Some(ERROR_SERVICE_ALREADY_RUNNING),
            ..FakeScm::with_state(ServiceState::Running)
        });

        controller.start("Spooler").await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_not_active_is_success() {
        let (controller, _) = controller(FakeScm {
            stop_error: Some(ERROR_SERVICE_NOT_ACTIVE),
            ..FakeScm::with_state(ServiceState::Stopped)
        });

        controller.stop("Spooler").await.unwrap();
    }

    #[tokio::test]
    async fn test_other_codes_are_control_errors() {
        let (controller, _) = controller(FakeScm {
            start_error: Some(5),
            ..FakeScm::with_state(ServiceState::Stopped)
        });

        let err = controller.start("Spooler").await.unwrap_err();
        assert!(matches!(err, DomainError::Control { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_start_times_out_when_state_never_reached() {
        let (controller, scm) = controller(FakeScm {
            settles: false,
            ..FakeScm::with_state(ServiceState::Stopped)
        });

        let started = std::time::Instant::now();
        let err = controller.start("Spooler").await.unwrap_err();

        match err {
            DomainError::Control { reason, .. } => {
                assert!(reason.contains("timed out"), "{reason}");
                assert!(reason.contains("last seen stopped"), "{reason}");
            }
            other => panic!("expected a control error, got {other:?}"),
        }
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(scm.calls(), vec!["start"]);
    }

    #[tokio::test]
    async fn test_restart_stops_then_starts() {
        let (controller, scm) = controller(FakeScm::with_state(ServiceState::Running));

        controller.restart("Spooler").await.unwrap();

        assert_eq!(scm.calls(), vec!["stop", "start"]);
        assert_eq!(controller.get("Spooler").await.unwrap().state, ServiceState::Running);
    }

    #[test]
    fn test_parse_query_list() {
        let output = "
SERVICE_NAME: Spooler
DISPLAY_NAME: Print Spooler
        TYPE               : 110  WIN32_OWN_PROCESS  (interactive)
        STATE              : 4  RUNNING

SERVICE_NAME: wuauserv
DISPLAY_NAME: Windows Update
        TYPE               : 20  WIN32_SHARE_PROCESS
        STATE              : 1  STOPPED
";
        let services = parse_query_list(output);
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].name, "Spooler");
        assert_eq!(services[0].display_name.as_deref(), Some("Print Spooler"));
        assert_eq!(services[0].state, ServiceState::Running);
        assert_eq!(services[1].name, "wuauserv");
        assert_eq!(services[1].state, ServiceState::Stopped);
    }

    #[test]
    fn test_error_code_from_output() {
        let failed = |code: i32, stdout: &str| CommandOutput {
            code: Some(code),
            stdout: stdout.to_string(),
            stderr: String::new(),
        };

        let out = failed(
            1060,
            "[SC] EnumQueryServicesStatus:OpenService FAILED 1060:\n\nThe specified service does not exist as an installed service.\n",
        );
        assert_eq!(sc_error_code(&out), Some(ERROR_SERVICE_DOES_NOT_EXIST));

        let out = failed(5, "Access is denied.");
        assert_eq!(sc_error_code(&out), Some(5));

        let ok = CommandOutput {
            code: Some(0),
            stdout: "SERVICE_NAME: Spooler\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(sc_error_code(&ok), None);
    }
}
