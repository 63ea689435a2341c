//! systemd service controller
//! Drives units through `systemctl` and reads their properties with `systemctl show`

use super::command::{self, CommandOutput};
use crate::domain::{ports::ServiceController, DomainError, Result, ServiceSnapshot, ServiceState};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{info, warn};

const SYSTEMCTL: &str = "systemctl";

const SHOW_PROPERTIES: &str = "Id,Description,LoadState,ActiveState,MainPID,MemoryCurrent,\
CPUUsageNSec,ActiveEnterTimestampMonotonic";

#[derive(Debug, Default, Clone)]
pub struct SystemdServiceController;

impl SystemdServiceController {
    pub fn new() -> Self {
        Self
    }

    async fn systemctl(&self, service: &str, args: &[&str]) -> Result<CommandOutput> {
        command::run(SYSTEMCTL, args)
            .await
            .map_err(|reason| DomainError::query(service, reason))
    }

    async fn control(&self, verb: &str, name: &str) -> Result<()> {
        let unit = unit_name(name);
        let output = command::run(SYSTEMCTL, &[verb, &unit])
            .await
            .map_err(|reason| DomainError::control(name, reason))?;

        if output.success() {
            info!(service = name, action = verb, "systemctl action completed");
            return Ok(());
        }

        let reason = output.reason();
        // exit status 5: unit not loaded / not found
        if output.code == Some(5) || reason.contains("not found") {
            return Err(DomainError::NotFound(name.to_string()));
        }
        warn!(service = name, action = verb, reason = %reason, "systemctl action failed");
        Err(DomainError::control(name, reason))
    }
}

#[async_trait]
impl ServiceController for SystemdServiceController {
    async fn list(&self) -> Result<Vec<ServiceSnapshot>> {
        let output = self
            .systemctl(
                "*",
                &[
                    "list-units",
                    "--type=service",
                    "--all",
                    "--no-legend",
                    "--no-pager",
                    "--plain",
                ],
            )
            .await?;
        if !output.success() {
            return Err(DomainError::query("*", output.reason()));
        }
        Ok(parse_list_units(&output.stdout))
    }

    async fn get(&self, name: &str) -> Result<ServiceSnapshot> {
        let unit = unit_name(name);
        let property_arg = format!("--property={SHOW_PROPERTIES}");
        let output = self
            .systemctl(name, &["show", &unit, &property_arg, "--no-pager"])
            .await?;
        if !output.success() {
            return Err(DomainError::query(name, output.reason()));
        }

        let properties = parse_properties(&output.stdout);
        snapshot_from_properties(name, &properties, monotonic_now_micros())
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.control("start", name).await
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.control("stop", name).await
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.control("restart", name).await
    }
}

/// `nginx` -> `nginx.service`; names that already carry a unit suffix are kept
fn unit_name(name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{name}.service")
    }
}

fn service_name(unit: &str) -> &str {
    unit.strip_suffix(".service").unwrap_or(unit)
}

/// Parse `Key=Value` lines
fn parse_properties(output: &str) -> HashMap<&str, &str> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect()
}

/// Numeric systemd property; unset values (`[not set]`, `infinity`, u64::MAX) read as None
fn numeric(properties: &HashMap<&str, &str>, key: &str) -> Option<u64> {
    properties
        .get(key)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v != u64::MAX)
}

/// Build a snapshot from `systemctl show` properties.
///
/// `now_micros` is the current monotonic clock in microseconds, used to derive
/// uptime and the lifetime average CPU usage.
fn snapshot_from_properties(
    name: &str,
    properties: &HashMap<&str, &str>,
    now_micros: Option<u64>,
) -> Result<ServiceSnapshot> {
    if properties.get("LoadState").copied() == Some("not-found") {
        return Err(DomainError::NotFound(name.to_string()));
    }

    let state = properties
        .get("ActiveState")
        .map(|s| ServiceState::from_systemd(s))
        .unwrap_or_default();

    let mut snapshot = ServiceSnapshot::new(name, state);
    snapshot.display_name = properties
        .get("Description")
        .filter(|d| !d.is_empty())
        .map(|d| d.to_string());

    if !state.is_running() {
        return Ok(snapshot);
    }

    snapshot.pid = numeric(properties, "MainPID")
        .filter(|pid| *pid != 0)
        .and_then(|pid| u32::try_from(pid).ok());
    snapshot.memory_mb = numeric(properties, "MemoryCurrent")
        .map(|bytes| bytes as f64 / (1024.0 * 1024.0))
        .unwrap_or(0.0);

    let entered = numeric(properties, "ActiveEnterTimestampMonotonic").filter(|t| *t > 0);
    if let (Some(entered), Some(now)) = (entered, now_micros) {
        let elapsed_micros = now.saturating_sub(entered);
        snapshot.uptime_seconds = elapsed_micros / 1_000_000;

        if let Some(cpu_nanos) = numeric(properties, "CPUUsageNSec") {
            if elapsed_micros > 0 {
                snapshot.cpu_percent = cpu_nanos as f64 / (elapsed_micros as f64 * 1000.0) * 100.0;
            }
        }
    }

    Ok(snapshot)
}

/// Parse `systemctl list-units --plain --no-legend` rows:
/// `UNIT LOAD ACTIVE SUB DESCRIPTION...`
fn parse_list_units(output: &str) -> Vec<ServiceSnapshot> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let unit = fields.next()?;
            let load = fields.next()?;
            let active = fields.next()?;
            let _sub = fields.next()?;
            let description = fields.collect::<Vec<_>>().join(" ");

            if !unit.ends_with(".service") || load == "not-found" {
                return None;
            }

            let mut snapshot =
                ServiceSnapshot::new(service_name(unit), ServiceState::from_systemd(active));
            if !description.is_empty() {
                snapshot.display_name = Some(description);
            }
            Some(snapshot)
        })
        .collect()
}

/// Current CLOCK_MONOTONIC reading in microseconds, the clock systemd uses
/// for `*TimestampMonotonic` properties
#[cfg(unix)]
fn monotonic_now_micros() -> Option<u64> {
    // SAFETY: timespec is plain data and `ts` stays writable for the call
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    if rc != 0 {
        return None;
    }
    let secs = u64::try_from(ts.tv_sec).ok()?;
    let nanos = u64::try_from(ts.tv_nsec).ok()?;
    Some(secs * 1_000_000 + nanos / 1_000)
}

#[cfg(not(unix))]
fn monotonic_now_micros() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW_RUNNING: &str = "\
Id=nginx.service
Description=A high performance web server
LoadState=loaded
ActiveState=active
MainPID=1234
MemoryCurrent=52428800
CPUUsageNSec=5000000000
ActiveEnterTimestampMonotonic=100000000
";

    #[test]
    fn test_unit_name() {
        assert_eq!(unit_name("nginx"), "nginx.service");
        assert_eq!(unit_name("backup.timer"), "backup.timer");
        assert_eq!(service_name("nginx.service"), "nginx");
    }

    #[test]
    fn test_running_snapshot() {
        let props = parse_properties(SHOW_RUNNING);
        // 100s after the unit became active
        let snapshot = snapshot_from_properties("nginx", &props, Some(200_000_000)).unwrap();

        assert_eq!(snapshot.name, "nginx");
        assert_eq!(snapshot.state, ServiceState::Running);
        assert_eq!(snapshot.display_name.as_deref(), Some("A high performance web server"));
        assert_eq!(snapshot.pid, Some(1234));
        assert_eq!(snapshot.memory_mb, 50.0);
        assert_eq!(snapshot.uptime_seconds, 100);
        assert!((snapshot.cpu_percent - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_stopped_snapshot_has_no_usage() {
        let props = parse_properties(
            "LoadState=loaded\nActiveState=failed\nMainPID=0\nMemoryCurrent=[not set]\n",
        );
        let snapshot = snapshot_from_properties("redis", &props, Some(1)).unwrap();

        assert_eq!(snapshot.state, ServiceState::Stopped);
        assert_eq!(snapshot.pid, None);
        assert_eq!(snapshot.memory_mb, 0.0);
        assert_eq!(snapshot.uptime_seconds, 0);
    }

    #[test]
    fn test_unset_memory_is_zero() {
        let props = parse_properties(
            "LoadState=loaded\nActiveState=active\nMainPID=7\nMemoryCurrent=18446744073709551615\n",
        );
        let snapshot = snapshot_from_properties("svc", &props, None).unwrap();
        assert_eq!(snapshot.pid, Some(7));
        assert_eq!(snapshot.memory_mb, 0.0);
        assert_eq!(snapshot.cpu_percent, 0.0);
    }

    #[test]
    fn test_missing_unit_is_not_found() {
        let props = parse_properties("Id=ghost.service\nLoadState=not-found\nActiveState=inactive\n");
        let err = snapshot_from_properties("ghost", &props, None).unwrap_err();
        assert_eq!(err, DomainError::NotFound("ghost".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_monotonic_clock_trails_boot_clock() {
        let first = monotonic_now_micros().unwrap();
        let second = monotonic_now_micros().unwrap();
        assert!(second >= first);

        // CLOCK_MONOTONIC stands still across suspend, so it never runs ahead
        // of CLOCK_BOOTTIME as reported by /proc/uptime
        if let Ok(contents) = std::fs::read_to_string("/proc/uptime") {
            let boot_secs: f64 = contents.split_whitespace().next().unwrap().parse().unwrap();
            assert!(second / 1_000_000 <= boot_secs.ceil() as u64);
        }
    }

    #[test]
    fn test_uptime_measured_from_active_enter() {
        let props = parse_properties(SHOW_RUNNING);
        // Entered at 100s on the monotonic clock, observed at 160.5s
        let snapshot = snapshot_from_properties("nginx", &props, Some(160_500_000)).unwrap();
        assert_eq!(snapshot.uptime_seconds, 60);
    }

    #[test]
    fn test_parse_list_units() {
        let output = "\
nginx.service          loaded    active   running A high performance web server
ghost.service          not-found inactive dead    ghost.service
cron.service           loaded    inactive dead    Regular background program processing daemon
systemd-journald.socket loaded   active   running Journal Socket
";
        let services = parse_list_units(output);
        assert_eq!(services.len(), 2);

        assert_eq!(services[0].name, "nginx");
        assert_eq!(services[0].state, ServiceState::Running);
        assert_eq!(
            services[0].display_name.as_deref(),
            Some("A high performance web server")
        );

        assert_eq!(services[1].name, "cron");
        assert_eq!(services[1].state, ServiceState::Stopped);
    }
}
