//! Monitor service
//! Periodic decision loop reconciling watchlist entries against live state
//!
//! Ticks never overlap and entries within a tick are evaluated one after the
//! other. The failure threshold is checked against the counter as it stood at
//! the start of the tick, so the failure that reaches the threshold is acted
//! upon by the following tick.

use crate::constants::monitor::{DEFAULT_INTERVAL_SECS, FAIL_THRESHOLD};
use crate::domain::ports::{ServiceController, WatchlistManager};
use crate::domain::services::EventPublisher;
use crate::domain::{DomainError, Result, ServiceEvent, ServiceSnapshot, WatchlistEntry};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a tick decided for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Auto-restart off or no live snapshot
    Skipped,
    Healthy,
    Restarted { restart_count: u64 },
    RestartFailed { fail_count: u32 },
    /// Threshold reached, auto-restart switched off
    Disabled { fail_count: u32 },
}

#[derive(Debug, Default)]
pub struct TickSummary {
    pub outcomes: Vec<(String, EntryOutcome)>,
}

impl TickSummary {
    pub fn outcome(&self, service: &str) -> Option<&EntryOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == service)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, pred: impl Fn(&EntryOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

const MIN_INTERVAL: Duration = Duration::from_secs(1);

pub struct MonitorService {
    watchlist: Arc<dyn WatchlistManager>,
    controller: Arc<dyn ServiceController>,
    publisher: Arc<EventPublisher>,
    interval: Duration,
    fail_threshold: u32,
}

impl MonitorService {
    pub fn new(
        watchlist: Arc<dyn WatchlistManager>,
        controller: Arc<dyn ServiceController>,
        publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            watchlist,
            controller,
            publisher,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            fail_threshold: FAIL_THRESHOLD,
        }
    }

    /// Set the tick period. Periods under one second are raised to one second.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "Monitor interval too short, using one second"
            );
        }
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one tick immediately, then one per interval until cancelled.
    /// Cancellation is only observed between ticks.
    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Service monitor started");
        self.publisher
            .publish(ServiceEvent::watcher_started(self.interval.as_secs()));

        self.tick().await;

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    info!("Service monitor received shutdown signal");
                    break;
                }
                _ = ticker.tick() => self.tick().await,
            }
        }

        info!("Service monitor stopped");
    }

    async fn tick(&self) {
        match self.check_services().await {
            Ok(summary) => debug!(
                entries = summary.outcomes.len(),
                restarted = summary.count(|o| matches!(o, EntryOutcome::Restarted { .. })),
                failed = summary.count(|o| matches!(o, EntryOutcome::RestartFailed { .. })),
                disabled = summary.count(|o| matches!(o, EntryOutcome::Disabled { .. })),
                "Monitor tick complete"
            ),
            Err(e) => error!(error = %e, "Failed to list watchlist, skipping tick"),
        }
    }

    /// Evaluate every watchlist entry once.
    /// Fails only when the watchlist itself cannot be listed.
    pub async fn check_services(&self) -> Result<TickSummary> {
        let entries = self.watchlist.list().await?;

        let mut summary = TickSummary::default();
        for entry in entries {
            let outcome = self.evaluate(&entry).await;
            summary
                .outcomes
                .push((entry.service_name().to_string(), outcome));
        }
        Ok(summary)
    }

    async fn evaluate(&self, entry: &WatchlistEntry) -> EntryOutcome {
        if !entry.auto_restart() {
            return EntryOutcome::Skipped;
        }
        let Some(snapshot) = entry.service() else {
            debug!(service = %entry.service_name(), "No live snapshot, skipping");
            return EntryOutcome::Skipped;
        };

        if snapshot.is_running() {
            self.publisher.publish(ServiceEvent::status(snapshot));
            return EntryOutcome::Healthy;
        }

        if entry.fail_count() >= self.fail_threshold {
            return self.disable(entry).await;
        }

        self.restart(entry, snapshot).await
    }

    /// Switch auto-restart off. The registry re-checks the stored entry under
    /// its write lock, so a re-enable made since the tick started wins.
    async fn disable(&self, entry: &WatchlistEntry) -> EntryOutcome {
        let name = entry.service_name();

        let fail_count = match self
            .watchlist
            .disable_exhausted(name, self.fail_threshold)
            .await
        {
            Ok(Some(fail_count)) => fail_count,
            Ok(None) => {
                debug!(service = %name, "Entry changed since tick start, not disabling");
                return EntryOutcome::Skipped;
            }
            Err(DomainError::Persistence(e)) => {
                error!(service = %name, error = %e, "Failed to persist disabled auto-restart");
                entry.fail_count()
            }
            Err(e) => {
                warn!(service = %name, error = %e, "Failed to disable auto-restart");
                return EntryOutcome::Skipped;
            }
        };

        warn!(
            service = %name,
            fail_count = fail_count,
            "Service has exhausted its restart attempts, auto-restart disabled"
        );
        self.publisher
            .publish(ServiceEvent::service_failed(name, fail_count));

        EntryOutcome::Disabled { fail_count }
    }

    async fn restart(&self, entry: &WatchlistEntry, snapshot: &ServiceSnapshot) -> EntryOutcome {
        let name = entry.service_name();
        info!(service = %name, state = %snapshot.state, "Service is down, attempting restart");
        self.publisher
            .publish(ServiceEvent::restarting(name, snapshot));

        match self.controller.start(name).await {
            Ok(()) => {
                let restart_count = match self.watchlist.increment_restart_count(name).await {
                    Ok(updated) => updated.restart_count(),
                    Err(e) => {
                        warn!(service = %name, error = %e, "Failed to record restart");
                        entry.restart_count() + 1
                    }
                };
                info!(service = %name, restart_count = restart_count, "Service restarted");
                self.publisher
                    .publish(ServiceEvent::restart_success(name, restart_count));
                EntryOutcome::Restarted { restart_count }
            }
            Err(start_err) => {
                let fail_count = match self.watchlist.increment_fail_count(name).await {
                    Ok(count) => count,
                    Err(e) => {
                        warn!(service = %name, error = %e, "Failed to record restart failure");
                        entry.fail_count() + 1
                    }
                };
                warn!(
                    service = %name,
                    fail_count = fail_count,
                    error = %start_err,
                    "Service restart failed"
                );
                self.publisher.publish(ServiceEvent::restart_failed(
                    name,
                    fail_count,
                    &start_err.to_string(),
                ));
                EntryOutcome::RestartFailed { fail_count }
            }
        }
    }
}
