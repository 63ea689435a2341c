//! Event journal
//! Appends every published event as one JSON line to a daily rolling file

use crate::constants::events::JOURNAL_FILE_PREFIX;
use crate::domain::{ports::EventSink, DomainError, Result, ServiceEvent};
use chrono::SecondsFormat;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

pub struct EventJournal {
    writer: Mutex<RollingFileAppender>,
}

impl EventJournal {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            DomainError::InvalidConfiguration(format!("event log dir {}: {e}", dir.display()))
        })?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(JOURNAL_FILE_PREFIX)
            .build(dir)
            .map_err(|e| {
                DomainError::InvalidConfiguration(format!("event log in {}: {e}", dir.display()))
            })?;

        Ok(Self {
            writer: Mutex::new(appender),
        })
    }
}

/// `{"time":..,"level":..,"event":..,"data":..}`
fn journal_line(event: &ServiceEvent) -> String {
    let level = if event.kind.is_failure() { "ERROR" } else { "INFO" };
    json!({
        "time": event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        "level": level,
        "event": event.kind.as_str(),
        "data": event.payload,
    })
    .to_string()
}

impl EventSink for EventJournal {
    fn record(&self, event: &ServiceEvent) {
        let mut line = journal_line(event);
        line.push('\n');

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer.write_all(line.as_bytes()) {
            warn!(event = %event.kind, error = %e, "Failed to write event journal");
        }
    }
}
