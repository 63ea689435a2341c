//! EventSink port
//! Write-only destination for emitted events (e.g. an on-disk journal)

use crate::domain::ServiceEvent;

pub trait EventSink: Send + Sync {
    /// Record one event. Sinks report their own failures; emission never fails.
    fn record(&self, event: &ServiceEvent);
}
