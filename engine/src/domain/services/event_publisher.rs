//! Event publisher
//! Single emission point: structured log line, optional sinks, then fan-out

use crate::domain::ports::EventSink;
use crate::domain::services::EventBroadcaster;
use crate::domain::ServiceEvent;
use std::sync::Arc;
use tracing::{info, warn};

pub struct EventPublisher {
    broadcaster: Arc<EventBroadcaster>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventPublisher {
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            broadcaster,
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    pub fn publish(&self, event: ServiceEvent) {
        let service = event.service_name().unwrap_or("-");
        if event.kind.is_failure() {
            warn!(event = %event.kind, service = %service, data = %event.payload, "Event");
        } else {
            info!(event = %event.kind, service = %service, data = %event.payload, "Event");
        }

        for sink in &self.sinks {
            sink.record(&event);
        }
        self.broadcaster.broadcast(&event);
    }
}
