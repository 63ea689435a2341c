//! In-memory service controller for testing
//! Services live in a map; starts can be made to fail per service

use crate::domain::{DomainError, Result, ServiceSnapshot, ServiceState};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::ServiceController;

#[derive(Default)]
struct FakeState {
    services: BTreeMap<String, ServiceSnapshot>,
    failing_starts: HashSet<String>,
    failing_queries: HashSet<String>,
    calls: HashMap<(String, &'static str), usize>,
}

#[derive(Clone, Default)]
pub struct FakeServiceController {
    state: Arc<Mutex<FakeState>>,
}

impl FakeServiceController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(self, name: &str, state: ServiceState) -> Self {
        self.set_state(name, state);
        self
    }

    /// Insert the service or change its state
    pub fn set_state(&self, name: &str, state: ServiceState) {
        let mut inner = self.state.lock().unwrap();
        inner
            .services
            .entry(name.to_string())
            .and_modify(|s| s.state = state)
            .or_insert_with(|| ServiceSnapshot::new(name, state));
    }

    pub fn remove_service(&self, name: &str) {
        self.state.lock().unwrap().services.remove(name);
    }

    pub fn fail_starts(&self, name: &str, fail: bool) {
        let mut inner = self.state.lock().unwrap();
        if fail {
            inner.failing_starts.insert(name.to_string());
        } else {
            inner.failing_starts.remove(name);
        }
    }

    /// Make `get` report a transient error for the service
    pub fn fail_queries(&self, name: &str, fail: bool) {
        let mut inner = self.state.lock().unwrap();
        if fail {
            inner.failing_queries.insert(name.to_string());
        } else {
            inner.failing_queries.remove(name);
        }
    }

    pub fn state_of(&self, name: &str) -> Option<ServiceState> {
        self.state
            .lock()
            .unwrap()
            .services
            .get(name)
            .map(|s| s.state)
    }

    pub fn calls(&self, name: &str, op: &'static str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&(name.to_string(), op))
            .copied()
            .unwrap_or(0)
    }

    fn record(&self, name: &str, op: &'static str) {
        *self
            .state
            .lock()
            .unwrap()
            .calls
            .entry((name.to_string(), op))
            .or_insert(0) += 1;
    }

    fn transition(&self, name: &str, op: &'static str, target: ServiceState) -> Result<()> {
        self.record(name, op);
        let mut inner = self.state.lock().unwrap();
        if op != "stop" && inner.failing_starts.contains(name) {
            return Err(DomainError::control(name, "service refused to start"));
        }
        match inner.services.get_mut(name) {
            Some(snapshot) => {
                snapshot.state = target;
                Ok(())
            }
            None => Err(DomainError::NotFound(name.to_string())),
        }
    }
}

#[async_trait]
impl ServiceController for FakeServiceController {
    async fn list(&self) -> Result<Vec<ServiceSnapshot>> {
        Ok(self.state.lock().unwrap().services.values().cloned().collect())
    }

    async fn get(&self, name: &str) -> Result<ServiceSnapshot> {
        self.record(name, "get");
        let inner = self.state.lock().unwrap();
        if inner.failing_queries.contains(name) {
            return Err(DomainError::query(name, "service manager unavailable"));
        }
        inner
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(name.to_string()))
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.transition(name, "start", ServiceState::Running)
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.transition(name, "stop", ServiceState::Stopped)
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.transition(name, "restart", ServiceState::Running)
    }
}
