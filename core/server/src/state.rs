//! Shared state behind every connection handler and the liveness ticker.
//!
//! One mutex guards the coordinator together with the per-session outbound
//! queues. Each event is handled and its deliveries enqueued before the guard
//! drops, so broadcasts leave in the order the coordinator produced them. The
//! guard is never held across an await.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use recital_core::{Coordinator, HealthSnapshot, Outbox};
use recital_protocol::{BootstrapPayload, ErrorInfo, Role, SessionId};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

pub struct SharedState {
    hub: Mutex<Hub>,
}

struct Hub {
    coordinator: Coordinator,
    outboxes: HashMap<SessionId, UnboundedSender<String>>,
}

impl Hub {
    fn dispatch(&mut self, outbox: Outbox) {
        for delivery in outbox {
            let Some(sender) = self.outboxes.get(&delivery.target) else {
                continue;
            };
            let text = match serde_json::to_string(&delivery.message) {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, kind = delivery.message.kind(), "Failed to serialize message");
                    continue;
                }
            };
            // A closed receiver means the socket task is already tearing down;
            // its disconnect will follow.
            let _ = sender.send(text);
        }
    }
}

impl SharedState {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            hub: Mutex::new(Hub {
                coordinator,
                outboxes: HashMap::new(),
            }),
        }
    }

    fn hub(&self) -> MutexGuard<'_, Hub> {
        match self.hub.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers a session and returns the queue its socket task drains.
    pub fn connect(&self) -> (SessionId, UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut hub = self.hub();
        let (id, outbox) = hub.coordinator.connect(Utc::now());
        hub.outboxes.insert(id, sender);
        hub.dispatch(outbox);
        (id, receiver)
    }

    pub fn handle_text(&self, id: SessionId, raw: &str) {
        let mut hub = self.hub();
        let outbox = hub.coordinator.handle_text(id, raw, Utc::now());
        hub.dispatch(outbox);
    }

    pub fn reject(&self, id: SessionId, error: ErrorInfo) {
        let mut hub = self.hub();
        let outbox = hub.coordinator.malformed(id, error);
        hub.dispatch(outbox);
    }

    pub fn disconnect(&self, id: SessionId) {
        let mut hub = self.hub();
        hub.outboxes.remove(&id);
        let outbox = hub.coordinator.disconnect(id, Utc::now());
        hub.dispatch(outbox);
    }

    pub fn tick(&self) {
        let mut hub = self.hub();
        let outbox = hub.coordinator.tick(Utc::now());
        hub.dispatch(outbox);
    }

    pub fn bootstrap(&self, role: Role) -> BootstrapPayload {
        self.hub().coordinator.bootstrap_for_role(role)
    }

    pub fn health(&self) -> HealthSnapshot {
        self.hub().coordinator.health()
    }
}
