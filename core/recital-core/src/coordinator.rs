//! The coordinator owns all mutable server state.
//!
//! Registry, control lock, liveness monitor and position state live in one
//! value with a single writer. The transport serializes access (one event runs
//! to completion before the next starts), so there is no interior locking here
//! and no ambient globals. Every entry point takes `now` explicitly and returns
//! an [`Outbox`] of deliveries.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use recital_protocol::{
    BootstrapPayload, ConnectionInfo, DisplaySettings, PositionState, Role, ServerMessage,
    SessionId,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::broadcast::Outbox;
use crate::config::RecitalConfig;
use crate::content::ContentStore;
use crate::liveness::{LivenessMonitor, LivenessVerdict};
use crate::lock::{ControlLock, ReleaseReason};
use crate::payload::derive_payload;
use crate::position::initial_position;
use crate::registry::SessionRegistry;

const DISPLAY_PATH: &str = "/display";
const CONTROLLER_PATH: &str = "/remote";

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub controller_timeout: Duration,
    /// Lets a controller take a free lock by heartbeat after it lost it.
    pub reclaim_on_heartbeat: bool,
    pub display: DisplaySettings,
    pub base_url: String,
}

impl CoordinatorSettings {
    pub fn from_config(config: &RecitalConfig) -> Self {
        Self {
            controller_timeout: config.control.controller_timeout(),
            reclaim_on_heartbeat: config.control.reclaim_on_heartbeat,
            display: config.display.settings(),
            base_url: config.server.base_url(),
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from_config(&RecitalConfig::default())
    }
}

/// Point-in-time counters for the health endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub sessions: usize,
    pub viewers: usize,
    pub controllers: usize,
    pub lock_held: bool,
    pub holder: Option<SessionId>,
}

pub struct Coordinator {
    pub(crate) store: Arc<dyn ContentStore>,
    pub(crate) settings: CoordinatorSettings,
    pub(crate) registry: SessionRegistry,
    pub(crate) lock: ControlLock,
    pub(crate) liveness: LivenessMonitor,
    pub(crate) position: PositionState,
}

impl Coordinator {
    pub fn new(store: Arc<dyn ContentStore>, settings: CoordinatorSettings) -> Self {
        let position = initial_position(store.as_ref());
        Self {
            liveness: LivenessMonitor::new(settings.controller_timeout),
            store,
            settings,
            registry: SessionRegistry::new(),
            lock: ControlLock::new(),
            position,
        }
    }

    pub fn position(&self) -> &PositionState {
        &self.position
    }

    pub fn lock_holder(&self) -> Option<SessionId> {
        self.lock.holder()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Registers a new connection and greets it with its id.
    pub fn connect(&mut self, now: DateTime<Utc>) -> (SessionId, Outbox) {
        let id = self.registry.register(now);
        info!(session_id = id, sessions = self.registry.len(), "Session connected");

        let mut outbox = Outbox::new();
        outbox.push(id, ServerMessage::Connected { session_id: id });
        (id, outbox)
    }

    /// Removes the session. If it held the lock, the lock is released with this
    /// session excluded and the next controller is promoted.
    pub fn disconnect(&mut self, id: SessionId, now: DateTime<Utc>) -> Outbox {
        let mut outbox = Outbox::new();
        let Some(session) = self.registry.unregister(id) else {
            return outbox;
        };
        info!(
            session_id = id,
            role = session.role.as_str(),
            sessions = self.registry.len(),
            "Session disconnected"
        );

        if self.lock.is_held_by(id) {
            self.lock
                .release(&mut self.registry, ReleaseReason::Disconnect, Some(id), now);
            self.broadcast_lock_status(&mut outbox);
        }
        outbox
    }

    /// One liveness sweep. A timed-out holder stays connected but is excluded
    /// from promotion for this release.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Outbox {
        let mut outbox = Outbox::new();
        match self.liveness.check(&self.lock, &self.registry, now) {
            LivenessVerdict::Idle | LivenessVerdict::Healthy => {}
            LivenessVerdict::HolderMissing(holder) => {
                warn!(session_id = holder, "Lock holder not registered; releasing");
                self.lock.release(
                    &mut self.registry,
                    ReleaseReason::HolderMissing,
                    Some(holder),
                    now,
                );
                self.broadcast_lock_status(&mut outbox);
            }
            LivenessVerdict::TimedOut { holder, elapsed } => {
                info!(
                    session_id = holder,
                    elapsed_secs = elapsed.num_seconds(),
                    timeout_secs = self.liveness.timeout().num_seconds(),
                    "Controller liveness timed out"
                );
                self.lock
                    .release(&mut self.registry, ReleaseReason::Timeout, Some(holder), now);
                self.broadcast_lock_status(&mut outbox);
            }
        }
        outbox
    }

    /// Snapshot for the non-realtime bootstrap endpoint, which has no session.
    pub fn bootstrap_for_role(&self, role: Role) -> BootstrapPayload {
        self.bootstrap_for(None, role)
    }

    pub(crate) fn bootstrap_for(&self, id: Option<SessionId>, role: Role) -> BootstrapPayload {
        BootstrapPayload {
            role,
            position_state: self.position.clone(),
            content_payload: derive_payload(self.store.as_ref(), &self.position),
            sections: self.store.list_sections(),
            supplications: self.store.list_supplications(),
            config: self.settings.display.clone(),
            connection_info: self.connection_info(id),
            lock_status: self.lock.status_for(id),
        }
    }

    fn connection_info(&self, id: Option<SessionId>) -> ConnectionInfo {
        let base_url = self.settings.base_url.trim_end_matches('/');
        ConnectionInfo {
            display_url: format!("{}{}", base_url, DISPLAY_PATH),
            controller_url: format!("{}{}", base_url, CONTROLLER_PATH),
            session_id: id,
            session_count: self.registry.len(),
            viewer_count: self.registry.count(Role::Viewer),
            controller_count: self.registry.count(Role::Controller),
        }
    }

    pub fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            sessions: self.registry.len(),
            viewers: self.registry.count(Role::Viewer),
            controllers: self.registry.count(Role::Controller),
            lock_held: self.lock.is_held(),
            holder: self.lock.holder(),
        }
    }
}
