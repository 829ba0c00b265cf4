//! Control lock: which controller session may change the display.
//!
//! This is an authorization concept, not a concurrency primitive. At most one
//! session holds it, and the holder is always a registered controller.
//!
//! # Transitions
//!
//! ```text
//!            claim (first controller, lock free)
//!   Free ─────────────────────────────────────────▶ Held(id)
//!    ▲                                                 │
//!    │ release, no other controller                    │ release(reason, exclude)
//!    └─────────────────────────────────────────────────┤
//!                                                      ▼
//!                                   Held(first other controller in connection order)
//! ```
//!
//! Promotion happens inside `release`, so there is never an observable window
//! where a waiting controller exists but the lock is free because of a release.

use std::fmt;

use chrono::{DateTime, Utc};
use recital_protocol::{LockStatus, Role, SessionId};
use tracing::info;

use crate::registry::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    Disconnect,
    Timeout,
    /// The holder id no longer resolves to a registered session.
    HolderMissing,
}

impl ReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseReason::Disconnect => "disconnect",
            ReleaseReason::Timeout => "timeout",
            ReleaseReason::HolderMissing => "holder_missing",
        }
    }
}

impl fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a release: who lost the lock and who (if anyone) got it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handover {
    pub released: Option<SessionId>,
    pub promoted: Option<SessionId>,
}

#[derive(Debug, Clone, Default)]
pub struct ControlLock {
    holder: Option<SessionId>,
}

impl ControlLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holder(&self) -> Option<SessionId> {
        self.holder
    }

    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    pub fn is_held_by(&self, id: SessionId) -> bool {
        self.holder == Some(id)
    }

    /// First-come-first-served. Returns true only when `id` became the holder.
    /// Non-controllers and unknown sessions never claim.
    pub fn claim(&mut self, registry: &mut SessionRegistry, id: SessionId, now: DateTime<Utc>) -> bool {
        if self.holder.is_some() || registry.role_of(id) != Role::Controller {
            return false;
        }
        self.holder = Some(id);
        registry.touch(id, now);
        info!(session_id = id, "Control lock claimed");
        true
    }

    /// Clears the holder, then promotes the first controller in connection order
    /// other than `exclude`. The promoted session's liveness restarts at `now`.
    pub fn release(
        &mut self,
        registry: &mut SessionRegistry,
        reason: ReleaseReason,
        exclude: Option<SessionId>,
        now: DateTime<Utc>,
    ) -> Handover {
        let released = self.holder.take();
        info!(session_id = ?released, reason = %reason, "Control lock released");

        let promoted = registry
            .with_role(Role::Controller)
            .map(|session| session.id)
            .find(|id| Some(*id) != exclude);

        if let Some(id) = promoted {
            self.holder = Some(id);
            registry.touch(id, now);
            info!(session_id = id, reason = %reason, "Control lock promoted");
        }

        Handover { released, promoted }
    }

    /// Lock standing as seen by one session. Derived, never stored.
    pub fn status_for(&self, id: Option<SessionId>) -> LockStatus {
        let is_active_controller = id.is_some() && self.holder == id;
        LockStatus {
            controller_connected: self.is_held(),
            is_active_controller,
            locked_by_another: self.is_held() && !is_active_controller,
        }
    }
}
