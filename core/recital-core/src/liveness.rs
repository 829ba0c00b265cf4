//! Liveness monitor for the lock holder.
//!
//! The sweep itself is pure: it inspects the lock and the registry and reports
//! a verdict. The coordinator acts on the verdict, and the server drives the
//! sweep from a fixed-interval ticker.

use chrono::{DateTime, Duration, Utc};
use recital_protocol::SessionId;

use crate::lock::ControlLock;
use crate::registry::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessVerdict {
    /// No holder; nothing to check.
    Idle,
    Healthy,
    /// The holder id is not registered. Disconnect handling should prevent this.
    HolderMissing(SessionId),
    TimedOut { holder: SessionId, elapsed: Duration },
}

#[derive(Debug, Clone, Copy)]
pub struct LivenessMonitor {
    timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn check(
        &self,
        lock: &ControlLock,
        registry: &SessionRegistry,
        now: DateTime<Utc>,
    ) -> LivenessVerdict {
        let Some(holder) = lock.holder() else {
            return LivenessVerdict::Idle;
        };
        let Some(session) = registry.get(holder) else {
            return LivenessVerdict::HolderMissing(holder);
        };

        let elapsed = now.signed_duration_since(session.last_seen);
        if elapsed > self.timeout {
            LivenessVerdict::TimedOut { holder, elapsed }
        } else {
            LivenessVerdict::Healthy
        }
    }
}
