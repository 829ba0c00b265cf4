//! Outbound fan-out.
//!
//! The coordinator never writes to sockets. Each handled event returns an
//! [`Outbox`] of `(target, message)` deliveries in the order they must be sent;
//! the transport enqueues them before handling the next event. Both broadcasts
//! are full-state pushes.

use recital_protocol::{Role, ServerMessage, SessionId};

use crate::coordinator::Coordinator;
use crate::payload::derive_payload;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub target: SessionId,
    pub message: ServerMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outbox {
    deliveries: Vec<Delivery>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target: SessionId, message: ServerMessage) {
        self.deliveries.push(Delivery { target, message });
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    /// Messages addressed to one session, in send order.
    pub fn messages_for(&self, target: SessionId) -> Vec<&ServerMessage> {
        self.deliveries
            .iter()
            .filter(|delivery| delivery.target == target)
            .map(|delivery| &delivery.message)
            .collect()
    }
}

impl IntoIterator for Outbox {
    type Item = Delivery;
    type IntoIter = std::vec::IntoIter<Delivery>;

    fn into_iter(self) -> Self::IntoIter {
        self.deliveries.into_iter()
    }
}

impl Coordinator {
    /// Current position and derived payload to every session, whatever its role.
    pub(crate) fn broadcast_state(&self, outbox: &mut Outbox) {
        let message = ServerMessage::StateUpdate {
            position_state: self.position.clone(),
            content_payload: derive_payload(self.store.as_ref(), &self.position),
        };
        for session in self.registry.iter() {
            outbox.push(session.id, message.clone());
        }
    }

    /// Viewers get the connectivity flag; every controller (holder or waiting)
    /// gets its own lock standing. Undeclared sessions get nothing.
    pub(crate) fn broadcast_lock_status(&self, outbox: &mut Outbox) {
        let controller_connected = self.lock.is_held();
        for session in self.registry.iter() {
            match session.role {
                Role::Viewer => outbox.push(
                    session.id,
                    ServerMessage::ViewerConnectivity {
                        controller_connected,
                    },
                ),
                Role::Controller => outbox.push(
                    session.id,
                    ServerMessage::LockStatus(self.lock.status_for(Some(session.id))),
                ),
                Role::Unspecified => {}
            }
        }
    }
}
