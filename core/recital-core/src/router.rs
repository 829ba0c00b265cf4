//! Command router: one inbound frame in, an [`Outbox`] out.
//!
//! Authorization is checked once, before dispatch, from
//! [`ClientMessage::requires_lock_holder`]. Handlers below that point can
//! assume a mutating command came from the current holder.

use chrono::{DateTime, Utc};
use recital_protocol::{
    parse_client_message, ClientMessage, ErrorInfo, Role, ServerMessage, SessionId,
    ERROR_NOT_ACTIVE_CONTROLLER,
};
use tracing::{debug, info, warn};

use crate::broadcast::Outbox;
use crate::coordinator::Coordinator;
use crate::position::{apply, Mutation};
use crate::registry::RoleAssignment;

const NOT_ACTIVE_CONTROLLER_MESSAGE: &str = "Only the active controller can change the display";

impl Coordinator {
    /// Parses and handles one text frame. Malformed frames get an error reply
    /// and leave all state untouched; unrecognized types are dropped silently.
    pub fn handle_text(&mut self, id: SessionId, raw: &str, now: DateTime<Utc>) -> Outbox {
        match parse_client_message(raw) {
            Ok(Some(message)) => self.handle_message(id, message, now),
            Ok(None) => {
                debug!(session_id = id, "Ignoring unrecognized message type");
                Outbox::new()
            }
            Err(error) => self.malformed(id, error),
        }
    }

    /// Replies with an error only. Used for frames the transport rejects before
    /// parsing (binary or oversized).
    pub fn malformed(&self, id: SessionId, error: ErrorInfo) -> Outbox {
        warn!(session_id = id, code = %error.code, "Rejected inbound message");
        let mut outbox = Outbox::new();
        if self.registry.contains(id) {
            outbox.push(id, ServerMessage::error(error));
        }
        outbox
    }

    pub fn handle_message(
        &mut self,
        id: SessionId,
        message: ClientMessage,
        now: DateTime<Utc>,
    ) -> Outbox {
        let mut outbox = Outbox::new();
        if !self.registry.contains(id) {
            return outbox;
        }

        if message.requires_lock_holder() && !self.lock.is_held_by(id) {
            info!(
                session_id = id,
                kind = message.kind(),
                holder = ?self.lock.holder(),
                "Rejected command from non-holder"
            );
            outbox.push(
                id,
                ServerMessage::error(ErrorInfo::new(
                    ERROR_NOT_ACTIVE_CONTROLLER,
                    NOT_ACTIVE_CONTROLLER_MESSAGE,
                )),
            );
            outbox.push(id, ServerMessage::LockStatus(self.lock.status_for(Some(id))));
            return outbox;
        }

        match message {
            ClientMessage::DeclareRole { role } => self.declare_role(id, role, now, &mut outbox),
            ClientMessage::Heartbeat => self.heartbeat(id, now, &mut outbox),
            ClientMessage::RequestBootstrap => self.send_bootstrap(id, &mut outbox),
            other => {
                if let Some(mutation) = Mutation::from_message(&other) {
                    self.apply_mutation(id, &mutation, now, &mut outbox);
                }
            }
        }
        outbox
    }

    fn declare_role(&mut self, id: SessionId, role: Role, now: DateTime<Utc>, outbox: &mut Outbox) {
        match self.registry.set_role(id, role) {
            RoleAssignment::Assigned => {
                info!(session_id = id, role = role.as_str(), "Role declared");
                if self.lock.claim(&mut self.registry, id, now) {
                    self.send_bootstrap(id, outbox);
                    self.broadcast_lock_status(outbox);
                    return;
                }
                if role == Role::Controller {
                    debug!(session_id = id, holder = ?self.lock.holder(), "Controller waiting for lock");
                }
            }
            RoleAssignment::AlreadyDeclared(existing) => {
                debug!(
                    session_id = id,
                    role = existing.as_str(),
                    requested = role.as_str(),
                    "Role already declared; keeping existing role"
                );
            }
            RoleAssignment::UnknownSession => return,
        }
        self.send_bootstrap(id, outbox);
    }

    /// Only the holder's heartbeat refreshes liveness. A controller that lost a
    /// free lock may take it back here when reclaim is enabled.
    fn heartbeat(&mut self, id: SessionId, now: DateTime<Utc>, outbox: &mut Outbox) {
        if self.lock.is_held_by(id) {
            self.registry.touch(id, now);
            debug!(session_id = id, "Heartbeat");
            return;
        }

        if self.settings.reclaim_on_heartbeat
            && !self.lock.is_held()
            && self.lock.claim(&mut self.registry, id, now)
        {
            info!(session_id = id, "Control lock reclaimed by heartbeat");
            self.broadcast_lock_status(outbox);
        }
    }

    fn send_bootstrap(&self, id: SessionId, outbox: &mut Outbox) {
        let role = self.registry.role_of(id);
        outbox.push(
            id,
            ServerMessage::Bootstrap(Box::new(self.bootstrap_for(Some(id), role))),
        );
    }

    fn apply_mutation(
        &mut self,
        id: SessionId,
        mutation: &Mutation,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) {
        self.registry.touch(id, now);
        let next = apply(self.store.as_ref(), &self.position, mutation);
        if next == self.position {
            debug!(session_id = id, ?mutation, "Position unchanged");
            return;
        }

        self.position = next;
        debug!(session_id = id, ?mutation, position = ?self.position, "Position changed");
        self.broadcast_state(outbox);
    }
}
