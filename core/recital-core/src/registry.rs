//! Session registry.
//!
//! One entry per live real-time connection. Ids come from a monotonic counter
//! and are never reused, so keying a `BTreeMap` by id gives a stable iteration
//! order equal to connection order. Lock promotion depends on that order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use recital_protocol::{Role, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub role: Role,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Outcome of a role declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAssignment {
    Assigned,
    /// The session already declared a role; the existing one is kept.
    AlreadyDeclared(Role),
    UnknownSession,
}

#[derive(Debug, Clone)]
pub struct SessionRegistry {
    next_id: SessionId,
    sessions: BTreeMap<SessionId, Session>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self {
            next_id: 1,
            sessions: BTreeMap::new(),
        }
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, now: DateTime<Utc>) -> SessionId {
        let id = self.next_id;
        self.next_id += 1;
        self.sessions.insert(
            id,
            Session {
                id,
                role: Role::Unspecified,
                connected_at: now,
                last_seen: now,
            },
        );
        id
    }

    /// Sets the role once. Later declarations are ignored so a session cannot
    /// flip between viewer and controller while holding or waiting for the lock.
    pub fn set_role(&mut self, id: SessionId, role: Role) -> RoleAssignment {
        match self.sessions.get_mut(&id) {
            None => RoleAssignment::UnknownSession,
            Some(session) if session.role != Role::Unspecified => {
                RoleAssignment::AlreadyDeclared(session.role)
            }
            Some(session) => {
                session.role = role;
                RoleAssignment::Assigned
            }
        }
    }

    pub fn touch(&mut self, id: SessionId, now: DateTime<Utc>) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.last_seen = now;
        }
    }

    pub fn unregister(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn role_of(&self, id: SessionId) -> Role {
        self.get(id).map(|session| session.role).unwrap_or_default()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Sessions in connection order.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn with_role(&self, role: Role) -> impl Iterator<Item = &Session> {
        self.iter().filter(move |session| session.role == role)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn count(&self, role: Role) -> usize {
        self.with_role(role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let now = Utc::now();
        let mut registry = SessionRegistry::new();
        let first = registry.register(now);
        let second = registry.register(now);
        registry.unregister(second);
        let third = registry.register(now);

        assert_eq!((first, second, third), (1, 2, 3));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn role_is_settable_once() {
        let mut registry = SessionRegistry::new();
        let id = registry.register(Utc::now());

        assert_eq!(registry.set_role(id, Role::Viewer), RoleAssignment::Assigned);
        assert_eq!(
            registry.set_role(id, Role::Controller),
            RoleAssignment::AlreadyDeclared(Role::Viewer)
        );
        assert_eq!(registry.role_of(id), Role::Viewer);
        assert_eq!(
            registry.set_role(99, Role::Viewer),
            RoleAssignment::UnknownSession
        );
    }

    #[test]
    fn iteration_follows_connection_order_not_declaration_order() {
        let now = Utc::now();
        let mut registry = SessionRegistry::new();
        let early = registry.register(now);
        let late = registry.register(now);
        registry.set_role(late, Role::Controller);
        registry.set_role(early, Role::Controller);

        let order: Vec<_> = registry
            .with_role(Role::Controller)
            .map(|session| session.id)
            .collect();
        assert_eq!(order, vec![early, late]);
    }

    #[test]
    fn touch_updates_last_seen_only() {
        let start = Utc::now();
        let mut registry = SessionRegistry::new();
        let id = registry.register(start);
        registry.touch(id, start + Duration::seconds(5));

        let session = registry.get(id).expect("session");
        assert_eq!(session.connected_at, start);
        assert_eq!(session.last_seen, start + Duration::seconds(5));
    }
}
