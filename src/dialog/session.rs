//! In-memory dialog sessions
//!
//! A user is in at most one dialog at a time, whatever the role: opening an
//! admin dialog replaces a pending withdrawal and vice versa. Sessions are
//! never persisted and are lost on restart.

use dashmap::DashMap;
use rust_decimal::Decimal;

/// Dialogs a regular user can be in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSession {
    /// Withdrawal opened; `amount` is the balance locked in when it started.
    AwaitingWallet { amount: Decimal },
}

/// Dialogs an administrator can be in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminSession {
    AwaitingBroadcastMessage,
    AwaitingBalanceUserId,
    AwaitingBalanceAmount { target: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    User(UserSession),
    Admin(AdminSession),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Session {
    pub fn role(&self) -> Role {
        match self {
            Session::User(_) => Role::User,
            Session::Admin(_) => Role::Admin,
        }
    }
}

/// Concurrent table of active sessions keyed by user id.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: DashMap<i64, Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the user's current session.
    pub fn get(&self, user_id: i64) -> Option<Session> {
        self.sessions.get(&user_id).map(|entry| entry.value().clone())
    }

    /// Starts a dialog, returning the one it replaced.
    pub fn open(&self, user_id: i64, session: Session) -> Option<Session> {
        let previous = self.sessions.insert(user_id, session);
        if let Some(ref previous) = previous {
            log::debug!("Session of {} replaced (was {:?})", user_id, previous);
        }
        previous
    }

    pub fn clear(&self, user_id: i64) -> Option<Session> {
        self.sessions.remove(&user_id).map(|(_, session)| session)
    }

    /// Removes the session only if `predicate` holds, atomically.
    ///
    /// Terminal steps claim their session this way so that two racing
    /// messages cannot both complete the same dialog.
    pub fn take_if<F>(&self, user_id: i64, predicate: F) -> Option<Session>
    where
        F: FnOnce(&Session) -> bool,
    {
        self.sessions
            .remove_if(&user_id, |_, session| predicate(session))
            .map(|(_, session)| session)
    }

    /// Moves from `expected` to `next`; returns false if the session changed meanwhile.
    pub fn replace_if(&self, user_id: i64, expected: &Session, next: Session) -> bool {
        match self.sessions.get_mut(&user_id) {
            Some(mut current) if *current == *expected => {
                *current = next;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
