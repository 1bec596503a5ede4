//! Owned session state
//!
//! A single cell holding the current auth session. It is set on load,
//! replaced on sign-in and cleared on sign-out. Components that need the
//! viewer identity read it; components that react to auth transitions
//! watch it.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;
use types::ids::UserId;
use types::session::Session;

#[derive(Debug, Clone)]
pub struct SessionCell {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SessionCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the session, notifying watchers only on an actual change.
    pub fn set(&self, session: Option<Session>) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == session {
                return false;
            }
            *current = session;
            true
        });
        if changed {
            debug!(viewer = ?self.viewer().map(|id| id.to_string()), "Session changed");
        }
    }

    pub fn clear(&self) {
        self.set(None);
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Identity of the signed-in user, if any.
    pub fn viewer(&self) -> Option<UserId> {
        self.tx.borrow().as_ref().map(|s| s.user_id().clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Receiver notified on every session transition.
    pub fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SessionCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> Session {
        Session::new(format!("token-{}", id), UserId::new(id), None)
    }

    #[test]
    fn test_lifecycle() {
        let cell = SessionCell::new();
        assert!(!cell.is_signed_in());
        assert_eq!(cell.viewer(), None);

        cell.set(Some(session("u1")));
        assert_eq!(cell.viewer(), Some(UserId::new("u1")));

        cell.clear();
        assert!(cell.current().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let cell = SessionCell::new();
        let reader = cell.clone();
        cell.set(Some(session("u1")));
        assert!(reader.is_signed_in());
    }

    #[tokio::test]
    async fn test_watchers_see_transitions_only() {
        let cell = SessionCell::new();
        let mut rx = cell.watch();

        cell.set(Some(session("u1")));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().map(|s| s.user_id().clone()), Some(UserId::new("u1")));

        cell.set(Some(session("u1")));
        assert!(!rx.has_changed().unwrap());

        cell.clear();
        assert!(rx.has_changed().unwrap());
    }
}
