//! Per-connection session state.

use std::fmt;
use std::sync::Arc;

use notify_common::{ConnectionId, PrefixedId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::scope::Scope;

/// A serialized event, shared by every session it is delivered to.
pub type OutboundMessage = Arc<str>;

/// Receiving end of a session's outbound queue, owned by its writer.
pub type OutboundReceiver = mpsc::Receiver<OutboundMessage>;

/// The hub's view of a live session: its scope and the sending half of its
/// outbound queue.
///
/// Not `Clone`: the hub holds the only sender, so removing the handle from the
/// registry is what closes the queue.
pub struct SessionHandle {
    pub session_id: String,
    pub scope: Scope,
    sender: mpsc::Sender<OutboundMessage>,
}

/// Why a non-blocking enqueue failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity; the consumer is not keeping up.
    Full,
    /// The writer has already gone away.
    Closed,
}

impl SessionHandle {
    /// Create a session with a fresh `conn_` id and a queue of `capacity`.
    pub fn new(scope: Scope, capacity: usize) -> (Self, OutboundReceiver) {
        Self::with_id(ConnectionId::generate(), scope, capacity)
    }

    pub fn with_id(
        session_id: impl Into<String>,
        scope: Scope,
        capacity: usize,
    ) -> (Self, OutboundReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = Self {
            session_id: session_id.into(),
            scope,
            sender,
        };
        (handle, receiver)
    }

    /// Enqueue without waiting.
    pub fn try_enqueue(&self, message: OutboundMessage) -> Result<(), EnqueueError> {
        self.sender.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("scope", &self.scope)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    /// `Connecting → Closed` covers a handshake aborted before registration.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Active) | (Connecting, Closed) | (Active, Closing) | (Closing, Closed)
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid session transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// Tracks one connection's progress through its state machine.
#[derive(Debug)]
pub struct Lifecycle {
    session_id: String,
    state: SessionState,
}

impl Lifecycle {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn advance(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(
            session_id = %self.session_id,
            from = ?self.state,
            to = ?next,
            "session state change"
        );
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_common::Role;

    #[test]
    fn new_session_has_connection_prefix() {
        let (handle, _rx) = SessionHandle::new(Scope::default(), 4);
        let (other, _rx2) = SessionHandle::new(Scope::default(), 4);
        assert!(handle.session_id.starts_with("conn_"));
        assert_ne!(handle.session_id, other.session_id);
    }

    #[test]
    fn try_enqueue_reports_full_queue() {
        let (handle, _rx) = SessionHandle::with_id("conn_a", Scope::default(), 1);
        assert_eq!(handle.try_enqueue(Arc::from("one")), Ok(()));
        assert_eq!(handle.try_enqueue(Arc::from("two")), Err(EnqueueError::Full));
    }

    #[test]
    fn try_enqueue_reports_closed_queue() {
        let scope = Scope::new(Role::Cashier, None, Some("b1"));
        let (handle, rx) = SessionHandle::with_id("conn_b", scope, 4);
        drop(rx);
        assert_eq!(handle.try_enqueue(Arc::from("x")), Err(EnqueueError::Closed));
    }

    #[tokio::test]
    async fn dropping_handle_closes_queue_after_drain() {
        let (handle, mut rx) = SessionHandle::with_id("conn_c", Scope::default(), 4);
        handle.try_enqueue(Arc::from("last")).unwrap();
        drop(handle);
        assert_eq!(rx.recv().await.as_deref(), Some("last"));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut lifecycle = Lifecycle::new("conn_d");
        assert_eq!(lifecycle.state(), SessionState::Connecting);
        lifecycle.advance(SessionState::Active).unwrap();
        lifecycle.advance(SessionState::Closing).unwrap();
        lifecycle.advance(SessionState::Closed).unwrap();
        assert_eq!(lifecycle.state(), SessionState::Closed);
    }

    #[test]
    fn lifecycle_rejects_skips_and_reversals() {
        let mut lifecycle = Lifecycle::new("conn_e");
        assert!(lifecycle.advance(SessionState::Closing).is_err());
        lifecycle.advance(SessionState::Active).unwrap();
        assert!(lifecycle.advance(SessionState::Connecting).is_err());
        assert!(lifecycle.advance(SessionState::Closed).is_err());
        assert_eq!(lifecycle.state(), SessionState::Active);
    }

    #[test]
    fn aborted_handshake_closes_directly() {
        let mut lifecycle = Lifecycle::new("conn_f");
        lifecycle.advance(SessionState::Closed).unwrap();
        assert!(lifecycle.advance(SessionState::Active).is_err());
    }
}
