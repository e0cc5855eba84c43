//! Connection registry and event router.
//!
//! The hub is a single task that owns the registry and consumes commands from
//! one multi-producer mailbox, so register/unregister/broadcast never race and
//! no lock guards the registry. Callers talk to it through a cloneable
//! [`HubHandle`].

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};

use super::events::Event;
use super::filter::should_deliver;
use super::session::{EnqueueError, OutboundMessage, SessionHandle};

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("event hub is not running")]
    Closed,
}

enum HubCommand {
    Register(SessionHandle),
    Unregister(String),
    Broadcast(String),
    ConnectionCount(oneshot::Sender<usize>),
    Shutdown(oneshot::Sender<usize>),
}

/// Cheap, cloneable entry point to the hub task. Store in AppState.
#[derive(Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Add a session to the registry. Registering an id that is already
    /// present is a no-op.
    pub async fn register(&self, session: SessionHandle) -> Result<(), HubError> {
        self.send(HubCommand::Register(session)).await
    }

    /// Remove a session and close its outbound queue. Unknown ids are ignored,
    /// so both pumps and an explicit disconnect may all call this.
    pub async fn unregister(&self, session_id: impl Into<String>) -> Result<(), HubError> {
        self.send(HubCommand::Unregister(session_id.into())).await
    }

    /// Hand a serialized [`Event`] to the router. Returns once the hub has
    /// accepted it; per-session delivery is not reported back.
    pub async fn broadcast(&self, raw: String) -> Result<(), HubError> {
        self.send(HubCommand::Broadcast(raw)).await
    }

    /// Number of registered sessions. Because the mailbox is FIFO, the answer
    /// reflects every command sent before this call.
    pub async fn connection_count(&self) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::ConnectionCount(reply)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Close every session queue and stop the hub. Returns how many sessions
    /// were closed.
    pub async fn shutdown(&self) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Shutdown(reply)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.sender.send(command).await.map_err(|_| HubError::Closed)
    }
}

/// The registry itself. Only ever touched from inside [`Hub::run`].
pub struct Hub {
    sessions: HashMap<String, SessionHandle>,
    mailbox: mpsc::Receiver<HubCommand>,
}

impl Hub {
    /// Start the hub task and return a handle to it.
    pub fn spawn(mailbox_capacity: usize) -> HubHandle {
        let (sender, mailbox) = mpsc::channel(mailbox_capacity.max(1));
        let hub = Hub {
            sessions: HashMap::new(),
            mailbox,
        };
        tokio::spawn(hub.run());
        HubHandle { sender }
    }

    async fn run(mut self) {
        tracing::debug!("hub started");
        while let Some(command) = self.mailbox.recv().await {
            match command {
                HubCommand::Register(session) => self.register(session),
                HubCommand::Unregister(session_id) => self.unregister(&session_id),
                HubCommand::Broadcast(raw) => self.broadcast(raw),
                HubCommand::ConnectionCount(reply) => {
                    let _ = reply.send(self.sessions.len());
                }
                HubCommand::Shutdown(reply) => {
                    // Refuse new commands before acknowledging.
                    self.mailbox.close();
                    let closed = self.sessions.len();
                    self.sessions.clear();
                    tracing::info!(closed, "hub shutting down");
                    let _ = reply.send(closed);
                    break;
                }
            }
        }
        tracing::debug!("hub stopped");
    }

    fn register(&mut self, session: SessionHandle) {
        if self.sessions.contains_key(&session.session_id) {
            tracing::debug!(session_id = %session.session_id, "session already registered");
            return;
        }
        tracing::info!(
            session_id = %session.session_id,
            role = %session.scope.role,
            organization_id = session.scope.organization_id.as_deref().unwrap_or(""),
            branch_id = session.scope.branch_id.as_deref().unwrap_or(""),
            connections = self.sessions.len() + 1,
            "session registered"
        );
        self.sessions.insert(session.session_id.clone(), session);
    }

    fn unregister(&mut self, session_id: &str) {
        // Dropping the handle drops the only sender, which closes the queue.
        match self.sessions.remove(session_id) {
            Some(_) => tracing::info!(
                %session_id,
                connections = self.sessions.len(),
                "session unregistered"
            ),
            None => tracing::debug!(%session_id, "unregister for unknown session"),
        }
    }

    fn broadcast(&mut self, raw: String) {
        let event: Event = match serde_json::from_str(&raw) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(?err, "dropping undecodable event");
                return;
            }
        };

        // Re-encode compactly so the frame delimiter never appears inside a
        // message, whatever layout the caller used.
        let message: OutboundMessage = match serde_json::to_string(&event) {
            Ok(encoded) => encoded.into(),
            Err(err) => {
                tracing::warn!(?err, "dropping unencodable event");
                return;
            }
        };
        let mut delivered = 0usize;
        let mut evicted = 0usize;

        self.sessions.retain(|session_id, session| {
            if !should_deliver(&event, &session.scope) {
                return true;
            }
            match session.try_enqueue(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(EnqueueError::Full) => {
                    tracing::warn!(
                        %session_id,
                        event_type = %event.event_type,
                        "outbound queue full; disconnecting slow consumer"
                    );
                    evicted += 1;
                    false
                }
                Err(EnqueueError::Closed) => {
                    tracing::debug!(%session_id, "writer gone; removing session");
                    evicted += 1;
                    false
                }
            }
        });

        tracing::debug!(
            event_type = %event.event_type,
            delivered,
            evicted,
            "event broadcast"
        );
    }
}
