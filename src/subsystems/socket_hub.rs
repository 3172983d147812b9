//! WebSocket fan-out hub.
//!
//! # Responsibilities
//! - Attach to the bound HTTP listener
//! - Fan out text messages to every connected client
//! - Track connected clients
//! - Disconnect everyone on close
//!
//! # Design Decisions
//! - Clients subscribe to a broadcast channel; a slow client lags, it never
//!   blocks the others
//! - Dropping the sender on close ends every client loop

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use tokio::sync::broadcast;

use super::{CloseTransition, StateCell, Subsystem, SubsystemError, SubsystemState};

const NAME: &str = "socket_hub";

pub struct SocketHub {
    state: StateCell,
    capacity: usize,
    bound_addr: Mutex<Option<SocketAddr>>,
    sender: Mutex<Option<broadcast::Sender<String>>>,
    clients: Arc<AtomicUsize>,
}

impl SocketHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: StateCell::new(),
            capacity: capacity.max(1),
            bound_addr: Mutex::new(None),
            sender: Mutex::new(None),
            clients: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Attach to a bound listener and become Ready.
    pub async fn attach(&self, addr: SocketAddr) -> Result<(), SubsystemError> {
        *self.bound_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(addr);
        self.initialize().await
    }

    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.bound_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send a message to every connected client. Returns the receiver count.
    pub fn broadcast(&self, message: impl Into<String>) -> Result<usize, SubsystemError> {
        self.state.ensure_ready(NAME)?;
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(tx) => Ok(tx.send(message.into()).unwrap_or(0)),
            None => Err(SubsystemError::NotReady { name: NAME }),
        }
    }

    /// A new client subscription, or `None` when the hub is not serving.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<String>> {
        if !self.state.is_ready() {
            return None;
        }
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(broadcast::Sender::subscribe)
    }

    pub fn connected_clients(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    fn track_client(&self) -> ClientGuard {
        self.clients.fetch_add(1, Ordering::SeqCst);
        ClientGuard {
            clients: Arc::clone(&self.clients),
        }
    }

    /// Pump hub messages to one upgraded client until either side ends.
    pub async fn serve_client(
        self: Arc<Self>,
        mut socket: WebSocket,
        mut messages: broadcast::Receiver<String>,
    ) {
        let _guard = self.track_client();
        tracing::debug!(clients = self.connected_clients(), "Socket client connected");

        loop {
            tokio::select! {
                outgoing = messages.recv() => match outgoing {
                    Ok(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Socket client lagging, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                },
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }

        tracing::debug!("Socket client disconnected");
    }
}

/// Decrements the client count when a connection ends.
struct ClientGuard {
    clients: Arc<AtomicUsize>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.clients.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Subsystem for SocketHub {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> SubsystemState {
        self.state.get()
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        let Some(addr) = self.bound_addr() else {
            return Err(SubsystemError::Failed {
                name: NAME,
                message: "no bound listener to attach to".into(),
            });
        };
        {
            let mut sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
            if sender.is_none() {
                let (tx, _) = broadcast::channel(self.capacity);
                *sender = Some(tx);
            }
        }
        self.state.mark_ready(NAME)?;
        tracing::info!(address = %addr, path = "/ws", "Socket hub attached");
        Ok(())
    }

    async fn close(&self) -> Result<(), SubsystemError> {
        if self.state.mark_closed() == CloseTransition::Closed {
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            tracing::info!(clients = self.connected_clients(), "Socket hub closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialize_requires_bound_listener() {
        let hub = SocketHub::new(8);
        assert!(hub.initialize().await.is_err());
        assert!(hub.subscribe().is_none());

        hub.attach("127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert_eq!(hub.state(), SubsystemState::Ready);
    }

    #[tokio::test]
    async fn close_stops_serving() {
        let hub = SocketHub::new(8);
        hub.attach("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let mut rx = hub.subscribe().unwrap();
        assert_eq!(hub.broadcast("hi").unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), "hi");

        hub.close().await.unwrap();
        hub.close().await.unwrap();
        assert!(hub.subscribe().is_none());
        assert!(hub.broadcast("late").is_err());
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
    }
}
