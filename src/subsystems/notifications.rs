//! Change-notification listener.
//!
//! Subscribes to the data store change feed and republishes every change
//! to the socket hub as a JSON text message.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{
    ChangeEvent, CloseTransition, DataStore, SocketHub, StateCell, Subsystem, SubsystemError,
    SubsystemState,
};

const NAME: &str = "notification_listener";

pub struct NotificationListener {
    state: StateCell,
    store: Arc<DataStore>,
    hub: Arc<SocketHub>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationListener {
    pub fn new(store: Arc<DataStore>, hub: Arc<SocketHub>) -> Self {
        Self {
            state: StateCell::new(),
            store,
            hub,
            task: Mutex::new(None),
        }
    }
}

async fn forward(mut changes: broadcast::Receiver<ChangeEvent>, hub: Arc<SocketHub>) {
    loop {
        match changes.recv().await {
            Ok(event) => {
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, table = %event.table, "Unencodable change event");
                        continue;
                    }
                };
                if let Err(e) = hub.broadcast(payload) {
                    tracing::debug!(error = %e, "Change not delivered to socket hub");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Notification listener lagging");
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Change feed closed, notification listener exiting");
                break;
            }
        }
    }
}

#[async_trait]
impl Subsystem for NotificationListener {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> SubsystemState {
        self.state.get()
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        if self.store.state() != SubsystemState::Ready {
            return Err(SubsystemError::DependencyNotReady {
                name: NAME,
                dependency: self.store.name(),
            });
        }
        let changes = self.store.subscribe()?;
        self.state.mark_ready(NAME)?;

        let handle = tokio::spawn(forward(changes, Arc::clone(&self.hub)));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        tracing::info!("Notification listener started");
        Ok(())
    }

    async fn close(&self) -> Result<(), SubsystemError> {
        if self.state.mark_closed() == CloseTransition::Closed {
            if let Some(handle) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
                handle.abort();
            }
            tracing::info!("Notification listener stopped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::ChangeOperation;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn refuses_to_start_without_data_store() {
        let store = Arc::new(DataStore::new(8));
        let hub = Arc::new(SocketHub::new(8));
        let listener = NotificationListener::new(store, hub);

        let err = listener.initialize().await.unwrap_err();
        assert!(matches!(err, SubsystemError::DependencyNotReady { .. }));
        assert_eq!(listener.state(), SubsystemState::Uninitialized);
    }

    #[tokio::test]
    async fn relays_changes_to_hub() {
        let store = Arc::new(DataStore::new(8));
        let hub = Arc::new(SocketHub::new(8));
        store.initialize().await.unwrap();
        hub.attach("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let listener = NotificationListener::new(store.clone(), hub.clone());
        listener.initialize().await.unwrap();
        let mut client = hub.subscribe().unwrap();

        store
            .publish(ChangeEvent {
                table: "todos".into(),
                operation: ChangeOperation::Update,
                record: json!({"id": 7}),
            })
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(1), client.recv())
            .await
            .unwrap()
            .unwrap();
        let decoded: ChangeEvent = serde_json::from_str(&message).unwrap();
        assert_eq!(decoded.table, "todos");
        assert_eq!(decoded.operation, ChangeOperation::Update);

        listener.close().await.unwrap();
        listener.close().await.unwrap();
        assert_eq!(listener.state(), SubsystemState::Closed);
    }
}
