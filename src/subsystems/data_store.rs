//! In-process data store connection and its change feed.
//!
//! The store itself (schema, queries) lives outside this crate. What the
//! gateway needs from it is a live connection and a stream of row changes
//! for the notification listener.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::{CloseTransition, StateCell, Subsystem, SubsystemError, SubsystemState};

const NAME: &str = "data_store";

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub operation: ChangeOperation,
    pub record: serde_json::Value,
}

pub struct DataStore {
    state: StateCell,
    capacity: usize,
    feed: Mutex<Option<broadcast::Sender<ChangeEvent>>>,
}

impl DataStore {
    pub fn new(change_buffer: usize) -> Self {
        Self {
            state: StateCell::new(),
            capacity: change_buffer.max(1),
            feed: Mutex::new(None),
        }
    }

    /// Publish a change. Returns how many listeners received it.
    pub fn publish(&self, event: ChangeEvent) -> Result<usize, SubsystemError> {
        self.state.ensure_ready(NAME)?;
        let feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner);
        match feed.as_ref() {
            // No subscribers is not an error.
            Some(tx) => Ok(tx.send(event).unwrap_or(0)),
            None => Err(SubsystemError::NotReady { name: NAME }),
        }
    }

    /// Subscribe to the change feed.
    pub fn subscribe(&self) -> Result<broadcast::Receiver<ChangeEvent>, SubsystemError> {
        self.state.ensure_ready(NAME)?;
        let feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner);
        feed.as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(SubsystemError::NotReady { name: NAME })
    }
}

#[async_trait]
impl Subsystem for DataStore {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> SubsystemState {
        self.state.get()
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        {
            let mut feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner);
            if feed.is_none() {
                let (tx, _) = broadcast::channel(self.capacity);
                *feed = Some(tx);
            }
        }
        self.state.mark_ready(NAME)?;
        tracing::info!(change_buffer = self.capacity, "Data store connected");
        Ok(())
    }

    async fn close(&self) -> Result<(), SubsystemError> {
        if self.state.mark_closed() == CloseTransition::Closed {
            // Dropping the sender ends every subscriber's stream.
            self.feed.lock().unwrap_or_else(PoisonError::into_inner).take();
            tracing::info!("Data store disconnected");
        }
        Ok(())
    }
}
