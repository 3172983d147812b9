//! Bounded in-process sink for request records.
//!
//! Backs the log-retrieval route. Oldest records are evicted first.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subsystems::{CloseTransition, StateCell, Subsystem, SubsystemError, SubsystemState};

const NAME: &str = "log_sink";

/// One completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: Option<String>,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub size: u64,
    pub duration_ms: f64,
    pub client_addr: Option<String>,
    pub user_agent: Option<String>,
}

pub struct LogSink {
    state: StateCell,
    capacity: usize,
    records: Mutex<VecDeque<RequestRecord>>,
    appended: AtomicU64,
}

impl LogSink {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: StateCell::new(),
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            appended: AtomicU64::new(0),
        }
    }

    /// Append a record. Silently dropped unless the sink is connected.
    pub fn append(&self, record: RequestRecord) {
        if !self.state.is_ready() {
            return;
        }
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        self.appended.fetch_add(1, Ordering::Relaxed);
    }

    /// The newest `limit` records, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<RequestRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = records.len().saturating_sub(limit);
        records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records appended since connect, including evicted ones.
    pub fn total_appended(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Subsystem for LogSink {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> SubsystemState {
        self.state.get()
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        self.state.mark_ready(NAME)?;
        tracing::info!(capacity = self.capacity, "Log sink connected");
        Ok(())
    }

    async fn close(&self) -> Result<(), SubsystemError> {
        if self.state.mark_closed() == CloseTransition::Closed {
            self.records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str) -> RequestRecord {
        RequestRecord {
            timestamp: Utc::now(),
            request_id: None,
            method: "GET".into(),
            path: path.into(),
            status: 200,
            size: 2,
            duration_ms: 1.0,
            client_addr: None,
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn evicts_oldest_at_capacity() {
        let sink = LogSink::new(2);
        sink.append(record("/dropped-before-connect"));
        assert!(sink.is_empty());

        sink.initialize().await.unwrap();
        for path in ["/a", "/b", "/c"] {
            sink.append(record(path));
        }

        let paths: Vec<_> = sink.recent(10).into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/b", "/c"]);
        assert_eq!(sink.recent(1)[0].path, "/c");
        assert_eq!(sink.total_appended(), 3);
    }
}
