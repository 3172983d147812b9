//! Shutdown coordination and ordered teardown.
//!
//! # Responsibilities
//! - Broadcast the shutdown trigger to the serve loop
//! - Close subsystems in a fixed order, each step isolated
//! - Make a second shutdown harmless
//!
//! # Design Decisions
//! - A failing or panicking step is logged and skipped over
//! - Teardown runs at most once per process; later runs report `already_ran`

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::broadcast;

use crate::gateway::error_chain;
use crate::subsystems::Subsystem;

/// Outcome of closing one subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownStep {
    pub name: &'static str,
    pub result: Result<(), String>,
}

#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    pub steps: Vec<TeardownStep>,
    pub already_ran: bool,
}

impl TeardownReport {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| s.result.is_err()).count()
    }
}

/// Coordinator for graceful shutdown.
///
/// Long-running tasks subscribe to the trigger; teardown itself is guarded
/// so it runs once.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
    torn_down: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the trigger. Returns false if it had already fired.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.tx.send(());
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Tear down `subsystems` in order, unless teardown already ran.
    pub async fn run(&self, subsystems: Vec<Arc<dyn Subsystem>>) -> TeardownReport {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            tracing::warn!("Teardown already ran, skipping");
            return TeardownReport {
                steps: Vec::new(),
                already_ran: true,
            };
        }

        let steps = teardown(&subsystems).await;
        let report = TeardownReport {
            steps,
            already_ran: false,
        };
        tracing::info!(
            steps = report.steps.len(),
            failures = report.failures(),
            "Teardown complete"
        );
        report
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Close each subsystem in order. No step can stop the ones after it.
pub async fn teardown(subsystems: &[Arc<dyn Subsystem>]) -> Vec<TeardownStep> {
    let mut steps = Vec::with_capacity(subsystems.len());

    for subsystem in subsystems {
        let name = subsystem.name();
        let result = match AssertUnwindSafe(subsystem.close()).catch_unwind().await {
            Ok(Ok(())) => {
                tracing::info!(subsystem = name, "Subsystem closed");
                Ok(())
            }
            Ok(Err(e)) => {
                let message = error_chain(&e);
                tracing::error!(subsystem = name, error = %message, "Subsystem failed to close");
                Err(message)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(subsystem = name, panic = %message, "Subsystem panicked while closing");
                Err(message)
            }
        };
        steps.push(TeardownStep { name, result });
    }

    steps
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
