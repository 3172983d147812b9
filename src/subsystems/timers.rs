//! Interval timer registry.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::{CloseTransition, StateCell, Subsystem, SubsystemError, SubsystemState};

const NAME: &str = "timers";

struct Timer {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Owns every periodic background task so shutdown can stop them together.
pub struct TimerRegistry {
    state: StateCell,
    timers: Mutex<Vec<Timer>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self {
            state: StateCell::new(),
            timers: Mutex::new(Vec::new()),
        }
    }

    /// Run `tick` every `period`, first after one full period.
    pub fn every<F, Fut>(
        &self,
        name: &'static str,
        period: Duration,
        mut tick: F,
    ) -> Result<(), SubsystemError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.state.ensure_ready(NAME)?;

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tick().await;
            }
        });

        tracing::debug!(timer = name, period = ?period, "Timer registered");
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Timer { name, handle });
        Ok(())
    }

    pub fn active(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subsystem for TimerRegistry {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> SubsystemState {
        self.state.get()
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        self.state.mark_ready(NAME)
    }

    /// Clears every interval timer.
    async fn close(&self) -> Result<(), SubsystemError> {
        if self.state.mark_closed() != CloseTransition::Closed {
            return Ok(());
        }
        let timers: Vec<Timer> = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for timer in &timers {
            timer.handle.abort();
            tracing::debug!(timer = timer.name, "Timer cleared");
        }
        tracing::info!(count = timers.len(), "Interval timers cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn clear_stops_ticking() {
        let timers = TimerRegistry::new();
        assert!(timers.every("early", Duration::from_millis(5), || async {}).is_err());
        timers.initialize().await.unwrap();

        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        timers
            .every("count", Duration::from_millis(5), move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
        assert_eq!(timers.active(), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        timers.close().await.unwrap();
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen > 0);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
        assert_eq!(timers.active(), 0);

        // Clearing twice is harmless.
        timers.close().await.unwrap();
    }
}
