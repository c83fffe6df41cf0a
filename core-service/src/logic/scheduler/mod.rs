//! Retraining Scheduler
//!
//! Two timers drive `HealthEngine::train`: one delayed initial run and a
//! fixed-period tick. Ticks never queue: if a run is in flight the tick is
//! skipped and the next period is the only retry.

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::logic::config::EngineConfig;
use crate::logic::model::{HealthEngine, ModelStatus, TrainOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub active_timer_count: usize,
    pub model_status: ModelStatus,
}

pub struct RetrainScheduler {
    engine: Arc<HealthEngine>,
    device_id: String,
    interval: Duration,
    initial_delay: Duration,
    running: AtomicBool,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl RetrainScheduler {
    pub fn new(
        engine: Arc<HealthEngine>,
        device_id: impl Into<String>,
        interval: Duration,
        initial_delay: Duration,
    ) -> Self {
        Self {
            engine,
            device_id: device_id.into(),
            interval,
            initial_delay,
            running: AtomicBool::new(false),
            timers: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(engine: Arc<HealthEngine>, config: &EngineConfig) -> Self {
        Self::new(
            engine,
            config.device_id.clone(),
            config.retrain_interval(),
            config.initial_training_delay(),
        )
    }

    /// Arm both timers. Must be called inside a Tokio runtime.
    pub fn start(&self) {
        // Held across the flag flip and the push so `stop` sees both or neither
        let mut timers = self.timers.lock();
        if self.running.swap(true, Ordering::AcqRel) {
            log::warn!("Scheduler already running");
            return;
        }

        log::info!("Starting retraining scheduler for {}", self.device_id);

        let periodic = {
            let engine = Arc::clone(&self.engine);
            let device_id = self.device_id.clone();
            // tokio intervals reject a zero period
            let period = self.interval.max(Duration::from_secs(1));

            tokio::spawn(async move {
                let mut ticker = time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    log::info!("Scheduled ML model training triggered");
                    tick(&engine, &device_id);
                }
            })
        };

        let initial = {
            let engine = Arc::clone(&self.engine);
            let device_id = self.device_id.clone();
            let delay = self.initial_delay;

            tokio::spawn(async move {
                time::sleep(delay).await;
                log::info!("Initial ML model training triggered");
                tick(&engine, &device_id);
            })
        };

        timers.push(periodic);
        timers.push(initial);

        log::info!(
            "ML training scheduled every {}s (first run in {}s)",
            self.interval.as_secs(),
            self.initial_delay.as_secs()
        );
    }

    /// Cancel all outstanding timers. Safe to call repeatedly.
    /// A training run already in flight is left to finish.
    pub fn stop(&self) {
        let mut timers = self.timers.lock();
        for timer in timers.drain(..) {
            timer.abort();
        }

        if self.running.swap(false, Ordering::AcqRel) {
            log::info!("Scheduler service stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn get_status(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_running: self.is_running(),
            active_timer_count: self.timers.lock().iter().filter(|t| !t.is_finished()).count(),
            model_status: self.engine.get_model_status(),
        }
    }
}

impl Drop for RetrainScheduler {
    fn drop(&mut self) {
        for timer in self.timers.get_mut().drain(..) {
            timer.abort();
        }
    }
}

/// Fire-and-forget training run, skipped while another is in flight
fn tick(engine: &Arc<HealthEngine>, device_id: &str) {
    if engine.is_training() {
        log::warn!("Skipping scheduled training for {}: previous run still in progress", device_id);
        return;
    }

    let engine = Arc::clone(engine);
    let device_id = device_id.to_string();
    tokio::spawn(async move {
        match engine.train(&device_id).await {
            Ok(TrainOutcome::Committed(_)) => {
                log::info!("Scheduled ML model training completed");
            }
            Ok(TrainOutcome::AlreadyRunning) => {}
            Ok(TrainOutcome::InsufficientData { found, required }) => {
                log::info!(
                    "Scheduled training for {} deferred: {}/{} samples",
                    device_id,
                    found,
                    required
                );
            }
            Ok(TrainOutcome::WorkerFailed { reason }) => {
                log::warn!("Scheduled training for {} failed in the worker: {}", device_id, reason);
            }
            // Already logged by the engine; the next tick is the retry
            Err(_) => {}
        }
    });
}
