use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use tokio::sync::Notify;

use super::*;
use crate::logic::feature_store::SqliteFeatureStore;
use crate::logic::features::SensorFeatures;
use crate::logic::model::{ModelStore, TrainingSettings, TrainingState};
use crate::logic::worker::{
    ModelingWorker, PredictionRequest, PredictionResponse, StatisticalWorker, TrainingResponse,
    TrainingRow, WorkerError,
};

const INTERVAL: Duration = Duration::from_secs(300);
const INITIAL_DELAY: Duration = Duration::from_secs(30);

/// Statistical worker that counts training calls and can hold them open
struct CountingWorker {
    inner: StatisticalWorker,
    trains: AtomicUsize,
    called: Notify,
    gate: Option<Notify>,
}

impl CountingWorker {
    fn new(gated: bool) -> Arc<Self> {
        Arc::new(Self {
            inner: StatisticalWorker::new(100),
            trains: AtomicUsize::new(0),
            called: Notify::new(),
            gate: gated.then(Notify::new),
        })
    }

    fn trains(&self) -> usize {
        self.trains.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelingWorker for CountingWorker {
    async fn train_batch(&self, rows: &[TrainingRow]) -> Result<TrainingResponse, WorkerError> {
        self.trains.fetch_add(1, Ordering::SeqCst);
        self.called.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.inner.train_batch(rows).await
    }

    async fn predict_one(&self, request: &PredictionRequest) -> Result<PredictionResponse, WorkerError> {
        self.inner.predict_one(request).await
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

fn setup(dir: &std::path::Path, worker: Arc<CountingWorker>) -> (Arc<HealthEngine>, RetrainScheduler) {
    let store = Arc::new(SqliteFeatureStore::in_memory().unwrap());
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let rows: Vec<_> = (0..200)
        .map(|i| {
            (
                start + ChronoDuration::seconds(i),
                SensorFeatures::new(40.0 + (i % 10) as f64, 1.0 + (i % 5) as f64 * 0.1, 2.0),
            )
        })
        .collect();
    store.insert_many("PM_001", &rows).unwrap();

    let engine = Arc::new(HealthEngine::new(
        TrainingSettings::default(),
        store,
        worker,
        ModelStore::new(dir.join("ml_model.json")),
        Arc::new(TrainingState::new()),
    ));
    let scheduler = RetrainScheduler::new(engine.clone(), "PM_001", INTERVAL, INITIAL_DELAY);
    (engine, scheduler)
}

async fn wait_until_idle(engine: &HealthEngine) {
    while engine.is_training() {
        time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_initial_run_after_delay() {
    let dir = tempfile::tempdir().unwrap();
    let worker = CountingWorker::new(false);
    let (engine, scheduler) = setup(dir.path(), worker.clone());

    scheduler.start();
    let status = scheduler.get_status();
    assert!(status.is_running);
    assert_eq!(status.active_timer_count, 2);
    assert!(!status.model_status.is_trained);

    time::sleep(INITIAL_DELAY - Duration::from_secs(1)).await;
    assert_eq!(worker.trains(), 0);

    worker.called.notified().await;
    wait_until_idle(&engine).await;

    assert_eq!(worker.trains(), 1);
    assert!(engine.get_model_status().is_trained);
    // Initial timer has fired; only the periodic one remains
    assert_eq!(scheduler.get_status().active_timer_count, 1);

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_periodic_tick_retrains() {
    let dir = tempfile::tempdir().unwrap();
    let worker = CountingWorker::new(false);
    let (engine, scheduler) = setup(dir.path(), worker.clone());

    scheduler.start();
    worker.called.notified().await;
    wait_until_idle(&engine).await;
    let first = engine.get_model_status().last_training_time;

    worker.called.notified().await;
    wait_until_idle(&engine).await;

    assert_eq!(worker.trains(), 2);
    assert!(engine.get_model_status().last_training_time >= first);

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_tick_skips_while_training() {
    let dir = tempfile::tempdir().unwrap();
    let worker = CountingWorker::new(true);
    let (engine, scheduler) = setup(dir.path(), worker.clone());

    scheduler.start();
    worker.called.notified().await;
    assert!(engine.is_training());

    // Two periodic ticks land while the initial run is held open
    time::sleep(INTERVAL * 2).await;
    assert_eq!(worker.trains(), 1);
    assert!(scheduler.get_status().model_status.is_training);

    if let Some(gate) = &worker.gate {
        gate.notify_one();
    }
    wait_until_idle(&engine).await;

    assert_eq!(worker.trains(), 1);
    assert!(engine.get_model_status().is_trained);

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_timers_idempotently() {
    let dir = tempfile::tempdir().unwrap();
    let worker = CountingWorker::new(false);
    let (_engine, scheduler) = setup(dir.path(), worker.clone());

    scheduler.start();
    scheduler.stop();

    let status = scheduler.get_status();
    assert!(!status.is_running);
    assert_eq!(status.active_timer_count, 0);

    time::sleep(INTERVAL * 3).await;
    assert_eq!(worker.trains(), 0);

    scheduler.stop();
    assert!(!scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_arms_once() {
    let dir = tempfile::tempdir().unwrap();
    let (_engine, scheduler) = setup(dir.path(), CountingWorker::new(false));

    scheduler.start();
    scheduler.start();
    assert_eq!(scheduler.get_status().active_timer_count, 2);

    scheduler.stop();
    scheduler.start();
    assert!(scheduler.is_running());
    assert_eq!(scheduler.get_status().active_timer_count, 2);
    scheduler.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_start_and_stop_agree_on_state() {
    let dir = tempfile::tempdir().unwrap();
    let (_engine, scheduler) = setup(dir.path(), CountingWorker::new(false));
    let scheduler = Arc::new(scheduler);

    for _ in 0..50 {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let scheduler = scheduler.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        scheduler.start();
                    } else {
                        scheduler.stop();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let status = scheduler.get_status();
        let expected = if status.is_running { 2 } else { 0 };
        assert_eq!(status.active_timer_count, expected);
    }

    scheduler.stop();
    assert_eq!(scheduler.get_status().active_timer_count, 0);
}

#[test]
fn test_status_serializes_camel_case() {
    let status = SchedulerStatus {
        is_running: true,
        active_timer_count: 1,
        model_status: ModelStatus {
            is_trained: false,
            last_training_time: None,
            is_training: false,
        },
    };
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["isRunning"], true);
    assert_eq!(json["activeTimerCount"], 1);
    assert_eq!(json["modelStatus"]["isTrained"], false);
}
