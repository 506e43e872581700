//! Shared fakes for the integration tests

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use pi_monitor::actors::scheduler::{AlertHandler, Clock, SchedulerSettings};
use pi_monitor::monitors::evaluator::AlertBatch;
use pi_monitor::monitors::source::{CollectionError, MetricsSource};
use pi_monitor::{CpuReading, DiskReading, MemoryReading, MetricSnapshot};

/// Metrics source whose next reading is set by the test.
pub struct FakeSource {
    reading: Mutex<Result<MetricSnapshot, CollectionError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(snapshot: MetricSnapshot) -> Self {
        Self {
            reading: Mutex::new(Ok(snapshot)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every snapshot takes `delay` before it is returned.
    pub fn slow(snapshot: MetricSnapshot, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(snapshot)
        }
    }

    pub fn set(&self, snapshot: MetricSnapshot) {
        *self.reading.lock().unwrap() = Ok(snapshot);
    }

    pub fn fail(&self, reason: &str) {
        *self.reading.lock().unwrap() = Err(CollectionError::Unavailable(reason.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsSource for FakeSource {
    async fn snapshot(&self) -> Result<MetricSnapshot, CollectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reading.lock().unwrap().clone()
    }
}

/// Alert handler that keeps every batch it is given.
#[derive(Default)]
pub struct RecordingHandler {
    batches: Mutex<Vec<AlertBatch>>,
}

impl RecordingHandler {
    pub fn batches(&self) -> Vec<AlertBatch> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertHandler for RecordingHandler {
    async fn handle(&self, batch: AlertBatch) {
        self.batches.lock().unwrap().push(batch);
    }
}

/// Wall clock that only moves when told to.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Mutex::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ))
    }

    pub fn advance(&self, secs: i64) {
        *self.0.lock().unwrap() += TimeDelta::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub fn settings(interval_secs: u64) -> SchedulerSettings {
    SchedulerSettings {
        interval: Duration::from_secs(interval_secs),
        snapshot_timeout: Duration::from_secs(10),
    }
}

/// Every reading comfortably below the default thresholds.
pub fn calm_snapshot() -> MetricSnapshot {
    MetricSnapshot {
        cpu: CpuReading {
            usage_percent: 12.0,
            temperature: 48.0,
            cores: 4,
            frequency_mhz: 1500,
        },
        memory: MemoryReading {
            total: 4 * 1024 * 1024 * 1024,
            used: 1024 * 1024 * 1024,
            available: 3 * 1024 * 1024 * 1024,
            used_percent: 25.0,
        },
        disk: DiskReading {
            total: 32 * 1024 * 1024 * 1024,
            used: 8 * 1024 * 1024 * 1024,
            free: 24 * 1024 * 1024 * 1024,
            used_percent: 25.0,
        },
        uptime_secs: 3_600,
        ..MetricSnapshot::default()
    }
}

pub fn with_temperature(temperature: f64) -> MetricSnapshot {
    let mut snapshot = calm_snapshot();
    snapshot.cpu.temperature = temperature;
    snapshot
}

pub fn with_disk_usage(used_percent: f64) -> MetricSnapshot {
    let mut snapshot = calm_snapshot();
    snapshot.disk.used_percent = used_percent;
    snapshot
}
