use std::fmt;

use serde::{Deserialize, Serialize};

use crate::MetricSnapshot;

/// The metrics the evaluator watches, in the order alerts are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    CpuTemperature,
    CpuUsage,
    MemoryUsage,
    DiskUsage,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::CpuTemperature,
        MetricKind::CpuUsage,
        MetricKind::MemoryUsage,
        MetricKind::DiskUsage,
    ];

    /// The value of this metric in `snapshot`.
    ///
    /// `None` means the reading is not a measurement at all (the temperature
    /// sensor reports `0` when it cannot be read).
    pub fn reading(self, snapshot: &MetricSnapshot) -> Option<f64> {
        match self {
            MetricKind::CpuTemperature => {
                let temperature = snapshot.cpu.temperature;
                (temperature != 0.0).then_some(temperature)
            }
            MetricKind::CpuUsage => Some(snapshot.cpu.usage_percent),
            MetricKind::MemoryUsage => Some(snapshot.memory.used_percent),
            MetricKind::DiskUsage => Some(snapshot.disk.used_percent),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::CpuTemperature => "CPU_TEMPERATURE",
            MetricKind::CpuUsage => "CPU_USAGE",
            MetricKind::MemoryUsage => "MEMORY_USAGE",
            MetricKind::DiskUsage => "DISK_USAGE",
        };
        f.write_str(name)
    }
}

/// One ceiling per metric; a reading strictly above it is a breach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    /// Degrees Celsius
    pub cpu_temperature: f64,
    /// Percent
    pub cpu_usage: f64,
    /// Percent
    pub memory_usage: f64,
    /// Percent
    pub disk_usage: f64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            cpu_temperature: 70.0,
            cpu_usage: 90.0,
            memory_usage: 85.0,
            disk_usage: 90.0,
        }
    }
}

impl ThresholdPolicy {
    pub fn ceiling(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::CpuTemperature => self.cpu_temperature,
            MetricKind::CpuUsage => self.cpu_usage,
            MetricKind::MemoryUsage => self.memory_usage,
            MetricKind::DiskUsage => self.disk_usage,
        }
    }

    /// Whether `value` breaches the ceiling for `kind`.
    ///
    /// A temperature ceiling of `0` disables temperature alerts entirely.
    pub fn is_breached(&self, kind: MetricKind, value: f64) -> bool {
        let ceiling = self.ceiling(kind);
        if kind == MetricKind::CpuTemperature && ceiling == 0.0 {
            return false;
        }
        value > ceiling
    }
}
