//! Metric collection for the local host.

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sysinfo::{Components, Disks, Networks, System};
use tracing::{instrument, trace, warn};

use crate::{CpuReading, DiskReading, MemoryReading, MetricSnapshot, NetworkReading};

/// Raspberry Pi thermal zone, plus the same file when `/sys` is mounted into a container.
const THERMAL_ZONE_PATHS: [&str; 2] = [
    "/sys/class/thermal/thermal_zone0/temp",
    "/host/sys/class/thermal/thermal_zone0/temp",
];

#[derive(Debug, Clone, PartialEq)]
pub enum CollectionError {
    /// The collector could not produce a snapshot at all
    Unavailable(String),

    /// Collection did not finish within the allotted time
    Timeout,
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionError::Unavailable(msg) => write!(f, "metrics unavailable: {}", msg),
            CollectionError::Timeout => write!(f, "timed out while collecting metrics"),
        }
    }
}

impl std::error::Error for CollectionError {}

/// Produces point-in-time snapshots of the host.
///
/// Implementations hold no state between calls that affects the result.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn snapshot(&self) -> Result<MetricSnapshot, CollectionError>;
}

/// [`MetricsSource`] backed by `sysinfo` and the kernel thermal zone.
#[derive(Debug, Clone)]
pub struct SysinfoSource {
    disk_path: PathBuf,
}

impl SysinfoSource {
    pub fn new(disk_path: impl Into<PathBuf>) -> Self {
        Self {
            disk_path: disk_path.into(),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new("/")
    }
}

#[async_trait]
impl MetricsSource for SysinfoSource {
    #[instrument(skip(self))]
    async fn snapshot(&self) -> Result<MetricSnapshot, CollectionError> {
        let disk_path = self.disk_path.clone();

        // cpu usage needs two samples with a pause in between
        tokio::task::spawn_blocking(move || collect(&disk_path))
            .await
            .map_err(|e| CollectionError::Unavailable(format!("collector task failed: {e}")))
    }
}

fn collect(disk_path: &Path) -> MetricSnapshot {
    let mut sys = System::new();
    sys.refresh_cpu_all();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_all();
    sys.refresh_memory();

    let snapshot = MetricSnapshot {
        cpu: CpuReading {
            usage_percent: sys.global_cpu_usage() as f64,
            temperature: cpu_temperature(),
            cores: sys.cpus().len(),
            frequency_mhz: sys.cpus().first().map(|cpu| cpu.frequency()).unwrap_or(0),
        },
        memory: memory_reading(&sys),
        disk: disk_reading(disk_path),
        network: network_reading(),
        uptime_secs: System::uptime(),
    };

    trace!("collected snapshot: {snapshot:?}");
    snapshot
}

fn memory_reading(sys: &System) -> MemoryReading {
    let total = sys.total_memory();
    let used = sys.used_memory();

    MemoryReading {
        total,
        used,
        available: sys.available_memory(),
        used_percent: percent(used, total),
    }
}

fn disk_reading(disk_path: &Path) -> DiskReading {
    let disks = Disks::new_with_refreshed_list();

    let Some(disk) = disks.iter().find(|disk| disk.mount_point() == disk_path) else {
        warn!("no disk mounted at {}", disk_path.display());
        return DiskReading::default();
    };

    let total = disk.total_space();
    let free = disk.available_space();
    let used = total.saturating_sub(free);

    DiskReading {
        total,
        used,
        free,
        used_percent: percent(used, total),
    }
}

fn network_reading() -> NetworkReading {
    let networks = Networks::new_with_refreshed_list();

    let mut reading = NetworkReading::default();
    for (_, data) in &networks {
        reading.bytes_sent += data.total_transmitted();
        reading.bytes_received += data.total_received();

        if reading.ip.is_none() {
            reading.ip = data
                .ip_networks()
                .iter()
                .map(|network| network.addr)
                .find(|addr| matches!(addr, IpAddr::V4(v4) if !v4.is_loopback()));
        }
    }

    reading
}

/// Degrees Celsius, `0.0` when no sensor is readable.
fn cpu_temperature() -> f64 {
    for path in THERMAL_ZONE_PATHS {
        if let Ok(raw) = std::fs::read_to_string(path)
            && let Some(celsius) = parse_millidegrees(&raw)
        {
            return celsius;
        }
    }

    let components = Components::new_with_refreshed_list();
    let temperatures: Vec<f32> = components
        .iter()
        .filter_map(|component| component.temperature())
        .collect();

    if temperatures.is_empty() {
        return 0.0;
    }

    (temperatures.iter().sum::<f32>() / temperatures.len() as f32) as f64
}

fn parse_millidegrees(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .map(|millidegrees| millidegrees / 1000.0)
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}
