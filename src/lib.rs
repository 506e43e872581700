pub mod actors;
pub mod alerts;
pub mod commands;
pub mod config;
pub mod monitors;
pub mod render;
pub mod telegram;
pub mod util;
pub mod wol;

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// One point-in-time reading of the monitored host.
///
/// Only the percentages and the temperature take part in alerting; the
/// absolute figures are carried along for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub cpu: CpuReading,
    pub memory: MemoryReading,
    pub disk: DiskReading,
    pub network: NetworkReading,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuReading {
    pub usage_percent: f64,
    /// Degrees Celsius, `0.0` when no sensor could be read.
    pub temperature: f64,
    pub cores: usize,
    pub frequency_mhz: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskReading {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkReading {
    pub ip: Option<IpAddr>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}
