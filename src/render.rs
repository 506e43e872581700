//! Telegram Markdown text for alerts, status reports and the alert status query.

use std::fmt::{self, Write};

use chrono::{DateTime, TimeZone};

use crate::MetricSnapshot;
use crate::config::AlertStatus;
use crate::monitors::evaluator::AlertBatch;
use crate::monitors::thresholds::MetricKind;
use crate::util::{format_bytes, format_uptime};
use crate::wol::WakeOutcome;

pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

const ALERT_HEADER: &str = "🚨 *SYSTEM ALERT*";

/// The message carried by a single alert of `kind`.
pub fn alert_message(kind: MetricKind, value: f64, threshold: f64, snapshot: &MetricSnapshot) -> String {
    match kind {
        MetricKind::CpuTemperature => format!(
            "🌡️ *CPU temperature too high!*\n├ Current: *{value:.1}°C*\n└ Threshold: {threshold:.1}°C"
        ),
        MetricKind::CpuUsage => format!(
            "📈 *CPU overloaded!*\n├ Current: *{value:.1}%*\n└ Threshold: {threshold:.1}%"
        ),
        MetricKind::MemoryUsage => format!(
            "💾 *Memory almost full!*\n├ Used: *{value:.1}%* ({}/{})\n└ Threshold: {threshold:.1}%",
            format_bytes(snapshot.memory.used),
            format_bytes(snapshot.memory.total),
        ),
        MetricKind::DiskUsage => format!(
            "💿 *Disk almost full!*\n├ Used: *{value:.1}%* ({}/{})\n└ Threshold: {threshold:.1}%",
            format_bytes(snapshot.disk.used),
            format_bytes(snapshot.disk.total),
        ),
    }
}

/// Compose one message out of a batch: header, the alert messages separated
/// by a blank line, and a trailing timestamp line.
pub fn render_alerts<Tz>(batch: &AlertBatch, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let body = batch
        .alerts()
        .iter()
        .map(|alert| alert.message.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{ALERT_HEADER}\n\n{body}\n\n⏰ _Time: {}_",
        now.format(TIMESTAMP_FORMAT)
    )
}

/// Full host report for the `/pi` command.
pub fn render_system_report<Tz>(snapshot: &MetricSnapshot, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let MetricSnapshot {
        cpu,
        memory,
        disk,
        network,
        uptime_secs,
    } = snapshot;

    let ip = network
        .ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut report = String::from("🍓 *Raspberry Pi Status*\n\n");

    // writing into a String cannot fail
    let _ = write!(
        report,
        "🖥️ *CPU*\n├ Usage: {:.1}%\n├ Temperature: {}\n├ Cores: {}\n└ Frequency: {} MHz\n\n",
        cpu.usage_percent,
        temperature(cpu.temperature),
        cpu.cores,
        cpu.frequency_mhz,
    );
    let _ = write!(
        report,
        "💾 *RAM*\n├ Total: {}\n├ Used: {} ({:.1}%)\n└ Available: {}\n\n",
        format_bytes(memory.total),
        format_bytes(memory.used),
        memory.used_percent,
        format_bytes(memory.available),
    );
    let _ = write!(
        report,
        "💿 *Disk*\n├ Total: {}\n├ Used: {} ({:.1}%)\n└ Free: {}\n\n",
        format_bytes(disk.total),
        format_bytes(disk.used),
        disk.used_percent,
        format_bytes(disk.free),
    );
    let _ = write!(
        report,
        "🌐 *Network*\n├ IP: {ip}\n├ Sent: {}\n└ Received: {}\n\n",
        format_bytes(network.bytes_sent),
        format_bytes(network.bytes_received),
    );
    let _ = write!(
        report,
        "⏱️ *Uptime*: {}\n🕐 *Updated*: {}",
        format_uptime(*uptime_secs),
        now.format(TIMESTAMP_FORMAT),
    );

    report
}

/// Reply for the `/alert` command.
pub fn render_alert_status(status: &AlertStatus) -> String {
    if !status.active {
        return "🚨 *Alert status*\n\n❌ *Status:* Disabled\n\n_Set ALERT\\_ENABLED=true and ALLOWED\\_USERS to enable_".to_string();
    }

    let thresholds = &status.thresholds;
    format!(
        "🚨 *Alert status*\n\n\
         ✅ *Status:* Active\n\
         ⏱️ *Check every:* {}s\n\
         👥 *Recipients:* {}\n\n\
         📊 *Thresholds:*\n\
         ├ 🌡️ CPU temperature: > {:.0}°C\n\
         ├ 📈 CPU usage: > {:.0}%\n\
         ├ 💾 RAM usage: > {:.0}%\n\
         └ 💿 Disk usage: > {:.0}%\n\n\
         _You will be notified when a threshold is exceeded_",
        status.interval.as_secs(),
        status.recipients,
        thresholds.cpu_temperature,
        thresholds.cpu_usage,
        thresholds.memory_usage,
        thresholds.disk_usage,
    )
}

/// Reply for the `/wake` command.
pub fn render_wake_outcome(outcome: &WakeOutcome, broadcast: &str) -> String {
    match outcome {
        WakeOutcome::NotConfigured => "⚠️ *Wake-on-LAN is not configured*\n\n\
             Set the environment variables:\n\
             `WOL_MAC_ADDRESS=AA:BB:CC:DD:EE:FF`\n\
             `WOL_HOST=192.168.1.100` _(optional, used to check whether the PC is on)_"
            .to_string(),
        WakeOutcome::AlreadyOnline { host, mac } => format!(
            "✅ *PC is already on!*\n\n🖥️ Host: `{host}`\n📡 MAC: `{mac}`\n\n_No magic packet needed._"
        ),
        WakeOutcome::Sent { mac, host } => {
            let host = host
                .as_deref()
                .map(|host| format!("🖥️ Host: `{host}`\n"))
                .unwrap_or_default();
            format!(
                "🚀 *Magic packet sent!*\n\n{host}📡 MAC: `{mac}`\n📦 Broadcast: `{broadcast}`\n\n⏳ _The PC should boot in a few seconds..._"
            )
        }
        WakeOutcome::Failed(e) => format!("❌ *Sending magic packet failed!*\n\n`{e}`"),
    }
}

fn temperature(celsius: f64) -> String {
    if celsius == 0.0 {
        return "N/A".to_string();
    }
    format!("{celsius:.1}°C")
}
