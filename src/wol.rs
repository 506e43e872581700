//! Wake-on-LAN for the `/wake` command.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tokio::net::{TcpStream, UdpSocket, lookup_host};
use tracing::{debug, info, instrument, trace};

use crate::config::WolConfig;

/// SMB, HTTP, RDP, SSH
pub const PROBE_PORTS: [u16; 4] = [445, 80, 3389, 22];

const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

const PACKET_LEN: usize = 6 + 16 * 6;

#[derive(Debug)]
pub enum WolError {
    /// Not 12 hex digits once separators are removed
    InvalidMac(String),

    /// The broadcast address does not resolve
    InvalidBroadcast(String),

    /// Socket could not be opened or the packet not sent
    Io(std::io::Error),
}

impl fmt::Display for WolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WolError::InvalidMac(mac) => write!(f, "invalid MAC address: {}", mac),
            WolError::InvalidBroadcast(addr) => write!(f, "invalid broadcast address: {}", addr),
            WolError::Io(err) => write!(f, "could not send magic packet: {}", err),
        }
    }
}

impl std::error::Error for WolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WolError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WolError {
    fn from(err: std::io::Error) -> Self {
        WolError::Io(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = WolError;

    /// Accepts `AA:BB:CC:DD:EE:FF`, `aa-bb-cc-dd-ee-ff` or `aabbccddeeff`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.trim().chars().filter(|c| !matches!(c, ':' | '-')).collect();

        if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(WolError::InvalidMac(s.to_string()));
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| WolError::InvalidMac(s.to_string()))?;
        }

        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Six `0xFF` bytes followed by the MAC repeated 16 times.
pub fn magic_packet(mac: &MacAddress) -> [u8; PACKET_LEN] {
    let mut packet = [0xFF; PACKET_LEN];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac.0);
    }
    packet
}

#[instrument]
pub async fn send_magic_packet(mac: &MacAddress, broadcast: &str) -> Result<(), WolError> {
    let target = lookup_host(broadcast)
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| WolError::InvalidBroadcast(broadcast.to_string()))?;

    let bind: SocketAddr = match target {
        SocketAddr::V4(_) => ([0, 0, 0, 0], 0).into(),
        SocketAddr::V6(_) => ([0u16; 8], 0).into(),
    };

    let socket = UdpSocket::bind(bind).await?;
    socket.set_broadcast(true)?;
    socket.send_to(&magic_packet(mac), target).await?;

    debug!("magic packet for {mac} sent to {target}");
    Ok(())
}

/// Best-effort check whether `host` is up: any of the [`PROBE_PORTS`] accepting
/// a TCP connection counts. A blank host is never probed.
pub async fn is_host_online(host: &str) -> bool {
    probe(host, &PROBE_PORTS, PROBE_TIMEOUT).await
}

async fn probe(host: &str, ports: &[u16], timeout: Duration) -> bool {
    if host.trim().is_empty() {
        return false;
    }

    for &port in ports {
        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => {
                trace!("{host}:{port} accepted connection");
                return true;
            }
            Ok(Err(e)) => trace!("{host}:{port} refused: {e}"),
            Err(_) => trace!("{host}:{port} timed out"),
        }
    }

    false
}

/// What `/wake` did
#[derive(Debug)]
pub enum WakeOutcome {
    /// No MAC address configured
    NotConfigured,

    /// The configured host answered the probe; nothing was sent
    AlreadyOnline { host: String, mac: MacAddress },

    /// `host` is the configured host, if any, which was not reachable
    Sent { mac: MacAddress, host: Option<String> },

    Failed(WolError),
}

pub async fn wake(config: &WolConfig) -> WakeOutcome {
    let Some(raw) = config.mac_address.as_deref() else {
        return WakeOutcome::NotConfigured;
    };

    let mac = match raw.parse::<MacAddress>() {
        Ok(mac) => mac,
        Err(e) => return WakeOutcome::Failed(e),
    };

    if let Some(host) = config.host.as_deref()
        && is_host_online(host).await
    {
        info!("{host} is already online, not sending magic packet");
        return WakeOutcome::AlreadyOnline {
            host: host.to_string(),
            mac,
        };
    }

    match send_magic_packet(&mac, &config.broadcast).await {
        Ok(()) => {
            info!("sent magic packet to {mac} via {}", config.broadcast);
            WakeOutcome::Sent {
                mac,
                host: config.host.clone(),
            }
        }
        Err(e) => WakeOutcome::Failed(e),
    }
}
