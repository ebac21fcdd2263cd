//! Tunnel configuration.
//!
//! Resolution is the embedding daemon's concern; this crate only defines
//! the shape, the defaults, and a TOML entry point. Every field has a
//! default so a partial file (or an empty one) is valid.

use serde::{Deserialize, Serialize};

/// Ethernet header size, added to the MTU in TAP mode.
pub const ETHER_HEADER_BYTES: usize = 14;

/// Which kind of virtual interface the tunnel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Layer 2 — Ethernet frames.
    Tap,
    /// Layer 3 — raw IP packets.
    Tun,
}

/// Top-level tunnel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    pub mode: Mode,
    pub mtu: u16,
    pub session: SessionConfig,
}

/// Session lifetime and refresh thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds a session may send before it must be renegotiated.
    pub valid_secs: u64,
    /// Seconds after establishment before a refresh is requested.
    pub refresh_secs: u64,
    /// Upper bound on the random jitter added to the refresh deadline,
    /// spreading renegotiations across peers.
    pub refresh_jitter_secs: u64,
    /// Send-counter value past which a refresh is requested regardless
    /// of elapsed time.
    pub refresh_after_packets: u64,
    /// Seconds a superseded session lingers to absorb in-flight packets.
    pub linger_secs: u64,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Tap,
            mtu: 1500,
            session: SessionConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            valid_secs: 3600,
            refresh_secs: 2700,
            refresh_jitter_secs: 300,
            refresh_after_packets: 1 << 32,
            linger_secs: 60,
        }
    }
}

impl TunnelConfig {
    pub fn from_toml_str(raw: &str) -> Result<TunnelConfig, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Largest payload the virtual interface can hand us: the MTU, plus
    /// the Ethernet header when switching frames.
    pub fn max_payload_size(&self) -> usize {
        match self.mode {
            Mode::Tap => usize::from(self.mtu) + ETHER_HEADER_BYTES,
            Mode::Tun => usize::from(self.mtu),
        }
    }
}
