//! Type definitions for the tunnel module.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// State of a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelState {
    /// Interface is not present
    Down,
    /// Interface is present
    Up,
    /// Request-only: the opposite of the current state
    Toggle,
}

impl TunnelState {
    /// Resolve [`TunnelState::Toggle`] against `current`. Other requests are returned as is.
    pub fn resolve(self, current: TunnelState) -> TunnelState {
        match self {
            TunnelState::Toggle if current == TunnelState::Up => TunnelState::Down,
            TunnelState::Toggle => TunnelState::Up,
            other => other,
        }
    }

    pub fn of(running: bool) -> TunnelState {
        if running {
            TunnelState::Up
        } else {
            TunnelState::Down
        }
    }
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelState::Down => f.write_str("down"),
            TunnelState::Up => f.write_str("up"),
            TunnelState::Toggle => f.write_str("toggle"),
        }
    }
}

impl FromStr for TunnelState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "down" => Ok(TunnelState::Down),
            "up" => Ok(TunnelState::Up),
            "toggle" => Ok(TunnelState::Toggle),
            other => Err(format!("unknown tunnel state: {other}")),
        }
    }
}

/// Transfer counters for a tunnel, summed over its peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelStatistics {
    /// Total bytes received
    pub rx_bytes: u64,
    /// Total bytes sent
    pub tx_bytes: u64,
}

impl TunnelStatistics {
    pub fn total(&self) -> u64 {
        self.rx_bytes.saturating_add(self.tx_bytes)
    }

    /// Add one peer's counters.
    pub fn record_peer(&mut self, rx_bytes: u64, tx_bytes: u64) {
        self.rx_bytes = self.rx_bytes.saturating_add(rx_bytes);
        self.tx_bytes = self.tx_bytes.saturating_add(tx_bytes);
    }
}
