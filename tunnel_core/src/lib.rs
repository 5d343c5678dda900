//! Lifecycle control for wg-quick managed WireGuard tunnels.
//!
//! The crate is layered bottom-up:
//!
//! - [`keyed`]: sorted, key-addressable collections with change notification.
//! - [`conf`]: immutable wg-quick configuration snapshots and their editable form.
//! - [`tunnel`]: the privileged runner, the wg-quick backend and the tunnel registry.
//! - [`config`] and [`logging`]: settings and structured logging for the tools built on top.

pub mod conf;
pub mod config;
pub mod keyed;
pub mod logging;
pub mod tunnel;

// Re-export commonly used types for convenience
pub use conf::{ConfigParseError, ConfigSnapshot, EditableConfig, GlobalExclusions};
pub use config::{ConfigError, Settings, SettingsManager};
pub use keyed::{Keyed, ObservableSortedKeyedList, SortedKeyedList};
pub use tunnel::{
    Tunnel, TunnelBackend, TunnelError, TunnelManager, TunnelResult, TunnelState, WgQuickBackend,
};
