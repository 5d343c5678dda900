//! Tunnel lifecycle control.
//!
//! [`WgQuickBackend`] drives the wg-quick helper through a
//! [`PrivilegedProcessRunner`] and rolls back failed configuration changes.
//! [`TunnelManager`] keeps the ordered registry of known tunnels on top of it.

mod backend;
mod error;
mod manager;
mod model;
mod notify;
mod runner;
mod store;
mod tools;
pub mod types;

pub use backend::{BackendSettings, TunnelBackend, WgQuickBackend};
pub use error::{TunnelError, TunnelResult};
pub use manager::{BatchOutcome, ManagerSettings, TunnelManager, compare_names};
pub use model::{MAX_NAME_LEN, Tunnel, TunnelEvent, is_valid_name};
pub use notify::{LogNotificationSink, NotificationSink, NotifyError};
pub use runner::{PrivilegedProcessRunner, RootShell, RunnerError};
pub use store::{
    ConfigStore, FileConfigStore, JsonStateStore, MemoryConfigStore, MemoryStateStore,
    PersistedState, StateStore, StoreError, StoreResult,
};
pub use tools::{PathToolingProbe, ToolingProbe};
pub use types::{TunnelState, TunnelStatistics};
