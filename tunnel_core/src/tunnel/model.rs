//! A named tunnel and its observable attributes.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use super::error::{TunnelError, TunnelResult};
use super::types::{TunnelState, TunnelStatistics};
use crate::conf::ConfigSnapshot;
use crate::keyed::Keyed;

/// Longest interface name the kernel accepts.
pub const MAX_NAME_LEN: usize = 15;

const EVENT_CAPACITY: usize = 16;

/// Change to one of a tunnel's attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelEvent {
    StateChanged(TunnelState),
    ConfigChanged(ConfigSnapshot),
    StatisticsChanged(TunnelStatistics),
}

/// Whether `name` can be used as an interface name.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '=' | '+' | '.' | '-'))
}

/// A tunnel known to the manager.
///
/// The name is fixed for the lifetime of the value; renaming produces a new
/// tunnel. State, configuration and statistics are cached copies of what the
/// backend last reported.
#[derive(Debug)]
pub struct Tunnel {
    name: String,
    state: Mutex<TunnelState>,
    config: Mutex<Option<ConfigSnapshot>>,
    statistics: Mutex<TunnelStatistics>,
    events: broadcast::Sender<TunnelEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Tunnel {
    pub fn new(
        name: impl Into<String>,
        config: Option<ConfigSnapshot>,
        state: TunnelState,
    ) -> TunnelResult<Self> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(TunnelError::InvalidName(name));
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Tunnel {
            name,
            state: Mutex::new(state),
            config: Mutex::new(config),
            statistics: Mutex::new(TunnelStatistics::default()),
            events,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TunnelState {
        *lock(&self.state)
    }

    pub fn config(&self) -> Option<ConfigSnapshot> {
        lock(&self.config).clone()
    }

    pub fn statistics(&self) -> TunnelStatistics {
        *lock(&self.statistics)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TunnelEvent> {
        self.events.subscribe()
    }

    /// Record an observed state and notify subscribers, even if unchanged.
    pub(crate) fn on_state_changed(&self, state: TunnelState) -> TunnelState {
        *lock(&self.state) = state;
        let _ = self.events.send(TunnelEvent::StateChanged(state));
        state
    }

    pub(crate) fn on_config_changed(&self, config: ConfigSnapshot) -> ConfigSnapshot {
        *lock(&self.config) = Some(config.clone());
        let _ = self.events.send(TunnelEvent::ConfigChanged(config.clone()));
        config
    }

    pub(crate) fn on_statistics_changed(&self, statistics: TunnelStatistics) -> TunnelStatistics {
        *lock(&self.statistics) = statistics;
        let _ = self.events.send(TunnelEvent::StatisticsChanged(statistics));
        statistics
    }
}

impl Keyed for Tunnel {
    type Key = str;

    fn key(&self) -> &str {
        &self.name
    }

    fn is_same(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}
