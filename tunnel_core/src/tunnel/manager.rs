//! Tunnel management abstraction.
//!
//! [`TunnelManager`] owns the sorted registry of known tunnels and reconciles
//! it with the backend. Every backend call runs on a blocking worker so that
//! operations on different tunnels proceed concurrently.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task;
use tracing::{debug, error, info, warn};

use super::backend::TunnelBackend;
use super::error::{TunnelError, TunnelResult};
use super::model::{Tunnel, is_valid_name};
use super::store::{ConfigStore, PersistedState, StateStore};
use super::types::{TunnelState, TunnelStatistics};
use crate::conf::ConfigSnapshot;
use crate::keyed::{ListChange, ObservableSortedKeyedList, SortedKeyedList};

/// Manager behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Bring previously running tunnels back up on [`TunnelManager::restore_state`]
    pub restore_on_boot: bool,
}

/// Result of one unit in a batch operation.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub name: String,
    pub result: TunnelResult<T>,
}

type Registry = ObservableSortedKeyedList<Arc<Tunnel>>;

/// Case-insensitive name order, ties broken by exact byte order.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}

/// Manager for handling multiple tunnels.
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Clone)]
pub struct TunnelManager {
    backend: Arc<dyn TunnelBackend>,
    configs: Arc<dyn ConfigStore>,
    state: Arc<dyn StateStore>,
    settings: ManagerSettings,

    /// Known tunnels, ordered by name
    tunnels: Arc<Mutex<Registry>>,

    last_used: Arc<Mutex<Option<Arc<Tunnel>>>>,

    /// Serializes writes of the persisted state
    persist_lock: Arc<tokio::sync::Mutex<()>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TunnelManager {
    /// Create a manager with an empty registry. Call [`TunnelManager::load`] to populate it.
    pub fn new(
        backend: Arc<dyn TunnelBackend>,
        configs: Arc<dyn ConfigStore>,
        state: Arc<dyn StateStore>,
        settings: ManagerSettings,
    ) -> Self {
        let registry: Registry = ObservableSortedKeyedList::new(SortedKeyedList::new(compare_names));
        TunnelManager {
            backend,
            configs,
            state,
            settings,
            tunnels: Arc::new(Mutex::new(registry)),
            last_used: Arc::new(Mutex::new(None)),
            persist_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn backend(&self) -> &Arc<dyn TunnelBackend> {
        &self.backend
    }

    /// Snapshot of the registry in order.
    pub fn tunnels(&self) -> Vec<Arc<Tunnel>> {
        lock(&self.tunnels).values().to_vec()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Tunnel>> {
        lock(&self.tunnels).get(name).cloned()
    }

    /// Registry changes made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ListChange<Arc<Tunnel>>> {
        lock(&self.tunnels).subscribe()
    }

    pub fn last_used_tunnel(&self) -> Option<Arc<Tunnel>> {
        lock(&self.last_used).clone()
    }

    fn add_to_registry(&self, tunnel: Arc<Tunnel>) -> TunnelResult<()> {
        lock(&self.tunnels).add(tunnel)?;
        Ok(())
    }

    fn remove_from_registry(&self, tunnel: &Arc<Tunnel>) -> bool {
        lock(&self.tunnels).remove_element(tunnel).is_some()
    }

    /// Populate the registry from the config store and the running set.
    ///
    /// Previously running tunnels are brought back up only when restoring is
    /// enabled in [`ManagerSettings`].
    pub async fn load(&self) -> TunnelResult<()> {
        let configs = Arc::clone(&self.configs);
        let backend = Arc::clone(&self.backend);
        let (present, running) = tokio::join!(
            task::spawn_blocking(move || configs.enumerate()),
            task::spawn_blocking(move || backend.enumerate()),
        );
        let present = present??;
        let running = running?;

        for name in present {
            let state = TunnelState::of(running.contains(&name));
            match Tunnel::new(name.as_str(), None, state) {
                Ok(tunnel) => self.add_to_registry(Arc::new(tunnel))?,
                Err(e) => warn!(tunnel = %name, "Skipping stored configuration: {}", e),
            }
        }
        info!(count = lock(&self.tunnels).len(), "Loaded tunnels");

        match self.read_state().await {
            Ok(persisted) => {
                if let Some(name) = persisted.last_used_tunnel {
                    *lock(&self.last_used) = self.get(&name);
                }
            }
            Err(e) => warn!("Unable to read saved state: {}", e),
        }

        for outcome in self.restore_state(false).await? {
            if let Err(e) = outcome.result {
                warn!(tunnel = %outcome.name, "Unable to restore tunnel: {}", e);
            }
        }
        Ok(())
    }

    async fn set_last_used(&self, tunnel: Option<Arc<Tunnel>>) {
        let _guard = self.persist_lock.lock().await;
        {
            let mut last_used = lock(&self.last_used);
            let unchanged = match (&*last_used, &tunnel) {
                (Some(current), Some(new)) => Arc::ptr_eq(current, new),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }
            *last_used = tunnel;
        }

        if let Err(e) = self.write_state().await {
            error!("Unable to save last used tunnel: {}", e);
        }
    }

    async fn read_state(&self) -> TunnelResult<PersistedState> {
        let store = Arc::clone(&self.state);
        Ok(task::spawn_blocking(move || store.load()).await??)
    }

    /// Write the in-memory running set and last used tunnel.
    ///
    /// Callers hold `persist_lock`.
    async fn write_state(&self) -> TunnelResult<()> {
        let running_tunnels: BTreeSet<String> = lock(&self.tunnels)
            .iter()
            .filter(|tunnel| tunnel.state() == TunnelState::Up)
            .map(|tunnel| tunnel.name().to_string())
            .collect();
        let last_used_tunnel = lock(&self.last_used)
            .as_ref()
            .map(|tunnel| tunnel.name().to_string());
        let persisted = PersistedState {
            running_tunnels,
            last_used_tunnel,
        };

        let store = Arc::clone(&self.state);
        task::spawn_blocking(move || store.save(&persisted)).await??;
        Ok(())
    }

    fn was_last_used(&self, tunnel: &Arc<Tunnel>) -> bool {
        lock(&self.last_used)
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, tunnel))
    }

    /// Persist a new configuration and register it as a stopped tunnel.
    pub async fn create(&self, name: &str, config: ConfigSnapshot) -> TunnelResult<Arc<Tunnel>> {
        if !is_valid_name(name) {
            return Err(TunnelError::InvalidName(name.to_string()));
        }
        if lock(&self.tunnels).contains_key(name) {
            return Err(TunnelError::AlreadyExists(name.to_string()));
        }

        let configs = Arc::clone(&self.configs);
        let owned = name.to_string();
        let saved = task::spawn_blocking(move || configs.create(&owned, &config)).await??;

        let tunnel = Arc::new(Tunnel::new(name, Some(saved), TunnelState::Down)?);
        self.add_to_registry(Arc::clone(&tunnel))?;
        info!(tunnel = %name, "Created tunnel");
        Ok(tunnel)
    }

    /// Stop and forget `tunnel`. The registry is left unchanged on failure.
    pub async fn delete(&self, tunnel: &Arc<Tunnel>) -> TunnelResult<()> {
        let original_state = tunnel.state();
        let was_last_used = self.was_last_used(tunnel);
        if was_last_used {
            self.set_last_used(None).await;
        }
        self.remove_from_registry(tunnel);

        let result = self.delete_blocking(tunnel, original_state).await;
        match result {
            Ok(()) => {
                info!(tunnel = %tunnel.name(), "Deleted tunnel");
                Ok(())
            }
            Err(e) => {
                error!(tunnel = %tunnel.name(), "Unable to delete tunnel: {}", e);
                self.add_to_registry(Arc::clone(tunnel))?;
                if was_last_used {
                    self.set_last_used(Some(Arc::clone(tunnel))).await;
                }
                Err(e)
            }
        }
    }

    async fn delete_blocking(&self, tunnel: &Arc<Tunnel>, original_state: TunnelState) -> TunnelResult<()> {
        if original_state == TunnelState::Up {
            self.ensure_config(tunnel).await?;
        }
        let backend = Arc::clone(&self.backend);
        let configs = Arc::clone(&self.configs);
        let tunnel = Arc::clone(tunnel);
        task::spawn_blocking(move || -> TunnelResult<()> {
            if original_state == TunnelState::Up {
                backend.set_state(&tunnel, TunnelState::Down)?;
            }
            if let Err(e) = configs.delete(tunnel.name()) {
                if original_state == TunnelState::Up {
                    if let Err(restart) = backend.set_state(&tunnel, TunnelState::Up) {
                        warn!(tunnel = %tunnel.name(), "Unable to restart tunnel: {}", restart);
                    }
                }
                return Err(e.into());
            }
            Ok(())
        })
        .await?
    }

    /// Rename `tunnel`. Returns the tunnel registered under `new_name`.
    pub async fn rename(&self, tunnel: &Arc<Tunnel>, new_name: &str) -> TunnelResult<Arc<Tunnel>> {
        if !is_valid_name(new_name) {
            return Err(TunnelError::InvalidName(new_name.to_string()));
        }
        if lock(&self.tunnels).contains_key(new_name) {
            return Err(TunnelError::AlreadyExists(new_name.to_string()));
        }

        self.ensure_config(tunnel).await?;
        let original_state = tunnel.state();
        let was_last_used = self.was_last_used(tunnel);
        if was_last_used {
            self.set_last_used(None).await;
        }
        self.remove_from_registry(tunnel);

        let backend = Arc::clone(&self.backend);
        let configs = Arc::clone(&self.configs);
        let original = Arc::clone(tunnel);
        let target = new_name.to_string();
        let unit = task::spawn_blocking(move || -> TunnelResult<(Arc<Tunnel>, TunnelResult<()>)> {
            if original_state == TunnelState::Up {
                backend.set_state(&original, TunnelState::Down)?;
            }
            configs.rename(original.name(), &target)?;
            let renamed = Arc::new(Tunnel::new(target, original.config(), TunnelState::Down)?);
            if original_state == TunnelState::Up {
                if let Err(e) = backend.set_state(&renamed, TunnelState::Up) {
                    return Ok((renamed, Err(e)));
                }
                renamed.on_state_changed(TunnelState::Up);
            }
            Ok((renamed, Ok(())))
        });
        let outcome = match unit.await {
            Ok(outcome) => outcome,
            Err(e) => Err(e.into()),
        };

        // Whatever happened, register the tunnel under the name the store now has.
        let (current, result) = match outcome {
            Ok((renamed, result)) => (renamed, result),
            Err(e) => (Arc::clone(tunnel), Err(e)),
        };
        if result.is_err() {
            if let Err(e) = self.get_tunnel_state(&current).await {
                warn!(tunnel = %current.name(), "Unable to query state: {}", e);
            }
        }
        self.add_to_registry(Arc::clone(&current))?;
        if was_last_used {
            self.set_last_used(Some(Arc::clone(&current))).await;
        }

        match result {
            Ok(()) => {
                info!(from = %tunnel.name(), to = %current.name(), "Renamed tunnel");
                Ok(current)
            }
            Err(e) => {
                error!(tunnel = %tunnel.name(), "Unable to rename tunnel: {}", e);
                Err(e)
            }
        }
    }

    async fn ensure_config(&self, tunnel: &Arc<Tunnel>) -> TunnelResult<ConfigSnapshot> {
        match tunnel.config() {
            Some(config) => Ok(config),
            None => self.get_tunnel_config(tunnel).await,
        }
    }

    /// Change the state of `tunnel`.
    ///
    /// Whatever the outcome, subscribers of the tunnel then see the state the
    /// backend reports and the running set is saved.
    pub async fn set_tunnel_state(
        &self,
        tunnel: &Arc<Tunnel>,
        state: TunnelState,
    ) -> TunnelResult<TunnelState> {
        let result = self.set_tunnel_state_inner(tunnel, state).await;

        let observed = match &result {
            Ok(new_state) => *new_state,
            Err(e) => {
                warn!(tunnel = %tunnel.name(), state = %state, "State change failed: {}", e);
                let backend = Arc::clone(&self.backend);
                let queried = Arc::clone(tunnel);
                task::spawn_blocking(move || backend.get_state(&queried))
                    .await
                    .unwrap_or_else(|_| tunnel.state())
            }
        };
        tunnel.on_state_changed(observed);
        if matches!(result, Ok(TunnelState::Up)) {
            self.set_last_used(Some(Arc::clone(tunnel))).await;
        }
        if let Err(e) = self.save_state().await {
            error!("Unable to save running tunnels: {}", e);
        }
        result
    }

    async fn set_tunnel_state_inner(
        &self,
        tunnel: &Arc<Tunnel>,
        state: TunnelState,
    ) -> TunnelResult<TunnelState> {
        self.ensure_config(tunnel).await?;
        let backend = Arc::clone(&self.backend);
        let target = Arc::clone(tunnel);
        task::spawn_blocking(move || backend.set_state(&target, state)).await?
    }

    /// Apply `config` to `tunnel` and persist it.
    pub async fn set_tunnel_config(
        &self,
        tunnel: &Arc<Tunnel>,
        config: ConfigSnapshot,
    ) -> TunnelResult<ConfigSnapshot> {
        self.ensure_config(tunnel).await?;
        let backend = Arc::clone(&self.backend);
        let configs = Arc::clone(&self.configs);
        let target = Arc::clone(tunnel);
        let saved = task::spawn_blocking(move || -> TunnelResult<ConfigSnapshot> {
            let applied = backend.apply_config(&target, config)?;
            Ok(configs.save(target.name(), &applied)?)
        })
        .await??;
        debug!(tunnel = %tunnel.name(), "Configuration updated");
        Ok(tunnel.on_config_changed(saved))
    }

    /// Load the stored configuration of `tunnel` and cache it.
    pub async fn get_tunnel_config(&self, tunnel: &Arc<Tunnel>) -> TunnelResult<ConfigSnapshot> {
        let configs = Arc::clone(&self.configs);
        let name = tunnel.name().to_string();
        let config = task::spawn_blocking(move || configs.load(&name)).await??;
        Ok(tunnel.on_config_changed(config))
    }

    pub async fn get_tunnel_state(&self, tunnel: &Arc<Tunnel>) -> TunnelResult<TunnelState> {
        let backend = Arc::clone(&self.backend);
        let target = Arc::clone(tunnel);
        let state = task::spawn_blocking(move || backend.get_state(&target)).await?;
        Ok(tunnel.on_state_changed(state))
    }

    pub async fn get_tunnel_statistics(&self, tunnel: &Arc<Tunnel>) -> TunnelResult<TunnelStatistics> {
        let backend = Arc::clone(&self.backend);
        let target = Arc::clone(tunnel);
        let statistics = task::spawn_blocking(move || backend.get_statistics(&target)).await?;
        Ok(tunnel.on_statistics_changed(statistics))
    }

    /// Update every tunnel from a single enumeration.
    pub async fn refresh_tunnel_states(&self) -> TunnelResult<()> {
        let backend = Arc::clone(&self.backend);
        let running = task::spawn_blocking(move || backend.enumerate()).await?;
        for tunnel in self.tunnels() {
            tunnel.on_state_changed(TunnelState::of(running.contains(tunnel.name())));
        }
        Ok(())
    }

    /// Persist the names of the tunnels currently up.
    pub async fn save_state(&self) -> TunnelResult<()> {
        let _guard = self.persist_lock.lock().await;
        self.write_state().await
    }

    /// Bring back the tunnels that were running when state was last saved.
    ///
    /// Does nothing unless `force` is set or restoring is enabled.
    pub async fn restore_state(&self, force: bool) -> TunnelResult<Vec<BatchOutcome<TunnelState>>> {
        if !force && !self.settings.restore_on_boot {
            debug!("Restoring tunnels is disabled");
            return Ok(Vec::new());
        }
        let persisted = self.read_state().await?;
        Ok(self.bulk_resume(&persisted.running_tunnels).await)
    }

    /// Bring every registered tunnel named in `names` up, concurrently.
    pub async fn bulk_resume(&self, names: &BTreeSet<String>) -> Vec<BatchOutcome<TunnelState>> {
        let selected: Vec<Arc<Tunnel>> = self
            .tunnels()
            .into_iter()
            .filter(|tunnel| names.contains(tunnel.name()))
            .collect();

        let units = selected.into_iter().map(|tunnel| {
            let manager = self.clone();
            let name = tunnel.name().to_string();
            let handle =
                tokio::spawn(async move { manager.set_tunnel_state(&tunnel, TunnelState::Up).await });
            async move {
                let result = handle.await.unwrap_or_else(|e| Err(e.into()));
                BatchOutcome { name, result }
            }
        });
        join_all(units).await
    }

    /// Delete every tunnel in `tunnels`, concurrently.
    pub async fn bulk_delete(&self, tunnels: Vec<Arc<Tunnel>>) -> Vec<BatchOutcome<()>> {
        let units = tunnels.into_iter().map(|tunnel| {
            let manager = self.clone();
            let name = tunnel.name().to_string();
            let handle = tokio::spawn(async move { manager.delete(&tunnel).await });
            async move {
                let result = handle.await.unwrap_or_else(|e| Err(e.into()));
                BatchOutcome { name, result }
            }
        });
        join_all(units).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_order() {
        let mut names = vec!["b", "A", "a", "B", "wg10", "Wg1"];
        names.sort_by(|a, b| compare_names(a, b));
        assert_eq!(names, vec!["A", "a", "B", "b", "Wg1", "wg10"]);
    }
}
