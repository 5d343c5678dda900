//! Tunnel state transitions driven through wg-quick.
//!
//! All calls block on the privileged runner. Callers must not overlap
//! [`TunnelBackend::set_state`] or [`TunnelBackend::apply_config`] for the same
//! tunnel; nothing here serializes them.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::{TunnelError, TunnelResult};
use super::model::Tunnel;
use super::notify::NotificationSink;
use super::runner::PrivilegedProcessRunner;
use super::tools::ToolingProbe;
use super::types::{TunnelState, TunnelStatistics};
use crate::conf::ConfigSnapshot;

/// Controls tunnels on the host.
pub trait TunnelBackend: Send + Sync {
    /// Names of the tunnels currently running. Any failure yields an empty set.
    fn enumerate(&self) -> BTreeSet<String>;

    /// Live state of `tunnel`.
    fn get_state(&self, tunnel: &Tunnel) -> TunnelState;

    /// Bring `tunnel` to `state` using its current configuration and return
    /// the state observed afterwards.
    fn set_state(&self, tunnel: &Tunnel, state: TunnelState) -> TunnelResult<TunnelState>;

    /// Switch a running tunnel to `config`, restoring the previous
    /// configuration on failure. Tunnels that are not running are untouched.
    fn apply_config(&self, tunnel: &Tunnel, config: ConfigSnapshot) -> TunnelResult<ConfigSnapshot>;

    /// Transfer counters. Any failure yields zero counters.
    fn get_statistics(&self, tunnel: &Tunnel) -> TunnelStatistics;

    fn version(&self) -> TunnelResult<String>;

    fn type_name(&self) -> &'static str;
}

/// Locations of the helper executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub wg: String,
    pub wg_quick: String,
    /// Read before bringing a tunnel up; fails when the kernel module is not loaded.
    pub module_version_file: String,
    /// Parent for transient configuration files, system default when `None`.
    pub temp_dir: Option<PathBuf>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings {
            wg: "wg".to_string(),
            wg_quick: "wg-quick".to_string(),
            module_version_file: "/sys/module/wireguard/version".to_string(),
            temp_dir: None,
        }
    }
}

/// [`TunnelBackend`] for the kernel implementation managed with wg-quick.
pub struct WgQuickBackend {
    runner: Arc<dyn PrivilegedProcessRunner>,
    tools: Arc<dyn ToolingProbe>,
    notifier: Arc<dyn NotificationSink>,
    settings: BackendSettings,
}

impl WgQuickBackend {
    pub fn new(
        runner: Arc<dyn PrivilegedProcessRunner>,
        tools: Arc<dyn ToolingProbe>,
        notifier: Arc<dyn NotificationSink>,
        settings: BackendSettings,
    ) -> Self {
        WgQuickBackend {
            runner,
            tools,
            notifier,
            settings,
        }
    }

    fn notify(&self, tunnel: &str, state: TunnelState) {
        let result = match state {
            TunnelState::Up => self.notifier.post_ongoing(tunnel),
            _ => self.notifier.cancel(tunnel),
        };
        if let Err(e) = result {
            warn!(tunnel = %tunnel, "Notification update failed: {}", e);
        }
    }

    fn temp_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("tunnelctl-");
        match &self.settings.temp_dir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
    }

    fn command_for(&self, state: TunnelState, path: &Path) -> String {
        match state {
            TunnelState::Up => format!(
                "cat {} && {} up '{}'",
                self.settings.module_version_file,
                self.settings.wg_quick,
                path.display()
            ),
            _ => format!("{} down '{}'", self.settings.wg_quick, path.display()),
        }
    }

    /// Write `config` to a private temporary file and run wg-quick on it.
    fn set_state_internal(
        &self,
        tunnel: &Tunnel,
        config: &ConfigSnapshot,
        state: TunnelState,
    ) -> TunnelResult<()> {
        let name = tunnel.name();
        info!(tunnel = %name, state = %state, "Bringing tunnel {}", state);

        let dir = self.temp_dir()?;
        let path = dir.path().join(format!("{name}.conf"));
        write_private(&path, config.to_wg_quick_string().as_bytes())?;

        let command = self.command_for(state, &path);
        let exit_code = self.runner.run(None, &command)?;
        drop(dir);

        if exit_code != 0 {
            error!(tunnel = %name, state = %state, exit_code, "wg-quick failed");
            return Err(TunnelError::Apply {
                name: name.to_string(),
                state,
                exit_code,
            });
        }
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

impl TunnelBackend for WgQuickBackend {
    fn enumerate(&self) -> BTreeSet<String> {
        if let Err(e) = self.tools.ensure_tools_available() {
            warn!("Unable to enumerate tunnels: {}", e);
            return BTreeSet::new();
        }

        let mut output = Vec::new();
        let command = format!("{} show interfaces", self.settings.wg);
        match self.runner.run(Some(&mut output), &command) {
            Ok(0) => {}
            Ok(code) => {
                warn!("Unable to enumerate tunnels: exit code {}", code);
                return BTreeSet::new();
            }
            Err(e) => {
                warn!("Unable to enumerate tunnels: {}", e);
                return BTreeSet::new();
            }
        }

        output
            .first()
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn get_state(&self, tunnel: &Tunnel) -> TunnelState {
        TunnelState::of(self.enumerate().contains(tunnel.name()))
    }

    fn set_state(&self, tunnel: &Tunnel, state: TunnelState) -> TunnelResult<TunnelState> {
        let name = tunnel.name();
        let current = self.get_state(tunnel);
        let target = state.resolve(current);
        if target == current {
            debug!(tunnel = %name, state = %current, "Tunnel already in requested state");
            return Ok(current);
        }

        self.tools.ensure_tools_available()?;
        let config = tunnel
            .config()
            .ok_or_else(|| TunnelError::MissingConfig(name.to_string()))?;
        self.notify(name, target);

        let applied = self.set_state_internal(tunnel, &config, target);

        let observed = self.get_state(tunnel);
        if observed == TunnelState::Down {
            self.notify(name, TunnelState::Down);
        }
        applied?;
        Ok(observed)
    }

    fn apply_config(&self, tunnel: &Tunnel, config: ConfigSnapshot) -> TunnelResult<ConfigSnapshot> {
        if self.get_state(tunnel) != TunnelState::Up {
            return Ok(config);
        }

        let name = tunnel.name();
        let previous = tunnel
            .config()
            .ok_or_else(|| TunnelError::MissingConfig(name.to_string()))?;

        // A failed down leaves the old configuration running; nothing to roll back.
        self.set_state_internal(tunnel, &previous, TunnelState::Down)?;
        if let Err(primary) = self.set_state_internal(tunnel, &config, TunnelState::Up) {
            warn!(tunnel = %name, "Applying configuration failed: {}", primary);
            return match self.set_state_internal(tunnel, &previous, TunnelState::Up) {
                Ok(()) => {
                    info!(tunnel = %name, "Configuration rolled back");
                    Err(primary)
                }
                Err(secondary) => {
                    error!(tunnel = %name, "Rollback failed: {}", secondary);
                    Err(TunnelError::RollbackFailed {
                        name: name.to_string(),
                        primary: Box::new(primary),
                        secondary: Box::new(secondary),
                    })
                }
            };
        }
        Ok(config)
    }

    fn get_statistics(&self, tunnel: &Tunnel) -> TunnelStatistics {
        let mut statistics = TunnelStatistics::default();
        let mut output = Vec::new();
        let command = format!("{} show '{}' transfer", self.settings.wg, tunnel.name());
        match self.runner.run(Some(&mut output), &command) {
            Ok(0) => {}
            Ok(code) => {
                debug!(tunnel = %tunnel.name(), "Reading statistics failed: exit code {}", code);
                return statistics;
            }
            Err(e) => {
                debug!(tunnel = %tunnel.name(), "Reading statistics failed: {}", e);
                return statistics;
            }
        }

        // Each line is `<peer public key>\t<rx bytes>\t<tx bytes>`.
        for line in &output {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if let [_, rx, tx] = fields.as_slice() {
                match (rx.parse::<u64>(), tx.parse::<u64>()) {
                    (Ok(rx), Ok(tx)) => statistics.record_peer(rx, tx),
                    _ => return TunnelStatistics::default(),
                }
            }
        }
        statistics
    }

    fn version(&self) -> TunnelResult<String> {
        let mut output = Vec::new();
        let command = format!("cat {}", self.settings.module_version_file);
        let exit_code = self.runner.run(Some(&mut output), &command)?;
        match output.first().map(|line| line.trim()) {
            Some(version) if exit_code == 0 && !version.is_empty() => Ok(version.to_string()),
            _ => Err(TunnelError::Version),
        }
    }

    fn type_name(&self) -> &'static str {
        "Kernel module"
    }
}
