//! Scripted stand-ins for the host used by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tunnel_core::conf::ConfigSnapshot;
use tunnel_core::tunnel::{
    BackendSettings, NotificationSink, NotifyError, PrivilegedProcessRunner, RunnerError,
    ToolingProbe, TunnelError, TunnelResult, TunnelState, WgQuickBackend,
};

pub const CONFIG_A: &str = "[Interface]\nAddress = 10.0.0.1/32\nListenPort = 51820\n";
pub const CONFIG_B: &str = "[Interface]\nAddress = 10.0.0.2/32\nListenPort = 51821\n";

pub fn config_a() -> ConfigSnapshot {
    ConfigSnapshot::parse(CONFIG_A).unwrap()
}

pub fn config_b() -> ConfigSnapshot {
    ConfigSnapshot::parse(CONFIG_B).unwrap()
}

/// One wg-quick invocation seen by [`FakeHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub state: TunnelState,
    pub name: String,
    pub config: String,
    pub path: PathBuf,
    pub mode: Option<u32>,
}

type Rule = Box<dyn Fn(&Invocation) -> i32 + Send + Sync>;

/// In-memory host: tracks which interfaces are up and answers the helper
/// commands the backend issues.
pub struct FakeHost {
    running: Mutex<BTreeSet<String>>,
    commands: Mutex<Vec<String>>,
    invocations: Mutex<Vec<Invocation>>,
    rule: Mutex<Rule>,
    transfer: Mutex<Vec<String>>,
    version: Mutex<Option<String>>,
    broken: Mutex<bool>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeHost {
            running: Mutex::new(BTreeSet::new()),
            commands: Mutex::new(Vec::new()),
            invocations: Mutex::new(Vec::new()),
            rule: Mutex::new(Box::new(|_| 0)),
            transfer: Mutex::new(Vec::new()),
            version: Mutex::new(Some("1.0.20210914".to_string())),
            broken: Mutex::new(false),
        })
    }

    pub fn with_running(names: &[&str]) -> Arc<Self> {
        let host = Self::new();
        host.running
            .lock()
            .unwrap()
            .extend(names.iter().map(|name| name.to_string()));
        host
    }

    /// Exit code for each wg-quick invocation; non-zero leaves the host unchanged.
    pub fn set_rule<F>(&self, rule: F)
    where
        F: Fn(&Invocation) -> i32 + Send + Sync + 'static,
    {
        *self.rule.lock().unwrap() = Box::new(rule);
    }

    /// Replace the set of running interfaces, as if changed outside the manager.
    pub fn set_running(&self, names: &[&str]) {
        *self.running.lock().unwrap() = names.iter().map(|name| name.to_string()).collect();
    }

    /// Every command fails to execute.
    pub fn break_runner(&self) {
        *self.broken.lock().unwrap() = true;
    }

    pub fn set_transfer(&self, lines: &[&str]) {
        *self.transfer.lock().unwrap() = lines.iter().map(|line| line.to_string()).collect();
    }

    pub fn set_version(&self, version: Option<&str>) {
        *self.version.lock().unwrap() = version.map(str::to_string);
    }

    pub fn running(&self) -> BTreeSet<String> {
        self.running.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn wg_quick_calls(&self) -> usize {
        self.commands()
            .iter()
            .filter(|command| command.contains("wg-quick"))
            .count()
    }

    fn wg_quick(&self, state: TunnelState, command: &str) -> i32 {
        let Some(path) = command.rsplit('\'').nth(1).map(PathBuf::from) else {
            return 2;
        };
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        let config = fs::read_to_string(&path).unwrap_or_default();
        let invocation = Invocation {
            state,
            name: name.clone(),
            config,
            mode: file_mode(&path),
            path,
        };

        let exit_code = {
            let rule = self.rule.lock().unwrap();
            (*rule)(&invocation)
        };
        self.invocations.lock().unwrap().push(invocation);
        if exit_code == 0 {
            let mut running = self.running.lock().unwrap();
            match state {
                TunnelState::Up => running.insert(name),
                _ => running.remove(&name),
            };
        }
        exit_code
    }
}

#[cfg(unix)]
fn file_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).ok().map(|meta| meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> Option<u32> {
    None
}

impl PrivilegedProcessRunner for FakeHost {
    fn run(&self, output: Option<&mut Vec<String>>, command: &str) -> Result<i32, RunnerError> {
        self.commands.lock().unwrap().push(command.to_string());
        if *self.broken.lock().unwrap() {
            return Err(RunnerError::Spawn {
                command: command.to_string(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "no root"),
            });
        }

        let mut lines = Vec::new();
        let exit_code = if command == "wg show interfaces" {
            let running: Vec<String> = self.running().into_iter().collect();
            lines.push(running.join(" "));
            0
        } else if command.ends_with(" transfer") {
            lines.extend(self.transfer.lock().unwrap().iter().cloned());
            0
        } else if command.contains("wg-quick up ") {
            // `cat <version file> && wg-quick up ...`
            if self.version.lock().unwrap().is_none() {
                1
            } else {
                self.wg_quick(TunnelState::Up, command)
            }
        } else if command.contains("wg-quick down ") {
            self.wg_quick(TunnelState::Down, command)
        } else if command.starts_with("cat ") {
            match self.version.lock().unwrap().clone() {
                Some(version) => {
                    lines.push(version);
                    0
                }
                None => 1,
            }
        } else {
            127
        };

        if let Some(output) = output {
            output.extend(lines);
        }
        Ok(exit_code)
    }
}

/// Probe with a fixed answer.
pub struct StaticProbe(pub bool);

impl ToolingProbe for StaticProbe {
    fn ensure_tools_available(&self) -> TunnelResult<()> {
        if self.0 {
            Ok(())
        } else {
            Err(TunnelError::ToolingUnavailable("wg-quick: not found".to_string()))
        }
    }
}

/// Records every notification call.
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn post_ongoing(&self, tunnel: &str) -> Result<(), NotifyError> {
        self.calls.lock().unwrap().push(format!("post {tunnel}"));
        Ok(())
    }

    fn cancel(&self, tunnel: &str) -> Result<(), NotifyError> {
        self.calls.lock().unwrap().push(format!("cancel {tunnel}"));
        Err(NotifyError::NotShown(tunnel.to_string()))
    }
}

pub struct Harness {
    pub host: Arc<FakeHost>,
    pub notifier: Arc<RecordingNotifier>,
    pub backend: Arc<WgQuickBackend>,
}

pub fn harness(host: Arc<FakeHost>, tools_available: bool) -> Harness {
    let notifier = Arc::new(RecordingNotifier::default());
    let backend = Arc::new(WgQuickBackend::new(
        host.clone(),
        Arc::new(StaticProbe(tools_available)),
        notifier.clone(),
        BackendSettings::default(),
    ));
    Harness {
        host,
        notifier,
        backend,
    }
}
