//! Command-line interface for tunnelctl.
//!
//! Each invocation loads the tunnel registry from the configured store,
//! performs one command and prints the result as a table or as JSON.

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tunnel_core::conf::{ConfigParseError, ConfigSnapshot, EditableConfig};
use tunnel_core::config::{ConfigError, Settings};
use tunnel_core::tunnel::{
    BatchOutcome, FileConfigStore, JsonStateStore, LogNotificationSink, PathToolingProbe, RootShell,
    Tunnel, TunnelError, TunnelManager, TunnelState, TunnelStatistics, WgQuickBackend,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevelArg {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevelArg {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevelArg::Trace => "trace",
            LogLevelArg::Debug => "debug",
            LogLevelArg::Info => "info",
            LogLevelArg::Warn => "warn",
            LogLevelArg::Error => "error",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Control wg-quick managed tunnels
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = "Examples:\n  tunnelctl list\n  tunnelctl import ./wg0.conf\n  tunnelctl up wg0\n  tunnelctl --output json show wg0")]
pub struct Cli {
    /// Path to the settings file
    #[arg(short, long, value_name = "FILE", env = "TUNNELCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level, overriding the settings file
    #[arg(short, long, value_enum, env = "TUNNELCTL_LOG_LEVEL")]
    pub log_level: Option<LogLevelArg>,

    /// Output format for command results (table|json)
    #[arg(long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List known tunnels and their state
    List,
    /// Show a tunnel's configuration, state and transfer counters
    Show { name: String },
    /// Bring a tunnel up
    Up { name: String },
    /// Take a tunnel down
    Down { name: String },
    /// Bring a tunnel up if it is down, down otherwise
    Toggle { name: String },
    /// Add a tunnel from a wg-quick configuration file
    Import {
        file: PathBuf,
        /// Tunnel name (default: the file name without extension)
        #[arg(long)]
        name: Option<String>,
    },
    /// Replace a tunnel's configuration, rolling back if the new one fails
    Apply {
        name: String,
        /// wg-quick file, or the JSON editable form with --editable
        file: PathBuf,
        /// Read FILE as JSON, like the `config` object of `show --output json`
        #[arg(long)]
        editable: bool,
    },
    /// Rename a tunnel
    Rename { name: String, new_name: String },
    /// Delete one or more tunnels
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Bring back the tunnels that were running when state was last saved
    Restore {
        /// Restore even when restore_on_boot is disabled
        #[arg(long)]
        force: bool,
    },
    /// Re-read every tunnel's state from the host
    Refresh,
    /// Show the backend name and version
    Version,
}

/// Error type for CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error("Invalid tunnel configuration: {0}")]
    Parse(#[from] ConfigParseError),

    #[error("Unknown tunnel: {0}")]
    UnknownTunnel(String),

    #[error("Cannot derive a tunnel name from {0}")]
    NoName(PathBuf),

    #[error("Unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{failed} of {total} operations failed")]
    Batch { failed: usize, total: usize },
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Settings::default_path)
    }

    /// Load settings, falling back to defaults when the file is absent, and
    /// apply the command-line log level.
    pub fn load_settings(&self) -> CliResult<Settings> {
        let path = self.config_path();
        debug!("Loading settings from {:?}", path);
        let mut settings = Settings::load_or_default(&path)?;
        if let Some(level) = self.log_level {
            settings.log_level = level.as_str().to_string();
        }
        Ok(settings)
    }
}

/// Wire the host implementations together.
pub fn build_manager(settings: &Settings) -> TunnelManager {
    let runner = Arc::new(RootShell::new(settings.tools.privilege_command.clone()));
    let tools = Arc::new(PathToolingProbe::new([
        settings.tools.wg.clone(),
        settings.tools.wg_quick.clone(),
    ]));
    let backend = Arc::new(WgQuickBackend::new(
        runner,
        tools,
        Arc::new(LogNotificationSink),
        settings.backend_settings(),
    ));
    let configs = Arc::new(FileConfigStore::new(
        settings.storage.config_dir.clone(),
        settings.global_exclusions(),
    ));
    let state = Arc::new(JsonStateStore::new(settings.storage.state_file.clone()));
    TunnelManager::new(backend, configs, state, settings.manager_settings())
}

#[derive(Serialize)]
struct TunnelRow {
    name: String,
    state: TunnelState,
    last_used: bool,
}

#[derive(Serialize)]
struct TunnelDetail {
    name: String,
    state: TunnelState,
    statistics: TunnelStatistics,
    config: EditableConfig,
}

#[derive(Serialize)]
struct Outcome {
    name: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct Message<'a> {
    status: &'a str,
    detail: &'a str,
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_msg(output: OutputFormat, status: &str, detail: &str) -> CliResult<()> {
    match output {
        OutputFormat::Table => {
            println!("{status}: {detail}");
            Ok(())
        }
        OutputFormat::Json => print_json(&Message { status, detail }),
    }
}

fn print_tunnels(output: OutputFormat, manager: &TunnelManager) -> CliResult<()> {
    let last_used = manager.last_used_tunnel();
    let rows: Vec<TunnelRow> = manager
        .tunnels()
        .iter()
        .map(|tunnel| TunnelRow {
            name: tunnel.name().to_string(),
            state: tunnel.state(),
            last_used: last_used
                .as_ref()
                .is_some_and(|used| Arc::ptr_eq(used, tunnel)),
        })
        .collect();

    match output {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("No tunnels");
            }
            for row in rows {
                let marker = if row.last_used { "*" } else { "" };
                println!("{:<16} {:<5} {}", row.name, row.state.to_string(), marker);
            }
            Ok(())
        }
    }
}

fn print_outcomes<T>(output: OutputFormat, outcomes: Vec<BatchOutcome<T>>) -> CliResult<()> {
    let total = outcomes.len();
    let rows: Vec<Outcome> = outcomes
        .into_iter()
        .map(|outcome| Outcome {
            name: outcome.name,
            ok: outcome.result.is_ok(),
            error: outcome.result.err().map(|e| e.to_string()),
        })
        .collect();
    let failed = rows.iter().filter(|row| !row.ok).count();

    match output {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => {
            for row in &rows {
                match &row.error {
                    None => println!("{}: ok", row.name),
                    Some(e) => println!("{}: {}", row.name, e),
                }
            }
        }
    }

    if failed > 0 {
        return Err(CliError::Batch { failed, total });
    }
    Ok(())
}

fn find(manager: &TunnelManager, name: &str) -> CliResult<Arc<Tunnel>> {
    manager
        .get(name)
        .ok_or_else(|| CliError::UnknownTunnel(name.to_string()))
}

fn read_file(path: &Path) -> CliResult<String> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Default tunnel name for an imported file.
fn name_from_path(path: &Path) -> CliResult<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| CliError::NoName(path.to_path_buf()))
}

fn read_config(path: &Path, editable: bool, settings: &Settings) -> CliResult<ConfigSnapshot> {
    let text = read_file(path)?;
    let exclusions = settings.global_exclusions();
    let config = if editable {
        let form: EditableConfig = serde_json::from_str(&text)?;
        form.commit(&exclusions)?
    } else {
        ConfigSnapshot::parse_with_exclusions(&text, &exclusions)?
    };
    Ok(config)
}

async fn change_state(
    output: OutputFormat,
    manager: &TunnelManager,
    name: &str,
    state: TunnelState,
) -> CliResult<()> {
    let tunnel = find(manager, name)?;
    let observed = manager.set_tunnel_state(&tunnel, state).await?;
    print_msg(output, "ok", &format!("{name} is {observed}"))
}

/// Run one command against a freshly loaded registry.
pub async fn run(cli: Cli, settings: Settings) -> CliResult<()> {
    let output = cli.output;
    let manager = build_manager(&settings);
    manager.load().await?;

    match cli.command {
        Command::List => print_tunnels(output, &manager)?,
        Command::Show { name } => {
            let tunnel = find(&manager, &name)?;
            let config = manager.get_tunnel_config(&tunnel).await?;
            let state = manager.get_tunnel_state(&tunnel).await?;
            let statistics = manager.get_tunnel_statistics(&tunnel).await?;
            match output {
                OutputFormat::Json => print_json(&TunnelDetail {
                    name,
                    state,
                    statistics,
                    config: config.to_editable(),
                })?,
                OutputFormat::Table => {
                    println!("# {name}: {state}, rx {} B, tx {} B", statistics.rx_bytes, statistics.tx_bytes);
                    print!("{config}");
                }
            }
        }
        Command::Up { name } => change_state(output, &manager, &name, TunnelState::Up).await?,
        Command::Down { name } => change_state(output, &manager, &name, TunnelState::Down).await?,
        Command::Toggle { name } => {
            change_state(output, &manager, &name, TunnelState::Toggle).await?
        }
        Command::Import { file, name } => {
            let name = match name {
                Some(name) => name,
                None => name_from_path(&file)?,
            };
            let config = read_config(&file, false, &settings)?;
            let tunnel = manager.create(&name, config).await?;
            info!(tunnel = %tunnel.name(), "Imported {}", file.display());
            print_msg(output, "ok", &format!("created {}", tunnel.name()))?;
        }
        Command::Apply {
            name,
            file,
            editable,
        } => {
            let tunnel = find(&manager, &name)?;
            let config = read_config(&file, editable, &settings)?;
            manager.set_tunnel_config(&tunnel, config).await?;
            print_msg(output, "ok", &format!("configuration of {name} updated"))?;
        }
        Command::Rename { name, new_name } => {
            let tunnel = find(&manager, &name)?;
            let renamed = manager.rename(&tunnel, &new_name).await?;
            print_msg(output, "ok", &format!("{name} renamed to {}", renamed.name()))?;
        }
        Command::Delete { names } => {
            let mut tunnels = Vec::with_capacity(names.len());
            for name in &names {
                tunnels.push(find(&manager, name)?);
            }
            print_outcomes(output, manager.bulk_delete(tunnels).await)?;
        }
        Command::Restore { force } => {
            let outcomes = manager.restore_state(force).await?;
            if outcomes.is_empty() {
                warn!("Nothing restored");
            }
            print_outcomes(output, outcomes)?;
        }
        Command::Refresh => {
            manager.refresh_tunnel_states().await?;
            print_tunnels(output, &manager)?;
        }
        Command::Version => {
            let backend = Arc::clone(manager.backend());
            let version = tokio::task::spawn_blocking(move || backend.version())
                .await
                .map_err(TunnelError::from)??;
            print_msg(
                output,
                "ok",
                &format!("{} {}", manager.backend().type_name(), version),
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn help_renders_with_examples() {
        let mut cmd = Cli::command();
        let help = cmd.render_long_help().to_string();
        assert!(help.contains("Examples:"));
    }

    #[test]
    fn parses_state_commands() {
        let cli = Cli::parse_from(["tunnelctl", "up", "wg0"]);
        assert!(matches!(cli.command, Command::Up { ref name } if name == "wg0"));
        assert_eq!(cli.output, OutputFormat::Table);

        let cli = Cli::parse_from(["tunnelctl", "--output", "json", "toggle", "home"]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Command::Toggle { ref name } if name == "home"));
    }

    #[test]
    fn parses_import_with_name() {
        let cli = Cli::parse_from(["tunnelctl", "import", "/tmp/x.conf", "--name", "office"]);
        match cli.command {
            Command::Import { file, name } => {
                assert_eq!(file, PathBuf::from("/tmp/x.conf"));
                assert_eq!(name.as_deref(), Some("office"));
            }
            other => panic!("expected import, got {other:?}"),
        }
    }

    #[test]
    fn delete_requires_a_name() {
        assert!(Cli::try_parse_from(["tunnelctl", "delete"]).is_err());
        let cli = Cli::parse_from(["tunnelctl", "delete", "a", "b"]);
        assert!(matches!(cli.command, Command::Delete { ref names } if names.len() == 2));
    }

    #[test]
    fn log_level_overrides_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let cli = Cli::parse_from([
            "tunnelctl",
            "--config",
            path.to_str().unwrap(),
            "--log-level",
            "debug",
            "list",
        ]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn import_name_defaults_to_file_stem() {
        assert_eq!(name_from_path(Path::new("/etc/wg/home.conf")).unwrap(), "home");
    }
}
