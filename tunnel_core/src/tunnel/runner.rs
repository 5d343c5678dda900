//! Privileged shell command execution.

use std::io;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, error};

/// A command could not be executed at all. A non-zero exit is not an error here.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Runs shell commands with elevated privileges.
///
/// Calls block until the command exits. The returned value is the exit code;
/// when `output` is given, each line of standard output is appended to it.
pub trait PrivilegedProcessRunner: Send + Sync {
    fn run(&self, output: Option<&mut Vec<String>>, command: &str) -> Result<i32, RunnerError>;
}

/// Host shell, optionally prefixed with a privilege escalation command such as `sudo -n`.
#[derive(Debug, Clone, Default)]
pub struct RootShell {
    privilege_command: Vec<String>,
}

impl RootShell {
    pub fn new(privilege_command: Vec<String>) -> Self {
        RootShell { privilege_command }
    }

    fn command(&self, script: &str) -> Command {
        let mut command = match self.privilege_command.split_first() {
            Some((program, args)) => {
                let mut command = Command::new(program);
                command.args(args).arg("sh");
                command
            }
            None => Command::new("sh"),
        };
        command
            .arg("-c")
            .arg(script)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl PrivilegedProcessRunner for RootShell {
    fn run(&self, output: Option<&mut Vec<String>>, command: &str) -> Result<i32, RunnerError> {
        debug!("Running command: {}", command);

        let result = self.command(command).output().map_err(|source| {
            error!("Failed to execute command {}: {}", command, source);
            RunnerError::Spawn {
                command: command.to_string(),
                source,
            }
        })?;

        let stderr = String::from_utf8_lossy(&result.stderr);
        if !stderr.trim().is_empty() {
            debug!("Command stderr: {}", stderr.trim());
        }
        if let Some(output) = output {
            let stdout = String::from_utf8_lossy(&result.stdout);
            output.extend(stdout.lines().map(str::to_string));
        }

        // Killed by a signal: report as a generic failure.
        let exit_code = result.status.code().unwrap_or(-1);
        debug!("Command exited with {}", exit_code);
        Ok(exit_code)
    }
}
