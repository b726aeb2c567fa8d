//! Command runner - spawns step commands as child processes

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Error types for command execution
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn '{shell}': {message}")]
    Spawn { shell: String, message: String },

    #[error("timed out after {0} seconds")]
    Timeout(u64),
}

/// A single command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Rendered shell command
    pub command: String,

    /// Directory to run in
    pub workdir: PathBuf,

    /// Environment added on top of the runner's own
    pub env: BTreeMap<String, String>,

    /// Kill the child if it runs longer than this
    pub timeout: Option<Duration>,
}

/// Captured result of a finished child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (None when terminated by a signal)
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => {
                let mut combined = self.stdout.clone();
                if !combined.ends_with('\n') {
                    combined.push('\n');
                }
                combined.push_str(&self.stderr);
                combined
            }
        }
    }
}

/// Trait for running step commands - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError>;
}

/// Runs commands through a shell (`sh -c <command>` by default)
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    shell_args: Vec<String>,
}

impl ShellRunner {
    /// Create a runner for the given shell.
    ///
    /// `cmd` gets `/C`, PowerShell gets `-Command`, anything else `-c`.
    pub fn new(shell: impl Into<String>) -> Self {
        let shell = shell.into();
        let program = shell
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&shell)
            .to_ascii_lowercase();
        let flag = match program.trim_end_matches(".exe") {
            "cmd" => "/C",
            "powershell" | "pwsh" => "-Command",
            _ => "-c",
        };

        Self {
            shell,
            shell_args: vec![flag.to_string()],
        }
    }

    /// Get the shell executable
    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn shell_args(&self) -> &[String] {
        &self.shell_args
    }

    fn build_command(&self, invocation: &Invocation) -> Command {
        let mut command = Command::new(&self.shell);
        command
            .args(&self.shell_args)
            .arg(&invocation.command)
            .current_dir(&invocation.workdir)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(crate::core::default_shell())
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError> {
        debug!(
            "Spawning {} in {}: {}",
            self.shell,
            invocation.workdir.display(),
            invocation.command
        );

        let child = self.build_command(invocation).output();

        // Dropping the pending future on timeout kills the child
        let output = match invocation.timeout {
            Some(limit) => timeout(limit, child)
                .await
                .map_err(|_| RunnerError::Timeout(limit.as_secs()))?,
            None => child.await,
        }
        .map_err(|e| RunnerError::Spawn {
            shell: self.shell.clone(),
            message: e.to_string(),
        })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            warn!(
                "Command exited with {:?}: {}",
                result.exit_code,
                result.stderr.trim()
            );
        }

        debug!(
            "Command returned {} bytes of stdout, {} bytes of stderr",
            result.stdout.len(),
            result.stderr.len()
        );

        Ok(result)
    }
}
