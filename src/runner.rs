//! Shell command execution.
//!
//! `run_captured` runs one command line through the shell and waits for both
//! output streams. `CommandRunner` does the same on a spawned task and posts the
//! result back to the main loop as a single `Event::RunFinished`.

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::app::Tab;
use crate::events::Event;

/// The shell every command line is handed to, e.g. `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    program: String,
    args: Vec<String>,
}

impl Shell {
    /// `sh -c` on Unix, `cmd /C` on Windows.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Self {
                program: "cmd".to_string(),
                args: vec!["/C".to_string()],
            }
        } else {
            Self {
                program: "sh".to_string(),
                args: vec!["-c".to_string()],
            }
        }
    }

    /// Parses a shell prefix such as `"bash -lc"`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts =
            shell_words::split(spec).with_context(|| format!("failed to parse shell {:?}", spec))?;
        if parts.is_empty() {
            bail!("shell must not be empty");
        }
        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
        })
    }

    /// Human-readable form, for status output.
    pub fn describe(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        shell_words::join(parts)
    }

    fn command(&self, line: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        // cmd.exe does its own parsing; hand it the line untouched.
        #[cfg(windows)]
        {
            command.raw_arg(line);
        }
        #[cfg(not(windows))]
        {
            command.arg(line);
        }
        command
    }
}

/// Everything a finished command printed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    /// Output for a command that never produced any, only a failure message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
        }
    }
}

/// Runs `line` in `working_dir` and waits for it to exit.
///
/// Spawn and wait failures come back as `stderr` text.
pub async fn run_captured(shell: &Shell, line: &str, working_dir: &str) -> RunOutput {
    let mut command = shell.command(line);
    command
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    match command.output().await {
        Ok(output) => RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Err(err) => {
            tracing::warn!(command = line, cwd = working_dir, error = %err, "failed to run command");
            RunOutput::failed(err.to_string())
        }
    }
}

/// Runs commands off the main loop and reports back through the event channel.
///
/// There is no mutual exclusion here; callers keep one run per tab in flight.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    shell: Shell,
    event_tx: mpsc::Sender<Event>,
}

impl CommandRunner {
    pub fn new(shell: Shell, event_tx: mpsc::Sender<Event>) -> Self {
        Self { shell, event_tx }
    }

    /// Starts `line` in `working_dir`. Exactly one `Event::RunFinished` follows.
    pub fn spawn(&self, tab: Tab, line: String, working_dir: String) {
        let shell = self.shell.clone();
        let tx = self.event_tx.clone();
        tracing::info!(?tab, command = %line, cwd = %working_dir, "starting command");
        tokio::spawn(async move {
            let output = run_captured(&shell, &line, &working_dir).await;
            tracing::info!(
                ?tab,
                stdout_bytes = output.stdout.len(),
                stderr_bytes = output.stderr.len(),
                "command finished"
            );
            let _ = tx.send(Event::RunFinished { tab, output }).await;
        });
    }
}
