//! Checks a run request before anything is handed to the runner.

use thiserror::Error;

use crate::package::{build_package_command, CommandPreview, PackagingParameters};

/// Why a run was refused. The message is shown to the user as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RunRefusal {
    #[error("Please select a working directory first")]
    NoDirectory,
    #[error("Please enter a command")]
    EmptyCommand,
    #[error("Please select a project file")]
    NoProject,
    #[error("A command is already running")]
    Busy,
}

/// Validates the free-text command tab. Returns the command to run.
pub fn prepare_command(working_dir: Option<&str>, text: &str) -> Result<String, RunRefusal> {
    if working_dir.map_or(true, str::is_empty) {
        return Err(RunRefusal::NoDirectory);
    }
    let command = text.trim();
    if command.is_empty() {
        return Err(RunRefusal::EmptyCommand);
    }
    Ok(command.to_string())
}

/// Validates the packaging tab. Returns the generated command line.
pub fn prepare_package(
    working_dir: Option<&str>,
    params: &PackagingParameters,
) -> Result<String, RunRefusal> {
    match build_package_command(working_dir.unwrap_or(""), params) {
        CommandPreview::Ready(line) => Ok(line),
        CommandPreview::NeedsDirectory => Err(RunRefusal::NoDirectory),
        CommandPreview::NeedsProject => Err(RunRefusal::NoProject),
    }
}
