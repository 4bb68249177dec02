//! Output transcript for each tab.
//!
//! A run clears the tab's `OutputBuffer`, writes a short header, and appends the
//! captured streams once the command finishes. Text is sanitized for display.

use std::collections::VecDeque;

use strip_ansi_escapes::strip;

use crate::runner::RunOutput;

/// A fixed-capacity buffer of display lines.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    max_lines: usize,
    lines: VecDeque<String>,
}

impl OutputBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines: max_lines.max(1),
            lines: VecDeque::with_capacity(max_lines.min(1024)),
        }
    }

    /// Appends `text`, one entry per line. Returns how many old lines were dropped.
    ///
    /// A single trailing newline terminates the last line rather than opening a new one.
    pub fn push_text(&mut self, text: &str) -> usize {
        let text = text.strip_suffix('\n').unwrap_or(text);
        let mut dropped = 0;
        for line in text.split('\n') {
            self.lines.push_back(line.trim_end_matches('\r').to_string());
            while self.lines.len() > self.max_lines {
                self.lines.pop_front();
                dropped += 1;
            }
        }
        dropped
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// All lines joined back together, for the clipboard.
    pub fn text(&self) -> String {
        self.iter().collect::<Vec<_>>().join("\n")
    }
}

/// Header written before a free-text command runs.
pub fn command_header(command: &str, working_dir: &str) -> String {
    format!("Running command: {}\nWorking directory: {}\n\n", command, working_dir)
}

/// Header written before the packaging command runs.
pub fn package_header() -> String {
    "Running packaging command...\n\n".to_string()
}

/// `Output:` and `Errors:` sections for the non-empty streams.
pub fn format_run_output(output: &RunOutput) -> String {
    let mut text = String::new();
    if !output.stdout.is_empty() {
        text.push_str("Output:\n");
        text.push_str(&output.stdout);
        text.push('\n');
    }
    if !output.stderr.is_empty() {
        text.push_str("Errors:\n");
        text.push_str(&output.stderr);
        text.push('\n');
    }
    text
}

/// Strips ANSI escape codes. Invalid UTF-8 sequences are replaced.
pub fn sanitize_text(text: &str) -> String {
    let stripped = strip(text.as_bytes());
    String::from_utf8_lossy(&stripped).to_string()
}
