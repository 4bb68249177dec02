//! Event definitions for the application event loop.
//!
//! Everything that changes `App` state arrives on one channel as an `Event`:
//! terminal input, finished command runs and shutdown signals.

use crossterm::event::KeyEvent;

use crate::app::Tab;
use crate::runner::RunOutput;

/// Represents an event in the application's main event loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// A command started from `tab` has finished (or failed to start).
    RunFinished { tab: Tab, output: RunOutput },
    /// A keyboard event received from the user.
    Key(KeyEvent),
    /// The terminal window was resized.
    Resize,
    /// Ctrl-C or SIGTERM was received.
    Shutdown,
}
