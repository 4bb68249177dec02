//! Application state and UI logic.
//!
//! `App` owns the profile store, the selected working directory, both tabs'
//! input and output, and the status line. Key events are translated into state
//! changes here; anything that leaves the main loop (running a command, touching
//! the clipboard) is returned to the caller as an `AppAction`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::command::{prepare_command, prepare_package, RunRefusal};
use crate::output::{command_header, format_run_output, package_header, OutputBuffer};
use crate::package::{
    build_package_command, CommandPreview, PackagingParameters, Param, ParamKind, SettingValue,
};
use crate::profile::{resolve_directory, ProfileStore};
use crate::runner::RunOutput;

/// The two forms of the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    /// Free-text shell command.
    Command,
    /// Generated packaging command.
    Package,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Command, Tab::Package];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Command => "Cmd",
            Tab::Package => "Package",
        }
    }

    fn next(self) -> Tab {
        match self {
            Tab::Command => Tab::Package,
            Tab::Package => Tab::Command,
        }
    }
}

/// Modes of user input interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Standard navigation mode.
    Normal,
    /// Typing the free-text command.
    EditCommand,
    /// Typing a packaging parameter value.
    EditParam,
    /// Choosing one of the saved directories.
    PickDirectory,
    /// Typing the path of a new working directory.
    AddDirectory,
}

/// Actions resulting from user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// No action required.
    None,
    /// Exit the application.
    Quit,
    /// Start `command` in `working_dir`; the result comes back for `tab`.
    Run {
        tab: Tab,
        command: String,
        working_dir: String,
    },
    /// Put text on the clipboard.
    Copy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone)]
struct StatusMessage {
    text: String,
    at: Instant,
    ttl: Option<Duration>,
    level: StatusLevel,
}

/// Output pane state of one tab.
#[derive(Debug)]
pub struct TabOutput {
    pub buffer: OutputBuffer,
    /// A run from this tab is in flight; its run control is disabled.
    pub running: bool,
    pub started_at: Option<Instant>,
    pub scroll: usize,
    pub follow: bool,
}

impl TabOutput {
    fn new(max_lines: usize) -> Self {
        Self {
            buffer: OutputBuffer::new(max_lines),
            running: false,
            started_at: None,
            scroll: 0,
            follow: true,
        }
    }
}

/// The main application state container.
#[derive(Debug)]
pub struct App {
    /// Saved per-directory profiles.
    pub store: ProfileStore,
    profiles_path: PathBuf,
    /// Directory commands run in, once one is chosen.
    pub working_dir: Option<String>,
    /// Active tab.
    pub tab: Tab,
    /// Current input mode.
    pub input_mode: InputMode,
    /// Text of the free-text command.
    pub command_input: String,
    history_index: Option<usize>,
    /// Values of the packaging form.
    pub params: PackagingParameters,
    /// Packaging command built from `params`, refreshed on every change.
    pub preview: CommandPreview,
    /// Row selected in the packaging form.
    pub param_selected: usize,
    /// Buffer for parameter and directory input.
    pub edit_buffer: String,
    /// Row selected in the directory picker.
    pub dir_selected: usize,
    command_output: TabOutput,
    package_output: TabOutput,
    /// Height of the output area (for scrolling calculations).
    pub output_view_height: usize,
    /// Whether to use Unicode symbols.
    pub use_symbols: bool,
    /// Whether to show the help overlay.
    pub show_help: bool,
    /// Flag indicating if the application should exit.
    pub should_quit: bool,
    /// Window title last sent to the terminal.
    pub terminal_title: Option<String>,
    status_message: Option<StatusMessage>,
}

impl App {
    /// Creates a new `App` around an already loaded store.
    pub fn new(store: ProfileStore, profiles_path: PathBuf, max_lines: usize, use_symbols: bool) -> Self {
        let params = PackagingParameters::default();
        let preview = build_package_command("", &params);
        Self {
            store,
            profiles_path,
            working_dir: None,
            tab: Tab::Command,
            input_mode: InputMode::Normal,
            command_input: String::new(),
            history_index: None,
            params,
            preview,
            param_selected: 0,
            edit_buffer: String::new(),
            dir_selected: 0,
            command_output: TabOutput::new(max_lines),
            package_output: TabOutput::new(max_lines),
            output_view_height: 0,
            use_symbols,
            show_help: false,
            should_quit: false,
            terminal_title: None,
            status_message: None,
        }
    }

    pub fn output(&self, tab: Tab) -> &TabOutput {
        match tab {
            Tab::Command => &self.command_output,
            Tab::Package => &self.package_output,
        }
    }

    fn output_mut(&mut self, tab: Tab) -> &mut TabOutput {
        match tab {
            Tab::Command => &mut self.command_output,
            Tab::Package => &mut self.package_output,
        }
    }

    pub fn is_running(&self, tab: Tab) -> bool {
        self.output(tab).running
    }

    pub fn directories(&self) -> Vec<&str> {
        self.store.directories().collect()
    }

    /// Recent commands of the working directory, newest first.
    pub fn history(&self) -> &[String] {
        match &self.working_dir {
            Some(dir) => self.store.commands(dir),
            None => &[],
        }
    }

    pub fn history_index(&self) -> Option<usize> {
        self.history_index
    }

    pub fn selected_param(&self) -> Param {
        Param::ALL[self.param_selected.min(Param::ALL.len() - 1)]
    }

    /// Switches to a directory typed by the user, registering it if it is new.
    pub fn browse_directory(&mut self, path: &str) -> bool {
        let typed = path.trim();
        if typed.is_empty() {
            return false;
        }
        if !self.can_change_directory() {
            return false;
        }
        let dir = match resolve_directory(typed) {
            Ok(dir) => dir,
            Err(_) => {
                self.set_status_warning(format!("Not a directory: {}", typed));
                return false;
            }
        };
        let registered = self.store.ensure_directory(&dir);
        if registered {
            tracing::info!(dir = %dir, "registered working directory");
        }
        self.set_working_dir(dir);
        if registered {
            self.persist();
        }
        true
    }

    /// Switches to a directory that already has a profile.
    pub fn select_directory(&mut self, dir: &str) -> bool {
        if !self.store.contains(dir) || !self.can_change_directory() {
            return false;
        }
        self.set_working_dir(dir.to_string());
        true
    }

    fn can_change_directory(&mut self) -> bool {
        if self.command_output.running {
            self.set_status_warning("Wait for the running command to finish");
            return false;
        }
        true
    }

    fn set_working_dir(&mut self, dir: String) {
        if let Some(settings) = self.store.package_settings(&dir) {
            self.params.apply_settings(settings);
        }
        self.set_status_message(format!("Working directory: {}", dir));
        self.working_dir = Some(dir);
        self.history_index = None;
        self.refresh_preview();
    }

    pub fn refresh_preview(&mut self) {
        self.preview = build_package_command(self.working_dir.as_deref().unwrap_or(""), &self.params);
    }

    /// Rebuilds the preview, then saves the form for the working directory.
    pub fn on_param_changed(&mut self) {
        self.refresh_preview();
        let Some(dir) = self.working_dir.clone() else {
            return;
        };
        if self.store.record_package_settings(&dir, &self.params) {
            self.persist();
        }
    }

    /// Writes the store to disk. Failures are logged and shown, never fatal.
    fn persist(&mut self) {
        if let Err(err) = self.store.save(&self.profiles_path) {
            tracing::warn!(error = %format!("{:#}", err), "failed to save profiles");
            self.set_status_warning(format!("Could not save profiles: {:#}", err));
        }
    }

    /// Validates the active tab and, if it can run, returns the run to start.
    pub fn request_run(&mut self) -> AppAction {
        match self.tab {
            Tab::Command => self.request_command_run(),
            Tab::Package => self.request_package_run(),
        }
    }

    fn request_command_run(&mut self) -> AppAction {
        if self.command_output.running {
            self.set_status_warning(RunRefusal::Busy.to_string());
            return AppAction::None;
        }
        let command = match prepare_command(self.working_dir.as_deref(), &self.command_input) {
            Ok(command) => command,
            Err(refusal) => {
                self.set_status_warning(refusal.to_string());
                return AppAction::None;
            }
        };
        let working_dir = self.working_dir.clone().unwrap_or_default();
        self.store.ensure_directory(&working_dir);
        self.store.record_command(&working_dir, &command);
        self.store.record_package_settings(&working_dir, &self.params);
        self.persist();
        self.history_index = None;
        self.start_run(Tab::Command, &command_header(&command, &working_dir));
        AppAction::Run {
            tab: Tab::Command,
            command,
            working_dir,
        }
    }

    fn request_package_run(&mut self) -> AppAction {
        if self.package_output.running {
            self.set_status_warning(RunRefusal::Busy.to_string());
            return AppAction::None;
        }
        let command = match prepare_package(self.working_dir.as_deref(), &self.params) {
            Ok(command) => command,
            Err(refusal) => {
                self.set_status_warning(refusal.to_string());
                return AppAction::None;
            }
        };
        let working_dir = self.working_dir.clone().unwrap_or_default();
        self.start_run(Tab::Package, &package_header());
        AppAction::Run {
            tab: Tab::Package,
            command,
            working_dir,
        }
    }

    fn start_run(&mut self, tab: Tab, header: &str) {
        let output = self.output_mut(tab);
        output.buffer.clear();
        output.buffer.push_text(header);
        output.running = true;
        output.started_at = Some(Instant::now());
        output.follow = true;
        output.scroll = 0;
        self.set_status_message(format!("Running {}", tab.title()));
    }

    /// Appends the captured streams and re-enables the tab's run control.
    pub fn on_run_finished(&mut self, tab: Tab, output: RunOutput) {
        let text = format_run_output(&output);
        let pane = self.output_mut(tab);
        pane.running = false;
        if !text.is_empty() {
            pane.buffer.push_text(&text);
        }
        if pane.follow {
            self.ensure_follow(tab);
        }
        self.set_status_message(format!("{} finished", tab.title()));
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppAction {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return AppAction::Quit;
        }
        match self.input_mode {
            InputMode::Normal => self.handle_normal_input(key),
            InputMode::EditCommand => self.handle_command_input(key),
            InputMode::EditParam => self.handle_param_input(key),
            InputMode::PickDirectory => self.handle_picker_input(key),
            InputMode::AddDirectory => self.handle_directory_input(key),
        }
    }

    fn handle_normal_input(&mut self, key: KeyEvent) -> AppAction {
        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                self.show_help = false;
            }
            return AppAction::None;
        }
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                AppAction::Quit
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.tab = self.tab.next();
                AppAction::None
            }
            KeyCode::Char('1') => {
                self.tab = Tab::Command;
                AppAction::None
            }
            KeyCode::Char('2') => {
                self.tab = Tab::Package;
                AppAction::None
            }
            KeyCode::Char('d') => {
                self.open_directory_picker();
                AppAction::None
            }
            KeyCode::Char('o') => {
                self.input_mode = InputMode::AddDirectory;
                self.edit_buffer = self.working_dir.clone().unwrap_or_default();
                AppAction::None
            }
            KeyCode::Char('r') => self.request_run(),
            KeyCode::Char('y') => {
                let text = self.output(self.tab).buffer.text();
                AppAction::Copy(text)
            }
            KeyCode::Char('c') => match self.preview.command() {
                Some(line) => AppAction::Copy(line.to_string()),
                None => {
                    let message = self.preview.to_string();
                    self.set_status_warning(message);
                    AppAction::None
                }
            },
            KeyCode::Char('?') => {
                self.show_help = true;
                AppAction::None
            }
            KeyCode::PageUp => {
                self.scroll_up(self.output_view_height.max(1));
                AppAction::None
            }
            KeyCode::PageDown => {
                self.scroll_down(self.output_view_height.max(1));
                AppAction::None
            }
            KeyCode::Home => {
                self.scroll_to_top();
                AppAction::None
            }
            KeyCode::End => {
                let tab = self.tab;
                self.output_mut(tab).follow = true;
                self.ensure_follow(tab);
                AppAction::None
            }
            _ => match self.tab {
                Tab::Command => self.handle_command_tab_key(key),
                Tab::Package => self.handle_package_tab_key(key),
            },
        }
    }

    fn handle_command_tab_key(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Char('i') | KeyCode::Enter => {
                self.input_mode = InputMode::EditCommand;
            }
            KeyCode::Up => self.history_prev(),
            KeyCode::Down => self.history_next(),
            _ => {}
        }
        AppAction::None
    }

    fn handle_package_tab_key(&mut self, key: KeyEvent) -> AppAction {
        let param = self.selected_param();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.param_selected = self.param_selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.param_selected + 1 < Param::ALL.len() {
                    self.param_selected += 1;
                }
            }
            KeyCode::Char(' ') => match param.kind() {
                ParamKind::Flag => {
                    self.params.toggle(param);
                    self.on_param_changed();
                }
                ParamKind::Choice(_) => {
                    self.params.cycle(param, true);
                    self.on_param_changed();
                }
                ParamKind::Text => {}
            },
            KeyCode::Left | KeyCode::Right => {
                if self.params.cycle(param, key.code == KeyCode::Right) {
                    self.on_param_changed();
                }
            }
            KeyCode::Enter => match self.params.get(param) {
                SettingValue::Flag(_) => {
                    self.params.toggle(param);
                    self.on_param_changed();
                }
                SettingValue::Text(text) => {
                    self.edit_buffer = text;
                    self.input_mode = InputMode::EditParam;
                }
            },
            _ => {}
        }
        AppAction::None
    }

    fn handle_command_input(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                AppAction::None
            }
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                self.request_command_run()
            }
            KeyCode::Up => {
                self.history_prev();
                AppAction::None
            }
            KeyCode::Down => {
                self.history_next();
                AppAction::None
            }
            KeyCode::Backspace => {
                self.command_input.pop();
                self.history_index = None;
                AppAction::None
            }
            KeyCode::Char(c) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL) {
                    self.command_input.push(c);
                    self.history_index = None;
                }
                AppAction::None
            }
            _ => AppAction::None,
        }
    }

    fn handle_param_input(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.edit_buffer.clear();
            }
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                let param = self.selected_param();
                let value = std::mem::take(&mut self.edit_buffer);
                if self.params.set(param, SettingValue::Text(value)) {
                    self.on_param_changed();
                }
            }
            KeyCode::Backspace => {
                self.edit_buffer.pop();
            }
            KeyCode::Char(c) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL) {
                    self.edit_buffer.push(c);
                }
            }
            _ => {}
        }
        AppAction::None
    }

    fn handle_picker_input(&mut self, key: KeyEvent) -> AppAction {
        let count = self.store.len();
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.dir_selected = self.dir_selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.dir_selected + 1 < count {
                    self.dir_selected += 1;
                }
            }
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                let picked = self.store.directories().nth(self.dir_selected).map(str::to_string);
                if let Some(dir) = picked {
                    self.select_directory(&dir);
                }
            }
            _ => {}
        }
        AppAction::None
    }

    fn handle_directory_input(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.edit_buffer.clear();
            }
            KeyCode::Enter => {
                let path = self.edit_buffer.clone();
                if self.browse_directory(&path) {
                    self.input_mode = InputMode::Normal;
                    self.edit_buffer.clear();
                }
            }
            KeyCode::Backspace => {
                self.edit_buffer.pop();
            }
            KeyCode::Char(c) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL) {
                    self.edit_buffer.push(c);
                }
            }
            _ => {}
        }
        AppAction::None
    }

    fn open_directory_picker(&mut self) {
        if self.store.is_empty() {
            self.set_status_warning("No saved directories; press o to add one");
            return;
        }
        self.dir_selected = self
            .working_dir
            .as_deref()
            .and_then(|current| self.store.directories().position(|dir| dir == current))
            .unwrap_or(0);
        self.input_mode = InputMode::PickDirectory;
    }

    /// Recalls an older command from the working directory's history.
    pub fn history_prev(&mut self) {
        let len = self.history().len();
        if len == 0 {
            return;
        }
        let next = match self.history_index {
            None => 0,
            Some(idx) => (idx + 1).min(len - 1),
        };
        self.history_index = Some(next);
        self.command_input = self.history()[next].clone();
    }

    /// Moves back towards the newest entry; past it the input is cleared.
    pub fn history_next(&mut self) {
        match self.history_index {
            None => {}
            Some(0) => {
                self.history_index = None;
                self.command_input.clear();
            }
            Some(idx) => {
                self.history_index = Some(idx - 1);
                self.command_input = self.history()[idx - 1].clone();
            }
        }
    }

    pub fn scroll_up(&mut self, amount: usize) {
        let view = self.output_view_height.max(1);
        let tab = self.tab;
        let output = self.output_mut(tab);
        let max_scroll = output.buffer.len().saturating_sub(view);
        let current = if output.follow { max_scroll } else { output.scroll };
        output.scroll = current.saturating_sub(amount).min(max_scroll);
        output.follow = false;
    }

    pub fn scroll_down(&mut self, amount: usize) {
        let view = self.output_view_height.max(1);
        let tab = self.tab;
        let output = self.output_mut(tab);
        let max_scroll = output.buffer.len().saturating_sub(view);
        let current = if output.follow { max_scroll } else { output.scroll };
        let next = (current + amount).min(max_scroll);
        output.scroll = next;
        output.follow = next == max_scroll;
    }

    pub fn scroll_to_top(&mut self) {
        let tab = self.tab;
        let output = self.output_mut(tab);
        output.scroll = 0;
        output.follow = false;
    }

    fn ensure_follow(&mut self, tab: Tab) {
        let view = self.output_view_height.max(1);
        let output = self.output_mut(tab);
        output.scroll = output.buffer.len().saturating_sub(view);
    }

    pub fn set_output_view_height(&mut self, height: usize) {
        self.output_view_height = height;
        let view = height.max(1);
        let tab = self.tab;
        let output = self.output_mut(tab);
        let max_scroll = output.buffer.len().saturating_sub(view);
        if output.follow {
            output.scroll = max_scroll;
        } else {
            output.scroll = output.scroll.min(max_scroll);
        }
    }

    pub fn status_line(&self) -> String {
        let dir = self.working_dir.as_deref().unwrap_or("-");
        let output = self.output(self.tab);
        let state = match (output.running, output.started_at) {
            (true, Some(at)) => format!("running {}", format_duration(at.elapsed())),
            (true, None) => "running".to_string(),
            (false, _) => "idle".to_string(),
        };
        format!(
            "{} | dir: {} | history: {} | {} | lines: {} | follow: {}",
            self.tab.title(),
            dir,
            self.history().len(),
            state,
            output.buffer.len(),
            if output.follow { "on" } else { "off" }
        )
    }

    pub fn status_message(&self) -> Option<(&str, StatusLevel)> {
        if let Some(message) = &self.status_message {
            let still_visible = match message.ttl {
                Some(ttl) => message.at.elapsed() < ttl,
                None => true,
            };
            if still_visible {
                return Some((message.text.as_str(), message.level));
            }
        }
        None
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.set_status_message_with_level(message, StatusLevel::Info, Some(Duration::from_secs(3)));
    }

    pub fn set_status_warning(&mut self, message: impl Into<String>) {
        self.set_status_message_with_level(message, StatusLevel::Warning, Some(Duration::from_secs(5)));
    }

    fn set_status_message_with_level(
        &mut self,
        message: impl Into<String>,
        level: StatusLevel,
        ttl: Option<Duration>,
    ) {
        self.status_message = Some(StatusMessage {
            text: message.into(),
            at: Instant::now(),
            ttl,
            level,
        });
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn make_app(tmp: &tempfile::TempDir) -> App {
        let path = tmp.path().join("command_profiles.json");
        App::new(ProfileStore::load(&path), path, 100, false)
    }

    fn work_dir(tmp: &tempfile::TempDir) -> String {
        let dir = tmp.path().join("work");
        fs::create_dir_all(&dir).unwrap();
        resolve_directory(&dir.to_string_lossy()).unwrap()
    }

    fn saved(tmp: &tempfile::TempDir) -> ProfileStore {
        ProfileStore::load(&tmp.path().join("command_profiles.json"))
    }

    fn warning(app: &App) -> Option<String> {
        app.status_message()
            .filter(|(_, level)| *level == StatusLevel::Warning)
            .map(|(text, _)| text.to_string())
    }

    #[test]
    fn browse_registers_and_persists_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        let dir = work_dir(&tmp);
        assert!(app.browse_directory(&dir));
        assert_eq!(app.working_dir.as_deref(), Some(dir.as_str()));
        assert!(saved(&tmp).contains(&dir));
        assert_eq!(app.preview, CommandPreview::NeedsProject);
    }

    #[test]
    fn browse_stores_absolute_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        assert!(app.browse_directory("."));
        let dir = work_dir(&tmp);
        assert!(app.browse_directory(&format!("{}/", dir)));
        assert!(app.browse_directory(&format!("{}/./", dir)));

        let store = saved(&tmp);
        let keys: Vec<_> = store.directories().collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|key| std::path::Path::new(key).is_absolute()));
        assert_eq!(app.working_dir.as_deref(), Some(dir.as_str()));
        assert!(app.preview == CommandPreview::NeedsProject);
    }

    #[test]
    fn browse_rejects_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        let missing = tmp.path().join("missing").to_string_lossy().into_owned();
        assert!(!app.browse_directory(&missing));
        assert!(app.working_dir.is_none());
        assert!(app.store.is_empty());
        assert!(warning(&app).unwrap().starts_with("Not a directory"));
    }

    #[test]
    fn run_without_directory_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        app.command_input = "ls".to_string();
        assert_eq!(app.request_run(), AppAction::None);
        assert_eq!(warning(&app).as_deref(), Some("Please select a working directory first"));
        assert!(!app.is_running(Tab::Command));
    }

    #[test]
    fn run_with_blank_command_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        app.browse_directory(&work_dir(&tmp));
        app.command_input = "   ".to_string();
        assert_eq!(app.request_run(), AppAction::None);
        assert_eq!(warning(&app).as_deref(), Some("Please enter a command"));
    }

    #[test]
    fn run_records_history_and_disables_tab() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        let dir = work_dir(&tmp);
        app.browse_directory(&dir);
        app.command_input = " make all ".to_string();

        let action = app.request_run();
        assert_eq!(
            action,
            AppAction::Run {
                tab: Tab::Command,
                command: "make all".to_string(),
                working_dir: dir.clone(),
            }
        );
        assert!(app.is_running(Tab::Command));
        assert_eq!(saved(&tmp).commands(&dir), ["make all"]);
        let lines: Vec<_> = app.output(Tab::Command).buffer.iter().collect();
        assert_eq!(lines[0], "Running command: make all");

        assert_eq!(app.request_run(), AppAction::None);
        assert_eq!(warning(&app).as_deref(), Some("A command is already running"));
        assert!(!app.browse_directory(&dir));
    }

    #[test]
    fn command_run_saves_packaging_form_every_time() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        let dir = work_dir(&tmp);
        app.browse_directory(&dir);
        app.params.platform = "Linux".to_string();
        app.command_input = "echo hi".to_string();
        app.request_run();

        let store = saved(&tmp);
        let settings = store.package_settings(&dir).unwrap();
        assert_eq!(settings.len(), 17);
        assert_eq!(settings.get("Platform"), Some(&SettingValue::Text("Linux".to_string())));

        app.on_run_finished(Tab::Command, RunOutput::default());
        app.params.configuration = "Shipping".to_string();
        app.request_run();
        let store = saved(&tmp);
        assert_eq!(store.commands(&dir), ["echo hi"]);
        let settings = store.package_settings(&dir).unwrap();
        assert_eq!(
            settings.get("Configuration"),
            Some(&SettingValue::Text("Shipping".to_string()))
        );
    }

    #[test]
    fn finished_run_appends_output_and_reenables() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        app.browse_directory(&work_dir(&tmp));
        app.command_input = "build".to_string();
        app.request_run();

        app.on_run_finished(
            Tab::Command,
            RunOutput {
                stdout: "ok\n".to_string(),
                stderr: "warn\n".to_string(),
            },
        );
        assert!(!app.is_running(Tab::Command));
        let text = app.output(Tab::Command).buffer.text();
        assert!(text.ends_with("Output:\nok\n\nErrors:\nwarn\n"));
    }

    #[test]
    fn param_change_persists_only_with_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        app.tab = Tab::Package;
        app.param_selected = Param::ALL.iter().position(|p| *p == Param::Stage).unwrap();
        app.handle_key(key(KeyCode::Char(' ')));
        assert!(!app.params.stage);
        assert!(!tmp.path().join("command_profiles.json").exists());

        let dir = work_dir(&tmp);
        app.browse_directory(&dir);
        app.handle_key(key(KeyCode::Char(' ')));
        assert!(app.params.stage);
        let store = saved(&tmp);
        let settings = store.package_settings(&dir).unwrap();
        assert_eq!(settings.get("Stage"), Some(&SettingValue::Flag(true)));
    }

    #[test]
    fn editing_project_refreshes_preview() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        let dir = work_dir(&tmp);
        app.browse_directory(&dir);
        app.tab = Tab::Package;
        app.param_selected = 0;
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.input_mode, InputMode::EditParam);
        for c in "G.uproject".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.params.project, "G.uproject");
        let line = app.preview.command().unwrap().to_string();
        assert!(line.contains("-project=\"G.uproject\""));

        match app.handle_key(key(KeyCode::Char('r'))) {
            AppAction::Run { tab, command, .. } => {
                assert_eq!(tab, Tab::Package);
                assert_eq!(command, line);
            }
            other => panic!("unexpected action: {:?}", other),
        }
        assert_eq!(
            app.output(Tab::Package).buffer.iter().next(),
            Some("Running packaging command...")
        );
    }

    #[test]
    fn package_run_without_project_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        app.browse_directory(&work_dir(&tmp));
        app.tab = Tab::Package;
        assert_eq!(app.request_run(), AppAction::None);
        assert_eq!(warning(&app).as_deref(), Some("Please select a project file"));
    }

    #[test]
    fn selecting_directory_loads_saved_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        app.store.ensure_directory("/saved");
        let mut params = PackagingParameters::default();
        params.platform = "Linux".to_string();
        params.project = "/saved/Game.uproject".to_string();
        app.store.record_package_settings("/saved", &params);

        assert!(app.select_directory("/saved"));
        assert_eq!(app.params.platform, "Linux");
        assert!(app.preview.command().unwrap().starts_with("/saved/Engine/"));
        assert!(!app.select_directory("/unknown"));
    }

    #[test]
    fn picker_selects_known_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        app.store.ensure_directory("/a");
        app.store.ensure_directory("/b");
        app.handle_key(key(KeyCode::Char('d')));
        assert_eq!(app.input_mode, InputMode::PickDirectory);
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.working_dir.as_deref(), Some("/b"));
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn history_recall_walks_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        app.store.ensure_directory("/repo");
        app.store.record_command("/repo", "old");
        app.store.record_command("/repo", "new");
        app.select_directory("/repo");

        app.history_prev();
        assert_eq!(app.command_input, "new");
        app.history_prev();
        app.history_prev();
        assert_eq!(app.command_input, "old");
        app.history_next();
        assert_eq!(app.command_input, "new");
        app.history_next();
        assert_eq!(app.command_input, "");
        assert_eq!(app.history_index(), None);
    }

    #[test]
    fn typed_command_runs_on_enter() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        app.browse_directory(&work_dir(&tmp));
        app.handle_key(key(KeyCode::Char('i')));
        for c in "echo hi".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        let action = app.handle_key(key(KeyCode::Enter));
        assert!(matches!(action, AppAction::Run { tab: Tab::Command, .. }));
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn save_failure_is_reported_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = work_dir(&tmp);
        // The store path is a directory, so every write fails.
        let mut app = App::new(ProfileStore::default(), tmp.path().to_path_buf(), 100, false);
        assert!(app.browse_directory(&dir));
        assert!(warning(&app).unwrap().starts_with("Could not save profiles"));
        assert!(app.store.contains(&dir));
        assert_eq!(app.working_dir.as_deref(), Some(dir.as_str()));
    }

    #[test]
    fn ctrl_c_quits_from_any_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = make_app(&tmp);
        app.input_mode = InputMode::EditCommand;
        let action = app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(action, AppAction::Quit);
        assert!(app.should_quit);
    }
}
