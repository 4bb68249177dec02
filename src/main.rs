//! cmdrack: a per-directory command runner with an Unreal packaging command builder.
//!
//! This is the entry point of the application. It parses command-line arguments,
//! loads configuration, and either runs the terminal UI event loop or one of the
//! scripted subcommands.

mod app;
mod clipboard;
mod command;
mod config;
mod events;
mod logging;
mod output;
mod package;
mod profile;
mod runner;
mod tui;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::{Parser, Subcommand};
use crossterm::event::KeyEventKind;
use tokio::sync::mpsc;

use crate::app::{App, AppAction};
use crate::command::{prepare_command, prepare_package};
use crate::config::Config;
use crate::events::Event;
use crate::logging::LogTarget;
use crate::output::{command_header, format_run_output, package_header};
use crate::package::{build_package_command, PackagingParameters};
use crate::profile::{resolve_directory, ProfileStore, DEFAULT_PROFILES_FILE};
use crate::runner::{run_captured, CommandRunner, Shell};

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "cmdrack",
    version,
    about = "Per-directory command runner and packaging command builder",
    styles = help_styles(),
    color = clap::ColorChoice::Always
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Path to cmdrack.toml configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Ignore any cmdrack.toml in the current directory.
    #[arg(long, global = true)]
    no_config: bool,
    /// Path of the JSON profile store.
    #[arg(long, global = true)]
    profiles: Option<PathBuf>,
    /// Shell prefix used to run commands (e.g. "bash -lc").
    #[arg(long, global = true)]
    shell: Option<String>,
    /// Max output lines kept per tab.
    #[arg(long, global = true)]
    max_lines: Option<usize>,
    /// Use plain ASCII instead of Unicode symbols.
    #[arg(long, global = true)]
    no_symbols: bool,
    /// Write logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Log filter (e.g. "debug"); overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open the terminal UI (the default).
    Ui {
        /// Start in this directory.
        #[arg(long)]
        dir: Option<String>,
    },
    /// List saved directories.
    Dirs,
    /// Save a directory.
    Add { dir: String },
    /// Show a directory's recent commands, newest first.
    History {
        #[arg(long)]
        dir: String,
    },
    /// Run a command in a directory and record it: run --dir D -- <command...>
    Run {
        #[arg(long)]
        dir: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Print (and optionally run) the packaging command for a directory.
    Package {
        #[arg(long)]
        dir: String,
        /// Change a parameter and save it, e.g. --set Platform=Linux.
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
        /// Run the generated command.
        #[arg(long)]
        run: bool,
    },
    /// Show version information.
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(Commands::Version) = cli.command {
        println!("cmdrack {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let settings = load_settings(&cli)?;
    let interactive = matches!(cli.command, None | Some(Commands::Ui { .. }));
    let target = match (&settings.log_file, interactive) {
        (Some(path), _) => LogTarget::File(path),
        (None, false) => LogTarget::Stderr,
        (None, true) => LogTarget::Off,
    };
    logging::init(target, settings.log_level.as_deref())?;
    tracing::debug!(profiles = %settings.profiles_path.display(), shell = %settings.shell.describe(), "settings loaded");

    match cli.command {
        None => run_ui(&settings, None).await,
        Some(Commands::Ui { dir }) => run_ui(&settings, dir).await,
        Some(Commands::Dirs) => list_directories(&settings),
        Some(Commands::Add { dir }) => add_directory(&settings, &dir),
        Some(Commands::History { dir }) => show_history(&settings, &dir),
        Some(Commands::Run { dir, command }) => run_command(&settings, &dir, &command.join(" ")).await,
        Some(Commands::Package { dir, set, run }) => run_package(&settings, &dir, &set, run).await,
        Some(Commands::Version) => Ok(()),
    }
}

async fn run_ui(settings: &RunSettings, start_dir: Option<String>) -> Result<()> {
    let store = ProfileStore::load(&settings.profiles_path);
    let mut app = App::new(
        store,
        settings.profiles_path.clone(),
        settings.max_lines,
        settings.use_symbols,
    );
    if let Some(dir) = start_dir {
        let dir = resolve_directory(&dir)?;
        app.browse_directory(&dir);
    }

    let (event_tx, mut event_rx) = mpsc::channel(256);
    let runner = CommandRunner::new(settings.shell.clone(), event_tx.clone());
    let mut terminal = tui::init_terminal()?;
    spawn_input_listener(event_tx.clone());
    spawn_signal_listener(event_tx.clone());

    let mut ticker = tokio::time::interval(Duration::from_millis(150));
    let mut result = Ok(());

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    Event::Key(key) => {
                        let action = app.handle_key(key);
                        handle_app_action(action, &mut app, &runner);
                    }
                    Event::RunFinished { tab, output } => app.on_run_finished(tab, output),
                    Event::Resize => {
                        let _ = terminal.autoresize();
                    }
                    Event::Shutdown => app.should_quit = true,
                }
            }
            _ = ticker.tick() => {}
        }

        if let Err(err) = tui::draw(&mut app, &mut terminal) {
            result = Err(err.into());
            break;
        }
        if app.should_quit {
            break;
        }
    }

    tui::restore_terminal(terminal)?;
    result
}

fn handle_app_action(action: AppAction, app: &mut App, runner: &CommandRunner) {
    match action {
        AppAction::Run {
            tab,
            command,
            working_dir,
        } => runner.spawn(tab, command, working_dir),
        AppAction::Copy(text) => match clipboard::copy_text(&text) {
            Ok(()) => app.set_status_message("copied to clipboard"),
            Err(err) => app.set_status_warning(format!("clipboard failed: {}", err)),
        },
        AppAction::Quit => app.should_quit = true,
        AppAction::None => {}
    }
}

fn spawn_input_listener(tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || loop {
        if crossterm::event::poll(Duration::from_millis(100)).unwrap_or(false) {
            match crossterm::event::read() {
                Ok(crossterm::event::Event::Key(key)) if key.kind != KeyEventKind::Release => {
                    if tx.blocking_send(Event::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(crossterm::event::Event::Resize(..)) => {
                    let _ = tx.blocking_send(Event::Resize);
                }
                _ => {}
            }
        }
    });
}

fn spawn_signal_listener(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(_) => return,
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        let _ = tx.send(Event::Shutdown).await;
    });
}

fn list_directories(settings: &RunSettings) -> Result<()> {
    let store = ProfileStore::load(&settings.profiles_path);
    if store.is_empty() {
        eprintln!("no saved directories (add one with `cmdrack add <DIR>`)");
        return Ok(());
    }
    for dir in store.directories() {
        println!("{}", dir);
    }
    Ok(())
}

fn add_directory(settings: &RunSettings, dir: &str) -> Result<()> {
    let dir = resolve_directory(dir)?;
    let mut store = ProfileStore::load(&settings.profiles_path);
    if store.ensure_directory(&dir) {
        store.save(&settings.profiles_path)?;
        tracing::info!(dir = %dir, "registered working directory");
        println!("added {}", dir);
    } else {
        println!("{} is already saved", dir);
    }
    Ok(())
}

fn show_history(settings: &RunSettings, dir: &str) -> Result<()> {
    let store = ProfileStore::load(&settings.profiles_path);
    let dir = resolve_directory(dir).unwrap_or_else(|_| dir.trim().to_string());
    if !store.contains(&dir) {
        bail!("unknown directory: {}", dir);
    }
    for command in store.commands(&dir) {
        println!("{}", command);
    }
    Ok(())
}

async fn run_command(settings: &RunSettings, dir: &str, text: &str) -> Result<()> {
    let command = prepare_command(Some(dir.trim()), text)?;
    let dir = resolve_directory(dir)?;
    let mut store = ProfileStore::load(&settings.profiles_path);
    let params = saved_parameters(&store, &dir);
    store.ensure_directory(&dir);
    store.record_command(&dir, &command);
    store.record_package_settings(&dir, &params);
    save_or_warn(&store, &settings.profiles_path);

    print!("{}", command_header(&command, &dir));
    tracing::info!(command = %command, cwd = %dir, "starting command");
    let output = run_captured(&settings.shell, &command, &dir).await;
    print!("{}", format_run_output(&output));
    Ok(())
}

async fn run_package(settings: &RunSettings, dir: &str, assignments: &[String], run: bool) -> Result<()> {
    let dir = resolve_directory(dir)?;
    let dir = dir.as_str();
    let mut store = ProfileStore::load(&settings.profiles_path);
    let mut params = saved_parameters(&store, dir);
    for assignment in assignments {
        let (name, value) = split_assignment(assignment)?;
        params.set_from_str(name, value)?;
    }

    let mut dirty = store.ensure_directory(dir);
    if !assignments.is_empty() {
        dirty |= store.record_package_settings(dir, &params);
    }
    if dirty {
        store.save(&settings.profiles_path)?;
    }

    println!("{}", build_package_command(dir, &params));
    if run {
        let command = prepare_package(Some(dir), &params)?;
        print!("\n{}", package_header());
        tracing::info!(command = %command, cwd = dir, "starting packaging command");
        let output = run_captured(&settings.shell, &command, dir).await;
        print!("{}", format_run_output(&output));
    }
    Ok(())
}

/// Packaging form as last saved for `dir`, on top of the defaults.
fn saved_parameters(store: &ProfileStore, dir: &str) -> PackagingParameters {
    let mut params = PackagingParameters::default();
    if let Some(saved) = store.package_settings(dir) {
        params.apply_settings(saved);
    }
    params
}

fn split_assignment(entry: &str) -> Result<(&str, &str)> {
    match entry.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => bail!("expected NAME=VALUE, got {:?}", entry),
    }
}

fn save_or_warn(store: &ProfileStore, path: &Path) {
    if let Err(err) = store.save(path) {
        tracing::warn!(error = %format!("{:#}", err), "failed to save profiles");
    }
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
        .valid(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .invalid(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}

fn load_settings(cli: &Cli) -> Result<RunSettings> {
    let config = if cli.no_config {
        Config::default()
    } else if let Some(path) = &cli.config {
        config::load_config(path)?
    } else if let Some(path) = config::default_config_path() {
        config::load_config(&path)?
    } else {
        Config::default()
    };
    RunSettings::from_cli(cli, config)
}

/// Runtime configuration derived from CLI arguments and the config file.
#[derive(Debug, Clone)]
struct RunSettings {
    profiles_path: PathBuf,
    shell: Shell,
    max_lines: usize,
    use_symbols: bool,
    log_file: Option<PathBuf>,
    log_level: Option<String>,
}

impl RunSettings {
    fn from_cli(cli: &Cli, config: Config) -> Result<Self> {
        const DEFAULT_MAX_LINES: usize = 10_000;
        let profiles_path = cli
            .profiles
            .clone()
            .or(config.profiles_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROFILES_FILE));
        let shell = match cli.shell.as_deref().or(config.shell.as_deref()) {
            Some(spec) => Shell::parse(spec)?,
            None => Shell::platform_default(),
        };
        let max_lines = cli.max_lines.or(config.max_lines).unwrap_or(DEFAULT_MAX_LINES);
        let use_symbols = if cli.no_symbols {
            false
        } else {
            config.symbols.unwrap_or(true)
        };
        Ok(Self {
            profiles_path,
            shell,
            max_lines,
            use_symbols,
            log_file: cli.log_file.clone().or(config.log_file),
            log_level: cli.log_level.clone().or(config.log_level),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_subcommand_collects_trailing_words() {
        let cli = Cli::try_parse_from(["cmdrack", "run", "--dir", "/repo", "--", "make", "-j", "4"]).unwrap();
        match cli.command {
            Some(Commands::Run { dir, command }) => {
                assert_eq!(dir, "/repo");
                assert_eq!(command.join(" "), "make -j 4");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn package_subcommand_accepts_repeated_sets() {
        let cli = Cli::try_parse_from([
            "cmdrack",
            "package",
            "--dir",
            "/repo",
            "--set",
            "Platform=Linux",
            "--set",
            "Stage=false",
            "--run",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Package { set, run, .. }) => {
                assert_eq!(set, vec!["Platform=Linux", "Stage=false"]);
                assert!(run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::try_parse_from(["cmdrack", "--max-lines", "50", "--no-symbols", "dirs"]).unwrap();
        let config = Config {
            profiles_file: Some(PathBuf::from("state/profiles.json")),
            shell: Some("bash -lc".to_string()),
            max_lines: Some(500),
            symbols: Some(true),
            log_file: None,
            log_level: Some("debug".to_string()),
        };
        let settings = RunSettings::from_cli(&cli, config).unwrap();
        assert_eq!(settings.max_lines, 50);
        assert!(!settings.use_symbols);
        assert_eq!(settings.profiles_path, PathBuf::from("state/profiles.json"));
        assert_eq!(settings.shell, Shell::parse("bash -lc").unwrap());
        assert_eq!(settings.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn defaults_without_config() {
        let cli = Cli::try_parse_from(["cmdrack"]).unwrap();
        let settings = RunSettings::from_cli(&cli, Config::default()).unwrap();
        assert_eq!(settings.profiles_path, PathBuf::from(DEFAULT_PROFILES_FILE));
        assert_eq!(settings.max_lines, 10_000);
        assert!(settings.use_symbols);
        assert_eq!(settings.shell, Shell::platform_default());
    }

    #[test]
    fn assignments_split_on_first_equals() {
        assert_eq!(split_assignment("CookerOptions=-a=b").unwrap(), ("CookerOptions", "-a=b"));
        assert_eq!(split_assignment("ArchiveDirectory=").unwrap(), ("ArchiveDirectory", ""));
        assert!(split_assignment("Platform").is_err());
        assert!(split_assignment("=Linux").is_err());
    }

    #[test]
    fn saved_parameters_fall_back_to_defaults() {
        let mut store = ProfileStore::default();
        store.ensure_directory("/repo");
        assert_eq!(saved_parameters(&store, "/repo"), PackagingParameters::default());

        let mut params = PackagingParameters::default();
        params.cook = "skipcook".to_string();
        store.record_package_settings("/repo", &params);
        assert_eq!(saved_parameters(&store, "/repo").cook, "skipcook");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn package_subcommand_persists_assignments() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        let dir = resolve_directory(&work.to_string_lossy()).unwrap();
        let profiles = tmp.path().join("profiles.json");
        let profiles_arg = profiles.to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["cmdrack", "--profiles", profiles_arg.as_str()]).unwrap();
        let settings = RunSettings::from_cli(&cli, Config::default()).unwrap();

        run_package(&settings, &dir, &["Platform=Linux".to_string()], false)
            .await
            .unwrap();
        let store = ProfileStore::load(&profiles);
        let saved = store.package_settings(&dir).unwrap();
        assert_eq!(saved.get("Platform"), Some(&package::SettingValue::Text("Linux".to_string())));

        assert!(run_package(&settings, &dir, &["Bogus=1".to_string()], false).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_subcommand_records_history() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = resolve_directory(&tmp.path().to_string_lossy()).unwrap();
        let profiles = tmp.path().join("profiles.json");
        let profiles_arg = profiles.to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["cmdrack", "--profiles", profiles_arg.as_str()]).unwrap();
        let settings = RunSettings::from_cli(&cli, Config::default()).unwrap();

        run_command(&settings, &dir, "true").await.unwrap();
        run_command(&settings, &dir, "true").await.unwrap();
        let store = ProfileStore::load(&profiles);
        assert_eq!(store.commands(&dir), ["true"]);
        assert_eq!(store.package_settings(&dir).map(|saved| saved.len()), Some(17));
        assert!(run_command(&settings, &dir, "   ").await.is_err());

        let trailing = format!("{}/", dir);
        run_command(&settings, &trailing, "echo again").await.unwrap();
        let store = ProfileStore::load(&profiles);
        assert_eq!(store.len(), 1);
        assert_eq!(store.commands(&dir), ["echo again", "true"]);
    }
}
