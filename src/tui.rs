//! Terminal User Interface (TUI) rendering and management.
//!
//! This module handles initializing the terminal in raw mode, restoring it on exit,
//! and drawing the application state using `ratatui`.

use std::io::{self, Stdout};

use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::{Frame, Terminal};

use crate::app::{App, InputMode, StatusLevel, Tab};
use crate::output::sanitize_text;
use crate::package::{CommandPreview, Param, SettingValue};

/// Type alias for the specific terminal backend used.
pub type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Initializes the terminal for TUI mode.
///
/// Enables raw mode, enters the alternate screen, and creates a `ratatui` Terminal instance.
pub fn init_terminal() -> io::Result<TuiTerminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restores the terminal to its original state.
pub fn restore_terminal(mut terminal: TuiTerminal) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Draws the current application state to the terminal.
pub fn draw(app: &mut App, terminal: &mut TuiTerminal) -> io::Result<()> {
    if let Some(title) = title_update(app) {
        execute!(terminal.backend_mut(), SetTitle(title))?;
    }
    terminal.draw(|frame| {
        let area = frame.size();
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(1), Constraint::Length(4)])
            .split(area);

        render_header(frame, app, vertical[0]);

        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(32), Constraint::Percentage(68)])
            .split(vertical[1]);
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(input_height(app.tab)), Constraint::Min(1)])
            .split(main[1]);

        match app.tab {
            Tab::Command => {
                render_history(frame, app, main[0]);
                render_command_input(frame, app, right[0]);
            }
            Tab::Package => {
                render_params(frame, app, main[0]);
                render_preview(frame, app, right[0]);
            }
        }
        render_output(frame, app, right[1]);
        render_status(frame, app, vertical[2]);

        if app.input_mode == InputMode::PickDirectory {
            render_directory_picker(frame, app, centered_rect(70, 50, area));
        }
        if app.show_help {
            render_help(frame, centered_rect(60, 70, area));
        }
    })?;
    Ok(())
}

fn input_height(tab: Tab) -> u16 {
    match tab {
        Tab::Command => 3,
        Tab::Package => 6,
    }
}

fn border_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn rounded_block(title: impl Into<Line<'static>>) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style())
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let titles = Tab::ALL.iter().map(|tab| {
        let marker = if app.is_running(*tab) {
            if app.use_symbols { " ▲" } else { " *" }
        } else {
            ""
        };
        Line::from(format!("{}{}", tab.title(), marker))
    });
    let selected = Tab::ALL.iter().position(|tab| *tab == app.tab).unwrap_or(0);
    let dir = app.working_dir.as_deref().unwrap_or("(no directory selected)");
    let tabs = Tabs::new(titles)
        .select(selected)
        .block(rounded_block(format!("cmdrack · {}", dir)))
        .style(Style::default().fg(Color::Gray))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .divider(if app.use_symbols { "│" } else { "|" });
    frame.render_widget(tabs, area);
}

fn render_history(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = app
        .history()
        .iter()
        .map(|command| ListItem::new(truncate(command, width)))
        .collect();
    let empty = items.is_empty();
    let list = List::new(items)
        .block(rounded_block("History"))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    let mut state = ListState::default();
    state.select(app.history_index());
    frame.render_stateful_widget(list, area, &mut state);
    if empty {
        let inner = rounded_block("History").inner(area);
        let hint = if app.working_dir.is_some() {
            "No commands yet"
        } else {
            "Press d or o to choose a directory"
        };
        frame.render_widget(
            Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)),
            inner,
        );
    }
}

fn render_command_input(frame: &mut Frame, app: &App, area: Rect) {
    let editing = app.input_mode == InputMode::EditCommand;
    let cursor = if editing { cursor_glyph(app) } else { "" };
    let block = rounded_block("Command").border_style(if editing {
        Style::default().fg(Color::Green)
    } else {
        border_style()
    });
    let width = block.inner(area).width as usize;
    let text = format!("{}{}", app.command_input, cursor);
    let shown = tail(&text, width.saturating_sub(1));
    frame.render_widget(Paragraph::new(shown).block(block), area);
}

fn render_params(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width.saturating_sub(4) as usize;
    let editing = app.input_mode == InputMode::EditParam;
    let items: Vec<ListItem> = Param::ALL
        .iter()
        .enumerate()
        .map(|(idx, param)| {
            let value = match app.params.get(*param) {
                SettingValue::Flag(on) => flag_glyph(on, app.use_symbols).to_string(),
                SettingValue::Text(_) if editing && idx == app.param_selected => {
                    format!("{}{}", app.edit_buffer, cursor_glyph(app))
                }
                SettingValue::Text(text) if text.is_empty() => "-".to_string(),
                SettingValue::Text(text) => text,
            };
            let label = format!("{:<14} ", param.label());
            let room = width.saturating_sub(label.chars().count());
            ListItem::new(Line::from(vec![
                Span::styled(label, Style::default().fg(Color::Gray)),
                Span::raw(truncate(&value, room)),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(rounded_block("Parameters"))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    let mut state = ListState::default();
    state.select(Some(app.param_selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_preview(frame: &mut Frame, app: &App, area: Rect) {
    let style = match app.preview {
        CommandPreview::Ready(_) => Style::default(),
        _ => Style::default().fg(Color::DarkGray),
    };
    let paragraph = Paragraph::new(app.preview.to_string())
        .style(style)
        .wrap(Wrap { trim: false })
        .block(rounded_block("Generated command"));
    frame.render_widget(paragraph, area);
}

fn render_output(frame: &mut Frame, app: &mut App, area: Rect) {
    let tab = app.tab;
    let title = if app.is_running(tab) {
        format!("Output - {} (running)", tab.title())
    } else {
        format!("Output - {}", tab.title())
    };
    let block = rounded_block(title);
    let inner = block.inner(area);
    let height = inner.height as usize;
    app.set_output_view_height(height);

    let output = app.output(tab);
    let width = inner.width as usize;
    let total = output.buffer.len();
    let start = if output.follow {
        total.saturating_sub(height)
    } else {
        output.scroll.min(total.saturating_sub(height))
    };
    let lines: Vec<Line> = output
        .buffer
        .iter()
        .skip(start)
        .take(height)
        .map(|line| {
            let plain = strip_carriage(&sanitize_text(line));
            Line::from(truncate(&plain, width))
        })
        .collect();

    frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
    if total == 0 {
        let empty = Paragraph::new("No output yet").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
    }
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let default_help = match app.tab {
        Tab::Command => "Tab switch | d dirs | o open | i edit | Up/Down history | r run | y copy | ? help | q quit",
        Tab::Package => "Tab switch | d dirs | o open | Up/Down select | Space toggle | Enter edit | r run | c copy cmd | ? help | q quit",
    };
    let (help_line, help_style) = match app.input_mode {
        InputMode::AddDirectory => (
            format!("Directory: {}{} (Enter to open, Esc to cancel)", app.edit_buffer, cursor_glyph(app)),
            Style::default().fg(Color::Green),
        ),
        InputMode::EditCommand => (
            "Enter to run | Up/Down history | Esc to stop editing".to_string(),
            Style::default().fg(Color::DarkGray),
        ),
        InputMode::EditParam => (
            "Enter to apply | Esc to cancel".to_string(),
            Style::default().fg(Color::DarkGray),
        ),
        _ => match app.status_message() {
            Some((message, StatusLevel::Warning)) => (message.to_string(), Style::default().fg(Color::Yellow)),
            Some((message, StatusLevel::Info)) => (message.to_string(), Style::default().fg(Color::DarkGray)),
            None => (default_help.to_string(), Style::default().fg(Color::DarkGray)),
        },
    };
    let status = Paragraph::new(Text::from(vec![
        Line::from(Span::raw(app.status_line())),
        Line::from(Span::styled(help_line, help_style)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border_style()),
    );
    frame.render_widget(status, area);
}

fn render_directory_picker(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = app
        .directories()
        .into_iter()
        .map(|dir| {
            let current = app.working_dir.as_deref() == Some(dir);
            let marker = if current { "* " } else { "  " };
            ListItem::new(truncate(&format!("{}{}", marker, dir), width))
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title("Directories (Enter select, Esc close)")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        )
        .style(Style::default().bg(Color::DarkGray).fg(Color::White))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    let mut state = ListState::default();
    state.select(Some(app.dir_selected));
    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let help_text = [
        "General:",
        "  Tab / 1 / 2  Switch tab",
        "  d            Pick a saved directory",
        "  o            Open a directory by path",
        "  r            Run the active tab",
        "  y            Copy output to clipboard",
        "  c            Copy generated command",
        "  PageUp/Dn    Scroll output",
        "  Home/End     Scroll to top/bottom",
        "  ?            Toggle this help",
        "  q            Quit",
        "",
        "Cmd tab:",
        "  i / Enter    Edit command (Enter runs)",
        "  Up/Down      Recall history",
        "",
        "Package tab:",
        "  Up/Down      Select parameter",
        "  Space        Toggle flag / next choice",
        "  Left/Right   Cycle choices",
        "  Enter        Edit text value",
    ]
    .join("\n");

    let help_block = Paragraph::new(help_text)
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        )
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(Clear, area);
    frame.render_widget(help_block, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn window_title(app: &App) -> String {
    match app.working_dir.as_deref() {
        Some(dir) => format!("cmdrack · {}", dir),
        None => "cmdrack".to_string(),
    }
}

/// The window title to send, if it differs from the one already shown.
fn title_update(app: &mut App) -> Option<String> {
    let title = window_title(app);
    if app.terminal_title.as_deref() == Some(title.as_str()) {
        return None;
    }
    app.terminal_title = Some(title.clone());
    Some(title)
}

fn cursor_glyph(app: &App) -> &'static str {
    if app.use_symbols {
        "▌"
    } else {
        "|"
    }
}

fn flag_glyph(on: bool, use_symbols: bool) -> &'static str {
    match (on, use_symbols) {
        (true, true) => "● on",
        (false, true) => "○ off",
        (true, false) => "[x]",
        (false, false) => "[ ]",
    }
}

fn truncate(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out = text.chars().take(max.saturating_sub(1)).collect::<String>();
    out.push('~');
    out
}

/// Keeps the end of `text` visible, for inputs longer than their box.
fn tail(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    text.chars().skip(count - max).collect()
}

fn strip_carriage(text: &str) -> String {
    text.rsplit('\r').next().unwrap_or("").to_string()
}
