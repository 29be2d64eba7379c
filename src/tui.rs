use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
};
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::Backend;
use crate::config::PanelConfig;
use crate::controller::{Controller, StatusLevel, ViewState};
use crate::form::SettingsForm;
use crate::models::JobStatusKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Email,
    Password,
    ApiKey,
    Model,
    DatabaseUrl,
    Positions,
    Locations,
    RemoteOnly,
}

const FIELDS: [Field; 8] = [
    Field::Email,
    Field::Password,
    Field::ApiKey,
    Field::Model,
    Field::DatabaseUrl,
    Field::Positions,
    Field::Locations,
    Field::RemoteOnly,
];

impl Field {
    fn label(self) -> &'static str {
        match self {
            Field::Email => "LinkedIn email",
            Field::Password => "LinkedIn password",
            Field::ApiKey => "OpenAI API key",
            Field::Model => "OpenAI model",
            Field::DatabaseUrl => "Database URL",
            Field::Positions => "Positions",
            Field::Locations => "Locations",
            Field::RemoteOnly => "Remote only",
        }
    }

    fn in_settings(self) -> bool {
        matches!(
            self,
            Field::Email | Field::Password | Field::ApiKey | Field::Model | Field::DatabaseUrl
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Refresh,
    SaveSettings,
    StartRun,
}

pub struct UiState {
    focus: usize,
}

impl UiState {
    pub fn new() -> Self {
        Self { focus: 0 }
    }

    pub fn focused(&self) -> Field {
        FIELDS[self.focus]
    }

    fn next(&mut self) {
        self.focus = (self.focus + 1) % FIELDS.len();
    }

    fn prev(&mut self) {
        self.focus = (self.focus + FIELDS.len() - 1) % FIELDS.len();
    }
}

fn text_field<'a>(state: &'a mut ViewState, field: Field) -> Option<&'a mut String> {
    match field {
        Field::Email => Some(&mut state.settings.linkedin_email),
        Field::Password => Some(&mut state.settings.linkedin_password),
        Field::ApiKey => Some(&mut state.settings.openai_api_key),
        Field::Model => Some(&mut state.settings.openai_model),
        Field::DatabaseUrl => Some(&mut state.settings.database_url),
        Field::Positions => Some(&mut state.filters.positions),
        Field::Locations => Some(&mut state.filters.locations),
        Field::RemoteOnly => None,
    }
}

/// Map one key press onto form edits or an action for the controller.
pub fn handle_key(ui: &mut UiState, state: &mut ViewState, key: KeyEvent) -> Action {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => Action::Quit,
        KeyCode::Char('c') if ctrl => Action::Quit,
        KeyCode::Char('r') if ctrl => Action::Refresh,
        KeyCode::Tab | KeyCode::Down => {
            ui.next();
            Action::None
        }
        KeyCode::BackTab | KeyCode::Up => {
            ui.prev();
            Action::None
        }
        KeyCode::Enter => {
            if ui.focused().in_settings() {
                Action::SaveSettings
            } else {
                Action::StartRun
            }
        }
        KeyCode::Char(' ') if ui.focused() == Field::RemoteOnly => {
            state.filters.remote_only = !state.filters.remote_only;
            Action::None
        }
        KeyCode::Char(c) if !ctrl => {
            if let Some(text) = text_field(state, ui.focused()) {
                text.push(c);
            }
            Action::None
        }
        KeyCode::Backspace => {
            if let Some(text) = text_field(state, ui.focused()) {
                text.pop();
            }
            Action::None
        }
        _ => Action::None,
    }
}

enum UiEvent {
    Key(KeyEvent),
    Resize,
}

/// Blocking terminal reads live on their own thread and are forwarded.
fn spawn_event_reader(tx: mpsc::UnboundedSender<UiEvent>) {
    std::thread::spawn(move || {
        loop {
            match event::poll(Duration::from_millis(200)) {
                Ok(true) => {
                    let forwarded = match event::read() {
                        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                            tx.send(UiEvent::Key(key))
                        }
                        Ok(Event::Resize(_, _)) => tx.send(UiEvent::Resize),
                        Ok(_) => Ok(()),
                        Err(_) => break,
                    };
                    if forwarded.is_err() {
                        break;
                    }
                }
                Ok(false) => {
                    if tx.is_closed() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
}

pub async fn run_dashboard<B: Backend + 'static>(backend: Arc<B>, config: &PanelConfig) -> Result<()> {
    let mut controller = Controller::new(backend, config);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut controller, &config.api_url).await;
    controller.teardown();

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run_loop<B: Backend + 'static>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    controller: &mut Controller<B>,
    api_url: &str,
) -> Result<()> {
    let mut outcomes = controller.activate();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    spawn_event_reader(events_tx);
    let mut ui = UiState::new();

    loop {
        terminal.draw(|frame| draw(frame, controller.state(), &ui, api_url))?;

        tokio::select! {
            Some(outcome) = outcomes.recv() => {
                controller.apply(outcome);
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                let UiEvent::Key(key) = event else { continue };
                match handle_key(&mut ui, controller.state_mut(), key) {
                    Action::Quit => break,
                    Action::Refresh => {
                        if !controller.is_active() {
                            // Timer died; bring it back instead of a one-off cycle.
                            outcomes = controller.activate();
                            continue;
                        }
                        controller.refresh().await;
                    }
                    Action::SaveSettings => {
                        // Failures land in the status line.
                        if let Err(e) = controller.save_settings().await {
                            debug!("save_settings: {}", e);
                        }
                    }
                    Action::StartRun => {
                        if let Err(e) = controller.start_run().await {
                            debug!("start_run: {}", e);
                        }
                    }
                    Action::None => {}
                }
            }
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &ViewState, ui: &UiState, api_url: &str) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(7),
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    // Header
    let refreshed = state
        .last_refreshed
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    let date = state.dashboard.as_ref().map(|d| d.date.as_str()).unwrap_or("-");
    let header = Line::from(vec![
        Span::styled(" EasyApply Dashboard ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(" {}  date {}  refreshed {}", api_url, date, refreshed)),
    ]);
    frame.render_widget(Paragraph::new(header), rows[0]);

    // Counter cards
    let card_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(rows[1]);
    for (card, area) in state.cards().iter().zip(card_areas.iter()) {
        let widget = Paragraph::new(card.value.to_string())
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(format!(" {} ", card.label)));
        frame.render_widget(widget, *area);
    }

    // Forms
    let form_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[2]);

    let settings_lines: Vec<Line> = FIELDS
        .iter()
        .filter(|f| f.in_settings())
        .map(|f| field_line(*f, state, ui))
        .collect();
    frame.render_widget(
        Paragraph::new(settings_lines)
            .block(Block::default().borders(Borders::ALL).title(" Account & AI Settings ")),
        form_areas[0],
    );

    let filter_lines: Vec<Line> = FIELDS
        .iter()
        .filter(|f| !f.in_settings())
        .map(|f| field_line(*f, state, ui))
        .collect();
    frame.render_widget(
        Paragraph::new(filter_lines).block(Block::default().borders(Borders::ALL).title(" Filters ")),
        form_areas[1],
    );

    // Recent applications
    let header_row = Row::new(["Role", "Company", "Status", "Notes"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let job_rows: Vec<Row> = state
        .jobs
        .iter()
        .zip(state.job_rows())
        .map(|(job, row)| {
            Row::new(vec![
                Cell::from(row.title),
                Cell::from(row.company),
                Cell::from(row.status).style(status_style(job.status_kind())),
                Cell::from(row.notes),
            ])
        })
        .collect();
    let table = Table::new(
        job_rows,
        [
            Constraint::Percentage(30),
            Constraint::Percentage(20),
            Constraint::Percentage(12),
            Constraint::Percentage(38),
        ],
    )
    .header(header_row)
    .block(Block::default().borders(Borders::ALL).title(format!(
        " Recent Applications ({}) ",
        state.jobs.len()
    )));
    frame.render_widget(table, rows[3]);

    // Status
    let width = rows[4].width.saturating_sub(2).max(10) as usize;
    let mut status_lines: Vec<Line> = Vec::new();
    if let Some(status) = &state.status {
        let style = match status.level {
            StatusLevel::Info => Style::default().fg(Color::Green),
            StatusLevel::Error => Style::default().fg(Color::Red),
        };
        for line in textwrap::wrap(&status.text, width) {
            status_lines.push(Line::from(Span::styled(line.into_owned(), style)));
        }
    }
    if let Some(err) = &state.refresh_error {
        status_lines.push(Line::from(Span::styled(
            format!("Refresh failed: {}", err),
            Style::default().fg(Color::Yellow),
        )));
    }
    frame.render_widget(
        Paragraph::new(status_lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(" Status ")),
        rows[4],
    );

    // Footer help
    let help = Paragraph::new(
        " Tab/Shift-Tab:field  Enter:save settings / start run  Space:toggle remote  Ctrl-R:refresh  Esc:quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[5]);
}

fn field_line<'a>(field: Field, state: &'a ViewState, ui: &UiState) -> Line<'a> {
    let focused = ui.focused() == field;
    let marker = if focused { "> " } else { "  " };
    let label_style = if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let value = match field {
        Field::Email => state.settings.linkedin_email.clone(),
        Field::Password => masked(&state.settings, &state.settings.linkedin_password, true),
        Field::ApiKey => masked(&state.settings, &state.settings.openai_api_key, false),
        Field::Model => state.settings.openai_model.clone(),
        Field::DatabaseUrl => state.settings.database_url.clone(),
        Field::Positions => state.filters.positions.clone(),
        Field::Locations => state.filters.locations.clone(),
        Field::RemoteOnly => if state.filters.remote_only { "[x]" } else { "[ ]" }.to_string(),
    };

    Line::from(vec![
        Span::styled(format!("{}{:<18}", marker, field.label()), label_style),
        Span::raw(value),
    ])
}

/// Typed secrets show as bullets; an empty field only says whether the
/// server has one.
fn masked(form: &SettingsForm, typed: &str, password: bool) -> String {
    if !typed.is_empty() {
        return "•".repeat(typed.chars().count());
    }
    let stored = if password { form.password_stored } else { form.api_key_stored };
    if stored {
        "(stored, type to replace)".to_string()
    } else {
        "(not set)".to_string()
    }
}

fn status_style(kind: JobStatusKind) -> Style {
    match kind {
        JobStatusKind::Applied => Style::default().fg(Color::Green),
        JobStatusKind::Failed => Style::default().fg(Color::Red),
        JobStatusKind::Skipped => Style::default().fg(Color::DarkGray),
        JobStatusKind::Processing => Style::default().fg(Color::Yellow),
        JobStatusKind::Queued => Style::default().fg(Color::Cyan),
        JobStatusKind::Other => Style::default(),
    }
}
