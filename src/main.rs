use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use rusqlite::Connection;

use tt_scoreboard::config::AppConfig;
use tt_scoreboard::engine::Phase;
use tt_scoreboard::persist::{self, Settings};
use tt_scoreboard::rules::{Player, Side};
use tt_scoreboard::snapshot::ScoreboardView;
use tt_scoreboard::state::{
    AppState, Delta, Effect, MenuItem, Screen, SettingsField, apply_delta,
};
use tt_scoreboard::telemetry::{self, TelemetryFrame};
use tt_scoreboard::{match_db, remote};

struct App {
    state: AppState,
    config: AppConfig,
    should_quit: bool,
    match_path: Option<PathBuf>,
    settings_path: Option<PathBuf>,
    db: Option<Connection>,
    telemetry_tx: Option<mpsc::Sender<TelemetryFrame>>,
    mirrored: Option<(String, usize)>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        let settings_path = persist::settings_path();
        let settings = settings_path
            .as_deref()
            .and_then(persist::load_settings_from)
            .unwrap_or_else(|| Settings {
                player1_name: config.player1_name.clone(),
                player2_name: config.player2_name.clone(),
                ..Settings::default()
            });
        let state = AppState::new(&config, settings);
        Self {
            state,
            config,
            should_quit: false,
            match_path: persist::match_path(),
            settings_path,
            db: None,
            telemetry_tx: None,
            mirrored: None,
        }
    }

    fn open_db(&mut self) {
        let Some(path) = self
            .config
            .db_path
            .clone()
            .or_else(match_db::default_db_path)
        else {
            self.state.push_log("[INFO] No match history database path");
            return;
        };
        match match_db::open_db(&path) {
            Ok(conn) => self.db = Some(conn),
            Err(err) => self.state.push_log(format!("[WARN] Match history disabled: {err:#}")),
        }
    }

    fn resume_saved_match(&mut self) {
        let Some(record) = self.match_path.as_deref().and_then(persist::load_match_from) else {
            return;
        };
        self.state.resume(&record);
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.help_overlay {
            self.state.help_overlay = false;
            return;
        }
        match self.state.screen {
            Screen::Menu => self.on_menu_key(key),
            Screen::Settings => self.on_settings_key(key),
            Screen::Match => self.on_match_key(key),
        }
    }

    fn on_menu_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = true,
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('1') => self.state.screen = Screen::Match,
            KeyCode::Char('2') => self.state.screen = Screen::Settings,
            KeyCode::Enter => {
                self.state.screen = match self.state.selected_menu_item() {
                    MenuItem::TableTennis => Screen::Match,
                    MenuItem::Settings => Screen::Settings,
                };
            }
            _ => {}
        }
    }

    fn on_settings_key(&mut self, key: KeyEvent) {
        if self.state.editing_name {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.state.activate_settings_field(),
                KeyCode::Backspace => self.state.edit_name(None),
                KeyCode::Char(c) => self.state.edit_name(Some(c)),
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('b') | KeyCode::Esc => self.state.screen = Screen::Menu,
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Enter | KeyCode::Char(' ') => self.state.activate_settings_field(),
            _ => {}
        }
    }

    fn on_match_key(&mut self, key: KeyEvent) {
        match self.state.engine.phase() {
            Phase::AwaitingFirstServer => match key.code {
                KeyCode::Char('1') => {
                    self.state.choose_first_server(Player::One);
                }
                KeyCode::Char('2') => {
                    self.state.choose_first_server(Player::Two);
                }
                KeyCode::Char('b') | KeyCode::Esc => self.state.screen = Screen::Menu,
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            },
            Phase::InProgress => match key.code {
                KeyCode::Left => {
                    self.state.add_point(Side::Left);
                }
                KeyCode::Right => {
                    self.state.add_point(Side::Right);
                }
                KeyCode::Down | KeyCode::Backspace => {
                    self.state.remove_point();
                }
                KeyCode::Char('b') | KeyCode::Esc => self.state.screen = Screen::Menu,
                KeyCode::Char('?') => self.state.help_overlay = true,
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            },
            Phase::MatchComplete => match key.code {
                KeyCode::Enter | KeyCode::Esc | KeyCode::Char('b') => {
                    self.state.reset_match();
                    self.state.screen = Screen::Menu;
                }
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            },
        }
    }

    /// Performs the I/O requested by state changes. Failures are logged; match state is untouched.
    fn run_effects(&mut self) {
        for effect in self.state.take_effects() {
            match effect {
                Effect::Persist(snapshot) => {
                    self.mirror_to_db(&snapshot.record);
                    if let Some(tx) = &self.telemetry_tx {
                        let _ = tx.send(TelemetryFrame {
                            session: snapshot.record.session.clone(),
                            view: snapshot.view.clone(),
                        });
                    }
                    let Some(path) = self.match_path.clone() else {
                        continue;
                    };
                    let res = if snapshot.view.phase == Phase::MatchComplete {
                        persist::clear_match_at(&path)
                    } else {
                        persist::save_match_to(&path, &snapshot.record)
                    };
                    if let Err(err) = res {
                        self.state.push_log(format!("[WARN] Match save failed: {err:#}"));
                    }
                }
                Effect::ClearSavedMatch => {
                    self.mirrored = None;
                    if let Some(path) = &self.match_path
                        && let Err(err) = persist::clear_match_at(path)
                    {
                        self.state.push_log(format!("[WARN] Match clear failed: {err:#}"));
                    }
                }
                Effect::SaveSettings(settings) => {
                    if let Some(path) = &self.settings_path
                        && let Err(err) = persist::save_settings_to(path, &settings)
                    {
                        self.state.push_log(format!("[WARN] Settings save failed: {err:#}"));
                    }
                }
            }
        }
    }

    fn mirror_to_db(&mut self, record: &tt_scoreboard::reconstruct::MatchRecord) {
        let key = (record.session.clone(), record.completed_sets.len());
        if self.mirrored.as_ref() == Some(&key) {
            return;
        }
        let seen_session = self
            .mirrored
            .as_ref()
            .is_some_and(|(session, _)| session == &record.session);
        if record.completed_sets.is_empty() && !seen_session {
            return;
        }
        let Some(conn) = self.db.as_mut() else {
            return;
        };
        let res = match_db::record_match(
            conn,
            record,
            &self.config.rules,
            &self.state.settings.player1_name,
            &self.state.settings.player2_name,
        );
        match res {
            Ok(()) => self.mirrored = Some(key),
            Err(err) => self.state.push_log(format!("[WARN] Match history write failed: {err:#}")),
        }
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let config = AppConfig::from_env();

    let (tx, rx) = mpsc::channel();
    let mut app = App::new(config.clone());
    app.open_db();

    if let Some(addr) = config.remote_listen.as_deref()
        && let Err(err) = remote::spawn_remote_listener(addr, config.topic_prefix.clone(), tx.clone())
    {
        app.state.push_log(format!("[WARN] Remote control disabled: {err:#}"));
    }
    if let Some(url) = config.telemetry_url.clone() {
        let (frame_tx, frame_rx) = mpsc::channel();
        telemetry::spawn_telemetry_publisher(
            url,
            config.topic_prefix.clone(),
            config.telemetry_interval,
            frame_rx,
            tx.clone(),
        );
        app.telemetry_tx = Some(frame_tx);
    }
    app.resume_saved_match();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        // Remote commands and keys are both drained here, one at a time.
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }
        app.run_effects();

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
            app.run_effects();
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::Menu => render_menu(frame, chunks[1], &app.state),
        Screen::Settings => render_settings(frame, chunks[1], &app.state),
        Screen::Match => render_match(frame, chunks[1], &app.state),
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::TOP))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(&app.state));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    match state.screen {
        Screen::Menu => "TABLE TENNIS SCOREBOARD".to_string(),
        Screen::Settings => "TABLE TENNIS SCOREBOARD | Settings".to_string(),
        Screen::Match => {
            let view = state.view();
            format!(
                "TABLE TENNIS SCOREBOARD | Set {} | Session {}",
                view.set_number,
                state.engine.session().as_str()
            )
        }
    }
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Menu => "j/k/↑/↓ Move | Enter Select | 1 Match | 2 Settings | ? Help | q Quit".to_string(),
        Screen::Settings if state.editing_name => "Type name | Backspace Delete | Enter/Esc Done".to_string(),
        Screen::Settings => "j/k/↑/↓ Move | Enter/Space Toggle or Edit | b/Esc Back | q Quit".to_string(),
        Screen::Match => match state.engine.phase() {
            Phase::AwaitingFirstServer => "1/2 First server | b/Esc Back | q Quit".to_string(),
            Phase::InProgress => "← Point left | → Point right | ↓/Backspace Undo | b/Esc Menu | ? Help | q Quit".to_string(),
            Phase::MatchComplete => "Enter/Esc New match | q Quit".to_string(),
        },
    }
}

fn render_menu(frame: &mut Frame, area: Rect, state: &AppState) {
    let mut lines = vec!["Choose a game".to_string(), String::new()];
    for (idx, item) in MenuItem::ALL.iter().enumerate() {
        let label = match item {
            MenuItem::TableTennis => "Table tennis",
            MenuItem::Settings => "Settings",
        };
        let marker = if idx == state.menu_selected { ">" } else { " " };
        lines.push(format!("{marker} {}. {label}", idx + 1));
    }
    let menu = Paragraph::new(lines.join("\n")).alignment(Alignment::Center);
    frame.render_widget(menu, centered_rect(50, 40, area));
}

fn render_settings(frame: &mut Frame, area: Rect, state: &AppState) {
    let on_off = |b: bool| if b { "ON" } else { "OFF" };
    let mut lines = Vec::new();
    for (idx, field) in SettingsField::ALL.iter().enumerate() {
        let value = match field {
            SettingsField::ChangeSides => format!(
                "Change sides after each set: {}",
                on_off(state.settings.change_sides)
            ),
            SettingsField::ChangeSidesAnim => format!(
                "Announce side change: {}",
                on_off(state.settings.change_sides_anim)
            ),
            SettingsField::Player1Name => format!("Player 1 name: {}", state.settings.player1_name),
            SettingsField::Player2Name => format!("Player 2 name: {}", state.settings.player2_name),
        };
        let selected = idx == state.settings_selected;
        let marker = match (selected, state.editing_name) {
            (true, true) => "*",
            (true, false) => ">",
            _ => " ",
        };
        lines.push(format!("{marker} {value}"));
    }
    let block = Block::default().title("Settings").borders(Borders::ALL);
    frame.render_widget(
        Paragraph::new(lines.join("\n")).block(block),
        centered_rect(60, 50, area),
    );
}

fn render_match(frame: &mut Frame, area: Rect, state: &AppState) {
    let view = state.view();
    match view.phase {
        Phase::AwaitingFirstServer => {
            let text = format!(
                "Who serves first?\n\n1. {}    2. {}",
                state.player_name(Player::One),
                state.player_name(Player::Two)
            );
            frame.render_widget(
                Paragraph::new(text).alignment(Alignment::Center),
                centered_rect(60, 30, area),
            );
        }
        Phase::MatchComplete => render_winner(frame, area, state, &view),
        Phase::InProgress => render_scoreboard(frame, area, state, &view),
    }
}

fn render_scoreboard(frame: &mut Frame, area: Rect, state: &AppState, view: &ScoreboardView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);
    let halves = |r: Rect| {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(r)
    };

    let names = halves(rows[0]);
    let label = |player: Player, sets: usize| format!("{} [{}]", state.player_name(player), sets);
    frame.render_widget(
        Paragraph::new(label(view.left_player, view.left_sets)),
        names[0],
    );
    frame.render_widget(
        Paragraph::new(label(view.right_player, view.right_sets)).alignment(Alignment::Right),
        names[1],
    );

    let points = halves(rows[1]);
    let big = Style::default().add_modifier(Modifier::BOLD);
    for (col, (pts, side)) in [(view.left_points, Side::Left), (view.right_points, Side::Right)]
        .into_iter()
        .enumerate()
    {
        let serving = view.server_side == Some(side);
        let mut text = format!("{pts}");
        if serving {
            let dots = if view.single_point_service {
                "●".to_string()
            } else {
                "●".repeat(view.serves_remaining as usize)
            };
            text = format!("{text}\n\n{dots}");
        }
        let mut block = Block::default().borders(Borders::ALL);
        if serving {
            block = block.title("Serve").border_style(Style::default().fg(Color::Yellow));
        }
        frame.render_widget(
            Paragraph::new(text)
                .style(big)
                .alignment(Alignment::Center)
                .block(block),
            points[col],
        );
    }

    let mut status = Vec::new();
    if view.is_final_set {
        status.push("FINAL SET".to_string());
    }
    if view.is_deuce {
        status.push("DEUCE".to_string());
    }
    if state.swap_banner_active(Instant::now()) {
        status.push("SIDES CHANGED".to_string());
    }
    frame.render_widget(
        Paragraph::new(status.join("  ")).alignment(Alignment::Center),
        rows[2],
    );

    frame.render_widget(
        Paragraph::new(set_scores_text(view))
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray)),
        rows[3],
    );
}

fn render_winner(frame: &mut Frame, area: Rect, state: &AppState, view: &ScoreboardView) {
    let winner = view
        .winner
        .map(|p| state.player_name(p).to_string())
        .unwrap_or_default();
    let history = state.engine.state().history();
    let summary = history
        .results()
        .map(|r| format!("{}-{}", r.player1, r.player2))
        .collect::<Vec<_>>()
        .join("   ");
    let text = format!(
        "{winner} wins!\n\nMatch summary ({} vs {})\n{summary}",
        state.player_name(Player::One),
        state.player_name(Player::Two)
    );
    frame.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        centered_rect(70, 50, area),
    );
}

fn set_scores_text(view: &ScoreboardView) -> String {
    view.set_scores
        .iter()
        .map(|slot| match slot {
            Some(s) => format!("{} : {}", s.left, s.right),
            None => "- : -".to_string(),
        })
        .collect::<Vec<_>>()
        .join("   ")
}

fn console_text(state: &AppState) -> String {
    state
        .logs
        .iter()
        .rev()
        .take(4)
        .rev()
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Table Tennis Scoreboard - Help",
        "",
        "Match:",
        "  1 / 2        Choose first server",
        "  ←            Point for the left side",
        "  →            Point for the right side",
        "  ↓ / Bksp     Undo last point (reopens the previous set)",
        "  b / Esc      Back to menu (match keeps running)",
        "",
        "Best of five. Sets to 11, deciding set to the configured",
        "final-set target, always by two clear points.",
        "",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
