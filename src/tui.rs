use crate::engine::{EngineState, SessionEngine};
use crate::models::{Mode, Profile, Session};
use crate::stats::calculate_stats;
use crate::storage::ProfileStore;
use crate::utils::format_duration;
use anyhow::Result;
use chrono::{DateTime, Duration, Local, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use rand::Rng;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration as StdDuration;

const MAX_WAIT: StdDuration = StdDuration::from_millis(250);

pub fn run_tui<S: ProfileStore, R: Rng>(
    engine: &mut SessionEngine<S, R>,
    recent: usize,
) -> Result<()> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_loop(&mut terminal, engine, recent);
    finish(engine, Utc::now());

    // restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    res
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn mode_for_key(code: KeyCode) -> Option<Mode> {
    match code {
        KeyCode::Char('1') | KeyCode::Char('w') => Some(Mode::Work),
        KeyCode::Char('2') | KeyCode::Char('p') => Some(Mode::Play),
        KeyCode::Char('3') | KeyCode::Char('r') => Some(Mode::Rest),
        KeyCode::Char('4') | KeyCode::Char('s') => Some(Mode::Sleep),
        _ => None,
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn handle_key<S: ProfileStore, R: Rng>(
    engine: &mut SessionEngine<S, R>,
    key: KeyEvent,
    now: DateTime<Utc>,
) -> Result<Flow> {
    if key.kind != KeyEventKind::Press {
        return Ok(Flow::Continue);
    }
    if is_quit(&key) {
        return Ok(Flow::Quit);
    }

    match (engine.state(), key.code) {
        (EngineState::Active, KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Esc) => {
            engine.stop(now)?;
        }
        (EngineState::Idle, code) => {
            if let Some(mode) = mode_for_key(code) {
                engine.start(mode, now)?;
            }
        }
        _ => {}
    }
    Ok(Flow::Continue)
}

/// Records the run still in progress when the UI goes away, however it exits.
fn finish<S: ProfileStore, R: Rng>(
    engine: &mut SessionEngine<S, R>,
    now: DateTime<Utc>,
) -> Option<Session> {
    if engine.state() != EngineState::Active {
        return None;
    }
    engine.stop(now).ok()
}

// Input and ticks are handled on this one loop, so the engine sees them in order.
fn run_loop<S: ProfileStore, R: Rng>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    engine: &mut SessionEngine<S, R>,
    recent: usize,
) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, engine, recent))?;

        let wait = engine
            .until_next_tick(Utc::now())
            .map_or(MAX_WAIT, |d| d.min(MAX_WAIT));

        if event::poll(wait)? {
            if let Event::Key(key) = event::read()? {
                if handle_key(engine, key, Utc::now())? == Flow::Quit {
                    return Ok(());
                }
            }
        }

        engine.poll(Utc::now());
    }
}

pub fn draw<S: ProfileStore, R: Rng>(
    frame: &mut Frame,
    engine: &SessionEngine<S, R>,
    recent: usize,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Header
            Constraint::Length(10), // Session
            Constraint::Min(0),     // Profile + chart
            Constraint::Length(3),  // Footer
        ])
        .split(frame.size());

    draw_header(frame, chunks[0], engine);
    match engine.state() {
        EngineState::Idle => draw_mode_picker(frame, chunks[1]),
        EngineState::Active => draw_active(frame, chunks[1], engine),
    }

    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[2]);
    draw_profile(frame, lower[0], engine.profile(), recent);
    draw_chart(frame, lower[1], engine.profile());

    draw_footer(frame, chunks[3], engine);
}

fn draw_header<S: ProfileStore, R: Rng>(
    frame: &mut Frame,
    area: Rect,
    engine: &SessionEngine<S, R>,
) {
    let status_text = match engine.current_mode() {
        Some(mode) => Span::styled(
            format!("FOCUSING: {}", mode.label().to_uppercase()),
            Style::default()
                .fg(mode_color(mode))
                .add_modifier(Modifier::BOLD),
        ),
        None => Span::styled(
            "READY",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
    };

    let header_content = Line::from(vec![
        Span::styled(
            " Fogo ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        status_text,
        Span::raw(" | "),
        Span::raw(Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        Span::raw(" | Points: "),
        Span::styled(
            engine.profile().total_points.to_string(),
            Style::default().fg(Color::Magenta),
        ),
    ]);

    let header = Paragraph::new(header_content).block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn mode_color(mode: Mode) -> Color {
    match mode {
        Mode::Work => Color::Blue,
        Mode::Play => Color::Green,
        Mode::Rest => Color::Yellow,
        Mode::Sleep => Color::Magenta,
    }
}

fn draw_mode_picker(frame: &mut Frame, area: Rect) {
    let mut lines = vec![
        Line::styled(
            "Select Focus Mode",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Line::raw("Choose a mode to start focusing"),
        Line::raw(""),
    ];
    for (i, mode) in Mode::ALL.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::raw(format!("  [{}] ", i + 1)),
            Span::styled(
                mode.label(),
                Style::default()
                    .fg(mode_color(*mode))
                    .add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    let block = Block::default().title(" START ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_active<S: ProfileStore, R: Rng>(
    frame: &mut Frame,
    area: Rect,
    engine: &SessionEngine<S, R>,
) {
    let mode = engine.current_mode();
    let color = mode.map_or(Color::White, mode_color);
    let glyphs: Vec<&str> = engine.badges().iter().map(|b| b.emoji.as_str()).collect();

    let lines = vec![
        Line::styled(
            mode.map_or("", |m| m.label()).to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Line::raw(""),
        Line::styled(
            engine.formatted_elapsed(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Line::raw(""),
        Line::raw(format!("{} Points", engine.points())),
        Line::raw(glyphs.join(" ")),
        Line::raw(""),
        Line::styled(
            "Press Enter to stop focusing",
            Style::default().fg(Color::DarkGray),
        ),
    ];

    let block = Block::default().title(" SESSION ").borders(Borders::ALL);
    let para = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center);
    frame.render_widget(para, area);
}

fn draw_profile(frame: &mut Frame, area: Rect, profile: &Profile, recent: usize) {
    let name = if profile.name.is_empty() {
        "Your Name"
    } else {
        profile.name.as_str()
    };
    let photo = match &profile.image_data {
        Some(bytes) => format!("photo: {} bytes", bytes.len()),
        None => "no photo".to_string(),
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format!("  {}", name),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  ({})", photo), Style::default().fg(Color::DarkGray)),
        ]),
        Line::raw(format!(
            "  Total Points: {}   Total Badges: {}",
            profile.total_points,
            profile.badges.len()
        )),
        Line::raw(""),
        Line::styled("  Your Badges", Style::default().add_modifier(Modifier::BOLD)),
    ];

    let glyphs: Vec<&str> = profile.badges.iter().map(|b| b.emoji.as_str()).collect();
    lines.push(Line::raw(format!("  {}", glyphs.join(" "))));
    lines.push(Line::raw(""));
    lines.push(Line::styled(
        "  Recent Sessions",
        Style::default().add_modifier(Modifier::BOLD),
    ));

    for session in profile.recent_sessions(recent) {
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {:<6}", session.mode.label()),
                Style::default().fg(mode_color(session.mode)),
            ),
            Span::raw(format!(
                " {:>8}  {:>3} points  {}",
                session.formatted_duration(),
                session.points,
                session.start_time.with_timezone(&Local).format("%H:%M")
            )),
        ]));
    }

    let block = Block::default()
        .title(Span::styled(
            " PROFILE ",
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL);
    let para = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(para, area);
}

fn draw_chart(frame: &mut Frame, area: Rect, profile: &Profile) {
    let stats = calculate_stats(profile, Local::now().date_naive());

    let chart_block = Block::default()
        .title(format!(
            " Focus - Current Week ({}) ",
            format_duration(stats.week_summary.total_focus.num_seconds())
        ))
        .borders(Borders::ALL);
    let inner_area = chart_block.inner(area);
    frame.render_widget(chart_block, area);

    if inner_area.height < 2 || inner_area.width < 14 {
        return;
    }

    let mut days_data = Vec::new();
    let mut max_total_secs = 1;

    for i in 0..7 {
        let date = stats.week_start + Duration::days(i);
        let day_stats = stats.daily_stats.get(&date).cloned().unwrap_or_default();
        let focus_secs = day_stats.total_focus.num_seconds();
        if focus_secs > max_total_secs {
            max_total_secs = focus_secs;
        }
        days_data.push((date.format("%a").to_string(), focus_secs));
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 7); 7])
        .split(inner_area);

    for (i, (label, focus)) in days_data.into_iter().enumerate() {
        let col_area = columns[i];

        let bar_label_split = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(col_area);

        let bar_area = bar_label_split[0];
        let label_area = bar_label_split[1];

        // Center the bar horizontally within the column
        let bar_width = 3.min(bar_area.width);
        let bar_x_offset = (bar_area.width - bar_width) / 2;
        let centered_bar_area = Rect::new(
            bar_area.x + bar_x_offset,
            bar_area.y,
            bar_width,
            bar_area.height,
        );

        frame.render_widget(
            Paragraph::new(label).alignment(Alignment::Center),
            label_area,
        );

        if centered_bar_area.height > 0 {
            let total_height = centered_bar_area.height as i64;
            let focus_height = (focus * total_height / max_total_secs) as u16;
            let remaining_height = centered_bar_area.height.saturating_sub(focus_height);

            let bar_chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(remaining_height),
                    Constraint::Length(focus_height),
                ])
                .split(centered_bar_area);

            if focus_height > 0 {
                frame.render_widget(Block::default().bg(Color::Green), bar_chunks[1]);
            }
        }
    }
}

fn draw_footer<S: ProfileStore, R: Rng>(
    frame: &mut Frame,
    area: Rect,
    engine: &SessionEngine<S, R>,
) {
    let help = match engine.state() {
        EngineState::Idle => "1-4 or w/p/r/s to start | 'q' to quit",
        EngineState::Active => "Enter to stop | 'q' to stop and quit",
    };

    let line = match engine.last_save_error() {
        Some(err) => Line::from(vec![
            Span::raw(help),
            Span::raw(" | "),
            Span::styled(
                format!("not saved: {}", err),
                Style::default().fg(Color::Red),
            ),
        ]),
        None => Line::raw(help),
    };

    let footer = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(footer, area);
}
