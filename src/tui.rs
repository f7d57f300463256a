use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Sparkline},
};
use std::io::stdout;

use crate::analytics::{self, ColorToken, FunnelSummary, SalaryHistogram, StatusSlice, WeeklyBucket};
use crate::db::Database;
use crate::models::{Application, Status, User};

struct DashboardState {
    user_name: String,
    total: usize,
    funnel: FunnelSummary,
    statuses: Vec<StatusSlice>,
    weekly: Vec<WeeklyBucket>,
    salaries: SalaryHistogram,
}

impl DashboardState {
    fn from_applications(user_name: &str, apps: &[Application]) -> Self {
        Self {
            user_name: user_name.to_string(),
            total: apps.len(),
            funnel: analytics::compute_funnel(apps),
            statuses: analytics::compute_status_distribution(apps),
            weekly: analytics::compute_weekly_volume(apps),
            salaries: analytics::compute_salary_histogram(apps),
        }
    }
}

pub fn run_dashboard(db: &Database, user: &User) -> Result<()> {
    let apps = db.list_applications(user.id, None, "applied_date", true)?;
    if apps.is_empty() {
        println!("No applications yet.");
        return Ok(());
    }

    let mut state = DashboardState::from_applications(&user.name, &apps);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, db, user);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut DashboardState,
    db: &Database,
    user: &User,
) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Char('r') => {
                    let apps = db.list_applications(user.id, None, "applied_date", true)?;
                    *state = DashboardState::from_applications(&user.name, &apps);
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &DashboardState) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(outer[0]);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    frame.render_widget(funnel_panel(state), top[0]);
    frame.render_widget(status_panel(state), top[1]);
    draw_weekly_panel(frame, state, bottom[0]);
    draw_salary_panel(frame, state, bottom[1]);

    let help = Paragraph::new(format!(
        " {} | {} applications | r:reload  q:quit",
        state.user_name, state.total
    ))
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, outer[1]);
}

fn token_color(token: ColorToken) -> Color {
    match token {
        ColorToken::Blue => Color::Blue,
        ColorToken::Accent => Color::Cyan,
        ColorToken::Green => Color::Green,
        ColorToken::Orange => Color::Yellow,
        ColorToken::Purple => Color::Magenta,
    }
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Applied => Color::Cyan,
        Status::PhoneScreen => Color::Yellow,
        Status::Technical => Color::Green,
        Status::FinalRound => Color::Magenta,
        Status::Offer => Color::LightGreen,
        Status::Rejected => Color::Red,
    }
}

fn bar_line(label: &str, count: usize, max: usize, color: Color) -> Line<'static> {
    let width = if max == 0 { 0 } else { count * 24 / max };
    Line::from(vec![
        Span::raw(format!("{:<14} {:>4} ", label, count)),
        Span::styled("█".repeat(width), Style::default().fg(color)),
    ])
}

fn funnel_panel(state: &DashboardState) -> Paragraph<'static> {
    let max = state.funnel.stages.iter().map(|s| s.count).max().unwrap_or(0);
    let lines: Vec<Line> = state
        .funnel
        .stages
        .iter()
        .map(|stage| bar_line(stage.label, stage.count, max, token_color(stage.color)))
        .collect();

    Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(format!(
        " Funnel ({}% interview rate, {} rejected) ",
        state.funnel.interview_rate, state.funnel.rejected_count
    )))
}

fn status_panel(state: &DashboardState) -> Paragraph<'static> {
    let max = state.statuses.iter().map(|s| s.count).max().unwrap_or(0);
    let lines: Vec<Line> = state
        .statuses
        .iter()
        .map(|slice| bar_line(slice.label, slice.count, max, status_color(slice.status)))
        .collect();

    Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Status ({} total) ", state.total)),
    )
}

fn draw_weekly_panel(frame: &mut Frame, state: &DashboardState, area: Rect) {
    let title = match (state.weekly.first(), state.weekly.last()) {
        (Some(first), Some(last)) => format!(
            " Applications / Week ({} .. {}) ",
            first.week_start, last.week_start
        ),
        _ => " Applications / Week ".to_string(),
    };
    let data: Vec<u64> = state.weekly.iter().map(|w| w.count as u64).collect();

    let sparkline = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(&data)
        .style(Style::default().fg(Color::Cyan));
    frame.render_widget(sparkline, area);
}

fn draw_salary_panel(frame: &mut Frame, state: &DashboardState, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(format!(
        " Salary Distribution (avg ${}k) ",
        (state.salaries.average / 1000.0).round() as i64
    ));

    if state.salaries.bins.is_empty() {
        let empty = Paragraph::new("No salary data")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let bars: Vec<Bar> = state
        .salaries
        .bins
        .iter()
        .map(|bin| {
            Bar::default()
                .label(Line::from(bin.range_label.clone()))
                .value(bin.count as u64)
                .style(Style::default().fg(Color::Cyan))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .bar_width(9)
        .bar_gap(1)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}
