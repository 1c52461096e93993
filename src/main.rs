use ansi_term::Colour;
use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Gauge, Paragraph, Row, Table},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use flexsleep::config::{Config, SourceConfig};
use flexsleep::data::{DaySummary, ManualEntry, ScoreColor, SleepStage, StageDuration};
use flexsleep::logging;
use flexsleep::service::{ImportOutcome, SleepService};
use flexsleep::stats::{format_duration, format_percentage, hours};

const HISTORY_DAYS: u32 = 7;

#[derive(Parser)]
#[command(name = "flexsleep")]
#[command(about = "Sleep-stage logging and sleep scoring for the terminal")]
#[command(version)]
struct Cli {
    /// Directory holding the sleep records (overrides FLEXSLEEP_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Health-data export file to import from (overrides FLEXSLEEP_HEALTH_EXPORT)
    #[arg(long, global = true)]
    export: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Record a night's sleep by hand, e.g. `log --deep 1h10m --core 4h --rem 1h30m`
    Log {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_parser = parse_stage_duration, default_value = "0m")]
        deep: StageDuration,
        #[arg(long, value_parser = parse_stage_duration, default_value = "0m")]
        core: StageDuration,
        #[arg(long, value_parser = parse_stage_duration, default_value = "0m")]
        rem: StageDuration,
    },
    /// Import stage samples from the configured health source
    Import {
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Import this many days ending on --date
        #[arg(long, default_value_t = 1)]
        days: u32,
    },
    /// Print one day's record, breakdown and score
    Show {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Remove the record for a day
    Delete {
        #[arg(long)]
        date: NaiveDate,
    },
    /// Scores for the trailing days
    History {
        #[arg(long, default_value_t = HISTORY_DAYS)]
        days: u32,
        #[arg(long)]
        json: bool,
    },
    /// Interactive dashboard (default)
    Dashboard {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Accepts `1h30m`, `4h`, `45m` and `0`.
fn parse_stage_duration(input: &str) -> Result<StageDuration, String> {
    let s = input.trim().to_ascii_lowercase();
    if s == "0" {
        return Ok(StageDuration::default());
    }

    let number = |part: &str| -> Result<u32, String> {
        part.parse::<u32>()
            .map_err(|_| format!("invalid duration '{}': expected e.g. 1h30m, 4h or 45m", input))
    };

    let (hours, rest) = match s.split_once('h') {
        Some((h, rest)) => (number(h)?, rest),
        None => (0, s.as_str()),
    };
    let minutes = match rest {
        "" if s.contains('h') => 0,
        _ => match rest.strip_suffix('m') {
            Some(m) => number(m)?,
            None => return Err(format!("invalid duration '{}': missing 'h' or 'm' unit", input)),
        },
    };
    Ok(StageDuration::new(hours, minutes))
}

struct App {
    service: SleepService,
    source_name: &'static str,
    date: NaiveDate,
    summary: Option<DaySummary>,
    history: Vec<DaySummary>,
    error_message: Option<String>,
}

impl App {
    fn new(service: SleepService, source_name: &'static str, date: NaiveDate) -> Self {
        Self {
            service,
            source_name,
            date,
            summary: None,
            history: Vec::new(),
            error_message: None,
        }
    }

    async fn load_data(&mut self) -> Result<()> {
        match self.service.load_day(self.date).await {
            Ok(summary) => {
                self.summary = Some(summary);
                self.error_message = None;
            }
            Err(e) => {
                self.error_message = Some(format!("Error: {}", e));
            }
        }
        match self.service.history(self.date, HISTORY_DAYS).await {
            Ok(history) => self.history = history,
            Err(e) => self.error_message = Some(format!("Error: {}", e)),
        }
        Ok(())
    }

    async fn import_day(&mut self) -> Result<()> {
        match self.service.import(self.date).await {
            Ok(ImportOutcome::Imported(_)) => self.load_data().await?,
            Ok(ImportOutcome::NoData) => {
                self.error_message = Some(format!("No sleep samples for {}", self.date));
            }
            Err(e) => {
                self.error_message = Some(format!("Import failed: {}", e));
            }
        }
        Ok(())
    }

    async fn shift_day(&mut self, forward: bool) -> Result<()> {
        let next = if forward {
            self.date.checked_add_days(Days::new(1))
        } else {
            self.date.checked_sub_days(Days::new(1))
        };
        if let Some(date) = next {
            self.date = date;
            self.load_data().await?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load();
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = Some(dir);
    }
    if let Some(export) = cli.export.clone() {
        config.source = SourceConfig::ExportFile(export);
    }

    let data_dir = config.data_dir()?;
    let interactive = matches!(cli.command, None | Some(Command::Dashboard { .. }));
    if interactive || !cli.verbose {
        logging::init_file(&data_dir, &config.log_filter)?;
    } else {
        logging::init_stderr(&config.log_filter)?;
    }

    let source = config.open_source()?;
    let source_name = source.as_ref().map(|s| s.name()).unwrap_or("none");
    let service = SleepService::new(Arc::new(config.open_store()?), source);

    match cli.command {
        Some(Command::Log {
            date,
            deep,
            core,
            rem,
        }) => {
            let entry = ManualEntry { deep, core, rem };
            let summary = service.log_manual(date.unwrap_or_else(today), &entry).await?;
            print_summary(&summary);
        }
        Some(Command::Import { date, days }) => {
            run_import(&service, date.unwrap_or_else(today), days).await?;
        }
        Some(Command::Show { date, json }) => {
            let summary = service.load_day(date.unwrap_or_else(today)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Some(Command::Delete { date }) => {
            if service.delete(date).await? {
                println!("Deleted sleep record for {}", date);
            } else {
                println!("No sleep record for {}", date);
            }
        }
        Some(Command::History { days, json }) => {
            let history = service.history(today(), days).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                print_history(&history);
            }
        }
        Some(Command::Dashboard { date }) => {
            run_dashboard(App::new(service, source_name, date.unwrap_or_else(today))).await?;
        }
        None => {
            run_dashboard(App::new(service, source_name, today())).await?;
        }
    }

    Ok(())
}

async fn run_import(service: &SleepService, end: NaiveDate, days: u32) -> Result<()> {
    if !service.has_source() {
        anyhow::bail!(
            "No health source configured. Set FLEXSLEEP_HEALTH_EXPORT, FLEXSLEEP_HEALTH_URL or pass --export"
        );
    }

    let mut failures = 0;
    for (date, result) in service.import_range(end, days.max(1)).await {
        match result {
            Ok(ImportOutcome::Imported(record)) => {
                println!(
                    "{}  imported {}",
                    date,
                    format_duration(record.total_sleep_seconds)
                );
            }
            Ok(ImportOutcome::NoData) => println!("{}  no samples", date),
            Err(e) => {
                failures += 1;
                eprintln!("{}  {}", date, Colour::Red.paint(e.to_string()));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} day(s) failed to import", failures);
    }
    Ok(())
}

// ── Plain output ────────────────────────────────────────

fn paint(color: ScoreColor, text: &str) -> String {
    let colour = match color {
        ScoreColor::Gray => Colour::Fixed(245),
        ScoreColor::Red => Colour::Red,
        ScoreColor::Orange => Colour::Fixed(208),
        ScoreColor::Yellow => Colour::Yellow,
        ScoreColor::Mint => Colour::Fixed(121),
        ScoreColor::Green => Colour::Green,
    };
    colour.bold().paint(text).to_string()
}

fn print_summary(summary: &DaySummary) {
    println!("Sleep for {}", summary.date.format("%a %d %b %Y"));

    let Some(record) = &summary.record else {
        println!("  {}", paint(summary.score.color, "No Data"));
        return;
    };

    println!(
        "  Score: {}",
        paint(
            summary.score.color,
            &format!("{} {}", summary.score.score, summary.score.label)
        )
    );
    println!("  Total: {}", format_duration(record.total_sleep_seconds));
    for row in &summary.breakdown {
        println!(
            "    {:<11} {:>8}  {:>4}  {}",
            row.stage.display_name(),
            format_duration(row.duration_seconds),
            format_percentage(row.percentage),
            create_horizontal_bar(row.percentage, 100.0, 20)
        );
    }
}

fn print_history(history: &[DaySummary]) {
    println!("{:<12} {:>8}  {:<22} {}", "Date", "Total", "Graph", "Score");
    for day in history {
        let total = day.record.map(|r| r.total_sleep_seconds).unwrap_or(0);
        println!(
            "{:<12} {:>8}  {:<22} {}",
            day.date.to_string(),
            format_duration(total),
            create_horizontal_bar(hours(total), 10.0, 20),
            paint(day.score.color, &format!("{:>3} {}", day.score.score, day.score.label))
        );
    }
}

// ── Dashboard ───────────────────────────────────────────

async fn run_dashboard(mut app: App) -> Result<()> {
    app.load_data().await?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res.context("Dashboard exited with an error")
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let mut last_tick = std::time::Instant::now();
    let tick_rate = std::time::Duration::from_millis(250);

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| std::time::Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if app.error_message.is_some() && !matches!(key.code, KeyCode::Char('q')) {
                    app.error_message = None;
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Left | KeyCode::Char('h') => app.shift_day(false).await?,
                    KeyCode::Right | KeyCode::Char('l') => app.shift_day(true).await?,
                    KeyCode::Char('t') => {
                        app.date = today();
                        app.load_data().await?;
                    }
                    KeyCode::Char('i') => app.import_day().await?,
                    KeyCode::Char('r') => app.load_data().await?,
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = std::time::Instant::now();
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),  // Header
            Constraint::Length(2),  // Date line
            Constraint::Min(10),    // Main content
            Constraint::Length(1),  // Footer
        ])
        .split(size);

    let header = Paragraph::new("SLEEP DASHBOARD")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(ratatui::widgets::BorderType::Rounded),
        );
    f.render_widget(header, chunks[0]);

    let date_line = Paragraph::new(format!(
        "  {}  |  Source: {}",
        app.date.format("%A %d %B %Y"),
        app.source_name
    ))
    .style(Style::default().fg(Color::Gray));
    f.render_widget(date_line, chunks[1]);

    if let Some(summary) = &app.summary {
        render_main_content(f, chunks[2], summary, &app.history);
    }

    let footer = Paragraph::new("[←/→] Day  |  [t] Today  |  [i] Import  |  [r] Reload  |  [q] Quit")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(footer, chunks[3]);

    if let Some(error) = &app.error_message {
        let error_widget = Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            );
        let area = centered_rect(60, 20, size);
        f.render_widget(Clear, area);
        f.render_widget(error_widget, area);
    }
}

fn render_main_content(f: &mut Frame, area: Rect, summary: &DaySummary, history: &[DaySummary]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),  // Score
            Constraint::Length(7),  // Stages
            Constraint::Min(6),     // History
        ])
        .split(area);

    render_score(f, chunks[0], summary);
    render_stages(f, chunks[1], summary);
    render_history(f, chunks[2], history);
}

fn render_score(f: &mut Frame, area: Rect, summary: &DaySummary) {
    let total = summary
        .record
        .map(|r| format_duration(r.total_sleep_seconds))
        .unwrap_or_else(|| "-".to_string());

    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(format!(" Sleep Score  |  Total {} ", total))
                .borders(Borders::ALL)
                .border_type(ratatui::widgets::BorderType::Rounded),
        )
        .gauge_style(Style::default().fg(score_color(summary.score.color)))
        .percent(u16::from(summary.score.score.min(100)))
        .label(format!("{}  {}", summary.score.score, summary.score.label));
    f.render_widget(gauge, area);
}

fn render_stages(f: &mut Frame, area: Rect, summary: &DaySummary) {
    let block = Block::default()
        .title(" Sleep Stages ")
        .borders(Borders::ALL)
        .border_type(ratatui::widgets::BorderType::Rounded);

    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut text = vec![];
    if summary.breakdown.is_empty() {
        text.push(Line::from(Span::styled(
            "  No sleep data for this day. Press [i] to import.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for row in &summary.breakdown {
        text.push(Line::from(vec![
            Span::styled(
                format!("  {:<11} ", row.stage.display_name()),
                Style::default().fg(Color::Gray),
            ),
            Span::styled(
                format!("{:>8} {:>5} ", format_duration(row.duration_seconds), format_percentage(row.percentage)),
                Style::default().fg(Color::White),
            ),
            Span::styled(
                create_horizontal_bar(row.percentage, 100.0, 30),
                Style::default().fg(stage_color(row.stage)),
            ),
        ]));
    }

    f.render_widget(Paragraph::new(text), inner);
}

fn render_history(f: &mut Frame, area: Rect, history: &[DaySummary]) {
    let block = Block::default()
        .title(format!(" Sleep History ({} Days) ", HISTORY_DAYS))
        .borders(Borders::ALL)
        .border_type(ratatui::widgets::BorderType::Rounded);

    let inner = block.inner(area);
    f.render_widget(block, area);

    let header_cells = ["Date", "Total", "Graph", "Score"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow)));
    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let rows: Vec<Row> = history
        .iter()
        .rev()
        .map(|day| {
            let seconds = day.record.map(|r| r.total_sleep_seconds).unwrap_or(0);

            let cells = vec![
                Cell::from(day.date.format("%a %d %b").to_string()),
                Cell::from(if seconds > 0 { format_duration(seconds) } else { "-".to_string() }),
                Cell::from(create_horizontal_bar(hours(seconds), 10.0, 20)).style(Style::default().fg(Color::Cyan)),
                Cell::from(format!("{:>3} {}", day.score.score, day.score.label))
                    .style(Style::default().fg(score_color(day.score.color))),
            ];
            Row::new(cells).height(1)
        })
        .collect();

    let table = Table::new(rows)
        .header(header)
        .block(Block::default())
        .widths(&[
            Constraint::Length(12),
            Constraint::Length(9),
            Constraint::Length(22),
            Constraint::Length(14),
        ]);

    f.render_widget(table, inner);
}

fn create_horizontal_bar(value: f64, max: f64, width: usize) -> String {
    let ratio = if max > 0.0 { (value / max).clamp(0.0, 1.0) } else { 0.0 };
    let filled = (ratio * width as f64) as usize;
    let filled_str = "█".repeat(filled);
    let empty_str = "░".repeat(width - filled);
    format!("{}{}", filled_str, empty_str)
}

fn score_color(color: ScoreColor) -> Color {
    match color {
        ScoreColor::Gray => Color::Gray,
        ScoreColor::Red => Color::Red,
        ScoreColor::Orange => Color::Rgb(255, 140, 0),
        ScoreColor::Yellow => Color::Yellow,
        ScoreColor::Mint => Color::Rgb(62, 180, 137),
        ScoreColor::Green => Color::Green,
    }
}

fn stage_color(stage: SleepStage) -> Color {
    match stage {
        SleepStage::Deep => Color::Indexed(63),
        SleepStage::Core => Color::Blue,
        SleepStage::Rem => Color::Magenta,
    }
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
