// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! fancurve-tui: terminal monitor that plots the configured fan curve and
//! the live sensor reading with the command the daemon would issue.
//! It never writes to the fan.

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use pi_fan_curve::config;
use pi_fan_curve::curve::{CurveSpec, FanCurve};
use pi_fan_curve::sensor::{SENSOR_FAILURE_TEMP, SysfsTemperature, TemperatureSource};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
};
use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

/// Readings kept for the history chart.
const HISTORY_LEN: usize = 120;

/// Degrees plotted beyond each end of the fitted range.
const PLOT_MARGIN: f64 = 5.0;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "fancurve-tui", about = "Fan curve monitor")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Sensor refresh interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    refresh_ms: u64,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

struct App {
    running: bool,
    curve: FanCurve,
    sensor: SysfsTemperature,
    started: Instant,
    history: VecDeque<(f64, f64)>,
    last: Option<(f64, u8)>,
    config_path: String,
}

impl App {
    fn new(curve: FanCurve, sensor: SysfsTemperature, config_path: String) -> Self {
        Self {
            running: true,
            curve,
            sensor,
            started: Instant::now(),
            history: VecDeque::with_capacity(HISTORY_LEN),
            last: None,
            config_path,
        }
    }

    fn refresh(&mut self) {
        let temp = self.sensor.read();
        let percent = self.curve.evaluate(temp);
        self.last = Some((temp, percent));

        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history
            .push_back((self.started.elapsed().as_secs_f64(), temp));
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config_path = config::resolve_config_path(Some(&cli.config));
    let cfg = config::load_config(&config_path)
        .with_context(|| format!("Could not load config {}", config_path.display()))?;
    let curve = FanCurve::new(cfg.curve).context("Could not build the fan curve")?;
    let sensor = SysfsTemperature::new(&cfg.sensor.path, cfg.sensor.divisor);

    let mut app = App::new(curve, sensor, config_path.display().to_string());
    app.refresh();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, Duration::from_millis(cli.refresh_ms));

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> anyhow::Result<()> {
    let mut last_tick = Instant::now();

    while app.running {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                handle_input(app, key.code, key.modifiers);
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.refresh();
            last_tick = Instant::now();
        }
    }

    Ok(())
}

fn handle_input(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
    match key {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => app.running = false,
        KeyCode::Char('q') | KeyCode::Esc => app.running = false,
        KeyCode::Char('r') => app.refresh(),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),     // curve
            Constraint::Length(8),  // history
            Constraint::Length(4),  // status bar
        ])
        .split(f.area());

    draw_curve(f, app, chunks[0]);
    draw_history(f, app, chunks[1]);
    draw_status_bar(f, app, chunks[2]);
}

fn temp_color(temp: f64, spec: &CurveSpec) -> Color {
    if temp == SENSOR_FAILURE_TEMP || temp > spec.max_temp {
        Color::Red
    } else if temp >= spec.min_temp {
        Color::Yellow
    } else {
        Color::Green
    }
}

fn draw_curve(f: &mut Frame, app: &App, area: Rect) {
    let spec = app.curve.spec();
    let x_min = spec.min_temp - PLOT_MARGIN;
    let x_max = spec.max_temp + PLOT_MARGIN;

    let samples = 200;
    let curve_points: Vec<(f64, f64)> = (0..=samples)
        .map(|i| {
            let t = x_min + (x_max - x_min) * i as f64 / samples as f64;
            (t, f64::from(app.curve.evaluate(t)))
        })
        .collect();

    let marker: Vec<(f64, f64)> = app
        .last
        .map(|(t, p)| vec![(t.clamp(x_min, x_max), f64::from(p))])
        .unwrap_or_default();
    let marker_color = app
        .last
        .map(|(t, _)| temp_color(t, spec))
        .unwrap_or(Color::Gray);

    let datasets = vec![
        Dataset::default()
            .name(format!("order {}", spec.order))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&curve_points),
        Dataset::default()
            .name("now")
            .marker(symbols::Marker::Block)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(marker_color))
            .data(&marker),
    ];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Fan Curve "),
        )
        .x_axis(
            Axis::default()
                .title("°C")
                .style(Style::default().fg(Color::Gray))
                .bounds([x_min, x_max])
                .labels([
                    format!("{x_min:.0}"),
                    format!("{:.0}", spec.min_temp),
                    format!("{:.0}", spec.max_temp),
                    format!("{x_max:.0}"),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("%")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, 100.0])
                .labels(["0", "50", "100"]),
        );

    f.render_widget(chart, area);
}

fn draw_history(f: &mut Frame, app: &App, area: Rect) {
    let spec = app.curve.spec();
    let data: Vec<(f64, f64)> = app.history.iter().copied().collect();

    let (x_min, x_max) = match (data.first(), data.last()) {
        (Some(first), Some(last)) if last.0 > first.0 => (first.0, last.0),
        (Some(first), _) => (first.0, first.0 + 1.0),
        _ => (0.0, 1.0),
    };
    let y_min = data
        .iter()
        .map(|p| p.1)
        .fold(spec.min_temp - PLOT_MARGIN, f64::min);
    let y_max = data
        .iter()
        .map(|p| p.1)
        .fold(spec.max_temp + PLOT_MARGIN, f64::max);

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Yellow))
        .data(&data);

    let chart = Chart::new(vec![dataset])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Temperature History "),
        )
        .x_axis(Axis::default().bounds([x_min, x_max]))
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([y_min, y_max])
                .labels([format!("{y_min:.0}°"), format!("{y_max:.0}°")]),
        );

    f.render_widget(chart, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let spec = app.curve.spec();
    let params = app.curve.params();

    let reading = match app.last {
        Some((t, p)) if t == SENSOR_FAILURE_TEMP => Span::styled(
            format!(" SENSOR ERROR -> {p}% "),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Some((t, p)) => Span::styled(
            format!(" {t:.1}°C -> {p}% "),
            Style::default()
                .fg(temp_color(t, spec))
                .add_modifier(Modifier::BOLD),
        ),
        None => Span::raw(" - "),
    };

    let detail = Span::raw(format!(
        "  {}-{}°C -> {}-{}%, order {}  a={:.3} b={:.3e}  [{}]",
        spec.min_temp,
        spec.max_temp,
        spec.min_fan,
        spec.max_fan,
        spec.order,
        params.a,
        params.b,
        app.config_path
    ));

    let help = Line::from(Span::styled(
        " [r]efresh  [q]uit ",
        Style::default().fg(Color::DarkGray),
    ));

    let paragraph = Paragraph::new(vec![Line::from(vec![reading, detail]), help])
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(paragraph, area);
}
