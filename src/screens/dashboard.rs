/// Cluster dashboard screen

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, Gauge, GraphType, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::core::{DashboardState, DashboardViewModel, MetricKind, MetricPoint, MetricStatus, RankedPod};
use crate::utils::helpers::{
    format_age, format_bytes, format_bytes_rate, format_count, format_cpu, format_health,
    format_ops, format_timestamp_ms, health_level, HealthLevel,
};

pub struct Dashboard {
    pub title: String,
    /// Where snapshots come from, shown in the header
    source: String,
}

impl Dashboard {
    pub fn new(source: String) -> Self {
        Self {
            title: "Cluster Pulse".to_string(),
            source,
        }
    }

    pub fn render(&self, frame: &mut Frame, state: &DashboardState, status_message: Option<&str>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4), // Title + update info
                Constraint::Min(0),    // Content
                Constraint::Length(3), // Footer
            ])
            .split(frame.size());

        self.render_header(frame, chunks[0], state);

        if state.loading {
            self.render_loading(frame, chunks[1], state);
        } else {
            self.render_metrics(frame, chunks[1], &state.view);
        }

        let footer_text = status_message
            .map(str::to_string)
            .unwrap_or_else(|| "[r] Refresh now | [q] Quit".to_string());
        let footer = Paragraph::new(footer_text)
            .alignment(Alignment::Center)
            .style(if status_message.is_some() {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            })
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[2]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, state: &DashboardState) {
        let title_line = Line::from(vec![
            Span::styled(
                self.title.as_str(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(" | "),
            Span::styled("Source: ", Style::default().fg(Color::Gray)),
            Span::styled(self.source.as_str(), Style::default().fg(Color::White)),
        ]);

        let updated = match state.age() {
            Some(age) => format!("Updated {} ago", format_age(age)),
            None => "Waiting for first poll".to_string(),
        };
        let mut status_spans = vec![Span::styled(updated, Style::default().fg(Color::Gray))];
        if let Some(error) = &state.last_error {
            status_spans.push(Span::raw(" | "));
            status_spans.push(Span::styled(
                format!("Last poll failed: {}", error),
                Style::default().fg(Color::Red),
            ));
        }
        if let Some(problems) = problem_summary(&state.view) {
            status_spans.push(Span::raw(" | "));
            status_spans.push(Span::styled(problems, Style::default().fg(Color::Yellow)));
        }

        let header = Paragraph::new(vec![title_line, Line::from(status_spans)])
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, area);
    }

    fn render_loading(&self, frame: &mut Frame, area: Rect, state: &DashboardState) {
        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Loading metrics...",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
        ];
        if state.failures > 0 {
            lines.push(Line::from(Span::styled(
                format!("{} poll(s) failed so far, retrying on the next tick", state.failures),
                Style::default().fg(Color::DarkGray),
            )));
        }

        let loading = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(loading, area);
    }

    fn render_metrics(&self, frame: &mut Frame, area: Rect, view: &DashboardViewModel) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),      // Health + counters
                Constraint::Percentage(60), // Series charts
                Constraint::Min(7),         // Top pods
            ])
            .split(area);

        let summary = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(50),
                Constraint::Percentage(25),
                Constraint::Percentage(25),
            ])
            .split(rows[0]);

        self.render_health(frame, summary[0], view.cluster_health);
        self.render_counter(frame, summary[1], MetricKind::PodCount, view.pod_count, view);
        self.render_counter(frame, summary[2], MetricKind::ServiceCount, view.service_count, view);

        let chart_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);
        let halves = |area: Rect| {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(area)
        };
        let top = halves(chart_rows[0]);
        let bottom = halves(chart_rows[1]);

        self.render_series(frame, top[0], MetricKind::CpuUsage, &view.cpu_usage, view);
        self.render_series(frame, top[1], MetricKind::MemoryUsage, &view.memory_usage, view);
        self.render_series(frame, bottom[0], MetricKind::DiskIo, &view.disk_io, view);
        self.render_series(frame, bottom[1], MetricKind::NetworkTraffic, &view.network_traffic, view);

        let tables = halves(rows[2]);
        self.render_top_pods(frame, tables[0], MetricKind::TopPodsCpu, &view.top_pods_cpu, view);
        self.render_top_pods(frame, tables[1], MetricKind::TopPodsMemory, &view.top_pods_memory, view);
    }

    fn render_health(&self, frame: &mut Frame, area: Rect, health: f64) {
        let color = match health_level(health) {
            HealthLevel::Healthy => Color::Green,
            HealthLevel::Degraded => Color::Yellow,
            HealthLevel::Critical => Color::Red,
        };

        // Gauge only accepts [0, 1]; the label keeps the real value
        let ratio = if health.is_finite() { health.clamp(0.0, 1.0) } else { 0.0 };

        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(MetricKind::ClusterHealth.title()))
            .gauge_style(Style::default().fg(color).bg(Color::Black))
            .ratio(ratio)
            .label(format_health(health));
        frame.render_widget(gauge, area);
    }

    fn render_counter(&self, frame: &mut Frame, area: Rect, kind: MetricKind, value: f64, view: &DashboardViewModel) {
        let style = if is_degraded(view, kind) {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        };

        let counter = Paragraph::new(Span::styled(format_count(value), style))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(panel_title(kind, view)));
        frame.render_widget(counter, area);
    }

    fn render_series(&self, frame: &mut Frame, area: Rect, kind: MetricKind, points: &[MetricPoint], view: &DashboardViewModel) {
        let block = Block::default().borders(Borders::ALL).title(panel_title(kind, view));

        if points.is_empty() {
            let empty = Paragraph::new("No data")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(empty, area);
            return;
        }

        // Points are plotted in arrival order; the x axis is the point index
        let data: Vec<(f64, f64)> = points
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64, p.value))
            .collect();
        let (low, high) = value_bounds(points);
        let x_max = (points.len().saturating_sub(1)).max(1) as f64;

        let first = points.first().map(|p| format_timestamp_ms(p.timestamp)).unwrap_or_default();
        let last = points.last().map(|p| format_timestamp_ms(p.timestamp)).unwrap_or_default();

        let dataset = Dataset::default()
            .name(kind.name())
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(series_color(kind)))
            .data(&data);

        let chart = Chart::new(vec![dataset])
            .block(block)
            .x_axis(
                Axis::default()
                    .style(Style::default().fg(Color::Gray))
                    .bounds([0.0, x_max])
                    .labels(vec![Span::raw(first), Span::raw(last)]),
            )
            .y_axis(
                Axis::default()
                    .style(Style::default().fg(Color::Gray))
                    .bounds([low, high])
                    .labels(vec![
                        Span::raw(format_value(kind, low)),
                        Span::raw(format_value(kind, high)),
                    ]),
            );
        frame.render_widget(chart, area);
    }

    fn render_top_pods(&self, frame: &mut Frame, area: Rect, kind: MetricKind, pods: &[RankedPod], view: &DashboardViewModel) {
        let value_header = if kind == MetricKind::TopPodsCpu { "CPU" } else { "Memory" };
        let header = Row::new(vec!["#", "Pod", value_header])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

        let rows: Vec<Row> = pods
            .iter()
            .enumerate()
            .map(|(i, pod)| {
                let name = if pod.pod.is_empty() { "(unknown)" } else { pod.pod.as_str() };
                Row::new(vec![
                    Cell::from(format!("{}", i + 1)),
                    Cell::from(name.to_string()).style(Style::default().fg(Color::Cyan)),
                    Cell::from(format_value(kind, pod.value)),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(3),  // Rank
                Constraint::Min(20),    // Pod
                Constraint::Length(12), // Value
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(panel_title(kind, view)));

        frame.render_widget(table, area);
    }
}

fn is_degraded(view: &DashboardViewModel, kind: MetricKind) -> bool {
    view.status_of(kind).is_some_and(|status| !status.is_ok())
}

fn panel_title(kind: MetricKind, view: &DashboardViewModel) -> String {
    match view.status_of(kind) {
        Some(MetricStatus::Missing) => format!("{} (no data)", kind.title()),
        Some(MetricStatus::Malformed { .. }) => format!("{} (bad data)", kind.title()),
        _ => kind.title().to_string(),
    }
}

fn series_color(kind: MetricKind) -> Color {
    match kind {
        MetricKind::CpuUsage => Color::Cyan,
        MetricKind::MemoryUsage => Color::Magenta,
        MetricKind::DiskIo => Color::Yellow,
        _ => Color::Green,
    }
}

fn format_value(kind: MetricKind, value: f64) -> String {
    match kind {
        MetricKind::CpuUsage | MetricKind::TopPodsCpu => format_cpu(value),
        MetricKind::MemoryUsage | MetricKind::TopPodsMemory => format_bytes(value),
        MetricKind::DiskIo => format_ops(value),
        MetricKind::NetworkTraffic => format_bytes_rate(value),
        MetricKind::ClusterHealth => format_health(value),
        MetricKind::PodCount | MetricKind::ServiceCount => format_count(value),
    }
}

/// Y-axis bounds over the finite values, starting at zero when all are positive
fn value_bounds(points: &[MetricPoint]) -> (f64, f64) {
    let finite = points.iter().map(|p| p.value).filter(|v| v.is_finite());
    let (low, high) = finite.fold((0.0_f64, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if !high.is_finite() || high <= low {
        (low, low + 1.0)
    } else {
        (low, high)
    }
}

/// One-line list of metrics that did not parse cleanly
pub fn problem_summary(view: &DashboardViewModel) -> Option<String> {
    let parts: Vec<String> = view
        .problems()
        .map(|(kind, status)| match status {
            MetricStatus::Malformed { raw } => format!("{} malformed ({})", kind, raw),
            _ => format!("{} missing", kind),
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
