//! Inspector panel: details of the selected input and the session around it.

use chrono::Utc;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, Gauge, GraphType, Paragraph, Row, Table, Tabs, Wrap},
    Frame,
};

use crate::app::App;
use crate::data::duration::format_elapsed;
use crate::data::{AudioAlerts, HealthState, Marker};
use crate::engine::InputState;
use crate::session::InputConfig;
use crate::view::InspectorTab;

/// Markers listed under the timeline chart.
const RECENT_MARKERS: usize = 5;

/// Loudness meters span this range, in dB.
const METER_FLOOR_DB: f64 = -60.0;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Inspector ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([Constraint::Length(1), Constraint::Min(3)]).split(inner);

    let tab = app.view.state().inspector_tab;
    let titles: Vec<Line> = InspectorTab::ALL.iter().map(|t| Line::from(t.label())).collect();
    let selected = InspectorTab::ALL.iter().position(|t| *t == tab).unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");
    frame.render_widget(tabs, chunks[0]);

    match tab {
        InspectorTab::Details => render_details(frame, app, chunks[1]),
        InspectorTab::Audio => render_audio(frame, app, chunks[1]),
        InspectorTab::Timeline => render_timeline(frame, app, chunks[1]),
        InspectorTab::Notes => render_notes(frame, app, chunks[1]),
        InspectorTab::People => render_people(frame, app, chunks[1]),
    }
}

/// The selected line and its engine state.
fn selection(app: &App) -> Option<(&InputConfig, Option<&InputState>)> {
    let position = app.view.state().selected?;
    let input = app.roster.at(position)?;
    Some((input, app.snapshot.get(&input.id)))
}

fn render_empty(frame: &mut Frame, area: Rect, message: &str) {
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", message),
            Style::default().add_modifier(Modifier::DIM),
        )),
    ]);
    frame.render_widget(paragraph, area);
}

fn render_details(frame: &mut Frame, app: &App, area: Rect) {
    let Some((input, state)) = selection(app) else {
        render_empty(frame, area, "No input at this position");
        return;
    };
    let health = state.map_or(HealthState::Off, |s| s.health);
    let metrics = state.filter(|s| s.health.has_signal()).map(|s| &s.metrics);
    let dash = || "--".to_string();

    let mut rows = vec![
        ("Name", input.name.clone()),
        ("Id", input.id.to_string()),
        ("Status", health.label().to_string()),
        ("Enabled", if input.enabled { "yes" } else { "no" }.to_string()),
        ("Mode", input.mode.label().to_string()),
        ("Endpoint", input.endpoint().unwrap_or_else(dash)),
        ("Latency", format!("{} ms", input.latency_ms)),
        (
            "Encrypted",
            if input.passphrase.is_some() { "yes" } else { "no" }.to_string(),
        ),
    ];

    if let Some(m) = metrics {
        rows.extend([
            ("Codec", m.video.codec.clone().unwrap_or_else(dash)),
            ("Resolution", m.video.resolution.clone().unwrap_or_else(dash)),
            ("Frame rate", m.video.fps.map_or_else(dash, |f| format!("{:.2} fps", f))),
            (
                "Bitrate",
                m.video.bitrate_kbps.map_or_else(dash, |b| format!("{} kbps", b)),
            ),
            ("RTT", m.network.rtt_ms.map_or_else(dash, |r| format!("{} ms", r))),
            (
                "Packet loss",
                m.network.packet_loss_pct.map_or_else(dash, |p| format!("{:.2}%", p)),
            ),
            (
                "Retransmits",
                m.network.retransmits.map_or_else(dash, |r| r.to_string()),
            ),
            ("Jitter", m.network.jitter_ms.map_or_else(dash, |j| format!("{} ms", j))),
            ("Updated", m.taken_at.format("%H:%M:%S").to_string()),
        ]);
    }

    let table_rows: Vec<Row> = rows
        .into_iter()
        .map(|(label, value)| {
            let style = if label == "Status" {
                app.theme.health_style(health)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(label).style(Style::default().add_modifier(Modifier::DIM)),
                Cell::from(value).style(style),
            ])
        })
        .collect();

    let table = Table::new(table_rows, [Constraint::Length(12), Constraint::Fill(1)]);
    frame.render_widget(table, area);
}

fn render_audio(frame: &mut Frame, app: &App, area: Rect) {
    let Some((input, state)) = selection(app) else {
        render_empty(frame, area, "No input at this position");
        return;
    };
    let Some(audio) = state.filter(|s| s.health.has_signal()).map(|s| &s.metrics.audio) else {
        render_empty(frame, area, &format!("{}: no audio", input.name));
        return;
    };

    let meters = [
        ("Momentary", audio.lufs_momentary, "LUFS"),
        ("Short-term", audio.lufs_short_term, "LUFS"),
        ("Integrated", audio.lufs_integrated, "LUFS"),
        ("Peak", audio.peak_db, "dB"),
        ("True peak", audio.true_peak_dbtp, "dBTP"),
    ];

    let mut constraints = vec![Constraint::Length(2); meters.len()];
    constraints.push(Constraint::Min(3));
    let chunks = Layout::vertical(constraints).split(area);

    for (i, (label, value, unit)) in meters.iter().enumerate() {
        let level = value.unwrap_or(METER_FLOOR_DB);
        let gauge = Gauge::default()
            .block(Block::default().title(*label))
            .gauge_style(Style::default().fg(meter_color(app, level)))
            .ratio(meter_ratio(level))
            .label(match value {
                Some(v) => format!("{:.1} {}", v, unit),
                None => "--".to_string(),
            });
        frame.render_widget(gauge, chunks[i]);
    }

    let alerts = AudioAlerts::from(audio);
    let mut lines = vec![Line::from(format!(
        "{} @ {}",
        audio.channels.clone().unwrap_or_else(|| "--".to_string()),
        audio
            .sample_rate_hz
            .map_or_else(|| "--".to_string(), |r| format!("{} Hz", r))
    ))];
    let flag = |on: bool, text: &'static str| {
        if on {
            Some(Line::from(Span::styled(
                format!("⚠ {}", text),
                Style::default().fg(app.theme.warning),
            )))
        } else {
            None
        }
    };
    lines.extend(flag(alerts.hot, "Peak above -1 dB"));
    lines.extend(flag(alerts.true_peak_over, "True peak over 0 dBTP"));
    lines.extend(flag(alerts.loudness_out_of_range, "Loudness outside -28..-20 LUFS"));
    if !alerts.any() {
        lines.push(Line::from(Span::styled(
            "Levels within range",
            Style::default().fg(app.theme.ok),
        )));
    }
    frame.render_widget(Paragraph::new(lines), chunks[meters.len()]);
}

/// Fraction of the meter filled by `db`.
fn meter_ratio(db: f64) -> f64 {
    ((db - METER_FLOOR_DB) / -METER_FLOOR_DB).clamp(0.0, 1.0)
}

fn meter_color(app: &App, db: f64) -> ratatui::style::Color {
    if db > -1.0 {
        app.theme.error
    } else if db > -9.0 {
        app.theme.warning
    } else {
        app.theme.ok
    }
}

fn render_timeline(frame: &mut Frame, app: &App, area: Rect) {
    let Some((input, state)) = selection(app) else {
        render_empty(frame, area, "No input at this position");
        return;
    };

    let chunks =
        Layout::vertical([Constraint::Min(6), Constraint::Length(RECENT_MARKERS as u16 + 1)])
            .split(area);

    let window = app.window.seconds();
    let metric = app.chart_metric;
    let series = state.map(|s| s.history.series(metric, window)).unwrap_or_default();
    let points: Vec<(f64, f64)> = series
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
        .collect();

    let (y_min, y_max) = metric.domain().unwrap_or_else(|| value_bounds(&points));
    let now_ms = app.elapsed_ms(Utc::now());
    let from_ms = now_ms.saturating_sub(window as u64 * 1000);
    let in_window = app
        .markers
        .query_window(Some(&input.id), from_ms..now_ms + 1);
    let marker_points = marker_positions(&in_window, now_ms, series.len(), y_max);

    let datasets = vec![
        Dataset::default()
            .name(metric.label())
            .marker(symbols::Marker::Braille)
            .style(Style::default().fg(app.theme.highlight))
            .graph_type(GraphType::Line)
            .data(&points),
        Dataset::default()
            .name("markers")
            .marker(symbols::Marker::Dot)
            .style(Style::default().fg(app.theme.warning))
            .graph_type(GraphType::Scatter)
            .data(&marker_points),
    ];

    let latest = series.last().copied().flatten();
    let title = format!(
        " {} {} | {} [w/c] ",
        metric.label(),
        metric.format(latest),
        app.window.label()
    );
    let x_max = (series.len().max(2) - 1) as f64;
    let chart = Chart::new(datasets)
        .block(Block::default().title(title).borders(Borders::BOTTOM))
        .x_axis(
            Axis::default()
                .bounds([0.0, x_max])
                .labels(vec![Span::raw(format!("-{}", app.window.label())), Span::raw("now")]),
        )
        .y_axis(Axis::default().bounds([y_min, y_max]).labels(vec![
            Span::raw(format!("{:.0}", y_min)),
            Span::raw(format!("{:.0}", y_max)),
        ]));
    frame.render_widget(chart, chunks[0]);

    let recent = app.markers.recent(Some(&input.id), RECENT_MARKERS);
    let mut lines = vec![Line::from(Span::styled(
        format!("Markers ({})", app.markers.query(Some(&input.id)).len()),
        app.theme.header,
    ))];
    if recent.is_empty() {
        lines.push(Line::from(Span::styled(
            "  none yet (m to add)",
            Style::default().add_modifier(Modifier::DIM),
        )));
    }
    for marker in recent {
        lines.push(Line::from(vec![
            Span::raw(format!("{} ", format_elapsed(marker.elapsed_ms))),
            Span::styled("⚑ ", app.theme.health_style(marker.severity)),
            Span::raw(marker.label.clone()),
            Span::styled(
                marker
                    .author
                    .as_ref()
                    .map_or_else(String::new, |a| format!("  {}", a)),
                Style::default().add_modifier(Modifier::DIM),
            ),
        ]));
    }
    frame.render_widget(Paragraph::new(lines), chunks[1]);
}

/// Chart range for metrics without a fixed domain.
fn value_bounds(points: &[(f64, f64)]) -> (f64, f64) {
    let max = points.iter().map(|p| p.1).fold(f64::MIN, f64::max);
    let min = points.iter().map(|p| p.1).fold(f64::MAX, f64::min);
    if points.is_empty() {
        return (0.0, 1.0);
    }
    if (max - min).abs() <= f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    (min.min(0.0), max * 1.1)
}

/// Place markers on the chart's x axis. History points are one second apart,
/// with the newest at `len - 1`.
fn marker_positions(markers: &[&Marker], now_ms: u64, len: usize, y: f64) -> Vec<(f64, f64)> {
    let newest = len.saturating_sub(1) as f64;
    markers
        .iter()
        .map(|m| {
            let age = now_ms.saturating_sub(m.elapsed_ms) as f64 / 1000.0;
            ((newest - age).max(0.0), y)
        })
        .collect()
}

fn render_notes(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = if app.notes.content.is_empty() {
        vec![Line::from(Span::styled(
            "No notes yet (n to add)",
            Style::default().add_modifier(Modifier::DIM),
        ))]
    } else {
        app.notes.content.lines().map(|l| Line::from(l.to_string())).collect()
    };

    if let (Some(by), Some(at)) = (&app.notes.updated_by, app.notes.updated_at) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Last edit by {} at {}", by, at.format("%H:%M:%S")),
            Style::default().add_modifier(Modifier::DIM),
        )));
    }
    if !app.role.can_write() {
        lines.push(Line::from(Span::styled(
            "Read only",
            Style::default().add_modifier(Modifier::DIM),
        )));
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn render_people(frame: &mut Frame, app: &App, area: Rect) {
    let rows: Vec<Row> = app
        .members
        .iter()
        .map(|m| {
            let name = if m.display_name == app.user {
                format!("{} (you)", m.display_name)
            } else {
                m.display_name.clone()
            };
            Row::new(vec![
                Cell::from(m.initials()).style(app.theme.header),
                Cell::from(name),
                Cell::from(m.role.label()).style(Style::default().add_modifier(Modifier::DIM)),
            ])
        })
        .collect();

    let chunks = Layout::vertical([Constraint::Min(3), Constraint::Length(2)]).split(area);
    let table = Table::new(
        rows,
        [Constraint::Length(3), Constraint::Fill(1), Constraint::Length(10)],
    )
    .header(Row::new(vec!["", "Member", "Role"]).style(app.theme.header));
    frame.render_widget(table, chunks[0]);

    let invite = match app.invite_link {
        Some(ref link) => Line::from(vec![Span::raw("Invite: "), Span::raw(link.clone())]),
        None => Line::from(Span::styled(
            "No invite link configured",
            Style::default().add_modifier(Modifier::DIM),
        )),
    };
    frame.render_widget(Paragraph::new(invite), chunks[1]);
}
