//! Multiview rendering: the tile grid, or one fullscreen tile.

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::{ChartMetric, HealthState, MetricSnapshot};
use crate::view::{RenderPlan, TileSlot, ViewMode};

/// Sparkline characters (8 levels of height).
const SPARKLINE_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render the canvas and remember where each tile went.
pub fn render(frame: &mut Frame, app: &mut App, area: Rect) {
    let plan = app.view.render_plan(&app.slots());
    let mode = match &plan {
        RenderPlan::Grid { mode, .. } => Some(*mode),
        RenderPlan::Fullscreen(_) => None,
    };
    let areas = tile_areas(mode, area);

    app.tile_areas.clear();
    for (slot, tile_area) in plan.slots().iter().zip(areas) {
        render_tile(frame, app, slot, tile_area, mode.is_none());
        app.tile_areas.push((slot.position, tile_area));
    }
}

/// Split the canvas for a grid mode; `None` is fullscreen.
pub fn tile_areas(mode: Option<ViewMode>, area: Rect) -> Vec<Rect> {
    let halves = |r: Rect, horizontal: bool| {
        let constraints = [Constraint::Percentage(50), Constraint::Percentage(50)];
        if horizontal {
            Layout::horizontal(constraints).split(r)
        } else {
            Layout::vertical(constraints).split(r)
        }
    };

    match mode {
        None | Some(ViewMode::Single) => vec![area],
        Some(ViewMode::Dual) => halves(area, true).to_vec(),
        Some(ViewMode::PrimaryPlusTwo) => {
            let cols = Layout::horizontal([Constraint::Ratio(2, 3), Constraint::Ratio(1, 3)])
                .split(area);
            let side = halves(cols[1], false);
            vec![cols[0], side[0], side[1]]
        }
        Some(ViewMode::Quad) => {
            let rows = halves(area, false);
            let top = halves(rows[0], true);
            let bottom = halves(rows[1], true);
            vec![top[0], top[1], bottom[0], bottom[1]]
        }
    }
}

fn render_tile(frame: &mut Frame, app: &App, slot: &TileSlot, area: Rect, fullscreen: bool) {
    let state = app.view.state();
    let selected = state.selected == Some(slot.position);
    let audio = state.active_audio == Some(slot.position);
    let health_style = app.theme.health_style(slot.health);

    let border_style = if selected {
        Style::default()
            .fg(app.theme.highlight)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(app.theme.health_color(slot.health))
    };

    let mut title = vec![Span::raw(format!(" {} {} ", slot.position, slot.name))];
    if audio {
        title.push(Span::styled("♪ ", Style::default().fg(app.theme.audio)));
    }
    let block = Block::default()
        .title(Line::from(title))
        .title(
            Line::from(Span::styled(format!(" {} ", slot.health.symbol()), health_style))
                .alignment(Alignment::Right),
        )
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(border_style);

    let inner_width = area.width.saturating_sub(2) as usize;
    let disabled = slot
        .input_id
        .as_ref()
        .and_then(|id| app.snapshot.get(id))
        .is_some_and(|s| !s.enabled);

    let lines = match slot.metrics {
        Some(ref metrics) if slot.health.has_signal() => {
            let mut lines = metric_lines(metrics);
            let levels = slot
                .input_id
                .as_ref()
                .and_then(|id| app.snapshot.get(id))
                .map(|s| s.history.sparkline(ChartMetric::Bitrate, inner_width))
                .unwrap_or_default();
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                render_sparkline(&levels),
                Style::default().fg(app.theme.health_color(slot.health)),
            )));
            if fullscreen {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    "Esc to exit fullscreen",
                    Style::default().add_modifier(Modifier::DIM),
                )));
            }
            lines
        }
        _ => {
            let label = if slot.is_placeholder() {
                "NOT CONFIGURED"
            } else if disabled {
                "DISABLED"
            } else {
                "NO SIGNAL"
            };
            let pad = area.height.saturating_sub(3) / 2;
            let mut lines = vec![Line::from(""); pad as usize];
            lines.push(
                Line::from(Span::styled(label, app.theme.health_style(HealthState::Off)))
                    .alignment(Alignment::Center),
            );
            lines
        }
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// The readout lines of a tile.
fn metric_lines(metrics: &MetricSnapshot) -> Vec<Line<'static>> {
    let v = &metrics.video;
    let n = &metrics.network;
    let a = &metrics.audio;
    let dash = || "--".to_string();

    vec![
        Line::from(format!(
            "{} {} {}",
            v.codec.clone().unwrap_or_else(dash),
            v.resolution.clone().unwrap_or_else(dash),
            v.fps.map_or_else(dash, |f| format!("{:.2}fps", f)),
        )),
        Line::from(vec![
            Span::styled("Bitrate ", Style::default().add_modifier(Modifier::DIM)),
            Span::raw(ChartMetric::Bitrate.format(v.bitrate_kbps.map(f64::from))),
            Span::styled("  RTT ", Style::default().add_modifier(Modifier::DIM)),
            Span::raw(ChartMetric::Rtt.format(n.rtt_ms.map(f64::from))),
        ]),
        Line::from(vec![
            Span::styled("Loss ", Style::default().add_modifier(Modifier::DIM)),
            Span::raw(ChartMetric::PacketLoss.format(n.packet_loss_pct)),
            Span::styled("  Jitter ", Style::default().add_modifier(Modifier::DIM)),
            Span::raw(n.jitter_ms.map_or_else(dash, |j| format!("{} ms", j))),
        ]),
        Line::from(vec![
            Span::styled("Audio ", Style::default().add_modifier(Modifier::DIM)),
            Span::raw(ChartMetric::LufsMomentary.format(a.lufs_momentary)),
            Span::raw(a.peak_db.map_or_else(String::new, |p| format!("  pk {:.1} dB", p))),
        ]),
    ]
}

/// Render sparkline levels as a string.
fn render_sparkline(levels: &[u8]) -> String {
    if levels.is_empty() {
        return "-".to_string();
    }
    levels
        .iter()
        .map(|&l| SPARKLINE_CHARS[(l as usize).min(SPARKLINE_CHARS.len() - 1)])
        .collect()
}
