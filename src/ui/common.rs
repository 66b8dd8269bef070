//! Common UI components shared across views.
//!
//! This module contains the header bar, view-mode bar, prompt line, status bar
//! and help overlay.

use chrono::Utc;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use crate::app::App;
use crate::data::HealthState;
use crate::session::SessionStatus;
use crate::view::ViewMode;

/// Render the header bar: session title, status badge, clock and one health
/// chip per tile.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let badge_style = match app.session.status {
        SessionStatus::Live => Style::default()
            .fg(Color::White)
            .bg(app.theme.live)
            .add_modifier(Modifier::BOLD),
        SessionStatus::Draft => Style::default().add_modifier(Modifier::REVERSED),
        SessionStatus::Ended => Style::default().add_modifier(Modifier::DIM | Modifier::REVERSED),
    };

    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.session.title),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {} ", app.session.status.label()), badge_style),
        Span::raw(format!(" {} ", app.session.clock(Utc::now()))),
        Span::raw("│"),
    ];

    for slot in app.slots() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("{}●", slot.position),
            app.theme.health_style(slot.health),
        ));
    }

    let worst = app
        .snapshot
        .inputs
        .values()
        .map(|s| s.health)
        .filter(|h| h.has_signal())
        .max();
    if let Some(health) = worst.filter(|h| *h != HealthState::Ok) {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(health.label(), app.theme.health_style(health)));
    }

    spans.push(Span::styled(
        format!(" │ {} ({})", app.user, app.role),
        Style::default().add_modifier(Modifier::DIM),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the view-mode bar, highlighting the active layout.
pub fn render_modes(frame: &mut Frame, app: &App, area: Rect) {
    let state = app.view.state();
    let titles: Vec<Line> = ViewMode::ALL
        .iter()
        .map(|mode| Line::from(format!(" {} ", mode.label())))
        .collect();
    let selected = ViewMode::ALL
        .iter()
        .position(|m| *m == state.view_mode)
        .unwrap_or(0);

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    let title = match state.fullscreen {
        Some(position) => format!(" Fullscreen: {}", position),
        None => String::new(),
    };
    let chunks = Layout::horizontal([Constraint::Length(32), Constraint::Min(0)]).split(area);
    frame.render_widget(tabs, chunks[0]);
    frame.render_widget(
        Paragraph::new(title).style(Style::default().fg(app.theme.highlight)),
        chunks[1],
    );
}

/// Render the open text prompt in place of the status bar.
pub fn render_prompt(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref prompt) = app.prompt else {
        return;
    };
    let line = Line::from(vec![
        Span::styled(format!(" {}: ", prompt.kind.title()), app.theme.header),
        Span::raw(format!("{}_", prompt.buffer)),
        Span::styled(
            "  Enter:save Esc:cancel",
            Style::default().add_modifier(Modifier::DIM),
        ),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

/// Render the status bar at the bottom.
///
/// Shows: tick, time since last update, available controls. Also displays
/// temporary status messages and feed errors.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    // Check for temporary status message first
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    if let Some(err) = app.feed_error() {
        let paragraph = Paragraph::new(format!(" Feed error: {} | q:quit", err))
            .style(Style::default().fg(app.theme.error));
        frame.render_widget(paragraph, area);
        return;
    }

    let snapshot = &app.snapshot;
    let age = (Utc::now() - snapshot.taken_at).num_milliseconds().max(0) as f64 / 1000.0;
    let state = if snapshot.enabled { "" } else { " (paused)" };
    let controls = if app.view.state().fullscreen.is_some() {
        "Esc:exit fullscreen ?:help q:quit"
    } else {
        "1-4:select i:inspect a:audio v:layout f:fullscreen m:marker ?:help q:quit"
    };

    let status = format!(
        " Tick {}{} | Updated {:.1}s ago | {}",
        snapshot.tick, state, age, controls
    );

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let section = |title: &'static str| {
        Line::from(vec![Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        )])
    };

    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        section(" Multiview"),
        Line::from("  1-4       Select input"),
        Line::from("  a         Next audio source"),
        Line::from("  v         Cycle layout"),
        Line::from("  f         Fullscreen selected"),
        Line::from("  Esc       Leave fullscreen"),
        Line::from("  click     Select / right: inspect"),
        Line::from("  mid-click Audio to tile"),
        Line::from(""),
        section(" Inspector"),
        Line::from("  i         Toggle inspector"),
        Line::from("  Tab       Next tab"),
        Line::from("  w         Timeline window"),
        Line::from("  c         Timeline metric"),
        Line::from(""),
        section(" Session"),
        Line::from("  m         Add marker"),
        Line::from("  n         Add note"),
        Line::from("  e         Enable/disable line"),
        Line::from("  l         Edit line"),
        Line::from("  s         Start/end session"),
        Line::from("  x         Export to JSON"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 42u16.min(area.width.saturating_sub(4));
    let help_height = 30u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    // Clear the area behind the help
    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
