//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::data::HealthState;

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and the selected tile.
    pub highlight: Color,
    /// Healthy input.
    pub ok: Color,
    pub warning: Color,
    pub error: Color,
    /// Input without signal, and placeholders.
    pub off: Color,
    /// Marker for the input whose audio is monitored.
    pub audio: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Background of the LIVE badge.
    pub live: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for the active tab.
    pub tab_active: Style,
    /// Style for inactive tabs.
    pub tab_inactive: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            ok: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            off: Color::DarkGray,
            audio: Color::Magenta,
            border: Color::Gray,
            live: Color::Red,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            ok: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            off: Color::Gray,
            audio: Color::Magenta,
            border: Color::DarkGray,
            live: Color::Red,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        // Use terminal-light crate to detect background luminance
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    pub fn health_color(&self, health: HealthState) -> Color {
        match health {
            HealthState::Ok => self.ok,
            HealthState::Warning => self.warning,
            HealthState::Error => self.error,
            HealthState::Off => self.off,
        }
    }

    /// Get style for a health state
    pub fn health_style(&self, health: HealthState) -> Style {
        let style = Style::default().fg(self.health_color(health));
        match health {
            HealthState::Error => style.add_modifier(Modifier::BOLD),
            HealthState::Off => style.add_modifier(Modifier::DIM),
            _ => style,
        }
    }
}
