//! Terminal UI rendering using ratatui.
//!
//! ## Submodules
//!
//! - [`multiview`]: The tile grid, or a single fullscreen tile
//! - [`inspector`]: Side panel with Details, Audio, Timeline, Notes and People tabs
//! - [`common`]: Shared components (header, view-mode bar, prompt, status bar, help overlay)
//! - [`theme`]: Light/dark theme support with terminal auto-detection
//!
//! ## Rendering Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────────────────────────────┤
//! │ View modes (common::render_modes)    │
//! ├─────────────────────────┬────────────┤
//! │                         │            │
//! │ multiview::render       │ inspector  │
//! │                         │ (if open)  │
//! ├─────────────────────────┴────────────┤
//! │ Prompt or status (common)            │
//! └──────────────────────────────────────┘
//!         ↑
//!    Overlay rendered on top:
//!    - common::render_help
//! ```

pub mod common;
pub mod inspector;
pub mod multiview;
pub mod theme;

use ratatui::{
    layout::{Constraint, Layout, Rect},
    Frame,
};

use crate::app::App;

pub use theme::Theme;

/// Inspector width when open.
const INSPECTOR_WIDTH: u16 = 46;

/// Draw one full frame.
pub fn render(frame: &mut Frame, app: &mut App, area: Rect) {
    let chunks = Layout::vertical([
        Constraint::Length(1), // Header bar
        Constraint::Length(1), // View modes
        Constraint::Min(8),    // Canvas
        Constraint::Length(1), // Status bar
    ])
    .split(area);

    common::render_header(frame, app, chunks[0]);
    common::render_modes(frame, app, chunks[1]);

    let canvas = if app.view.state().inspector_open {
        let width = INSPECTOR_WIDTH.min(chunks[2].width / 2);
        let split =
            Layout::horizontal([Constraint::Min(20), Constraint::Length(width)]).split(chunks[2]);
        inspector::render(frame, app, split[1]);
        split[0]
    } else {
        chunks[2]
    };
    multiview::render(frame, app, canvas);

    if app.prompt.is_some() {
        common::render_prompt(frame, app, chunks[3]);
    } else {
        common::render_status_bar(frame, app, chunks[3]);
    }

    if app.show_help {
        common::render_help(frame, app, area);
    }
}
