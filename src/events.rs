use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::app::{App, PromptKind};
use crate::view::{Focus, Key, KeyOutcome};

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Translate a terminal key into a view key.
pub fn view_key(code: KeyCode) -> Key {
    match code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Esc => Key::Escape,
        KeyCode::Tab => Key::Tab,
        _ => Key::Other,
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // Escape out of fullscreen comes before help and text entry
    if key.code == KeyCode::Esc
        && app.view.handle_key(Key::Escape, Focus::TextEntry) == KeyOutcome::ExitFullscreen
    {
        return;
    }

    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    // Text entry owns the keyboard
    if app.prompt.is_some() {
        handle_prompt_input(app, key);
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Char('?') => app.toggle_help(),

        // Session
        KeyCode::Char('m') => app.start_prompt(PromptKind::Marker),
        KeyCode::Char('n') => app.start_prompt(PromptKind::Note),
        KeyCode::Char('e') => app.toggle_selected_line(),
        KeyCode::Char('l') => app.start_prompt(PromptKind::Line),
        KeyCode::Char('s') => app.toggle_session(Utc::now()),

        // Timeline
        KeyCode::Char('w') => app.cycle_window(),
        KeyCode::Char('c') => app.cycle_chart_metric(),

        // Export
        KeyCode::Char('x') => {
            let export_path = std::path::PathBuf::from("session_export.json");
            match app.export_state(&export_path) {
                Ok(()) => {
                    app.set_status_message(format!("Exported to {}", export_path.display()));
                }
                Err(e) => {
                    app.set_status_message(format!("Export failed: {}", e));
                }
            }
        }

        code => match app.view.handle_key(view_key(code), Focus::Canvas) {
            KeyOutcome::EnterFullscreen(position) => {
                let name = app.slots()[position.index()].name.clone();
                app.set_status_message(format!("{} fullscreen | Esc:exit", name));
            }
            KeyOutcome::Ignored if code == KeyCode::Esc => app.view.close_inspector(),
            _ => {}
        },
    }
}

/// Handle key input while a prompt is open
fn handle_prompt_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_prompt(Utc::now()),
        KeyCode::Esc => app.cancel_prompt(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.cancel_prompt(),
        KeyCode::Backspace => app.prompt_pop(),
        KeyCode::Char(c) => app.prompt_push(c),
        _ => {}
    }
}

/// Handle mouse events
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    if app.prompt.is_some() {
        return;
    }
    match mouse.kind {
        // Click to select
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(position) = app.tile_at(mouse.column, mouse.row) {
                app.view.select(position);
            }
        }

        // Right-click opens the inspector
        MouseEventKind::Down(MouseButton::Right) => {
            if let Some(position) = app.tile_at(mouse.column, mouse.row) {
                app.view.inspect(position);
            }
        }

        // Middle-click moves the audio to that tile
        MouseEventKind::Down(MouseButton::Middle) => {
            if let Some(position) = app.tile_at(mouse.column, mouse.row) {
                app.view.set_audio(position);
                let name = app.slots()[position.index()].name.clone();
                app.set_status_message(format!("Audio: {}", name));
            }
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::engine::{EngineConfig, HealthTransitionModel, MetricsEngine, ScriptedRandom};
    use crate::session::Roster;
    use crate::source::SyntheticFeed;
    use crate::ui::Theme;
    use crate::view::{InspectorTab, Position, ViewMode};
    use ratatui::layout::Rect;

    fn app() -> App {
        let roster = Roster::demo();
        let feed = SyntheticFeed::new(
            HealthTransitionModel::default(),
            Box::new(ScriptedRandom::constant(0.5)),
            Box::new(ScriptedRandom::constant(0.5)),
        );
        let mut engine = MetricsEngine::new(Box::new(feed), EngineConfig::default());
        engine.initialize(&roster.seeds());
        App::new(
            engine.start(Duration::from_secs(1)),
            &Settings::default(),
            roster,
            Theme::dark(),
        )
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_key_event(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn click(app: &mut App, button: MouseButton, column: u16, row: u16) {
        handle_mouse_event(
            app,
            MouseEvent {
                kind: MouseEventKind::Down(button),
                column,
                row,
                modifiers: KeyModifiers::NONE,
            },
        );
    }

    #[tokio::test(start_paused = true)]
    async fn view_shortcuts_reach_coordinator() {
        let mut app = app();
        press(&mut app, KeyCode::Char('3'));
        press(&mut app, KeyCode::Char('i'));
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('v'));

        let state = app.view.state();
        assert_eq!(state.selected, Position::new(3).ok());
        assert!(state.inspector_open);
        assert_eq!(state.inspector_tab, InspectorTab::Audio);
        assert_eq!(state.view_mode, ViewMode::Single);
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_suppresses_shortcuts() {
        let mut app = app();
        press(&mut app, KeyCode::Char('m'));
        type_text(&mut app, "2iq");

        assert!(app.running);
        assert_eq!(app.view.state().selected, Position::new(1).ok());
        assert!(!app.view.state().inspector_open);
        assert_eq!(app.prompt.as_ref().unwrap().buffer, "2iq");

        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.markers.all()[0].label, "2i");
    }

    #[tokio::test(start_paused = true)]
    async fn escape_leaves_fullscreen_before_prompt() {
        let mut app = app();
        press(&mut app, KeyCode::Char('f'));
        assert_eq!(app.view.state().fullscreen, Position::new(1).ok());

        press(&mut app, KeyCode::Char('n'));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.view.state().fullscreen, None);
        assert!(app.prompt.is_some());

        press(&mut app, KeyCode::Esc);
        assert!(app.prompt.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn escape_leaves_fullscreen_before_help() {
        let mut app = app();
        press(&mut app, KeyCode::Char('f'));
        press(&mut app, KeyCode::Char('?'));
        assert!(app.show_help);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.view.state().fullscreen, None);
        assert_eq!(app.view.state().view_mode, ViewMode::Quad);

        press(&mut app, KeyCode::Esc);
        assert!(!app.show_help);
        assert!(!app.view.state().inspector_open);
    }

    #[tokio::test(start_paused = true)]
    async fn escape_closes_inspector_outside_fullscreen() {
        let mut app = app();
        press(&mut app, KeyCode::Char('i'));
        press(&mut app, KeyCode::Esc);
        assert!(!app.view.state().inspector_open);
    }

    #[tokio::test(start_paused = true)]
    async fn help_swallows_next_key() {
        let mut app = app();
        press(&mut app, KeyCode::Char('?'));
        assert!(app.show_help);
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.show_help);
        assert!(app.running);
    }

    #[tokio::test(start_paused = true)]
    async fn clicks_select_and_inspect_tiles() {
        let mut app = app();
        app.tile_areas = vec![
            (Position::new(1).unwrap(), Rect::new(0, 2, 40, 10)),
            (Position::new(2).unwrap(), Rect::new(40, 2, 40, 10)),
        ];

        click(&mut app, MouseButton::Left, 50, 4);
        assert_eq!(app.view.state().selected, Position::new(2).ok());
        assert!(!app.view.state().inspector_open);

        click(&mut app, MouseButton::Right, 3, 3);
        assert_eq!(app.view.state().selected, Position::new(1).ok());
        assert!(app.view.state().inspector_open);

        click(&mut app, MouseButton::Middle, 60, 8);
        assert_eq!(app.view.state().active_audio, Position::new(2).ok());
        assert_eq!(app.view.state().selected, Position::new(1).ok());

        // Outside every tile
        click(&mut app, MouseButton::Middle, 10, 30);
        assert_eq!(app.view.state().active_audio, Position::new(2).ok());
    }

    #[test]
    fn key_translation() {
        assert_eq!(view_key(KeyCode::Char('A')), Key::Char('A'));
        assert_eq!(view_key(KeyCode::Esc), Key::Escape);
        assert_eq!(view_key(KeyCode::Tab), Key::Tab);
        assert_eq!(view_key(KeyCode::Enter), Key::Other);
    }
}
