//! Application state for the session room TUI.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use ratatui::layout::Rect;
use tracing::info;

use crate::config::Settings;
use crate::data::{ChartMetric, HealthState, InputId, MarkerDraft, MarkerTimeline, TimeWindow};
use crate::engine::{EngineEvent, EngineSnapshot, Subscription, TickHandle};
use crate::session::{LineEdit, Member, Role, Roster, SessionInfo, SessionNotes};
use crate::ui::Theme;
use crate::view::{build_slots, Position, TileSlot, ViewCoordinator, SLOT_COUNT};

/// How long a status message stays in the status bar.
const STATUS_TTL: Duration = Duration::from_secs(3);

/// Events kept between frames; older ones are dropped.
const EVENT_BACKLOG: usize = 64;

/// What the text prompt is collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Label for a new marker on the selected input.
    Marker,
    /// A line appended to the session notes.
    Note,
    /// `name; host; port; latency` for the selected line.
    Line,
}

impl PromptKind {
    pub fn title(&self) -> &'static str {
        match self {
            PromptKind::Marker => "Marker label",
            PromptKind::Note => "Add note",
            PromptKind::Line => "Edit line (name; host; port; latency)",
        }
    }
}

/// An open single-line text prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub buffer: String,
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,

    // Engine
    engine: TickHandle,
    pub snapshot: Arc<EngineSnapshot>,
    events: Arc<Mutex<VecDeque<EngineEvent>>>,
    _events_subscription: Subscription,

    // Session context
    pub session: SessionInfo,
    pub roster: Roster,
    pub user: String,
    pub role: Role,
    pub members: Vec<Member>,
    pub invite_link: Option<String>,
    pub notes: SessionNotes,
    pub markers: MarkerTimeline,

    // View
    pub view: ViewCoordinator,
    pub window: TimeWindow,
    pub chart_metric: ChartMetric,
    pub prompt: Option<Prompt>,
    /// Where each tile was drawn last frame, for mouse hit-testing.
    pub tile_areas: Vec<(Position, Rect)>,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create the app around a running engine.
    pub fn new(engine: TickHandle, settings: &Settings, roster: Roster, theme: Theme) -> Self {
        let events = Arc::new(Mutex::new(VecDeque::new()));
        let sink = events.clone();
        let subscription = engine.subscribe(move |event| {
            if matches!(event, EngineEvent::Ticked { .. }) {
                return;
            }
            let mut queue = sink.lock();
            if queue.len() >= EVENT_BACKLOG {
                queue.pop_front();
            }
            queue.push_back(event.clone());
        });

        let mut session = SessionInfo::new(settings.session.title.clone());
        session.purpose = settings.session.purpose.clone();
        if settings.session.live {
            session.start(Utc::now());
        }

        Self {
            running: true,
            show_help: false,
            snapshot: engine.latest(),
            engine,
            events,
            _events_subscription: subscription,
            session,
            roster,
            user: settings.session.user.clone(),
            role: settings.session.role,
            members: settings.members(),
            invite_link: settings.session.invite_link.clone(),
            notes: SessionNotes::default(),
            markers: MarkerTimeline::new(),
            view: ViewCoordinator::new(),
            window: TimeWindow::default(),
            chart_metric: ChartMetric::Bitrate,
            prompt: None,
            tile_areas: Vec::new(),
            theme,
            status_message: None,
        }
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < STATUS_TTL {
                return Some(msg);
            }
        }
        None
    }

    /// Pick up the latest engine snapshot and turn queued engine events into
    /// status messages.
    pub fn refresh(&mut self) {
        self.snapshot = self.engine.latest();

        let drained: Vec<EngineEvent> = self.events.lock().drain(..).collect();
        for event in drained {
            match event {
                EngineEvent::HealthChanged { input, from, to } => {
                    let name = self.input_name(&input);
                    self.set_status_message(format!(
                        "{}: {} -> {}",
                        name,
                        from.label(),
                        to.label()
                    ));
                }
                EngineEvent::Paused => self.set_status_message("Metrics paused".to_string()),
                EngineEvent::Resumed => self.set_status_message("Metrics resumed".to_string()),
                EngineEvent::Initialized { inputs } => {
                    self.set_status_message(format!("Tracking {} inputs", inputs))
                }
                EngineEvent::Ticked { .. } => {}
            }
        }
    }

    /// Last error reported by the telemetry feed.
    pub fn feed_error(&self) -> Option<&str> {
        self.snapshot.feed_error.as_deref()
    }

    fn input_name(&self, input: &InputId) -> String {
        self.roster
            .get(input)
            .map_or_else(|| input.to_string(), |i| i.name.clone())
    }

    /// All four multiview slots as of the current snapshot.
    pub fn slots(&self) -> [TileSlot; SLOT_COUNT] {
        build_slots(&self.roster.slot_inputs(), &self.snapshot)
    }

    /// The selected slot's input, if the position has one.
    pub fn selected_input(&self) -> Option<InputId> {
        let position = self.view.state().selected?;
        self.roster.at(position).map(|i| i.id.clone())
    }

    /// Position of the tile drawn under a terminal cell.
    pub fn tile_at(&self, column: u16, row: u16) -> Option<Position> {
        self.tile_areas
            .iter()
            .find(|(_, area)| {
                column >= area.x
                    && column < area.x + area.width
                    && row >= area.y
                    && row < area.y + area.height
            })
            .map(|(position, _)| *position)
    }

    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        self.session.elapsed_ms(now)
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn cycle_window(&mut self) {
        self.window = self.window.next();
        self.set_status_message(format!("Timeline window: {}", self.window.label()));
    }

    pub fn cycle_chart_metric(&mut self) {
        let index = ChartMetric::ALL
            .iter()
            .position(|m| *m == self.chart_metric)
            .unwrap_or(0);
        self.chart_metric = ChartMetric::ALL[(index + 1) % ChartMetric::ALL.len()];
    }

    /// Open a text prompt, if the local role may write.
    ///
    /// Line edits are for the owner and start from the selected line's values.
    pub fn start_prompt(&mut self, kind: PromptKind) {
        let buffer = match kind {
            PromptKind::Line => {
                if !self.role.can_manage() {
                    self.set_status_message("Only the owner can change lines".to_string());
                    return;
                }
                let Some(line) = self.view.state().selected.and_then(|p| self.roster.at(p))
                else {
                    self.set_status_message("No input at the selected position".to_string());
                    return;
                };
                LineEdit::from_config(line).prompt_text()
            }
            PromptKind::Marker | PromptKind::Note => {
                if !self.role.can_write() {
                    self.set_status_message(format!(
                        "A {} cannot write to the session",
                        self.role
                    ));
                    return;
                }
                String::new()
            }
        };
        self.prompt = Some(Prompt { kind, buffer });
    }

    pub fn cancel_prompt(&mut self) {
        self.prompt = None;
    }

    pub fn prompt_push(&mut self, c: char) {
        if let Some(prompt) = self.prompt.as_mut() {
            prompt.buffer.push(c);
        }
    }

    pub fn prompt_pop(&mut self) {
        if let Some(prompt) = self.prompt.as_mut() {
            prompt.buffer.pop();
        }
    }

    /// Commit the open prompt.
    pub fn submit_prompt(&mut self, now: DateTime<Utc>) {
        let Some(prompt) = self.prompt.take() else {
            return;
        };
        let text = prompt.buffer.trim();
        if text.is_empty() {
            return;
        }
        match prompt.kind {
            PromptKind::Marker => self.add_marker(text, now),
            PromptKind::Note => {
                let elapsed = self.elapsed_ms(now);
                self.notes.append_stamped(elapsed, text, &self.user, now);
                self.set_status_message("Note added".to_string());
            }
            PromptKind::Line => self.edit_selected_line(text),
        }
    }

    /// Apply `name; host; port; latency` to the selected line (owner only)
    /// and pass its enabled state on to the engine.
    pub fn edit_selected_line(&mut self, text: &str) {
        if !self.role.can_manage() {
            self.set_status_message("Only the owner can change lines".to_string());
            return;
        }
        let Some(position) = self.view.state().selected else {
            return;
        };
        let Some(current) = self.roster.at(position) else {
            self.set_status_message(format!("No input at position {}", position));
            return;
        };
        let edit = LineEdit::from_config(current).with_prompt_text(text);

        match self.roster.edit_line(position.get(), &edit) {
            Ok(line) => {
                let (id, name, enabled) = (line.id.clone(), line.name.clone(), line.enabled);
                self.engine.set_input_enabled(id, enabled);
                self.set_status_message(format!("Line {} updated: {}", position, name));
            }
            Err(e) => self.set_status_message(format!("Line not changed: {}", e)),
        }
    }

    /// Place a warning marker on the selected input and log it to the notes.
    pub fn add_marker(&mut self, label: &str, now: DateTime<Utc>) {
        if !self.role.can_write() {
            return;
        }
        let elapsed = self.elapsed_ms(now);
        let draft = MarkerDraft::new(label, HealthState::Warning)
            .on_input(self.selected_input())
            .author(self.user.clone());
        let marker = self.markers.add_draft(draft, elapsed);
        info!("marker '{}' at {}ms", marker.label, marker.elapsed_ms);

        self.notes
            .append_stamped(elapsed, &format!("⚑ {}", label), &self.user, now);
        self.set_status_message(format!("Marker added: {}", label));
    }

    /// Enable or disable the selected line (owner only).
    pub fn toggle_selected_line(&mut self) {
        if !self.role.can_manage() {
            self.set_status_message("Only the owner can change lines".to_string());
            return;
        }
        let Some(position) = self.view.state().selected else {
            return;
        };
        let Some(enabled) = self.roster.toggle_enabled(position) else {
            self.set_status_message(format!("No input at position {}", position));
            return;
        };
        if let Some(input) = self.roster.at(position) {
            let (id, name) = (input.id.clone(), input.name.clone());
            self.engine.set_input_enabled(id, enabled);
            let state = if enabled { "enabled" } else { "disabled" };
            self.set_status_message(format!("{} {}", name, state));
        }
    }

    /// Start a draft or ended session, or end a live one (owner only).
    pub fn toggle_session(&mut self, now: DateTime<Utc>) {
        if !self.role.can_manage() {
            self.set_status_message("Only the owner can start or end the session".to_string());
            return;
        }
        if self.session.is_live() {
            self.session.end(now);
            self.engine.set_enabled(false);
            self.set_status_message("Session ended".to_string());
        } else {
            self.session.start(now);
            self.engine.set_enabled(true);
            self.set_status_message("Session is live".to_string());
        }
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Export current state to a file.
    pub fn export_state(&self, path: &Path) -> Result<()> {
        let document = export_document(
            &self.session,
            &self.roster,
            &self.snapshot,
            &self.markers,
            &self.notes,
            Utc::now(),
        );
        write_json(path, &document)
    }
}

/// JSON summary of a session: per-input state plus markers and notes.
pub fn export_document(
    session: &SessionInfo,
    roster: &Roster,
    snapshot: &EngineSnapshot,
    markers: &MarkerTimeline,
    notes: &SessionNotes,
    now: DateTime<Utc>,
) -> serde_json::Value {
    let mut export = serde_json::Map::new();

    export.insert(
        "session".to_string(),
        serde_json::json!({
            "id": session.id,
            "title": session.title,
            "status": session.status,
            "started_at": session.started_at,
            "ended_at": session.ended_at,
            "elapsed": session.clock(now),
            "tick": snapshot.tick,
        }),
    );

    let mut counts = serde_json::Map::new();
    for health in HealthState::ALL {
        let n = snapshot.inputs.values().filter(|s| s.health == health).count();
        counts.insert(format!("{:?}", health).to_lowercase(), serde_json::json!(n));
    }
    export.insert("summary".to_string(), serde_json::Value::Object(counts));

    let inputs: Vec<serde_json::Value> = roster
        .iter()
        .map(|input| {
            let state = snapshot.get(&input.id);
            serde_json::json!({
                "id": input.id,
                "position": input.position,
                "name": input.name,
                "enabled": input.enabled,
                "health": state.map_or(HealthState::Off, |s| s.health),
                "metrics": state.filter(|s| s.health.has_signal()).map(|s| &s.metrics),
                "history_len": state.map_or(0, |s| s.history.len()),
            })
        })
        .collect();
    export.insert("inputs".to_string(), serde_json::Value::Array(inputs));

    export.insert("markers".to_string(), serde_json::json!(markers.all()));
    export.insert("notes".to_string(), serde_json::json!(notes));
    if let Some(ref err) = snapshot.feed_error {
        export.insert("feed_error".to_string(), serde_json::json!(err));
    }

    serde_json::Value::Object(export)
}

/// Pretty-print `value` to `path`.
pub fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    use std::io::Write;

    let json = serde_json::to_string_pretty(value)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, HealthTransitionModel, MetricsEngine, ScriptedRandom};
    use crate::source::SyntheticFeed;

    fn app_with(role: Role) -> App {
        let mut settings = Settings::default();
        settings.session.role = role;
        let roster = Roster::demo();

        let feed = SyntheticFeed::new(
            HealthTransitionModel::default(),
            Box::new(ScriptedRandom::constant(0.5)),
            Box::new(ScriptedRandom::constant(0.5)),
        );
        let config = EngineConfig {
            warmup_points: 0,
            ..EngineConfig::default()
        };
        let mut engine = MetricsEngine::new(Box::new(feed), config);
        engine.initialize(&roster.seeds());
        App::new(
            engine.start(Duration::from_secs(1)),
            &settings,
            roster,
            Theme::dark(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn starts_live_with_demo_slots() {
        let app = app_with(Role::Owner);
        assert!(app.session.is_live());

        let slots = app.slots();
        assert_eq!(slots[0].name, "Primary Feed");
        assert_eq!(slots[1].health, HealthState::Warning);
        assert_eq!(slots[3].health, HealthState::Off);
        assert!(slots[3].metrics.is_none());
        assert_eq!(app.selected_input(), Some(InputId::from("input-1")));
    }

    #[tokio::test(start_paused = true)]
    async fn marker_lands_on_selected_input_and_notes() {
        let mut app = app_with(Role::Commenter);
        app.view.select(Position::new(2).unwrap());
        let started = app.session.started_at.unwrap();

        app.start_prompt(PromptKind::Marker);
        for c in "  lip sync ".chars() {
            app.prompt_push(c);
        }
        app.submit_prompt(started + chrono::Duration::seconds(65));

        assert!(app.prompt.is_none());
        let marker = &app.markers.all()[0];
        assert_eq!(marker.label, "lip sync");
        assert_eq!(marker.input_id, Some(InputId::from("input-2")));
        assert_eq!(marker.elapsed_ms, 65_000);
        assert_eq!(marker.severity, HealthState::Warning);
        assert!(app.notes.content.contains("[00:01:05] ⚑ lip sync"));
    }

    #[tokio::test(start_paused = true)]
    async fn viewer_cannot_write() {
        let mut app = app_with(Role::Viewer);
        app.start_prompt(PromptKind::Note);
        assert!(app.prompt.is_none());

        app.add_marker("x", Utc::now());
        assert!(app.markers.is_empty());
        assert!(app.notes.content.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_prompt_is_discarded() {
        let mut app = app_with(Role::Owner);
        app.start_prompt(PromptKind::Note);
        app.prompt_push(' ');
        app.submit_prompt(Utc::now());
        assert!(app.notes.content.is_empty());
        assert!(app.prompt.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn owner_toggles_line_in_roster_and_engine() {
        let mut app = app_with(Role::Owner);
        app.toggle_selected_line();
        assert!(!app.roster.at(Position::new(1).unwrap()).unwrap().enabled);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        app.refresh();
        assert_eq!(app.slots()[0].health, HealthState::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn commenter_cannot_manage() {
        let mut app = app_with(Role::Commenter);
        app.toggle_selected_line();
        assert!(app.roster.at(Position::new(1).unwrap()).unwrap().enabled);

        app.toggle_session(Utc::now());
        assert!(app.session.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn ending_session_pauses_engine() {
        let mut app = app_with(Role::Owner);
        app.toggle_session(Utc::now());
        assert!(!app.session.is_live());

        tokio::time::sleep(Duration::from_millis(10)).await;
        app.refresh();
        assert!(!app.snapshot.enabled);
        assert_eq!(app.get_status_message(), Some("Metrics paused"));
    }

    #[tokio::test(start_paused = true)]
    async fn tile_hit_testing() {
        let mut app = app_with(Role::Owner);
        app.tile_areas = vec![
            (Position::new(1).unwrap(), Rect::new(0, 2, 40, 10)),
            (Position::new(2).unwrap(), Rect::new(40, 2, 40, 10)),
        ];
        assert_eq!(app.tile_at(5, 5), Position::new(1).ok());
        assert_eq!(app.tile_at(40, 11), Position::new(2).ok());
        assert_eq!(app.tile_at(80, 5), None);
        assert_eq!(app.tile_at(5, 12), None);
    }

    #[tokio::test(start_paused = true)]
    async fn export_writes_inputs_and_markers() {
        let mut app = app_with(Role::Owner);
        app.add_marker("freeze", Utc::now());
        let file = tempfile::NamedTempFile::new().unwrap();

        app.export_state(file.path()).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["inputs"].as_array().unwrap().len(), 4);
        assert_eq!(value["inputs"][3]["health"], "off");
        assert!(value["inputs"][3]["metrics"].is_null());
        assert_eq!(value["markers"][0]["label"], "freeze");
        assert_eq!(value["session"]["status"], "live");
    }

    #[tokio::test(start_paused = true)]
    async fn owner_edits_selected_line() {
        let mut app = app_with(Role::Owner);
        app.view.select(Position::new(2).unwrap());
        app.start_prompt(PromptKind::Line);
        assert_eq!(app.prompt.as_ref().unwrap().buffer, "Backup Path; ; ; 200");

        app.prompt.as_mut().unwrap().buffer = "Remote Cam; srt.example.com; 9000; 120".to_string();
        app.submit_prompt(Utc::now());

        let line = app.roster.at(Position::new(2).unwrap()).unwrap();
        assert_eq!(line.endpoint().as_deref(), Some("srt.example.com:9000"));
        assert_eq!(line.latency_ms, 120);
        assert_eq!(app.slots()[1].name, "Remote Cam");
        assert_eq!(app.get_status_message(), Some("Line 2 updated: Remote Cam"));
    }

    #[tokio::test(start_paused = true)]
    async fn edited_line_keeps_engine_in_step() {
        let mut app = app_with(Role::Owner);
        app.toggle_selected_line();
        app.edit_selected_line("Primary Feed; ; ; 200");
        assert!(!app.roster.at(Position::new(1).unwrap()).unwrap().enabled);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        app.refresh();
        assert_eq!(app.slots()[0].health, HealthState::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn bad_line_edit_changes_nothing() {
        let mut app = app_with(Role::Owner);
        let before = app.roster.clone();
        app.edit_selected_line("Primary Feed; host; ninety; 200");
        assert_eq!(app.roster, before);
        assert!(app.get_status_message().unwrap().starts_with("Line not changed"));
    }

    #[tokio::test(start_paused = true)]
    async fn commenter_cannot_edit_lines() {
        let mut app = app_with(Role::Commenter);
        app.start_prompt(PromptKind::Line);
        assert!(app.prompt.is_none());

        app.edit_selected_line("Hijacked; ; ; 200");
        assert_eq!(app.roster.at(Position::new(1).unwrap()).unwrap().name, "Primary Feed");
    }
}
