//! Session context around the core: who is watching, whether the session is
//! live, the shared notes and the input roster.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::data::duration::format_elapsed;
use crate::data::{HealthState, InputId};
use crate::engine::InputSeed;
use crate::error::{Result, RoomError};
use crate::view::{Position, SlotInput};

/// Latency applied when a line edit leaves it blank.
pub const DEFAULT_LATENCY_MS: u32 = 200;

/// A participant's role in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Owner,
    Commenter,
    Viewer,
}

impl Role {
    /// Markers and notes may be written by owners and commenters.
    pub fn can_write(&self) -> bool {
        matches!(self, Role::Owner | Role::Commenter)
    }

    /// Lines and the session lifecycle are owner-only.
    pub fn can_manage(&self) -> bool {
        matches!(self, Role::Owner)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Commenter => "commenter",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "commenter" => Ok(Role::Commenter),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Draft,
    Live,
    Ended,
}

impl SessionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Draft => "DRAFT",
            SessionStatus::Live => "LIVE",
            SessionStatus::Ended => "ENDED",
        }
    }
}

/// Identity and lifecycle of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub title: String,
    pub purpose: String,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            purpose: String::new(),
            status: SessionStatus::Draft,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == SessionStatus::Live
    }

    /// Go live. A restarted session keeps its original start time.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.ended_at = None;
        self.status = SessionStatus::Live;
        info!("session '{}' is live", self.title);
    }

    pub fn end(&mut self, now: DateTime<Utc>) {
        if self.status == SessionStatus::Live {
            self.ended_at = Some(now);
        }
        self.status = SessionStatus::Ended;
        info!("session '{}' ended", self.title);
    }

    /// Time since the session started, frozen once it ends. Zero before the
    /// first start.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        let Some(started) = self.started_at else {
            return 0;
        };
        let until = self.ended_at.unwrap_or(now);
        (until - started).num_milliseconds().max(0) as u64
    }

    /// Elapsed time as HH:MM:SS.
    pub fn clock(&self, now: DateTime<Utc>) -> String {
        format_elapsed(self.elapsed_ms(now))
    }
}

/// A participant as shown on the People tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "Utc::now")]
    pub joined_at: DateTime<Utc>,
}

impl Member {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            role,
            joined_at: Utc::now(),
        }
    }

    /// Up to two initials for the avatar column.
    pub fn initials(&self) -> String {
        self.display_name
            .split_whitespace()
            .filter_map(|w| w.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase()
    }
}

/// Collaborative free-text notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionNotes {
    pub content: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

impl SessionNotes {
    /// Replace the content. Returns false if nothing changed.
    pub fn update(&mut self, content: impl Into<String>, author: &str, now: DateTime<Utc>) -> bool {
        let content = content.into();
        if content == self.content {
            return false;
        }
        self.content = content;
        self.updated_at = Some(now);
        self.updated_by = Some(author.to_string());
        true
    }

    /// Append `[HH:MM:SS] text` on its own line.
    pub fn append_stamped(&mut self, elapsed_ms: u64, text: &str, author: &str, now: DateTime<Utc>) {
        let mut content = self.content.clone();
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&format!("[{}] {}\n", format_elapsed(elapsed_ms), text));
        self.update(content, author, now);
    }
}

/// SRT connection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SrtMode {
    #[default]
    Caller,
    Listener,
}

impl SrtMode {
    pub fn label(&self) -> &'static str {
        match self {
            SrtMode::Caller => "caller",
            SrtMode::Listener => "listener",
        }
    }
}

fn default_latency() -> u32 {
    DEFAULT_LATENCY_MS
}

fn default_enabled() -> bool {
    true
}

/// One line of the roster. Only id, position, name, enabled and the starting
/// health matter to the engine; the transport fields are carried for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Defaults to `input-<position>`.
    #[serde(default)]
    pub id: InputId,
    pub position: Position,
    pub name: String,
    #[serde(default)]
    pub mode: SrtMode,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default = "default_latency")]
    pub latency_ms: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Starting health; the engine's default pattern applies when absent.
    #[serde(default)]
    pub health: Option<HealthState>,
}

impl InputConfig {
    pub fn new(position: Position, name: impl Into<String>) -> Self {
        Self {
            id: InputId::new(format!("input-{}", position)),
            position,
            name: name.into(),
            mode: SrtMode::Caller,
            host: None,
            port: None,
            passphrase: None,
            latency_ms: DEFAULT_LATENCY_MS,
            enabled: true,
            health: None,
        }
    }

    fn with_mode(mut self, mode: SrtMode) -> Self {
        self.mode = mode;
        self
    }

    fn with_health(mut self, health: HealthState) -> Self {
        self.health = Some(health);
        self
    }

    /// `host:port` for display, if configured.
    pub fn endpoint(&self) -> Option<String> {
        match (&self.host, self.port) {
            (Some(host), Some(port)) => Some(format!("{}:{}", host, port)),
            (Some(host), None) => Some(host.clone()),
            _ => None,
        }
    }
}

/// Raw values from the edit-line prompt, before validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineEdit {
    pub name: String,
    pub host: String,
    pub port: String,
    pub mode: SrtMode,
    pub passphrase: String,
    pub latency_ms: String,
    pub enabled: bool,
}

impl LineEdit {
    /// Prefill from the current configuration.
    pub fn from_config(input: &InputConfig) -> Self {
        Self {
            name: input.name.clone(),
            host: input.host.clone().unwrap_or_default(),
            port: input.port.map(|p| p.to_string()).unwrap_or_default(),
            mode: input.mode,
            passphrase: input.passphrase.clone().unwrap_or_default(),
            latency_ms: input.latency_ms.to_string(),
            enabled: input.enabled,
        }
    }

    /// The `name; host; port; latency` text the edit prompt starts from.
    pub fn prompt_text(&self) -> String {
        format!(
            "{}; {}; {}; {}",
            self.name, self.host, self.port, self.latency_ms
        )
    }

    /// Take name, host, port and latency from prompt text. Missing trailing
    /// fields are blank; mode, passphrase and enabled are kept.
    pub fn with_prompt_text(mut self, text: &str) -> Self {
        let mut fields = text.split(';').map(str::trim);
        let mut next = || fields.next().unwrap_or_default().to_string();
        self.name = next();
        self.host = next();
        self.port = next();
        self.latency_ms = next();
        self
    }
}

fn parse_field<T: FromStr>(field: &'static str, raw: &str) -> Result<Option<T>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|_| RoomError::InvalidLine {
        field,
        reason: format!("'{}' is not a number", raw),
    })
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// The session's inputs, at most one per position.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Roster {
    inputs: Vec<InputConfig>,
}

impl Roster {
    /// Build a roster, filling blank ids and ordering by position.
    pub fn new(inputs: Vec<InputConfig>) -> Result<Self> {
        let mut inputs = inputs;
        inputs.sort_by_key(|i| i.position);
        for pair in inputs.windows(2) {
            if pair[0].position == pair[1].position {
                return Err(RoomError::DuplicatePosition(pair[0].position.get()));
            }
        }
        for input in &mut inputs {
            if input.id.as_str().is_empty() {
                input.id = InputId::new(format!("input-{}", input.position));
            }
        }
        let mut seen = BTreeSet::new();
        for input in &inputs {
            if !seen.insert(&input.id) {
                return Err(RoomError::DuplicateInput(input.id.as_str().to_string()));
            }
        }
        Ok(Self { inputs })
    }

    /// The four demo lines.
    pub fn demo() -> Self {
        let [p1, p2, p3, p4] = Position::ALL;
        Self {
            inputs: vec![
                InputConfig::new(p1, "Primary Feed").with_health(HealthState::Ok),
                InputConfig::new(p2, "Backup Path")
                    .with_mode(SrtMode::Listener)
                    .with_health(HealthState::Warning),
                InputConfig::new(p3, "Commentary").with_health(HealthState::Ok),
                InputConfig::new(p4, "Graphics").with_health(HealthState::Off),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputConfig> {
        self.inputs.iter()
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn get(&self, id: &InputId) -> Option<&InputConfig> {
        self.inputs.iter().find(|i| &i.id == id)
    }

    pub fn at(&self, position: Position) -> Option<&InputConfig> {
        self.inputs.iter().find(|i| i.position == position)
    }

    /// Engine seeds in position order.
    pub fn seeds(&self) -> Vec<InputSeed> {
        self.inputs
            .iter()
            .map(|i| {
                let seed = InputSeed::new(i.id.clone()).enabled(i.enabled);
                match i.health {
                    Some(health) => seed.with_health(health),
                    None => seed,
                }
            })
            .collect()
    }

    /// What the multiview needs to lay out tiles.
    pub fn slot_inputs(&self) -> Vec<SlotInput> {
        self.inputs
            .iter()
            .map(|i| SlotInput {
                position: i.position,
                id: i.id.clone(),
                name: i.name.clone(),
            })
            .collect()
    }

    /// Apply an edit to the line at `position`.
    ///
    /// A blank name keeps the current one, a blank passphrase clears it and a
    /// blank latency falls back to 200 ms. Non-numeric port or latency is
    /// rejected without changing anything.
    pub fn edit_line(&mut self, position: u8, edit: &LineEdit) -> Result<&InputConfig> {
        let position = Position::new(position)?;
        let port = parse_field::<u16>("port", &edit.port)?;
        let latency = parse_field::<u32>("latency", &edit.latency_ms)?;

        let input = self
            .inputs
            .iter_mut()
            .find(|i| i.position == position)
            .ok_or(RoomError::InvalidPosition(position.get()))?;

        if let Some(name) = non_blank(&edit.name) {
            input.name = name;
        }
        input.host = non_blank(&edit.host);
        input.port = port;
        input.mode = edit.mode;
        input.passphrase = non_blank(&edit.passphrase);
        input.latency_ms = latency.unwrap_or(DEFAULT_LATENCY_MS);
        input.enabled = edit.enabled;

        info!("line {} updated: {}", position, input.name);
        Ok(input)
    }

    /// Flip the enabled flag of the line at `position`. Returns the new state.
    pub fn toggle_enabled(&mut self, position: Position) -> Option<bool> {
        let input = self.inputs.iter_mut().find(|i| i.position == position)?;
        input.enabled = !input.enabled;
        Some(input.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn p(n: u8) -> Position {
        Position::new(n).unwrap()
    }

    #[test]
    fn role_permissions() {
        assert!(Role::Owner.can_write());
        assert!(Role::Commenter.can_write());
        assert!(!Role::Viewer.can_write());
        assert!(Role::Owner.can_manage());
        assert!(!Role::Commenter.can_manage());
        assert_eq!("Viewer".parse::<Role>(), Ok(Role::Viewer));
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn session_clock_runs_while_live() {
        let t0 = Utc::now();
        let mut info = SessionInfo::new("QC");
        assert_eq!(info.elapsed_ms(t0), 0);

        info.start(t0);
        assert!(info.is_live());
        assert_eq!(info.elapsed_ms(t0 + Duration::seconds(90)), 90_000);
        assert_eq!(info.clock(t0 + Duration::seconds(3723)), "01:02:03");

        info.end(t0 + Duration::seconds(100));
        assert_eq!(info.status, SessionStatus::Ended);
        assert_eq!(info.elapsed_ms(t0 + Duration::seconds(500)), 100_000);
    }

    #[test]
    fn restart_keeps_original_start() {
        let t0 = Utc::now();
        let mut info = SessionInfo::new("QC");
        info.start(t0);
        info.end(t0 + Duration::seconds(10));
        info.start(t0 + Duration::seconds(20));
        assert_eq!(info.started_at, Some(t0));
        assert_eq!(info.elapsed_ms(t0 + Duration::seconds(30)), 30_000);
    }

    #[test]
    fn notes_track_author() {
        let mut notes = SessionNotes::default();
        let now = Utc::now();
        assert!(notes.update("first take", "ana", now));
        assert!(!notes.update("first take", "ben", now));
        assert_eq!(notes.updated_by.as_deref(), Some("ana"));

        notes.append_stamped(65_000, "audio drop", "ben", now);
        assert_eq!(notes.content, "first take\n[00:01:05] audio drop\n");
        assert_eq!(notes.updated_by.as_deref(), Some("ben"));
    }

    #[test]
    fn member_initials() {
        let m = Member::new("u2", "John Smith", Role::Commenter);
        assert_eq!(m.initials(), "JS");
    }

    #[test]
    fn demo_roster_matches_default_pattern() {
        let roster = Roster::demo();
        assert_eq!(roster.len(), 4);
        let seeds = roster.seeds();
        assert_eq!(seeds[1].health, Some(HealthState::Warning));
        assert_eq!(seeds[3].health, Some(HealthState::Off));
        assert_eq!(roster.at(p(2)).unwrap().mode, SrtMode::Listener);
        assert_eq!(roster.get(&InputId::from("input-3")).unwrap().name, "Commentary");
    }

    #[test]
    fn roster_rejects_duplicate_positions() {
        let result = Roster::new(vec![
            InputConfig::new(p(1), "A"),
            InputConfig::new(p(1), "B"),
        ]);
        assert!(matches!(result, Err(RoomError::DuplicatePosition(1))));
    }

    #[test]
    fn roster_rejects_duplicate_ids() {
        let mut second = InputConfig::new(p(2), "B");
        second.id = InputId::from("cam");
        let mut first = InputConfig::new(p(1), "A");
        first.id = InputId::from("cam");

        let result = Roster::new(vec![first, second]);
        assert!(matches!(result, Err(RoomError::DuplicateInput(ref id)) if id == "cam"));
    }

    #[test]
    fn blank_id_clashing_with_explicit_id_is_rejected() {
        let mut first = InputConfig::new(p(1), "A");
        first.id = InputId::from("input-2");
        let mut second = InputConfig::new(p(2), "B");
        second.id = InputId::default();

        assert!(matches!(
            Roster::new(vec![first, second]),
            Err(RoomError::DuplicateInput(_))
        ));
    }

    #[test]
    fn roster_fills_blank_ids() {
        let mut input = InputConfig::new(p(3), "C");
        input.id = InputId::default();
        let roster = Roster::new(vec![input]).unwrap();
        assert!(roster.get(&InputId::from("input-3")).is_some());
    }

    #[test]
    fn edit_line_applies_patch() {
        let mut roster = Roster::demo();
        let mut edit = LineEdit::from_config(roster.at(p(2)).unwrap());
        edit.name = "   ".to_string();
        edit.host = " srt.example.com ".to_string();
        edit.port = "9000".to_string();
        edit.passphrase = "  ".to_string();
        edit.latency_ms = String::new();
        edit.mode = SrtMode::Caller;

        let updated = roster.edit_line(2, &edit).unwrap();
        assert_eq!(updated.name, "Backup Path");
        assert_eq!(updated.endpoint().as_deref(), Some("srt.example.com:9000"));
        assert_eq!(updated.passphrase, None);
        assert_eq!(updated.latency_ms, DEFAULT_LATENCY_MS);
        assert_eq!(updated.mode, SrtMode::Caller);
    }

    #[test]
    fn edit_line_rejects_bad_values() {
        let mut roster = Roster::demo();
        let before = roster.clone();
        let mut edit = LineEdit::from_config(roster.at(p(1)).unwrap());
        edit.port = "ninety".to_string();

        assert!(matches!(
            roster.edit_line(1, &edit),
            Err(RoomError::InvalidLine { field: "port", .. })
        ));
        assert!(matches!(roster.edit_line(7, &edit), Err(RoomError::InvalidPosition(7))));
        assert_eq!(roster, before);
    }

    #[test]
    fn prompt_text_round_trips_through_edit() {
        let mut roster = Roster::demo();
        let edit = LineEdit::from_config(roster.at(p(2)).unwrap());
        assert_eq!(edit.prompt_text(), "Backup Path; ; ; 200");

        let edit = edit.with_prompt_text("Remote Cam ; srt.example.com; 9000");
        assert_eq!(edit.latency_ms, "");
        assert_eq!(edit.mode, SrtMode::Listener);

        let updated = roster.edit_line(2, &edit).unwrap();
        assert_eq!(updated.name, "Remote Cam");
        assert_eq!(updated.endpoint().as_deref(), Some("srt.example.com:9000"));
        assert_eq!(updated.latency_ms, DEFAULT_LATENCY_MS);
        assert!(updated.enabled);
    }

    #[test]
    fn edit_line_on_empty_position() {
        let mut roster = Roster::new(vec![InputConfig::new(p(1), "Only")]).unwrap();
        let edit = LineEdit::default();
        assert!(matches!(roster.edit_line(3, &edit), Err(RoomError::InvalidPosition(3))));
    }

    #[test]
    fn toggle_enabled_flips_line() {
        let mut roster = Roster::demo();
        assert_eq!(roster.toggle_enabled(p(1)), Some(false));
        assert!(!roster.seeds()[0].enabled);
        assert_eq!(roster.toggle_enabled(p(1)), Some(true));
    }
}
