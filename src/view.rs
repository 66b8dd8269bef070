//! What the user is looking at: selection, audio, inspector, fullscreen and
//! multiview layout.
//!
//! [`ViewCoordinator`] is the single writer of [`ViewState`]. It knows nothing
//! about the terminal; key events arrive as [`Key`] values tagged with where
//! focus was, and layout comes out as a [`RenderPlan`] over four
//! [`TileSlot`]s.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{HealthState, InputId, MetricSnapshot};
use crate::engine::EngineSnapshot;
use crate::error::{Result, RoomError};

/// Number of input slots in the multiview.
pub const SLOT_COUNT: usize = 4;

/// Slot position of an input, 1 through 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Position(u8);

impl Position {
    pub const ALL: [Position; SLOT_COUNT] = [Position(1), Position(2), Position(3), Position(4)];

    pub fn new(n: u8) -> Result<Self> {
        if (1..=SLOT_COUNT as u8).contains(&n) {
            Ok(Self(n))
        } else {
            Err(RoomError::InvalidPosition(n))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based slot index.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// The following position, wrapping 4 back to 1.
    pub fn next(self) -> Self {
        Self(self.0 % SLOT_COUNT as u8 + 1)
    }

    /// Position for a digit key, if it names one.
    pub fn from_digit(c: char) -> Option<Self> {
        c.to_digit(10).and_then(|d| Self::new(d as u8).ok())
    }
}

impl TryFrom<u8> for Position {
    type Error = RoomError;

    fn try_from(n: u8) -> Result<Self> {
        Self::new(n)
    }
}

impl From<Position> for u8 {
    fn from(p: Position) -> u8 {
        p.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Multiview layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// One large tile.
    Single,
    /// Positions 1 and 2 side by side.
    Dual,
    /// The selected input large plus two others.
    PrimaryPlusTwo,
    /// All four in a 2x2 grid.
    #[default]
    Quad,
}

impl ViewMode {
    pub const ALL: [ViewMode; 4] = [
        ViewMode::Single,
        ViewMode::Dual,
        ViewMode::PrimaryPlusTwo,
        ViewMode::Quad,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::Single => "1-up",
            ViewMode::Dual => "2-up",
            ViewMode::PrimaryPlusTwo => "1+2",
            ViewMode::Quad => "2x2",
        }
    }

    /// Number of tiles this mode shows.
    pub fn slot_count(&self) -> usize {
        match self {
            ViewMode::Single => 1,
            ViewMode::Dual => 2,
            ViewMode::PrimaryPlusTwo => 3,
            ViewMode::Quad => 4,
        }
    }

    pub fn next(self) -> Self {
        match self {
            ViewMode::Single => ViewMode::Dual,
            ViewMode::Dual => ViewMode::PrimaryPlusTwo,
            ViewMode::PrimaryPlusTwo => ViewMode::Quad,
            ViewMode::Quad => ViewMode::Single,
        }
    }
}

/// Inspector panel tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectorTab {
    #[default]
    Details,
    Audio,
    Timeline,
    Notes,
    People,
}

impl InspectorTab {
    pub const ALL: [InspectorTab; 5] = [
        InspectorTab::Details,
        InspectorTab::Audio,
        InspectorTab::Timeline,
        InspectorTab::Notes,
        InspectorTab::People,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            InspectorTab::Details => "Details",
            InspectorTab::Audio => "Audio",
            InspectorTab::Timeline => "Timeline",
            InspectorTab::Notes => "Notes",
            InspectorTab::People => "People",
        }
    }

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

/// The view state. Only [`ViewCoordinator`] mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub selected: Option<Position>,
    pub active_audio: Option<Position>,
    pub inspector_open: bool,
    pub inspector_tab: InspectorTab,
    /// When set, the grid is replaced by this one tile.
    pub fullscreen: Option<Position>,
    pub view_mode: ViewMode,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            selected: Some(Position(1)),
            active_audio: Some(Position(1)),
            inspector_open: false,
            inspector_tab: InspectorTab::Details,
            fullscreen: None,
            view_mode: ViewMode::Quad,
        }
    }
}

/// A key press, independent of the terminal backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
    Tab,
    Other,
}

/// Where keyboard focus was when a key arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// The multiview or inspector; shortcuts apply.
    Canvas,
    /// A text prompt or editor; keys belong to the text.
    TextEntry,
}

/// What a key did to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Not a view shortcut, or suppressed by focus.
    Ignored,
    Handled,
    /// Fullscreen was set on this position; the presenter should enter it.
    EnterFullscreen(Position),
    /// Fullscreen was cleared; the presenter should leave it.
    ExitFullscreen,
}

/// Single owner of [`ViewState`].
#[derive(Debug, Clone, Default)]
pub struct ViewCoordinator {
    state: ViewState,
}

impl ViewCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn select(&mut self, position: Position) {
        self.state.selected = Some(position);
    }

    pub fn toggle_inspector(&mut self) {
        self.state.inspector_open = !self.state.inspector_open;
    }

    pub fn close_inspector(&mut self) {
        self.state.inspector_open = false;
    }

    /// Open the inspector on `position`'s details.
    pub fn inspect(&mut self, position: Position) {
        self.state.selected = Some(position);
        self.state.inspector_open = true;
        self.state.inspector_tab = InspectorTab::Details;
    }

    /// Make `position` the one input with active audio.
    pub fn set_audio(&mut self, position: Position) {
        self.state.active_audio = Some(position);
    }

    /// Move active audio to the next position, 1 after 4 or after none.
    pub fn cycle_audio(&mut self) {
        let next = match self.state.active_audio {
            Some(p) => p.next(),
            None => Position(1),
        };
        self.state.active_audio = Some(next);
    }

    /// Enter fullscreen on `position`, or leave it with `None`. The grid
    /// mode underneath is untouched.
    pub fn set_fullscreen(&mut self, position: Option<Position>) {
        self.state.fullscreen = position;
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.state.view_mode = mode;
    }

    pub fn cycle_view_mode(&mut self) {
        self.state.view_mode = self.state.view_mode.next();
    }

    pub fn set_tab(&mut self, tab: InspectorTab) {
        self.state.inspector_tab = tab;
    }

    pub fn next_tab(&mut self) {
        self.state.inspector_tab = self.state.inspector_tab.next();
    }

    /// Apply a view shortcut.
    ///
    /// Escape during fullscreen is handled first, whatever has focus. Every
    /// other shortcut is ignored while focus is in a text entry.
    pub fn handle_key(&mut self, key: Key, focus: Focus) -> KeyOutcome {
        if key == Key::Escape && self.state.fullscreen.is_some() {
            self.set_fullscreen(None);
            return KeyOutcome::ExitFullscreen;
        }
        if focus == Focus::TextEntry {
            return KeyOutcome::Ignored;
        }

        match key {
            Key::Char(c) => {
                if let Some(position) = Position::from_digit(c) {
                    self.select(position);
                    return KeyOutcome::Handled;
                }
                match c.to_ascii_lowercase() {
                    'i' => self.toggle_inspector(),
                    'a' => self.cycle_audio(),
                    'v' => self.cycle_view_mode(),
                    'f' => {
                        return match self.state.selected {
                            Some(position) => {
                                self.set_fullscreen(Some(position));
                                KeyOutcome::EnterFullscreen(position)
                            }
                            None => KeyOutcome::Ignored,
                        };
                    }
                    _ => return KeyOutcome::Ignored,
                }
                KeyOutcome::Handled
            }
            Key::Tab if self.state.inspector_open => {
                self.next_tab();
                KeyOutcome::Handled
            }
            _ => KeyOutcome::Ignored,
        }
    }

    /// Which tiles to draw, and how.
    pub fn render_plan(&self, slots: &[TileSlot; SLOT_COUNT]) -> RenderPlan {
        if let Some(position) = self.state.fullscreen {
            return RenderPlan::Fullscreen(slots[position.index()].clone());
        }
        RenderPlan::Grid {
            mode: self.state.view_mode,
            slots: visible_slots(&self.state, slots),
        }
    }
}

/// One multiview slot: a configured input, or a placeholder for an empty
/// position.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSlot {
    pub position: Position,
    /// `None` for a placeholder.
    pub input_id: Option<InputId>,
    pub name: String,
    pub health: HealthState,
    pub metrics: Option<MetricSnapshot>,
}

impl TileSlot {
    /// Stand-in for a position with no configured input.
    pub fn placeholder(position: Position) -> Self {
        Self {
            position,
            input_id: None,
            name: format!("Input {}", position),
            health: HealthState::Off,
            metrics: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.input_id.is_none()
    }
}

/// A configured input as far as the multiview cares.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotInput {
    pub position: Position,
    pub id: InputId,
    pub name: String,
}

/// Fill all four positions from the configured inputs and engine state.
///
/// Untracked inputs show as off; empty positions get placeholders.
pub fn build_slots<'a>(
    inputs: impl IntoIterator<Item = &'a SlotInput>,
    snapshot: &EngineSnapshot,
) -> [TileSlot; SLOT_COUNT] {
    let mut slots = Position::ALL.map(TileSlot::placeholder);
    for input in inputs {
        let state = snapshot.get(&input.id);
        slots[input.position.index()] = TileSlot {
            position: input.position,
            input_id: Some(input.id.clone()),
            name: input.name.clone(),
            health: state.map_or(HealthState::Off, |s| s.health),
            metrics: state
                .filter(|s| s.health.has_signal())
                .map(|s| s.metrics.clone()),
        };
    }
    slots
}

/// Tiles shown by the grid for the current mode.
pub fn visible_slots(state: &ViewState, slots: &[TileSlot; SLOT_COUNT]) -> Vec<TileSlot> {
    let primary = state.selected.unwrap_or(Position(1));
    match state.view_mode {
        ViewMode::Single => vec![slots[primary.index()].clone()],
        ViewMode::Dual => slots[..2].to_vec(),
        ViewMode::PrimaryPlusTwo => std::iter::once(&slots[primary.index()])
            .chain(slots.iter().filter(|s| s.position != primary).take(2))
            .cloned()
            .collect(),
        ViewMode::Quad => slots.to_vec(),
    }
}

/// How the canvas should be drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPlan {
    Grid { mode: ViewMode, slots: Vec<TileSlot> },
    /// One tile covering the whole canvas; the grid is suppressed.
    Fullscreen(TileSlot),
}

impl RenderPlan {
    pub fn slots(&self) -> &[TileSlot] {
        match self {
            RenderPlan::Grid { slots, .. } => slots,
            RenderPlan::Fullscreen(slot) => std::slice::from_ref(slot),
        }
    }
}
