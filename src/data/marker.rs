//! Timeline markers: timestamped, severity-tagged annotations.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::health::HealthState;
use super::metrics::InputId;

/// A QC annotation on the session timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: Uuid,
    /// Input the marker refers to; `None` for a session-wide marker.
    pub input_id: Option<InputId>,
    /// Elapsed session time when the marker was placed.
    pub elapsed_ms: u64,
    pub label: String,
    pub severity: HealthState,
    pub note: Option<String>,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Marker {
    /// Whether this marker shows up for `input` (session-wide markers always do).
    pub fn applies_to(&self, input: &InputId) -> bool {
        self.input_id.as_ref().map_or(true, |id| id == input)
    }
}

/// Fields supplied by the caller when placing a marker.
#[derive(Debug, Clone)]
pub struct MarkerDraft {
    pub label: String,
    pub severity: HealthState,
    pub input_id: Option<InputId>,
    pub note: Option<String>,
    pub author: Option<String>,
}

impl MarkerDraft {
    pub fn new(label: impl Into<String>, severity: HealthState) -> Self {
        Self {
            label: label.into(),
            severity,
            input_id: None,
            note: None,
            author: None,
        }
    }

    pub fn on_input(mut self, input: Option<InputId>) -> Self {
        self.input_id = input;
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Append-only list of markers for a session.
///
/// Markers are kept in insertion order, which is also non-decreasing
/// elapsed-time order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkerTimeline {
    markers: Vec<Marker>,
}

impl MarkerTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a marker at `elapsed_ms`.
    pub fn add(
        &mut self,
        label: impl Into<String>,
        severity: HealthState,
        input_id: Option<InputId>,
        elapsed_ms: u64,
    ) -> &Marker {
        self.add_draft(
            MarkerDraft::new(label, severity).on_input(input_id),
            elapsed_ms,
        )
    }

    /// Place a marker with optional note and author.
    ///
    /// An elapsed time earlier than the newest marker is raised to it so the
    /// list stays chronological.
    pub fn add_draft(&mut self, draft: MarkerDraft, elapsed_ms: u64) -> &Marker {
        let floor = self.markers.last().map_or(0, |m| m.elapsed_ms);
        if elapsed_ms < floor {
            debug!("marker at {}ms predates {}ms, clamping", elapsed_ms, floor);
        }

        let index = self.markers.len();
        self.markers.push(Marker {
            id: Uuid::new_v4(),
            input_id: draft.input_id,
            elapsed_ms: elapsed_ms.max(floor),
            label: draft.label,
            severity: draft.severity,
            note: draft.note,
            author: draft.author,
            created_at: Utc::now(),
        });
        &self.markers[index]
    }

    /// Markers visible for `input`: session-wide ones plus the input's own.
    ///
    /// With `None`, every marker is returned.
    pub fn query(&self, input: Option<&InputId>) -> Vec<&Marker> {
        self.markers
            .iter()
            .filter(|m| input.map_or(true, |id| m.applies_to(id)))
            .collect()
    }

    /// Markers visible for `input` whose elapsed time falls in `window`.
    ///
    /// An empty or reversed window matches nothing.
    pub fn query_window(&self, input: Option<&InputId>, window: Range<u64>) -> Vec<&Marker> {
        if window.is_empty() {
            return Vec::new();
        }
        let start = self.markers.partition_point(|m| m.elapsed_ms < window.start);
        let end = self.markers.partition_point(|m| m.elapsed_ms < window.end);
        self.markers[start..end]
            .iter()
            .filter(|m| input.map_or(true, |id| m.applies_to(id)))
            .collect()
    }

    /// The last `n` markers visible for `input`, oldest first.
    pub fn recent(&self, input: Option<&InputId>, n: usize) -> Vec<&Marker> {
        let mut all = self.query(input);
        let skip = all.len().saturating_sub(n);
        all.drain(..skip);
        all
    }

    pub fn all(&self) -> &[Marker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a() -> InputId {
        InputId::from("input-1")
    }

    fn b() -> InputId {
        InputId::from("input-2")
    }

    fn labels(markers: &[&Marker]) -> Vec<String> {
        markers.iter().map(|m| m.label.clone()).collect()
    }

    fn sample() -> MarkerTimeline {
        let mut t = MarkerTimeline::new();
        t.add("M1", HealthState::Warning, Some(a()), 1_000);
        t.add("M2", HealthState::Error, None, 2_000);
        t.add("M3", HealthState::Ok, Some(b()), 3_000);
        t
    }

    #[test]
    fn query_includes_session_wide_markers() {
        let t = sample();
        assert_eq!(labels(&t.query(Some(&a()))), vec!["M1", "M2"]);
        assert_eq!(labels(&t.query(Some(&b()))), vec!["M2", "M3"]);
    }

    #[test]
    fn query_without_input_returns_everything() {
        let t = sample();
        assert_eq!(labels(&t.query(None)), vec!["M1", "M2", "M3"]);
    }

    #[test]
    fn add_assigns_identity() {
        let mut t = MarkerTimeline::new();
        let first = t.add("Drop", HealthState::Warning, None, 10).id;
        let second = t.add("Drop", HealthState::Warning, None, 20).id;
        assert_ne!(first, second);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn earlier_elapsed_time_is_clamped() {
        let mut t = MarkerTimeline::new();
        t.add("late", HealthState::Ok, None, 5_000);
        let m = t.add("early", HealthState::Ok, None, 1_000);
        assert_eq!(m.elapsed_ms, 5_000);
    }

    #[test]
    fn query_window_filters_by_time_and_input() {
        let t = sample();
        assert_eq!(labels(&t.query_window(None, 1_500..3_001)), vec!["M2", "M3"]);
        assert_eq!(labels(&t.query_window(Some(&a()), 0..2_500)), vec!["M1", "M2"]);
        assert!(t.query_window(None, 4_000..5_000).is_empty());
    }

    #[test]
    fn reversed_window_is_empty() {
        let t = sample();
        assert!(t.query_window(None, 3_000..1_000).is_empty());
        assert!(t.query_window(Some(&a()), 2_000..2_000).is_empty());
    }

    #[test]
    fn recent_keeps_latest() {
        let t = sample();
        assert_eq!(labels(&t.recent(None, 2)), vec!["M2", "M3"]);
        assert_eq!(labels(&t.recent(Some(&a()), 5)), vec!["M1", "M2"]);
    }

    #[test]
    fn draft_carries_note_and_author() {
        let mut t = MarkerTimeline::new();
        let m = t.add_draft(
            MarkerDraft::new("Lip sync", HealthState::Warning)
                .on_input(Some(a()))
                .note("~2 frames late")
                .author("jane"),
            42,
        );
        assert_eq!(m.note.as_deref(), Some("~2 frames late"));
        assert_eq!(m.author.as_deref(), Some("jane"));
        assert_eq!(m.input_id, Some(a()));
    }
}
