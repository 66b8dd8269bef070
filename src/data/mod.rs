//! Data models shared by the engine, the feeds and the UI.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing of duration strings (e.g., "1s", "500ms") and elapsed-clock formatting
//! - [`health`]: [`HealthState`], [`Thresholds`] classification and audio alert flags
//! - [`history`]: [`RollingHistoryBuffer`], the bounded per-input history used by charts
//! - [`marker`]: [`MarkerTimeline`], the append-only list of QC annotations
//! - [`metrics`]: [`MetricSnapshot`] and its [`HistoryPoint`] projection
//!
//! ## Data Flow
//!
//! ```text
//! TelemetryFeed (synthetic or real)
//!        │
//!        ▼
//! MetricSnapshot ──▶ HealthState (transition model or Thresholds::classify)
//!        │
//!        └──▶ HistoryPoint ──▶ RollingHistoryBuffer::append()
//! ```

pub mod duration;
pub mod health;
pub mod history;
pub mod marker;
pub mod metrics;

pub use health::{AudioAlerts, HealthState, Thresholds};
pub use history::{ChartMetric, RollingHistoryBuffer, TimeWindow, DEFAULT_HISTORY_CAPACITY};
pub use marker::{Marker, MarkerDraft, MarkerTimeline};
pub use metrics::{AudioMetrics, HistoryPoint, InputId, MetricSnapshot, NetworkMetrics, VideoMetrics};
