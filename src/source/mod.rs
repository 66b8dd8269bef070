//! Telemetry feeds: where the engine's readings come from.
//!
//! The engine never produces metrics itself. Each tick it asks a
//! [`TelemetryFeed`] for one [`Reading`] per input. The synthetic feed drives
//! health with a transition model and generates matching metrics; the other
//! feeds carry real telemetry frames and classify health from the values with
//! [`Thresholds`](crate::data::Thresholds).

mod channel;
mod file;
mod frame;
mod stream;
mod synthetic;

pub use channel::ChannelFeed;
pub use file::FileFeed;
pub use frame::{FrameReading, TelemetryFrame};
pub use stream::StreamFeed;
pub use synthetic::SyntheticFeed;

use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::data::{HealthState, HistoryPoint, InputId, MetricSnapshot};

/// A health classification paired with the snapshot it describes.
///
/// Construction keeps the pair consistent: metrics are present iff the health
/// is not `Off`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub health: HealthState,
    pub metrics: MetricSnapshot,
}

impl Reading {
    pub fn new(health: HealthState, metrics: MetricSnapshot) -> Self {
        if health == HealthState::Off || metrics.is_empty() {
            let MetricSnapshot {
                input_id, taken_at, ..
            } = metrics;
            return Self::off(input_id, taken_at);
        }
        Self { health, metrics }
    }

    /// No signal.
    pub fn off(input_id: InputId, at: DateTime<Utc>) -> Self {
        Self {
            health: HealthState::Off,
            metrics: MetricSnapshot::off(input_id, at),
        }
    }
}

/// Trait for anything that can supply per-input readings to the engine.
///
/// Implementations must not block: the engine calls them from its tick.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use session_room::data::{HealthState, InputId};
/// use session_room::source::{SyntheticFeed, TelemetryFeed};
///
/// let mut feed = SyntheticFeed::seeded(7);
/// let reading = feed.sample(&InputId::from("input-1"), HealthState::Ok, Utc::now());
/// assert!(reading.metrics.video.bitrate_kbps.is_some());
/// ```
pub trait TelemetryFeed: Send + Debug {
    /// Pull whatever new data is available. Called once before each tick.
    fn refresh(&mut self) {}

    /// Reading for `input` at `health` without moving health forward.
    ///
    /// Feeds that measure real signals ignore `health` and classify the
    /// values they hold.
    fn sample(&mut self, input: &InputId, health: HealthState, now: DateTime<Utc>) -> Reading;

    /// Next reading for `input`, given its current health.
    fn advance(&mut self, input: &InputId, current: HealthState, now: DateTime<Utc>) -> Reading {
        self.sample(input, current, now)
    }

    /// Points to pre-fill history with, oldest first, spaced `spacing` apart
    /// and ending at `now`. Feeds with no history of their own return nothing.
    fn backfill(
        &mut self,
        _input: &InputId,
        _health: HealthState,
        _points: usize,
        _spacing: Duration,
        _now: DateTime<Utc>,
    ) -> Vec<HistoryPoint> {
        Vec::new()
    }

    /// Human-readable description for the status bar.
    fn description(&self) -> &str;

    /// The last problem the feed ran into, if any.
    fn error(&self) -> Option<String>;
}
