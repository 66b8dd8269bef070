//! Rolling per-input history for charts, sparklines and marker overlays.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::metrics::HistoryPoint;

/// Default number of points kept per input (10 minutes at 1 Hz).
pub const DEFAULT_HISTORY_CAPACITY: usize = 600;

/// Fixed-capacity, time-ordered history of metric points.
///
/// Appending at capacity evicts the oldest point first, so the buffer always
/// holds the most recent `capacity` points in their original order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingHistoryBuffer {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl Default for RollingHistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl RollingHistoryBuffer {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point, evicting the oldest one when full.
    ///
    /// Timestamps never go backwards: a point older than the newest one is
    /// stamped with the newest timestamp instead.
    pub fn append(&mut self, mut point: HistoryPoint) {
        if let Some(last) = self.points.back() {
            if point.timestamp < last.timestamp {
                debug!(
                    "history point at {} predates {}, clamping",
                    point.timestamp, last.timestamp
                );
                point.timestamp = last.timestamp;
            }
        }

        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// All points, oldest first.
    pub fn snapshot(&self) -> Vec<HistoryPoint> {
        self.points.iter().cloned().collect()
    }

    /// The most recent `min(n, len)` points, oldest first.
    ///
    /// One point is produced per tick, so `n` doubles as a window in seconds
    /// at the default cadence.
    pub fn windowed(&self, n: usize) -> Vec<HistoryPoint> {
        self.window_iter(n).cloned().collect()
    }

    /// Borrowing variant of [`windowed`](Self::windowed).
    pub fn window_iter(&self, n: usize) -> impl Iterator<Item = &HistoryPoint> {
        let skip = self.points.len().saturating_sub(n);
        self.points.iter().skip(skip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values of one metric over the last `n` points (gaps included as `None`).
    pub fn series(&self, metric: ChartMetric, n: usize) -> Vec<Option<f64>> {
        self.window_iter(n).map(|p| metric.value(p)).collect()
    }

    /// Sparkline levels (0-7) of one metric over the last `n` points.
    ///
    /// Gaps are skipped. Returns an empty Vec with fewer than two values.
    pub fn sparkline(&self, metric: ChartMetric, n: usize) -> Vec<u8> {
        let values: Vec<f64> = self.window_iter(n).filter_map(|p| metric.value(p)).collect();
        normalize_sparkline(&values)
    }
}

/// Normalize values to the 0-7 range for sparkline display.
fn normalize_sparkline(values: &[f64]) -> Vec<u8> {
    if values.len() < 2 {
        return Vec::new();
    }

    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    let range = max - min;

    values
        .iter()
        .map(|&v| {
            if range <= f64::EPSILON {
                3
            } else {
                (((v - min) / range) * 7.0).round().min(7.0) as u8
            }
        })
        .collect()
}

/// A metric plotted on the quality timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartMetric {
    Bitrate,
    PacketLoss,
    Rtt,
    LufsMomentary,
}

impl ChartMetric {
    pub const ALL: [ChartMetric; 4] = [
        ChartMetric::Bitrate,
        ChartMetric::PacketLoss,
        ChartMetric::Rtt,
        ChartMetric::LufsMomentary,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChartMetric::Bitrate => "Bitrate",
            ChartMetric::PacketLoss => "Packet Loss",
            ChartMetric::Rtt => "RTT",
            ChartMetric::LufsMomentary => "LUFS-M",
        }
    }

    pub fn value(&self, point: &HistoryPoint) -> Option<f64> {
        match self {
            ChartMetric::Bitrate => point.bitrate_kbps.map(f64::from),
            ChartMetric::PacketLoss => point.packet_loss_pct,
            ChartMetric::Rtt => point.rtt_ms.map(f64::from),
            ChartMetric::LufsMomentary => point.lufs_momentary,
        }
    }

    /// Format a value in this metric's display unit.
    pub fn format(&self, value: Option<f64>) -> String {
        let Some(v) = value else {
            return "--".to_string();
        };
        match self {
            ChartMetric::Bitrate => format!("{:.1} Mbps", v / 1000.0),
            ChartMetric::PacketLoss => format!("{:.2}%", v),
            ChartMetric::Rtt => format!("{} ms", v.round() as i64),
            ChartMetric::LufsMomentary => format!("{:.1} LUFS", v),
        }
    }

    /// Fixed chart range, if the metric has one.
    pub fn domain(&self) -> Option<(f64, f64)> {
        match self {
            ChartMetric::PacketLoss => Some((0.0, 5.0)),
            ChartMetric::LufsMomentary => Some((-40.0, 0.0)),
            _ => None,
        }
    }
}

/// Time window selectable on the quality timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    ThirtySeconds,
    #[default]
    TwoMinutes,
    TenMinutes,
}

impl TimeWindow {
    pub fn seconds(&self) -> usize {
        match self {
            TimeWindow::ThirtySeconds => 30,
            TimeWindow::TwoMinutes => 120,
            TimeWindow::TenMinutes => 600,
        }
    }

    pub fn next(self) -> Self {
        match self {
            TimeWindow::ThirtySeconds => TimeWindow::TwoMinutes,
            TimeWindow::TwoMinutes => TimeWindow::TenMinutes,
            TimeWindow::TenMinutes => TimeWindow::ThirtySeconds,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeWindow::ThirtySeconds => "30s",
            TimeWindow::TwoMinutes => "2m",
            TimeWindow::TenMinutes => "10m",
        }
    }
}
