//! Metric snapshots and their history projection.
//!
//! These types are the common shape shared by the synthetic generator and any
//! real telemetry feed. They serialize to the same JSON a telemetry frame
//! carries, with every measurable field optional.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of an input within a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputId(String);

impl InputId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InputId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InputId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Video stream characteristics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoMetrics {
    pub codec: Option<String>,
    pub resolution: Option<String>,
    pub fps: Option<f64>,
    pub bitrate_kbps: Option<u32>,
}

/// Transport link characteristics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkMetrics {
    pub rtt_ms: Option<u32>,
    pub packet_loss_pct: Option<f64>,
    pub retransmits: Option<u32>,
    pub jitter_ms: Option<u32>,
}

/// Loudness and peak levels of the audio program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioMetrics {
    /// Momentary loudness (400 ms window), LUFS.
    pub lufs_momentary: Option<f64>,
    /// Short-term loudness (3 s window), LUFS.
    pub lufs_short_term: Option<f64>,
    /// Integrated loudness, LUFS.
    pub lufs_integrated: Option<f64>,
    pub peak_db: Option<f64>,
    pub true_peak_dbtp: Option<f64>,
    pub channels: Option<String>,
    pub sample_rate_hz: Option<u32>,
}

/// The current technical reading for one input.
///
/// A snapshot is always replaced as a whole; nothing mutates one in place
/// once it has been published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub input_id: InputId,
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub video: VideoMetrics,
    #[serde(default)]
    pub network: NetworkMetrics,
    #[serde(default)]
    pub audio: AudioMetrics,
}

impl MetricSnapshot {
    /// A snapshot with only identity and timestamp populated.
    pub fn off(input_id: InputId, taken_at: DateTime<Utc>) -> Self {
        Self {
            input_id,
            taken_at,
            video: VideoMetrics::default(),
            network: NetworkMetrics::default(),
            audio: AudioMetrics::default(),
        }
    }

    /// Returns true if any measurable field is present.
    pub fn has_signal(&self) -> bool {
        let v = &self.video;
        let n = &self.network;
        let a = &self.audio;
        v.codec.is_some()
            || v.resolution.is_some()
            || v.fps.is_some()
            || v.bitrate_kbps.is_some()
            || n.rtt_ms.is_some()
            || n.packet_loss_pct.is_some()
            || n.retransmits.is_some()
            || n.jitter_ms.is_some()
            || a.lufs_momentary.is_some()
            || a.lufs_short_term.is_some()
            || a.lufs_integrated.is_some()
            || a.peak_db.is_some()
            || a.true_peak_dbtp.is_some()
            || a.channels.is_some()
            || a.sample_rate_hz.is_some()
    }

    /// Returns true if every measurable field is absent.
    pub fn is_empty(&self) -> bool {
        !self.has_signal()
    }
}

/// Minimal projection of a snapshot kept in the rolling history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub bitrate_kbps: Option<u32>,
    pub packet_loss_pct: Option<f64>,
    pub rtt_ms: Option<u32>,
    pub lufs_momentary: Option<f64>,
}

impl HistoryPoint {
    /// A point with no values, used for gaps.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            bitrate_kbps: None,
            packet_loss_pct: None,
            rtt_ms: None,
            lufs_momentary: None,
        }
    }
}

impl From<&MetricSnapshot> for HistoryPoint {
    fn from(snapshot: &MetricSnapshot) -> Self {
        Self {
            timestamp: snapshot.taken_at,
            bitrate_kbps: snapshot.video.bitrate_kbps,
            packet_loss_pct: snapshot.network.packet_loss_pct,
            rtt_ms: snapshot.network.rtt_ms,
            lufs_momentary: snapshot.audio.lufs_momentary,
        }
    }
}
