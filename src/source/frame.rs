//! Telemetry frames: the wire shape shared by the file, channel and stream
//! feeds.
//!
//! A frame maps input ids to their latest measured values. Every group and
//! field is optional; an input missing from the frame has no signal.
//!
//! ```json
//! {
//!   "input-1": {
//!     "video":   { "codec": "H.264", "bitrate_kbps": 7800 },
//!     "network": { "rtt_ms": 31, "packet_loss_pct": 0.2 },
//!     "audio":   { "lufs_momentary": -22.5, "peak_db": -4.0 }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Reading;
use crate::data::{AudioMetrics, InputId, MetricSnapshot, NetworkMetrics, Thresholds, VideoMetrics};

/// One frame of telemetry, keyed by input.
pub type TelemetryFrame = BTreeMap<InputId, FrameReading>;

/// Measured values for one input within a frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameReading {
    pub video: VideoMetrics,
    pub network: NetworkMetrics,
    pub audio: AudioMetrics,
}

impl FrameReading {
    /// Stamp these values as a snapshot for `input` taken `at`.
    pub fn to_snapshot(&self, input: &InputId, at: DateTime<Utc>) -> MetricSnapshot {
        MetricSnapshot {
            input_id: input.clone(),
            taken_at: at,
            video: self.video.clone(),
            network: self.network.clone(),
            audio: self.audio.clone(),
        }
    }
}

/// Latest frame received by a feed plus the thresholds used to classify it.
///
/// Held values only count while the feed is healthy: after [`fail`] or once
/// the frame is older than the staleness bound every input reads as off.
///
/// [`fail`]: FrameCache::fail
#[derive(Debug, Default)]
pub(crate) struct FrameCache {
    frame: TelemetryFrame,
    thresholds: Thresholds,
    received_at: Option<DateTime<Utc>>,
    stale_after: Option<chrono::Duration>,
    failed: bool,
}

impl FrameCache {
    pub(crate) fn replace(&mut self, frame: TelemetryFrame, at: DateTime<Utc>) {
        self.frame = frame;
        self.received_at = Some(at);
        self.failed = false;
    }

    /// The feed closed or broke; held values no longer describe the inputs.
    pub(crate) fn fail(&mut self) {
        self.failed = true;
    }

    pub(crate) fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    pub(crate) fn set_stale_after(&mut self, bound: std::time::Duration) {
        self.stale_after = chrono::Duration::from_std(bound).ok();
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match (self.stale_after, self.received_at) {
            (Some(bound), Some(at)) => now - at > bound,
            _ => false,
        }
    }

    /// The held values for `input`, restamped `now` and classified.
    pub(crate) fn reading(&self, input: &InputId, now: DateTime<Utc>) -> Reading {
        if self.failed || self.is_stale(now) {
            return Reading::off(input.clone(), now);
        }
        match self.frame.get(input) {
            Some(values) => {
                let snapshot = values.to_snapshot(input, now);
                Reading::new(self.thresholds.classify(&snapshot), snapshot)
            }
            None => Reading::off(input.clone(), now),
        }
    }

    #[cfg(test)]
    pub(crate) fn frame(&self) -> &TelemetryFrame {
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::HealthState;

    #[test]
    fn test_deserialize_frame() {
        let json = r#"{
            "input-1": {
                "video": { "codec": "H.264", "bitrate_kbps": 7800 },
                "network": { "rtt_ms": 31, "packet_loss_pct": 0.2 }
            },
            "input-2": {}
        }"#;

        let frame: TelemetryFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.len(), 2);

        let one = frame.get(&InputId::from("input-1")).unwrap();
        assert_eq!(one.video.bitrate_kbps, Some(7800));
        assert_eq!(one.network.rtt_ms, Some(31));
        assert!(one.audio.lufs_momentary.is_none());

        let two = frame.get(&InputId::from("input-2")).unwrap();
        assert_eq!(two, &FrameReading::default());
    }

    #[test]
    fn cache_classifies_held_values() {
        let mut cache = FrameCache::default();
        let mut frame = TelemetryFrame::new();
        frame.insert(
            InputId::from("input-1"),
            FrameReading {
                network: NetworkMetrics {
                    packet_loss_pct: Some(7.5),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        let now = Utc::now();
        cache.replace(frame, now);

        let reading = cache.reading(&InputId::from("input-1"), now);
        assert_eq!(reading.health, HealthState::Error);
        assert_eq!(reading.metrics.taken_at, now);
    }

    #[test]
    fn cache_reports_missing_inputs_off() {
        let cache = FrameCache::default();
        let reading = cache.reading(&InputId::from("input-9"), Utc::now());
        assert_eq!(reading.health, HealthState::Off);
        assert!(reading.metrics.is_empty());
    }

    fn healthy_frame() -> TelemetryFrame {
        let mut frame = TelemetryFrame::new();
        frame.insert(
            InputId::from("input-1"),
            FrameReading {
                video: VideoMetrics {
                    bitrate_kbps: Some(7800),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        frame
    }

    #[test]
    fn failed_cache_reads_off_until_next_frame() {
        let id = InputId::from("input-1");
        let now = Utc::now();
        let mut cache = FrameCache::default();
        cache.replace(healthy_frame(), now);
        cache.fail();

        let reading = cache.reading(&id, now);
        assert_eq!(reading.health, HealthState::Off);
        assert!(reading.metrics.is_empty());

        cache.replace(healthy_frame(), now);
        assert_eq!(cache.reading(&id, now).health, HealthState::Ok);
    }

    #[test]
    fn stale_frame_reads_off() {
        let id = InputId::from("input-1");
        let at = Utc::now();
        let mut cache = FrameCache::default();
        cache.set_stale_after(std::time::Duration::from_secs(5));
        cache.replace(healthy_frame(), at);

        let fresh = at + chrono::Duration::seconds(5);
        assert_eq!(cache.reading(&id, fresh).health, HealthState::Ok);

        let stale = at + chrono::Duration::seconds(6);
        assert_eq!(cache.reading(&id, stale).health, HealthState::Off);
    }
}
