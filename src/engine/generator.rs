//! Synthetic metric generator.
//!
//! Produces one snapshot for an input around health-dependent baselines.
//! Every value goes through the same [`jitter`] function so variance means
//! the same thing for every metric.

use chrono::{DateTime, Utc};

use super::random::RandomSource;
use crate::data::{AudioMetrics, HealthState, InputId, MetricSnapshot, NetworkMetrics, VideoMetrics};

/// A baseline value and its maximum deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub base: f64,
    pub variance: f64,
}

const fn spread(base: f64, variance: f64) -> Spread {
    Spread { base, variance }
}

/// Baselines for the link and level metrics at one health level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profile {
    pub bitrate_kbps: Spread,
    pub rtt_ms: Spread,
    pub packet_loss_pct: Spread,
    pub retransmits: Spread,
    pub jitter_ms: Spread,
    pub peak_db: Spread,
    pub true_peak_dbtp: Spread,
}

const HEALTHY: Profile = Profile {
    bitrate_kbps: spread(8000.0, 500.0),
    rtt_ms: spread(25.0, 5.0),
    packet_loss_pct: spread(0.1, 0.1),
    retransmits: spread(2.0, 2.0),
    jitter_ms: spread(3.0, 1.0),
    peak_db: spread(-6.0, 2.0),
    true_peak_dbtp: spread(-5.0, 1.5),
};

// Peaks sit near clipping and true peak above 0 dBTP so the audio tab runs hot.
const DEGRADED: Profile = Profile {
    bitrate_kbps: spread(4500.0, 2000.0),
    rtt_ms: spread(120.0, 50.0),
    packet_loss_pct: spread(2.5, 1.5),
    retransmits: spread(25.0, 15.0),
    jitter_ms: spread(15.0, 5.0),
    peak_db: spread(-0.5, 2.0),
    true_peak_dbtp: spread(0.5, 1.5),
};

const FAILING: Profile = Profile {
    packet_loss_pct: spread(8.0, 1.5),
    peak_db: spread(-6.0, 2.0),
    true_peak_dbtp: spread(-5.0, 1.5),
    ..DEGRADED
};

/// Loudness is measured independently of link health.
const LUFS_MOMENTARY: Spread = spread(-23.0, 4.0);
const LUFS_SHORT_TERM: Spread = spread(-24.0, 2.0);
const LUFS_INTEGRATED: Spread = spread(-24.0, 1.0);
const FRAME_RATE: Spread = spread(59.94, 0.5);

const VIDEO_CODEC: &str = "H.264";
const VIDEO_RESOLUTION: &str = "1920x1080";
const AUDIO_CHANNELS: &str = "2.0 (Stereo)";
const AUDIO_SAMPLE_RATE_HZ: u32 = 48_000;

impl Profile {
    /// Baselines for a health level; `None` for `Off`.
    pub fn for_health(health: HealthState) -> Option<Profile> {
        match health {
            HealthState::Ok => Some(HEALTHY),
            HealthState::Warning => Some(DEGRADED),
            HealthState::Error => Some(FAILING),
            HealthState::Off => None,
        }
    }
}

/// `base + uniform(-variance, variance)`.
pub fn jitter(rng: &mut dyn RandomSource, s: Spread) -> f64 {
    s.base + (rng.next_f64() - 0.5) * 2.0 * s.variance
}

/// Jitter rounded to a whole non-negative count.
fn jitter_count(rng: &mut dyn RandomSource, s: Spread) -> u32 {
    jitter(rng, s).round().max(0.0) as u32
}

/// Jitter rounded to `decimals` places.
fn jitter_decimal(rng: &mut dyn RandomSource, s: Spread, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (jitter(rng, s) * scale).round() / scale
}

/// Generates synthetic snapshots from an injected random source.
pub struct MetricGenerator {
    rng: Box<dyn RandomSource>,
}

impl std::fmt::Debug for MetricGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricGenerator").finish_non_exhaustive()
    }
}

impl MetricGenerator {
    pub fn new(rng: Box<dyn RandomSource>) -> Self {
        Self { rng }
    }

    /// Produce a snapshot for `input_id` at `health`, stamped `now`.
    ///
    /// `Off` yields a snapshot with every measurable field absent.
    pub fn generate(
        &mut self,
        input_id: &InputId,
        health: HealthState,
        now: DateTime<Utc>,
    ) -> MetricSnapshot {
        let Some(profile) = Profile::for_health(health) else {
            return MetricSnapshot::off(input_id.clone(), now);
        };
        let rng = self.rng.as_mut();

        let video = VideoMetrics {
            codec: Some(VIDEO_CODEC.to_string()),
            resolution: Some(VIDEO_RESOLUTION.to_string()),
            fps: Some(jitter_decimal(rng, FRAME_RATE, 2)),
            bitrate_kbps: Some(jitter_count(rng, profile.bitrate_kbps)),
        };

        let network = NetworkMetrics {
            rtt_ms: Some(jitter_count(rng, profile.rtt_ms)),
            packet_loss_pct: Some(jitter_decimal(rng, profile.packet_loss_pct, 2)),
            retransmits: Some(jitter_count(rng, profile.retransmits)),
            jitter_ms: Some(jitter_count(rng, profile.jitter_ms)),
        };

        let audio = AudioMetrics {
            lufs_momentary: Some(jitter_decimal(rng, LUFS_MOMENTARY, 1)),
            lufs_short_term: Some(jitter_decimal(rng, LUFS_SHORT_TERM, 1)),
            lufs_integrated: Some(jitter_decimal(rng, LUFS_INTEGRATED, 1)),
            peak_db: Some(jitter_decimal(rng, profile.peak_db, 1)),
            true_peak_dbtp: Some(jitter_decimal(rng, profile.true_peak_dbtp, 1)),
            channels: Some(AUDIO_CHANNELS.to_string()),
            sample_rate_hz: Some(AUDIO_SAMPLE_RATE_HZ),
        };

        MetricSnapshot {
            input_id: input_id.clone(),
            taken_at: now,
            video,
            network,
            audio,
        }
    }
}
