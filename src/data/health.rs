//! Discrete health classification for inputs.
//!
//! Synthetic feeds move health through a Markov model; real telemetry feeds
//! derive it from the continuous signal values using [`Thresholds`].

use serde::{Deserialize, Serialize};

use super::metrics::{AudioMetrics, MetricSnapshot};

/// Health of a single input, also reused as the severity of a marker.
///
/// Ordered from best to worst so that `max()` picks the most severe level;
/// `Off` sorts last but is never produced by combining levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
    Warning,
    Error,
    Off,
}

impl HealthState {
    /// All states, in display order.
    pub const ALL: [HealthState; 4] = [
        HealthState::Ok,
        HealthState::Warning,
        HealthState::Error,
        HealthState::Off,
    ];

    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            HealthState::Ok => "OK",
            HealthState::Warning => "WARN",
            HealthState::Error => "ERR",
            HealthState::Off => "OFF",
        }
    }

    /// Returns a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            HealthState::Ok => "Healthy",
            HealthState::Warning => "Warning",
            HealthState::Error => "Error",
            HealthState::Off => "No Signal",
        }
    }

    /// Whether the input is expected to carry metrics in this state.
    pub fn has_signal(&self) -> bool {
        !matches!(self, HealthState::Off)
    }

    /// Default health for the input at `index` when none is configured.
    ///
    /// Cycles ok, warning, ok, off.
    pub fn default_for_index(index: usize) -> Self {
        const PATTERN: [HealthState; 4] = [
            HealthState::Ok,
            HealthState::Warning,
            HealthState::Ok,
            HealthState::Off,
        ];
        PATTERN[index % PATTERN.len()]
    }
}

impl std::str::FromStr for HealthState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => Ok(HealthState::Ok),
            "warning" | "warn" => Ok(HealthState::Warning),
            "error" | "err" => Ok(HealthState::Error),
            "off" => Ok(HealthState::Off),
            other => Err(format!("unknown health state: {}", other)),
        }
    }
}

/// Thresholds for deriving health from continuous signal values.
///
/// Used by feeds that carry real telemetry; the synthetic feed ignores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Packet loss percentage that triggers a warning.
    pub packet_loss_warning: f64,
    /// Packet loss percentage that triggers an error.
    pub packet_loss_error: f64,
    /// Round-trip time (ms) that triggers a warning.
    pub rtt_warning_ms: u32,
    /// Round-trip time (ms) that triggers an error.
    pub rtt_error_ms: u32,
    /// Bitrate (kbps) below which the input is in warning.
    pub bitrate_warning_kbps: u32,
    /// Bitrate (kbps) below which the input is in error.
    pub bitrate_error_kbps: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            packet_loss_warning: 1.0,
            packet_loss_error: 5.0,
            rtt_warning_ms: 80,
            rtt_error_ms: 250,
            bitrate_warning_kbps: 2000,
            bitrate_error_kbps: 500,
        }
    }
}

impl Thresholds {
    /// Classify a snapshot into a discrete health state.
    ///
    /// A snapshot without any measurable field is `Off`. Otherwise the worst
    /// of the packet-loss, RTT and bitrate levels wins. Audio loudness is
    /// measured independently and never affects link health.
    pub fn classify(&self, snapshot: &MetricSnapshot) -> HealthState {
        if !snapshot.has_signal() {
            return HealthState::Off;
        }

        let loss = snapshot.network.packet_loss_pct.map_or(HealthState::Ok, |loss| {
            if loss >= self.packet_loss_error {
                HealthState::Error
            } else if loss >= self.packet_loss_warning {
                HealthState::Warning
            } else {
                HealthState::Ok
            }
        });

        let rtt = snapshot.network.rtt_ms.map_or(HealthState::Ok, |rtt| {
            if rtt >= self.rtt_error_ms {
                HealthState::Error
            } else if rtt >= self.rtt_warning_ms {
                HealthState::Warning
            } else {
                HealthState::Ok
            }
        });

        let bitrate = snapshot.video.bitrate_kbps.map_or(HealthState::Ok, |kbps| {
            if kbps < self.bitrate_error_kbps {
                HealthState::Error
            } else if kbps < self.bitrate_warning_kbps {
                HealthState::Warning
            } else {
                HealthState::Ok
            }
        });

        loss.max(rtt).max(bitrate)
    }
}

/// Loudness and peak warnings shown next to the audio meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioAlerts {
    /// Sample peak above -1 dB.
    pub hot: bool,
    /// True peak above 0 dBTP.
    pub true_peak_over: bool,
    /// Integrated loudness outside [-28, -20] LUFS.
    pub loudness_out_of_range: bool,
}

impl AudioAlerts {
    pub fn any(&self) -> bool {
        self.hot || self.true_peak_over || self.loudness_out_of_range
    }
}

impl From<&AudioMetrics> for AudioAlerts {
    fn from(audio: &AudioMetrics) -> Self {
        Self {
            hot: audio.peak_db.is_some_and(|db| db > -1.0),
            true_peak_over: audio.true_peak_dbtp.is_some_and(|db| db > 0.0),
            loudness_out_of_range: audio
                .lufs_integrated
                .is_some_and(|lufs| !(-28.0..=-20.0).contains(&lufs)),
        }
    }
}
