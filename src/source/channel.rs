//! Channel-based telemetry feed.
//!
//! Receives telemetry frames via a tokio watch channel. Useful when an
//! in-process ingester (a probe, a bus subscriber) pushes frames rather than
//! writing them to a file.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::frame::FrameCache;
use super::{Reading, TelemetryFeed, TelemetryFrame};
use crate::data::{HealthState, InputId, Thresholds};

/// A feed that receives telemetry frames via a channel.
///
/// # Example
///
/// ```
/// use session_room::source::ChannelFeed;
///
/// let (tx, feed) = ChannelFeed::create("probe://studio-a");
/// ```
#[derive(Debug)]
pub struct ChannelFeed {
    receiver: watch::Receiver<TelemetryFrame>,
    description: String,
    cache: FrameCache,
    closed: bool,
}

impl ChannelFeed {
    /// Create a feed over an existing receiver.
    ///
    /// `source_description` says where frames come from, e.g.
    /// "probe://studio-a".
    pub fn new(receiver: watch::Receiver<TelemetryFrame>, source_description: &str) -> Self {
        let mut receiver = receiver;
        receiver.mark_changed();
        Self {
            receiver,
            description: format!("channel: {}", source_description),
            cache: FrameCache::default(),
            closed: false,
        }
    }

    /// Create a sender/feed pair.
    pub fn create(source_description: &str) -> (watch::Sender<TelemetryFrame>, Self) {
        let (tx, rx) = watch::channel(TelemetryFrame::default());
        (tx, Self::new(rx, source_description))
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.cache.set_thresholds(thresholds);
        self
    }

    /// Read inputs as off when no frame arrived within `bound`.
    pub fn with_stale_after(mut self, bound: Duration) -> Self {
        self.cache.set_stale_after(bound);
        self
    }
}

impl TelemetryFeed for ChannelFeed {
    fn refresh(&mut self) {
        match self.receiver.has_changed() {
            Ok(true) => {
                let frame = self.receiver.borrow_and_update().clone();
                self.cache.replace(frame, Utc::now());
            }
            Ok(false) => {}
            Err(_) => {
                self.closed = true;
                self.cache.fail();
            }
        }
    }

    fn sample(&mut self, input: &InputId, _health: HealthState, now: DateTime<Utc>) -> Reading {
        self.cache.reading(input, now)
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.closed.then(|| "Channel closed".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NetworkMetrics;
    use crate::source::FrameReading;

    fn frame_with_loss(loss: f64) -> TelemetryFrame {
        let mut frame = TelemetryFrame::new();
        frame.insert(
            InputId::from("input-1"),
            FrameReading {
                network: NetworkMetrics {
                    packet_loss_pct: Some(loss),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        frame
    }

    #[test]
    fn test_channel_feed_refresh() {
        let (tx, mut feed) = ChannelFeed::create("test");
        let id = InputId::from("input-1");

        // Initial empty frame: nothing has signal
        feed.refresh();
        assert_eq!(feed.sample(&id, HealthState::Ok, Utc::now()).health, HealthState::Off);

        tx.send(frame_with_loss(2.0)).unwrap();
        feed.refresh();
        assert_eq!(
            feed.sample(&id, HealthState::Ok, Utc::now()).health,
            HealthState::Warning
        );
        assert!(feed.error().is_none());
    }

    #[test]
    fn test_channel_feed_goes_off_after_close() {
        let (tx, mut feed) = ChannelFeed::create("test");
        let id = InputId::from("input-1");
        tx.send(frame_with_loss(0.0)).unwrap();
        feed.refresh();
        assert_eq!(feed.sample(&id, HealthState::Ok, Utc::now()).health, HealthState::Ok);
        drop(tx);

        feed.refresh();
        assert_eq!(feed.error().as_deref(), Some("Channel closed"));
        let reading = feed.sample(&id, HealthState::Ok, Utc::now());
        assert_eq!(reading.health, HealthState::Off);
        assert!(reading.metrics.is_empty());
    }

    #[test]
    fn test_channel_feed_goes_off_when_frames_stop() {
        let (tx, feed) = ChannelFeed::create("test");
        let mut feed = feed.with_stale_after(Duration::from_secs(3));
        let id = InputId::from("input-1");
        tx.send(frame_with_loss(0.0)).unwrap();
        feed.refresh();

        let later = Utc::now() + chrono::Duration::seconds(10);
        assert_eq!(feed.sample(&id, HealthState::Ok, later).health, HealthState::Off);
        assert!(feed.error().is_none());
    }

    #[test]
    fn test_channel_feed_description() {
        let (_tx, feed) = ChannelFeed::create("probe://studio-a");
        assert_eq!(feed.description(), "channel: probe://studio-a");
    }
}
