//! Stream-based telemetry feed.
//!
//! Receives telemetry frames from an async byte stream, such as a TCP
//! connection to a probe.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::frame::FrameCache;
use super::{Reading, TelemetryFeed, TelemetryFrame};
use crate::data::{HealthState, InputId, Thresholds};

type SharedError = Arc<Mutex<Option<String>>>;

/// A feed that receives telemetry frames from an async stream.
///
/// A background task reads newline-delimited JSON frames from the reader;
/// [`refresh`](TelemetryFeed::refresh) keeps the newest one received. Once the
/// stream ends or reports an error every input reads as off until a good
/// frame arrives.
///
/// # Example with a byte stream
///
/// ```
/// use std::io::Cursor;
/// use session_room::source::StreamFeed;
///
/// # tokio_test::block_on(async {
/// let data = b"{}\n";
/// let feed = StreamFeed::spawn(Cursor::new(data.to_vec()), "example");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamFeed {
    receiver: mpsc::Receiver<TelemetryFrame>,
    description: String,
    cache: FrameCache,
    last_error: SharedError,
}

impl StreamFeed {
    /// Spawn a background task that reads frames from `reader`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(16);
        let last_error: SharedError = Arc::new(Mutex::new(None));
        let error_handle = last_error.clone();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!("telemetry stream reached EOF");
                        *error_handle.lock() = Some("Connection closed".to_string());
                        break;
                    }
                    Ok(_) if line.trim().is_empty() => {}
                    Ok(_) => match serde_json::from_str::<TelemetryFrame>(line.trim()) {
                        Ok(frame) => {
                            *error_handle.lock() = None;
                            if tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("skipping malformed telemetry frame: {}", e);
                            *error_handle.lock() = Some(format!("Parse error: {}", e));
                        }
                    },
                    Err(e) => {
                        *error_handle.lock() = Some(format!("Read error: {}", e));
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            cache: FrameCache::default(),
            last_error,
        }
    }

    /// Feed frames pushed as raw JSON bytes, one frame per message.
    pub fn from_bytes_channel(mut rx: mpsc::Receiver<Vec<u8>>, description: &str) -> Self {
        let (tx, frame_rx) = mpsc::channel(16);
        let last_error: SharedError = Arc::new(Mutex::new(None));
        let error_handle = last_error.clone();

        tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                match serde_json::from_slice::<TelemetryFrame>(&bytes) {
                    Ok(frame) => {
                        *error_handle.lock() = None;
                        if tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        *error_handle.lock() = Some(format!("Parse error: {}", e));
                    }
                }
            }
        });

        Self {
            receiver: frame_rx,
            description: format!("stream: {}", description),
            cache: FrameCache::default(),
            last_error,
        }
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

impl TelemetryFeed for StreamFeed {
    fn refresh(&mut self) {
        let mut latest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    let mut error = self.last_error.lock();
                    if error.is_none() {
                        *error = Some("Stream disconnected".to_string());
                    }
                    break;
                }
            }
        }
        if let Some(frame) = latest {
            self.cache.replace(frame, Utc::now());
        }
        if self.last_error.lock().is_some() {
            self.cache.fail();
        }
    }

    fn sample(&mut self, input: &InputId, _health: HealthState, now: DateTime<Utc>) -> Reading {
        self.cache.reading(input, now)
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    fn frame_json(bitrate: u32) -> String {
        format!(r#"{{"input-1":{{"video":{{"bitrate_kbps":{}}}}}}}"#, bitrate)
    }

    fn bitrate(feed: &mut StreamFeed) -> Option<u32> {
        feed.sample(&InputId::from("input-1"), HealthState::Ok, Utc::now())
            .metrics
            .video
            .bitrate_kbps
    }

    /// A feed over an open pipe; the writer half keeps the stream alive.
    async fn open_feed(lines: &str) -> (DuplexStream, StreamFeed) {
        let (mut writer, reader) = tokio::io::duplex(4096);
        writer.write_all(lines.as_bytes()).await.unwrap();
        (writer, StreamFeed::spawn(reader, "test"))
    }

    async fn settle() {
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_stream_feed_spawn() {
        let (_writer, mut feed) = open_feed(&format!("{}\n", frame_json(6000))).await;
        settle().await;

        feed.refresh();
        assert_eq!(bitrate(&mut feed), Some(6000));
        assert!(feed.error().is_none());
    }

    #[tokio::test]
    async fn test_stream_feed_keeps_newest_frame() {
        let data = format!("{}\n\n{}\n", frame_json(6000), frame_json(1500));
        let (_writer, mut feed) = open_feed(&data).await;
        settle().await;

        feed.refresh();
        assert_eq!(bitrate(&mut feed), Some(1500));
        let reading = feed.sample(&InputId::from("input-1"), HealthState::Ok, Utc::now());
        assert_eq!(reading.health, HealthState::Warning);
    }

    #[tokio::test]
    async fn test_stream_feed_description() {
        let feed = StreamFeed::spawn(Cursor::new(""), "tcp://localhost:9090");
        assert_eq!(feed.description(), "stream: tcp://localhost:9090");
    }

    #[tokio::test]
    async fn test_stream_feed_from_bytes_channel() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
        let mut feed = StreamFeed::from_bytes_channel(rx, "test-channel");

        tx.send(frame_json(7000).into_bytes()).await.unwrap();
        settle().await;

        feed.refresh();
        assert_eq!(bitrate(&mut feed), Some(7000));
    }

    #[tokio::test]
    async fn test_stream_feed_invalid_json() {
        let (_writer, mut feed) = open_feed("not valid json\n").await;
        settle().await;

        feed.refresh();
        assert_eq!(bitrate(&mut feed), None);
        assert!(feed.error().unwrap().contains("Parse error"));
    }

    #[tokio::test]
    async fn test_stream_feed_reports_close() {
        let mut feed = StreamFeed::spawn(Cursor::new(""), "test");
        settle().await;

        feed.refresh();
        assert!(feed.error().is_some());
    }

    #[tokio::test]
    async fn test_stream_feed_goes_off_at_eof() {
        let data = format!("{}\n", frame_json(7800));
        let mut feed = StreamFeed::spawn(Cursor::new(data), "test");
        settle().await;

        feed.refresh();
        assert_eq!(feed.error().as_deref(), Some("Connection closed"));
        let reading = feed.sample(&InputId::from("input-1"), HealthState::Ok, Utc::now());
        assert_eq!(reading.health, HealthState::Off);
        assert!(reading.metrics.is_empty());
    }

    #[tokio::test]
    async fn test_stream_feed_goes_off_when_writer_hangs_up() {
        let (writer, mut feed) = open_feed(&format!("{}\n", frame_json(7800))).await;
        settle().await;
        feed.refresh();
        assert_eq!(bitrate(&mut feed), Some(7800));

        drop(writer);
        settle().await;
        feed.refresh();
        assert_eq!(bitrate(&mut feed), None);
    }

    #[tokio::test]
    async fn test_stream_feed_goes_off_when_frames_stop() {
        let (_writer, feed) = open_feed(&format!("{}\n", frame_json(7800))).await;
        let mut feed = feed.with_stale_after(Duration::from_secs(2));
        settle().await;
        feed.refresh();

        let later = Utc::now() + chrono::Duration::seconds(5);
        let reading = feed.sample(&InputId::from("input-1"), HealthState::Ok, later);
        assert_eq!(reading.health, HealthState::Off);
    }
}
