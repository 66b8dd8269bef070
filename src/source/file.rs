//! File-based telemetry feed.
//!
//! Polls a JSON file holding one [`TelemetryFrame`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::frame::FrameCache;
use super::{Reading, TelemetryFeed, TelemetryFrame};
use crate::data::{HealthState, InputId, Thresholds};

/// A feed that reads telemetry frames from a JSON file.
///
/// An external probe rewrites the file; this feed tracks its modification
/// time and only re-parses when it changes. Inputs read as off while the file
/// is missing or does not parse.
#[derive(Debug)]
pub struct FileFeed {
    path: PathBuf,
    description: String,
    last_error: Option<String>,
    last_modified: Option<SystemTime>,
    cache: FrameCache,
}

impl FileFeed {
    /// Create a new file feed for the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            last_error: None,
            last_modified: None,
            cache: FrameCache::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.cache.set_thresholds(thresholds);
        self
    }

    /// Returns the path being monitored.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    fn read_file(&mut self) -> Option<TelemetryFrame> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(frame) => {
                    self.last_error = None;
                    Some(frame)
                }
                Err(e) => {
                    warn!("failed to parse {}: {}", self.path.display(), e);
                    self.last_error = Some(format!("Parse error: {}", e));
                    None
                }
            },
            Err(e) => {
                self.last_error = Some(format!("Read error: {}", e));
                None
            }
        }
    }
}

impl TelemetryFeed for FileFeed {
    fn refresh(&mut self) {
        let current_modified = self.modified_time();

        let file_changed = match (&self.last_modified, &current_modified) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(last), Some(current)) => current > last,
        };

        if file_changed {
            match self.read_file() {
                Some(frame) => {
                    self.last_modified = current_modified;
                    self.cache.replace(frame, Utc::now());
                }
                None => self.cache.fail(),
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
        self.last_error.clone()
    }
}
