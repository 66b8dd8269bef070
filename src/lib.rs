// Library crate: public API items may not be used by the binary
#![allow(unused)]

//! # session-room
//!
//! A collaborative monitoring room for live video-contribution feeds.
//!
//! Up to four inputs are watched at once. For each one the engine keeps a
//! health state, the current technical readings (video, network, audio) and a
//! bounded history for charts. Operators switch layouts, inspect an input,
//! pick which audio they hear and drop timestamped markers on the session
//! timeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Application                          │
//! │  ┌─────────┐    ┌──────────┐    ┌─────────┐    ┌─────────┐  │
//! │  │  app    │───▶│   view   │───▶│   ui    │───▶│ Terminal│  │
//! │  │ (state) │    │ (layout) │    │(render) │    │         │  │
//! │  └────┬────┘    └──────────┘    └─────────┘    └─────────┘  │
//! │       │ snapshots / commands                                │
//! │       ▼                                                     │
//! │  ┌─────────┐    ┌──────────┐                                │
//! │  │ engine  │◀───│  source  │◀── Synthetic | File | Stream   │
//! │  │ (tick)  │    │  (feed)  │    | Channel                   │
//! │  └─────────┘    └──────────┘                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`data`]**: Health states, metric snapshots, rolling history and markers
//! - **[`engine`]**: [`MetricsEngine`], the single owner of per-input state, plus
//!   the metric generator, health transition model and tick runner
//! - **[`source`]**: The [`TelemetryFeed`] seam between the engine and whatever
//!   produces readings
//! - **[`view`]**: [`ViewCoordinator`], the single owner of selection, audio,
//!   inspector and layout state
//! - **[`session`]**: Roles, session lifecycle, notes and the input roster
//! - **[`config`]**: Layered settings from a TOML file and the environment
//! - **[`app`]**, **[`events`]**, **[`ui`]**: The terminal front end
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Demo session with synthetic telemetry
//! session-room
//!
//! # Reproducible run, read-only participant
//! session-room --seed 7 --role viewer
//!
//! # Real telemetry from a JSON frame file or a TCP stream of frames
//! session-room --file telemetry.json
//! session-room --connect localhost:9090
//! ```
//!
//! ### Driving the engine by hand
//!
//! ```
//! use session_room::{EngineConfig, InputSeed, MetricsEngine, SyntheticFeed};
//! use session_room::data::{HealthState, InputId};
//!
//! let mut engine = MetricsEngine::new(
//!     Box::new(SyntheticFeed::seeded(42)),
//!     EngineConfig::default(),
//! );
//! engine.initialize(&[
//!     InputSeed::new("cam-1").with_health(HealthState::Ok),
//!     InputSeed::new("cam-2").with_health(HealthState::Off),
//! ]);
//! engine.tick();
//!
//! let cam = engine.current_state(&InputId::from("cam-1")).unwrap();
//! assert_eq!(cam.history.len(), 61);
//! assert!(engine.current_state(&InputId::from("missing")).is_none());
//! ```
//!
//! ### With a channel feed (for pushing real telemetry)
//!
//! ```
//! use session_room::{ChannelFeed, EngineConfig, MetricsEngine};
//!
//! let (tx, feed) = ChannelFeed::create("srt-gateway");
//! let engine = MetricsEngine::new(Box::new(feed), EngineConfig::default());
//! ```
//!
//! ### With a stream feed
//!
//! ```no_run
//! use session_room::StreamFeed;
//! use tokio::sync::mpsc;
//!
//! # tokio_test::block_on(async {
//! let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
//! let feed = StreamFeed::from_bytes_channel(rx, "gateway");
//! # });
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod events;
pub mod session;
pub mod source;
pub mod ui;
pub mod view;

// Re-export main types for convenience
pub use app::App;
pub use config::Settings;
pub use data::{
    HealthState, HistoryPoint, InputId, Marker, MarkerTimeline, MetricSnapshot,
    RollingHistoryBuffer, Thresholds,
};
pub use engine::{
    EngineConfig, EngineEvent, EngineSnapshot, InputSeed, InputState, MetricsEngine, TickHandle,
};
pub use error::{Result, RoomError};
pub use source::{ChannelFeed, FileFeed, StreamFeed, SyntheticFeed, TelemetryFeed, TelemetryFrame};
pub use view::{Position, ViewCoordinator, ViewMode, ViewState};
