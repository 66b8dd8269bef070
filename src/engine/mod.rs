//! The metrics engine: authoritative per-input state, advanced once per tick.
//!
//! ## Submodules
//!
//! - [`random`]: injectable `[0, 1)` draws
//! - [`generator`]: synthetic snapshots around health-dependent baselines
//! - [`transition`]: the health Markov model
//! - [`observer`]: engine event subscriptions
//! - [`runner`]: the timer task that owns a running engine
//!
//! Readers never see the engine's working state. Each tick builds the new
//! `{health, metrics, point}` triple for every input, then publishes one
//! immutable [`EngineSnapshot`] through a watch channel.

pub mod generator;
pub mod observer;
pub mod random;
pub mod runner;
pub mod transition;

pub use generator::{MetricGenerator, Profile, Spread};
pub use observer::{EngineEvent, Observers, Subscription};
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use runner::{EngineCommand, TickHandle};
pub use transition::{HealthTransitionModel, TransitionTable};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::data::{HealthState, HistoryPoint, InputId, MetricSnapshot, RollingHistoryBuffer, DEFAULT_HISTORY_CAPACITY};
use crate::source::{Reading, TelemetryFeed};

/// Default number of warm-up points backfilled per input.
pub const DEFAULT_WARMUP_POINTS: usize = 60;

/// Sizing for a [`MetricsEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub history_capacity: usize,
    pub warmup_points: usize,
    /// Spacing of warm-up points; normally the tick interval.
    pub warmup_spacing: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            warmup_points: DEFAULT_WARMUP_POINTS,
            warmup_spacing: Duration::from_secs(1),
        }
    }
}

/// One input to track, with an optional starting health.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSeed {
    pub id: InputId,
    pub health: Option<HealthState>,
    pub enabled: bool,
}

impl InputSeed {
    pub fn new(id: impl Into<InputId>) -> Self {
        Self {
            id: id.into(),
            health: None,
            enabled: true,
        }
    }

    pub fn with_health(mut self, health: HealthState) -> Self {
        self.health = Some(health);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Read-only projection of one input's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputState {
    pub health: HealthState,
    pub metrics: MetricSnapshot,
    pub history: RollingHistoryBuffer,
    pub enabled: bool,
}

/// Everything readers can see, as of one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub tick: u64,
    pub taken_at: DateTime<Utc>,
    pub enabled: bool,
    pub inputs: BTreeMap<InputId, InputState>,
    /// Last error reported by the feed.
    pub feed_error: Option<String>,
}

impl EngineSnapshot {
    fn empty(enabled: bool) -> Self {
        Self {
            tick: 0,
            taken_at: Utc::now(),
            enabled,
            inputs: BTreeMap::new(),
            feed_error: None,
        }
    }

    /// State for `input`, or `None` if it is not tracked.
    pub fn get(&self, input: &InputId) -> Option<&InputState> {
        self.inputs.get(input)
    }
}

/// Owns the per-input `{health, metrics, history}` state for a session.
pub struct MetricsEngine {
    config: EngineConfig,
    feed: Box<dyn TelemetryFeed>,
    state: Arc<EngineSnapshot>,
    publisher: watch::Sender<Arc<EngineSnapshot>>,
    observers: Observers,
}

impl std::fmt::Debug for MetricsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsEngine")
            .field("config", &self.config)
            .field("feed", &self.feed)
            .field("tick", &self.state.tick)
            .field("inputs", &self.state.inputs.len())
            .finish()
    }
}

impl MetricsEngine {
    /// Create an engine with no inputs, enabled.
    pub fn new(feed: Box<dyn TelemetryFeed>, config: EngineConfig) -> Self {
        let state = Arc::new(EngineSnapshot::empty(true));
        let (publisher, _) = watch::channel(state.clone());
        Self {
            config,
            feed,
            state,
            publisher,
            observers: Observers::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn feed_description(&self) -> &str {
        self.feed.description()
    }

    /// Replace all tracked state with `inputs`.
    ///
    /// Inputs without a starting health follow the ok, warning, ok, off
    /// pattern by index. Each input gets an initial snapshot at its seeded
    /// health and a warm-up history from the feed. Calling this again resets
    /// rather than adds.
    pub fn initialize(&mut self, inputs: &[InputSeed]) {
        let now = Utc::now();
        self.feed.refresh();

        let mut states = BTreeMap::new();
        for (index, seed) in inputs.iter().enumerate() {
            let health = seed
                .health
                .unwrap_or_else(|| HealthState::default_for_index(index));
            let reading = if seed.enabled {
                self.feed.sample(&seed.id, health, now)
            } else {
                Reading::off(seed.id.clone(), now)
            };

            let mut history = RollingHistoryBuffer::new(self.config.history_capacity);
            if seed.enabled && self.config.warmup_points > 0 {
                let warmup = self.feed.backfill(
                    &seed.id,
                    reading.health,
                    self.config.warmup_points,
                    self.config.warmup_spacing,
                    now,
                );
                for point in warmup {
                    history.append(point);
                }
            }

            states.insert(
                seed.id.clone(),
                InputState {
                    health: reading.health,
                    metrics: reading.metrics,
                    history,
                    enabled: seed.enabled,
                },
            );
        }

        info!(
            "engine initialized with {} inputs from {}",
            states.len(),
            self.feed.description()
        );
        self.publish(EngineSnapshot {
            tick: 0,
            taken_at: now,
            enabled: self.state.enabled,
            inputs: states,
            feed_error: self.feed.error(),
        });
        self.observers.emit(&EngineEvent::Initialized {
            inputs: inputs.len(),
        });
    }

    /// Advance every input once. A no-op while disabled.
    pub fn tick(&mut self) {
        self.tick_at(Utc::now());
    }

    /// [`tick`](Self::tick) with an explicit clock.
    pub fn tick_at(&mut self, now: DateTime<Utc>) {
        if !self.state.enabled {
            return;
        }
        self.feed.refresh();

        let mut changes = Vec::new();
        let mut next = BTreeMap::new();
        for (id, current) in &self.state.inputs {
            let reading = if current.enabled {
                self.feed.advance(id, current.health, now)
            } else {
                Reading::off(id.clone(), now)
            };
            if reading.health != current.health {
                changes.push(EngineEvent::HealthChanged {
                    input: id.clone(),
                    from: current.health,
                    to: reading.health,
                });
            }

            let mut history = current.history.clone();
            history.append(HistoryPoint::from(&reading.metrics));
            next.insert(
                id.clone(),
                InputState {
                    health: reading.health,
                    metrics: reading.metrics,
                    history,
                    enabled: current.enabled,
                },
            );
        }

        let tick = self.state.tick + 1;
        self.publish(EngineSnapshot {
            tick,
            taken_at: now,
            enabled: true,
            inputs: next,
            feed_error: self.feed.error(),
        });

        for change in &changes {
            if let EngineEvent::HealthChanged { input, from, to } = change {
                debug!("{} health {} -> {}", input, from.symbol(), to.symbol());
            }
            self.observers.emit(change);
        }
        self.observers.emit(&EngineEvent::Ticked { tick });
    }

    /// Pause or resume ticking.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.state.enabled == enabled {
            return;
        }
        let mut next = (*self.state).clone();
        next.enabled = enabled;
        self.publish(next);

        if enabled {
            info!("engine resumed");
            self.observers.emit(&EngineEvent::Resumed);
        } else {
            info!("engine paused");
            self.observers.emit(&EngineEvent::Paused);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    /// Enable or disable a single input. Disabled inputs report no signal
    /// from the next tick on. Returns false if the input is not tracked.
    pub fn set_input_enabled(&mut self, input: &InputId, enabled: bool) -> bool {
        let Some(current) = self.state.inputs.get(input) else {
            return false;
        };
        if current.enabled == enabled {
            return true;
        }
        let mut next = (*self.state).clone();
        if let Some(entry) = next.inputs.get_mut(input) {
            entry.enabled = enabled;
        }
        self.publish(next);
        true
    }

    /// State for `input`, or `None` if it is not tracked.
    pub fn current_state(&self, input: &InputId) -> Option<&InputState> {
        self.state.inputs.get(input)
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.state.clone()
    }

    pub fn tick_count(&self) -> u64 {
        self.state.tick
    }

    /// A receiver that sees every published snapshot.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<Arc<EngineSnapshot>> {
        self.publisher.subscribe()
    }

    /// Register an event callback. Dropping the [`Subscription`] removes it.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.observers
    }

    fn publish(&mut self, snapshot: EngineSnapshot) {
        self.state = Arc::new(snapshot);
        self.publisher.send_replace(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SyntheticFeed;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn still_engine() -> MetricsEngine {
        let feed = SyntheticFeed::new(
            HealthTransitionModel::default(),
            Box::new(ScriptedRandom::constant(0.5)),
            Box::new(ScriptedRandom::constant(0.5)),
        );
        MetricsEngine::new(Box::new(feed), EngineConfig::default())
    }

    fn seeds() -> Vec<InputSeed> {
        ["input-1", "input-2", "input-3", "input-4"]
            .into_iter()
            .map(InputSeed::new)
            .collect()
    }

    fn id(n: u8) -> InputId {
        InputId::new(format!("input-{}", n))
    }

    #[test]
    fn scenario_fixed_draws_keep_off_input_empty() {
        let mut engine = still_engine();
        engine.initialize(&seeds());
        engine.tick();

        let four = engine.current_state(&id(4)).unwrap();
        assert_eq!(four.health, HealthState::Off);
        assert!(four.metrics.is_empty());

        let one = engine.current_state(&id(1)).unwrap();
        assert_eq!(one.health, HealthState::Ok);
        let kbps = one.metrics.video.bitrate_kbps.unwrap();
        assert!((7500..=8500).contains(&kbps));
    }

    #[test]
    fn default_health_pattern() {
        let mut engine = still_engine();
        engine.initialize(&seeds());
        let healths: Vec<_> = (1..=4)
            .map(|n| engine.current_state(&id(n)).unwrap().health)
            .collect();
        assert_eq!(
            healths,
            vec![
                HealthState::Ok,
                HealthState::Warning,
                HealthState::Ok,
                HealthState::Off
            ]
        );
    }

    #[test]
    fn warmup_fills_history_except_off_inputs() {
        let mut engine = still_engine();
        engine.initialize(&seeds());

        assert_eq!(engine.current_state(&id(1)).unwrap().history.len(), 60);
        assert_eq!(engine.current_state(&id(2)).unwrap().history.len(), 60);
        assert!(engine.current_state(&id(4)).unwrap().history.is_empty());

        let warning = engine.current_state(&id(2)).unwrap();
        assert!(warning
            .history
            .iter()
            .all(|p| p.bitrate_kbps == Some(4500)));
    }

    #[test]
    fn tick_appends_one_point_per_input() {
        let mut engine = still_engine();
        engine.initialize(&seeds());
        engine.tick();
        engine.tick();

        assert_eq!(engine.tick_count(), 2);
        assert_eq!(engine.current_state(&id(1)).unwrap().history.len(), 62);
        assert_eq!(engine.current_state(&id(4)).unwrap().history.len(), 2);
    }

    #[test]
    fn health_and_metrics_stay_consistent() {
        let feed = SyntheticFeed::seeded(99);
        let mut engine = MetricsEngine::new(Box::new(feed), EngineConfig::default());
        engine.initialize(&seeds());
        for _ in 0..300 {
            engine.tick();
            for state in engine.snapshot().inputs.values() {
                assert_eq!(state.health != HealthState::Off, state.metrics.has_signal());
            }
        }
    }

    #[test]
    fn unknown_input_is_not_found() {
        let mut engine = still_engine();
        engine.initialize(&seeds());
        assert!(engine.current_state(&InputId::from("nope")).is_none());
    }

    #[test]
    fn initialize_twice_replaces_state() {
        let mut engine = still_engine();
        engine.initialize(&seeds());
        engine.tick();

        engine.initialize(&[InputSeed::new("solo").with_health(HealthState::Error)]);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.inputs.len(), 1);
        assert_eq!(snapshot.tick, 0);
        assert_eq!(
            engine.current_state(&InputId::from("solo")).unwrap().health,
            HealthState::Error
        );
        assert!(engine.current_state(&id(1)).is_none());
    }

    #[test]
    fn disabled_engine_does_not_tick() {
        let mut engine = still_engine();
        engine.initialize(&seeds());
        engine.set_enabled(false);
        engine.tick();

        assert_eq!(engine.tick_count(), 0);
        assert_eq!(engine.current_state(&id(1)).unwrap().history.len(), 60);

        engine.set_enabled(true);
        engine.tick();
        assert_eq!(engine.tick_count(), 1);
    }

    #[test]
    fn disabled_input_reports_off() {
        let mut engine = still_engine();
        engine.initialize(&seeds());
        assert!(engine.set_input_enabled(&id(1), false));
        engine.tick();

        let one = engine.current_state(&id(1)).unwrap();
        assert_eq!(one.health, HealthState::Off);
        assert!(one.metrics.is_empty());
        assert!(!engine.set_input_enabled(&InputId::from("nope"), false));
    }

    #[test]
    fn disabled_seed_starts_off_without_warmup() {
        let mut engine = still_engine();
        engine.initialize(&[InputSeed::new("input-1").enabled(false)]);
        let state = engine.current_state(&id(1)).unwrap();
        assert_eq!(state.health, HealthState::Off);
        assert!(state.history.is_empty());
    }

    #[test]
    fn published_snapshots_are_immutable() {
        let mut engine = still_engine();
        engine.initialize(&seeds());
        let before = engine.snapshot();
        engine.tick();
        let after = engine.snapshot();

        assert_eq!(before.tick, 0);
        assert_eq!(after.tick, 1);
        assert_eq!(before.get(&id(1)).unwrap().history.len(), 60);
    }

    #[test]
    fn watchers_see_each_tick() {
        let mut engine = still_engine();
        let mut rx = engine.subscribe_snapshots();
        engine.initialize(&seeds());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().inputs.len(), 4);

        engine.tick();
        assert_eq!(rx.borrow_and_update().tick, 1);
    }

    #[test]
    fn observers_hear_transitions_and_ticks() {
        let feed = SyntheticFeed::new(
            HealthTransitionModel::default(),
            Box::new(ScriptedRandom::constant(0.0)),
            Box::new(ScriptedRandom::constant(0.5)),
        );
        let mut engine = MetricsEngine::new(Box::new(feed), EngineConfig::default());
        engine.initialize(&seeds());

        let changes = Arc::new(AtomicUsize::new(0));
        let ticks = Arc::new(AtomicUsize::new(0));
        let (c, t) = (changes.clone(), ticks.clone());
        let _sub = engine.subscribe(move |event| match event {
            EngineEvent::HealthChanged { .. } => {
                c.fetch_add(1, Ordering::SeqCst);
            }
            EngineEvent::Ticked { .. } => {
                t.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        });

        // A zero draw moves every input: ok->warning, warning->ok, off->ok.
        engine.tick();
        assert_eq!(changes.load(Ordering::SeqCst), 4);
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn history_capacity_is_respected() {
        let feed = SyntheticFeed::seeded(3);
        let config = EngineConfig {
            history_capacity: 10,
            warmup_points: 60,
            ..EngineConfig::default()
        };
        let mut engine = MetricsEngine::new(Box::new(feed), config);
        engine.initialize(&[InputSeed::new("input-1").with_health(HealthState::Ok)]);
        assert_eq!(engine.current_state(&id(1)).unwrap().history.len(), 10);
        engine.tick();
        assert_eq!(engine.current_state(&id(1)).unwrap().history.len(), 10);
    }

    #[test]
    fn closed_feed_degrades_inputs_to_off() {
        use crate::data::VideoMetrics;
        use crate::source::{ChannelFeed, FrameReading, TelemetryFrame};

        let (tx, feed) = ChannelFeed::create("test");
        let mut frame = TelemetryFrame::new();
        frame.insert(
            id(1),
            FrameReading {
                video: VideoMetrics {
                    bitrate_kbps: Some(7800),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        tx.send(frame).unwrap();

        let mut engine = MetricsEngine::new(Box::new(feed), EngineConfig::default());
        engine.initialize(&[InputSeed::new("input-1")]);
        engine.tick();
        assert_eq!(engine.current_state(&id(1)).unwrap().health, HealthState::Ok);

        drop(tx);
        for _ in 0..3 {
            engine.tick();
        }
        let state = engine.current_state(&id(1)).unwrap();
        assert_eq!(state.health, HealthState::Off);
        assert!(state.metrics.is_empty());
        assert!(engine.snapshot().feed_error.is_some());
    }
}
