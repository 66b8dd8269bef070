//! Synthetic feed: health driven by the transition model, metrics generated
//! to match.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{Reading, TelemetryFeed};
use crate::data::{HealthState, HistoryPoint, InputId};
use crate::engine::{HealthTransitionModel, MetricGenerator, RandomSource, SeededRandom, TransitionTable};

// Keeps the metric stream independent of the transition stream for one seed.
const METRIC_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;

/// Stand-in for a real telemetry ingester.
pub struct SyntheticFeed {
    model: HealthTransitionModel,
    transitions: Box<dyn RandomSource>,
    generator: MetricGenerator,
    description: String,
}

impl std::fmt::Debug for SyntheticFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntheticFeed")
            .field("model", &self.model)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl SyntheticFeed {
    /// Build from explicit random sources for transitions and metrics.
    pub fn new(
        model: HealthTransitionModel,
        transitions: Box<dyn RandomSource>,
        metrics: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            model,
            transitions,
            generator: MetricGenerator::new(metrics),
            description: "synthetic".to_string(),
        }
    }

    /// Reproducible feed with the default transition table.
    pub fn seeded(seed: u64) -> Self {
        Self::with_table(TransitionTable::default(), Some(seed))
    }

    /// Feed with a custom table; `None` seeds from entropy.
    pub fn with_table(table: TransitionTable, seed: Option<u64>) -> Self {
        let (transitions, metrics) = match seed {
            Some(seed) => (
                SeededRandom::new(seed),
                SeededRandom::new(seed ^ METRIC_STREAM),
            ),
            None => (SeededRandom::from_entropy(), SeededRandom::from_entropy()),
        };
        let mut feed = Self::new(
            HealthTransitionModel::new(table),
            Box::new(transitions),
            Box::new(metrics),
        );
        feed.description = match seed {
            Some(seed) => format!("synthetic (seed {})", seed),
            None => "synthetic".to_string(),
        };
        feed
    }
}

impl TelemetryFeed for SyntheticFeed {
    fn sample(&mut self, input: &InputId, health: HealthState, now: DateTime<Utc>) -> Reading {
        Reading::new(health, self.generator.generate(input, health, now))
    }

    fn advance(&mut self, input: &InputId, current: HealthState, now: DateTime<Utc>) -> Reading {
        let next = self.model.next(current, self.transitions.as_mut());
        self.sample(input, next, now)
    }

    /// Warm-up history at a fixed health. Inputs without signal get none.
    fn backfill(
        &mut self,
        input: &InputId,
        health: HealthState,
        points: usize,
        spacing: Duration,
        now: DateTime<Utc>,
    ) -> Vec<HistoryPoint> {
        if !health.has_signal() {
            return Vec::new();
        }
        let spacing = chrono::Duration::from_std(spacing).unwrap_or(chrono::Duration::seconds(1));
        (0..points)
            .map(|i| {
                let back = (points - 1 - i) as i32;
                let at = now - spacing * back;
                HistoryPoint::from(&self.generator.generate(input, health, at))
            })
            .collect()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        None
    }
}
