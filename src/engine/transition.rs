//! Probabilistic health transitions.
//!
//! Each tick draws one value in `[0, 1)` per input. The draw is matched
//! against the current state's candidate transitions laid out as consecutive
//! sub-ranges, so every candidate gets its nominal probability and at most one
//! transition fires per tick.
//!
//! ```text
//! ok:      [0, .02) -> warning   [.02, .025) -> error   else ok
//! warning: [0, .10) -> ok        [.10, .12)  -> error   else warning
//! error:   [0, .05) -> warning   [.05, .06)  -> ok      else error
//! off:     [0, .02) -> ok                               else off
//! ```

use serde::Deserialize;

use super::random::RandomSource;
use crate::data::HealthState;

/// Per-tick transition probabilities, checked in declaration order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransitionTable {
    pub ok_to_warning: f64,
    pub ok_to_error: f64,
    pub warning_to_ok: f64,
    pub warning_to_error: f64,
    pub error_to_warning: f64,
    pub error_to_ok: f64,
    pub off_to_ok: f64,
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self {
            ok_to_warning: 0.02,
            ok_to_error: 0.005,
            warning_to_ok: 0.1,
            warning_to_error: 0.02,
            error_to_warning: 0.05,
            error_to_ok: 0.01,
            off_to_ok: 0.02,
        }
    }
}

impl TransitionTable {
    /// A table where nothing ever changes.
    pub fn frozen() -> Self {
        Self {
            ok_to_warning: 0.0,
            ok_to_error: 0.0,
            warning_to_ok: 0.0,
            warning_to_error: 0.0,
            error_to_warning: 0.0,
            error_to_ok: 0.0,
            off_to_ok: 0.0,
        }
    }

    fn candidates(&self, current: HealthState) -> [(HealthState, f64); 2] {
        match current {
            HealthState::Ok => [
                (HealthState::Warning, self.ok_to_warning),
                (HealthState::Error, self.ok_to_error),
            ],
            HealthState::Warning => [
                (HealthState::Ok, self.warning_to_ok),
                (HealthState::Error, self.warning_to_error),
            ],
            HealthState::Error => [
                (HealthState::Warning, self.error_to_warning),
                (HealthState::Ok, self.error_to_ok),
            ],
            HealthState::Off => [(HealthState::Ok, self.off_to_ok), (HealthState::Off, 0.0)],
        }
    }
}

/// Markov model over [`HealthState`].
#[derive(Debug, Clone, Default)]
pub struct HealthTransitionModel {
    table: TransitionTable,
}

impl HealthTransitionModel {
    pub fn new(table: TransitionTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Draw the next state for `current`.
    pub fn next(&self, current: HealthState, rng: &mut dyn RandomSource) -> HealthState {
        self.resolve(current, rng.next_f64())
    }

    /// Map a draw in `[0, 1)` to the next state.
    pub fn resolve(&self, current: HealthState, draw: f64) -> HealthState {
        let mut upper = 0.0;
        for (target, probability) in self.table.candidates(current) {
            upper += probability.max(0.0);
            if draw < upper {
                return target;
            }
        }
        current
    }
}
