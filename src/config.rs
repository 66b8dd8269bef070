//! Layered settings: an optional TOML file under `SESSION_ROOM_*` environment
//! variables, with command-line flags applied on top by the binary.
//!
//! ```toml
//! [engine]
//! tick = "1s"
//! history_capacity = 600
//! warmup_points = 60
//! seed = 42
//! stale_after = "5s"
//!
//! [thresholds]
//! packet_loss_warning = 1.0
//! rtt_error_ms = 250
//!
//! [session]
//! title = "Champions League Feed QC"
//! user = "you"
//! role = "owner"
//!
//! [[inputs]]
//! position = 1
//! name = "Primary Feed"
//! health = "ok"
//! ```
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `SESSION_ROOM_ENGINE__TICK=500ms`.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;

use crate::data::duration::serde_duration;
use crate::data::{Thresholds, DEFAULT_HISTORY_CAPACITY};
use crate::engine::{EngineConfig, TransitionTable, DEFAULT_WARMUP_POINTS};
use crate::error::Result;
use crate::session::{InputConfig, Member, Role, Roster};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SESSION_ROOM";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    #[serde(deserialize_with = "serde_duration::deserialize")]
    pub tick: Duration,
    pub history_capacity: usize,
    pub warmup_points: usize,
    /// Fixed seed for reproducible runs; entropy when absent.
    pub seed: Option<u64>,
    /// Streamed inputs read as off when no frame arrived for this long.
    #[serde(deserialize_with = "serde_duration::deserialize")]
    pub stale_after: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            warmup_points: DEFAULT_WARMUP_POINTS,
            seed: None,
            stale_after: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub title: String,
    pub purpose: String,
    /// Display name of the local user.
    pub user: String,
    pub role: Role,
    /// Start the session live instead of as a draft.
    pub live: bool,
    pub members: Vec<Member>,
    pub invite_link: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            title: "Champions League Feed QC".to_string(),
            purpose: String::new(),
            user: "You".to_string(),
            role: Role::Owner,
            live: true,
            members: Vec::new(),
            invite_link: None,
        }
    }
}

/// Everything the session room can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub thresholds: Thresholds,
    pub transitions: TransitionTable,
    pub session: SessionSettings,
    pub inputs: Vec<InputConfig>,
}

impl Settings {
    /// Load from `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("loading settings from {}", path.display());
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            history_capacity: self.engine.history_capacity,
            warmup_points: self.engine.warmup_points,
            warmup_spacing: self.engine.tick,
        }
    }

    /// The configured roster, or the demo lines when none are configured.
    pub fn roster(&self) -> Result<Roster> {
        if self.inputs.is_empty() {
            return Ok(Roster::demo());
        }
        Roster::new(self.inputs.clone())
    }

    /// Configured members, or the local user plus two demo colleagues.
    pub fn members(&self) -> Vec<Member> {
        if !self.session.members.is_empty() {
            return self.session.members.clone();
        }
        vec![
            Member::new("local", self.session.user.clone(), self.session.role),
            Member::new("user-2", "John Smith", Role::Commenter),
            Member::new("user-3", "Jane Doe", Role::Viewer),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::HealthState;
    use crate::view::Position;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.engine.history_capacity, 600);
        assert_eq!(settings.engine.warmup_points, 60);
        assert_eq!(settings.engine.stale_after, Duration::from_secs(5));
        assert_eq!(settings.thresholds, Thresholds::default());
        assert_eq!(settings.roster().unwrap().len(), 4);
        assert_eq!(settings.members().len(), 3);
    }

    #[test]
    fn file_overrides_defaults() {
        let file = toml_file(
            r#"
            [engine]
            tick = "500ms"
            history_capacity = 120
            seed = 9
            stale_after = "2s"

            [thresholds]
            rtt_warning_ms = 50

            [transitions]
            ok_to_warning = 0.5

            [session]
            role = "viewer"

            [[inputs]]
            position = 2
            name = "Remote Cam"
            health = "warning"
            port = 9001
            "#,
        );

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.engine.tick, Duration::from_millis(500));
        assert_eq!(settings.engine.seed, Some(9));
        assert_eq!(settings.engine.stale_after, Duration::from_secs(2));
        assert_eq!(settings.thresholds.rtt_warning_ms, 50);
        assert_eq!(settings.thresholds.rtt_error_ms, 250);
        assert_eq!(settings.transitions.ok_to_warning, 0.5);
        assert_eq!(settings.session.role, Role::Viewer);

        let config = settings.engine_config();
        assert_eq!(config.history_capacity, 120);
        assert_eq!(config.warmup_spacing, Duration::from_millis(500));

        let roster = settings.roster().unwrap();
        let line = roster.at(Position::new(2).unwrap()).unwrap();
        assert_eq!(line.id.as_str(), "input-2");
        assert_eq!(line.health, Some(HealthState::Warning));
        assert_eq!(line.port, Some(9001));
        assert_eq!(line.latency_ms, 200);
        assert!(line.enabled);
    }

    #[test]
    fn bad_tick_is_an_error() {
        let file = toml_file("[engine]\ntick = \"soon\"\n");
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn out_of_range_position_is_an_error() {
        let file = toml_file("[[inputs]]\nposition = 9\nname = \"X\"\n");
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let file = toml_file("[session]\npurpose = \"from file\"\n");
        std::env::set_var("SESSION_ROOM_SESSION__PURPOSE", "from env");
        let settings = Settings::load(Some(file.path()));
        std::env::remove_var("SESSION_ROOM_SESSION__PURPOSE");

        assert_eq!(settings.unwrap().session.purpose, "from env");
    }
}
