//! Timer task that drives a [`MetricsEngine`].
//!
//! [`MetricsEngine::start`] moves the engine into one tokio task, which is
//! then its only writer. Readers follow the published snapshots; writers send
//! [`EngineCommand`]s. The task ends when the [`TickHandle`] is stopped or
//! dropped, so no tick can run after teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::observer::{EngineEvent, Observers, Subscription};
use super::{EngineSnapshot, InputSeed, MetricsEngine};
use crate::data::InputId;

/// Writes applied by the engine task between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    SetEnabled(bool),
    SetInputEnabled(InputId, bool),
    Initialize(Vec<InputSeed>),
    /// Tick immediately instead of waiting for the timer.
    TickNow,
}

impl MetricsEngine {
    fn apply(&mut self, command: EngineCommand) {
        debug!("engine command: {:?}", command);
        match command {
            EngineCommand::SetEnabled(enabled) => self.set_enabled(enabled),
            EngineCommand::SetInputEnabled(input, enabled) => {
                if !self.set_input_enabled(&input, enabled) {
                    warn!("cannot toggle unknown input {}", input);
                }
            }
            EngineCommand::Initialize(seeds) => self.initialize(&seeds),
            EngineCommand::TickNow => self.tick(),
        }
    }

    /// Run this engine on a fixed `interval` in a background task.
    ///
    /// The first tick happens one interval after start. Missed ticks are
    /// skipped rather than bunched. Must be called from within a tokio
    /// runtime.
    pub fn start(self, interval: Duration) -> TickHandle {
        let interval = interval.max(Duration::from_millis(1));
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let snapshots = self.subscribe_snapshots();
        let observers = self.observers().clone();

        info!("engine started, ticking every {:?}", interval);
        let mut engine = self;
        let task = tokio::spawn(async move {
            let mut timer = time::interval_at(Instant::now() + interval, interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => engine.tick(),
                    Some(command) = command_rx.recv() => engine.apply(command),
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("engine stopped after {} ticks", engine.tick_count());
            engine
        });

        TickHandle {
            commands: command_tx,
            snapshots,
            stop_tx,
            observers,
            task: Some(task),
        }
    }
}

/// Handle to a running engine. Dropping it cancels the task.
#[derive(Debug)]
pub struct TickHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
    snapshots: watch::Receiver<Arc<EngineSnapshot>>,
    stop_tx: watch::Sender<bool>,
    observers: Observers,
    task: Option<JoinHandle<MetricsEngine>>,
}

impl TickHandle {
    /// The most recently published snapshot.
    pub fn latest(&self) -> Arc<EngineSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// A receiver notified on every publication.
    pub fn snapshots(&self) -> watch::Receiver<Arc<EngineSnapshot>> {
        self.snapshots.clone()
    }

    /// Queue a command. Returns false if the task has already ended.
    pub fn send(&self, command: EngineCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.send(EngineCommand::SetEnabled(enabled))
    }

    pub fn set_input_enabled(&self, input: InputId, enabled: bool) -> bool {
        self.send(EngineCommand::SetInputEnabled(input, enabled))
    }

    pub fn initialize(&self, seeds: Vec<InputSeed>) -> bool {
        self.send(EngineCommand::Initialize(seeds))
    }

    /// Register an event callback on the running engine.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop ticking and take the engine back.
    ///
    /// Returns `None` if the task panicked or was already gone.
    pub async fn stop(mut self) -> Option<MetricsEngine> {
        let _ = self.stop_tx.send(true);
        let task = self.task.take()?;
        match task.await {
            Ok(engine) => Some(engine),
            Err(e) => {
                warn!("engine task ended abnormally: {}", e);
                None
            }
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
