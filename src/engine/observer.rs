//! Engine event fan-out.
//!
//! The registry is owned by one engine instance. [`Observers::subscribe`]
//! returns a [`Subscription`]; dropping it removes the callback.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::data::{HealthState, InputId};

/// Something the engine did that observers may care about.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// State was (re)seeded for this many inputs.
    Initialized { inputs: usize },
    /// A tick completed and was published.
    Ticked { tick: u64 },
    /// One input moved between health states during a tick.
    HealthChanged {
        input: InputId,
        from: HealthState,
        to: HealthState,
    },
    Paused,
    Resumed,
}

type Callback = Box<dyn Fn(&EngineEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: Vec<(u64, Arc<Callback>)>,
}

/// Callback registry for [`EngineEvent`]s.
#[derive(Clone, Default)]
pub struct Observers {
    inner: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`. It stays registered until the returned
    /// [`Subscription`] is dropped or cancelled.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let mut registry = self.inner.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.push((id, Arc::new(Box::new(callback))));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Callbacks run outside the lock, so a callback may subscribe or drop
    /// subscriptions without deadlocking.
    pub fn emit(&self, event: &EngineEvent) {
        let callbacks: Vec<Arc<Callback>> = self
            .inner
            .lock()
            .callbacks
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in callbacks {
            cb(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Disposer for a registered callback.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Unsubscribe now. Equivalent to dropping.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}
