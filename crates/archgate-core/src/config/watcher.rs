//! Change notification for configurations.
//!
//! Subscribers hold a [`Subscription`]; dropping it unsubscribes. The watcher
//! only delivers new documents; each subscriber re-runs resolution itself.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

use super::schema::Configuration;

type Callback = Arc<dyn Fn(&Configuration) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    callbacks: BTreeMap<u64, Callback>,
}

/// Delivers configuration changes to live subscribers.
#[derive(Clone, Default)]
pub struct ConfigWatcher {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl ConfigWatcher {
    /// Creates a watcher with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`; it stays registered while the returned handle lives.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Configuration) + Send + Sync + 'static,
    {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.callbacks.insert(id, Arc::new(callback));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Delivers `config` to every live subscriber in subscription order.
    ///
    /// Returns the number of subscribers notified. Callbacks run outside the
    /// internal lock, so they may subscribe or drop handles themselves.
    pub fn publish(&self, config: &Configuration) -> usize {
        let callbacks: Vec<Callback> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .values()
            .cloned()
            .collect();
        debug!(subscribers = callbacks.len(), "Publishing configuration change");
        for callback in &callbacks {
            callback(config);
        }
        callbacks.len()
    }

    /// Returns `true` while at least one subscription is live.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.subscriber_count() > 0
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .len()
    }
}

impl fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle returned by [`ConfigWatcher::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    /// Unsubscribes explicitly; same as dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .callbacks
                .remove(&self.id);
        }
    }
}
