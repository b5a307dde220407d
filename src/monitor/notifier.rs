//! Change Notifier Module
//!
//! The change-notification contract plus an in-process notifier.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// Callback fired at most once when a watched source changes.
pub type ChangeCallback = Box<dyn FnOnce() + Send + 'static>;

type Subscribers = HashMap<String, Vec<(Subscription, ChangeCallback)>>;

/// Handle to one callback registered with a notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(pub u64);

/// Source of out-of-band change signals.
///
/// `subscribe` callbacks may be invoked from any thread. Unsubscribing a
/// callback that already fired is a no-op.
pub trait ChangeNotifier: Send + Sync + Debug {
    fn subscribe(&self, source: &str, on_change: ChangeCallback) -> Subscription;

    fn unsubscribe(&self, subscription: Subscription);
}

// == Change Monitor ==
/// A notifier bound to the sources whose change should evict an entry.
#[derive(Debug, Clone)]
pub struct ChangeMonitor {
    notifier: Arc<dyn ChangeNotifier>,
    sources: Vec<String>,
}

impl ChangeMonitor {
    pub fn new<I, S>(notifier: Arc<dyn ChangeNotifier>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            notifier,
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }

    pub fn notifier(&self) -> &Arc<dyn ChangeNotifier> {
        &self.notifier
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

// == Local Change Notifier ==
/// In-process notifier: `notify(source)` fires and consumes every callback
/// subscribed to that source.
#[derive(Default)]
pub struct LocalChangeNotifier {
    /// source -> pending callbacks
    subscribers: Mutex<Subscribers>,
    next_id: AtomicU64,
}

impl Debug for LocalChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalChangeNotifier")
            .field("pending", &self.pending())
            .finish()
    }
}

impl LocalChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals that `source` changed. Returns how many callbacks fired.
    pub fn notify(&self, source: &str) -> usize {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let fired = self.lock_subscribers().remove(source).unwrap_or_default();
        let count = fired.len();
        debug!("Change on source '{}' fires {} callbacks", source, count);
        for (_, callback) in fired {
            callback();
        }
        count
    }

    /// Returns the number of callbacks waiting on any source.
    pub fn pending(&self) -> usize {
        self.lock_subscribers().values().map(Vec::len).sum()
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ChangeNotifier for LocalChangeNotifier {
    fn subscribe(&self, source: &str, on_change: ChangeCallback) -> Subscription {
        let subscription = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock_subscribers()
            .entry(source.to_string())
            .or_default()
            .push((subscription, on_change));
        subscription
    }

    fn unsubscribe(&self, subscription: Subscription) {
        let mut subscribers = self.lock_subscribers();
        for callbacks in subscribers.values_mut() {
            callbacks.retain(|(id, _)| *id != subscription);
        }
        subscribers.retain(|_, callbacks| !callbacks.is_empty());
    }
}
