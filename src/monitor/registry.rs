//! Monitor Registry Module
//!
//! Per-cache registry of armed change monitors and their eviction task.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{CacheKey, StatsRecorder};
use crate::monitor::{ChangeMonitor, ChangeNotifier, Subscription};
use crate::storage::CacheStorage;
use crate::tasks::spawn_eviction_task;

/// One monitor bound to one key, subscribed once per watched source.
struct ArmedMonitor {
    key: CacheKey,
    fired: Arc<AtomicBool>,
    subscriptions: Vec<(Arc<dyn ChangeNotifier>, Subscription)>,
}

impl ArmedMonitor {
    fn unsubscribe(&self) {
        for (notifier, subscription) in &self.subscriptions {
            notifier.unsubscribe(*subscription);
        }
    }
}

// == Monitor Registry ==
/// Owns every change-monitor subscription made by one cache instance.
///
/// The first firing source of a monitor sends its key to the eviction task;
/// later firings of the same monitor are ignored. Dropping the registry
/// unsubscribes all live callbacks and stops the eviction task.
pub struct MonitorRegistry {
    evictions: UnboundedSender<CacheKey>,
    armed: Mutex<Vec<ArmedMonitor>>,
    eviction_task: JoinHandle<()>,
}

impl fmt::Debug for MonitorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorRegistry")
            .field("armed", &self.armed_count())
            .finish()
    }
}

impl MonitorRegistry {
    /// Creates the registry and spawns its eviction task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(storage: Arc<dyn CacheStorage>, stats: Arc<StatsRecorder>) -> Self {
        let (evictions, receiver) = mpsc::unbounded_channel();
        Self {
            evictions,
            armed: Mutex::new(Vec::new()),
            eviction_task: spawn_eviction_task(storage, stats, receiver),
        }
    }

    /// Arms each monitor so that a change on any of its sources evicts `key`.
    pub fn arm(&self, key: &CacheKey, monitors: Vec<ChangeMonitor>) {
        if monitors.is_empty() {
            return;
        }

        let mut armed = self.lock_armed();
        Self::prune_fired(&mut armed);

        for monitor in monitors {
            let fired = Arc::new(AtomicBool::new(false));
            let subscriptions = monitor
                .sources()
                .iter()
                .map(|source| {
                    let fired = fired.clone();
                    let evictions = self.evictions.clone();
                    let key = key.clone();
                    let subscription = monitor.notifier().subscribe(
                        source,
                        Box::new(move || {
                            if !fired.swap(true, Ordering::AcqRel) {
                                // Receiver is gone only after the registry is dropped
                                let _ = evictions.send(key);
                            }
                        }),
                    );
                    (monitor.notifier().clone(), subscription)
                })
                .collect();

            debug!(
                "Armed change monitor for {} on {} sources",
                key,
                monitor.sources().len()
            );
            armed.push(ArmedMonitor {
                key: key.clone(),
                fired,
                subscriptions,
            });
        }
    }

    /// Returns the number of monitors that have not fired yet.
    pub fn armed_count(&self) -> usize {
        self.lock_armed()
            .iter()
            .filter(|monitor| !monitor.fired.load(Ordering::Acquire))
            .count()
    }

    /// Returns the keys bound to monitors that have not fired yet.
    pub fn armed_keys(&self) -> Vec<CacheKey> {
        self.lock_armed()
            .iter()
            .filter(|monitor| !monitor.fired.load(Ordering::Acquire))
            .map(|monitor| monitor.key.clone())
            .collect()
    }

    fn lock_armed(&self) -> MutexGuard<'_, Vec<ArmedMonitor>> {
        self.armed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drops fired monitors, releasing their sibling subscriptions.
    fn prune_fired(armed: &mut Vec<ArmedMonitor>) {
        armed.retain(|monitor| {
            if monitor.fired.load(Ordering::Acquire) {
                monitor.unsubscribe();
                false
            } else {
                true
            }
        });
    }
}

impl Drop for MonitorRegistry {
    fn drop(&mut self) {
        for monitor in self.lock_armed().drain(..) {
            monitor.unsubscribe();
        }
        self.eviction_task.abort();
    }
}
