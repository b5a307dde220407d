//! Change Monitor Module
//!
//! Binds external change signals to cache keys so that a change evicts the
//! bound entry, independently of its expiration policy.

mod notifier;
mod registry;

pub use notifier::{
    ChangeCallback, ChangeMonitor, ChangeNotifier, LocalChangeNotifier, Subscription,
};
pub use registry::MonitorRegistry;
