//! Background Tasks Module
//!
//! Contains background tasks owned by a cache instance.
//!
//! # Tasks
//! - Change-monitor eviction: deletes keys whose change monitor fired

mod eviction;

pub use eviction::spawn_eviction_task;
