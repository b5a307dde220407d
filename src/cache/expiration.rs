//! Expiration Evaluator Module
//!
//! Decides what a read must do with a stored entry.

use chrono::{DateTime, Utc};

use crate::cache::{CacheEntry, ExpirationPolicy};

/// Outcome of evaluating an entry at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Return the value, nothing to write
    Valid,
    /// Return the value and persist LastAccessed = now
    ValidRefresh,
    /// Delete the entry and report it absent
    Expired,
}

// == Evaluate ==
/// Evaluates an entry against its policy at `now`.
///
/// The sliding window is checked first and a sliding expiry ends evaluation.
/// A passed absolute deadline then overrides a sliding-valid result. Both
/// boundaries are strict: an entry is still valid when `now - last_accessed`
/// equals the window, or when `now` equals the deadline.
pub fn evaluate<T>(
    entry: &CacheEntry<T>,
    policy: Option<&ExpirationPolicy>,
    now: DateTime<Utc>,
) -> Evaluation {
    let Some(policy) = policy else {
        return Evaluation::Valid;
    };

    let mut outcome = Evaluation::Valid;

    if policy.has_sliding() {
        let elapsed = now - entry.last_accessed;
        if elapsed > policy.sliding_expiration {
            return Evaluation::Expired;
        }
        outcome = Evaluation::ValidRefresh;
    }

    if let Some(deadline) = policy.absolute_expiration {
        if deadline < now {
            return Evaluation::Expired;
        }
    }

    outcome
}
