//! Overflow policies for the relay channel
//!
//! When the channel is full, these policies decide how long a producer may
//! wait before the record is dropped. No policy ever blocks indefinitely.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Policy for handling a full relay channel
///
/// # Example
///
/// ```
/// use log_relay::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default: wait briefly, then drop
/// let policy = OverflowPolicy::default();
/// assert_eq!(policy, OverflowPolicy::WaitThenDrop(Duration::from_millis(5)));
///
/// // Never wait
/// let policy = OverflowPolicy::DropNewest;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Drop the new record as soon as the channel is full
    DropNewest,

    /// Wait up to the given time for space, then drop the new record
    WaitThenDrop(Duration),
}

impl OverflowPolicy {
    /// Longest time a producer may wait on a full channel
    pub fn max_wait(&self) -> Duration {
        match self {
            OverflowPolicy::DropNewest => Duration::ZERO,
            OverflowPolicy::WaitThenDrop(wait) => *wait,
        }
    }
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::WaitThenDrop(Duration::from_millis(5))
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::WaitThenDrop(d) => write!(f, "WaitThenDrop({:?})", d),
        }
    }
}
