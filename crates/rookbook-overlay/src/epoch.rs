//! Submission epochs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag assigned to each submitted edit.
///
/// The server acknowledges by epoch; every pending edit whose epoch is at or
/// below the acknowledged one is considered applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(pub u64);

impl Epoch {
    pub const ZERO: Epoch = Epoch(0);

    pub fn get(self) -> u64 {
        self.0
    }

    /// Whether an acknowledgment for `acked` covers this epoch.
    pub fn is_covered_by(self, acked: Epoch) -> bool {
        self <= acked
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Epoch {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Monotonic source of epochs.
///
/// A value type: [`advanced`](Self::advanced) returns the next counter
/// instead of mutating, so it can live inside immutable client snapshots.
/// Pruning never resets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpochCounter {
    next: Epoch,
}

impl EpochCounter {
    pub fn new() -> Self {
        Self { next: Epoch::ZERO }
    }

    /// The epoch the next submit will be tagged with.
    pub fn current(&self) -> Epoch {
        self.next
    }

    /// The counter after one submit.
    pub fn advanced(&self) -> Self {
        Self { next: Epoch(self.next.0 + 1) }
    }
}
