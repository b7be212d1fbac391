//! Serial numbers printed on test certificates.
//!
//! A serial is a positive integer, distinct from the record's storage id.
//! How the next one is chosen is a per-deployment [`SerialPolicy`]; the
//! [`SerialAllocator`] applies it inside a single write transaction.

mod allocator;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use allocator::SerialAllocator;
pub(crate) use allocator::allocation_error;

/// Human-facing sequential identifier of a test record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialNumber(u32);

impl SerialNumber {
    /// Wrap a raw value. Zero is not a valid serial.
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub(crate) fn from_column(value: i64) -> Option<Self> {
        u32::try_from(value).ok().and_then(Self::new)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the next serial is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialPolicy {
    /// Smallest positive integer not held by a live record. Deleting a
    /// record makes its number available again.
    GapFilling,

    /// A durable counter, incremented per allocation. Numbers are never
    /// reused, even after deletion.
    #[default]
    Monotonic,
}

impl fmt::Display for SerialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerialPolicy::GapFilling => f.write_str("gap_filling"),
            SerialPolicy::Monotonic => f.write_str("monotonic"),
        }
    }
}

/// First integer ≥ 1 missing from `sorted`, which must be ascending.
///
/// Duplicates and non-positive values are tolerated and skipped.
pub fn first_gap(sorted: &[i64]) -> i64 {
    let mut next = 1;
    for &n in sorted {
        if n < next {
            continue;
        }
        if n > next {
            break;
        }
        next += 1;
    }
    next
}
