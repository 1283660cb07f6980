//! Latest-value store shared by the reader task and the scrape path.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::ReadingId;

/// Latest known value of one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    /// At least one valid update has been written.
    pub populated: bool,
}

impl Sample {
    /// State of an entry that has never been written.
    pub const EMPTY: Sample = Sample {
        value: 0.0,
        populated: false,
    };
}

/// One synchronized `(value, populated)` cell per reading.
///
/// Entries are only reachable through [`write`](Self::write) and
/// [`read`](Self::read); each holds its own lock, so a write is visible to
/// readers either entirely or not at all. Locks are never held across I/O.
#[derive(Debug)]
pub struct SampleStore {
    entries: Box<[Mutex<Sample>]>,
}

impl SampleStore {
    /// Create `len` unpopulated entries.
    pub fn new(len: usize) -> Self {
        Self {
            entries: (0..len).map(|_| Mutex::new(Sample::EMPTY)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set the entry's value and mark it populated in one update.
    ///
    /// Ids outside the store are ignored.
    pub fn write(&self, id: ReadingId, value: f64) {
        if let Some(entry) = self.entries.get(id.index()) {
            *lock(entry) = Sample {
                value,
                populated: true,
            };
        }
    }

    /// Most recently written pair, or [`Sample::EMPTY`].
    pub fn read(&self, id: ReadingId) -> Sample {
        self.entries
            .get(id.index())
            .map(|entry| *lock(entry))
            .unwrap_or(Sample::EMPTY)
    }
}

// A poisoned entry still holds a whole Sample: writes are a single assignment.
fn lock(entry: &Mutex<Sample>) -> MutexGuard<'_, Sample> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}
