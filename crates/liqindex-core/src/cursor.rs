//! Per-controller scan cursor.

use serde::{Deserialize, Serialize};

/// Where scanning of one controller resumes within the current run.
///
/// The cursor only moves forward: a chunk that ends before the current
/// position leaves it untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor {
    /// Next block that still has to be scanned for this controller.
    pub effective_start: u64,
}

impl ScanCursor {
    /// Create a cursor at `start`. Block 0 is clamped to 1.
    pub fn new(start: u64) -> Self {
        Self {
            effective_start: start.max(1),
        }
    }

    /// Cursor for a fresh controller: the first block worth scanning.
    pub fn from_creation_block(creation_block: u64) -> Self {
        Self::new(creation_block)
    }

    /// Returns `true` if the chunk ending at `chunk_end` concerns this controller.
    pub fn includes(&self, chunk_end: u64) -> bool {
        self.effective_start <= chunk_end
    }

    /// Record that everything up to and including `chunk_end` was scanned.
    pub fn advance(&mut self, chunk_end: u64) {
        self.effective_start = self.effective_start.max(chunk_end.saturating_add(1));
    }
}
