use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe ID generator
#[derive(Debug)]
pub(crate) struct IdGen {
    next_id: AtomicU64,
}

impl IdGen {
    pub(crate) const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Get the next unique ID
    pub(crate) fn get_next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Numbering for stage workers, used in thread names and log events.
pub(crate) static STAGE_IDS: IdGen = IdGen::new();
