use std::sync::atomic::{AtomicU64, Ordering};

/// Source of order ids. Ids are handed out once and never reused.
#[derive(Debug, Default)]
pub struct Sequencer {
    next: AtomicU64,
}

impl Sequencer {
    pub fn new(start: u64) -> Self {
        Sequencer {
            next: AtomicU64::new(start),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The id the next call to `next` will return
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    /// Raises the floor so the next id is at least `floor`. Never lowers it.
    pub fn advance_to(&self, floor: u64) {
        self.next.fetch_max(floor, Ordering::SeqCst);
    }
}
