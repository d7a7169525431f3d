//! Outbound interfaces the core calls into. Implementations live with the
//! process that owns the exchange (UDP notifications, snapshot files).

use std::sync::Mutex;

use crate::error::PersistenceError;
use crate::orderbook::BookSnapshot;
use crate::types::Order;

/// Fill notifications are best-effort. Implementations must not block and
/// must swallow their own failures; the book never retries.
pub trait FillNotifier: Send + Sync {
    fn notify_fill(&self, user_id: &str, order: &Order);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl FillNotifier for NoopNotifier {
    fn notify_fill(&self, _user_id: &str, _order: &Order) {}
}

/// Keeps every notification in memory, in call order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    fills: Mutex<Vec<(String, Order)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fills(&self) -> Vec<(String, Order)> {
        self.fills
            .lock()
            .map(|fills| fills.clone())
            .unwrap_or_default()
    }

    pub fn notified_ids(&self) -> Vec<u64> {
        self.fills().iter().map(|(_, order)| order.id).collect()
    }
}

impl FillNotifier for RecordingNotifier {
    fn notify_fill(&self, user_id: &str, order: &Order) {
        if let Ok(mut fills) = self.fills.lock() {
            fills.push((user_id.to_string(), order.clone()));
        }
    }
}

/// Durable home for book snapshots.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &BookSnapshot) -> Result<(), PersistenceError>;

    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<BookSnapshot>, PersistenceError>;
}
