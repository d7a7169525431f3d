//! The exchange facade handed to the dispatch layer.
//!
//! Every book mutation, and every read that feeds a decision (cancel checks
//! ownership and execution state before removing), runs under one exclusive
//! lock. Ids are assigned inside the same critical section, so id order is
//! arrival order at the book and a cancel can never race a match on the same
//! order.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::clock::Clock;
use crate::error::{HistoryError, OrderError, PersistenceError};
use crate::history::{self, MonthCode, TradeHistory};
use crate::orderbook::{BookSnapshot, OrderBook, OrderBookDepth};
use crate::ports::{FillNotifier, SnapshotStore};
use crate::sequencer::Sequencer;
use crate::session::SessionManager;
use crate::types::{Order, OrderSide};

/// Result of a trading call together with the caller's refreshed session
/// activity time (`None` when the caller has no session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack<T> {
    pub value: T,
    pub session: Option<u64>,
}

pub struct Exchange {
    book: Mutex<OrderBook>,
    sequencer: Sequencer,
    sessions: Arc<SessionManager>,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn SnapshotStore>>,
    /// Held from snapshot to save, so saves land in snapshot order
    persist_lock: Mutex<()>,
}

impl Exchange {
    pub fn new(
        notifier: Arc<dyn FillNotifier>,
        sessions: Arc<SessionManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Exchange {
            book: Mutex::new(OrderBook::new(notifier, clock.clone())),
            sequencer: Sequencer::new(0),
            sessions,
            clock,
            store: None,
            persist_lock: Mutex::new(()),
        }
    }

    /// Builds an exchange backed by `store` and restores the last snapshot.
    /// A missing or unreadable snapshot starts an empty book.
    pub fn open(
        notifier: Arc<dyn FillNotifier>,
        sessions: Arc<SessionManager>,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        let mut exchange = Exchange::new(notifier, sessions, clock);
        exchange.store = Some(store.clone());

        match store.load() {
            Ok(Some(snapshot)) => exchange.restore(snapshot),
            Ok(None) => tracing::warn!("No snapshot found, starting with an empty book"),
            Err(e) => tracing::warn!("Failed to load snapshot, starting with an empty book: {}", e),
        }
        exchange
    }

    fn book(&self) -> MutexGuard<'_, OrderBook> {
        // Critical sections finish mutating before they notify, so a panic
        // cannot leave a half-applied match behind.
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ack<T>(&self, value: T, user_id: &str) -> Ack<T> {
        Ack {
            value,
            session: self.sessions.update_user_activity(user_id),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn insert_limit_order(
        &self,
        side: OrderSide,
        size: u64,
        price: u64,
        user_id: &str,
    ) -> Result<Ack<u64>, OrderError> {
        validate(size, Some(price))?;
        let order_id = {
            let mut book = self.book();
            let order = Order::limit(self.sequencer.next(), side, size, price, user_id);
            book.insert_limit_order(order)
        };
        Ok(self.ack(order_id, user_id))
    }

    /// `value` is `None` when the best opposite level cannot cover `size`.
    pub fn insert_market_order(
        &self,
        side: OrderSide,
        size: u64,
        user_id: &str,
    ) -> Result<Ack<Option<u64>>, OrderError> {
        validate(size, None)?;
        let executed = {
            let mut book = self.book();
            let order_id = self.sequencer.next();
            book.insert_market_order(order_id, side, size, user_id)
        };
        Ok(self.ack(executed, user_id))
    }

    pub fn insert_stop_order(
        &self,
        side: OrderSide,
        size: u64,
        trigger_price: u64,
        user_id: &str,
    ) -> Result<Ack<u64>, OrderError> {
        validate(size, Some(trigger_price))?;
        let order_id = {
            let mut book = self.book();
            let order = Order::stop(self.sequencer.next(), side, size, trigger_price, user_id);
            book.insert_stop_order(order)
        };
        Ok(self.ack(order_id, user_id))
    }

    /// Cancels a resting order owned by `user_id`. Lookup, checks and
    /// removal happen under a single lock acquisition.
    pub fn cancel_order(&self, order_id: u64, user_id: &str) -> Result<Ack<u64>, OrderError> {
        {
            let mut book = self.book();
            let order = book
                .get_order(order_id)
                .ok_or(OrderError::NotFound(order_id))?;

            if order.user_id != user_id {
                return Err(OrderError::NotOwner(order_id));
            }
            if order.is_executed() {
                return Err(OrderError::AlreadyExecuted(order_id));
            }

            book.cancel_order(order_id)
                .ok_or(OrderError::NotFound(order_id))?;
        }
        Ok(self.ack(order_id, user_id))
    }

    pub fn get_order(&self, order_id: u64) -> Option<Order> {
        self.book().get_order(order_id).cloned()
    }

    /// Daily OHLC for the month written `MMYYYY`. Rejects malformed codes,
    /// months outside 1-12 and months that have not started yet.
    pub fn get_price_history(
        &self,
        month_code: &str,
        user_id: &str,
    ) -> Result<BTreeMap<u32, TradeHistory>, HistoryError> {
        let month = MonthCode::parse_not_future(month_code, self.clock.now_millis())?;
        let days = history::aggregate_month(self.book().history(), month);

        self.sessions.update_user_activity(user_id);
        Ok(days)
    }

    pub fn depth(&self, levels: usize) -> OrderBookDepth {
        self.book().get_depth(levels)
    }

    pub fn best_bid(&self) -> Option<u64> {
        self.book().best_bid()
    }

    pub fn best_ask(&self) -> Option<u64> {
        self.book().best_ask()
    }

    pub fn total_orders(&self) -> u64 {
        self.book().total_orders()
    }

    pub fn history_len(&self) -> usize {
        self.book().history().len()
    }

    /// The id the next accepted order will receive
    pub fn next_order_id(&self) -> u64 {
        self.sequencer.peek()
    }

    /// Consistent copy of the book. Only the copy happens under the lock.
    pub fn snapshot(&self) -> BookSnapshot {
        let book = self.book();
        book.snapshot(self.sequencer.peek())
    }

    /// Replaces the book state. The id floor becomes
    /// `max(stored next id, highest id seen + 1)`.
    pub fn restore(&self, snapshot: BookSnapshot) {
        let mut book = self.book();
        let floor = book.restore(snapshot);
        self.sequencer.advance_to(floor);
        tracing::info!(
            resting = book.total_orders(),
            history = book.history().len(),
            next_order_id = self.sequencer.peek(),
            "Order book restored from snapshot"
        );
    }

    /// Writes a snapshot to the configured store, if any
    pub fn persist(&self) -> Result<(), PersistenceError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        store.save(&snapshot)?;
        tracing::info!(next_order_id = snapshot.next_order_id, "Order book snapshot saved");
        Ok(())
    }

    /// Final persistence, called once by the owning process
    pub fn shutdown(&self) -> Result<(), PersistenceError> {
        tracing::info!("Exchange shutting down");
        self.persist()
    }
}

fn validate(size: u64, price: Option<u64>) -> Result<(), OrderError> {
    if size == 0 {
        return Err(OrderError::InvalidSize);
    }
    if price == Some(0) {
        return Err(OrderError::InvalidPrice);
    }
    Ok(())
}
