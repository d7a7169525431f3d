use super::types::{Order, OrderKind, OrderSide};
use crate::clock::Clock;
use crate::ports::FillNotifier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// FIFO queue of resting orders sharing one price
#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    orders: VecDeque<Order>,
    total_size: u64,
}

impl PriceLevel {
    fn push(&mut self, order: Order) {
        self.total_size += order.size;
        self.orders.push_back(order);
    }

    fn remove(&mut self, order_id: u64) -> Option<Order> {
        let index = self.orders.iter().position(|o| o.id == order_id)?;
        let order = self.orders.remove(index)?;
        self.total_size -= order.size;
        Some(order)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// Represents a price level for depth retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepthLevel {
    pub price: u64,
    pub size: u64,
}

/// Depth data for both limit sides of the orderbook
#[derive(Debug, Clone, Serialize)]
pub struct OrderBookDepth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

/// One price-indexed collection of resting orders (limit or stop, bid or ask)
#[derive(Debug, Clone)]
pub struct OrderbookSide {
    /// true if higher prices are better (limit bids), false otherwise
    pub higher_is_better: bool,
    /// Price levels stored in a BTreeMap for efficient ordered access
    pub levels: BTreeMap<u64, PriceLevel>,
}

impl OrderbookSide {
    fn new(higher_is_better: bool) -> Self {
        OrderbookSide {
            higher_is_better,
            levels: BTreeMap::new(),
        }
    }

    pub fn best_price(&self) -> Option<u64> {
        if self.higher_is_better {
            self.levels.last_key_value().map(|(&k, _)| k)
        } else {
            self.levels.first_key_value().map(|(&k, _)| k)
        }
    }

    pub fn level(&self, price: u64) -> Option<&PriceLevel> {
        self.levels.get(&price)
    }

    fn insert(&mut self, order: Order) {
        self.levels.entry(order.price).or_default().push(order);
    }

    fn find(&self, order_id: u64) -> Option<&Order> {
        self.levels
            .values()
            .flat_map(|level| level.orders.iter())
            .find(|o| o.id == order_id)
    }

    /// Removes the order wherever it rests, dropping its level if emptied
    fn remove_order(&mut self, order_id: u64) -> Option<Order> {
        let (price, order) = self
            .levels
            .iter_mut()
            .find_map(|(&price, level)| level.remove(order_id).map(|o| (price, o)))?;

        if self.levels.get(&price).is_some_and(PriceLevel::is_empty) {
            self.levels.remove(&price);
        }
        Some(order)
    }

    /// Takes every order priced at or below `price`
    fn take_at_or_below(&mut self, price: u64) -> Vec<Order> {
        let above = match price.checked_add(1) {
            Some(bound) => self.levels.split_off(&bound),
            None => BTreeMap::new(),
        };
        let taken = std::mem::replace(&mut self.levels, above);
        taken.into_values().flat_map(|l| l.orders).collect()
    }

    /// Takes every order priced at or above `price`
    fn take_at_or_above(&mut self, price: u64) -> Vec<Order> {
        let taken = self.levels.split_off(&price);
        taken.into_values().flat_map(|l| l.orders).collect()
    }

    fn order_count(&self) -> usize {
        self.levels.values().map(PriceLevel::len).sum()
    }

    fn to_snapshot(&self) -> BTreeMap<u64, Vec<Order>> {
        self.levels
            .iter()
            .map(|(&price, level)| (price, level.orders.iter().cloned().collect()))
            .collect()
    }

    fn from_snapshot(higher_is_better: bool, levels: BTreeMap<u64, Vec<Order>>) -> Self {
        let mut side = OrderbookSide::new(higher_is_better);
        for (price, orders) in levels {
            for mut order in orders.into_iter().filter(|o| o.size > 0) {
                order.price = price;
                side.insert(order);
            }
        }
        side
    }
}

/// Persistable copy of the whole mutable book state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub limit_ask: BTreeMap<u64, Vec<Order>>,
    pub limit_bid: BTreeMap<u64, Vec<Order>>,
    pub stop_ask: BTreeMap<u64, Vec<Order>>,
    pub stop_bid: BTreeMap<u64, Vec<Order>>,
    pub history: Vec<Order>,
    pub next_order_id: u64,
}

impl BookSnapshot {
    /// Largest order id anywhere in the snapshot
    pub fn max_order_id(&self) -> Option<u64> {
        [&self.limit_ask, &self.limit_bid, &self.stop_ask, &self.stop_bid]
            .into_iter()
            .flat_map(|book| book.values().flatten())
            .chain(self.history.iter())
            .map(|o| o.id)
            .max()
    }

    /// First id that is safe to hand out after restoring this snapshot
    pub fn id_floor(&self) -> u64 {
        let seen = self.max_order_id().map_or(0, |id| id + 1);
        seen.max(self.next_order_id)
    }
}

struct LevelFill {
    price: u64,
    drained: bool,
}

pub struct OrderBook {
    limit_asks: OrderbookSide,
    limit_bids: OrderbookSide,
    /// Sell stops, keyed by trigger price
    stop_asks: OrderbookSide,
    /// Buy stops, keyed by trigger price
    stop_bids: OrderbookSide,

    /// Fully executed orders in execution order
    history: Vec<Order>,

    notifier: Arc<dyn FillNotifier>,
    clock: Arc<dyn Clock>,

    total_orders: u64,
}

impl OrderBook {
    pub fn new(notifier: Arc<dyn FillNotifier>, clock: Arc<dyn Clock>) -> Self {
        OrderBook {
            limit_asks: OrderbookSide::new(false),
            limit_bids: OrderbookSide::new(true),
            stop_asks: OrderbookSide::new(false),
            stop_bids: OrderbookSide::new(false),
            history: Vec::new(),
            notifier,
            clock,
            total_orders: 0,
        }
    }

    fn limit_side_mut(&mut self, side: OrderSide) -> &mut OrderbookSide {
        match side {
            OrderSide::Bid => &mut self.limit_bids,
            OrderSide::Ask => &mut self.limit_asks,
        }
    }

    fn stop_side_mut(&mut self, side: OrderSide) -> &mut OrderbookSide {
        match side {
            OrderSide::Bid => &mut self.stop_bids,
            OrderSide::Ask => &mut self.stop_asks,
        }
    }

    fn match_time(&self) -> u64 {
        // 0 is reserved for "not executed"
        self.clock.now_millis().max(1)
    }

    /// Rests a limit order at its price. Limit orders never cross on entry.
    pub fn insert_limit_order(&mut self, order: Order) -> u64 {
        let order_id = order.id;
        tracing::debug!(order_id, side = ?order.side, price = order.price, size = order.size, "limit order rests");
        self.limit_side_mut(order.side).insert(order);
        self.total_orders += 1;
        order_id
    }

    /// Rests a stop order at its trigger price until a drain releases it
    pub fn insert_stop_order(&mut self, order: Order) -> u64 {
        let order_id = order.id;
        tracing::debug!(order_id, side = ?order.side, trigger = order.price, size = order.size, "stop order rests");
        self.stop_side_mut(order.side).insert(order);
        self.total_orders += 1;
        order_id
    }

    /// Fills a market order entirely from the single best opposite level.
    /// Returns `None`, leaving the book untouched, when that level alone
    /// cannot cover `size`.
    pub fn insert_market_order(
        &mut self,
        order_id: u64,
        side: OrderSide,
        size: u64,
        user_id: &str,
    ) -> Option<u64> {
        let drained = self.execute_market(Order::market(order_id, side, size, user_id))?;
        if drained {
            self.run_stop_cascade(side.opposite());
        }
        Some(order_id)
    }

    /// Shared path for market orders and released stops. The executed order
    /// is logged with the level price it matched at. Returns whether the
    /// matched level was drained; stop activation is left to the caller.
    fn execute_market(&mut self, mut order: Order) -> Option<bool> {
        let Some(fill) = self.match_best_level(order.side, order.size) else {
            tracing::debug!(order_id = order.id, side = ?order.side, size = order.size, "insufficient liquidity at best level");
            return None;
        };

        order.price = fill.price;
        order.timestamp = self.match_time();
        self.notifier.notify_fill(&order.user_id, &order);
        self.history.push(order);

        Some(fill.drained)
    }

    /// Consumes `size` from the best level opposite `taker_side`, oldest
    /// order first. Fully consumed makers are timestamped, notified and
    /// logged; a partially consumed maker keeps resting with reduced size.
    fn match_best_level(&mut self, taker_side: OrderSide, size: u64) -> Option<LevelFill> {
        let now = self.match_time();
        let book = self.limit_side_mut(taker_side.opposite());
        let price = book.best_price()?;
        let level = book.levels.get_mut(&price)?;

        if level.total_size < size {
            return None;
        }

        let mut remaining = size;
        let mut filled = Vec::new();

        while remaining > 0 {
            let Some(front_size) = level.orders.front().map(|o| o.size) else {
                break;
            };

            if front_size <= remaining {
                if let Some(mut maker) = level.orders.pop_front() {
                    remaining -= maker.size;
                    level.total_size -= maker.size;
                    maker.timestamp = now;
                    filled.push(maker);
                }
            } else {
                if let Some(maker) = level.orders.front_mut() {
                    maker.size -= remaining;
                }
                level.total_size -= remaining;
                remaining = 0;
            }
        }

        let drained = level.orders.is_empty();
        if drained {
            book.levels.remove(&price);
        }

        self.total_orders -= filled.len() as u64;
        for maker in filled {
            tracing::debug!(order_id = maker.id, price, size = maker.size, "resting order filled");
            self.notifier.notify_fill(&maker.user_id, &maker);
            self.history.push(maker);
        }

        Some(LevelFill { price, drained })
    }

    /// Runs the stop cascade started by a drained limit level on
    /// `drained_side`.
    ///
    /// Each drain releases a group of stops, oldest first. A released stop
    /// that drains another level releases its own group, which runs to
    /// completion before the rest of the outer group. Pending groups are kept
    /// on an explicit stack, so cascade length is bounded only by the number
    /// of resting stops. Stops that cannot fill are dropped.
    fn run_stop_cascade(&mut self, drained_side: OrderSide) {
        let mut pending: Vec<VecDeque<Order>> = Vec::new();
        let released = self.release_stops(drained_side);
        if !released.is_empty() {
            pending.push(released);
        }

        while let Some(group) = pending.last_mut() {
            let next = group.pop_front();
            if group.is_empty() {
                pending.pop();
            }
            let Some(stop) = next else {
                continue;
            };

            let order_id = stop.id;
            let side = stop.side;
            tracing::debug!(order_id, trigger = stop.price, "stop order released");

            match self.execute_market(stop) {
                Some(true) => {
                    let released = self.release_stops(side.opposite());
                    if !released.is_empty() {
                        pending.push(released);
                    }
                }
                Some(false) => {}
                None => tracing::debug!(order_id, "released stop order dropped"),
            }
        }
    }

    /// Removes the stops triggered by a drained level on `drained_side`,
    /// oldest first. A drained ask releases buy stops with trigger <= new
    /// best ask, a drained bid releases sell stops with trigger >= new best
    /// bid. Nothing is released when the drained side is now empty.
    fn release_stops(&mut self, drained_side: OrderSide) -> VecDeque<Order> {
        let mut released = match drained_side {
            OrderSide::Ask => match self.limit_asks.best_price() {
                Some(best_ask) => self.stop_bids.take_at_or_below(best_ask),
                None => return VecDeque::new(),
            },
            OrderSide::Bid => match self.limit_bids.best_price() {
                Some(best_bid) => self.stop_asks.take_at_or_above(best_bid),
                None => return VecDeque::new(),
            },
        };

        self.total_orders -= released.len() as u64;
        released.sort_by_key(|o| o.id);
        released.into()
    }

    /// Removes a resting limit or stop order. `None` if it is not resting
    /// anywhere (executed, cancelled or unknown).
    pub fn cancel_order(&mut self, order_id: u64) -> Option<u64> {
        let removed = [
            &mut self.limit_asks,
            &mut self.limit_bids,
            &mut self.stop_asks,
            &mut self.stop_bids,
        ]
        .into_iter()
        .find_map(|side| side.remove_order(order_id));

        removed.map(|order| {
            self.total_orders -= 1;
            tracing::debug!(order_id, kind = order.kind.as_str(), "order cancelled");
            order_id
        })
    }

    /// Get an order by its ID, resting books first, then the history
    pub fn get_order(&self, order_id: u64) -> Option<&Order> {
        [
            &self.limit_asks,
            &self.limit_bids,
            &self.stop_asks,
            &self.stop_bids,
        ]
        .into_iter()
        .find_map(|side| side.find(order_id))
        .or_else(|| self.history.iter().find(|o| o.id == order_id))
    }

    pub fn history(&self) -> &[Order] {
        &self.history
    }

    /// Get the total number of resting orders, limit and stop
    pub fn total_orders(&self) -> u64 {
        self.total_orders
    }

    pub fn best_bid(&self) -> Option<u64> {
        self.limit_bids.best_price()
    }

    pub fn best_ask(&self) -> Option<u64> {
        self.limit_asks.best_price()
    }

    /// Resting limit level for `side` at `price`
    pub fn limit_level(&self, side: OrderSide, price: u64) -> Option<&PriceLevel> {
        match side {
            OrderSide::Bid => self.limit_bids.level(price),
            OrderSide::Ask => self.limit_asks.level(price),
        }
    }

    /// Resting stop level for `side` at `trigger_price`
    pub fn stop_level(&self, side: OrderSide, trigger_price: u64) -> Option<&PriceLevel> {
        match side {
            OrderSide::Bid => self.stop_bids.level(trigger_price),
            OrderSide::Ask => self.stop_asks.level(trigger_price),
        }
    }

    /// Get limit-book depth up to the specified number of levels, best first
    pub fn get_depth(&self, levels: usize) -> OrderBookDepth {
        let to_depth = |(&price, level): (&u64, &PriceLevel)| DepthLevel {
            price,
            size: level.total_size,
        };

        OrderBookDepth {
            bids: self.limit_bids.levels.iter().rev().take(levels).map(to_depth).collect(),
            asks: self.limit_asks.levels.iter().take(levels).map(to_depth).collect(),
        }
    }

    pub fn snapshot(&self, next_order_id: u64) -> BookSnapshot {
        BookSnapshot {
            limit_ask: self.limit_asks.to_snapshot(),
            limit_bid: self.limit_bids.to_snapshot(),
            stop_ask: self.stop_asks.to_snapshot(),
            stop_bid: self.stop_bids.to_snapshot(),
            history: self.history.clone(),
            next_order_id,
        }
    }

    /// Replaces the whole book state. Returns the first id safe to assign.
    pub fn restore(&mut self, snapshot: BookSnapshot) -> u64 {
        let floor = snapshot.id_floor();

        self.limit_asks = OrderbookSide::from_snapshot(false, snapshot.limit_ask);
        self.limit_bids = OrderbookSide::from_snapshot(true, snapshot.limit_bid);
        self.stop_asks = OrderbookSide::from_snapshot(false, snapshot.stop_ask);
        self.stop_bids = OrderbookSide::from_snapshot(false, snapshot.stop_bid);
        self.history = snapshot.history;
        self.total_orders = [
            &self.limit_asks,
            &self.limit_bids,
            &self.stop_asks,
            &self.stop_bids,
        ]
        .into_iter()
        .map(|side| side.order_count() as u64)
        .sum();

        floor
    }

    /// Executed stop orders keep their kind in the history
    pub fn executed_stops(&self) -> impl Iterator<Item = &Order> {
        self.history.iter().filter(|o| o.kind == OrderKind::Stop)
    }
}
