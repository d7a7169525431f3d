use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Bid,
    Ask,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Bid => OrderSide::Ask,
            OrderSide::Ask => OrderSide::Bid,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderSide::Bid => "bid",
            OrderSide::Ask => "ask",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Rests at its price until matched or cancelled
    Limit,
    /// Executes immediately against a single price level, or not at all
    Market,
    /// Rests at its trigger price until released by a price move
    Stop,
}

impl OrderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderKind::Limit => "limit",
            OrderKind::Market => "market",
            OrderKind::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub side: OrderSide,
    pub kind: OrderKind,
    /// Remaining size while resting, filled size once executed
    pub size: u64,
    /// Resting price for limits, trigger price for resting stops,
    /// execution price for anything in the history
    pub price: u64,
    pub user_id: String,
    /// Epoch millis of the full execution, 0 while unexecuted
    pub timestamp: u64,
}

impl Order {
    pub fn limit(id: u64, side: OrderSide, size: u64, price: u64, user_id: &str) -> Self {
        Self::new(id, side, OrderKind::Limit, size, price, user_id)
    }

    pub fn stop(id: u64, side: OrderSide, size: u64, trigger_price: u64, user_id: &str) -> Self {
        Self::new(id, side, OrderKind::Stop, size, trigger_price, user_id)
    }

    /// Market orders carry no price until they match.
    pub fn market(id: u64, side: OrderSide, size: u64, user_id: &str) -> Self {
        Self::new(id, side, OrderKind::Market, size, 0, user_id)
    }

    fn new(id: u64, side: OrderSide, kind: OrderKind, size: u64, price: u64, user_id: &str) -> Self {
        Order {
            id,
            side,
            kind,
            size,
            price,
            user_id: user_id.to_string(),
            timestamp: 0,
        }
    }

    pub fn is_executed(&self) -> bool {
        self.timestamp != 0
    }
}
