//! Daily OHLC summaries derived from the fill history.
//!
//! Nothing here is stored: every query walks the history, keeps the executed
//! orders that fall inside the requested month and buckets them by UTC day.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate};
use serde::Serialize;

use crate::error::HistoryError;
use crate::types::Order;

/// Market summary for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeHistory {
    pub day_of_month: u32,
    pub opening_price: u64,
    pub closing_price: u64,
    pub highest_price: u64,
    pub lowest_price: u64,
    pub fulfilled_orders: Vec<Order>,
}

/// A calendar month as requested by clients, written `MMYYYY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthCode {
    pub year: i32,
    pub month: u32,
}

impl MonthCode {
    pub fn parse(code: &str) -> Result<Self, HistoryError> {
        let code = code.trim();
        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HistoryError::Malformed(code.to_string()));
        }

        let month: u32 = code[..2]
            .parse()
            .map_err(|_| HistoryError::Malformed(code.to_string()))?;
        let year: i32 = code[2..]
            .parse()
            .map_err(|_| HistoryError::Malformed(code.to_string()))?;

        if !(1..=12).contains(&month) {
            return Err(HistoryError::InvalidMonth(month));
        }

        Ok(MonthCode { year, month })
    }

    /// Parses and rejects months that have not started yet at `now_millis`.
    pub fn parse_not_future(code: &str, now_millis: u64) -> Result<Self, HistoryError> {
        let requested = Self::parse(code)?;
        if let Some(now) = DateTime::from_timestamp_millis(now_millis as i64) {
            let current = MonthCode {
                year: now.year(),
                month: now.month(),
            };
            if requested > current {
                return Err(HistoryError::FutureMonth {
                    month: requested.month,
                    year: requested.year,
                });
            }
        }
        Ok(requested)
    }

    /// Epoch-millis range `[start, end)` covered by the month, in UTC
    pub fn bounds_millis(&self) -> (u64, u64) {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        (
            month_start_millis(self.year, self.month),
            month_start_millis(next_year, next_month),
        )
    }
}

fn month_start_millis(year: i32, month: u32) -> u64 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|start| start.and_utc().timestamp_millis().max(0) as u64)
        .unwrap_or(u64::MAX)
}

fn day_of_month(timestamp_millis: u64) -> Option<u32> {
    DateTime::from_timestamp_millis(timestamp_millis as i64).map(|dt| dt.day())
}

/// Buckets executed orders with `start <= timestamp < end` by day of month.
/// Orders with equal timestamps keep their history order.
pub fn aggregate_range(history: &[Order], start: u64, end: u64) -> BTreeMap<u32, TradeHistory> {
    let mut in_range: Vec<&Order> = history
        .iter()
        .filter(|o| o.is_executed() && o.timestamp >= start && o.timestamp < end)
        .collect();
    in_range.sort_by_key(|o| o.timestamp);

    let mut days: BTreeMap<u32, Vec<Order>> = BTreeMap::new();
    for order in in_range {
        if let Some(day) = day_of_month(order.timestamp) {
            days.entry(day).or_default().push(order.clone());
        }
    }

    days.into_iter()
        .filter_map(|(day, orders)| summarize_day(day, orders).map(|summary| (day, summary)))
        .collect()
}

pub fn aggregate_month(history: &[Order], month: MonthCode) -> BTreeMap<u32, TradeHistory> {
    let (start, end) = month.bounds_millis();
    aggregate_range(history, start, end)
}

fn summarize_day(day_of_month: u32, orders: Vec<Order>) -> Option<TradeHistory> {
    let opening_price = orders.first()?.price;
    let closing_price = orders.last()?.price;
    let highest_price = orders.iter().map(|o| o.price).max()?;
    let lowest_price = orders.iter().map(|o| o.price).min()?;

    Some(TradeHistory {
        day_of_month,
        opening_price,
        closing_price,
        highest_price,
        lowest_price,
        fulfilled_orders: orders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderSide;

    // 2024-03-01T00:00:00Z
    const MARCH_1: u64 = 1_709_251_200_000;
    const DAY: u64 = 86_400_000;

    fn fill(id: u64, price: u64, timestamp: u64) -> Order {
        let mut order = Order::limit(id, OrderSide::Ask, 1, price, "u");
        order.timestamp = timestamp;
        order
    }

    #[test]
    fn test_parse_month_code() {
        assert_eq!(
            MonthCode::parse("032024"),
            Ok(MonthCode { year: 2024, month: 3 })
        );
        assert_eq!(MonthCode::parse("132024"), Err(HistoryError::InvalidMonth(13)));
        assert_eq!(MonthCode::parse("002024"), Err(HistoryError::InvalidMonth(0)));
        assert!(matches!(MonthCode::parse("3-2024"), Err(HistoryError::Malformed(_))));
        assert!(matches!(MonthCode::parse("0320245"), Err(HistoryError::Malformed(_))));
    }

    #[test]
    fn test_future_month_rejected() {
        let now = MARCH_1 + 10 * DAY;
        assert!(MonthCode::parse_not_future("032024", now).is_ok());
        assert!(MonthCode::parse_not_future("122023", now).is_ok());
        assert_eq!(
            MonthCode::parse_not_future("042024", now),
            Err(HistoryError::FutureMonth { month: 4, year: 2024 })
        );
        assert!(MonthCode::parse_not_future("012025", now).is_err());
    }

    #[test]
    fn test_month_bounds() {
        let (start, end) = MonthCode { year: 2024, month: 3 }.bounds_millis();
        assert_eq!(start, MARCH_1);
        assert_eq!(end, MARCH_1 + 31 * DAY);

        let (start, end) = MonthCode { year: 2023, month: 12 }.bounds_millis();
        assert_eq!(end - start, 31 * DAY);
    }

    #[test]
    fn test_daily_ohlc() {
        let history = vec![
            fill(1, 100, MARCH_1 + 1_000),
            fill(2, 120, MARCH_1 + 5_000),
            fill(3, 90, MARCH_1 + 3_000),
            fill(4, 110, MARCH_1 + 9_000),
            fill(5, 200, MARCH_1 + DAY + 1),
        ];

        let days = aggregate_month(&history, MonthCode { year: 2024, month: 3 });
        assert_eq!(days.len(), 2);

        let first = &days[&1];
        assert_eq!(first.opening_price, 100);
        assert_eq!(first.closing_price, 110);
        assert_eq!(first.highest_price, 120);
        assert_eq!(first.lowest_price, 90);
        let ids: Vec<u64> = first.fulfilled_orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 3, 2, 4]);

        let second = &days[&2];
        assert_eq!(second.opening_price, 200);
        assert_eq!(second.closing_price, 200);
        assert_eq!(second.fulfilled_orders.len(), 1);
    }

    #[test]
    fn test_orders_outside_month_or_unexecuted_are_ignored() {
        let history = vec![
            fill(1, 100, MARCH_1 - 1),
            fill(2, 100, MARCH_1 + 31 * DAY),
            fill(3, 100, 0),
        ];
        assert!(aggregate_month(&history, MonthCode { year: 2024, month: 3 }).is_empty());
    }

    #[test]
    fn test_equal_timestamps_keep_history_order() {
        let history = vec![fill(1, 105, MARCH_1), fill(2, 100, MARCH_1)];
        let days = aggregate_range(&history, MARCH_1, MARCH_1 + DAY);
        assert_eq!(days[&1].opening_price, 105);
        assert_eq!(days[&1].closing_price, 100);
    }
}
