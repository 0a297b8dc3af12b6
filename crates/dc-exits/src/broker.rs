//! Broker capability interface (spec §6) and the order-matching predicates
//! the reconciliation protocol runs against it. The real Alpaca SDK binding
//! is explicitly out of scope; this trait is the seam an adapter or a fake
//! plugs into.

use chrono::{DateTime, Utc};
use dc_schemas::BrokerOrder;

/// One open equity position, as the broker reports it (spec §6:
/// `{symbol, qty, avg_entry_price, current_price}`).
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub qty: i64,
    pub avg_entry_price: f64,
    pub current_price: f64,
}

#[derive(Debug, Clone)]
pub enum BrokerError {
    /// The broker rejected a stop submission because the account does not
    /// hold enough free quantity to cover it (Alpaca code `40310000`, or a
    /// message containing "insufficient qty available").
    InsufficientQty(String),
    Other(String),
}

impl std::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerError::InsufficientQty(msg) => write!(f, "insufficient qty: {msg}"),
            BrokerError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for BrokerError {}

/// The capability set the exit state machine needs from a broker. A real
/// adapter wraps an SDK client; tests plug in an in-memory fake.
pub trait Broker {
    fn get_all_positions(&self) -> Result<Vec<PositionSnapshot>, BrokerError>;
    fn get_orders(&self, symbol: &str) -> Result<Vec<BrokerOrder>, BrokerError>;
    fn submit_stop_order(&mut self, symbol: &str, qty: i64, stop_price: f64) -> Result<BrokerOrder, BrokerError>;
    fn cancel_order_by_id(&mut self, id: &str) -> Result<(), BrokerError>;
}

/// Market-data surface the exit cycle reads bars from.
pub trait MarketData {
    fn get_intraday_bars(&self, symbol: &str, minutes: usize, lookback_days: usize) -> Vec<dc_schemas::Bar>;
    fn get_daily_bars(&self, symbol: &str, lookback_days: usize) -> Vec<dc_schemas::Bar>;
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A sell stop/stop_limit order with exact qty match and stop price equal
/// (rounded to 2dp) to the desired stop.
pub fn matching_stop_order(order: &BrokerOrder, desired_symbol: &str, desired_qty: i64, desired_stop: f64) -> bool {
    if order.symbol.to_uppercase() != desired_symbol.to_uppercase() {
        return false;
    }
    if !order.is_sell() || !order.is_open() || !order.is_stop_type() {
        return false;
    }
    if order.qty != desired_qty {
        return false;
    }
    match order.stop_price {
        Some(stop_price) => round2(stop_price) == round2(desired_stop),
        None => false,
    }
}

/// Tie-break sort key for multiple simultaneously-matching orders, used
/// only when `EXIT_STOP_SELECTION_V2` is on: closest qty, most recent
/// submission, closest stop price.
fn selection_key(order: &BrokerOrder, desired_qty: Option<i64>, desired_stop: Option<f64>) -> (f64, i64, f64) {
    let qty_diff = match desired_qty {
        Some(q) => (order.qty - q).unsigned_abs() as f64,
        None => f64::INFINITY,
    };
    let ts_rank = match order.submitted_at {
        Some(ts) => -(ts.timestamp()),
        None => i64::MAX,
    };
    let stop_diff = match (desired_stop, order.stop_price) {
        (Some(d), Some(s)) => (s - d).abs(),
        _ => f64::INFINITY,
    };
    (qty_diff, ts_rank, stop_diff)
}

/// Pick the single best-matching order under the tie-break rule. `None`
/// only if `orders` is empty.
pub fn select_preferred_stop_order<'a>(
    orders: &'a [BrokerOrder],
    desired_qty: Option<i64>,
    desired_stop: Option<f64>,
) -> Option<&'a BrokerOrder> {
    orders
        .iter()
        .min_by(|a, b| {
            selection_key(a, desired_qty, desired_stop)
                .partial_cmp(&selection_key(b, desired_qty, desired_stop))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// `code == 40310000` (numeric) or a message containing "insufficient qty
/// available" both count as the broker-transient insufficient-qty case.
pub fn is_insufficient_qty(err: &BrokerError) -> bool {
    match err {
        BrokerError::InsufficientQty(_) => true,
        BrokerError::Other(msg) => msg.to_lowercase().contains("insufficient qty available"),
    }
}

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(symbol: &str, side: &str, status: &str, order_type: &str, qty: i64, stop: Option<f64>) -> BrokerOrder {
        BrokerOrder {
            id: "o1".to_string(),
            symbol: symbol.to_string(),
            side: side.to_string(),
            order_type: order_type.to_string(),
            status: status.to_string(),
            qty,
            stop_price: stop,
            submitted_at: None,
        }
    }

    #[test]
    fn matching_requires_exact_qty_and_rounded_stop() {
        let o = order("AAPL", "sell", "open", "stop", 10, Some(148.004));
        assert!(matching_stop_order(&o, "aapl", 10, 148.0));
        assert!(!matching_stop_order(&o, "AAPL", 11, 148.0));
        assert!(!matching_stop_order(&o, "AAPL", 10, 149.0));
    }

    #[test]
    fn non_stop_or_closed_orders_never_match() {
        let market_sell = order("AAPL", "sell", "open", "market", 10, None);
        assert!(!matching_stop_order(&market_sell, "AAPL", 10, 148.0));
        let filled_stop = order("AAPL", "sell", "filled", "stop", 10, Some(148.0));
        assert!(!matching_stop_order(&filled_stop, "AAPL", 10, 148.0));
    }

    #[test]
    fn insufficient_qty_detected_by_message() {
        let err = BrokerError::Other("Insufficient qty available for order".to_string());
        assert!(is_insufficient_qty(&err));
        let other = BrokerError::Other("some other failure".to_string());
        assert!(!is_insufficient_qty(&other));
    }
}
