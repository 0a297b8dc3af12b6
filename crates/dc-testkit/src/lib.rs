//! In-memory broker and market-data fakes for exit-management scenario
//! tests. Grounded on `mqk-testkit::recovery::FakeBroker`'s shape: a
//! minimal, in-memory map keyed by identity, with no retry/backoff/polling
//! logic of its own — callers drive it directly.

use dc_exits::{Broker, BrokerError, PositionSnapshot};
use dc_schemas::{Bar, BrokerOrder};
use std::collections::HashMap;

/// Fake broker: open orders keyed by id, positions keyed by symbol. Submits
/// always succeed unless `fail_insufficient_qty_for` names the symbol.
#[derive(Default)]
pub struct FakeBroker {
    orders: HashMap<String, BrokerOrder>,
    positions: HashMap<String, PositionSnapshot>,
    next_id: u64,
    pub fail_insufficient_qty_for: Option<String>,
    pub cancel_calls: Vec<String>,
    pub submit_calls: Vec<(String, i64, f64)>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self { next_id: 1, ..Default::default() }
    }

    pub fn with_position(mut self, position: PositionSnapshot) -> Self {
        self.positions.insert(position.symbol.clone(), position);
        self
    }

    pub fn with_order(mut self, order: BrokerOrder) -> Self {
        self.orders.insert(order.id.clone(), order);
        self
    }

    pub fn open_orders_for(&self, symbol: &str) -> Vec<&BrokerOrder> {
        self.orders.values().filter(|o| o.symbol == symbol && o.is_open()).collect()
    }
}

impl Broker for FakeBroker {
    fn get_all_positions(&self) -> Result<Vec<PositionSnapshot>, BrokerError> {
        Ok(self.positions.values().cloned().collect())
    }

    fn get_orders(&self, symbol: &str) -> Result<Vec<BrokerOrder>, BrokerError> {
        Ok(self.orders.values().filter(|o| o.symbol == symbol).cloned().collect())
    }

    fn submit_stop_order(&mut self, symbol: &str, qty: i64, stop_price: f64) -> Result<BrokerOrder, BrokerError> {
        self.submit_calls.push((symbol.to_string(), qty, stop_price));
        if self.fail_insufficient_qty_for.as_deref() == Some(symbol) {
            return Err(BrokerError::InsufficientQty("insufficient qty available".to_string()));
        }
        let id = format!("fake-order-{}", self.next_id);
        self.next_id += 1;
        let order = BrokerOrder {
            id: id.clone(),
            symbol: symbol.to_string(),
            side: "sell".to_string(),
            order_type: "stop".to_string(),
            status: "open".to_string(),
            qty,
            stop_price: Some(stop_price),
            submitted_at: None,
        };
        self.orders.insert(id, order.clone());
        Ok(order)
    }

    fn cancel_order_by_id(&mut self, id: &str) -> Result<(), BrokerError> {
        self.cancel_calls.push(id.to_string());
        self.orders.remove(id);
        Ok(())
    }
}

/// Fake market data: fixed bar series per symbol, returned verbatim
/// regardless of the requested lookback (tests construct exactly the bars
/// they want the stop resolver to see). Logs every fetch by symbol so tests
/// can assert a guard skipped the fetch entirely, not just discarded the
/// result (cf. `test_exits_entry_delay_guard.py`'s `ExplodingMD`).
#[derive(Default)]
pub struct FakeMarketData {
    intraday: HashMap<String, Vec<Bar>>,
    daily: HashMap<String, Vec<Bar>>,
    pub intraday_fetch_calls: std::cell::RefCell<Vec<String>>,
    pub daily_fetch_calls: std::cell::RefCell<Vec<String>>,
}

impl FakeMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intraday_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.intraday.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_daily_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.daily.insert(symbol.to_string(), bars);
        self
    }
}

impl dc_exits::MarketData for FakeMarketData {
    fn get_intraday_bars(&self, symbol: &str, _minutes: usize, _lookback_days: usize) -> Vec<Bar> {
        self.intraday_fetch_calls.borrow_mut().push(symbol.to_string());
        self.intraday.get(symbol).cloned().unwrap_or_default()
    }

    fn get_daily_bars(&self, symbol: &str, _lookback_days: usize) -> Vec<Bar> {
        self.daily_fetch_calls.borrow_mut().push(symbol.to_string());
        self.daily.get(symbol).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_then_cancel_round_trips_through_order_map() {
        let mut broker = FakeBroker::new();
        let order = broker.submit_stop_order("AAPL", 10, 148.0).unwrap();
        assert_eq!(broker.open_orders_for("AAPL").len(), 1);
        broker.cancel_order_by_id(&order.id).unwrap();
        assert_eq!(broker.open_orders_for("AAPL").len(), 0);
        assert_eq!(broker.cancel_calls, vec![order.id]);
    }

    #[test]
    fn configured_symbol_fails_with_insufficient_qty() {
        let mut broker = FakeBroker::new();
        broker.fail_insufficient_qty_for = Some("AAPL".to_string());
        let err = broker.submit_stop_order("AAPL", 10, 148.0).unwrap_err();
        assert!(matches!(err, BrokerError::InsufficientQty(_)));
    }

    #[test]
    fn market_data_returns_configured_bars_regardless_of_lookback() {
        let md = FakeMarketData::new().with_intraday_bars("AAPL", Vec::new());
        assert_eq!(dc_exits::MarketData::get_intraday_bars(&md, "AAPL", 5, 999).len(), 0);
        assert_eq!(dc_exits::MarketData::get_intraday_bars(&md, "MSFT", 5, 999).len(), 0);
    }
}
