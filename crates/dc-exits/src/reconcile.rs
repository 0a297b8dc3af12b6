//! Idempotent broker reconciliation: given a desired `(qty, stop_price)`,
//! converge the broker's open orders onto it with a minimum of cancel/submit
//! churn. Grounded on `execution_v2/exits.py`'s `reconcile_stop_order`.

use crate::broker::{is_insufficient_qty, matching_stop_order, select_preferred_stop_order, Broker, BrokerError};
use crate::state::ExitPositionState;
use dc_config::exit_stop_selection_v2_enabled;
use dc_schemas::BrokerOrder;
use serde_json::{json, Value};

/// Side-channel notices the reconciliation protocol emits for conditions
/// that don't fit the `ExitPositionState` mutation alone (`STOP_SKIP_HELD`,
/// `STOP_SUBMIT_BLOCKED`). Callers wrap these into full exit events via
/// [`crate::events::build_exit_event_from_legacy`].
pub struct ReconcileOutcome {
    pub state: ExitPositionState,
    pub notices: Vec<Value>,
}

fn related_orders_json(orders: &[BrokerOrder]) -> Value {
    Value::Array(
        orders
            .iter()
            .map(|o| json!({"id": o.id, "side": o.side, "type": o.order_type, "qty": o.qty}))
            .collect(),
    )
}

pub fn reconcile_stop_order<B: Broker>(
    broker: &mut B,
    mut state: ExitPositionState,
    desired_qty: i64,
    desired_stop: f64,
) -> Result<ReconcileOutcome, BrokerError> {
    let mut notices = Vec::new();
    let symbol = state.symbol.clone();

    let sell_orders = |b: &B| -> Result<Vec<BrokerOrder>, BrokerError> {
        Ok(b.get_orders(&symbol)?
            .into_iter()
            .filter(|o| o.is_sell() && o.is_open() && o.symbol.to_uppercase() == symbol.to_uppercase())
            .collect())
    };

    let mut sell = sell_orders(&*broker)?;

    let matching: Vec<BrokerOrder> = sell
        .iter()
        .filter(|o| matching_stop_order(o, &symbol, desired_qty, desired_stop))
        .cloned()
        .collect();
    if !matching.is_empty() {
        let preferred = if exit_stop_selection_v2_enabled() && matching.len() > 1 {
            select_preferred_stop_order(&matching, Some(desired_qty), Some(desired_stop)).unwrap_or(&matching[0])
        } else {
            &matching[0]
        };
        state.stop_order_id = Some(preferred.id.clone());
        return Ok(ReconcileOutcome { state, notices });
    }

    let mismatched_stops: Vec<BrokerOrder> = sell
        .iter()
        .filter(|o| o.is_stop_type() && !matching_stop_order(o, &symbol, desired_qty, desired_stop))
        .cloned()
        .collect();
    for order in &mismatched_stops {
        let _ = broker.cancel_order_by_id(&order.id);
    }
    if !mismatched_stops.is_empty() {
        sell = sell_orders(&*broker)?;
    }

    if let Some(order) = sell.iter().find(|o| matching_stop_order(o, &symbol, desired_qty, desired_stop)) {
        state.stop_order_id = Some(order.id.clone());
        return Ok(ReconcileOutcome { state, notices });
    }

    let holding: Vec<BrokerOrder> = sell.iter().filter(|o| o.qty >= desired_qty).cloned().collect();
    if !holding.is_empty() {
        notices.push(json!({
            "event": "STOP_SKIP_HELD",
            "symbol": symbol,
            "related_orders": related_orders_json(&holding),
        }));
        let stop_holding: Vec<BrokerOrder> = holding.iter().filter(|o| o.is_stop_type()).cloned().collect();
        if !stop_holding.is_empty() {
            let preferred = if exit_stop_selection_v2_enabled() && stop_holding.len() > 1 {
                select_preferred_stop_order(&stop_holding, Some(desired_qty), Some(desired_stop))
                    .unwrap_or(&stop_holding[0])
            } else {
                &stop_holding[0]
            };
            state.stop_order_id = Some(preferred.id.clone());
        }
        return Ok(ReconcileOutcome { state, notices });
    }

    match broker.submit_stop_order(&symbol, desired_qty, desired_stop) {
        Ok(order) => {
            state.stop_order_id = Some(order.id);
            state.stop_price = Some(desired_stop);
            state.last_stop_update_ts = Some(crate::broker::now_utc().timestamp() as f64);
            Ok(ReconcileOutcome { state, notices })
        }
        Err(err) if is_insufficient_qty(&err) => {
            notices.push(json!({
                "event": "STOP_SUBMIT_BLOCKED",
                "symbol": symbol,
                "reason": err.to_string(),
                "related_orders": related_orders_json(&sell),
            }));
            Ok(ReconcileOutcome { state, notices })
        }
        Err(err) => Err(err),
    }
}
