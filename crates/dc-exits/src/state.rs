//! Per-position exit state: the trailing-stop bookkeeping from
//! `execution_v2/exits.py`'s `ExitPositionState`, plus the R1/R2 staged-exit
//! stage machine the spec adds on top (no source-pipeline analogue).

/// `stage` only ever moves forward: `OPEN -> R1_TAKEN -> CLOSED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStage {
    Open,
    R1Taken,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitPositionState {
    pub symbol: String,
    pub qty: i64,
    pub stage: ExitStage,
    pub stop_price: Option<f64>,
    pub stop_basis: Option<String>,
    pub stop_order_id: Option<String>,
    pub last_stop_update_ts: Option<f64>,
    pub entry_price: f64,
    pub entry_ts_utc: String,
    pub r1_price: Option<f64>,
    pub r2_price: Option<f64>,
    pub r1_qty: i64,
    pub r2_qty: i64,
    pub qty_remaining: i64,
}

impl ExitPositionState {
    pub fn new(symbol: &str, qty: i64, entry_price: f64, entry_ts_utc: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            qty,
            stage: ExitStage::Open,
            stop_price: None,
            stop_basis: None,
            stop_order_id: None,
            last_stop_update_ts: None,
            entry_price,
            entry_ts_utc: entry_ts_utc.to_string(),
            r1_price: None,
            r2_price: None,
            r1_qty: 0,
            r2_qty: 0,
            qty_remaining: qty,
        }
    }
}

/// Outcome of evaluating the R1/R2 ladder against `last_price`. `None` if no
/// transition fires this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedExitTransition {
    TookR1,
    TookR2,
}

/// Evaluate the staged-exit ladder in place. `OPEN` with `last_price >=
/// r1_price` releases `r1_qty` and ratchets the stop to breakeven
/// (`entry_price`); `R1_TAKEN` with `last_price >= r2_price` releases
/// `r2_qty` and closes the position. Additive to (runs independently of)
/// the trailing structural stop — callers still apply
/// [`crate::stops::apply_trailing_stop`] on top of whatever this leaves in
/// `stop_price`.
pub fn apply_staged_exit(state: &mut ExitPositionState, last_price: f64) -> Option<StagedExitTransition> {
    match state.stage {
        ExitStage::Open => {
            let r1_price = state.r1_price?;
            if last_price < r1_price {
                return None;
            }
            state.qty_remaining -= state.r1_qty;
            state.stop_price = Some(
                state
                    .stop_price
                    .map(|s| s.max(state.entry_price))
                    .unwrap_or(state.entry_price),
            );
            state.stage = ExitStage::R1Taken;
            Some(StagedExitTransition::TookR1)
        }
        ExitStage::R1Taken => {
            let r2_price = state.r2_price?;
            if last_price < r2_price {
                return None;
            }
            state.qty_remaining -= state.r2_qty;
            state.stage = ExitStage::Closed;
            Some(StagedExitTransition::TookR2)
        }
        ExitStage::Closed => None,
    }
}
