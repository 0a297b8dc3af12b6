//! Order-quantity adjustment: apply the resolved risk multiplier and caps
//! to a strategy's requested quantity.

use crate::RiskControls;

/// Guard: prices and account equity the caller hands in must be finite and
/// non-negative. These are programmer errors (a caller passing a garbage
/// price), not runtime conditions to recover from.
pub fn validate_sizing_inputs(price: f64, account_equity: f64) -> Result<(), SizingError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(SizingError::InvalidPrice(price));
    }
    if !account_equity.is_finite() || account_equity < 0.0 {
        return Err(SizingError::InvalidEquity(account_equity));
    }
    Ok(())
}

#[derive(Debug)]
pub enum SizingError {
    InvalidPrice(f64),
    InvalidEquity(f64),
}

impl std::fmt::Display for SizingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizingError::InvalidPrice(p) => write!(f, "invalid price: {p}"),
            SizingError::InvalidEquity(e) => write!(f, "invalid account equity: {e}"),
        }
    }
}

impl std::error::Error for SizingError {}

/// Scale `base_qty` by the resolved risk multiplier, then clamp to the
/// per-position and remaining-gross-exposure caps, then finalize against
/// `min_qty`. Returns `0` unchanged if `base_qty <= 0`.
pub fn adjust_order_quantity(
    base_qty: i64,
    price: f64,
    account_equity: f64,
    risk_controls: &RiskControls,
    gross_exposure: Option<f64>,
    min_qty: Option<i64>,
) -> Result<i64, SizingError> {
    if base_qty <= 0 {
        return Ok(0);
    }
    validate_sizing_inputs(price, account_equity)?;

    let mut adjusted_qty = (base_qty as f64 * risk_controls.risk_multiplier).floor() as i64;

    if let Some(cap) = risk_controls.per_position_cap {
        let cap_qty = ((account_equity * cap) / price).floor() as i64;
        adjusted_qty = adjusted_qty.min(cap_qty);
    }

    if let (Some(max_gross), Some(gross)) = (risk_controls.max_gross_exposure, gross_exposure) {
        let remaining = (account_equity * max_gross - gross).max(0.0);
        let cap_qty = (remaining / price).floor() as i64;
        adjusted_qty = adjusted_qty.min(cap_qty);
    }

    Ok(finalize_qty(base_qty, adjusted_qty, min_qty))
}

fn finalize_qty(base_qty: i64, adjusted_qty: i64, min_qty: Option<i64>) -> i64 {
    let adjusted_qty = base_qty.min(adjusted_qty.max(0));
    if base_qty <= 0 {
        return 0;
    }
    let mut minimum = 1i64;
    if let Some(m) = min_qty {
        minimum = minimum.max(m);
    }
    minimum = minimum.min(base_qty);
    adjusted_qty.max(minimum)
}
