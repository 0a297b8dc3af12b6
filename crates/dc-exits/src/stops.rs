//! Structural stop resolution: swing-low detection on intraday and daily
//! bars, the intraday/daily fallback chain, and the None-safe trailing-stop
//! ratchet. Grounded on `execution_v2/exits.py`'s free functions.

use chrono::{DateTime, Utc};
use chrono_tz::America::New_York;
use dc_schemas::Bar;

/// `low[i] < low[i-1] ∧ low[i] < low[i+1]` over interior indices, in
/// chronological order.
fn find_swing_lows(bars: &[Bar]) -> Vec<(usize, f64)> {
    let mut swing_lows = Vec::new();
    if bars.len() < 3 {
        return swing_lows;
    }
    for i in 1..bars.len() - 1 {
        let (prev, curr, next) = (bars[i - 1].low, bars[i].low, bars[i + 1].low);
        if curr < prev && curr < next {
            swing_lows.push((i, curr));
        }
    }
    swing_lows
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Most recent *confirmed* higher-low step: walk the swing lows forward,
/// keeping the last one that exceeds its predecessor. `None` if fewer than
/// `min_bars` bars are available, no higher-low step exists, or the
/// resulting stop would sit at or above the most recent close (it would
/// trigger immediately).
pub fn compute_intraday_higher_low_stop(
    bars: &[Bar],
    stop_buffer_dollars: f64,
    min_bars: usize,
) -> Option<f64> {
    if bars.len() < min_bars {
        return None;
    }
    let swing_lows = find_swing_lows(bars);
    if swing_lows.len() < 2 {
        return None;
    }
    let mut higher_low = None;
    for i in 1..swing_lows.len() {
        let (prev_low, curr_low) = (swing_lows[i - 1].1, swing_lows[i].1);
        if curr_low > prev_low {
            higher_low = Some(curr_low);
        }
    }
    let higher_low = higher_low?;

    let stop = round2(higher_low - stop_buffer_dollars);
    let last_close = bars.last().map(|b| b.close);
    if let Some(last_close) = last_close {
        if stop >= last_close {
            return None;
        }
    }
    Some(stop)
}

/// Same swing-low detection, daily bars, no last-close sanity check (the
/// source pipeline only guards the intraday path).
pub fn compute_daily_swing_low_stop(bars: &[Bar], stop_buffer_dollars: f64) -> Option<f64> {
    let swing_lows = find_swing_lows(bars);
    let (_, last_low) = *swing_lows.last()?;
    Some(round2(last_low - stop_buffer_dollars))
}

/// `(price, basis)` pair, trying the intraday structure first.
pub fn resolve_structural_stop(
    intraday_bars: &[Bar],
    daily_bars: &[Bar],
    stop_buffer_dollars: f64,
    min_intraday_bars: usize,
) -> (Option<f64>, Option<&'static str>) {
    if let Some(stop) = compute_intraday_higher_low_stop(intraday_bars, stop_buffer_dollars, min_intraday_bars) {
        return (Some(stop), Some("intraday_hl"));
    }
    if let Some(stop) = compute_daily_swing_low_stop(daily_bars, stop_buffer_dollars) {
        return (Some(stop), Some("daily_swing_low"));
    }
    (None, None)
}

/// `max(existing, candidate)`, None-safe. Stops never decrease.
pub fn apply_trailing_stop(existing_stop: Option<f64>, candidate_stop: Option<f64>) -> Option<f64> {
    match (existing_stop, candidate_stop) {
        (existing, None) => existing,
        (None, candidate) => candidate,
        (Some(existing), Some(candidate)) => Some(existing.max(candidate)),
    }
}

/// A stop is acceptable risk-wise iff `0 < entry - stop <= max_risk_per_share`.
pub fn validate_risk(entry_price: f64, stop_price: f64, max_risk_per_share: f64) -> bool {
    let risk = entry_price - stop_price;
    risk > 0.0 && risk <= max_risk_per_share
}

/// Daily-bar fallback restricted to bars on or before `entry_day` (NY
/// calendar date); falls back to the full bar list if none qualify.
pub fn compute_stop_price(daily_bars: &[Bar], entry_day: &str, buffer_dollars: f64) -> Option<f64> {
    if daily_bars.is_empty() {
        return None;
    }
    let eligible: Vec<Bar> = daily_bars
        .iter()
        .copied()
        .filter(|bar| bar_date_ny(bar) <= *entry_day)
        .collect();
    let bars = if eligible.is_empty() { daily_bars } else { &eligible };
    compute_daily_swing_low_stop(bars, buffer_dollars)
}

fn bar_date_ny(bar: &Bar) -> String {
    bar.ts.with_timezone(&New_York).format("%Y-%m-%d").to_string()
}

/// The NY calendar date a UTC entry timestamp falls on.
pub fn entry_day_from_ts(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&New_York).format("%Y-%m-%d").to_string()
}
