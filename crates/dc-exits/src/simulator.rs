//! Pure walk-forward exit simulator, sharing the same stop-resolution and
//! trailing helpers as the live reconciliation path (parity by
//! construction). Grounded on `execution_v2/exit_simulator.py`.

use crate::events::{build_exit_event, BuildExitEventArgs};
use crate::stops::{apply_trailing_stop, resolve_structural_stop};
use dc_schemas::Bar;
use serde_json::Value;

pub struct SimulateExitArgs<'a> {
    pub symbol: &'a str,
    pub entry_price: f64,
    pub qty: f64,
    pub entry_ts_utc: &'a str,
    pub intraday_bars: &'a [Bar],
    pub daily_bars: &'a [Bar],
    pub stop_buffer_dollars: f64,
    pub min_intraday_bars: usize,
    pub source: &'a str,
    pub strategy_id: &'a str,
    pub sleeve_id: &'a str,
}

/// Walk `intraday_bars` forward. At each bar, re-resolve the candidate stop
/// from the prefix seen so far plus the full daily history, apply the
/// trailing ratchet, and emit `STOP_RESOLVED`/`STOP_RATCHET` on change. Once
/// a bar's low touches or crosses the active stop, emit `EXIT_FILLED` at
/// `price = stop_price` and stop. If the walk exhausts the bars with a
/// stop still active and unfilled, emit a final `STOP_HELD`.
pub fn simulate_exit(args: &SimulateExitArgs) -> Vec<Value> {
    let mut events = Vec::new();
    let mut stop_price: Option<f64> = None;
    let mut stop_basis: Option<&'static str> = None;
    let mut filled = false;

    for (idx, bar) in args.intraday_bars.iter().enumerate() {
        let prefix = &args.intraday_bars[..=idx];
        let (candidate_stop, candidate_basis) =
            resolve_structural_stop(prefix, args.daily_bars, args.stop_buffer_dollars, args.min_intraday_bars);
        let desired_stop = apply_trailing_stop(stop_price, candidate_stop);

        match (desired_stop, stop_price) {
            (Some(desired), None) => {
                stop_price = Some(desired);
                stop_basis = candidate_basis;
                events.push(build_exit_event(BuildExitEventArgs {
                    ts: Some(bar.ts),
                    qty: Some(args.qty),
                    stop_price,
                    stop_basis,
                    stop_action: Some("initial"),
                    entry_price: Some(args.entry_price),
                    entry_ts_utc: Some(args.entry_ts_utc),
                    strategy_id: args.strategy_id,
                    sleeve_id: args.sleeve_id,
                    ..BuildExitEventArgs::new("STOP_RESOLVED", args.symbol, args.source)
                }));
            }
            (Some(desired), Some(existing)) if desired > existing => {
                stop_price = Some(desired);
                stop_basis = candidate_basis.or(stop_basis);
                events.push(build_exit_event(BuildExitEventArgs {
                    ts: Some(bar.ts),
                    qty: Some(args.qty),
                    stop_price,
                    stop_basis,
                    stop_action: Some("ratchet"),
                    entry_price: Some(args.entry_price),
                    entry_ts_utc: Some(args.entry_ts_utc),
                    strategy_id: args.strategy_id,
                    sleeve_id: args.sleeve_id,
                    ..BuildExitEventArgs::new("STOP_RATCHET", args.symbol, args.source)
                }));
            }
            _ => {}
        }

        let Some(active_stop) = stop_price else {
            continue;
        };
        if bar.low <= active_stop {
            events.push(build_exit_event(BuildExitEventArgs {
                ts: Some(bar.ts),
                qty: Some(args.qty),
                price: Some(active_stop),
                stop_price,
                stop_basis,
                stop_action: Some("triggered"),
                reason: Some("stop_hit"),
                entry_price: Some(args.entry_price),
                entry_ts_utc: Some(args.entry_ts_utc),
                exit_ts_utc: Some(&bar.ts.to_rfc3339()),
                strategy_id: args.strategy_id,
                sleeve_id: args.sleeve_id,
                ..BuildExitEventArgs::new("EXIT_FILLED", args.symbol, args.source)
            }));
            filled = true;
            break;
        }
    }

    if !filled {
        if let Some(active_stop) = stop_price {
            let ts = args.intraday_bars.last().map(|b| b.ts);
            events.push(build_exit_event(BuildExitEventArgs {
                ts,
                qty: Some(args.qty),
                stop_price: Some(active_stop),
                stop_basis,
                stop_action: Some("held"),
                entry_price: Some(args.entry_price),
                entry_ts_utc: Some(args.entry_ts_utc),
                strategy_id: args.strategy_id,
                sleeve_id: args.sleeve_id,
                ..BuildExitEventArgs::new("STOP_HELD", args.symbol, args.source)
            }));
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(minute: i64, low: f64, close: f64) -> Bar {
        Bar {
            ts: Utc.with_ymd_and_hms(2024, 1, 16, 14, 30, 0).unwrap() + chrono::Duration::minutes(minute),
            open: close,
            high: close + 0.5,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn held_when_stop_never_triggers() {
        let lows = [10.0, 9.0, 9.5, 9.2, 9.6, 9.0, 9.8, 11.0, 11.5, 12.0];
        let bars: Vec<Bar> = lows.iter().enumerate().map(|(i, &low)| bar(i as i64 * 5, low, low + 1.0)).collect();
        let args = SimulateExitArgs {
            symbol: "AAPL",
            entry_price: 9.0,
            qty: 10.0,
            entry_ts_utc: "2024-01-16T14:30:00Z",
            intraday_bars: &bars,
            daily_bars: &[],
            stop_buffer_dollars: 0.10,
            min_intraday_bars: 6,
            source: "simulation",
            strategy_id: "default",
            sleeve_id: "default",
        };
        let events = simulate_exit(&args);
        assert!(events.iter().any(|e| e["event_type"] == "STOP_RESOLVED"));
        assert!(events.iter().any(|e| e["event_type"] == "STOP_HELD"));
        assert!(!events.iter().any(|e| e["event_type"] == "EXIT_FILLED"));
    }

    #[test]
    fn exit_filled_when_low_touches_stop() {
        let mut lows = vec![10.0, 9.0, 9.5, 9.2, 9.6, 9.0, 9.8, 11.0];
        let bars_len_before_drop = lows.len();
        lows.push(5.0); // crashes through the stop on the last bar
        let bars: Vec<Bar> = lows.iter().enumerate().map(|(i, &low)| bar(i as i64 * 5, low, low + 1.0)).collect();
        let args = SimulateExitArgs {
            symbol: "AAPL",
            entry_price: 9.0,
            qty: 10.0,
            entry_ts_utc: "2024-01-16T14:30:00Z",
            intraday_bars: &bars,
            daily_bars: &[],
            stop_buffer_dollars: 0.10,
            min_intraday_bars: 6,
            source: "simulation",
            strategy_id: "default",
            sleeve_id: "default",
        };
        let events = simulate_exit(&args);
        assert!(bars_len_before_drop < bars.len());
        let fill = events.iter().find(|e| e["event_type"] == "EXIT_FILLED");
        assert!(fill.is_some());
        assert_eq!(fill.unwrap()["reason"], "stop_hit");
    }
}
