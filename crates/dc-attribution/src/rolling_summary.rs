//! `PORTFOLIO_RISK_ATTRIBUTION_ROLLING_SUMMARY`: a 20-trading-day rolling
//! aggregate over daily summaries already on disk. Written atomically (see
//! [`write_rolling_summary`]) — unlike the daily summary it replaces, which
//! the source pipeline writes with a plain overwrite.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const RECORD_TYPE: &str = "PORTFOLIO_RISK_ATTRIBUTION_ROLLING_SUMMARY";
pub const SCHEMA_VERSION: i32 = 1;
const ROUND_NOTIONAL_DECIMALS: i32 = 2;
const ROUND_PCT_DECIMALS: i32 = 4;
const TOP_SYMBOLS_LIMIT: usize = 25;
const WINDOW_LABEL_DEFAULT: &str = "20D";
const DEFAULT_WINDOW_SIZE: usize = 20;

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn round_notional(value: f64) -> f64 {
    round_to(value, ROUND_NOTIONAL_DECIMALS)
}

fn round_pct(value: f64) -> f64 {
    round_to(value, ROUND_PCT_DECIMALS)
}

pub fn input_dir(repo_root: &Path) -> PathBuf {
    repo_root.join("ledger").join("PORTFOLIO_RISK_ATTRIBUTION_SUMMARY")
}

pub fn output_path(repo_root: &Path, as_of_date_ny: &str, window_label: &str) -> PathBuf {
    repo_root
        .join("ledger")
        .join("PORTFOLIO_RISK_ATTRIBUTION_ROLLING")
        .join(window_label)
        .join(format!("{as_of_date_ny}.json"))
}

fn is_trading_date(stem: &str) -> bool {
    let bytes = stem.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => true,
            _ => b.is_ascii_digit(),
        })
}

pub fn list_available_daily_dates(dir: &Path) -> std::io::Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dates: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file() && e.path().extension().and_then(|x| x.to_str()) == Some("json"))
        .filter_map(|e| e.path().file_stem().map(|s| s.to_string_lossy().into_owned()))
        .filter(|stem| is_trading_date(stem))
        .collect();
    dates.sort();
    Ok(dates)
}

fn extract_reason_code_totals(value: &Value) -> (i64, f64) {
    if let Some(obj) = value.as_object() {
        let decisions = obj.get("decisions").and_then(Value::as_i64).unwrap_or(0);
        let delta_notional = obj.get("delta_notional").and_then(Value::as_f64).unwrap_or(0.0);
        (decisions, delta_notional)
    } else if let Some(n) = value.as_i64() {
        (n, 0.0)
    } else if let Some(n) = value.as_f64() {
        (n as i64, 0.0)
    } else {
        (0, 0.0)
    }
}

fn extract_symbol_entries(summary: &Value) -> Vec<Value> {
    for key in ["top_symbols_by_abs_delta_notional", "top_symbols_by_delta_notional", "top_symbols"] {
        if let Some(arr) = summary.get(key).and_then(Value::as_array) {
            return arr.clone();
        }
    }
    Vec::new()
}

#[derive(Default, Clone)]
struct ReasonAgg {
    decisions: i64,
    delta_notional: f64,
}

#[derive(Default, Clone)]
struct SymbolAgg {
    delta_notional: f64,
    decisions: i64,
}

pub struct RollingSummaryArgs<'a> {
    pub as_of_date_ny: &'a str,
    pub window_size: usize,
    pub window_label: &'a str,
    pub input_dir: PathBuf,
}

impl<'a> RollingSummaryArgs<'a> {
    pub fn new(repo_root: &Path, as_of_date_ny: &'a str) -> Self {
        Self {
            as_of_date_ny,
            window_size: DEFAULT_WINDOW_SIZE,
            window_label: WINDOW_LABEL_DEFAULT,
            input_dir: input_dir(repo_root),
        }
    }
}

/// `None` if `as_of_date_ny` has no daily summary on disk yet, or if fewer
/// than `window_size` eligible daily summaries (dates `<= as_of_date_ny`)
/// exist.
pub fn build_rolling_summary(args: &RollingSummaryArgs<'_>) -> anyhow::Result<Option<Value>> {
    let available_dates = list_available_daily_dates(&args.input_dir)?;
    if !available_dates.iter().any(|d| d == args.as_of_date_ny) {
        return Ok(None);
    }
    let eligible_dates: Vec<&String> = available_dates.iter().filter(|d| d.as_str() <= args.as_of_date_ny).collect();
    if eligible_dates.len() < args.window_size {
        return Ok(None);
    }
    let window_dates: Vec<String> = eligible_dates[eligible_dates.len() - args.window_size..]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut baseline_total = 0f64;
    let mut modulated_total = 0f64;
    let mut delta_total = 0f64;
    let mut decisions_total = 0i64;
    let mut decisions_modulated = 0i64;
    let mut decisions_unmodified = 0i64;

    let mut reason_totals: BTreeMap<String, ReasonAgg> = BTreeMap::new();
    let mut symbol_totals: BTreeMap<String, SymbolAgg> = BTreeMap::new();
    let mut source_files: Vec<String> = Vec::new();

    for date in &window_dates {
        let summary_path = args.input_dir.join(format!("{date}.json"));
        source_files.push(summary_path.to_string_lossy().into_owned());
        let content = std::fs::read_to_string(&summary_path)?;
        let summary: Value = serde_json::from_str(&content)?;

        baseline_total += summary.pointer("/notional_totals/baseline_total").and_then(Value::as_f64).unwrap_or(0.0);
        modulated_total += summary.pointer("/notional_totals/modulated_total").and_then(Value::as_f64).unwrap_or(0.0);
        delta_total += summary.pointer("/notional_totals/delta_total").and_then(Value::as_f64).unwrap_or(0.0);

        decisions_total += summary.pointer("/counts/events_total").and_then(Value::as_i64).unwrap_or(0);
        decisions_modulated += summary.pointer("/counts/events_with_modulation").and_then(Value::as_i64).unwrap_or(0);
        decisions_unmodified += summary.pointer("/counts/events_no_modulation").and_then(Value::as_i64).unwrap_or(0);

        if let Some(by_reason) = summary.get("by_reason_code").and_then(Value::as_object) {
            for (code, value) in by_reason {
                let (decisions, delta_notional) = extract_reason_code_totals(value);
                let agg = reason_totals.entry(code.clone()).or_default();
                agg.decisions += decisions;
                agg.delta_notional += delta_notional;
            }
        }

        for symbol_entry in extract_symbol_entries(&summary) {
            let symbol = match symbol_entry.get("symbol").and_then(Value::as_str).filter(|s| !s.is_empty()) {
                Some(s) => s.to_string(),
                None => continue,
            };
            let delta_notional = symbol_entry.get("delta_notional").and_then(Value::as_f64).unwrap_or(0.0);
            let decisions = symbol_entry
                .get("decisions")
                .and_then(Value::as_i64)
                .or_else(|| symbol_entry.get("events").and_then(Value::as_i64))
                .unwrap_or(0);
            let agg = symbol_totals.entry(symbol).or_default();
            agg.delta_notional += delta_notional;
            agg.decisions += decisions;
        }
    }

    let delta_pct = if baseline_total > 0.0 { Some(delta_total / baseline_total) } else { None };

    let ordered_reason_totals: BTreeMap<String, Value> = reason_totals
        .into_iter()
        .map(|(code, agg)| {
            (
                code,
                json!({
                    "decisions": agg.decisions,
                    "delta_notional": round_notional(agg.delta_notional),
                }),
            )
        })
        .collect();

    let mut top_symbols: Vec<(String, f64, i64)> = symbol_totals
        .into_iter()
        .map(|(symbol, agg)| (symbol, round_notional(agg.delta_notional), agg.decisions))
        .collect();
    top_symbols.sort_by(|(sym_a, delta_a, _), (sym_b, delta_b, _)| {
        delta_a.partial_cmp(delta_b).unwrap().then_with(|| sym_a.cmp(sym_b))
    });
    top_symbols.truncate(TOP_SYMBOLS_LIMIT);
    let top_symbols_json: Vec<Value> = top_symbols
        .into_iter()
        .map(|(symbol, delta_notional, decisions)| {
            json!({"symbol": symbol, "delta_notional": delta_notional, "decisions": decisions})
        })
        .collect();

    Ok(Some(json!({
        "schema_version": SCHEMA_VERSION,
        "record_type": RECORD_TYPE,
        "as_of_date_ny": args.as_of_date_ny,
        "window": {
            "label": args.window_label,
            "trading_days_required": args.window_size,
            "trading_days_included": window_dates.len(),
            "start_date_ny": window_dates.first(),
            "end_date_ny": window_dates.last(),
            "dates_ny": window_dates,
        },
        "inputs": {
            "source_dir": args.input_dir.to_string_lossy(),
            "source_files": source_files,
        },
        "totals": {
            "baseline_notional": round_notional(baseline_total),
            "modulated_notional": round_notional(modulated_total),
            "delta_notional": round_notional(delta_total),
            "delta_pct": delta_pct.map(round_pct),
            "decisions_total": decisions_total,
            "decisions_modulated": decisions_modulated,
            "decisions_unmodified": decisions_unmodified,
        },
        "breakdowns": {"by_reason_code": ordered_reason_totals},
        "top_symbols": {"by_delta_notional": top_symbols_json},
        "determinism": {
            "stable_json": true,
            "sort_keys": true,
            "separators": ",:",
            "rounding": {
                "notional_decimals": ROUND_NOTIONAL_DECIMALS,
                "pct_decimals": ROUND_PCT_DECIMALS,
            },
            "window_rule": "last_20_available_dates_on_disk_lte_as_of",
        },
    })))
}

/// Atomic temp+rename write with a dot-prefixed temp filename, matching the
/// source pipeline's own convention for this ledger.
pub fn write_rolling_summary(repo_root: &Path, as_of_date_ny: &str, window_label: &str, payload: &Value) -> anyhow::Result<PathBuf> {
    let path = output_path(repo_root, as_of_date_ny, window_label);
    dc_ledger::atomic_write_compact_json(&path, payload)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_daily(dir: &Path, date: &str, baseline: f64, modulated: f64, symbol: &str, symbol_delta: f64) {
        let summary = json!({
            "notional_totals": {
                "baseline_total": baseline,
                "modulated_total": modulated,
                "delta_total": modulated - baseline,
            },
            "counts": {"events_total": 1, "events_with_modulation": 1, "events_no_modulation": 0},
            "by_reason_code": {"low_confidence_haircut": 1},
            "top_symbols_by_abs_delta_notional": [
                {"symbol": symbol, "delta_notional": symbol_delta, "events": 1}
            ],
        });
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(format!("{date}.json")), serde_json::to_string(&summary).unwrap()).unwrap();
    }

    #[test]
    fn missing_as_of_daily_summary_returns_none() {
        let dir = tempdir().unwrap();
        let mut args = RollingSummaryArgs::new(dir.path(), "2024-02-01");
        args.input_dir = dir.path().join("ledger").join("PORTFOLIO_RISK_ATTRIBUTION_SUMMARY");
        assert!(build_rolling_summary(&args).unwrap().is_none());
    }

    #[test]
    fn fewer_than_window_size_eligible_dates_returns_none() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("ledger").join("PORTFOLIO_RISK_ATTRIBUTION_SUMMARY");
        write_daily(&input, "2024-01-02", 1000.0, 900.0, "AAPL", -100.0);
        let mut args = RollingSummaryArgs::new(dir.path(), "2024-01-02");
        args.input_dir = input;
        assert!(build_rolling_summary(&args).unwrap().is_none());
    }

    #[test]
    fn full_window_aggregates_totals_and_sorts_symbols_ascending() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("ledger").join("PORTFOLIO_RISK_ATTRIBUTION_SUMMARY");
        let mut last_date = String::new();
        for i in 0..20 {
            let date = format!("2024-01-{:02}", i + 1);
            write_daily(&input, &date, 1000.0, 900.0, "AAPL", -100.0);
            last_date = date;
        }
        let mut args = RollingSummaryArgs::new(dir.path(), &last_date);
        args.input_dir = input;
        let payload = build_rolling_summary(&args).unwrap().unwrap();
        assert_eq!(payload["window"]["trading_days_included"], 20);
        assert_eq!(payload["totals"]["delta_notional"], -2000.0);
        let top = payload["top_symbols"]["by_delta_notional"].as_array().unwrap();
        assert_eq!(top[0]["symbol"], "AAPL");
        assert_eq!(top[0]["delta_notional"], -2000.0);
    }
}
