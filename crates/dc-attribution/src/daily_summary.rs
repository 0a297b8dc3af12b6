//! `PORTFOLIO_RISK_ATTRIBUTION_SUMMARY`: one JSON object per trading day,
//! aggregated from that day's attribution events. Written atomically (see
//! [`write_daily_summary`]) — the source pipeline actually writes this file
//! with a plain overwrite, but the governing spec explicitly requires
//! summary JSON writes to be atomic (temp+rename), so this port makes both
//! the daily and rolling summary writes atomic.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const RECORD_TYPE: &str = "PORTFOLIO_RISK_ATTRIBUTION_SUMMARY";
pub const SCHEMA_VERSION: i32 = 1;
const ROUND_DECIMALS: i32 = 10;
const TOP_SYMBOLS_LIMIT: usize = 20;

pub fn input_path(repo_root: &Path, ny_date: &str) -> PathBuf {
    repo_root.join("ledger").join("PORTFOLIO_RISK_ATTRIBUTION").join(format!("{ny_date}.jsonl"))
}

pub fn summary_path(repo_root: &Path, ny_date: &str) -> PathBuf {
    repo_root.join("ledger").join("PORTFOLIO_RISK_ATTRIBUTION_SUMMARY").join(format!("{ny_date}.json"))
}

pub fn load_attribution_events(repo_root: &Path, ny_date: &str) -> anyhow::Result<Vec<Value>> {
    let path = input_path(repo_root, ny_date);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let (records, _invalid) = dc_ledger::read_jsonl(&path)?;
    Ok(records)
}

fn round10(value: f64) -> f64 {
    let factor = 10f64.powi(ROUND_DECIMALS);
    (value * factor).round() / factor
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

#[derive(Default, Clone)]
struct SymbolAgg {
    baseline_notional: f64,
    modulated_notional: f64,
    delta_notional: f64,
    events: i64,
}

/// Build the daily aggregate from a day's attribution events. `source` is a
/// free-text provenance tag, matching the source pipeline's own parameter.
pub fn build_daily_summary(ny_date: &str, events: &[Value], source: &str) -> Value {
    let events_total = events.len() as i64;
    let mut events_with_modulation = 0i64;
    let mut events_no_modulation = 0i64;
    let mut baseline_total = 0f64;
    let mut modulated_total = 0f64;
    let mut delta_pct_values: Vec<f64> = Vec::new();

    let mut reason_counts: BTreeMap<String, i64> = BTreeMap::new();
    let mut regime_counts: BTreeMap<String, i64> = BTreeMap::new();
    let mut hard_caps_counts: BTreeMap<String, i64> = BTreeMap::new();
    let mut symbol_totals: BTreeMap<String, SymbolAgg> = BTreeMap::new();

    for event in events {
        let baseline_notional = event.pointer("/baseline/notional").and_then(Value::as_f64).unwrap_or(0.0);
        let modulated_notional = event.pointer("/modulated/notional").and_then(Value::as_f64).unwrap_or(0.0);
        let delta_notional = event.pointer("/delta/notional").and_then(Value::as_f64).unwrap_or(0.0);
        let delta_qty = event.pointer("/delta/qty").and_then(Value::as_f64).unwrap_or(0.0);

        baseline_total += baseline_notional;
        modulated_total += modulated_notional;

        if delta_qty != 0.0 || delta_notional != 0.0 {
            events_with_modulation += 1;
        } else {
            events_no_modulation += 1;
        }

        if baseline_notional > 0.0 {
            let delta_pct = event
                .pointer("/delta/pct_notional")
                .and_then(Value::as_f64)
                .unwrap_or_else(|| delta_notional / baseline_notional);
            delta_pct_values.push(delta_pct);
        }

        for reason in event.get("reason_codes").and_then(Value::as_array).into_iter().flatten() {
            if let Some(r) = reason.as_str() {
                *reason_counts.entry(r.to_string()).or_insert(0) += 1;
            }
        }

        let regime_code = event.pointer("/regime/code").and_then(Value::as_str);
        let regime_key = regime_code.unwrap_or("UNKNOWN").to_string();
        *regime_counts.entry(regime_key).or_insert(0) += 1;

        for cap in event.get("hard_caps_applied").and_then(Value::as_array).into_iter().flatten() {
            if let Some(c) = cap.as_str() {
                *hard_caps_counts.entry(c.to_string()).or_insert(0) += 1;
            }
        }

        if let Some(symbol) = event.get("symbol").and_then(Value::as_str).filter(|s| !s.is_empty()) {
            let agg = symbol_totals.entry(symbol.to_string()).or_default();
            agg.baseline_notional += baseline_notional;
            agg.modulated_notional += modulated_notional;
            agg.delta_notional += delta_notional;
            agg.events += 1;
        }
    }

    let delta_total = modulated_total - baseline_total;
    let (delta_pct_min, delta_pct_median, delta_pct_max) = if delta_pct_values.is_empty() {
        (None, None, None)
    } else {
        let min = delta_pct_values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = delta_pct_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        (Some(min), median(delta_pct_values), Some(max))
    };

    let mut top_symbols: Vec<(String, SymbolAgg)> = symbol_totals.into_iter().collect();
    top_symbols.sort_by(|(sym_a, a), (sym_b, b)| {
        b.delta_notional
            .abs()
            .partial_cmp(&a.delta_notional.abs())
            .unwrap()
            .then_with(|| sym_a.cmp(sym_b))
    });
    top_symbols.truncate(TOP_SYMBOLS_LIMIT);

    let top_symbols_json: Vec<Value> = top_symbols
        .into_iter()
        .map(|(symbol, agg)| {
            json!({
                "symbol": symbol,
                "abs_delta_notional": round10(agg.delta_notional.abs()),
                "delta_notional": round10(agg.delta_notional),
                "baseline_notional": round10(agg.baseline_notional),
                "modulated_notional": round10(agg.modulated_notional),
                "events": agg.events,
            })
        })
        .collect();

    json!({
        "schema_version": SCHEMA_VERSION,
        "record_type": RECORD_TYPE,
        "date_ny": ny_date,
        "source": source,
        "counts": {
            "events_total": events_total,
            "events_with_modulation": events_with_modulation,
            "events_no_modulation": events_no_modulation,
        },
        "notional_totals": {
            "baseline_total": round10(baseline_total),
            "modulated_total": round10(modulated_total),
            "delta_total": round10(delta_total),
            "delta_total_abs": round10(delta_total.abs()),
        },
        "delta_pct_distribution": {
            "min": delta_pct_min.map(round10),
            "median": delta_pct_median.map(round10),
            "max": delta_pct_max.map(round10),
        },
        "by_reason_code": reason_counts,
        "by_regime_code": regime_counts,
        "hard_caps_applied_counts": hard_caps_counts,
        "top_symbols_by_abs_delta_notional": top_symbols_json,
    })
}

/// Atomic temp+rename write, dot-prefixed temp filename, matching the
/// rolling summary's convention.
pub fn write_daily_summary(repo_root: &Path, summary: &Value) -> anyhow::Result<PathBuf> {
    let ny_date = summary
        .get("date_ny")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("summary missing date_ny"))?;
    let path = summary_path(repo_root, ny_date);
    dc_ledger::atomic_write_compact_json(&path, summary)?;
    Ok(path)
}
