//! `EXECUTION_SLIPPAGE` ledger: per-fill expected-vs-actual price slippage,
//! plus liquidity- and time-of-day-bucketed aggregation helpers.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const RECORD_TYPE: &str = "EXECUTION_SLIPPAGE";
pub const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct SlippageEvent {
    pub schema_version: i32,
    pub record_type: &'static str,
    pub date_ny: String,
    pub symbol: String,
    pub strategy_id: String,
    pub expected_price: f64,
    pub ideal_fill_price: f64,
    pub actual_fill_price: f64,
    pub slippage_bps: Option<f64>,
    pub adv_shares_20d: f64,
    pub liquidity_bucket: String,
    pub fill_ts_utc: String,
    pub time_of_day_bucket: String,
}

impl SlippageEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        date_ny: &str,
        symbol: &str,
        strategy_id: &str,
        expected_price: f64,
        ideal_fill_price: f64,
        actual_fill_price: f64,
        adv_shares_20d: f64,
        fill_ts_utc: &str,
        time_of_day_bucket: &str,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            record_type: RECORD_TYPE,
            date_ny: date_ny.to_string(),
            symbol: symbol.to_string(),
            strategy_id: strategy_id.to_string(),
            expected_price,
            ideal_fill_price,
            actual_fill_price,
            slippage_bps: compute_slippage_bps(ideal_fill_price, actual_fill_price),
            adv_shares_20d,
            liquidity_bucket: classify_liquidity_bucket(adv_shares_20d).to_string(),
            fill_ts_utc: fill_ts_utc.to_string(),
            time_of_day_bucket: time_of_day_bucket.to_string(),
        }
    }
}

pub fn classify_liquidity_bucket(adv_shares_20d: f64) -> &'static str {
    if adv_shares_20d >= 5_000_000.0 {
        "mega"
    } else if adv_shares_20d >= 2_000_000.0 {
        "large"
    } else if adv_shares_20d >= 750_000.0 {
        "mid"
    } else {
        "small"
    }
}

/// `None` whenever `ideal_fill_price` or `actual_fill_price` is zero or
/// non-finite — there is no meaningful basis-point figure in that case.
pub fn compute_slippage_bps(ideal_fill_price: f64, actual_fill_price: f64) -> Option<f64> {
    if ideal_fill_price == 0.0 || !ideal_fill_price.is_finite() || !actual_fill_price.is_finite() {
        return None;
    }
    Some((actual_fill_price - ideal_fill_price) / ideal_fill_price * 10_000.0)
}

pub fn slippage_path(repo_root: &Path, date_ny: &str) -> PathBuf {
    repo_root.join("ledger").join("EXECUTION_SLIPPAGE").join(format!("{date_ny}.jsonl"))
}

pub fn append_slippage_event(repo_root: &Path, event: &SlippageEvent) -> anyhow::Result<PathBuf> {
    let path = slippage_path(repo_root, &event.date_ny);
    dc_ledger::append_record(&path, event)?;
    Ok(path)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BucketStats {
    pub count: f64,
    pub mean_bps: f64,
    pub min_bps: f64,
    pub max_bps: f64,
}

fn aggregate_by<F: Fn(&SlippageEvent) -> String>(events: &[SlippageEvent], key_of: F) -> BTreeMap<String, BucketStats> {
    let mut buckets: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for event in events {
        if let Some(bps) = event.slippage_bps {
            buckets.entry(key_of(event)).or_default().push(bps);
        }
    }
    buckets
        .into_iter()
        .map(|(bucket, values)| {
            let count = values.len() as f64;
            let mean = values.iter().sum::<f64>() / count;
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            (bucket, BucketStats { count, mean_bps: mean, min_bps: min, max_bps: max })
        })
        .collect()
}

pub fn aggregate_slippage_by_bucket(events: &[SlippageEvent]) -> BTreeMap<String, BucketStats> {
    aggregate_by(events, |e| e.liquidity_bucket.clone())
}

pub fn aggregate_slippage_by_time(events: &[SlippageEvent]) -> BTreeMap<String, BucketStats> {
    aggregate_by(events, |e| e.time_of_day_bucket.clone())
}

pub fn load_slippage_events(repo_root: &Path, date_ny: &str) -> anyhow::Result<Vec<Value>> {
    let path = slippage_path(repo_root, date_ny);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let (records, _invalid) = dc_ledger::read_jsonl(&path)?;
    Ok(records)
}
