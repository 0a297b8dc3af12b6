//! Atomic CSV + meta writers for feature store partitions.

use crate::schemas::FeatureRecord;
use crate::stats::{mean, percentile_sorted, sample_std};
use crate::versioning::store_path;
use anyhow::{Context, Result};
use dc_ledger::atomic_write_json;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Write a feature partition atomically: `base_dir/v{version}/{date}/{feature_type}.csv`
/// plus a `_meta.json` sidecar in the same directory.
pub fn write_feature_partition<T: FeatureRecord>(
    base_dir: &Path,
    date: &str,
    rows: &[T],
    meta: Option<Value>,
    version: i32,
) -> Result<PathBuf> {
    let partition_dir = store_path(base_dir, version).join(date);
    fs::create_dir_all(&partition_dir)
        .with_context(|| format!("create_dir_all {:?}", partition_dir))?;

    let csv_path = partition_dir.join(format!("{}.csv", T::FEATURE_TYPE));
    let tmp_path = partition_dir.join(format!("{}.csv.tmp", T::FEATURE_TYPE));
    {
        let mut writer = csv::Writer::from_path(&tmp_path)
            .with_context(|| format!("open tmp csv {:?}", tmp_path))?;
        for row in rows {
            writer.serialize(row).context("serialize feature row failed")?;
        }
        writer.flush().context("flush feature csv failed")?;
    }
    fs::rename(&tmp_path, &csv_path)
        .with_context(|| format!("rename {:?} -> {:?}", tmp_path, csv_path))?;

    let mut meta_payload = Map::new();
    meta_payload.insert("schema_version".into(), json!(T::SCHEMA_VERSION));
    meta_payload.insert("feature_type".into(), json!(T::FEATURE_TYPE));
    meta_payload.insert("date".into(), json!(date));
    meta_payload.insert("row_count".into(), json!(rows.len()));
    if let Some(Value::Object(extra)) = meta {
        for (k, v) in extra {
            meta_payload.insert(k, v);
        }
    }

    let meta_path = partition_dir.join("_meta.json");
    atomic_write_json(&meta_path, &Value::Object(meta_payload))
        .with_context(|| format!("write meta sidecar {:?}", meta_path))?;

    Ok(csv_path)
}

/// Persist daily cross-sectional distribution stats (mean/std/percentiles)
/// for reproducibility of candidate scoring. `candidates` maps symbol ->
/// feature name -> value; a feature column missing or non-finite for a
/// symbol is simply absent from that symbol's map rather than stored as
/// `NaN` (see the slippage/attribution NaN-avoidance convention).
pub fn write_cross_sectional_distributions(
    base_dir: &Path,
    date: &str,
    candidates: &[HashMap<String, f64>],
    features: &[&str],
    version: i32,
) -> Result<PathBuf> {
    let partition_dir = store_path(base_dir, version).join(date);
    fs::create_dir_all(&partition_dir)
        .with_context(|| format!("create_dir_all {:?}", partition_dir))?;

    let mut stats = Map::new();
    for &feature in features {
        let mut values: Vec<f64> = candidates
            .iter()
            .filter_map(|c| c.get(feature).copied())
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            continue;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let entry = json!({
            "mean": mean(&values),
            "std": sample_std(&values),
            "count": values.len(),
            "min": values[0],
            "p10": percentile_sorted(&values, 10.0),
            "p25": percentile_sorted(&values, 25.0),
            "p50": percentile_sorted(&values, 50.0),
            "p75": percentile_sorted(&values, 75.0),
            "p90": percentile_sorted(&values, 90.0),
            "max": values[values.len() - 1],
        });
        stats.insert(feature.to_string(), entry);
    }

    let payload = json!({
        "date": date,
        "feature_type": "cross_sectional_distributions",
        "features": Value::Object(stats),
    });

    let out_path = partition_dir.join("cross_sectional_distributions.json");
    atomic_write_json(&out_path, &payload)
        .with_context(|| format!("write distributions json {:?}", out_path))?;
    Ok(out_path)
}
