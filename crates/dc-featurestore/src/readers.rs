//! Point-in-time feature readers — never return a partition dated after
//! `as_of_date`.

use crate::schemas::FeatureRecord;
use crate::versioning::{list_available_dates, store_path};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Latest element of `dates` that is `<= as_of_date`, or `None`. `dates` is
/// assumed sorted ascending (as returned by [`list_available_dates`]).
fn latest_date_on_or_before<'a>(dates: &'a [String], as_of_date: &str) -> Option<&'a str> {
    dates
        .iter()
        .filter(|d| d.as_str() <= as_of_date)
        .next_back()
        .map(String::as_str)
}

/// Read the rows of `feature_type` visible as of `as_of_date`: the latest
/// partition dated on or before `as_of_date`, or an empty vector if none
/// qualifies.
pub fn read_features<T: FeatureRecord>(
    base_dir: &Path,
    as_of_date: &str,
    version: i32,
) -> Result<Vec<T>> {
    let dates = list_available_dates(base_dir, T::FEATURE_TYPE, version)
        .with_context(|| format!("list partitions for {}", T::FEATURE_TYPE))?;
    let Some(matched) = latest_date_on_or_before(&dates, as_of_date) else {
        return Ok(Vec::new());
    };

    let csv_path = store_path(base_dir, version)
        .join(matched)
        .join(format!("{}.csv", T::FEATURE_TYPE));
    if !csv_path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(&csv_path)
        .with_context(|| format!("open feature csv {:?}", csv_path))?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: T = record.with_context(|| format!("deserialize row from {:?}", csv_path))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Read the `_meta.json` sidecar for the partition matched by point-in-time
/// lookup, or `None` if no partition qualifies.
pub fn read_feature_meta(
    base_dir: &Path,
    feature_type: &str,
    as_of_date: &str,
    version: i32,
) -> Result<Option<Value>> {
    let dates = list_available_dates(base_dir, feature_type, version)
        .with_context(|| format!("list partitions for {feature_type}"))?;
    let Some(matched) = latest_date_on_or_before(&dates, as_of_date) else {
        return Ok(None);
    };
    let meta_path = store_path(base_dir, version).join(matched).join("_meta.json");
    if !meta_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&meta_path)
        .with_context(|| format!("read meta sidecar {:?}", meta_path))?;
    Ok(Some(serde_json::from_str(&content)?))
}
