//! High-level `FeatureStore` facade wrapping readers/writers/versioning.

use crate::readers::{read_feature_meta, read_features};
use crate::schemas::FeatureRecord;
use crate::versioning::{list_available_dates, CURRENT_SCHEMA_VERSION};
use crate::writers::{write_cross_sectional_distributions, write_feature_partition};
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Versioned, point-in-time-correct feature store.
pub struct FeatureStore {
    base_dir: PathBuf,
    schema_version: i32,
}

impl FeatureStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    pub fn with_schema_version(base_dir: impl Into<PathBuf>, schema_version: i32) -> Self {
        Self {
            base_dir: base_dir.into(),
            schema_version,
        }
    }

    pub fn write<T: FeatureRecord>(
        &self,
        date: &str,
        rows: &[T],
        meta: Option<Value>,
    ) -> Result<PathBuf> {
        write_feature_partition(&self.base_dir, date, rows, meta, self.schema_version)
    }

    pub fn write_cross_sectional_distributions(
        &self,
        date: &str,
        candidates: &[HashMap<String, f64>],
        features: &[&str],
    ) -> Result<PathBuf> {
        write_cross_sectional_distributions(
            &self.base_dir,
            date,
            candidates,
            features,
            self.schema_version,
        )
    }

    /// Point-in-time read: the latest partition dated on or before `as_of_date`.
    pub fn read<T: FeatureRecord>(&self, as_of_date: &str) -> Result<Vec<T>> {
        read_features::<T>(&self.base_dir, as_of_date, self.schema_version)
    }

    pub fn read_meta(&self, feature_type: &str, as_of_date: &str) -> Result<Option<Value>> {
        read_feature_meta(&self.base_dir, feature_type, as_of_date, self.schema_version)
    }

    pub fn available_dates(&self, feature_type: &str) -> Result<Vec<String>> {
        Ok(list_available_dates(
            &self.base_dir,
            feature_type,
            self.schema_version,
        )?)
    }
}
