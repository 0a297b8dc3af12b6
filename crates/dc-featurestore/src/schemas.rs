//! Frozen per-feature-type row schemas. Each schema owns a fixed
//! `SCHEMA_VERSION` and `FEATURE_TYPE` name; the store never infers either
//! from data on disk.

use serde::{Deserialize, Serialize};

pub trait FeatureRecord: Serialize + for<'de> Deserialize<'de> {
    const SCHEMA_VERSION: i32;
    const FEATURE_TYPE: &'static str;
}

/// Per-symbol trend metrics computed during the daily scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendFeatures {
    pub symbol: String,
    pub trend_score: f64,
    pub sma50_slope: f64,
    pub adx: f64,
    pub vol_ratio: f64,
    pub atr_pct: f64,
}

impl FeatureRecord for TrendFeatures {
    const SCHEMA_VERSION: i32 = 1;
    const FEATURE_TYPE: &'static str = "trend_features";
}

/// Market-wide regime metrics, one row per date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegimeFeatures {
    pub spy_vol: f64,
    pub spy_drawdown: f64,
    pub spy_trend: f64,
    pub breadth: f64,
    pub regime_label: String,
}

impl FeatureRecord for RegimeFeatures {
    const SCHEMA_VERSION: i32 = 1;
    const FEATURE_TYPE: &'static str = "regime_features";
}

/// Per-symbol AVWAP state features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvwapFeatures {
    pub symbol: String,
    pub anchor: String,
    pub avwap_slope: f64,
    pub dist_pct: f64,
    pub setup_vwap_control: String,
    pub setup_avwap_control: String,
    pub setup_extension_state: String,
    pub setup_structure_state: String,
}

impl FeatureRecord for AvwapFeatures {
    const SCHEMA_VERSION: i32 = 1;
    const FEATURE_TYPE: &'static str = "avwap_features";
}

/// E2 multi-factor regime metrics, one row per date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegimeE2Features {
    pub spy_vol: f64,
    pub spy_drawdown: f64,
    pub spy_trend: f64,
    pub breadth: f64,
    pub credit_spread_z: f64,
    pub vix_term_structure: f64,
    pub gld_relative_strength: f64,
    pub tlt_relative_strength: f64,
    pub regime_label: String,
    pub regime_score: f64,
    pub confidence: f64,
}

impl FeatureRecord for RegimeE2Features {
    const SCHEMA_VERSION: i32 = 1;
    const FEATURE_TYPE: &'static str = "regime_e2_features";
}
