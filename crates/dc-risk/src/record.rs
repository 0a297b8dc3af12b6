//! `PORTFOLIO_RISK_CONTROLS` ledger record construction and append.

use crate::RiskControls;
use serde::Serialize;
use std::path::Path;

pub const RECORD_TYPE_RISK_CONTROLS: &str = "PORTFOLIO_RISK_CONTROLS";
pub const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Serialize)]
struct Provenance {
    module: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct RiskControlsPayload<'a> {
    risk_multiplier: f64,
    max_gross_exposure: Option<f64>,
    max_positions: Option<i64>,
    per_position_cap: Option<f64>,
    throttle_reason: &'a str,
    reasons: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskControlsRecord<'a> {
    as_of_utc: String,
    requested_ny_date: &'a str,
    resolved_ny_date: &'a str,
    record_type: &'static str,
    schema_version: i32,
    provenance: Provenance,
    source: &'a str,
    risk_controls: RiskControlsPayload<'a>,
}

pub fn build_record<'a>(
    ny_date: &'a str,
    resolved_ny_date: &'a str,
    as_of_utc: Option<&str>,
    source: &'a str,
    controls: &'a RiskControls,
    reasons: &'a [String],
) -> RiskControlsRecord<'a> {
    RiskControlsRecord {
        as_of_utc: as_of_utc
            .map(str::to_string)
            .unwrap_or_else(|| default_as_of_utc(ny_date)),
        requested_ny_date: ny_date,
        resolved_ny_date,
        record_type: RECORD_TYPE_RISK_CONTROLS,
        schema_version: SCHEMA_VERSION,
        provenance: Provenance { module: "dc_risk" },
        source,
        risk_controls: RiskControlsPayload {
            risk_multiplier: controls.risk_multiplier,
            max_gross_exposure: controls.max_gross_exposure,
            max_positions: controls.max_positions,
            per_position_cap: controls.per_position_cap,
            throttle_reason: &controls.throttle_reason,
            reasons,
        },
    }
}

fn default_as_of_utc(ny_date: &str) -> String {
    format!("{ny_date}T16:00:00+00:00")
}

pub fn risk_controls_path(repo_root: &Path, ny_date: &str) -> std::path::PathBuf {
    repo_root
        .join("ledger")
        .join("PORTFOLIO_RISK_CONTROLS")
        .join(format!("{ny_date}.jsonl"))
}

pub fn append(repo_root: &Path, ny_date: &str, record: &RiskControlsRecord) -> anyhow::Result<()> {
    dc_ledger::append_record(&risk_controls_path(repo_root, ny_date), record)
}
