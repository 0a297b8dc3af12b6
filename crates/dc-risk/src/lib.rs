//! Portfolio risk-control resolution: composes an externally-written
//! throttle ledger (or regime-signal fallback, or all-stop `MISSING`
//! fallback) with a drawdown guardrail via `min()`, then derives
//! per-position and gross-exposure caps from the resulting multiplier.

mod drawdown;
mod reasons;
mod record;
mod sizing;
mod throttle;

pub use drawdown::{drawdown_guardrail_multiplier, resolve_drawdown_from_snapshot, resolve_drawdown_guardrail, DEFAULT_DRAWDOWN_BLOCK_PCT};
pub use reasons::ordered_reasons;
pub use record::{build_record, risk_controls_path, RiskControlsRecord};
pub use sizing::{adjust_order_quantity, SizingError};
pub use throttle::{regime_to_throttle, resolve_regime_throttle, ThrottleResolution};

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct RiskControls {
    pub risk_multiplier: f64,
    pub max_gross_exposure: Option<f64>,
    pub max_positions: Option<i64>,
    pub per_position_cap: Option<f64>,
    pub throttle_reason: String,
}

pub struct RiskControlResult {
    pub controls: RiskControls,
    pub reasons: Vec<String>,
    pub wrote_ledger: bool,
}

/// Inputs for [`build_risk_controls`]. Base caps are the strategy's
/// unmodulated limits; when risk modulation is disabled they pass through
/// unchanged with a `disabled` reason.
pub struct BuildRiskControlsArgs<'a> {
    pub ny_date: &'a str,
    pub repo_root: &'a Path,
    pub base_max_positions: Option<i64>,
    pub base_max_gross_exposure: Option<f64>,
    pub base_per_position_cap: Option<f64>,
    pub drawdown: Option<f64>,
    pub max_drawdown_pct_block: Option<f64>,
    pub as_of_utc: Option<&'a str>,
    pub enabled: Option<bool>,
    pub write_ledger: bool,
    pub snapshot_dir: PathBuf,
}

impl<'a> BuildRiskControlsArgs<'a> {
    pub fn new(ny_date: &'a str, repo_root: &'a Path) -> Self {
        Self {
            ny_date,
            repo_root,
            base_max_positions: None,
            base_max_gross_exposure: None,
            base_per_position_cap: None,
            drawdown: None,
            max_drawdown_pct_block: None,
            as_of_utc: None,
            enabled: None,
            write_ledger: true,
            snapshot_dir: repo_root.join("analytics").join("artifacts").join("portfolio_snapshots"),
        }
    }
}

pub fn build_risk_controls(args: BuildRiskControlsArgs<'_>) -> anyhow::Result<RiskControlResult> {
    let enabled = args.enabled.unwrap_or_else(dc_config::regime_risk_modulation_enabled);

    if !enabled {
        let controls = RiskControls {
            risk_multiplier: 1.0,
            max_gross_exposure: args.base_max_gross_exposure,
            max_positions: args.base_max_positions,
            per_position_cap: args.base_per_position_cap,
            throttle_reason: "disabled".to_string(),
        };
        return Ok(RiskControlResult {
            controls,
            reasons: vec!["disabled".to_string()],
            wrote_ledger: false,
        });
    }

    let throttle = resolve_regime_throttle(args.repo_root, args.ny_date)?;

    let (drawdown, max_drawdown_pct_block, drawdown_resolve_reasons) =
        resolve_drawdown_guardrail(args.drawdown, args.max_drawdown_pct_block, &args.snapshot_dir);
    let (drawdown_multiplier, drawdown_guardrail_reasons) =
        drawdown_guardrail_multiplier(drawdown, Some(max_drawdown_pct_block));

    let mut risk_multiplier = throttle::clamp01(throttle.risk_multiplier);
    risk_multiplier = risk_multiplier.min(drawdown_multiplier);

    let max_positions = match (args.base_max_positions, throttle.max_new_positions_multiplier) {
        (Some(base), Some(mult)) => Some(((base as f64 * mult).floor() as i64).max(0)),
        _ => None,
    };

    let max_gross_exposure = args.base_max_gross_exposure.map(|base| base * risk_multiplier);
    let per_position_cap = args.base_per_position_cap.map(|base| base * risk_multiplier);

    let mut all_reasons = throttle.reasons.clone();
    all_reasons.extend(drawdown_resolve_reasons);
    all_reasons.extend(drawdown_guardrail_reasons);
    let reasons = ordered_reasons(all_reasons);
    let throttle_reason = reasons.first().cloned().unwrap_or_else(|| "ok".to_string());

    let controls = RiskControls {
        risk_multiplier,
        max_gross_exposure,
        max_positions,
        per_position_cap,
        throttle_reason,
    };

    let mut wrote_ledger = false;
    if args.write_ledger {
        let record = build_record(
            args.ny_date,
            &throttle.resolved_ny_date,
            args.as_of_utc,
            throttle.source,
            &controls,
            &reasons,
        );
        record::append(args.repo_root, args.ny_date, &record)?;
        wrote_ledger = true;
    }

    Ok(RiskControlResult {
        controls,
        reasons,
        wrote_ledger,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn disabled_modulation_passes_base_caps_through_unchanged() {
        let dir = tempdir().unwrap();
        let mut args = BuildRiskControlsArgs::new("2024-01-02", dir.path());
        args.enabled = Some(false);
        args.base_max_gross_exposure = Some(0.5);
        args.base_max_positions = Some(5);
        args.write_ledger = false;
        let result = build_risk_controls(args).unwrap();
        assert_eq!(result.controls.risk_multiplier, 1.0);
        assert_eq!(result.controls.max_gross_exposure, Some(0.5));
        assert_eq!(result.controls.max_positions, Some(5));
        assert_eq!(result.controls.throttle_reason, "disabled");
    }

    #[test]
    fn missing_regime_and_throttle_ledgers_halts_new_risk() {
        let dir = tempdir().unwrap();
        let mut args = BuildRiskControlsArgs::new("2024-01-02", dir.path());
        args.enabled = Some(true);
        args.base_max_positions = Some(10);
        args.write_ledger = false;
        let result = build_risk_controls(args).unwrap();
        assert_eq!(result.controls.risk_multiplier, 0.0);
        assert_eq!(result.controls.max_positions, Some(0));
        assert!(result.reasons.contains(&"missing_regime".to_string()));
    }

    #[test]
    fn drawdown_guardrail_composes_via_min_with_throttle() {
        let dir = tempdir().unwrap();
        let throttle_dir = dir.path().join("ledger").join("PORTFOLIO_THROTTLE");
        std::fs::create_dir_all(&throttle_dir).unwrap();
        std::fs::write(
            throttle_dir.join("2024-01-02.jsonl"),
            r#"{"record_type":"PORTFOLIO_THROTTLE","throttle":{"risk_multiplier":1.0,"max_new_positions_multiplier":1.0,"reasons":[]}}"#,
        )
        .unwrap();

        let mut args = BuildRiskControlsArgs::new("2024-01-02", dir.path());
        args.enabled = Some(true);
        args.drawdown = Some(0.25);
        args.max_drawdown_pct_block = Some(0.2);
        args.write_ledger = false;
        let result = build_risk_controls(args).unwrap();
        assert_eq!(result.controls.risk_multiplier, 0.0);
        assert!(result.reasons.contains(&"drawdown_guardrail".to_string()));
    }

    #[test]
    fn writes_ledger_record_when_requested() {
        let dir = tempdir().unwrap();
        let mut args = BuildRiskControlsArgs::new("2024-01-02", dir.path());
        args.enabled = Some(true);
        let result = build_risk_controls(args).unwrap();
        assert!(result.wrote_ledger);
        let path = risk_controls_path(dir.path(), "2024-01-02");
        assert!(path.exists());
    }
}
