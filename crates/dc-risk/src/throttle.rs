//! Resolves the risk-multiplier throttle for a trading date from, in
//! priority order: an externally-written `PORTFOLIO_THROTTLE` ledger entry,
//! then a `REGIME_E1` regime-signal ledger entry mapped through the regime
//! table, then a `MISSING` all-stop fallback. Each fallback step appends its
//! own reason code so the caller always knows why a given multiplier applied.

use crate::reasons::ordered_reasons;
use dc_ledger::LatestLookup;
use std::path::Path;

pub const RECORD_TYPE_THROTTLE: &str = "PORTFOLIO_THROTTLE";
pub const RECORD_TYPE_REGIME_SIGNAL: &str = "REGIME_E1_SIGNAL";
pub const RECORD_TYPE_REGIME_SKIPPED: &str = "REGIME_E1_SKIPPED";

pub fn clamp01(value: f64) -> f64 {
    value.max(0.0).min(1.0)
}

pub struct ThrottleResolution {
    pub risk_multiplier: f64,
    pub max_new_positions_multiplier: Option<f64>,
    pub reasons: Vec<String>,
    pub source: &'static str,
    pub resolved_ny_date: String,
}

fn throttle_path(repo_root: &Path, ny_date: &str) -> std::path::PathBuf {
    repo_root.join("ledger").join("PORTFOLIO_THROTTLE").join(format!("{ny_date}.jsonl"))
}

fn regime_path(repo_root: &Path, ny_date: &str) -> std::path::PathBuf {
    repo_root.join("ledger").join("REGIME_E1").join(format!("{ny_date}.jsonl"))
}

pub fn resolve_regime_throttle(repo_root: &Path, ny_date: &str) -> anyhow::Result<ThrottleResolution> {
    let (throttle_record, throttle_errors) =
        read_latest(&throttle_path(repo_root, ny_date), &[RECORD_TYPE_THROTTLE], "throttle_ledger")?;

    if let Some(record) = throttle_record {
        let throttle = record.get("throttle").cloned().unwrap_or(serde_json::Value::Null);
        let risk_multiplier = throttle
            .get("risk_multiplier")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let max_new_positions_multiplier = throttle.get("max_new_positions_multiplier").and_then(|v| v.as_f64());
        let mut reasons: Vec<String> = throttle
            .get("reasons")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|r| r.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        reasons.extend(throttle_errors);
        let resolved_ny_date = record
            .get("resolved_ny_date")
            .and_then(|v| v.as_str())
            .unwrap_or(ny_date)
            .to_string();
        return Ok(ThrottleResolution {
            risk_multiplier,
            max_new_positions_multiplier,
            reasons: ordered_reasons(reasons),
            source: "PORTFOLIO_THROTTLE",
            resolved_ny_date,
        });
    }

    let (regime_record, regime_errors) = read_latest_regime(&regime_path(repo_root, ny_date))?;
    if let Some(record) = regime_record {
        let regime_label = record.get("regime_label").and_then(|v| v.as_str());
        let confidence = record.get("confidence").and_then(|v| v.as_f64());
        let (risk_multiplier, max_new_positions_multiplier, mut reasons) =
            regime_to_throttle(regime_label, confidence);
        reasons.extend(throttle_errors);
        reasons.extend(regime_errors);
        let resolved_ny_date = record
            .get("resolved_ny_date")
            .and_then(|v| v.as_str())
            .unwrap_or(ny_date)
            .to_string();
        return Ok(ThrottleResolution {
            risk_multiplier,
            max_new_positions_multiplier: Some(max_new_positions_multiplier),
            reasons: ordered_reasons(reasons),
            source: "REGIME_E1",
            resolved_ny_date,
        });
    }

    let mut reasons = throttle_errors;
    reasons.extend(regime_errors);
    reasons.push("missing_regime".to_string());
    Ok(ThrottleResolution {
        risk_multiplier: 0.0,
        max_new_positions_multiplier: Some(0.0),
        reasons: ordered_reasons(reasons),
        source: "MISSING",
        resolved_ny_date: ny_date.to_string(),
    })
}

/// `(risk_multiplier, max_new_positions_multiplier, reasons)` for a raw
/// regime label + confidence pair. Unknown labels fall back to an all-stop
/// multiplier with a `missing_regime` reason; low confidence (`< 0.6`)
/// halves whatever multiplier was resolved and adds `low_confidence_haircut`.
pub fn regime_to_throttle(regime_label: Option<&str>, confidence: Option<f64>) -> (f64, f64, Vec<String>) {
    let mut reasons = Vec::new();
    let normalized = regime_label.map(str::to_uppercase);

    let (mut risk_multiplier, mut max_new_positions_multiplier) = match normalized.as_deref() {
        Some("RISK_ON") => (1.0, 1.0),
        Some("NEUTRAL") => (0.6, 0.7),
        Some("RISK_OFF") => (0.2, 0.3),
        _ => {
            reasons.push("missing_regime".to_string());
            (0.0, 0.0)
        }
    };

    if let Some(c) = confidence {
        if c < 0.6 {
            risk_multiplier *= 0.5;
            max_new_positions_multiplier *= 0.5;
            reasons.push("low_confidence_haircut".to_string());
        }
    }

    (clamp01(risk_multiplier), clamp01(max_new_positions_multiplier), reasons)
}

fn read_latest(
    path: &Path,
    record_types: &[&str],
    missing_reason: &str,
) -> anyhow::Result<(Option<serde_json::Value>, Vec<String>)> {
    match dc_ledger::read_latest_record_of_type(path, record_types)? {
        LatestLookup::Missing => Ok((None, vec![format!("missing_{missing_reason}")])),
        LatestLookup::Invalid => Ok((None, vec![format!("invalid_{missing_reason}")])),
        LatestLookup::NoMatch => Ok((None, vec![format!("missing_{missing_reason}_record")])),
        LatestLookup::Found(v) => Ok((Some(v), Vec::new())),
    }
}

fn read_latest_regime(path: &Path) -> anyhow::Result<(Option<serde_json::Value>, Vec<String>)> {
    match dc_ledger::read_latest_record_of_type(path, &[RECORD_TYPE_REGIME_SIGNAL, RECORD_TYPE_REGIME_SKIPPED])? {
        LatestLookup::Missing => Ok((None, vec!["missing_regime_ledger".to_string()])),
        LatestLookup::Invalid => Ok((None, vec!["invalid_regime_ledger".to_string()])),
        LatestLookup::NoMatch => Ok((None, vec!["missing_regime_record".to_string()])),
        LatestLookup::Found(record) => {
            let mut reasons = Vec::new();
            if record.get("record_type").and_then(|v| v.as_str()) != Some(RECORD_TYPE_REGIME_SIGNAL) {
                reasons.push("regime_record_skipped".to_string());
            }
            Ok((Some(record), reasons))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_on_full_confidence_is_unthrottled() {
        let (risk_mult, pos_mult, reasons) = regime_to_throttle(Some("RISK_ON"), Some(0.95));
        assert_eq!(risk_mult, 1.0);
        assert_eq!(pos_mult, 1.0);
        assert!(reasons.is_empty());
    }

    #[test]
    fn low_confidence_halves_the_multiplier() {
        let (risk_mult, pos_mult, reasons) = regime_to_throttle(Some("NEUTRAL"), Some(0.4));
        assert_eq!(risk_mult, 0.3);
        assert_eq!(pos_mult, 0.35);
        assert_eq!(reasons, vec!["low_confidence_haircut".to_string()]);
    }

    #[test]
    fn unknown_label_is_all_stop() {
        let (risk_mult, pos_mult, reasons) = regime_to_throttle(Some("BOGUS"), None);
        assert_eq!(risk_mult, 0.0);
        assert_eq!(pos_mult, 0.0);
        assert_eq!(reasons, vec!["missing_regime".to_string()]);
    }

    #[test]
    fn missing_ledgers_fall_through_to_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let res = resolve_regime_throttle(dir.path(), "2024-01-02").unwrap();
        assert_eq!(res.source, "MISSING");
        assert_eq!(res.risk_multiplier, 0.0);
        assert!(res.reasons.contains(&"missing_regime".to_string()));
        assert!(res.reasons.contains(&"missing_throttle_ledger".to_string()));
        assert!(res.reasons.contains(&"missing_regime_ledger".to_string()));
    }
}
