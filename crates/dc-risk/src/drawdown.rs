//! Portfolio drawdown guardrail: blocks new risk entirely once drawdown
//! crosses a configured threshold, independent of whatever the regime
//! throttle resolved.

use std::fs;
use std::path::Path;

pub const DEFAULT_DRAWDOWN_BLOCK_PCT: f64 = 0.2;

/// Latest `*.json` snapshot file in `base_dir` (lexicographically greatest
/// filename), read for `metrics.drawdown`. Missing directory, no files, or
/// an unparseable/missing field all report a reason instead of erroring —
/// this guardrail fails open rather than blocking the whole pipeline on a
/// broken snapshot writer.
pub fn resolve_drawdown_from_snapshot(base_dir: &Path) -> (Option<f64>, Vec<String>) {
    if !base_dir.is_dir() {
        return (None, vec!["portfolio_snapshot_missing".to_string()]);
    }
    let mut candidates: Vec<std::path::PathBuf> = match fs::read_dir(base_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect(),
        Err(_) => return (None, vec!["portfolio_snapshot_missing".to_string()]),
    };
    if candidates.is_empty() {
        return (None, vec!["portfolio_snapshot_missing".to_string()]);
    }
    candidates.sort();
    let latest = candidates.last().unwrap();

    let content = match fs::read_to_string(latest) {
        Ok(c) => c,
        Err(_) => return (None, vec!["portfolio_snapshot_invalid".to_string()]),
    };
    let payload: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(_) => return (None, vec!["portfolio_snapshot_invalid".to_string()]),
    };
    match payload.get("metrics").and_then(|m| m.get("drawdown")).and_then(|d| d.as_f64()) {
        Some(drawdown) => (Some(drawdown), Vec::new()),
        None => (None, vec!["portfolio_snapshot_invalid".to_string()]),
    }
}

/// Resolve `(drawdown, max_drawdown_pct_block, reasons)`. Either input can
/// be supplied explicitly (e.g. by a caller that already has the figures);
/// otherwise drawdown comes from the latest snapshot and the threshold from
/// `PORTFOLIO_MAX_DRAWDOWN_PCT_BLOCK`, defaulting to
/// [`DEFAULT_DRAWDOWN_BLOCK_PCT`] if unset or unparseable.
pub fn resolve_drawdown_guardrail(
    drawdown: Option<f64>,
    max_drawdown_pct_block: Option<f64>,
    snapshot_dir: &Path,
) -> (Option<f64>, f64, Vec<String>) {
    let mut reasons = Vec::new();
    let drawdown = match drawdown {
        Some(d) => Some(d),
        None => {
            let (d, snapshot_reasons) = resolve_drawdown_from_snapshot(snapshot_dir);
            reasons.extend(snapshot_reasons);
            d
        }
    };

    let threshold = match max_drawdown_pct_block {
        Some(t) => t,
        None => match dc_config::portfolio_max_drawdown_pct_block_raw() {
            None => DEFAULT_DRAWDOWN_BLOCK_PCT,
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(v) => v,
                Err(_) => {
                    reasons.push("drawdown_threshold_invalid".to_string());
                    DEFAULT_DRAWDOWN_BLOCK_PCT
                }
            },
        },
    };

    (drawdown, threshold, crate::reasons::ordered_reasons(reasons))
}

/// `1.0` unless both a drawdown and a threshold are known and drawdown has
/// reached the threshold, in which case the multiplier drops to `0.0` with
/// a `drawdown_guardrail` reason.
pub fn drawdown_guardrail_multiplier(drawdown: Option<f64>, max_drawdown_pct_block: Option<f64>) -> (f64, Vec<String>) {
    match (drawdown, max_drawdown_pct_block) {
        (Some(d), Some(t)) if d >= t => (0.0, vec!["drawdown_guardrail".to_string()]),
        _ => (1.0, Vec::new()),
    }
}
