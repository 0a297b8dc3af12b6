//! Typed environment-variable configuration for the daily decision & audit
//! substrate. Every flag here defaults off/sane exactly as the source
//! pipeline's `os.getenv(NAME, default)` calls did; each crate reads its
//! flags through this module instead of calling `std::env::var` directly,
//! so the parsing rules stay in one place.

use std::env;

/// `"1"` (after trimming) means on; anything else, including unset, is off.
fn parse_flag(raw: Option<&str>) -> bool {
    raw.map(|v| v.trim() == "1").unwrap_or(false)
}

fn parse_f64_or(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_usize_or(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn flag(name: &str) -> bool {
    parse_flag(env::var(name).ok().as_deref())
}

fn str_var(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn f64_var(name: &str, default: f64) -> f64 {
    parse_f64_or(env::var(name).ok().as_deref(), default)
}

fn usize_var(name: &str, default: usize) -> usize {
    parse_usize_or(env::var(name).ok().as_deref(), default)
}

/// `E2_REGIME_RISK_MODULATION` — gates regime-aware risk throttle resolution.
pub fn regime_risk_modulation_enabled() -> bool {
    flag("E2_REGIME_RISK_MODULATION")
}

/// `E3_RISK_ATTRIBUTION_WRITE` — gates per-decision attribution ledger writes.
pub fn risk_attribution_write_enabled() -> bool {
    flag("E3_RISK_ATTRIBUTION_WRITE")
}

/// `E3_RISK_ATTRIBUTION_SUMMARY_WRITE` — gates the daily summary write.
pub fn risk_attribution_summary_write_enabled() -> bool {
    flag("E3_RISK_ATTRIBUTION_SUMMARY_WRITE")
}

/// `E3_RISK_ATTRIBUTION_ROLLING_WRITE` — gates the 20-trading-day rolling
/// summary write.
pub fn risk_attribution_rolling_write_enabled() -> bool {
    flag("E3_RISK_ATTRIBUTION_ROLLING_WRITE")
}

/// `EXIT_STOP_SELECTION_V2` — gates the structural/trailing stop-selection path.
pub fn exit_stop_selection_v2_enabled() -> bool {
    flag("EXIT_STOP_SELECTION_V2")
}

/// Raw `PORTFOLIO_MAX_DRAWDOWN_PCT_BLOCK`, unparsed. Left to the caller so it
/// can attach a `drawdown_threshold_invalid` reason code on parse failure
/// instead of silently falling back here.
pub fn portfolio_max_drawdown_pct_block_raw() -> Option<String> {
    env::var("PORTFOLIO_MAX_DRAWDOWN_PCT_BLOCK").ok()
}

/// `EXECUTION_MODE`, unset by default (no implicit mode).
pub fn execution_mode() -> Option<String> {
    env::var("EXECUTION_MODE").ok()
}

/// `DRY_RUN`, `"1"` means dry-run.
pub fn dry_run() -> bool {
    flag("DRY_RUN")
}

/// Exit-management tunables, mirroring `ExitConfig`'s environment defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitConfig {
    pub stop_buffer_dollars: f64,
    pub max_risk_per_share: f64,
    pub min_intraday_bars: usize,
    pub intraday_minutes: usize,
    pub intraday_lookback_days: usize,
    pub daily_lookback_days: usize,
    pub telemetry_source: String,
    /// Minimum fractional distance a candidate stop must keep from
    /// `entry_price` (inclusive). Grounded on
    /// `tests/test_exit_stop_guardrails.py::test_min_stop_pct_rejects_too_close`,
    /// which rejects a stop exactly 1% from entry under this field's default
    /// — not present in the captured `execution_v2/exits.py`'s `ExitConfig`
    /// dataclass, but pinned by that test (`STOP_TOO_CLOSE_SKIPPED`).
    pub stop_too_close_min_pct: f64,
    /// Minimum seconds since entry before a structural stop may be set.
    /// Net-new guardrail (`STOP_TOO_EARLY_SKIPPED`).
    pub stop_min_seconds_since_entry: i64,
}

impl ExitConfig {
    pub fn from_env() -> Self {
        Self {
            stop_buffer_dollars: f64_var("STOP_BUFFER_DOLLARS", 0.10),
            max_risk_per_share: f64_var("MAX_RISK_PER_SHARE_DOLLARS", 3.00),
            min_intraday_bars: usize_var("EXIT_MIN_INTRADAY_BARS", 6),
            intraday_minutes: usize_var("EXIT_INTRADAY_MINUTES", 5),
            intraday_lookback_days: usize_var("EXIT_INTRADAY_LOOKBACK_DAYS", 3),
            daily_lookback_days: usize_var("EXIT_DAILY_LOOKBACK_DAYS", 320),
            telemetry_source: str_var("EXIT_TELEMETRY_SOURCE", "execution_v2"),
            stop_too_close_min_pct: f64_var("STOP_TOO_CLOSE_MIN_PCT", 0.01),
            stop_min_seconds_since_entry: {
                let v: i64 = env::var("STOP_MIN_SECONDS_SINCE_ENTRY")
                    .ok()
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(900);
                v
            },
        }
    }
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_requires_exact_one() {
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some(" 1 ")));
        assert!(!parse_flag(Some("true")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn numeric_parse_falls_back_to_default_on_garbage() {
        assert_eq!(parse_f64_or(Some("not-a-number"), 3.0), 3.0);
        assert_eq!(parse_f64_or(Some("2.5"), 3.0), 2.5);
        assert_eq!(parse_usize_or(Some("abc"), 6), 6);
        assert_eq!(parse_usize_or(Some("12"), 6), 12);
    }

    #[test]
    fn exit_config_default_matches_source_defaults() {
        // Process env is not mutated here (see mqk-config's own test notes on
        // why env::set_var is avoided in parallel test binaries); this only
        // asserts the fallback path when the vars are absent.
        let cfg = ExitConfig {
            stop_buffer_dollars: parse_f64_or(None, 0.10),
            max_risk_per_share: parse_f64_or(None, 3.00),
            min_intraday_bars: parse_usize_or(None, 6),
            intraday_minutes: parse_usize_or(None, 5),
            intraday_lookback_days: parse_usize_or(None, 3),
            daily_lookback_days: parse_usize_or(None, 320),
            telemetry_source: "execution_v2".to_string(),
            stop_too_close_min_pct: parse_f64_or(None, 0.01),
            stop_min_seconds_since_entry: 900,
        };
        assert_eq!(cfg.stop_buffer_dollars, 0.10);
        assert_eq!(cfg.daily_lookback_days, 320);
        assert_eq!(cfg.stop_too_close_min_pct, 0.01);
    }
}
