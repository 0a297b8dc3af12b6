//! `dc_core preflight`: validate configuration and repo-root writability
//! before a daily run starts. Exit codes follow the spec exactly:
//! `0 = PASS`, `1 = FAIL`, `2 = WARN`.

use chrono::{DateTime, Utc};
use dc_config::ExitConfig;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightStatus {
    Pass = 0,
    Fail = 1,
    Warn = 2,
}

#[derive(Debug, Clone)]
pub struct PreflightReport {
    pub status: PreflightStatus,
    pub messages: Vec<String>,
}

impl PreflightReport {
    pub fn exit_code(&self) -> i32 {
        self.status as i32
    }
}

/// Validate `ExitConfig`'s parsed env tunables for nonsensical values a
/// typo'd env var would produce. These aren't programmer errors (spec §7's
/// "invalid arguments... raise" bucket is reserved for `adjust_order_quantity`);
/// a bad preflight config is an operator mistake, so it degrades to FAIL
/// rather than panicking.
fn validate_exit_config(cfg: &ExitConfig, messages: &mut Vec<String>) -> bool {
    let mut ok = true;
    if cfg.stop_buffer_dollars < 0.0 {
        messages.push("STOP_BUFFER_DOLLARS must be >= 0".to_string());
        ok = false;
    }
    if cfg.max_risk_per_share <= 0.0 {
        messages.push("MAX_RISK_PER_SHARE_DOLLARS must be > 0".to_string());
        ok = false;
    }
    if cfg.min_intraday_bars == 0 {
        messages.push("EXIT_MIN_INTRADAY_BARS must be > 0".to_string());
        ok = false;
    }
    if !(0.0..1.0).contains(&cfg.stop_too_close_min_pct) {
        messages.push("STOP_TOO_CLOSE_MIN_PCT should be a small fraction in [0, 1)".to_string());
        ok = false;
    }
    ok
}

/// Ledger directories must exist-or-be-creatable and accept a throwaway
/// write; this is the cheapest proxy for "the daily run's atomic writes
/// won't fail at 9:31am."
fn validate_repo_root_writable(repo_root: &Path, messages: &mut Vec<String>) -> bool {
    let probe_dir = repo_root.join("ledger").join(".preflight_probe");
    match std::fs::create_dir_all(&probe_dir) {
        Ok(()) => {
            let probe_file = probe_dir.join("probe.tmp");
            let write_ok = std::fs::write(&probe_file, b"ok").is_ok();
            let _ = std::fs::remove_file(&probe_file);
            let _ = std::fs::remove_dir(&probe_dir);
            if !write_ok {
                messages.push(format!("repo root not writable: {}", repo_root.display()));
            }
            write_ok
        }
        Err(err) => {
            messages.push(format!("cannot create ledger directory under {}: {err}", repo_root.display()));
            false
        }
    }
}

/// `--ignore-market-hours` bypasses this; otherwise a run attempted well
/// outside the regular session degrades to WARN rather than FAIL (it's not
/// wrong to run a preflight before market open, just worth flagging).
fn market_hours_warning(now: DateTime<Utc>, ignore_market_hours: bool, messages: &mut Vec<String>) -> bool {
    if ignore_market_hours {
        return true;
    }
    let phase = dc_exits::classify_session_phase(now);
    if phase == dc_exits::SessionPhase::OpenNoise {
        messages.push("outside regular session hours (09:30-16:00 America/New_York); pass --ignore-market-hours to proceed anyway".to_string());
        false
    } else {
        true
    }
}

pub fn run_preflight(repo_root: &Path, now: DateTime<Utc>, ignore_market_hours: bool) -> PreflightReport {
    let mut messages = Vec::new();
    let cfg = ExitConfig::from_env();

    let config_ok = validate_exit_config(&cfg, &mut messages);
    if !config_ok {
        return PreflightReport { status: PreflightStatus::Fail, messages };
    }

    let writable = validate_repo_root_writable(repo_root, &mut messages);
    if !writable {
        return PreflightReport { status: PreflightStatus::Fail, messages };
    }

    let in_session = market_hours_warning(now, ignore_market_hours, &mut messages);
    if !in_session {
        return PreflightReport { status: PreflightStatus::Warn, messages };
    }

    messages.push("config valid, repo root writable, within session hours".to_string());
    PreflightReport { status: PreflightStatus::Pass, messages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn passes_when_everything_checks_out() {
        let dir = tempdir().unwrap();
        let noon_ny_utc = Utc.with_ymd_and_hms(2024, 1, 16, 17, 0, 0).unwrap(); // 12:00 NY
        let report = run_preflight(dir.path(), noon_ny_utc, false);
        assert_eq!(report.status, PreflightStatus::Pass);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn warns_outside_session_unless_ignored() {
        let dir = tempdir().unwrap();
        let midnight_utc = Utc.with_ymd_and_hms(2024, 1, 16, 5, 0, 0).unwrap(); // midnight NY
        let report = run_preflight(dir.path(), midnight_utc, false);
        assert_eq!(report.status, PreflightStatus::Warn);
        assert_eq!(report.exit_code(), 2);

        let ignored = run_preflight(dir.path(), midnight_utc, true);
        assert_eq!(ignored.status, PreflightStatus::Pass);
    }

    #[test]
    fn fails_when_repo_root_is_unwritable_file_not_dir() {
        let dir = tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"not a directory").unwrap();
        let noon_ny_utc = Utc.with_ymd_and_hms(2024, 1, 16, 17, 0, 0).unwrap();
        let report = run_preflight(&blocked, noon_ny_utc, false);
        assert_eq!(report.status, PreflightStatus::Fail);
        assert_eq!(report.exit_code(), 1);
    }
}
