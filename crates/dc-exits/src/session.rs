//! Eastern-time session-phase guardrail table. Grounded on
//! `tests/test_exit_stop_guardrails.py::test_classify_session_phase_boundaries`
//! — `SessionPhase`/`classify_session_phase` don't survive in the captured
//! `execution_v2/exits.py` snapshot, but the test pins every window boundary
//! this module reproduces. Follows the teacher's general style of small enums
//! with a single classification function.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::America::New_York;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// 09:30-09:45 and anything outside the regular session. Intraday stops
    /// are forbidden; only the daily fallback may be used, and stops never
    /// ratchet.
    OpenNoise,
    /// 09:45-10:15. Intraday stops are allowed once the too-early guardrail
    /// clears (min delay elapsed, min bar count on hand).
    EarlyTrend,
    /// 10:15-15:30. No extra restrictions beyond the baseline guardrails.
    NormalSession,
    /// 15:30-16:00. Stops tighten and every skip is still telemetered.
    CloseProtect,
}

impl SessionPhase {
    pub fn forbids_intraday_stop(self) -> bool {
        matches!(self, SessionPhase::OpenNoise)
    }

    pub fn forbids_ratchet(self) -> bool {
        matches!(self, SessionPhase::OpenNoise)
    }
}

/// Classify a UTC instant by the NY wall-clock window it falls in.
pub fn classify_session_phase(ts: DateTime<Utc>) -> SessionPhase {
    let ny_time = ts.with_timezone(&New_York).time();
    classify_ny_time(ny_time)
}

fn classify_ny_time(ny_time: NaiveTime) -> SessionPhase {
    let open = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
    let early_trend_start = NaiveTime::from_hms_opt(9, 45, 0).unwrap();
    let normal_start = NaiveTime::from_hms_opt(10, 15, 0).unwrap();
    let close_protect_start = NaiveTime::from_hms_opt(15, 30, 0).unwrap();
    let close = NaiveTime::from_hms_opt(16, 0, 0).unwrap();

    if ny_time >= open && ny_time < early_trend_start {
        SessionPhase::OpenNoise
    } else if ny_time >= early_trend_start && ny_time < normal_start {
        SessionPhase::EarlyTrend
    } else if ny_time >= normal_start && ny_time < close_protect_start {
        SessionPhase::NormalSession
    } else if ny_time >= close_protect_start && ny_time < close {
        SessionPhase::CloseProtect
    } else {
        SessionPhase::OpenNoise
    }
}
