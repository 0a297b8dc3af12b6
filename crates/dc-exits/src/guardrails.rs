//! Pre-submit guardrails evaluated on the candidate/desired stop before it
//! reaches the broker. The `>= current` / `>= entry` pair is grounded on
//! `execution_v2/exits.py`'s `manage_positions`. Too-close, too-early, and the
//! session-phase gate are grounded on `tests/test_exit_stop_guardrails.py`'s
//! `select_stop_candidate` — that function (and the `SessionPhase` it takes)
//! don't survive in the captured `execution_v2/exits.py` snapshot, but the
//! test exercises them directly, including the too-close distance being
//! measured off `entry_price` rather than the last trade price.

use crate::session::SessionPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailSkip {
    /// `STOP_INVALID_SKIPPED` / `skip>=current`.
    InvalidAtOrAboveCurrent,
    /// `STOP_INVALID_SKIPPED` / `skip>=entry`.
    InvalidAtOrAboveEntry,
    /// `STOP_TOO_CLOSE_SKIPPED`.
    TooClose,
    /// `STOP_TOO_EARLY_SKIPPED`.
    TooEarly,
    /// Session phase forbids an intraday stop here (folded into the
    /// too-early event — the phase table's restriction has no event type
    /// of its own in the spec).
    SessionForbidsIntraday,
}

impl GuardrailSkip {
    pub fn event_type(self) -> &'static str {
        match self {
            GuardrailSkip::InvalidAtOrAboveCurrent | GuardrailSkip::InvalidAtOrAboveEntry => "STOP_INVALID_SKIPPED",
            GuardrailSkip::TooClose => "STOP_TOO_CLOSE_SKIPPED",
            GuardrailSkip::TooEarly | GuardrailSkip::SessionForbidsIntraday => "STOP_TOO_EARLY_SKIPPED",
        }
    }

    pub fn stop_action(self) -> &'static str {
        match self {
            GuardrailSkip::InvalidAtOrAboveCurrent => "skip>=current",
            GuardrailSkip::InvalidAtOrAboveEntry => "skip>=entry",
            GuardrailSkip::TooClose => "skip_too_close",
            GuardrailSkip::TooEarly | GuardrailSkip::SessionForbidsIntraday => "skip_too_early",
        }
    }
}

pub struct GuardrailInputs {
    pub desired_stop: f64,
    pub current_price: f64,
    pub existing_stop: Option<f64>,
    pub entry_price: f64,
    pub stop_basis: Option<&'static str>,
    pub seconds_since_entry: i64,
    pub intraday_bars_available: usize,
    pub min_seconds_since_entry: i64,
    pub min_intraday_bars: usize,
    pub too_close_min_pct: f64,
    pub session_phase: SessionPhase,
    /// Bypasses `SessionForbidsIntraday` (`--ignore-market-hours`).
    pub ignore_market_hours: bool,
}

/// Evaluate every guardrail in the order the live cycle checks them: session
/// phase first (it can forbid the basis outright), then too-early, then
/// too-close, then the absolute current/entry checks. `None` if the stop
/// clears every gate. Too-early and too-close only apply when `stop_basis`
/// is `Some` — i.e. when this cycle actually resolved a new candidate stop;
/// a stop carried forward unchanged was already vetted the cycle it was
/// resolved.
pub fn evaluate(inputs: &GuardrailInputs) -> Option<GuardrailSkip> {
    if !inputs.ignore_market_hours
        && inputs.stop_basis == Some("intraday_hl")
        && inputs.session_phase.forbids_intraday_stop()
    {
        return Some(GuardrailSkip::SessionForbidsIntraday);
    }

    if inputs.stop_basis == Some("intraday_hl")
        && (inputs.seconds_since_entry < inputs.min_seconds_since_entry
            || inputs.intraday_bars_available < inputs.min_intraday_bars)
    {
        return Some(GuardrailSkip::TooEarly);
    }

    // Only a freshly-resolved candidate is vetted for closeness — a stop
    // carried forward unchanged (no new candidate this cycle, `stop_basis`
    // `None`) was already accepted under this guardrail before.
    if inputs.stop_basis.is_some() && inputs.entry_price > 0.0 {
        let distance_pct = (inputs.entry_price - inputs.desired_stop).abs() / inputs.entry_price;
        if distance_pct <= inputs.too_close_min_pct {
            return Some(GuardrailSkip::TooClose);
        }
    }

    if inputs.current_price > 0.0 && inputs.desired_stop >= inputs.current_price {
        return Some(GuardrailSkip::InvalidAtOrAboveCurrent);
    }

    if inputs.existing_stop.is_none() && inputs.desired_stop >= inputs.entry_price {
        return Some(GuardrailSkip::InvalidAtOrAboveEntry);
    }

    None
}
