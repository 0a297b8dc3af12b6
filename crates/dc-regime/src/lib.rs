//! Regime transition smoothing: require `smoothing_days` consecutive
//! observations of a new regime before the confirmed label moves, so a
//! single whipsaw day doesn't flip every downstream risk decision.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SMOOTHING_DAYS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Observation {
    regime: String,
    confidence: f64,
    date: String,
}

/// Introspection snapshot of the detector's current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionState {
    pub current_regime: Option<String>,
    pub pending_regime: Option<String>,
    pub consecutive_days: usize,
    pub is_transitioning: bool,
}

pub struct RegimeTransitionDetector {
    smoothing_days: usize,
    history: Vec<Observation>,
    confirmed_regime: Option<String>,
}

impl RegimeTransitionDetector {
    pub fn new(smoothing_days: usize) -> Self {
        Self {
            smoothing_days,
            history: Vec::new(),
            confirmed_regime: None,
        }
    }

    /// Record one observation and return the smoothed regime label. The
    /// first observation is accepted immediately; later transitions need
    /// `smoothing_days` consecutive days of the new raw regime.
    pub fn update(&mut self, raw_regime: &str, confidence: f64, date: &str) -> String {
        self.history.push(Observation {
            regime: raw_regime.to_string(),
            confidence,
            date: date.to_string(),
        });

        let Some(confirmed) = self.confirmed_regime.clone() else {
            self.confirmed_regime = Some(raw_regime.to_string());
            return raw_regime.to_string();
        };

        if raw_regime == confirmed {
            return confirmed;
        }

        let recent_start = self.history.len().saturating_sub(self.smoothing_days);
        let recent = &self.history[recent_start..];
        if recent.len() >= self.smoothing_days && recent.iter().all(|r| r.regime == raw_regime) {
            self.confirmed_regime = Some(raw_regime.to_string());
        }

        self.confirmed_regime.clone().unwrap()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.confirmed_regime = None;
    }

    pub fn get_transition_state(&self) -> TransitionState {
        let Some(last) = self.history.last() else {
            return TransitionState {
                current_regime: None,
                pending_regime: None,
                consecutive_days: 0,
                is_transitioning: false,
            };
        };

        let current = self.confirmed_regime.clone();
        let latest_raw = last.regime.clone();

        if Some(&latest_raw) == current.as_ref() {
            return TransitionState {
                current_regime: current,
                pending_regime: None,
                consecutive_days: 0,
                is_transitioning: false,
            };
        }

        let consecutive = self
            .history
            .iter()
            .rev()
            .take_while(|entry| entry.regime == latest_raw)
            .count();

        TransitionState {
            current_regime: current,
            pending_regime: Some(latest_raw),
            consecutive_days: consecutive,
            is_transitioning: true,
        }
    }
}

impl Default for RegimeTransitionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_is_accepted_immediately() {
        let mut d = RegimeTransitionDetector::new(3);
        assert_eq!(d.update("RISK_ON", 0.9, "2024-01-02"), "RISK_ON");
    }

    #[test]
    fn single_day_whipsaw_does_not_flip_confirmed_regime() {
        let mut d = RegimeTransitionDetector::new(3);
        d.update("RISK_ON", 0.9, "2024-01-02");
        assert_eq!(d.update("RISK_OFF", 0.8, "2024-01-03"), "RISK_ON");
        assert_eq!(d.update("RISK_ON", 0.9, "2024-01-04"), "RISK_ON");
    }

    #[test]
    fn confirms_after_smoothing_days_consecutive_observations() {
        let mut d = RegimeTransitionDetector::new(3);
        d.update("RISK_ON", 0.9, "2024-01-01");
        assert_eq!(d.update("RISK_OFF", 0.8, "2024-01-02"), "RISK_ON");
        assert_eq!(d.update("RISK_OFF", 0.8, "2024-01-03"), "RISK_ON");
        assert_eq!(d.update("RISK_OFF", 0.8, "2024-01-04"), "RISK_OFF");
    }

    #[test]
    fn interrupted_streak_resets_the_consecutive_count() {
        let mut d = RegimeTransitionDetector::new(3);
        d.update("RISK_ON", 0.9, "2024-01-01");
        d.update("RISK_OFF", 0.8, "2024-01-02");
        d.update("RISK_OFF", 0.8, "2024-01-03");
        assert_eq!(d.update("RISK_ON", 0.9, "2024-01-04"), "RISK_ON");
        assert_eq!(d.update("RISK_OFF", 0.8, "2024-01-05"), "RISK_ON");
        assert_eq!(d.update("RISK_OFF", 0.8, "2024-01-06"), "RISK_ON");
        assert_eq!(d.update("RISK_OFF", 0.8, "2024-01-07"), "RISK_OFF");
    }

    #[test]
    fn transition_state_reports_consecutive_pending_days() {
        let mut d = RegimeTransitionDetector::new(3);
        d.update("RISK_ON", 0.9, "2024-01-01");
        d.update("RISK_OFF", 0.8, "2024-01-02");
        d.update("RISK_OFF", 0.8, "2024-01-03");
        let state = d.get_transition_state();
        assert_eq!(state.current_regime.as_deref(), Some("RISK_ON"));
        assert_eq!(state.pending_regime.as_deref(), Some("RISK_OFF"));
        assert_eq!(state.consecutive_days, 2);
        assert!(state.is_transitioning);
    }

    #[test]
    fn reset_clears_history_and_confirmed_regime() {
        let mut d = RegimeTransitionDetector::new(3);
        d.update("RISK_ON", 0.9, "2024-01-01");
        d.reset();
        let state = d.get_transition_state();
        assert_eq!(state.current_regime, None);
        assert!(!state.is_transitioning);
        assert_eq!(d.update("RISK_OFF", 0.5, "2024-02-01"), "RISK_OFF");
    }
}
