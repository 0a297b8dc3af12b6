//! Per-decision risk-attribution ledger, daily/rolling aggregate summaries,
//! and execution slippage tracking — the audit trail behind every
//! risk-modulated order quantity.

pub mod daily_summary;
pub mod event;
pub mod rolling_summary;
pub mod slippage;

pub use event::{
    append_attribution_event, build_attribution_event, build_decision_id, infer_hard_caps,
    resolve_throttle_policy_reference, attribution_path, BuildEventArgs, DecisionPayloadOwned, HardCapInputs,
};
