//! Per-decision `PORTFOLIO_RISK_ATTRIBUTION` event construction and append.

use dc_risk::RiskControls;
use dc_schemas::stable_json;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

pub const RECORD_TYPE: &str = "PORTFOLIO_RISK_ATTRIBUTION";
pub const SCHEMA_VERSION: i32 = 1;

pub fn attribution_path(repo_root: &Path, ny_date: &str) -> PathBuf {
    repo_root.join("ledger").join("PORTFOLIO_RISK_ATTRIBUTION").join(format!("{ny_date}.jsonl"))
}

/// Where the throttle that produced these risk controls was itself read
/// from, so a downstream auditor can open the exact ledger line. `None`
/// unless `source` names a ledger dc-risk knows how to resolve.
pub fn resolve_throttle_policy_reference(repo_root: &Path, ny_date: &str, source: Option<&str>) -> Option<String> {
    match source? {
        "PORTFOLIO_THROTTLE" => Some(repo_root.join("ledger").join("PORTFOLIO_THROTTLE").join(format!("{ny_date}.jsonl")).to_string_lossy().into_owned()),
        "REGIME_E1" => Some(repo_root.join("ledger").join("REGIME_E1").join(format!("{ny_date}.jsonl")).to_string_lossy().into_owned()),
        _ => None,
    }
}

fn pct_delta(delta: f64, baseline: f64) -> Option<f64> {
    if baseline <= 0.0 {
        None
    } else {
        Some(delta / baseline)
    }
}

/// Hard caps that bit into the requested quantity, in reason-code form.
/// `max_gross_exposure` is interpreted as a fraction of account equity when
/// it is `<= 1.0`, else as an absolute dollar limit — this mirrors the
/// source pipeline's own dual interpretation exactly, even though
/// `dc_risk::sizing` always treats it as a fraction; the two call sites
/// never reconcile this in the source pipeline either.
pub struct HardCapInputs<'a> {
    pub base_qty: i64,
    pub price: f64,
    pub account_equity: Option<f64>,
    pub risk_controls: Option<&'a RiskControls>,
    pub gross_exposure: Option<f64>,
    pub min_qty: Option<i64>,
}

pub fn infer_hard_caps(inputs: &HardCapInputs<'_>) -> Vec<String> {
    let (account_equity, risk_controls) = match (inputs.account_equity, inputs.risk_controls) {
        (Some(eq), Some(rc)) if inputs.base_qty > 0 => (eq, rc),
        _ => return Vec::new(),
    };

    let mut caps = Vec::new();
    let mut adjusted_qty = (inputs.base_qty as f64 * risk_controls.risk_multiplier).floor() as i64;
    if adjusted_qty < inputs.base_qty {
        caps.push("risk_multiplier".to_string());
    }

    if let Some(cap) = risk_controls.per_position_cap {
        let cap_qty = ((account_equity * cap) / inputs.price).floor() as i64;
        if cap_qty < adjusted_qty {
            caps.push("per_position_cap".to_string());
        }
        adjusted_qty = adjusted_qty.min(cap_qty);
    }

    if let (Some(max_gross), Some(gross)) = (risk_controls.max_gross_exposure, inputs.gross_exposure) {
        let limit = if max_gross <= 1.0 { account_equity * max_gross } else { max_gross };
        let remaining = (limit - gross).max(0.0);
        let cap_qty = (remaining / inputs.price).floor() as i64;
        if cap_qty < adjusted_qty {
            caps.push("max_gross_exposure".to_string());
        }
        adjusted_qty = adjusted_qty.min(cap_qty);
    }

    if let Some(min_qty) = inputs.min_qty {
        if min_qty > 1 && adjusted_qty < min_qty {
            caps.push("min_qty_floor".to_string());
        }
    }

    dc_risk::ordered_reasons(caps)
}

pub struct BuildEventArgs<'a> {
    pub date_ny: &'a str,
    pub symbol: &'a str,
    pub baseline_qty: i64,
    pub modulated_qty: i64,
    pub price: f64,
    pub account_equity: Option<f64>,
    pub gross_exposure: Option<f64>,
    pub risk_controls: Option<&'a RiskControls>,
    pub risk_control_reasons: Vec<String>,
    pub throttle_source: Option<&'a str>,
    pub throttle_regime_label: Option<&'a str>,
    pub throttle_policy_ref: Option<String>,
    pub drawdown: Option<f64>,
    pub drawdown_threshold: Option<f64>,
    pub min_qty: Option<i64>,
    pub source: &'a str,
    pub correlation_penalty: f64,
}

pub fn build_decision_id(payload: &DecisionPayloadOwned) -> String {
    let packed = stable_json::dumps(payload).expect("decision payload always serializes");
    dc_schemas::sha256_hex(packed.as_bytes())
}

/// The exact ten-field subset of a decision that gets hashed into
/// `decision_id` — deliberately narrower than the full event, so unrelated
/// fields (hard caps, reason codes, correlation penalty) can change without
/// perturbing the id.
#[derive(Serialize, Clone)]
pub struct DecisionPayloadOwned {
    pub date_ny: String,
    pub symbol: String,
    pub baseline_qty: i64,
    pub modulated_qty: i64,
    pub price: f64,
    pub source: String,
    pub throttle_source: Option<String>,
    pub throttle_regime_label: Option<String>,
    pub drawdown: Option<f64>,
    pub drawdown_threshold: Option<f64>,
}

pub fn build_attribution_event(args: &BuildEventArgs<'_>) -> Value {
    let baseline_notional = args.price * args.baseline_qty as f64;
    let modulated_notional = args.price * args.modulated_qty as f64;
    let delta_qty = args.modulated_qty - args.baseline_qty;
    let delta_notional = modulated_notional - baseline_notional;

    let hard_caps = infer_hard_caps(&HardCapInputs {
        base_qty: args.baseline_qty,
        price: args.price,
        account_equity: args.account_equity,
        risk_controls: args.risk_controls,
        gross_exposure: args.gross_exposure,
        min_qty: args.min_qty,
    });

    let reason_codes = dc_risk::ordered_reasons(args.risk_control_reasons.clone());
    let drawdown_applied = matches!((args.drawdown, args.drawdown_threshold), (Some(d), Some(t)) if d >= t);

    let decision_payload = DecisionPayloadOwned {
        date_ny: args.date_ny.to_string(),
        symbol: args.symbol.to_string(),
        baseline_qty: args.baseline_qty,
        modulated_qty: args.modulated_qty,
        price: args.price,
        source: args.source.to_string(),
        throttle_source: args.throttle_source.map(str::to_string),
        throttle_regime_label: args.throttle_regime_label.map(str::to_string),
        drawdown: args.drawdown,
        drawdown_threshold: args.drawdown_threshold,
    };
    let decision_id = build_decision_id(&decision_payload);

    json!({
        "schema_version": SCHEMA_VERSION,
        "record_type": RECORD_TYPE,
        "decision_id": decision_id,
        "date_ny": args.date_ny,
        "symbol": args.symbol,
        "source": args.source,
        "baseline": {
            "qty": args.baseline_qty,
            "notional": baseline_notional,
        },
        "modulated": {
            "qty": args.modulated_qty,
            "notional": modulated_notional,
        },
        "delta": {
            "qty": delta_qty,
            "notional": delta_notional,
            "pct_qty": pct_delta(delta_qty as f64, args.baseline_qty as f64),
            "pct_notional": pct_delta(delta_notional, baseline_notional),
        },
        "regime": {
            "code": args.throttle_regime_label,
            "source": args.throttle_source,
            "throttle_policy_ref": args.throttle_policy_ref,
        },
        "drawdown_guard": {
            "applied": drawdown_applied,
            "drawdown": args.drawdown,
            "threshold": args.drawdown_threshold,
        },
        "hard_caps_applied": hard_caps,
        "reason_codes": reason_codes,
        "risk_controls": {
            "risk_multiplier": args.risk_controls.map(|c| c.risk_multiplier),
            "max_gross_exposure": args.risk_controls.and_then(|c| c.max_gross_exposure),
            "max_positions": args.risk_controls.and_then(|c| c.max_positions),
            "per_position_cap": args.risk_controls.and_then(|c| c.per_position_cap),
            "throttle_reason": args.risk_controls.map(|c| c.throttle_reason.clone()),
        },
        "correlation_penalty": args.correlation_penalty,
    })
}

pub fn append_attribution_event(repo_root: &Path, event: &Value) -> anyhow::Result<PathBuf> {
    let date_ny = event
        .get("date_ny")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("event missing date_ny"))?;
    let path = attribution_path(repo_root, date_ny);
    dc_ledger::append_record(&path, event)?;
    Ok(path)
}
