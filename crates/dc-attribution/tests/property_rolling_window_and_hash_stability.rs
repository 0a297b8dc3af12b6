use dc_attribution::rolling_summary::{build_rolling_summary, RollingSummaryArgs};
use dc_attribution::{build_decision_id, DecisionPayloadOwned};
use tempfile::tempdir;

fn write_minimal_daily(dir: &std::path::Path, date: &str) {
    std::fs::create_dir_all(dir).unwrap();
    let summary = serde_json::json!({
        "notional_totals": {"baseline_total": 1000.0, "modulated_total": 900.0, "delta_total": -100.0},
        "counts": {"events_total": 1, "events_with_modulation": 1, "events_no_modulation": 0},
        "by_reason_code": {},
        "top_symbols_by_abs_delta_notional": [],
    });
    std::fs::write(dir.join(format!("{date}.json")), serde_json::to_string(&summary).unwrap()).unwrap();
}

/// Property 8 — rolling window rule: a rolling summary for date D exists
/// iff at least 20 daily summary files with date <= D exist; at exactly 20,
/// `window.dates_ny` equals those 20 sorted dates.
#[test]
fn property_rolling_summary_requires_exactly_twenty_dates() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("ledger").join("PORTFOLIO_RISK_ATTRIBUTION_SUMMARY");

    let mut dates = Vec::new();
    for i in 1..=19 {
        let date = format!("2024-01-{i:02}");
        write_minimal_daily(&input, &date);
        dates.push(date);
    }
    let nineteenth = dates.last().unwrap().clone();
    let mut args = RollingSummaryArgs::new(dir.path(), &nineteenth);
    args.input_dir = input.clone();
    assert!(build_rolling_summary(&args).unwrap().is_none(), "19 eligible dates must not produce a rolling summary");

    let twentieth = "2024-01-20".to_string();
    write_minimal_daily(&input, &twentieth);
    dates.push(twentieth.clone());

    let mut args = RollingSummaryArgs::new(dir.path(), &twentieth);
    args.input_dir = input;
    let payload = build_rolling_summary(&args).unwrap().expect("20 eligible dates must produce a rolling summary");
    assert_eq!(payload["window"]["trading_days_included"], 20);
    assert_eq!(payload["window"]["dates_ny"], serde_json::json!(dates));
}

fn payload(symbol: &str, drawdown: Option<f64>) -> DecisionPayloadOwned {
    DecisionPayloadOwned {
        date_ny: "2024-03-04".to_string(),
        symbol: symbol.to_string(),
        baseline_qty: 10,
        modulated_qty: 5,
        price: 100.0,
        source: "test".to_string(),
        throttle_source: Some("PORTFOLIO_THROTTLE".to_string()),
        throttle_regime_label: Some("RISK_ON".to_string()),
        drawdown,
        drawdown_threshold: Some(0.2),
    }
}

/// Property 6 — hash stability: `decision_id` computed twice on the same
/// payload fields is equal; changing any identifying field changes the id.
#[test]
fn property_decision_id_stable_and_sensitive_to_identity_fields() {
    let a = build_decision_id(&payload("AAPL", Some(0.1)));
    let b = build_decision_id(&payload("AAPL", Some(0.1)));
    assert_eq!(a, b, "identical payloads must hash identically");

    let different_symbol = build_decision_id(&payload("MSFT", Some(0.1)));
    assert_ne!(a, different_symbol);

    let different_drawdown = build_decision_id(&payload("AAPL", Some(0.2)));
    assert_ne!(a, different_drawdown);

    let no_drawdown = build_decision_id(&payload("AAPL", None));
    assert_ne!(a, no_drawdown);
}
