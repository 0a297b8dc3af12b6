use dc_attribution::{build_attribution_event, BuildEventArgs};

/// S5 — attribution delta math: baseline_qty=10, modulated_qty=5, price=100
/// gives baseline_notional=1000, modulated_notional=500, delta.qty=-5,
/// delta.notional=-500, pct_qty=-0.5, pct_notional=-0.5; reason_codes
/// supplied out of order and with a duplicate come back sorted and deduped.
#[test]
fn s5_attribution_delta_math() {
    let event = build_attribution_event(&BuildEventArgs {
        date_ny: "2024-03-04",
        symbol: "AAPL",
        baseline_qty: 10,
        modulated_qty: 5,
        price: 100.0,
        account_equity: None,
        gross_exposure: None,
        risk_controls: None,
        risk_control_reasons: vec!["z_reason".to_string(), "a_reason".to_string(), "a_reason".to_string()],
        throttle_source: None,
        throttle_regime_label: None,
        throttle_policy_ref: None,
        drawdown: None,
        drawdown_threshold: None,
        min_qty: None,
        source: "test",
        correlation_penalty: 0.0,
    });

    assert_eq!(event["baseline"]["notional"], 1000.0);
    assert_eq!(event["modulated"]["notional"], 500.0);
    assert_eq!(event["delta"]["qty"], -5);
    assert_eq!(event["delta"]["notional"], -500.0);
    assert_eq!(event["delta"]["pct_qty"], -0.5);
    assert_eq!(event["delta"]["pct_notional"], -0.5);
    assert_eq!(event["reason_codes"], serde_json::json!(["a_reason", "z_reason"]));
}
