use chrono::{TimeZone, Utc};
use dc_config::ExitConfig;
use dc_exits::{manage_one_position, CycleOutcome, ExitPositionState, ExitStage, ManageArgs, StagedExitTransition};
use dc_schemas::Bar;
use dc_testkit::{FakeBroker, FakeMarketData};

fn cfg() -> ExitConfig {
    ExitConfig {
        stop_buffer_dollars: 0.10,
        max_risk_per_share: 3.00,
        min_intraday_bars: 6,
        intraday_minutes: 5,
        intraday_lookback_days: 3,
        daily_lookback_days: 320,
        telemetry_source: "test".to_string(),
        stop_too_close_min_pct: 0.01,
        stop_min_seconds_since_entry: 900,
    }
}

fn args<'a>(
    repo_root: &'a std::path::Path,
    cfg: &'a ExitConfig,
    now: chrono::DateTime<Utc>,
    ignore_market_hours: bool,
) -> ManageArgs<'a> {
    ManageArgs { repo_root, cfg, dry_run: false, now, ignore_market_hours }
}

fn ladder_state() -> ExitPositionState {
    let mut s = ExitPositionState::new("AAPL", 100, 50.0, "2024-01-16T14:30:00Z");
    s.r1_price = Some(55.0);
    s.r1_qty = 40;
    s.r2_price = Some(60.0);
    s.r2_qty = 30;
    s
}

#[test]
fn r1_target_reached_trims_qty_and_ratchets_to_breakeven_through_the_live_cycle() {
    let cfg = cfg();
    let now = Utc.with_ymd_and_hms(2024, 1, 16, 20, 0, 0).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let a = args(dir.path(), &cfg, now, false);
    let mut broker = FakeBroker::new();
    let md = FakeMarketData::new();
    let mut state = ladder_state();

    let outcome = manage_one_position(&mut broker, &md, &a, &mut state, 55.5, false).unwrap();

    assert_eq!(outcome, CycleOutcome::StagedExit(StagedExitTransition::TookR1));
    assert_eq!(state.stage, ExitStage::R1Taken);
    assert_eq!(state.qty_remaining, 60);
    assert_eq!(state.stop_price, Some(50.0));
    assert_eq!(broker.submit_calls, vec![("AAPL".to_string(), 60, 50.0)]);
}

#[test]
fn r2_target_reached_closes_the_position_and_stops_managing_it() {
    let cfg = cfg();
    let now = Utc.with_ymd_and_hms(2024, 1, 16, 20, 0, 0).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let a = args(dir.path(), &cfg, now, false);
    let mut broker = FakeBroker::new();
    let md = FakeMarketData::new();
    let mut state = ladder_state();

    manage_one_position(&mut broker, &md, &a, &mut state, 55.5, false).unwrap();
    let outcome = manage_one_position(&mut broker, &md, &a, &mut state, 61.0, false).unwrap();

    assert_eq!(outcome, CycleOutcome::StagedExit(StagedExitTransition::TookR2));
    assert_eq!(state.stage, ExitStage::Closed);
    assert_eq!(state.qty_remaining, 30);

    // A closed position is never touched again, not even for market data.
    let before = md.intraday_fetch_calls.borrow().len();
    let again = manage_one_position(&mut broker, &md, &a, &mut state, 100.0, false).unwrap();
    assert_eq!(again, CycleOutcome::Unchanged);
    assert_eq!(md.intraday_fetch_calls.borrow().len(), before);
}

#[test]
fn entry_delay_skips_market_data_once_an_existing_stop_is_known() {
    let cfg = cfg();
    let now = Utc.with_ymd_and_hms(2024, 1, 16, 20, 0, 0).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let a = args(dir.path(), &cfg, now, false);
    let mut broker = FakeBroker::new();
    let md = FakeMarketData::new();
    let mut state = ExitPositionState::new("AAPL", 10, 10.0, "2024-01-16T14:30:00Z");
    state.stop_price = Some(9.0);

    manage_one_position(&mut broker, &md, &a, &mut state, 9.2, true).unwrap();

    assert!(md.intraday_fetch_calls.borrow().is_empty(), "entry delay must skip the intraday fetch entirely");
    assert!(md.daily_fetch_calls.borrow().is_empty(), "entry delay must skip the daily fetch entirely");
}

#[test]
fn entry_delay_still_fetches_when_no_stop_is_known_yet() {
    let cfg = cfg();
    let now = Utc.with_ymd_and_hms(2024, 1, 16, 20, 0, 0).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let a = args(dir.path(), &cfg, now, false);
    let mut broker = FakeBroker::new();
    let md = FakeMarketData::new();
    let mut state = ExitPositionState::new("AAPL", 10, 10.0, "2024-01-16T14:30:00Z");

    manage_one_position(&mut broker, &md, &a, &mut state, 9.2, true).unwrap();

    assert!(
        !md.intraday_fetch_calls.borrow().is_empty(),
        "with no existing stop yet, the delay window must not suppress resolving one"
    );
}

fn intraday_bars_with_confirmed_higher_low() -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2024, 1, 16, 14, 30, 0).unwrap();
    let lows = [10.0, 9.0, 9.5, 9.2, 9.6, 9.0, 9.8, 11.0];
    lows.iter()
        .enumerate()
        .map(|(i, &low)| Bar {
            ts: base + chrono::Duration::minutes(i as i64 * 5),
            open: low + 1.0,
            high: low + 1.5,
            low,
            close: low + 1.0,
            volume: 1000.0,
        })
        .collect()
}

#[test]
fn open_noise_session_blocks_a_fresh_intraday_stop_by_default() {
    let cfg = cfg();
    // 09:35 America/New_York, squarely inside the OPEN_NOISE window.
    let now = Utc.with_ymd_and_hms(2024, 1, 16, 14, 35, 0).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let a = args(dir.path(), &cfg, now, false);
    let mut broker = FakeBroker::new();
    let md = FakeMarketData::new().with_intraday_bars("AAPL", intraday_bars_with_confirmed_higher_low());
    let mut state = ExitPositionState::new("AAPL", 10, 9.5, "2024-01-16T13:00:00Z");

    let outcome = manage_one_position(&mut broker, &md, &a, &mut state, 10.0, false).unwrap();

    assert_eq!(outcome, CycleOutcome::Skipped("skip_too_early"));
    assert!(state.stop_price.is_none());
}

#[test]
fn ignore_market_hours_lets_the_same_stop_through() {
    let cfg = cfg();
    let now = Utc.with_ymd_and_hms(2024, 1, 16, 14, 35, 0).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let a = args(dir.path(), &cfg, now, true);
    let mut broker = FakeBroker::new();
    let md = FakeMarketData::new().with_intraday_bars("AAPL", intraday_bars_with_confirmed_higher_low());
    let mut state = ExitPositionState::new("AAPL", 10, 9.5, "2024-01-16T13:00:00Z");

    let outcome = manage_one_position(&mut broker, &md, &a, &mut state, 10.0, false).unwrap();

    assert_eq!(outcome, CycleOutcome::Resolved);
    assert_eq!(state.stop_price, Some(9.1));
}
