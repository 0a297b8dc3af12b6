//! `--run-once`: resolve today's risk controls, then run the exit-management
//! cycle for whatever positions `--positions-snapshot` names. There is no
//! broker/market-data adapter in scope (spec §1), so the cycle runs against
//! `dc-testkit`'s fakes seeded entirely from the snapshot file rather than a
//! live feed; regime classification is likewise out of scope (it needs a raw
//! regime signal no crate here produces), so this pass starts from whatever
//! throttle the ledger already carries instead of calling the detector.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dc_exits::{manage_one_position, ExitPositionState, ManageArgs};
use dc_risk::{build_risk_controls, BuildRiskControlsArgs};
use dc_schemas::Bar;
use dc_testkit::{FakeBroker, FakeMarketData};
use serde::Deserialize;
use std::path::Path;

/// One open position plus the bars its stop resolution should see. The
/// snapshot stands in for a broker's position feed and a market-data
/// provider's bar history, both out of scope for this binary.
#[derive(Debug, Deserialize)]
pub struct PositionSnapshotEntry {
    pub symbol: String,
    pub qty: i64,
    pub avg_entry_price: f64,
    pub current_price: f64,
    pub existing_stop: Option<f64>,
    pub entry_ts_utc: String,
    #[serde(default)]
    pub intraday_bars: Vec<Bar>,
    #[serde(default)]
    pub daily_bars: Vec<Bar>,
    /// First profit-target tier; with `r1_qty`, drives a R1 staged-exit
    /// transition to breakeven when `current_price` reaches it.
    #[serde(default)]
    pub r1_price: Option<f64>,
    #[serde(default)]
    pub r1_qty: i64,
    /// Second profit-target tier; with `r2_qty`, closes out the position.
    #[serde(default)]
    pub r2_price: Option<f64>,
    #[serde(default)]
    pub r2_qty: i64,
    /// Mirrors `manage_positions`'s `entry_delay_active`: skip the bar fetch
    /// entirely this cycle once `existing_stop` is already known.
    #[serde(default)]
    pub entry_delay_active: bool,
}

pub fn run(
    repo_root: &Path,
    positions_snapshot: Option<&Path>,
    now: DateTime<Utc>,
    ignore_market_hours: bool,
) -> Result<()> {
    let ny_date = dc_schemas::NyTimestamp::from_utc(now).date_ny().to_string();

    let risk_result = build_risk_controls(BuildRiskControlsArgs::new(&ny_date, repo_root))
        .context("resolving today's risk controls")?;
    tracing::info!(
        risk_multiplier = risk_result.controls.risk_multiplier,
        max_positions = ?risk_result.controls.max_positions,
        throttle_reason = %risk_result.controls.throttle_reason,
        "risk controls resolved"
    );

    let Some(snapshot_path) = positions_snapshot else {
        tracing::info!(
            "no --positions-snapshot given; skipping the exit-management step. \
             Provide one (see `run_once::PositionSnapshotEntry`) to exercise \
             `dc_exits::manage_one_position` against `dc-testkit`'s fakes."
        );
        return Ok(());
    };

    let raw = std::fs::read_to_string(snapshot_path)
        .with_context(|| format!("reading positions snapshot {}", snapshot_path.display()))?;
    let entries: Vec<PositionSnapshotEntry> =
        serde_json::from_str(&raw).context("parsing positions snapshot JSON")?;

    let cfg = dc_config::ExitConfig::from_env();
    for entry in entries {
        let mut broker = FakeBroker::new();
        let md = FakeMarketData::new()
            .with_intraday_bars(&entry.symbol, entry.intraday_bars)
            .with_daily_bars(&entry.symbol, entry.daily_bars);

        let mut state = ExitPositionState::new(&entry.symbol, entry.qty, entry.avg_entry_price, &entry.entry_ts_utc);
        state.stop_price = entry.existing_stop;
        state.r1_price = entry.r1_price;
        state.r1_qty = entry.r1_qty;
        state.r2_price = entry.r2_price;
        state.r2_qty = entry.r2_qty;

        let args = ManageArgs { repo_root, cfg: &cfg, dry_run: false, now, ignore_market_hours };
        let outcome = manage_one_position(
            &mut broker,
            &md,
            &args,
            &mut state,
            entry.current_price,
            entry.entry_delay_active,
        )
        .with_context(|| format!("managing position {}", entry.symbol))?;

        tracing::info!(
            symbol = %entry.symbol,
            stop = ?state.stop_price,
            stage = ?state.stage,
            qty_remaining = state.qty_remaining,
            ?outcome,
            "exit cycle complete"
        );
    }

    Ok(())
}
