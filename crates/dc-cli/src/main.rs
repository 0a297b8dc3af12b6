//! `dc_core`: thin CLI surface for the daily decision & audit substrate.
//! Grounded on `mqk-cli`'s `clap::Parser`/`Subcommand` shape, trimmed to a
//! synchronous binary since this crate has no async I/O of its own (spec §6
//! keeps live market-data fetchers and broker SDK bindings out of scope).

mod preflight;
mod run_once;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dc_config::ExitConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dc_core")]
#[command(about = "Equity trading pipeline decision & audit substrate", long_about = None)]
struct Cli {
    /// Repo root the ledger and feature-store sidecars live under.
    #[arg(long, default_value = ".")]
    repo_root: PathBuf,

    /// Validate layered env config and exit, printing the resolved values.
    #[arg(long)]
    config_check: bool,

    /// Run a single decision/exit-management cycle and exit, instead of a
    /// persistent loop (no persistent loop exists in this crate either way;
    /// kept for parity with the flag the source pipeline's operators expect).
    #[arg(long)]
    run_once: bool,

    /// JSON file of open positions (and the bars the exit cycle should see
    /// for each) to drive `--run-once`'s exit-management step. With no
    /// broker/market-data adapter in scope, this is the only way to feed it
    /// real position state; see `run_once::PositionSnapshotEntry`.
    #[arg(long)]
    positions_snapshot: Option<PathBuf>,

    /// Skip the session-hours guardrail, in both `preflight` and the
    /// exit-management cycle `--run-once` drives.
    #[arg(long)]
    ignore_market_hours: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate config and repo-root writability; exit 0=PASS, 1=FAIL, 2=WARN.
    Preflight,
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::try_init().ok();

    let cli = Cli::parse();

    if let Some(Commands::Preflight) = cli.command {
        let report = preflight::run_preflight(&cli.repo_root, Utc::now(), cli.ignore_market_hours);
        for message in &report.messages {
            tracing::info!("{message}");
        }
        println!("preflight_status={:?}", report.status);
        return Ok(ExitCode::from(report.exit_code() as u8));
    }

    if cli.config_check {
        let cfg = ExitConfig::from_env();
        println!("stop_buffer_dollars={}", cfg.stop_buffer_dollars);
        println!("max_risk_per_share={}", cfg.max_risk_per_share);
        println!("min_intraday_bars={}", cfg.min_intraday_bars);
        println!("intraday_minutes={}", cfg.intraday_minutes);
        println!("intraday_lookback_days={}", cfg.intraday_lookback_days);
        println!("daily_lookback_days={}", cfg.daily_lookback_days);
        println!("telemetry_source={}", cfg.telemetry_source);
        println!("stop_too_close_min_pct={}", cfg.stop_too_close_min_pct);
        println!("stop_min_seconds_since_entry={}", cfg.stop_min_seconds_since_entry);
        return Ok(ExitCode::SUCCESS);
    }

    if cli.run_once {
        run_once::run(&cli.repo_root, cli.positions_snapshot.as_deref(), Utc::now(), cli.ignore_market_hours)?;
        return Ok(ExitCode::SUCCESS);
    }

    tracing::warn!("no action requested; pass --config-check, --run-once, or the preflight subcommand");
    Ok(ExitCode::SUCCESS)
}
