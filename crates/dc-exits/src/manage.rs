//! Per-position daily cycle (`manage_positions`): evaluate the R1/R2 staged
//! ladder, resolve a candidate trailing stop, ratchet, guardrail-check,
//! telemeter, and reconcile. Grounded on `execution_v2/exits.py`'s
//! `manage_positions` for the core cycle and order-matching checks, and on
//! `tests/test_exit_stop_guardrails.py` / `tests/test_exits_entry_delay_guard.py`
//! for the session-phase table, the too-close/too-early guardrails, and the
//! entry-delay market-data skip — none of which survive in the captured
//! `execution_v2/exits.py` snapshot, but all of which its own test suite
//! exercises directly.

use crate::broker::{Broker, MarketData};
use crate::events::{append_exit_event, build_exit_event, BuildExitEventArgs};
use crate::guardrails::{self, GuardrailInputs};
use crate::reconcile::reconcile_stop_order;
use crate::session::classify_session_phase;
use crate::state::{apply_staged_exit, ExitPositionState, ExitStage, StagedExitTransition};
use crate::stops::{apply_trailing_stop, resolve_structural_stop};
use chrono::{DateTime, Utc};
use dc_config::ExitConfig;
use std::path::Path;

/// What happened to one position this cycle, for callers that want a
/// machine-readable summary instead of just the emitted ledger events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Resolved,
    Ratcheted,
    Skipped(&'static str),
    Unchanged,
    DryRun,
    /// The R1/R2 ladder fired this cycle; the stop/trailing logic below may
    /// also have run against whatever it left behind.
    StagedExit(StagedExitTransition),
}

pub struct ManageArgs<'a> {
    pub repo_root: &'a Path,
    pub cfg: &'a ExitConfig,
    pub dry_run: bool,
    pub now: DateTime<Utc>,
    /// Bypasses the session-phase guardrail gate (`--ignore-market-hours`).
    pub ignore_market_hours: bool,
}

fn emit(args: &ManageArgs, event: serde_json::Value) {
    let _ = append_exit_event(args.repo_root, &event);
}

/// Evaluate the R1/R2 ladder against `current_price` and telemeter whatever
/// fires, using only the spec's fixed exit event-type enum (there is no
/// dedicated R1/R2 event type): a take is an `EXIT_FILLED` for the released
/// quantity, and the R1 take's move to breakeven is additionally a
/// `STOP_RATCHET`.
fn run_staged_exit(args: &ManageArgs, cfg: &ExitConfig, state: &mut ExitPositionState, current_price: f64) {
    let Some(transition) = apply_staged_exit(state, current_price) else { return };

    match transition {
        StagedExitTransition::TookR1 => {
            emit(
                args,
                build_exit_event(BuildExitEventArgs {
                    qty: Some(state.r1_qty as f64),
                    price: Some(current_price),
                    stop_action: Some("r1_take"),
                    entry_price: Some(state.entry_price),
                    entry_ts_utc: Some(&state.entry_ts_utc),
                    ..BuildExitEventArgs::new("EXIT_FILLED", &state.symbol, &cfg.telemetry_source)
                }),
            );
            emit(
                args,
                build_exit_event(BuildExitEventArgs {
                    qty: Some(state.qty_remaining as f64),
                    stop_price: state.stop_price,
                    stop_action: Some("breakeven"),
                    entry_price: Some(state.entry_price),
                    entry_ts_utc: Some(&state.entry_ts_utc),
                    ..BuildExitEventArgs::new("STOP_RATCHET", &state.symbol, &cfg.telemetry_source)
                }),
            );
        }
        StagedExitTransition::TookR2 => {
            emit(
                args,
                build_exit_event(BuildExitEventArgs {
                    qty: Some(state.r2_qty as f64),
                    price: Some(current_price),
                    stop_action: Some("r2_take"),
                    entry_price: Some(state.entry_price),
                    entry_ts_utc: Some(&state.entry_ts_utc),
                    ..BuildExitEventArgs::new("EXIT_FILLED", &state.symbol, &cfg.telemetry_source)
                }),
            );
        }
    }
}

/// Run one position through the cycle, mutating `state` in place (stage,
/// qty_remaining, stop bookkeeping) and returning the outcome classification.
/// Telemetry append failures are swallowed (fail-open, spec §5) — they never
/// block the reconciliation itself.
///
/// `entry_delay_active` mirrors `manage_positions`'s own flag: once an
/// existing stop is already known, the entry-delay window skips the
/// intraday/daily bar fetch entirely rather than just discarding the result.
pub fn manage_one_position<B: Broker, M: MarketData>(
    broker: &mut B,
    md: &M,
    args: &ManageArgs,
    state: &mut ExitPositionState,
    current_price: f64,
    entry_delay_active: bool,
) -> anyhow::Result<CycleOutcome> {
    let cfg = args.cfg;

    if state.stage == ExitStage::Closed {
        return Ok(CycleOutcome::Unchanged);
    }

    run_staged_exit(args, cfg, state, current_price);
    if state.stage == ExitStage::Closed {
        return Ok(CycleOutcome::StagedExit(StagedExitTransition::TookR2));
    }
    let took_r1 = matches!(state.stage, ExitStage::R1Taken);

    let symbol = state.symbol.clone();
    let existing_stop = state.stop_price;
    let skip_market_data = entry_delay_active && existing_stop.is_some();

    let (candidate_stop, candidate_basis, intraday_bars_available) = if skip_market_data {
        (None, None, 0)
    } else {
        let intraday_bars = md.get_intraday_bars(&symbol, cfg.intraday_minutes, cfg.intraday_lookback_days);
        let daily_bars = md.get_daily_bars(&symbol, cfg.daily_lookback_days);
        let (stop, basis) =
            resolve_structural_stop(&intraday_bars, &daily_bars, cfg.stop_buffer_dollars, cfg.min_intraday_bars);
        (stop, basis, intraday_bars.len())
    };

    let desired_stop = apply_trailing_stop(existing_stop, candidate_stop);

    let Some(desired_stop) = desired_stop else {
        return Ok(if took_r1 {
            CycleOutcome::StagedExit(StagedExitTransition::TookR1)
        } else {
            CycleOutcome::Unchanged
        });
    };

    let session_phase = classify_session_phase(args.now);
    let seconds_since_entry = state
        .entry_ts_utc
        .parse::<DateTime<Utc>>()
        .map(|ts| (args.now - ts).num_seconds())
        .unwrap_or(i64::MAX);

    let guardrail_inputs = GuardrailInputs {
        desired_stop,
        current_price,
        existing_stop,
        entry_price: state.entry_price,
        stop_basis: candidate_basis,
        seconds_since_entry,
        intraday_bars_available,
        min_seconds_since_entry: cfg.stop_min_seconds_since_entry,
        min_intraday_bars: cfg.min_intraday_bars,
        too_close_min_pct: cfg.stop_too_close_min_pct,
        session_phase,
        ignore_market_hours: args.ignore_market_hours,
    };

    if let Some(skip) = guardrails::evaluate(&guardrail_inputs) {
        emit(
            args,
            build_exit_event(BuildExitEventArgs {
                qty: Some(state.qty_remaining as f64),
                stop_price: Some(desired_stop),
                stop_basis: candidate_basis,
                stop_action: Some(skip.stop_action()),
                entry_price: Some(state.entry_price),
                entry_ts_utc: Some(&state.entry_ts_utc),
                ..BuildExitEventArgs::new(skip.event_type(), &symbol, &cfg.telemetry_source)
            }),
        );
        return Ok(CycleOutcome::Skipped(skip.stop_action()));
    }

    let outcome = if existing_stop.is_none() {
        emit(
            args,
            build_exit_event(BuildExitEventArgs {
                qty: Some(state.qty_remaining as f64),
                stop_price: Some(desired_stop),
                stop_basis: candidate_basis,
                stop_action: Some("initial"),
                entry_price: Some(state.entry_price),
                entry_ts_utc: Some(&state.entry_ts_utc),
                ..BuildExitEventArgs::new("STOP_RESOLVED", &symbol, &cfg.telemetry_source)
            }),
        );
        CycleOutcome::Resolved
    } else if Some(desired_stop) > existing_stop {
        emit(
            args,
            build_exit_event(BuildExitEventArgs {
                qty: Some(state.qty_remaining as f64),
                stop_price: Some(desired_stop),
                stop_basis: candidate_basis,
                stop_action: Some("ratchet"),
                entry_price: Some(state.entry_price),
                entry_ts_utc: Some(&state.entry_ts_utc),
                ..BuildExitEventArgs::new("STOP_RATCHET", &symbol, &cfg.telemetry_source)
            }),
        );
        CycleOutcome::Ratcheted
    } else if took_r1 {
        CycleOutcome::StagedExit(StagedExitTransition::TookR1)
    } else {
        CycleOutcome::Unchanged
    };

    state.stop_price = Some(desired_stop);
    if let Some(basis) = candidate_basis {
        state.stop_basis = Some(basis.to_string());
    }

    if args.dry_run {
        return Ok(CycleOutcome::DryRun);
    }

    let qty_remaining = state.qty_remaining;
    match reconcile_stop_order(broker, state.clone(), qty_remaining, desired_stop) {
        Ok(result) => {
            for notice in result.notices {
                let wrapped = crate::events::build_exit_event_from_legacy(
                    notice,
                    &symbol,
                    &cfg.telemetry_source,
                    &crate::events::ExitEventContext {
                        qty: Some(qty_remaining as f64),
                        entry_price: Some(result.state.entry_price),
                        entry_ts_utc: Some(result.state.entry_ts_utc.clone()),
                        ..Default::default()
                    },
                );
                emit(args, wrapped);
            }
            *state = result.state;
            Ok(outcome)
        }
        Err(_err) => Ok(outcome),
    }
}
