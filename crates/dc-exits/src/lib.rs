//! Exit and stop management: structural stop resolution, session-phase and
//! pre-submit guardrails, idempotent broker reconciliation, the R1/R2
//! staged-exit ladder, the exit-events ledger, and a pure walk-forward
//! simulator that shares the live stop helpers for parity.

pub mod broker;
pub mod events;
pub mod guardrails;
pub mod manage;
pub mod reconcile;
pub mod session;
pub mod simulator;
pub mod state;
pub mod stops;

pub use broker::{Broker, BrokerError, MarketData, PositionSnapshot};
pub use events::{append_exit_event, build_exit_event, build_position_id, build_trade_id, BuildExitEventArgs};
pub use manage::{manage_one_position, CycleOutcome, ManageArgs};
pub use reconcile::{reconcile_stop_order, ReconcileOutcome};
pub use session::{classify_session_phase, SessionPhase};
pub use simulator::{simulate_exit, SimulateExitArgs};
pub use state::{apply_staged_exit, ExitPositionState, ExitStage, StagedExitTransition};
pub use stops::{
    apply_trailing_stop, compute_daily_swing_low_stop, compute_intraday_higher_low_stop, compute_stop_price,
    entry_day_from_ts, resolve_structural_stop, validate_risk,
};
