//! Exit-event construction, identity hashing, and the exit-events ledger.
//! Grounded on `execution_v2/exit_events.py`. Uses a *different* SHA-256
//! scheme than the risk-attribution `decision_id`: here the hash input is
//! pipe-joined, `repr(float)`-style formatted parts, not a stable-JSON dump.

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::America::New_York;
use dc_schemas::sha256_hex;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: i32 = 1;

/// `repr(float)`-equivalent: always carries a decimal point, shortest
/// round-trippable form. Rust's `{:?}` formatting for `f64` has the same
/// shape as CPython's `repr`.
fn format_float(value: f64) -> String {
    format!("{value:?}")
}

fn format_optional_float(value: Option<f64>) -> String {
    value.map(format_float).unwrap_or_default()
}

fn hash_payload(parts: &[&str]) -> String {
    sha256_hex(parts.join("|").as_bytes())
}

/// Identity of an opened position: `(symbol, entry_ts_utc, qty, entry_price,
/// strategy_id, sleeve_id[, entry_id])`. Same identity ⇒ same id, anywhere.
pub struct PositionIdArgs<'a> {
    pub symbol: &'a str,
    pub entry_ts_utc: &'a str,
    pub qty: f64,
    pub entry_price: Option<f64>,
    pub strategy_id: &'a str,
    pub sleeve_id: &'a str,
    pub entry_id: Option<&'a str>,
}

pub fn build_position_id(args: &PositionIdArgs) -> String {
    let qty_s = format_float(args.qty);
    let entry_price_s = format_optional_float(args.entry_price);
    let mut parts = vec![
        args.symbol,
        args.entry_ts_utc,
        qty_s.as_str(),
        entry_price_s.as_str(),
        args.strategy_id,
        args.sleeve_id,
    ];
    if let Some(entry_id) = args.entry_id.filter(|s| !s.is_empty()) {
        parts.push(entry_id);
    }
    hash_payload(&parts)
}

pub fn build_trade_id(position_id: &str, exit_ts_utc: &str, qty: f64, exit_price: Option<f64>) -> String {
    let qty_s = format_float(qty);
    let exit_price_s = format_optional_float(exit_price);
    hash_payload(&[position_id, exit_ts_utc, qty_s.as_str(), exit_price_s.as_str()])
}

fn iso_utc(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn iso_ny(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&New_York).to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn date_ny(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&New_York).format("%Y-%m-%d").to_string()
}

/// Identity context carried alongside a position across its lifetime, so
/// guardrail/legacy-style events can be stamped with the same position and
/// trade identity as the canonical ones.
#[derive(Debug, Clone, Default)]
pub struct ExitEventContext {
    pub qty: Option<f64>,
    pub entry_id: Option<String>,
    pub entry_price: Option<f64>,
    pub entry_ts_utc: Option<String>,
    pub position_id: Option<String>,
    pub trade_id: Option<String>,
}

/// Arguments for [`build_exit_event`]. Every optional field mirrors the
/// source pipeline's `build_exit_event` keyword arguments; fields irrelevant
/// to a given `event_type` are simply left `None`.
#[derive(Default)]
pub struct BuildExitEventArgs<'a> {
    pub event_type: &'a str,
    pub symbol: &'a str,
    pub ts: Option<DateTime<Utc>>,
    pub source: &'a str,
    pub qty: Option<f64>,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub stop_basis: Option<&'a str>,
    pub stop_action: Option<&'a str>,
    pub reason: Option<&'a str>,
    pub entry_id: Option<&'a str>,
    pub entry_price: Option<f64>,
    pub entry_ts_utc: Option<&'a str>,
    pub exit_ts_utc: Option<&'a str>,
    pub position_id: Option<&'a str>,
    pub trade_id: Option<&'a str>,
    pub metadata: Option<Value>,
    pub strategy_id: &'a str,
    pub sleeve_id: &'a str,
}

impl<'a> BuildExitEventArgs<'a> {
    pub fn new(event_type: &'a str, symbol: &'a str, source: &'a str) -> Self {
        Self {
            event_type,
            symbol,
            source,
            strategy_id: "default",
            sleeve_id: "default",
            ..Default::default()
        }
    }
}

/// Build one exit-event JSON object: resolves `position_id`/`trade_id` from
/// identity fields when not supplied directly, then derives `event_id` as a
/// SHA-256 over `(event_type, symbol, position_id, trade_id, ts_utc,
/// stop_price, price, qty, source)`.
pub fn build_exit_event(args: BuildExitEventArgs) -> Value {
    let ts_dt = args.ts.unwrap_or_else(Utc::now);
    let ts_utc = iso_utc(ts_dt);
    let ts_ny = iso_ny(ts_dt);
    let the_date_ny = date_ny(ts_dt);

    let (entry_ts_ny, entry_date_ny) = args
        .entry_ts_utc
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .map(|dt| (Some(iso_ny(dt)), Some(date_ny(dt))))
        .unwrap_or((None, None));

    let (exit_ts_ny, exit_date_ny) = args
        .exit_ts_utc
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .map(|dt| (Some(iso_ny(dt)), Some(date_ny(dt))))
        .unwrap_or((None, None));

    let resolved_position_id = args.position_id.map(str::to_string).or_else(|| {
        match (args.entry_ts_utc, args.qty) {
            (Some(entry_ts_utc), Some(qty)) => Some(build_position_id(&PositionIdArgs {
                symbol: args.symbol,
                entry_ts_utc,
                qty,
                entry_price: args.entry_price,
                strategy_id: args.strategy_id,
                sleeve_id: args.sleeve_id,
                entry_id: args.entry_id,
            })),
            _ => None,
        }
    });

    let resolved_trade_id = args.trade_id.map(str::to_string).or_else(|| {
        match (&resolved_position_id, args.exit_ts_utc, args.qty) {
            (Some(position_id), Some(exit_ts_utc), Some(qty)) => {
                Some(build_trade_id(position_id, exit_ts_utc, qty, args.price))
            }
            _ => None,
        }
    });

    let event_id = hash_payload(&[
        args.event_type,
        args.symbol,
        resolved_position_id.as_deref().unwrap_or(""),
        resolved_trade_id.as_deref().unwrap_or(""),
        ts_utc.as_str(),
        format_optional_float(args.stop_price).as_str(),
        format_optional_float(args.price).as_str(),
        format_optional_float(args.qty).as_str(),
        args.source,
    ]);

    json!({
        "schema_version": SCHEMA_VERSION,
        "event_id": event_id,
        "event_type": args.event_type,
        "symbol": args.symbol,
        "position_id": resolved_position_id,
        "trade_id": resolved_trade_id,
        "entry_id": args.entry_id,
        "qty": args.qty,
        "price": args.price,
        "stop_price": args.stop_price,
        "stop_basis": args.stop_basis,
        "stop_action": args.stop_action,
        "reason": args.reason,
        "entry_price": args.entry_price,
        "entry_ts_utc": args.entry_ts_utc,
        "entry_ts_ny": entry_ts_ny,
        "entry_date_ny": entry_date_ny,
        "exit_ts_utc": args.exit_ts_utc,
        "exit_ts_ny": exit_ts_ny,
        "exit_date_ny": exit_date_ny,
        "ts_utc": ts_utc,
        "ts_ny": ts_ny,
        "date_ny": the_date_ny,
        "source": args.source,
        "strategy_id": args.strategy_id,
        "sleeve_id": args.sleeve_id,
        "metadata": args.metadata.unwrap_or_else(|| Value::Object(Map::new())),
    })
}

/// Wrap a free-form `{event, ...}` map (as produced by the reconciliation
/// protocol's `STOP_SKIP_HELD`/`STOP_SUBMIT_BLOCKED` notices) into a full
/// exit event, carrying the event's own fields through as `metadata`.
pub fn build_exit_event_from_legacy(legacy: Value, symbol: &str, source: &str, context: &ExitEventContext) -> Value {
    let event_type = legacy
        .get("event")
        .and_then(Value::as_str)
        .or_else(|| legacy.get("event_type").and_then(Value::as_str))
        .unwrap_or("UNKNOWN")
        .to_string();
    build_exit_event(BuildExitEventArgs {
        event_type: &event_type,
        symbol,
        source,
        qty: context.qty,
        entry_id: context.entry_id.as_deref(),
        entry_price: context.entry_price,
        entry_ts_utc: context.entry_ts_utc.as_deref(),
        position_id: context.position_id.as_deref(),
        trade_id: context.trade_id.as_deref(),
        metadata: Some(legacy),
        strategy_id: "default",
        sleeve_id: "default",
        ..Default::default()
    })
}

pub fn exit_ledger_path(repo_root: &Path, date_ny: &str) -> PathBuf {
    repo_root.join("ledger").join("EXIT_EVENTS").join(format!("{date_ny}.jsonl"))
}

/// Append one exit event via the all-or-nothing read-append-rewrite pattern
/// (spec requires the exit-events ledger to be atomic from a reader's view).
pub fn append_exit_event(repo_root: &Path, event: &Value) -> anyhow::Result<PathBuf> {
    let date_ny = event
        .get("date_ny")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("exit event missing date_ny"))?;
    let path = exit_ledger_path(repo_root, date_ny);
    dc_ledger::atomic_rewrite_append_jsonl(&path, event)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn position_id_is_stable_for_identical_identity() {
        let args = PositionIdArgs {
            symbol: "AAPL",
            entry_ts_utc: "2024-01-16T14:35:00Z",
            qty: 10.0,
            entry_price: Some(150.25),
            strategy_id: "default",
            sleeve_id: "default",
            entry_id: None,
        };
        let a = build_position_id(&args);
        let b = build_position_id(&args);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn position_id_changes_with_entry_id() {
        let mut args = PositionIdArgs {
            symbol: "AAPL",
            entry_ts_utc: "2024-01-16T14:35:00Z",
            qty: 10.0,
            entry_price: Some(150.25),
            strategy_id: "default",
            sleeve_id: "default",
            entry_id: None,
        };
        let without = build_position_id(&args);
        args.entry_id = Some("entry-1");
        let with = build_position_id(&args);
        assert_ne!(without, with);
    }

    #[test]
    fn build_exit_event_derives_position_id_and_stamps_ny_fields() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 16, 14, 35, 0).unwrap();
        let event = build_exit_event(BuildExitEventArgs {
            ts: Some(ts),
            qty: Some(10.0),
            entry_price: Some(150.0),
            entry_ts_utc: Some("2024-01-16T14:30:00Z"),
            stop_price: Some(148.0),
            stop_basis: Some("intraday_hl"),
            stop_action: Some("initial"),
            ..BuildExitEventArgs::new("STOP_RESOLVED", "AAPL", "execution_v2")
        });
        assert_eq!(event["event_type"], "STOP_RESOLVED");
        assert!(event["position_id"].is_string());
        assert_eq!(event["date_ny"], "2024-01-16");
        assert!(event["entry_date_ny"].is_string());
    }

    #[test]
    fn event_id_differs_when_stop_price_differs() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 16, 14, 35, 0).unwrap();
        let base = |stop: f64| {
            build_exit_event(BuildExitEventArgs {
                ts: Some(ts),
                qty: Some(10.0),
                stop_price: Some(stop),
                ..BuildExitEventArgs::new("STOP_RATCHET", "AAPL", "execution_v2")
            })
        };
        let a = base(148.0);
        let b = base(148.5);
        assert_ne!(a["event_id"], b["event_id"]);
    }
}
