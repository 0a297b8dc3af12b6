//! Shared wire types and stable-JSON helpers for the daily decision/audit
//! substrate: feature store, regime detector, risk-control resolver,
//! attribution ledger, and exit state machine all serialize through these.

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod stable_json;

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// `{ts_utc, ts_ny, date_ny}` triple carried on every ledger record (spec §6).
/// Never store a naive timestamp — everything derives from a single UTC instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NyTimestamp {
    pub ts_utc: String,
    pub ts_ny: String,
    pub date_ny: String,
}

impl NyTimestamp {
    pub fn from_utc(ts: DateTime<Utc>) -> Self {
        let ny = ts.with_timezone(&New_York);
        Self {
            ts_utc: ts.to_rfc3339_opts(SecondsFormat::Secs, false),
            ts_ny: ny.to_rfc3339_opts(SecondsFormat::Secs, false),
            date_ny: ny.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn date_ny(&self) -> &str {
        &self.date_ny
    }
}

/// A single OHLCV bar. `ts` is the bar's *close* timestamp (spec §4.5: a
/// 5-minute bar ending at 09:35:00 is the first bar of the day).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Strip an enum-prefixed token (`"OrderSide.SELL"` -> `"sell"`) and lowercase it.
/// Broker SDKs hand back either bare strings or `Enum.VARIANT` reprs (spec §6,
/// §9 "mixed dict/object access pattern"); this is the single normalization
/// point every internal consumer goes through.
pub fn normalize_enum_token(raw: &str) -> String {
    raw.rsplit('.').next().unwrap_or(raw).trim().to_lowercase()
}

/// `status ∈ {open, accepted, new}` are treated as open (spec §6).
pub fn is_open_status(status: &str) -> bool {
    matches!(status, "open" | "accepted" | "new")
}

/// A broker position, normalized to the well-typed shape (spec §9: "a single
/// normalization adapter at the boundary produces the well-typed record type").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub qty: i64,
    pub avg_entry_price: f64,
    pub current_price: f64,
}

/// A broker order, normalized: `side`/`order_type`/`status` are lowercase,
/// enum-prefix-stripped strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrder {
    pub id: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub status: String,
    pub qty: i64,
    pub stop_price: Option<f64>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl BrokerOrder {
    pub fn is_open(&self) -> bool {
        is_open_status(&self.status)
    }

    pub fn is_sell(&self) -> bool {
        self.side == "sell"
    }

    pub fn is_stop_type(&self) -> bool {
        matches!(self.order_type.as_str(), "stop" | "stop_limit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_enum_prefixed_tokens() {
        assert_eq!(normalize_enum_token("OrderSide.SELL"), "sell");
        assert_eq!(normalize_enum_token("sell"), "sell");
        assert_eq!(normalize_enum_token("OrderStatus.NEW"), "new");
    }

    #[test]
    fn open_status_set_is_exact() {
        assert!(is_open_status("open"));
        assert!(is_open_status("accepted"));
        assert!(is_open_status("new"));
        assert!(!is_open_status("filled"));
        assert!(!is_open_status("canceled"));
    }

    #[test]
    fn ny_timestamp_carries_all_three_fields() {
        let ts = DateTime::parse_from_rfc3339("2024-01-16T20:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);
        let nyt = NyTimestamp::from_utc(ts);
        assert_eq!(nyt.date_ny, "2024-01-16");
        assert!(nyt.ts_utc.ends_with("+00:00"));
        assert!(nyt.ts_ny.contains("-05:00") || nyt.ts_ny.contains("-04:00"));
    }
}
