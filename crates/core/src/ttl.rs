//! TTL parsing and expiry helpers.
//!
//! A TTL is either a raw millisecond count or a string of the form
//! `⟨number⟩⟨unit⟩` with unit ∈ {ms, s, m, h, d}. Anything else fails with
//! [`EngineError::InvalidTtl`] at insert time. Expiry is stored on the
//! document as an absolute epoch-ms timestamp under `_ttl_expires`, with
//! the original form kept under `_ttl_duration` for observability.

use crate::error::EngineError;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A TTL as supplied by the caller: numeric milliseconds or a duration string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TtlSpec {
    /// Duration in milliseconds.
    Millis(u64),
    /// Human-readable duration, e.g. `"50ms"`, `"2s"`, `"5m"`, `"12h"`, `"7d"`.
    Text(String),
}

impl TtlSpec {
    /// The original human-readable form, for the `_ttl_duration` key.
    pub fn display_form(&self) -> String {
        match self {
            TtlSpec::Millis(ms) => format!("{ms}ms"),
            TtlSpec::Text(s) => s.clone(),
        }
    }
}

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse a TTL into a duration in milliseconds.
pub fn parse_ttl(spec: &TtlSpec) -> Result<i64, EngineError> {
    match spec {
        TtlSpec::Millis(ms) => Ok(*ms as i64),
        TtlSpec::Text(s) => parse_ttl_text(s),
    }
}

fn parse_ttl_text(s: &str) -> Result<i64, EngineError> {
    let s = s.trim();
    let digits_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(digits_end);

    let value: i64 = number
        .parse()
        .map_err(|_| EngineError::InvalidTtl(format!("'{s}' has no leading number")))?;

    let multiplier = match unit {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "" => return Err(EngineError::InvalidTtl(format!("'{s}' is missing a unit"))),
        other => {
            return Err(EngineError::InvalidTtl(format!(
                "'{s}' has unrecognized unit '{other}'"
            )))
        }
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| EngineError::InvalidTtl(format!("'{s}' overflows")))
}
