//! Deterministic operational metadata.
//!
//! Every function here is pure and total: the same inputs give the same output on
//! any machine, and no input makes them fail.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sha1::{Digest, Sha1};

/// 2025-08-10T00:00:00Z, the instant every synthetic timestamp counts back from
pub const BASE_EPOCH_SECS: i64 = 1_754_784_000;

const MINUTES_PER_DAY: u64 = 24 * 60;
const LATENCY_TOKEN_CAP: usize = 300;

pub fn base_instant() -> DateTime<Utc> {
    Utc.timestamp_opt(BASE_EPOCH_SECS, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Minutes to subtract from the base instant for sequence number `i`.
///
/// SHA-1 of `row{i}` read as a big-endian integer, reduced modulo the window
/// length in minutes. A zero-day window has no room and yields 0.
pub fn ts_offset_minutes(i: u64, window_days: u32) -> u64 {
    let modulus = u64::from(window_days) * MINUTES_PER_DAY;
    if modulus == 0 {
        return 0;
    }
    let digest = Sha1::digest(format!("row{i}").as_bytes());
    digest
        .iter()
        .fold(0u64, |acc, byte| (acc * 256 + u64::from(*byte)) % modulus)
}

/// Deterministic timestamp within the last `window_days` before the base instant.
///
/// Offsets reaching past the earliest representable instant saturate to it.
pub fn det_ts(i: u64, window_days: u32) -> String {
    let offset = ts_offset_minutes(i, window_days) as i64;
    let ts = base_instant()
        .checked_sub_signed(Duration::minutes(offset))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Whitespace token count, floored at 1 so empty text still costs something
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count().max(1)
}

pub fn est_latency_ms(text: &str) -> u32 {
    let tokens = token_count(text).min(LATENCY_TOKEN_CAP);
    (120.0 + 3.5 * tokens as f64) as u32
}

/// Cost in cents at 0.03 cents per token.
///
/// Unlike latency, the token count is not capped here.
pub fn est_cost_cents(text: &str) -> u32 {
    let tokens = token_count(text);
    (0.03 * tokens as f64).ceil() as u32
}

/// Round to three decimals the way confidences are reported
pub fn round3(value: f64) -> f64 {
    format!("{value:.3}").parse().unwrap_or(value)
}
