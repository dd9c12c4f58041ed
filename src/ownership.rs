//! Ownership challenges: `{address}:{unix seconds}:starRegistry`.
//!
//! Nothing is stored server side. Freshness is re-derived from the
//! timestamp embedded in the message the wallet signed.

use time::OffsetDateTime;

use crate::error::{ChainError, Result};

/// Trailing tag of every challenge message.
pub const CHALLENGE_TAG: &str = "starRegistry";

/// Seconds a signed challenge stays acceptable after issuance.
pub const CHALLENGE_WINDOW_SECS: i64 = 5 * 60;

/// Current UNIX time in whole seconds.
pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Build the message a wallet must sign to prove control of `address`.
pub fn challenge_message(address: &str, issued_at: i64) -> String {
    format!("{address}:{issued_at}:{CHALLENGE_TAG}")
}

/// Extract the issuance timestamp, the second `:`-separated segment.
///
/// The segment must be an optional `-` followed by ASCII digits only.
pub fn issued_at(message: &str) -> Result<i64> {
    let segment = message
        .split(':')
        .nth(1)
        .ok_or_else(|| ChainError::MalformedChallenge("missing timestamp".into()))?;
    let invalid = || ChainError::MalformedChallenge(format!("invalid timestamp {segment:?}"));
    let digits = segment.strip_prefix('-').unwrap_or(segment);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    segment.parse().map_err(|_| invalid())
}

/// Reject a challenge issued more than [`CHALLENGE_WINDOW_SECS`] before `now`.
///
/// An age that does not fit in an `i64` counts as expired.
pub fn ensure_fresh(message: &str, now: i64) -> Result<i64> {
    let issued_at = issued_at(message)?;
    match now.checked_sub(issued_at) {
        Some(age) if age <= CHALLENGE_WINDOW_SECS => Ok(issued_at),
        _ => Err(ChainError::ChallengeExpired { issued_at, now }),
    }
}
