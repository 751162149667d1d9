// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Session billing
//!
//! Elapsed time is billed in half-hour increments, always rounded up:
//! `cost = ceil(minutes / 30) * (hourly_rate / 2)`. Partial minutes count
//! toward the elapsed time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;

/// Length of one billable increment
pub const BILLING_INCREMENT_MINUTES: i64 = 30;

const INCREMENT_SECONDS: i64 = BILLING_INCREMENT_MINUTES * 60;

/// Number of started half-hours between `start` and `end`.
///
/// Returns 0 when `end` is not after `start`.
pub fn billable_increments(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let elapsed = end - start;
    // Sub-second remainders still start a new second.
    let mut seconds = elapsed.num_seconds();
    if elapsed > chrono::Duration::seconds(seconds) {
        seconds += 1;
    }
    if seconds <= 0 {
        return 0;
    }
    (seconds + INCREMENT_SECONDS - 1) / INCREMENT_SECONDS
}

/// Cost of a session from `start` to `end` at `hourly_rate`.
///
/// A zero or negative elapsed time (clock skew between hosts) bills nothing
/// and is logged as an anomaly.
pub fn session_cost(start: DateTime<Utc>, end: DateTime<Utc>, hourly_rate: Decimal) -> Decimal {
    if end <= start {
        warn!(
            start = %start,
            end = %end,
            "Session ended at or before its start; billing zero"
        );
        return Decimal::ZERO;
    }

    let increments = billable_increments(start, end);
    let half_hour_rate = hourly_rate / Decimal::TWO;
    (Decimal::from(increments) * half_hour_rate).round_dp(2)
}

/// Whole minutes between `start` and `end`, never negative
pub fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes().max(0)
}
