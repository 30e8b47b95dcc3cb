// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! TAI clock access and edit-rate math.
//!
//! MXL addresses media by integer *indices* on an edit-rate clock: index `i`
//! at rate `num/den` corresponds to the TAI timestamp
//! `round(i * 1e9 * den / num)` nanoseconds since the SMPTE ST 2059 epoch
//! (1970-01-01 00:00:00 TAI, no leap-second adjustment). All conversions in
//! this module round half-up at the nanosecond so that
//! [`timestamp_to_index`] and [`index_to_timestamp`] round-trip exactly for
//! every in-range index.
//!
//! Invalid inputs are reported with the [`UNDEFINED_INDEX`] sentinel rather
//! than an error type; these functions sit underneath the shared-memory
//! format, where the sentinel is the wire representation of "no value".

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sentinel for "no index / no timestamp". Shared by every index- and
/// timestamp-valued API in the crate and stored as-is in shared memory.
pub const UNDEFINED_INDEX: u64 = u64::MAX;

/// Upper bound on timestamps and indices accepted as inputs. Keeping inputs
/// below half the 64-bit range keeps every 128-bit intermediate positive and
/// far from overflow.
const MAX_REASONABLE_VALUE: u64 = u64::MAX / 2;

/// Edit-rate components outside `[1, 10^9]` are rejected.
const MAX_RATE_COMPONENT: u32 = 1_000_000_000;

/// TAI runs ahead of UTC by a fixed offset on hosts without a native TAI
/// clock (37 s since the 2017 leap second).
#[cfg(not(target_os = "linux"))]
const TAI_UTC_OFFSET_NS: u64 = 37 * 1_000_000_000;

/// An edit rate (or sample rate) expressed as a rational number of units per
/// second, e.g. `60000/1001` for 59.94 fps video or `48000/1` for 48 kHz
/// audio.
///
/// `repr(C)`: rationals are embedded in the shared-memory flow headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct Rational {
    /// Rate numerator.
    pub numerator: u32,
    /// Rate denominator. Defaults to 1 when omitted in JSON flow
    /// definitions (`"grain_rate": {"numerator": 50}` means 50/1).
    #[serde(default = "denominator_one")]
    pub denominator: u32,
}

fn denominator_one() -> u32 {
    1
}

impl Rational {
    /// Creates a rational rate from numerator and denominator.
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Returns `true` if both components are within `[1, 10^9]`.
    ///
    /// Rates outside this range either denote "no rate" (zero components) or
    /// would push the 128-bit conversion intermediates toward overflow.
    pub fn is_valid_edit_rate(&self) -> bool {
        self.numerator >= 1
            && self.denominator >= 1
            && self.numerator <= MAX_RATE_COMPONENT
            && self.denominator <= MAX_RATE_COMPONENT
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Returns `true` for timestamp or index inputs that are safe to convert.
pub(crate) fn is_valid_value(value: u64) -> bool {
    value != UNDEFINED_INDEX && value <= MAX_REASONABLE_VALUE
}

/// Clamps a 128-bit conversion result back into the valid 64-bit range.
fn narrow_result(value: u128) -> u64 {
    if value > MAX_REASONABLE_VALUE as u128 {
        UNDEFINED_INDEX
    } else {
        value as u64
    }
}

/// Returns the current TAI time in nanoseconds since the epoch.
///
/// On Linux this reads `CLOCK_TAI` directly; the kernel applies the
/// TAI-UTC offset configured by timekeeping (NTP/PTP). On other hosts the
/// UTC system clock plus a fixed offset approximates TAI. Returns `0` if
/// the clock cannot be read, never an arbitrary value.
pub fn get_time() -> u64 {
    let now = read_tai_clock();
    if now > MAX_REASONABLE_VALUE { 0 } else { now }
}

#[cfg(target_os = "linux")]
fn read_tai_clock() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_TAI, &mut ts) };
    if rc != 0 || ts.tv_sec < 0 {
        return 0;
    }
    (ts.tv_sec as u64)
        .saturating_mul(1_000_000_000)
        .saturating_add(ts.tv_nsec as u64)
}

#[cfg(not(target_os = "linux"))]
fn read_tai_clock() -> u64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(elapsed) => (elapsed.as_nanos() as u64).saturating_add(TAI_UTC_OFFSET_NS),
        Err(_) => 0,
    }
}

/// Converts a TAI timestamp to the index current at that instant.
///
/// Computes `(ts * num + den * 5e8) / (den * 1e9)` in 128-bit arithmetic,
/// rounding half-up at the nanosecond. This is the exact inverse of
/// [`index_to_timestamp`] for every in-range index.
///
/// Returns [`UNDEFINED_INDEX`] if the rate is invalid or the timestamp is
/// out of range.
pub fn timestamp_to_index(rate: &Rational, timestamp: u64) -> u64 {
    if !rate.is_valid_edit_rate() || !is_valid_value(timestamp) {
        return UNDEFINED_INDEX;
    }

    let numerator = timestamp as u128 * rate.numerator as u128;
    let rounding = 500_000_000u128 * rate.denominator as u128;
    let denominator = 1_000_000_000u128 * rate.denominator as u128;

    narrow_result((numerator + rounding) / denominator)
}

/// Converts an index to the TAI timestamp at which it becomes current.
///
/// Computes `(i * den * 1e9 + num / 2) / num` in 128-bit arithmetic.
///
/// Returns [`UNDEFINED_INDEX`] if the rate is invalid or the index is out
/// of range.
pub fn index_to_timestamp(rate: &Rational, index: u64) -> u64 {
    if !rate.is_valid_edit_rate() || !is_valid_value(index) {
        return UNDEFINED_INDEX;
    }

    let numerator = index as u128 * rate.denominator as u128 * 1_000_000_000u128;
    let rounding = (rate.numerator / 2) as u128;
    let denominator = rate.numerator as u128;

    narrow_result((numerator + rounding) / denominator)
}

/// Returns the index current at this instant for the given rate, or
/// [`UNDEFINED_INDEX`] if the rate is invalid or the clock failed.
pub fn current_index(rate: &Rational) -> u64 {
    if !rate.is_valid_edit_rate() {
        return UNDEFINED_INDEX;
    }
    let now = get_time();
    if now == 0 {
        return UNDEFINED_INDEX;
    }
    timestamp_to_index(rate, now)
}

/// Returns the number of nanoseconds until `index` becomes current, or `0`
/// if it already is (or lies in the past).
///
/// Returns [`UNDEFINED_INDEX`] if the rate or index is invalid or the clock
/// failed.
pub fn ns_until_index(index: u64, rate: &Rational) -> u64 {
    if !rate.is_valid_edit_rate() || !is_valid_value(index) {
        return UNDEFINED_INDEX;
    }

    let target = index_to_timestamp(rate, index);
    if target == UNDEFINED_INDEX {
        return UNDEFINED_INDEX;
    }

    let now = get_time();
    if now == 0 {
        return UNDEFINED_INDEX;
    }

    target.saturating_sub(now)
}

/// Sleeps for the given duration. Best effort; a zero duration returns
/// immediately and oversleeping by scheduler jitter is expected.
pub fn sleep_for(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    std::thread::sleep(duration);
}
