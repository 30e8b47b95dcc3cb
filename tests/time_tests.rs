// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the TAI clock and edit-rate index math.

use std::time::Duration;

use mxl::UNDEFINED_INDEX;
use mxl::time::{
    current_index, get_time, index_to_timestamp, ns_until_index, sleep_for, timestamp_to_index,
};
use mxl::Rational;

#[test]
fn invalid_rates_are_rejected() {
    let bad_rate = Rational::new(0, 0);
    let bad_numerator = Rational::new(0, 1001);
    let bad_denominator = Rational::new(30000, 0);
    let good_rate = Rational::new(30000, 1001);

    let now = get_time();

    assert_eq!(timestamp_to_index(&bad_rate, now), UNDEFINED_INDEX);
    assert_eq!(timestamp_to_index(&bad_numerator, now), UNDEFINED_INDEX);
    assert_eq!(timestamp_to_index(&bad_denominator, now), UNDEFINED_INDEX);
    assert_ne!(timestamp_to_index(&good_rate, now), UNDEFINED_INDEX);

    assert_eq!(index_to_timestamp(&bad_rate, 0), UNDEFINED_INDEX);
    assert_eq!(current_index(&bad_rate), UNDEFINED_INDEX);
    assert_eq!(current_index(&bad_numerator), UNDEFINED_INDEX);
    assert_eq!(current_index(&bad_denominator), UNDEFINED_INDEX);
}

#[test]
fn rates_beyond_reasonable_bounds_are_rejected() {
    let too_large_numerator = Rational::new(2_000_000_000, 1001);
    let too_large_denominator = Rational::new(30000, 2_000_000_000);

    assert_eq!(current_index(&too_large_numerator), UNDEFINED_INDEX);
    assert_eq!(current_index(&too_large_denominator), UNDEFINED_INDEX);
    assert_eq!(
        index_to_timestamp(&too_large_numerator, 1000),
        UNDEFINED_INDEX
    );
}

#[test]
fn index_zero_and_one_at_29_97() {
    let rate = Rational::new(30000, 1001);

    let first_index_time_ns = 0u64;
    let second_index_time_ns =
        (rate.denominator as u64 * 1_000_000_000 + (rate.numerator as u64 / 2))
            / rate.numerator as u64;
    assert_eq!(second_index_time_ns, 33_366_667);

    assert_eq!(timestamp_to_index(&rate, first_index_time_ns), 0);
    assert_eq!(timestamp_to_index(&rate, second_index_time_ns), 1);

    assert_eq!(index_to_timestamp(&rate, 0), first_index_time_ns);
    assert_eq!(index_to_timestamp(&rate, 1), second_index_time_ns);
}

#[test]
fn current_roundtrip() {
    let rate = Rational::new(30000, 1001);

    let now = get_time();
    let index = current_index(&rate);
    assert_ne!(index, UNDEFINED_INDEX);

    let timestamp = index_to_timestamp(&rate, index);
    let recomputed = timestamp_to_index(&rate, timestamp);

    let delta = now.abs_diff(timestamp);
    assert!(delta < 500_000_000);
    assert_eq!(recomputed, index);
    assert!(ns_until_index(index + 33, &rate) > 0);
}

#[test]
fn roundtrip_for_broadcast_rates() {
    let rates = [
        Rational::new(24000, 1001),
        Rational::new(24, 1),
        Rational::new(25, 1),
        Rational::new(30000, 1001),
        Rational::new(30, 1),
        Rational::new(50, 1),
        Rational::new(60000, 1001),
        Rational::new(60, 1),
        Rational::new(100, 1),
        Rational::new(120, 1),
    ];

    for rate in &rates {
        for index in (0..10).chain(1000..1010) {
            let timestamp = index_to_timestamp(rate, index);
            assert_ne!(timestamp, UNDEFINED_INDEX);
            assert_eq!(timestamp_to_index(rate, timestamp), index, "rate {rate}");
        }
    }
}

#[test]
fn roundtrip_over_sampled_range() {
    // Sampled slice of the exhaustive range the conversion guarantees.
    let rate = Rational::new(30000, 1001);
    for index in 30_000_000u64..30_010_000 {
        let timestamp = index_to_timestamp(&rate, index);
        assert_eq!(timestamp_to_index(&rate, timestamp), index);
    }
}

#[test]
fn timestamp_roundtrip_error_is_below_one_period() {
    let rate = Rational::new(30000, 1001);
    let period = index_to_timestamp(&rate, 1) - index_to_timestamp(&rate, 0);
    for timestamp in (0u64..2_000_000_000).step_by(7_777_777) {
        let index = timestamp_to_index(&rate, timestamp);
        let back = index_to_timestamp(&rate, index);
        assert!(back.abs_diff(timestamp) < period + 1);
    }
}

#[test]
fn frame_durations_accumulate_with_rounding() {
    for rate in [
        Rational::new(30000, 1001),
        Rational::new(25, 1),
        Rational::new(24, 1),
    ] {
        let expected = 1_000_000_000u64 * rate.denominator as u64 / rate.numerator as u64;
        let diff = index_to_timestamp(&rate, 1) - index_to_timestamp(&rate, 0);
        assert!(diff >= expected);
        assert!(diff <= expected + 1);
    }
}

#[test]
fn ns_until_index_behaviour() {
    let rate = Rational::new(30000, 1001);
    let bad_rate = Rational::new(0, 0);

    assert_eq!(ns_until_index(0, &bad_rate), UNDEFINED_INDEX);

    let index = current_index(&rate);
    assert_ne!(index, UNDEFINED_INDEX);

    let frame_duration = 1_000_000_000u64 * rate.denominator as u64 / rate.numerator as u64;

    // The current index is at most one frame away.
    let until_current = ns_until_index(index, &rate);
    assert_ne!(until_current, UNDEFINED_INDEX);
    assert!(until_current < frame_duration);

    // The next index is at most ~one frame ahead, with generous slack for
    // scheduling.
    let until_next = ns_until_index(index + 1, &rate);
    assert_ne!(until_next, UNDEFINED_INDEX);
    assert!(until_next <= frame_duration * 2);

    // A past index has nothing left to wait for.
    assert_eq!(ns_until_index(0, &rate), 0);
}

#[test]
fn get_time_is_monotonic_and_plausible() {
    let time1 = get_time();
    std::thread::sleep(Duration::from_millis(10));
    let time2 = get_time();

    assert!(time2 > time1);
    let diff = time2 - time1;
    assert!(diff >= 10_000_000);
    assert!(diff < 100_000_000);

    // Somewhere between 2020 and 2100.
    let year_2020_ns = 1_577_836_800u64 * 1_000_000_000;
    let year_2100_ns = 4_102_444_800u64 * 1_000_000_000;
    let now = get_time();
    assert!(now > year_2020_ns);
    assert!(now < year_2100_ns);
}

#[test]
fn sleep_for_is_best_effort() {
    let requested = Duration::from_millis(10);

    let before = get_time();
    sleep_for(requested);
    let after = get_time();

    let slept = after - before;
    assert!(slept >= 10_000_000);
    assert!(slept < 60_000_000);

    // Zero duration returns immediately.
    let before = get_time();
    sleep_for(Duration::ZERO);
    let after = get_time();
    assert!(after - before < 1_000_000);
}

#[test]
fn indices_advance_with_the_clock() {
    let rate = Rational::new(30000, 1001);

    let index1 = current_index(&rate);
    std::thread::sleep(Duration::from_millis(50));
    let index2 = current_index(&rate);
    assert!(index2 > index1);

    let now = get_time();
    let index = current_index(&rate);
    let computed = timestamp_to_index(&rate, now);
    assert!(index.abs_diff(computed) <= 2);
}

#[test]
fn overflow_protection() {
    let rate = Rational::new(30000, 1001);

    // Sentinel and beyond-half-range inputs are rejected.
    assert_eq!(timestamp_to_index(&rate, u64::MAX), UNDEFINED_INDEX);
    assert_eq!(
        timestamp_to_index(&rate, u64::MAX / 2 + 1),
        UNDEFINED_INDEX
    );
    assert_eq!(index_to_timestamp(&rate, u64::MAX), UNDEFINED_INDEX);
    assert_eq!(index_to_timestamp(&rate, u64::MAX / 2 + 1), UNDEFINED_INDEX);
    assert_eq!(ns_until_index(u64::MAX, &rate), UNDEFINED_INDEX);
    assert_eq!(ns_until_index(u64::MAX / 2 + 1, &rate), UNDEFINED_INDEX);

    // Large but in-range values convert.
    assert_ne!(index_to_timestamp(&rate, 1_000_000_000), UNDEFINED_INDEX);
    assert_ne!(
        timestamp_to_index(&rate, 1_000_000_000_000_000_000),
        UNDEFINED_INDEX
    );

    // Extreme ratios within bounds still convert.
    let slow = Rational::new(1, 999_999_999);
    let fast = Rational::new(999_999_999, 1);
    assert_ne!(timestamp_to_index(&slow, 1_000_000_000), UNDEFINED_INDEX);
    assert_ne!(timestamp_to_index(&fast, 1_000_000_000), UNDEFINED_INDEX);
    assert_ne!(index_to_timestamp(&fast, 1000), UNDEFINED_INDEX);

    // Equal-component rates round-trip.
    let unity = Rational::new(u32::MAX, u32::MAX);
    assert_eq!(unity.is_valid_edit_rate(), false);
    let near_unity = Rational::new(1_000_000_000, 1_000_000_000);
    let ts = index_to_timestamp(&near_unity, 1000);
    if ts != UNDEFINED_INDEX {
        assert_eq!(timestamp_to_index(&near_unity, ts), 1000);
    }
}
