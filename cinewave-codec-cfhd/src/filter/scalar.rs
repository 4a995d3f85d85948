// Cinewave
// Copyright (c) 2019-2022 The Project Cinewave Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scalar reference implementations of the lifting filter kernels.
//!
//! Horizontal kernels process one row at a time. Vertical kernels are
//! column-parallel: the forward variants consume a six-row window of
//! intermediate rows, the inverse variants a three-row lowpass window plus
//! the current highpass row, producing an even and an odd output row per
//! step.

use cinewave_core::util::clamp::clamp_i16;

use super::{
    even_first, even_interior, even_last, highpass_first, highpass_interior, highpass_last,
    lowpass, odd_first, odd_interior, odd_last, temporal_even, temporal_high, temporal_low,
    temporal_odd,
};

/// The shortest row or column the 2/6 filter can process.
pub const MIN_EXTENT: usize = 6;

/// Forward 1-D filter across one row.
///
/// The input length must be even and at least [`MIN_EXTENT`]; `low` and
/// `high` each receive half the input length.
pub fn forward_horizontal(input: &[i16], low: &mut [i16], high: &mut [i16]) {
    let half = input.len() / 2;
    assert!(input.len() >= MIN_EXTENT && input.len() % 2 == 0);
    assert_eq!(low.len(), half);
    assert_eq!(high.len(), half);

    let s = |i: usize| i32::from(input[i]);

    low[0] = clamp_i16(lowpass(s(0), s(1)));
    high[0] = clamp_i16(highpass_first(s(0), s(1), s(2), s(3), s(4), s(5)));

    for i in 1..half - 1 {
        let x = 2 * i;
        low[i] = clamp_i16(lowpass(s(x), s(x + 1)));
        high[i] = clamp_i16(highpass_interior(
            s(x - 2),
            s(x - 1),
            s(x),
            s(x + 1),
            s(x + 2),
            s(x + 3),
        ));
    }

    let x = 2 * (half - 1);
    low[half - 1] = clamp_i16(lowpass(s(x), s(x + 1)));
    high[half - 1] = clamp_i16(highpass_last(
        s(x - 4),
        s(x - 3),
        s(x - 2),
        s(x - 1),
        s(x),
        s(x + 1),
    ));
}

/// Inverse 1-D filter across one row, interleaving the reconstructed even
/// and odd samples into `output`.
pub fn inverse_horizontal(low: &[i16], high: &[i16], output: &mut [i16]) {
    let half = low.len();
    assert!(half >= MIN_EXTENT / 2);
    assert_eq!(high.len(), half);
    assert_eq!(output.len(), 2 * half);

    let l = |i: usize| i32::from(low[i]);
    let h = |i: usize| i32::from(high[i]);

    output[0] = clamp_i16(even_first(l(0), l(1), l(2), h(0)));
    output[1] = clamp_i16(odd_first(l(0), l(1), l(2), h(0)));

    for i in 1..half - 1 {
        output[2 * i] = clamp_i16(even_interior(l(i - 1), l(i), l(i + 1), h(i)));
        output[2 * i + 1] = clamp_i16(odd_interior(l(i - 1), l(i), l(i + 1), h(i)));
    }

    let i = half - 1;
    output[2 * i] = clamp_i16(even_last(l(i), l(i - 1), l(i - 2), h(i)));
    output[2 * i + 1] = clamp_i16(odd_last(l(i), l(i - 1), l(i - 2), h(i)));
}

/// Forward vertical filter for the first output row. `rows` holds the first
/// six intermediate rows.
pub fn forward_vertical_top(rows: [&[i16]; 6], low: &mut [i16], high: &mut [i16]) {
    for col in 0..low.len() {
        let s: [i32; 6] = window(&rows, col);
        low[col] = clamp_i16(lowpass(s[0], s[1]));
        high[col] = clamp_i16(highpass_first(s[0], s[1], s[2], s[3], s[4], s[5]));
    }
}

/// Forward vertical filter for an interior output row. `rows` holds the six
/// row window `s[2i-2]..s[2i+3]`.
pub fn forward_vertical_interior(rows: [&[i16]; 6], low: &mut [i16], high: &mut [i16]) {
    for col in 0..low.len() {
        let s: [i32; 6] = window(&rows, col);
        low[col] = clamp_i16(lowpass(s[2], s[3]));
        high[col] = clamp_i16(highpass_interior(s[0], s[1], s[2], s[3], s[4], s[5]));
    }
}

/// Forward vertical filter for the last output row. `rows` holds the last
/// six intermediate rows.
pub fn forward_vertical_bottom(rows: [&[i16]; 6], low: &mut [i16], high: &mut [i16]) {
    for col in 0..low.len() {
        let s: [i32; 6] = window(&rows, col);
        low[col] = clamp_i16(lowpass(s[4], s[5]));
        high[col] = clamp_i16(highpass_last(s[0], s[1], s[2], s[3], s[4], s[5]));
    }
}

#[inline(always)]
fn window(rows: &[&[i16]; 6], col: usize) -> [i32; 6] {
    [
        i32::from(rows[0][col]),
        i32::from(rows[1][col]),
        i32::from(rows[2][col]),
        i32::from(rows[3][col]),
        i32::from(rows[4][col]),
        i32::from(rows[5][col]),
    ]
}

/// Inverse vertical filter for the first wavelet row. `l0`, `l1`, `l2` are
/// the first three lowpass rows.
pub fn inverse_vertical_first(
    l0: &[i16],
    l1: &[i16],
    l2: &[i16],
    high: &[i16],
    even: &mut [i16],
    odd: &mut [i16],
) {
    for col in 0..even.len() {
        let (a, b, c) = (i32::from(l0[col]), i32::from(l1[col]), i32::from(l2[col]));
        let h = i32::from(high[col]);
        even[col] = clamp_i16(even_first(a, b, c, h));
        odd[col] = clamp_i16(odd_first(a, b, c, h));
    }
}

/// Inverse vertical filter for an interior wavelet row.
pub fn inverse_vertical_interior(
    prev: &[i16],
    cur: &[i16],
    next: &[i16],
    high: &[i16],
    even: &mut [i16],
    odd: &mut [i16],
) {
    for col in 0..even.len() {
        let (a, b, c) = (i32::from(prev[col]), i32::from(cur[col]), i32::from(next[col]));
        let h = i32::from(high[col]);
        even[col] = clamp_i16(even_interior(a, b, c, h));
        odd[col] = clamp_i16(odd_interior(a, b, c, h));
    }
}

/// Inverse vertical filter for the last wavelet row. `l0` is the last
/// lowpass row, `l1` and `l2` the two rows before it.
pub fn inverse_vertical_last(
    l0: &[i16],
    l1: &[i16],
    l2: &[i16],
    high: &[i16],
    even: &mut [i16],
    odd: &mut [i16],
) {
    for col in 0..even.len() {
        let (a, b, c) = (i32::from(l0[col]), i32::from(l1[col]), i32::from(l2[col]));
        let h = i32::from(high[col]);
        even[col] = clamp_i16(even_last(a, b, c, h));
        odd[col] = clamp_i16(odd_last(a, b, c, h));
    }
}

/// Forward temporal filter between two aligned rows.
pub fn forward_temporal(a: &[i16], b: &[i16], low: &mut [i16], high: &mut [i16]) {
    debug_assert!(a.len() == b.len() && a.len() == low.len() && a.len() == high.len());
    for col in 0..low.len() {
        let (x, y) = (i32::from(a[col]), i32::from(b[col]));
        low[col] = clamp_i16(temporal_low(x, y));
        high[col] = clamp_i16(temporal_high(x, y));
    }
}

/// Inverse temporal filter reconstructing two aligned rows.
pub fn inverse_temporal(low: &[i16], high: &[i16], a: &mut [i16], b: &mut [i16]) {
    debug_assert!(a.len() == b.len() && a.len() == low.len() && a.len() == high.len());
    for col in 0..low.len() {
        let (l, h) = (i32::from(low[col]), i32::from(high[col]));
        a[col] = clamp_i16(temporal_even(l, h));
        b[col] = clamp_i16(temporal_odd(l, h));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(input: &[i16]) -> Vec<i16> {
        let half = input.len() / 2;
        let mut low = vec![0i16; half];
        let mut high = vec![0i16; half];
        forward_horizontal(input, &mut low, &mut high);

        let mut output = vec![0i16; input.len()];
        inverse_horizontal(&low, &high, &mut output);
        output
    }

    #[test]
    fn verify_horizontal_filter_symmetry() {
        // Forward then inverse must reproduce the input exactly when no
        // quantization is applied.
        let ramp: Vec<i16> = (0..32).map(|x| (x * 37 % 256) as i16).collect();
        assert_eq!(round_trip(&ramp), ramp);

        let constant = vec![100i16; 16];
        assert_eq!(round_trip(&constant), constant);

        let mut impulse = vec![0i16; 24];
        impulse[11] = 4096;
        assert_eq!(round_trip(&impulse), impulse);

        let alternating: Vec<i16> = (0..64).map(|x| if x % 2 == 0 { 500 } else { -500 }).collect();
        assert_eq!(round_trip(&alternating), alternating);

        // The minimum width engages only the border taps.
        let short = vec![3i16, -7, 11, 2, -9, 5];
        assert_eq!(round_trip(&short), short);
    }

    #[test]
    fn verify_constant_signal_has_zero_highpass() {
        let constant = vec![100i16; 16];
        let mut low = vec![0i16; 8];
        let mut high = vec![0i16; 8];
        forward_horizontal(&constant, &mut low, &mut high);

        assert!(low.iter().all(|&l| l == 200));
        assert!(high.iter().all(|&h| h == 0));
    }

    #[test]
    fn verify_vertical_matches_horizontal() {
        // Filtering a column through the vertical kernels must agree with
        // filtering the same data as a row.
        let column: Vec<i16> = (0..12).map(|x| (x * x * 3 - 40) as i16).collect();
        let rows: Vec<[i16; 1]> = column.iter().map(|&s| [s]).collect();

        let mut low = vec![0i16; 6];
        let mut high = vec![0i16; 6];

        let row = |i: usize| &rows[i][..];

        let mut l = [0i16; 1];
        let mut h = [0i16; 1];

        forward_vertical_top([row(0), row(1), row(2), row(3), row(4), row(5)], &mut l, &mut h);
        low[0] = l[0];
        high[0] = h[0];

        for i in 1..5 {
            let x = 2 * i;
            forward_vertical_interior(
                [row(x - 2), row(x - 1), row(x), row(x + 1), row(x + 2), row(x + 3)],
                &mut l,
                &mut h,
            );
            low[i] = l[0];
            high[i] = h[0];
        }

        forward_vertical_bottom([row(6), row(7), row(8), row(9), row(10), row(11)], &mut l, &mut h);
        low[5] = l[0];
        high[5] = h[0];

        let mut expect_low = vec![0i16; 6];
        let mut expect_high = vec![0i16; 6];
        forward_horizontal(&column, &mut expect_low, &mut expect_high);

        assert_eq!(low, expect_low);
        assert_eq!(high, expect_high);
    }

    #[test]
    fn verify_temporal_identity() {
        let a: Vec<i16> = (0..16).map(|x| (x * 11) as i16).collect();
        let b = a.clone();

        let mut low = vec![0i16; 16];
        let mut high = vec![0i16; 16];
        forward_temporal(&a, &b, &mut low, &mut high);
        assert!(high.iter().all(|&h| h == 0));

        let mut ra = vec![0i16; 16];
        let mut rb = vec![0i16; 16];
        inverse_temporal(&low, &high, &mut ra, &mut rb);
        assert_eq!(ra, a);
        assert_eq!(rb, b);
    }

    #[test]
    fn verify_temporal_unit_difference() {
        let a = vec![100i16; 8];
        let mut b = a.clone();
        b[3] = 101;

        let mut low = vec![0i16; 8];
        let mut high = vec![0i16; 8];
        forward_temporal(&a, &b, &mut low, &mut high);

        let mut ra = vec![0i16; 8];
        let mut rb = vec![0i16; 8];
        inverse_temporal(&low, &high, &mut ra, &mut rb);
        assert_eq!(ra, a);
        assert_eq!(rb, b);
    }

    #[test]
    fn verify_saturation() {
        // Extreme inputs must saturate rather than wrap.
        let extremes = vec![i16::MAX; 16];
        let mut low = vec![0i16; 8];
        let mut high = vec![0i16; 8];
        forward_horizontal(&extremes, &mut low, &mut high);
        assert!(low.iter().all(|&l| l == i16::MAX));
    }
}
