// Cinewave
// Copyright (c) 2019-2022 The Project Cinewave Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `filter` module implements the 2/6 biorthogonal lifting filter pair
//! used throughout the codec.
//!
//! The one-dimensional taps live here as inlined primitives shared by the
//! [`scalar`] reference kernels and the [`vector`] accelerated kernels; the
//! [`spatial`] module composes the kernels into the 2-D forward and inverse
//! transforms. The scalar implementation is the conformance reference for
//! every other path.
//!
//! All filters compute in 32-bit intermediates and saturate to the signed
//! 16-bit coefficient range on store.

pub mod oned;
pub mod scalar;
pub mod spatial;
pub mod vector;

/// Rounding added before the highpass shift.
pub(crate) const ROUNDING: i32 = 4;

/// Forward lowpass: the two-point sum.
#[inline(always)]
pub(crate) fn lowpass(s0: i32, s1: i32) -> i32 {
    s0 + s1
}

/// Forward highpass for an interior pair.
///
/// `s0..s5` are the six consecutive samples centered on the pair being
/// filtered: `s0 = s[2i-2]` through `s5 = s[2i+3]`.
#[inline(always)]
pub(crate) fn highpass_interior(s0: i32, s1: i32, s2: i32, s3: i32, s4: i32, s5: i32) -> i32 {
    ((-s0 - s1 + s4 + s5 + ROUNDING) >> 3) + s2 - s3
}

/// Forward highpass for the first pair, using the 5/11/4/1 border taps over
/// the first six samples.
#[inline(always)]
pub(crate) fn highpass_first(s0: i32, s1: i32, s2: i32, s3: i32, s4: i32, s5: i32) -> i32 {
    (5 * s0 - 11 * s1 + 4 * s2 + 4 * s3 - s4 - s5 + ROUNDING) >> 3
}

/// Forward highpass for the last pair, using the mirrored border taps over
/// the last six samples (`s0 = s[2n-6]` through `s5 = s[2n-1]`).
#[inline(always)]
pub(crate) fn highpass_last(s0: i32, s1: i32, s2: i32, s3: i32, s4: i32, s5: i32) -> i32 {
    (11 * s4 - 5 * s5 - 4 * s3 - 4 * s2 + s1 + s0 + ROUNDING) >> 3
}

/// Inverse reconstruction of an interior even sample from the lowpass window
/// and the highpass coefficient.
#[inline(always)]
pub(crate) fn even_interior(prev: i32, cur: i32, next: i32, high: i32) -> i32 {
    (((prev - next + ROUNDING) >> 3) + cur + high) >> 1
}

/// Inverse reconstruction of an interior odd sample. The sign of the
/// highpass correction is flipped relative to the even case.
#[inline(always)]
pub(crate) fn odd_interior(prev: i32, cur: i32, next: i32, high: i32) -> i32 {
    (((next - prev + ROUNDING) >> 3) + cur - high) >> 1
}

/// Inverse reconstruction of the first even sample.
#[inline(always)]
pub(crate) fn even_first(l0: i32, l1: i32, l2: i32, high: i32) -> i32 {
    (((11 * l0 - 4 * l1 + l2 + ROUNDING) >> 3) + high) >> 1
}

/// Inverse reconstruction of the first odd sample.
#[inline(always)]
pub(crate) fn odd_first(l0: i32, l1: i32, l2: i32, high: i32) -> i32 {
    (((5 * l0 + 4 * l1 - l2 + ROUNDING) >> 3) - high) >> 1
}

/// Inverse reconstruction of the last even sample (`l0` is the last lowpass
/// coefficient, `l1` and `l2` the two before it).
#[inline(always)]
pub(crate) fn even_last(l0: i32, l1: i32, l2: i32, high: i32) -> i32 {
    (((5 * l0 + 4 * l1 - l2 + ROUNDING) >> 3) + high) >> 1
}

/// Inverse reconstruction of the last odd sample.
#[inline(always)]
pub(crate) fn odd_last(l0: i32, l1: i32, l2: i32, high: i32) -> i32 {
    (((11 * l0 - 4 * l1 + l2 + ROUNDING) >> 3) - high) >> 1
}

/// Forward temporal lowpass between two aligned samples.
#[inline(always)]
pub(crate) fn temporal_low(a: i32, b: i32) -> i32 {
    a + b
}

/// Forward temporal highpass between two aligned samples.
#[inline(always)]
pub(crate) fn temporal_high(a: i32, b: i32) -> i32 {
    a - b
}

/// Inverse temporal reconstruction of the first sample.
#[inline(always)]
pub(crate) fn temporal_even(low: i32, high: i32) -> i32 {
    (low + high) >> 1
}

/// Inverse temporal reconstruction of the second sample.
#[inline(always)]
pub(crate) fn temporal_odd(low: i32, high: i32) -> i32 {
    (low - high) >> 1
}
