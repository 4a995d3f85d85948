// Cinewave
// Copyright (c) 2019-2022 The Project Cinewave Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `quantize` module implements the uniform scalar quantizer with a dead
//! zone around zero.
//!
//! The forward quantizer runs inside the filter's inner loop, so the divide
//! is carried out as a reciprocal multiply: `m' = (m + midpoint) * ((1 << 16)
//! / q) >> 16` with `midpoint = max(q/2 - 1, 0)`. The inverse is a lazy
//! multiply applied when a band is consumed; bands are never rewritten on
//! decode.

use cinewave_core::util::clamp::clamp_i16;

/// A quantizer for one highpass band.
///
/// The divisor is folded into a reciprocal multiplier at construction so the
/// per-coefficient cost is a multiply and a shift.
#[derive(Clone, Copy, Debug)]
pub struct Quantizer {
    divisor: i32,
    multiplier: i32,
    midpoint: i32,
}

impl Quantizer {
    /// Instantiate a quantizer for a positive divisor.
    pub fn new(divisor: i32) -> Quantizer {
        assert!(divisor > 0, "quantization divisor must be positive");

        let multiplier = (1 << 16) / divisor;
        let midpoint = ((divisor >> 1) - 1).max(0);

        Quantizer { divisor, multiplier, midpoint }
    }

    pub fn divisor(&self) -> i32 {
        self.divisor
    }

    /// Quantize a single coefficient. Zero magnitude stays zero and the sign
    /// is preserved.
    #[inline]
    pub fn quantize(&self, value: i32) -> i16 {
        // The product needs 33 bits for the extreme magnitude at divisor one.
        let magnitude = ((i64::from(value.abs()) + i64::from(self.midpoint))
            * i64::from(self.multiplier))
            >> 16;
        let signed = if value < 0 { -magnitude } else { magnitude };
        clamp_i16(signed.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
    }

    /// Quantize a row of coefficients in place.
    pub fn quantize_row(&self, row: &mut [i16]) {
        if self.divisor == 1 {
            return;
        }
        for value in row.iter_mut() {
            *value = self.quantize(i32::from(*value));
        }
    }
}

/// Invert the quantization of a single coefficient.
#[inline]
pub fn dequantize(value: i16, divisor: i32) -> i32 {
    i32::from(value) * divisor
}

/// Invert the quantization of a row into a destination buffer, saturating to
/// the signed 16-bit coefficient range.
pub fn dequantize_row(src: &[i16], divisor: i32, dst: &mut [i16]) {
    debug_assert_eq!(src.len(), dst.len());
    if divisor == 1 {
        dst.copy_from_slice(src);
        return;
    }
    for (d, &s) in dst.iter_mut().zip(src.iter()) {
        *d = clamp_i16(dequantize(s, divisor));
    }
}

/// Length of the nonlinear companding table: magnitudes 0..=1024.
pub const COMPANDING_TABLE_LEN: usize = 1025;

/// The nonlinear companding curve used by the demo quantizer.
///
/// Small magnitudes map through `f(i) = i + 3*i^3 / 65536`; the table inverts
/// that curve so quantized magnitudes compress toward zero. Production code
/// leaves this path disabled: the quantization field alone determines the
/// transform.
pub struct CompandingTable {
    forward: [i16; COMPANDING_TABLE_LEN],
    inverse: [i16; 1024],
}

impl Default for CompandingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CompandingTable {
    pub fn new() -> CompandingTable {
        let mut forward = [0i16; COMPANDING_TABLE_LEN];

        for i in 0..256i32 {
            let mag = i + (i * i * i * 3) / (256 * 256);
            if (mag as usize) < COMPANDING_TABLE_LEN {
                forward[mag as usize] = i as i16;
            }
        }

        // Fill the gaps left by the expanding curve with the last mapped
        // magnitude so the table is monotonic.
        let mut last = 0i16;
        for entry in forward.iter_mut() {
            if *entry != 0 {
                last = *entry;
            }
            else {
                *entry = last;
            }
        }
        forward[0] = 0;
        forward[1024] = 256;

        let mut inverse = [0i16; 1024];
        for (mag, &code) in forward.iter().enumerate().take(1024) {
            inverse[code as usize] = mag as i16;
        }

        CompandingTable { forward, inverse }
    }

    /// Compand a quantized magnitude. Values beyond the table saturate.
    #[inline]
    pub fn compand(&self, value: i16) -> i16 {
        let magnitude = (value.unsigned_abs() as usize).min(1024);
        let code = self.forward[magnitude];
        if value < 0 {
            -code
        }
        else {
            code
        }
    }

    /// Expand a companded value back to its quantized magnitude.
    #[inline]
    pub fn expand(&self, value: i16) -> i16 {
        let code = (value.unsigned_abs() as usize).min(1023);
        let magnitude = self.inverse[code];
        if value < 0 {
            -magnitude
        }
        else {
            magnitude
        }
    }
}

/// Rewrite a quantized highpass row in place as an interleaved stream of zero
/// runs and values, returning the packed length in samples.
///
/// Run words keep the low bit clear and carry the run length shifted left by
/// one; value words set the low bit and carry the value shifted left by one.
/// When the packed form is shorter than the raw row a zero word terminates
/// the stream. Rows that do not compress keep their full width.
///
/// Coefficients must fit in 15 bits after quantization, which every divisor
/// of two or more guarantees.
pub fn pack_runs(row: &mut [i16]) -> usize {
    let width = row.len();
    let mut index = 0;
    let mut count = 0usize;
    let mut out = 0;

    while index < width {
        while index < width && row[index] == 0 {
            count += 1;
            index += 1;
        }

        if index < width {
            let value = row[index];
            debug_assert!((-16384..16384).contains(&value));

            // A run of zeros precedes this value?
            if count > 0 {
                row[out] = (count << 1) as i16;
                out += 1;
                count = 0;
            }

            row[out] = (value << 1) | 1;
            out += 1;
            index += 1;
        }
        else {
            // The run at the end of the line.
            row[out] = (count << 1) as i16;
            out += 1;
        }
    }

    // If the line has been shortened, terminate with zero.
    if out < width {
        row[out] = 0;
        out += 1;
    }

    out
}

/// Expand a packed run/value row into `dst`, whose length is the raw row
/// width.
pub fn unpack_runs(src: &[i16], dst: &mut [i16]) {
    let width = dst.len();
    let mut out = 0;
    let mut index = 0;

    while out < width && index < src.len() {
        let word = src[index];
        index += 1;

        if word & 1 != 0 {
            dst[out] = word >> 1;
            out += 1;
        }
        else {
            let count = (word >> 1) as usize;
            if count == 0 {
                // Terminator: the remainder of the row is zero.
                break;
            }
            let stop = (out + count).min(width);
            dst[out..stop].fill(0);
            out = stop;
        }
    }

    dst[out..].fill(0);
}
