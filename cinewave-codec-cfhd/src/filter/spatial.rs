// Cinewave
// Copyright (c) 2019-2022 The Project Cinewave Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-dimensional composition of the lifting kernels.
//!
//! The forward spatial transform applies the horizontal filter across every
//! input row, keeping exactly six horizontal-result rows in a ring so the
//! three-wide vertical window can advance two input rows per output pair,
//! with an explicit top-border seed and bottom-border flush. Quantization of
//! the three highpass bands happens on the freshly written rows, inside the
//! same pass.
//!
//! The frame transform used at level 1 composes the temporal filter down
//! row pairs with the horizontal filter across the columns, streaming two
//! input rows at a time so no full-resolution intermediate exists.

use cinewave_core::errors::{transform_memory_error, unexpected_error, Result};
use cinewave_core::util::clamp::clamp_i16;

use crate::image::{PixelType, WaveletImage};
use crate::quantize::{dequantize_row, pack_runs, unpack_runs, Quantizer};

use super::{scalar, vector};

/// Carves fixed-length row buffers out of a transform's scratch slab.
struct RowArena<'a> {
    buf: &'a mut [i16],
}

impl<'a> RowArena<'a> {
    fn new(buf: &'a mut [i16]) -> RowArena<'a> {
        RowArena { buf }
    }

    fn take(&mut self, len: usize) -> Result<&'a mut [i16]> {
        if self.buf.len() < len {
            return transform_memory_error("scratch buffer too small for filter rows");
        }
        let buf = std::mem::take(&mut self.buf);
        let (row, rest) = buf.split_at_mut(len);
        self.buf = rest;
        Ok(row)
    }
}

/// Shift a row right by the prescale amount. Lossy on purpose, to bound
/// coefficient growth through the pyramid.
fn prescale_row(src: &[i16], shift: u32, dst: &mut [i16]) {
    for (d, &s) in dst.iter_mut().zip(src.iter()) {
        *d = s >> shift;
    }
}

/// Left-shift a reconstructed row to undo the prescale recorded on the
/// forward pass.
fn unscale_row(row: &mut [i16], shift: u32) {
    for value in row.iter_mut() {
        *value = clamp_i16(i32::from(*value) << shift);
    }
}

/// One slot of a ring buffer holding `slots` rows of `width` samples.
fn ring_row(buf: &[i16], width: usize, slots: usize, row: usize) -> &[i16] {
    let start = (row % slots) * width;
    &buf[start..start + width]
}

fn ring_row_mut(buf: &mut [i16], width: usize, slots: usize, row: usize) -> &mut [i16] {
    let start = (row % slots) * width;
    &mut buf[start..start + width]
}

/// The six-row window starting at `first_row`, in input-row order.
fn ring_window(buf: &[i16], width: usize, first_row: usize) -> [&[i16]; 6] {
    let mut rows = [&buf[..0]; 6];
    for (j, slot) in rows.iter_mut().enumerate() {
        *slot = ring_row(buf, width, 6, first_row + j);
    }
    rows
}

/// Load one highpass band row, expanding run packing and inverting the
/// quantization on the way. The band itself is never rewritten.
fn load_band_row(wavelet: &WaveletImage, band: usize, row: usize, dst: &mut [i16]) {
    let src = wavelet.band_row(band, row);
    let quantization = wavelet.quantization(band);

    if wavelet.pixel_type(band) == PixelType::RunsInt16 {
        unpack_runs(src, dst);
        if quantization > 1 {
            for value in dst.iter_mut() {
                *value = clamp_i16(i32::from(*value) * quantization);
            }
        }
    }
    else {
        dequantize_row(src, quantization, dst);
    }
}

/// Quantize one freshly produced highpass row in place, optionally packing
/// zero runs into the band.
fn quantize_band_row(
    wavelet: &mut WaveletImage,
    band: usize,
    row: usize,
    quantizer: &Quantizer,
    pack: bool,
) {
    let data = wavelet.band_row_mut(band, row);
    quantizer.quantize_row(data);
    if pack {
        pack_runs(data);
    }
}

/// Record quantization, pixel types, and the prescale shift on a freshly
/// computed four-band wavelet.
fn record_band_state(wavelet: &mut WaveletImage, quant: &[i32; 4], pack: bool, prescale: u32) {
    for band in 0..wavelet.band_count() {
        wavelet.set_quantization(band, quant[band]);
        let pixel_type = if band > 0 && pack { PixelType::RunsInt16 } else { PixelType::Int16 };
        wavelet.set_pixel_type(band, pixel_type);
    }
    wavelet.set_prescale(prescale);
}

fn make_quantizers(quant: &[i32; 4]) -> [Quantizer; 4] {
    [
        Quantizer::new(quant[0]),
        Quantizer::new(quant[1]),
        Quantizer::new(quant[2]),
        Quantizer::new(quant[3]),
    ]
}

/// Streaming forward frame (horizontal-temporal) transform for one channel.
///
/// The caller feeds pairs of planar input rows; each pair produces one row in
/// all four bands of the level-1 wavelet. Constructed by the transform
/// engine, which owns the wavelet and the scratch the temporal rows live in.
pub struct FrameForward<'a> {
    wavelet: &'a mut WaveletImage,
    quantizers: [Quantizer; 4],
    quant: [i32; 4],
    pack: bool,
    prescale: u32,
    row: usize,
    temporal_low: &'a mut [i16],
    temporal_high: &'a mut [i16],
    staging: &'a mut [i16],
}

impl<'a> FrameForward<'a> {
    pub(crate) fn new(
        wavelet: &'a mut WaveletImage,
        quant: [i32; 4],
        pack: bool,
        prescale: u32,
        scratch: &'a mut [i16],
    ) -> Result<FrameForward<'a>> {
        let input_width = 2 * wavelet.width();

        let mut arena = RowArena::new(scratch);
        let temporal_low = arena.take(input_width)?;
        let temporal_high = arena.take(input_width)?;
        let staging = arena.take(2 * input_width)?;

        Ok(FrameForward {
            wavelet,
            quantizers: make_quantizers(&quant),
            quant,
            pack,
            prescale,
            row: 0,
            temporal_low,
            temporal_high,
            staging,
        })
    }

    /// The number of row pairs this transform consumes.
    pub fn rows(&self) -> usize {
        self.wavelet.height()
    }

    /// Consume one pair of planar input rows, producing one row in each of
    /// the four bands.
    pub fn push_row_pair(&mut self, even: &[i16], odd: &[i16]) -> Result<()> {
        let width = 2 * self.wavelet.width();
        if even.len() != width || odd.len() != width {
            return unexpected_error("frame row length does not match the wavelet");
        }
        if self.row >= self.wavelet.height() {
            return unexpected_error("more frame rows pushed than the wavelet holds");
        }

        if self.prescale > 0 {
            let (a, b) = self.staging.split_at_mut(width);
            prescale_row(even, self.prescale, a);
            prescale_row(odd, self.prescale, b);
            vector::forward_temporal(a, b, self.temporal_low, self.temporal_high);
        }
        else {
            vector::forward_temporal(even, odd, self.temporal_low, self.temporal_high);
        }

        let row = self.row;

        let (ll, lh) = self.wavelet.band_row_pair_mut((0, row), (1, row));
        scalar::forward_horizontal(self.temporal_low, ll, lh);

        let (hl, hh) = self.wavelet.band_row_pair_mut((2, row), (3, row));
        scalar::forward_horizontal(self.temporal_high, hl, hh);

        for band in 1..4 {
            quantize_band_row(self.wavelet, band, row, &self.quantizers[band], self.pack);
        }

        self.row += 1;
        Ok(())
    }

    /// Verify that every row pair arrived and record the band state.
    pub fn finish(self) -> Result<()> {
        if self.row != self.wavelet.height() {
            return unexpected_error("frame transform ended before all rows were pushed");
        }
        record_band_state(self.wavelet, &self.quant, self.pack, self.prescale);
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn load_horizontal(
    input: &WaveletImage,
    band: usize,
    input_row: usize,
    prescale: u32,
    staging: &mut [i16],
    ring_low: &mut [i16],
    ring_high: &mut [i16],
    width: usize,
) {
    let src = input.band_row(band, input_row);
    let low = ring_row_mut(ring_low, width, 6, input_row);
    // The two ring buffers are distinct allocations, so reslicing the high
    // ring here does not alias the low row above.
    let high = ring_row_mut(ring_high, width, 6, input_row);

    if prescale > 0 {
        prescale_row(src, prescale, staging);
        scalar::forward_horizontal(staging, low, high);
    }
    else {
        scalar::forward_horizontal(src, low, high);
    }
}

/// Forward 2-D spatial transform of one band into a four-band wavelet.
///
/// The input band is read with the prescale shift applied on load; the input
/// itself is never modified. The three highpass bands are quantized row by
/// row as they are produced.
#[allow(clippy::too_many_arguments)]
pub fn forward_spatial(
    input: &WaveletImage,
    band: usize,
    output: &mut WaveletImage,
    quant: &[i32; 4],
    pack: bool,
    prescale: u32,
    scratch: &mut [i16],
) -> Result<()> {
    let out_width = output.width();
    let out_height = output.height();

    if input.width() != 2 * out_width || input.height() != 2 * out_height {
        return unexpected_error("spatial wavelet dimensions do not match the input band");
    }
    if out_height < 3 || out_width < 3 {
        return unexpected_error("spatial wavelet is too small to filter");
    }

    let quantizers = make_quantizers(quant);

    let mut arena = RowArena::new(scratch);
    let staging = arena.take(2 * out_width)?;
    let ring_low = arena.take(6 * out_width)?;
    let ring_high = arena.take(6 * out_width)?;

    // Seed the ring with the first six input rows.
    for input_row in 0..6 {
        load_horizontal(input, band, input_row, prescale, staging, ring_low, ring_high, out_width);
    }

    // Top border: the first output row uses the first six horizontal results.
    {
        let (ll, hl) = output.band_row_pair_mut((0, 0), (2, 0));
        scalar::forward_vertical_top(ring_window(ring_low, out_width, 0), ll, hl);
        let (lh, hh) = output.band_row_pair_mut((1, 0), (3, 0));
        scalar::forward_vertical_top(ring_window(ring_high, out_width, 0), lh, hh);
    }

    for out_row in 1..out_height - 1 {
        // Advance the ring two input rows per output pair.
        if out_row >= 2 {
            let next = 2 * out_row + 2;
            load_horizontal(input, band, next, prescale, staging, ring_low, ring_high, out_width);
            load_horizontal(
                input,
                band,
                next + 1,
                prescale,
                staging,
                ring_low,
                ring_high,
                out_width,
            );
        }

        let first = 2 * out_row - 2;
        let (ll, hl) = output.band_row_pair_mut((0, out_row), (2, out_row));
        vector::forward_vertical_interior(ring_window(ring_low, out_width, first), ll, hl);
        let (lh, hh) = output.band_row_pair_mut((1, out_row), (3, out_row));
        vector::forward_vertical_interior(ring_window(ring_high, out_width, first), lh, hh);

        for band_index in 1..4 {
            quantize_band_row(output, band_index, out_row, &quantizers[band_index], pack);
        }
    }

    // Bottom border: flush with the last six horizontal results.
    {
        let out_row = out_height - 1;
        let first = 2 * out_height - 6;
        let (ll, hl) = output.band_row_pair_mut((0, out_row), (2, out_row));
        scalar::forward_vertical_bottom(ring_window(ring_low, out_width, first), ll, hl);
        let (lh, hh) = output.band_row_pair_mut((1, out_row), (3, out_row));
        scalar::forward_vertical_bottom(ring_window(ring_high, out_width, first), lh, hh);
    }

    // The border rows are quantized after their vertical pass.
    for band_index in 1..4 {
        quantize_band_row(output, band_index, 0, &quantizers[band_index], pack);
        quantize_band_row(output, band_index, out_height - 1, &quantizers[band_index], pack);
    }

    record_band_state(output, quant, pack, prescale);
    Ok(())
}

/// Inverse 2-D spatial transform.
///
/// Emits reconstructed rows of the band below through the `emit` closure,
/// already left-shifted by the prescale this wavelet recorded. Consumption
/// of the wavelet is read-only; quantization is inverted on load.
pub fn inverse_spatial<F>(wavelet: &WaveletImage, scratch: &mut [i16], mut emit: F) -> Result<()>
where
    F: FnMut(usize, &[i16]),
{
    let width = wavelet.width();
    let height = wavelet.height();

    if width < 3 || height < 3 {
        return unexpected_error("spatial wavelet is too small to invert");
    }

    let prescale = wavelet.prescale();

    let mut arena = RowArena::new(scratch);

    // Three dequantized rows of the LH band rotate through this ring.
    let lh_ring = arena.take(3 * width)?;
    let hl_row = arena.take(width)?;
    let hh_row = arena.take(width)?;

    let even_low = arena.take(width)?;
    let odd_low = arena.take(width)?;
    let even_high = arena.take(width)?;
    let odd_high = arena.take(width)?;

    let out_even = arena.take(2 * width)?;
    let out_odd = arena.take(2 * width)?;

    for row in 0..3 {
        load_band_row(wavelet, 1, row, ring_row_mut(lh_ring, width, 3, row));
    }

    for row in 0..height {
        if row >= 2 && row + 1 < height {
            load_band_row(wavelet, 1, row + 1, ring_row_mut(lh_ring, width, 3, row + 1));
        }

        load_band_row(wavelet, 2, row, hl_row);
        load_band_row(wavelet, 3, row, hh_row);

        if row == 0 {
            scalar::inverse_vertical_first(
                wavelet.band_row(0, 0),
                wavelet.band_row(0, 1),
                wavelet.band_row(0, 2),
                hl_row,
                even_low,
                odd_low,
            );
            scalar::inverse_vertical_first(
                ring_row(lh_ring, width, 3, 0),
                ring_row(lh_ring, width, 3, 1),
                ring_row(lh_ring, width, 3, 2),
                hh_row,
                even_high,
                odd_high,
            );
        }
        else if row + 1 < height {
            vector::inverse_vertical_interior(
                wavelet.band_row(0, row - 1),
                wavelet.band_row(0, row),
                wavelet.band_row(0, row + 1),
                hl_row,
                even_low,
                odd_low,
            );
            vector::inverse_vertical_interior(
                ring_row(lh_ring, width, 3, row - 1),
                ring_row(lh_ring, width, 3, row),
                ring_row(lh_ring, width, 3, row + 1),
                hh_row,
                even_high,
                odd_high,
            );
        }
        else {
            scalar::inverse_vertical_last(
                wavelet.band_row(0, row),
                wavelet.band_row(0, row - 1),
                wavelet.band_row(0, row - 2),
                hl_row,
                even_low,
                odd_low,
            );
            scalar::inverse_vertical_last(
                ring_row(lh_ring, width, 3, row),
                ring_row(lh_ring, width, 3, row - 1),
                ring_row(lh_ring, width, 3, row - 2),
                hh_row,
                even_high,
                odd_high,
            );
        }

        scalar::inverse_horizontal(even_low, even_high, out_even);
        scalar::inverse_horizontal(odd_low, odd_high, out_odd);

        if prescale > 0 {
            unscale_row(out_even, prescale);
            unscale_row(out_odd, prescale);
        }

        emit(2 * row, out_even);
        emit(2 * row + 1, out_odd);
    }

    Ok(())
}

/// Inverse frame (horizontal-temporal) transform.
///
/// Emits two reconstructed full-width rows per wavelet row. The emitted
/// samples are signed reconstruction values; the caller clamps them into the
/// destination's display range.
pub fn inverse_frame<F>(wavelet: &WaveletImage, scratch: &mut [i16], mut emit: F) -> Result<()>
where
    F: FnMut(usize, &[i16]),
{
    let width = wavelet.width();
    let height = wavelet.height();
    let full_width = 2 * width;
    let prescale = wavelet.prescale();

    let mut arena = RowArena::new(scratch);
    let lh_row = arena.take(width)?;
    let hl_row = arena.take(width)?;
    let hh_row = arena.take(width)?;
    let temporal_low = arena.take(full_width)?;
    let temporal_high = arena.take(full_width)?;
    let row_even = arena.take(full_width)?;
    let row_odd = arena.take(full_width)?;

    for row in 0..height {
        load_band_row(wavelet, 1, row, lh_row);
        load_band_row(wavelet, 2, row, hl_row);
        load_band_row(wavelet, 3, row, hh_row);

        scalar::inverse_horizontal(wavelet.band_row(0, row), lh_row, temporal_low);
        scalar::inverse_horizontal(hl_row, hh_row, temporal_high);

        vector::inverse_temporal(temporal_low, temporal_high, row_even, row_odd);

        if prescale > 0 {
            unscale_row(row_even, prescale);
            unscale_row(row_odd, prescale);
        }

        emit(2 * row, row_even);
        emit(2 * row + 1, row_odd);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::WaveletShape;

    const LOSSLESS: [i32; 4] = [1, 1, 1, 1];

    fn scratch() -> Vec<i16> {
        vec![0i16; 1 << 16]
    }

    fn source_wavelet(
        width: usize,
        height: usize,
        fill: impl Fn(usize, usize) -> i16,
    ) -> WaveletImage {
        let mut image = WaveletImage::quad(WaveletShape::Image, 0, width, height).unwrap();
        for row in 0..height {
            for (col, value) in image.band_row_mut(0, row).iter_mut().enumerate() {
                *value = fill(col, row);
            }
        }
        image
    }

    #[test]
    fn verify_spatial_round_trip_lossless() {
        let width = 16;
        let height = 12;
        let source = source_wavelet(width, height, |x, y| ((x * 7 + y * 13) % 251) as i16 - 100);

        let mut wavelet =
            WaveletImage::quad(WaveletShape::Spatial, 1, width / 2, height / 2).unwrap();
        let mut buf = scratch();
        forward_spatial(&source, 0, &mut wavelet, &LOSSLESS, false, 0, &mut buf).unwrap();

        let mut restored = vec![vec![0i16; width]; height];
        inverse_spatial(&wavelet, &mut buf, |row, data| {
            restored[row].copy_from_slice(data);
        })
        .unwrap();

        for row in 0..height {
            assert_eq!(&restored[row][..], source.band_row(0, row), "row {}", row);
        }
    }

    #[test]
    fn verify_spatial_dc_input() {
        // A constant input concentrates all energy in LL with gain four.
        let source = source_wavelet(16, 16, |_, _| 100);
        let mut wavelet = WaveletImage::quad(WaveletShape::Spatial, 1, 8, 8).unwrap();
        let mut buf = scratch();
        forward_spatial(&source, 0, &mut wavelet, &LOSSLESS, false, 0, &mut buf).unwrap();

        for row in 0..8 {
            assert!(wavelet.band_row(0, row).iter().all(|&s| s == 400));
            for band in 1..4 {
                assert!(wavelet.band_row(band, row).iter().all(|&s| s == 0));
            }
        }
    }

    #[test]
    fn verify_spatial_round_trip_with_prescale() {
        let width = 16;
        let height = 16;
        // Samples divisible by four survive a two-bit prescale exactly.
        let source = source_wavelet(width, height, |x, y| (((x + y) % 128) * 4) as i16);

        let mut wavelet =
            WaveletImage::quad(WaveletShape::Spatial, 1, width / 2, height / 2).unwrap();
        let mut buf = scratch();
        forward_spatial(&source, 0, &mut wavelet, &LOSSLESS, false, 2, &mut buf).unwrap();

        let mut restored = vec![vec![0i16; width]; height];
        inverse_spatial(&wavelet, &mut buf, |row, data| {
            restored[row].copy_from_slice(data);
        })
        .unwrap();

        for row in 0..height {
            assert_eq!(&restored[row][..], source.band_row(0, row), "row {}", row);
        }
    }

    #[test]
    fn verify_spatial_round_trip_packed_runs() {
        let width = 24;
        let height = 16;
        // A sparse input quantizes to many zero runs.
        let source =
            source_wavelet(width, height, |x, y| if x == 11 && y == 7 { 3000 } else { 0 });

        let mut wavelet =
            WaveletImage::quad(WaveletShape::Spatial, 1, width / 2, height / 2).unwrap();
        let mut buf = scratch();
        forward_spatial(&source, 0, &mut wavelet, &LOSSLESS, true, 0, &mut buf).unwrap();

        assert_eq!(wavelet.pixel_type(1), PixelType::RunsInt16);
        assert_eq!(wavelet.pixel_type(0), PixelType::Int16);

        let mut restored = vec![vec![0i16; width]; height];
        inverse_spatial(&wavelet, &mut buf, |row, data| {
            restored[row].copy_from_slice(data);
        })
        .unwrap();

        for row in 0..height {
            assert_eq!(&restored[row][..], source.band_row(0, row), "row {}", row);
        }
    }

    #[test]
    fn verify_spatial_quantized_error_bound() {
        let width = 32;
        let height = 24;
        let quant = [1, 24, 24, 36];
        let source = source_wavelet(width, height, |x, y| ((x * 31 + y * 17) % 4096) as i16);

        let mut wavelet =
            WaveletImage::quad(WaveletShape::Spatial, 1, width / 2, height / 2).unwrap();
        let mut buf = scratch();
        forward_spatial(&source, 0, &mut wavelet, &quant, false, 0, &mut buf).unwrap();

        let mut restored = vec![vec![0i16; width]; height];
        inverse_spatial(&wavelet, &mut buf, |row, data| {
            restored[row].copy_from_slice(data);
        })
        .unwrap();

        // The reconstruction error stays within a small multiple of the
        // largest divisor.
        let bound = 2 * 36;
        for row in 0..height {
            for (col, &value) in restored[row].iter().enumerate() {
                let expect = i32::from(source.band_row(0, row)[col]);
                assert!(
                    (i32::from(value) - expect).abs() <= bound,
                    "({}, {}): {} vs {}",
                    col,
                    row,
                    value,
                    expect
                );
            }
        }
    }

    #[test]
    fn verify_frame_round_trip() {
        let width = 16;
        let height = 12;
        let frame: Vec<Vec<i16>> = (0..height)
            .map(|y| (0..width).map(|x| ((x * 5 + y * 9) % 200) as i16).collect())
            .collect();

        let mut wavelet =
            WaveletImage::quad(WaveletShape::HorizontalTemporal, 1, width / 2, height / 2)
                .unwrap();
        let mut buf = scratch();

        {
            let mut forward =
                FrameForward::new(&mut wavelet, LOSSLESS, false, 0, &mut buf).unwrap();
            for pair in 0..height / 2 {
                forward.push_row_pair(&frame[2 * pair], &frame[2 * pair + 1]).unwrap();
            }
            forward.finish().unwrap();
        }

        let mut restored = vec![vec![0i16; width]; height];
        inverse_frame(&wavelet, &mut buf, |row, data| {
            restored[row].copy_from_slice(data);
        })
        .unwrap();

        for row in 0..height {
            assert_eq!(restored[row], frame[row], "row {}", row);
        }
    }
}
