// Cinewave
// Copyright (c) 2019-2022 The Project Cinewave Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Standalone one-dimensional wavelet drivers.
//!
//! These apply a single 2/6 filter pass along one axis of a band, producing
//! the two-band horizontal and vertical wavelet shapes. The pyramid drivers
//! compose their levels from the 2-D transforms instead; these entry points
//! serve callers that build custom decompositions one axis at a time.

use cinewave_core::errors::{unexpected_error, Result};

use crate::image::{WaveletImage, WaveletShape};
use crate::quantize::Quantizer;

use super::{scalar, vector};

/// Forward 1-D transform across the rows of a band, producing a horizontal
/// wavelet half as wide as the input.
///
/// The lowpass band is never quantized; the highpass band uses `quant`.
pub fn forward_horizontal_image(
    input: &WaveletImage,
    band: usize,
    output: &mut WaveletImage,
    quant: i32,
) -> Result<()> {
    if output.shape() != WaveletShape::Horizontal {
        return unexpected_error("output is not a horizontal wavelet");
    }
    if output.width() != input.width() / 2 || output.height() != input.height() {
        return unexpected_error("horizontal wavelet dimensions do not match the input band");
    }
    if input.width() < scalar::MIN_EXTENT || input.width() % 2 != 0 {
        return unexpected_error("input band is too narrow to filter");
    }

    let quantizer = Quantizer::new(quant);

    for row in 0..output.height() {
        let src = input.band_row(band, row);
        let (low, high) = output.band_row_pair_mut((0, row), (1, row));
        scalar::forward_horizontal(src, low, high);
        quantizer.quantize_row(high);
    }

    output.set_quantization(1, quant);
    Ok(())
}

/// Invert a horizontal wavelet into a full-width band.
pub fn inverse_horizontal_image(
    input: &WaveletImage,
    output: &mut WaveletImage,
    band: usize,
) -> Result<()> {
    if input.shape() != WaveletShape::Horizontal {
        return unexpected_error("input is not a horizontal wavelet");
    }
    if output.width() != 2 * input.width() || output.height() != input.height() {
        return unexpected_error("output band dimensions do not match the wavelet");
    }

    let quant = input.quantization(1);
    let mut high = vec![0i16; input.width()];

    for row in 0..input.height() {
        crate::quantize::dequantize_row(input.band_row(1, row), quant, &mut high);
        scalar::inverse_horizontal(input.band_row(0, row), &high, output.band_row_mut(band, row));
    }
    Ok(())
}

/// Forward 1-D transform down the columns of a band, producing a vertical
/// wavelet half as tall as the input.
pub fn forward_vertical_image(
    input: &WaveletImage,
    band: usize,
    output: &mut WaveletImage,
    quant: i32,
) -> Result<()> {
    if output.shape() != WaveletShape::Vertical {
        return unexpected_error("output is not a vertical wavelet");
    }
    if output.width() != input.width() || output.height() != input.height() / 2 {
        return unexpected_error("vertical wavelet dimensions do not match the input band");
    }
    if input.height() < scalar::MIN_EXTENT || input.height() % 2 != 0 {
        return unexpected_error("input band is too short to filter");
    }

    let quantizer = Quantizer::new(quant);
    let rows = output.height();

    let window = |first: usize| {
        [
            input.band_row(band, first),
            input.band_row(band, first + 1),
            input.band_row(band, first + 2),
            input.band_row(band, first + 3),
            input.band_row(band, first + 4),
            input.band_row(band, first + 5),
        ]
    };

    {
        let (low, high) = output.band_row_pair_mut((0, 0), (1, 0));
        scalar::forward_vertical_top(window(0), low, high);
    }
    for row in 1..rows - 1 {
        let (low, high) = output.band_row_pair_mut((0, row), (1, row));
        vector::forward_vertical_interior(window(2 * row - 2), low, high);
    }
    {
        let (low, high) = output.band_row_pair_mut((0, rows - 1), (1, rows - 1));
        scalar::forward_vertical_bottom(window(2 * rows - 6), low, high);
    }

    for row in 0..rows {
        quantizer.quantize_row(output.band_row_mut(1, row));
    }

    output.set_quantization(1, quant);
    Ok(())
}

/// Invert a vertical wavelet into a full-height band.
pub fn inverse_vertical_image(
    input: &WaveletImage,
    output: &mut WaveletImage,
    band: usize,
) -> Result<()> {
    if input.shape() != WaveletShape::Vertical {
        return unexpected_error("input is not a vertical wavelet");
    }
    if output.width() != input.width() || output.height() != 2 * input.height() {
        return unexpected_error("output band dimensions do not match the wavelet");
    }

    let width = input.width();
    let rows = input.height();
    let quant = input.quantization(1);

    let mut high = vec![0i16; width];
    let mut even = vec![0i16; width];
    let mut odd = vec![0i16; width];

    for row in 0..rows {
        crate::quantize::dequantize_row(input.band_row(1, row), quant, &mut high);

        let low = |r: usize| input.band_row(0, r);
        if row == 0 {
            scalar::inverse_vertical_first(low(0), low(1), low(2), &high, &mut even, &mut odd);
        }
        else if row + 1 < rows {
            vector::inverse_vertical_interior(
                low(row - 1),
                low(row),
                low(row + 1),
                &high,
                &mut even,
                &mut odd,
            );
        }
        else {
            scalar::inverse_vertical_last(
                low(row),
                low(row - 1),
                low(row - 2),
                &high,
                &mut even,
                &mut odd,
            );
        }

        output.band_row_mut(band, 2 * row).copy_from_slice(&even);
        output.band_row_mut(band, 2 * row + 1).copy_from_slice(&odd);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::WaveletShape;

    fn source(width: usize, height: usize, fill: impl Fn(usize, usize) -> i16) -> WaveletImage {
        let mut image = WaveletImage::quad(WaveletShape::Image, 0, width, height).unwrap();
        for row in 0..height {
            for (col, value) in image.band_row_mut(0, row).iter_mut().enumerate() {
                *value = fill(col, row);
            }
        }
        image
    }

    #[test]
    fn verify_horizontal_image_round_trip() {
        let input = source(24, 5, |x, y| ((x * 13 + y * 7) % 211) as i16 - 90);

        let mut wavelet = WaveletImage::quad(WaveletShape::Horizontal, 1, 12, 5).unwrap();
        forward_horizontal_image(&input, 0, &mut wavelet, 1).unwrap();

        let mut restored = WaveletImage::quad(WaveletShape::Image, 0, 24, 5).unwrap();
        inverse_horizontal_image(&wavelet, &mut restored, 0).unwrap();

        for row in 0..5 {
            assert_eq!(restored.band_row(0, row), input.band_row(0, row), "row {}", row);
        }
    }

    #[test]
    fn verify_vertical_image_round_trip() {
        let input = source(10, 16, |x, y| ((x * 3 + y * 17) % 199) as i16 - 60);

        let mut wavelet = WaveletImage::quad(WaveletShape::Vertical, 1, 10, 8).unwrap();
        forward_vertical_image(&input, 0, &mut wavelet, 1).unwrap();

        let mut restored = WaveletImage::quad(WaveletShape::Image, 0, 10, 16).unwrap();
        inverse_vertical_image(&wavelet, &mut restored, 0).unwrap();

        for row in 0..16 {
            assert_eq!(restored.band_row(0, row), input.band_row(0, row), "row {}", row);
        }
    }

    #[test]
    fn verify_quantized_horizontal_error_bound() {
        let quant = 12;
        let input = source(32, 4, |x, y| ((x * 29 + y * 31) % 1024) as i16);

        let mut wavelet = WaveletImage::quad(WaveletShape::Horizontal, 1, 16, 4).unwrap();
        forward_horizontal_image(&input, 0, &mut wavelet, quant).unwrap();
        assert_eq!(wavelet.quantization(1), quant);

        let mut restored = WaveletImage::quad(WaveletShape::Image, 0, 32, 4).unwrap();
        inverse_horizontal_image(&wavelet, &mut restored, 0).unwrap();

        for row in 0..4 {
            for col in 0..32 {
                let expect = i32::from(input.band_row(0, row)[col]);
                let value = i32::from(restored.band_row(0, row)[col]);
                assert!((value - expect).abs() <= quant, "({}, {})", col, row);
            }
        }
    }

    #[test]
    fn verify_shape_checked() {
        let input = source(16, 8, |_, _| 1);
        let mut wrong = WaveletImage::quad(WaveletShape::Vertical, 1, 8, 8).unwrap();
        assert!(forward_horizontal_image(&input, 0, &mut wrong, 1).is_err());
    }
}
