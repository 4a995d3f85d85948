// Cinewave
// Copyright (c) 2019-2022 The Project Cinewave Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `image` module provides typed storage for wavelet coefficients.
//!
//! Coefficients are 16-bit signed integers arranged as bands within a wavelet
//! image. A wavelet image owns a single slab allocation; each band is a
//! descriptor (offset, width, height, stride) into that slab. Two layouts are
//! supported: the classic interleaved quad layout used by the forward
//! transform, and a stacked layout of vertically adjacent strips for wavelets
//! that are consumed row-at-a-time during the inverse transform.

use cinewave_core::errors::{out_of_memory_error, Result};
use cinewave_core::util::align::{align_up, CACHE_LINE_SIZE, ROW_ALIGN};

/// The maximum number of bands in a wavelet image.
pub const MAX_BANDS: usize = 4;

/// The shape of a wavelet image determines how many bands it carries and what
/// they mean.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveletShape {
    /// A raw plane (one band).
    Image,
    /// A one-level horizontal wavelet: {lowpass, highpass}.
    Horizontal,
    /// A one-level vertical wavelet: {lowpass, highpass}.
    Vertical,
    /// A sum/difference wavelet between two frames: {lowpass, highpass}.
    Temporal,
    /// A full 2-D wavelet: {LL, LH, HL, HH}.
    Spatial,
    /// The frame wavelet: temporal filter down the rows composed with a
    /// horizontal filter across the columns, {LL, LH, HL, HH}.
    HorizontalTemporal,
    /// A vertical filter composed with a temporal filter, {LL, LH, HL, HH}.
    VerticalTemporal,
}

impl WaveletShape {
    /// The number of bands a wavelet of this shape carries.
    pub fn band_count(&self) -> usize {
        match *self {
            WaveletShape::Image => 1,
            WaveletShape::Horizontal => 2,
            WaveletShape::Vertical => 2,
            WaveletShape::Temporal => 2,
            WaveletShape::Spatial => 4,
            WaveletShape::HorizontalTemporal => 4,
            WaveletShape::VerticalTemporal => 4,
        }
    }
}

/// The interpretation of the coefficients stored in one band.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelType {
    /// Unsigned 16-bit samples (reconstructed planes).
    UInt16,
    /// Signed 16-bit coefficients.
    Int16,
    /// Signed 8-bit coefficients.
    Int8,
    /// Signed 16-bit coefficients rewritten as interleaved {zero-run, value}
    /// words.
    RunsInt16,
}

/// How the bands of a wavelet image are arranged within the slab.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BandLayout {
    /// Bands 0|1 side-by-side in the upper half of the slab and bands 2|3 in
    /// the lower half, sharing one row stride.
    Quad,
    /// Each band is a vertically adjacent strip with a cache-line aligned
    /// base address.
    Stacked,
}

/// A multi-band set of wavelet coefficients produced by one forward 2-D
/// transform step.
///
/// All bands of a wavelet share the same width, height, and stride. The per
/// band quantization divisor, pixel type, and cumulative filter gain travel
/// with the wavelet so the inverse transform can trust what it finds.
pub struct WaveletImage {
    shape: WaveletShape,
    layout: BandLayout,
    level: u32,
    width: usize,
    height: usize,
    stride: usize,
    base: usize,
    band_offset: [usize; MAX_BANDS],
    slab: Vec<i16>,
    quantization: [i32; MAX_BANDS],
    pixel_type: [PixelType; MAX_BANDS],
    scale: [i32; MAX_BANDS],
    prescale: u32,
}

impl WaveletImage {
    /// Allocate a wavelet in the interleaved quad layout.
    ///
    /// `width` and `height` are the dimensions of a single band. For a four
    /// band wavelet the slab holds rows of band 0 | band 1 in the upper half
    /// and band 2 | band 3 in the lower half, so the whole wavelet is one
    /// contiguous image twice the band size in both dimensions.
    pub fn quad(shape: WaveletShape, level: u32, width: usize, height: usize) -> Result<Self> {
        assert!(width > 0 && height > 0);

        let bands = shape.band_count();
        let half = align_up(width, ROW_ALIGN / 2);

        let (stride, rows) = match bands {
            1 => (half, height),
            2 => (2 * half, height),
            _ => (2 * half, 2 * height),
        };

        let mut offset = [0usize; MAX_BANDS];
        if bands >= 2 {
            offset[1] = half;
        }
        if bands == 4 {
            offset[2] = height * stride;
            offset[3] = height * stride + half;
        }

        let slab = alloc_slab(rows * stride, ROW_ALIGN)?;
        let base = slab.as_ptr().align_offset(ROW_ALIGN);

        Ok(WaveletImage {
            shape,
            layout: BandLayout::Quad,
            level,
            width,
            height,
            stride,
            base,
            band_offset: offset,
            slab,
            quantization: [1; MAX_BANDS],
            pixel_type: [PixelType::Int16; MAX_BANDS],
            scale: [0; MAX_BANDS],
            prescale: 0,
        })
    }

    /// Allocate a wavelet as stacked band strips.
    ///
    /// Every strip base address falls on a cache line so the inverse
    /// transform can stream whole band rows without straddling lines.
    pub fn stacked(shape: WaveletShape, level: u32, width: usize, height: usize) -> Result<Self> {
        assert!(width > 0 && height > 0);

        let bands = shape.band_count();
        let stride = align_up(width, CACHE_LINE_SIZE / 2);

        let mut offset = [0usize; MAX_BANDS];
        for (k, item) in offset.iter_mut().enumerate().take(bands) {
            *item = k * height * stride;
        }

        let slab = alloc_slab(bands * height * stride, CACHE_LINE_SIZE)?;
        let base = slab.as_ptr().align_offset(CACHE_LINE_SIZE);

        Ok(WaveletImage {
            shape,
            layout: BandLayout::Stacked,
            level,
            width,
            height,
            stride,
            base,
            band_offset: offset,
            slab,
            quantization: [1; MAX_BANDS],
            pixel_type: [PixelType::Int16; MAX_BANDS],
            scale: [0; MAX_BANDS],
            prescale: 0,
        })
    }

    pub fn shape(&self) -> WaveletShape {
        self.shape
    }

    pub fn layout(&self) -> BandLayout {
        self.layout
    }

    pub fn band_count(&self) -> usize {
        self.shape.band_count()
    }

    /// The level of the pyramid this wavelet belongs to. Level 0 is the
    /// source raster.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// The width of a single band in samples.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The height of a single band in rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The row stride shared by all bands, in bytes.
    pub fn pitch(&self) -> usize {
        self.stride * std::mem::size_of::<i16>()
    }

    /// One row of a band.
    pub fn band_row(&self, band: usize, row: usize) -> &[i16] {
        let start = self.row_start(band, row);
        &self.slab[start..start + self.width]
    }

    /// One mutable row of a band.
    pub fn band_row_mut(&mut self, band: usize, row: usize) -> &mut [i16] {
        let start = self.row_start(band, row);
        let width = self.width;
        &mut self.slab[start..start + width]
    }

    /// Two mutable rows of different bands, for kernels that write a lowpass
    /// and a highpass row in one pass. The rows must not overlap.
    pub fn band_row_pair_mut(
        &mut self,
        first: (usize, usize),
        second: (usize, usize),
    ) -> (&mut [i16], &mut [i16]) {
        let a = self.row_start(first.0, first.1);
        let b = self.row_start(second.0, second.1);
        let width = self.width;
        assert!(a + width <= b || b + width <= a, "band rows overlap");

        if a < b {
            let (left, right) = self.slab.split_at_mut(b);
            (&mut left[a..a + width], &mut right[..width])
        }
        else {
            let (left, right) = self.slab.split_at_mut(a);
            (&mut right[..width], &mut left[b..b + width])
        }
    }

    fn row_start(&self, band: usize, row: usize) -> usize {
        assert!(band < self.band_count(), "band index out of range");
        assert!(row < self.height, "band row out of range");
        self.base + self.band_offset[band] + row * self.stride
    }

    /// The quantization divisor recorded for a band.
    pub fn quantization(&self, band: usize) -> i32 {
        assert!(band < self.band_count());
        self.quantization[band]
    }

    pub fn set_quantization(&mut self, band: usize, value: i32) {
        assert!(band < self.band_count());
        assert!(value > 0, "quantization divisor must be positive");
        self.quantization[band] = value;
    }

    pub fn pixel_type(&self, band: usize) -> PixelType {
        assert!(band < self.band_count());
        self.pixel_type[band]
    }

    pub fn set_pixel_type(&mut self, band: usize, value: PixelType) {
        assert!(band < self.band_count());
        self.pixel_type[band] = value;
    }

    /// The cumulative lowpass filter gain for a band. Display diagnostics
    /// only; the inverse transform does not consult it.
    pub fn scale(&self, band: usize) -> i32 {
        assert!(band < self.band_count());
        self.scale[band]
    }

    pub fn set_scale(&mut self, band: usize, value: i32) {
        assert!(band < self.band_count());
        self.scale[band] = value;
    }

    /// The prescale shift that the forward pass applied to this wavelet's
    /// input. The inverse pass re-applies it as a left shift on output.
    pub fn prescale(&self) -> u32 {
        self.prescale
    }

    pub fn set_prescale(&mut self, shift: u32) {
        self.prescale = shift;
    }
}

fn alloc_slab(len: usize, align: usize) -> Result<Vec<i16>> {
    // Headroom so the base offset can step the slab start up to the required
    // alignment.
    let total = len + align / std::mem::size_of::<i16>();

    let mut slab = Vec::new();
    if slab.try_reserve_exact(total).is_err() {
        return out_of_memory_error();
    }
    slab.resize(total, 0);

    Ok(slab)
}

/// A raw raster plane of unsigned 16-bit samples.
///
/// Planes are the engine's boundary type: ingest promotes source pixels into
/// planes (or streams rows directly), and the inverse transform emits
/// reconstructed planes for the packing collaborator.
pub struct Plane {
    width: usize,
    height: usize,
    stride: usize,
    data: Vec<u16>,
}

impl Plane {
    /// Allocate a zeroed plane.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        assert!(width > 0 && height > 0);

        let stride = align_up(width, ROW_ALIGN / 2);

        let mut data = Vec::new();
        if data.try_reserve_exact(stride * height).is_err() {
            return out_of_memory_error();
        }
        data.resize(stride * height, 0);

        Ok(Plane { width, height, stride, data })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row(&self, row: usize) -> &[u16] {
        assert!(row < self.height, "plane row out of range");
        let start = row * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [u16] {
        assert!(row < self.height, "plane row out of range");
        let start = row * self.stride;
        let width = self.width;
        &mut self.data[start..start + width]
    }
}
