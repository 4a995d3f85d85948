// Cinewave
// Copyright (c) 2019-2022 The Project Cinewave Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `transform` module assembles filter kernels into per-channel wavelet
//! pyramids.
//!
//! A [`Transform`] owns the ordered sequence of wavelet images for one color
//! channel of one frame (or two-frame group), the scratch buffer every filter
//! pass borrows, and the per-level prescale bookkeeping that must survive a
//! round trip. Three pyramid topologies exist: `Spatial` for intra frames,
//! `Field` and `FieldPlus` for two-frame groups.

use log::debug;

use cinewave_core::errors::{
    bad_argument_error, invalid_format_error, unexpected_error, Result,
};
use cinewave_core::util::align::align_up;
use cinewave_core::util::clamp::clamp_display;

use crate::filter::spatial::{forward_spatial, inverse_frame, inverse_spatial, FrameForward};
use crate::filter::vector;
use crate::image::{Plane, WaveletImage, WaveletShape};

/// The maximum number of wavelets in a pyramid.
pub const MAX_WAVELETS: usize = 8;

/// The pyramid topology.
///
/// `Spatial` builds one frame wavelet followed by `num_spatial` spatial
/// wavelets, for `1 + N` wavelets and `1 + 3 * (1 + N)` subbands. The field
/// topologies start from two frame wavelets joined by a temporal wavelet;
/// `FieldPlus` additionally decomposes the temporal highpass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    Spatial,
    Field,
    FieldPlus,
}

impl Topology {
    /// The number of frame inputs this topology consumes.
    pub fn frame_count(&self) -> usize {
        match *self {
            Topology::Spatial => 1,
            Topology::Field | Topology::FieldPlus => 2,
        }
    }
}

/// The significant bit depth of the source samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    Bits8,
    Bits10,
    Bits12,
}

impl Precision {
    pub fn bits(&self) -> u32 {
        match *self {
            Precision::Bits8 => 8,
            Precision::Bits10 => 10,
            Precision::Bits12 => 12,
        }
    }

    pub fn from_bits(bits: u32) -> Result<Precision> {
        match bits {
            8 => Ok(Precision::Bits8),
            10 => Ok(Precision::Bits10),
            12 => Ok(Precision::Bits12),
            _ => invalid_format_error("unsupported source bit depth"),
        }
    }
}

// Prescale vectors indexed by wavelet position in pyramid order. The values
// are fixed for decoder compatibility and must not change.
const PRESCALE_ZERO: [u8; MAX_WAVELETS] = [0, 0, 0, 0, 0, 0, 0, 0];
const PRESCALE_SPATIAL_10BIT: [u8; MAX_WAVELETS] = [0, 2, 0, 0, 0, 0, 0, 0];
const PRESCALE_SPATIAL_12BIT: [u8; MAX_WAVELETS] = [0, 2, 2, 0, 0, 0, 0, 0];
// Frame 0, frame 1, temporal, spatial over the temporal highpass, then the
// spatial chain over the temporal lowpass.
const PRESCALE_FIELDPLUS_10BIT: [u8; MAX_WAVELETS] = [0, 0, 0, 0, 2, 0, 0, 0];
const PRESCALE_FIELDPLUS_12BIT: [u8; MAX_WAVELETS] = [0, 0, 0, 2, 2, 2, 0, 0];

/// The prescale vector for a topology and precision pair.
///
/// The `Field` topology carries no prescale at any precision.
pub fn prescale_table(topology: Topology, precision: Precision) -> [u8; MAX_WAVELETS] {
    match (topology, precision) {
        (_, Precision::Bits8) => PRESCALE_ZERO,
        (Topology::Spatial, Precision::Bits10) => PRESCALE_SPATIAL_10BIT,
        (Topology::Spatial, Precision::Bits12) => PRESCALE_SPATIAL_12BIT,
        (Topology::FieldPlus, Precision::Bits10) => PRESCALE_FIELDPLUS_10BIT,
        (Topology::FieldPlus, Precision::Bits12) => PRESCALE_FIELDPLUS_12BIT,
        (Topology::Field, _) => PRESCALE_ZERO,
    }
}

/// The default highpass quantization divisors for a wavelet, as
/// `[1, horizontal, vertical, diagonal]`, indexed by position in the pyramid.
pub fn default_quant(precision: Precision, wavelet_index: usize) -> [i32; 4] {
    match precision {
        Precision::Bits8 => match wavelet_index {
            0 => [1, 8, 8, 12],
            1 => [1, 16, 16, 12],
            _ => [1, 48, 48, 24],
        },
        Precision::Bits10 => match wavelet_index {
            0 => [1, 24, 24, 36],
            1 => [1, 12, 12, 6],
            _ => [1, 48, 48, 24],
        },
        Precision::Bits12 => match wavelet_index {
            0 => [1, 48, 48, 72],
            _ => [1, 48, 48, 24],
        },
    }
}

/// How the forward drivers choose quantization divisors.
#[derive(Clone, Copy, Debug)]
pub enum QuantMode {
    /// Every divisor is one; the transform is exactly invertible apart from
    /// any prescale loss.
    Lossless,
    /// The per-precision default profile.
    Default,
    /// Explicit divisors per wavelet index.
    Custom([[i32; 4]; MAX_WAVELETS]),
}

/// Options fixed at transform construction.
#[derive(Clone, Copy, Debug)]
pub struct TransformOptions {
    pub quant: QuantMode,
    /// Rewrite quantized highpass rows as interleaved run/value streams.
    pub pack_runs: bool,
}

impl Default for TransformOptions {
    fn default() -> TransformOptions {
        TransformOptions { quant: QuantMode::Default, pack_runs: false }
    }
}

/// The per-channel transform state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformState {
    Empty,
    ForwardLevel(u32),
    Full,
    InverseLevel(u32),
}

/// Counters for one transform, replacing the original implementation's
/// process-wide timers. Purely informational.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransformMetrics {
    pub forward_wavelets: u64,
    pub inverse_wavelets: u64,
    pub rows_filtered: u64,
    pub bands_quantized: u64,
}

/// The wavelet pyramid for one color channel.
pub struct Transform {
    topology: Topology,
    precision: Precision,
    width: usize,
    height: usize,
    num_spatial: usize,
    options: TransformOptions,
    prescale: [u8; MAX_WAVELETS],
    wavelets: Vec<WaveletImage>,
    // For each wavelet, the (wavelet, band) its forward input came from. The
    // frame wavelets read the source raster and link to themselves.
    links: Vec<(usize, usize)>,
    scratch: Vec<i16>,
    state: TransformState,
    metrics: TransformMetrics,
}

impl Transform {
    /// Create a transform for one channel.
    ///
    /// `width` and `height` are the channel dimensions. They must be
    /// divisible by two at every level of the pyramid and leave at least six
    /// samples in each direction at the deepest level; the caller pads the
    /// source, the engine never resamples.
    pub fn new(
        topology: Topology,
        precision: Precision,
        width: usize,
        height: usize,
        num_spatial: usize,
        options: TransformOptions,
    ) -> Result<Transform> {
        let (depth, chain_halvings) = match topology {
            // One frame wavelet plus the spatial chain.
            Topology::Spatial => {
                if num_spatial < 1 || 1 + num_spatial > MAX_WAVELETS {
                    return invalid_format_error("unsupported number of spatial levels");
                }
                (1 + num_spatial, num_spatial)
            }
            Topology::Field => {
                if num_spatial < 1 || 3 + num_spatial > MAX_WAVELETS {
                    return invalid_format_error("unsupported number of spatial levels");
                }
                (3 + num_spatial, num_spatial)
            }
            // Two frames, the temporal wavelet, one spatial over the temporal
            // highpass, and a two-step chain over the temporal lowpass.
            Topology::FieldPlus => {
                if num_spatial != 3 {
                    return invalid_format_error(
                        "the field-plus topology requires three spatial levels",
                    );
                }
                (6, 2)
            }
        };

        // Every halving must leave even dimensions, and the deepest filter
        // input needs the minimum extent of the 2/6 kernels.
        let halvings = 1 + chain_halvings;
        let divisor = 1usize << halvings;
        if width % divisor != 0 || height % divisor != 0 {
            return invalid_format_error("frame dimensions do not divide through the pyramid");
        }
        if (width >> (halvings - 1)) < 6 || (height >> (halvings - 1)) < 6 {
            return invalid_format_error("frame dimensions too small for the pyramid depth");
        }

        if let QuantMode::Custom(tables) = options.quant {
            for table in tables.iter() {
                if table.iter().any(|&q| q <= 0) {
                    return bad_argument_error("quantization divisors must be positive");
                }
            }
        }

        // Scratch sized for the widest filter pass: eighteen aligned rows of
        // half the input width covers the horizontal ring and staging, and a
        // full frame of rows covers the streaming drivers.
        let row = align_up(width / 2, 32);
        let scratch = vec![0i16; row * height.max(18)];

        debug!(
            "new {:?} transform: {}x{} {}-bit, {} wavelets",
            topology,
            width,
            height,
            precision.bits(),
            depth
        );

        Ok(Transform {
            topology,
            precision,
            width,
            height,
            num_spatial,
            options,
            prescale: prescale_table(topology, precision),
            wavelets: Vec::with_capacity(depth),
            links: Vec::with_capacity(depth),
            scratch,
            state: TransformState::Empty,
            metrics: TransformMetrics::default(),
        })
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn state(&self) -> TransformState {
        self.state
    }

    pub fn metrics(&self) -> TransformMetrics {
        self.metrics
    }

    /// The prescale vector the forward pass will record, in pyramid order.
    pub fn prescale(&self) -> &[u8; MAX_WAVELETS] {
        &self.prescale
    }

    pub fn wavelet_count(&self) -> usize {
        self.wavelets.len()
    }

    pub fn wavelet(&self, index: usize) -> Option<&WaveletImage> {
        self.wavelets.get(index)
    }

    fn quant_for(&self, wavelet_index: usize) -> [i32; 4] {
        match self.options.quant {
            QuantMode::Lossless => [1; 4],
            QuantMode::Default => default_quant(self.precision, wavelet_index),
            QuantMode::Custom(tables) => tables[wavelet_index],
        }
    }

    /// Discard the pyramid and return to the empty state, keeping the
    /// scratch buffer for the next frame group.
    pub fn reset(&mut self) {
        self.wavelets.clear();
        self.links.clear();
        self.state = TransformState::Empty;
    }

    /// Start the level-1 frame transform for the next frame input.
    ///
    /// Feed the returned [`FrameForward`] every pair of planar rows, then
    /// call its `finish`. For two-frame topologies this is called once per
    /// frame before [`finish_group`](Transform::finish_group).
    pub fn begin_frame(&mut self) -> Result<FrameForward<'_>> {
        match self.state {
            TransformState::Empty => {
                // Reuse across frames: the pyramid restarts, the scratch
                // buffer does not.
                self.wavelets.clear();
                self.links.clear();
            }
            TransformState::ForwardLevel(1) => (),
            _ => return unexpected_error("frame transform started from the wrong state"),
        }

        let frame_index = self.wavelets.len();
        if frame_index >= self.topology.frame_count() {
            return unexpected_error("too many frame inputs for this topology");
        }

        let quant = self.quant_for(frame_index);
        let prescale = u32::from(self.prescale[frame_index]);
        let pack = self.options.pack_runs;

        let wavelet = WaveletImage::quad(
            WaveletShape::HorizontalTemporal,
            1,
            self.width / 2,
            self.height / 2,
        )?;
        self.wavelets.push(wavelet);
        self.links.push((frame_index, 0));

        self.state = TransformState::ForwardLevel(1);
        self.metrics.forward_wavelets += 1;
        self.metrics.rows_filtered += self.height as u64;
        self.metrics.bands_quantized += 3;

        debug!("forward frame wavelet {} at level 1", frame_index);

        let wavelet = match self.wavelets.last_mut() {
            Some(wavelet) => wavelet,
            None => return unexpected_error("frame wavelet missing after allocation"),
        };
        FrameForward::new(wavelet, quant, pack, prescale, &mut self.scratch)
    }

    /// Convenience forward driver: run the frame transform over a whole
    /// plane.
    pub fn push_frame_plane(&mut self, plane: &Plane) -> Result<()> {
        if plane.width() != self.width || plane.height() != self.height {
            return bad_argument_error("plane dimensions do not match the transform");
        }

        let width = self.width;
        let mut even = vec![0i16; width];
        let mut odd = vec![0i16; width];

        let mut forward = self.begin_frame()?;
        for pair in 0..forward.rows() {
            for (d, &s) in even.iter_mut().zip(plane.row(2 * pair).iter()) {
                *d = s as i16;
            }
            for (d, &s) in odd.iter_mut().zip(plane.row(2 * pair + 1).iter()) {
                *d = s as i16;
            }
            forward.push_row_pair(&even, &odd)?;
        }
        forward.finish()
    }

    /// Run the remaining wavelet levels after every frame input arrived,
    /// leaving the pyramid complete.
    pub fn finish_group(&mut self) -> Result<()> {
        if self.state != TransformState::ForwardLevel(1) {
            return unexpected_error("transform group finished from the wrong state");
        }
        if self.wavelets.len() != self.topology.frame_count() {
            return unexpected_error("not every frame input has been pushed");
        }

        match self.topology {
            Topology::Spatial => {
                let mut source = 0;
                for _ in 0..self.num_spatial {
                    source = self.forward_spatial_step(source, 0)?;
                }
            }
            Topology::Field => {
                self.forward_temporal_step()?;
                let mut source = 2;
                for _ in 0..self.num_spatial {
                    source = self.forward_spatial_step(source, 0)?;
                }
            }
            Topology::FieldPlus => {
                self.forward_temporal_step()?;
                // One spatial wavelet over the temporal highpass, then the
                // chain over the temporal lowpass.
                self.forward_spatial_step(2, 1)?;
                let source = self.forward_spatial_step(2, 0)?;
                self.forward_spatial_step(source, 0)?;
            }
        }

        self.set_transform_scale();
        self.state = TransformState::Full;

        debug!("transform full: {} wavelets", self.wavelets.len());
        Ok(())
    }

    /// One forward spatial step over `(source, band)`. Returns the index of
    /// the new wavelet.
    fn forward_spatial_step(&mut self, source: usize, band: usize) -> Result<usize> {
        let index = self.wavelets.len();
        if index >= MAX_WAVELETS {
            return unexpected_error("wavelet pyramid capacity exceeded");
        }

        let (input_width, input_height, level) = {
            let input = &self.wavelets[source];
            (input.width(), input.height(), input.level())
        };

        let quant = self.quant_for(index);
        let prescale = u32::from(self.prescale[index]);
        let pack = self.options.pack_runs;

        let wavelet =
            WaveletImage::quad(WaveletShape::Spatial, level + 1, input_width / 2, input_height / 2)?;
        self.wavelets.push(wavelet);
        self.links.push((source, band));

        let (head, tail) = self.wavelets.split_at_mut(index);
        let input = &head[source];
        let output = match tail.first_mut() {
            Some(wavelet) => wavelet,
            None => return unexpected_error("spatial wavelet missing after allocation"),
        };

        debug!("forward spatial wavelet {} at level {}", index, level + 1);
        forward_spatial(input, band, output, &quant, pack, prescale, &mut self.scratch)?;

        self.state = TransformState::ForwardLevel(level + 1);
        self.metrics.forward_wavelets += 1;
        self.metrics.rows_filtered += input_height as u64;
        self.metrics.bands_quantized += 3;

        Ok(index)
    }

    /// Build the temporal wavelet between the two frame lowpass bands.
    fn forward_temporal_step(&mut self) -> Result<()> {
        let index = self.wavelets.len();
        if index != 2 {
            return unexpected_error("temporal wavelet requires exactly two frame wavelets");
        }

        let width = self.wavelets[0].width();
        let height = self.wavelets[0].height();

        // The temporal bands are consumed row-at-a-time on the inverse path,
        // which is what the stacked strip layout is for.
        let wavelet = WaveletImage::stacked(WaveletShape::Temporal, 2, width, height)?;
        self.wavelets.push(wavelet);
        self.links.push((0, 0));

        let (frames, rest) = self.wavelets.split_at_mut(2);
        let temporal = match rest.first_mut() {
            Some(wavelet) => wavelet,
            None => return unexpected_error("temporal wavelet missing after allocation"),
        };

        for row in 0..height {
            let (low, high) = temporal.band_row_pair_mut((0, row), (1, row));
            vector::forward_temporal(
                frames[0].band_row(0, row),
                frames[1].band_row(0, row),
                low,
                high,
            );
        }

        debug!("forward temporal wavelet at level 2");
        self.state = TransformState::ForwardLevel(2);
        self.metrics.forward_wavelets += 1;
        self.metrics.rows_filtered += height as u64;

        Ok(())
    }

    /// Record the cumulative filter gain on every band, for display
    /// diagnostics.
    fn set_transform_scale(&mut self) {
        let frame_count = self.topology.frame_count();

        for index in 0..self.wavelets.len() {
            let scale: [i32; 4] = if index < frame_count {
                // Temporal lowpass and horizontal lowpass each double.
                [4, 2, 2, 1]
            }
            else {
                let (source, band) = self.links[index];
                let input_scale = self.wavelets[source].scale(band).max(1);
                match self.wavelets[index].shape() {
                    WaveletShape::Temporal => [2 * input_scale, input_scale, 0, 0],
                    _ => [4 * input_scale, 2 * input_scale, 2 * input_scale, input_scale],
                }
            };

            let wavelet = &mut self.wavelets[index];
            for band in 0..wavelet.band_count() {
                wavelet.set_scale(band, scale[band]);
            }
        }
    }

    /// Reconstruct the source plane of a spatial (intra) pyramid.
    ///
    /// The destination width must match the transform; a shorter destination
    /// simply receives fewer rows, which covers displays whose height is less
    /// than the padded wavelet height.
    pub fn decode_plane(&mut self, dest: &mut Plane) -> Result<()> {
        if self.topology != Topology::Spatial {
            return bad_argument_error("decode_plane requires the spatial topology");
        }
        if dest.width() != self.width || dest.height() > self.height {
            return bad_argument_error("destination plane does not fit the transform");
        }
        if self.state != TransformState::Full {
            return unexpected_error("decode requires a complete pyramid");
        }

        for index in (1..self.wavelets.len()).rev() {
            self.inverse_spatial_step(index)?;
        }

        self.inverse_frame_step(0, dest)?;

        self.state = TransformState::Empty;
        Ok(())
    }

    /// Reconstruct both frames of a field pyramid.
    pub fn decode_frame_pair(&mut self, dest0: &mut Plane, dest1: &mut Plane) -> Result<()> {
        if self.topology == Topology::Spatial {
            return bad_argument_error("decode_frame_pair requires a field topology");
        }
        for dest in [&*dest0, &*dest1] {
            if dest.width() != self.width || dest.height() > self.height {
                return bad_argument_error("destination plane does not fit the transform");
            }
        }
        if self.state != TransformState::Full {
            return unexpected_error("decode requires a complete pyramid");
        }

        // Undo the spatial wavelets, deepest first. Each writes the band its
        // forward step consumed, restoring the temporal bands last.
        for index in (3..self.wavelets.len()).rev() {
            self.inverse_spatial_step(index)?;
        }

        self.inverse_temporal_step()?;

        self.inverse_frame_step(0, dest0)?;
        self.inverse_frame_step(1, dest1)?;

        self.state = TransformState::Empty;
        Ok(())
    }

    /// Reconstruct only down to the lowpass band of the wavelet at
    /// `wavelet_index`, emitting it as a reduced-resolution preview plane.
    ///
    /// The recorded per-band filter gain is divided back out so the preview
    /// sits in the source display range. Deeper wavelets are inverted;
    /// shallower levels are left untouched, so a full decode is no longer
    /// possible afterwards.
    pub fn decode_lowpass_plane(&mut self, wavelet_index: usize, dest: &mut Plane) -> Result<()> {
        if self.topology != Topology::Spatial {
            return bad_argument_error("lowpass preview requires the spatial topology");
        }
        if self.state != TransformState::Full {
            return unexpected_error("decode requires a complete pyramid");
        }
        if wavelet_index >= self.wavelets.len() {
            return bad_argument_error("wavelet index out of range");
        }
        {
            let wavelet = &self.wavelets[wavelet_index];
            if dest.width() != wavelet.width() || dest.height() > wavelet.height() {
                return bad_argument_error("destination plane does not fit the lowpass band");
            }
        }

        for index in (wavelet_index + 1..self.wavelets.len()).rev() {
            self.inverse_spatial_step(index)?;
        }

        let bits = self.precision.bits();
        let wavelet = &self.wavelets[wavelet_index];
        let descale = wavelet.scale(0).max(1).ilog2();

        for row in 0..dest.height() {
            let src = wavelet.band_row(0, row);
            for (d, &s) in dest.row_mut(row).iter_mut().zip(src.iter()) {
                *d = clamp_display(i32::from(s) >> descale, bits);
            }
        }

        self.state = TransformState::Empty;
        Ok(())
    }

    fn inverse_spatial_step(&mut self, index: usize) -> Result<()> {
        let (target, band) = self.links[index];
        let level = self.wavelets[index].level();
        self.state = TransformState::InverseLevel(level);

        let (head, tail) = self.wavelets.split_at_mut(index);
        let source = match tail.first() {
            Some(wavelet) => wavelet,
            None => return unexpected_error("inverse source wavelet missing"),
        };
        let output = &mut head[target];

        debug!("inverse spatial wavelet {} at level {}", index, level);
        let rows = source.height() as u64;
        inverse_spatial(source, &mut self.scratch, |row, data| {
            output.band_row_mut(band, row).copy_from_slice(data);
        })?;

        self.metrics.inverse_wavelets += 1;
        self.metrics.rows_filtered += rows;
        Ok(())
    }

    fn inverse_temporal_step(&mut self) -> Result<()> {
        self.state = TransformState::InverseLevel(2);

        let height = self.wavelets[2].height();
        let (frames, rest) = self.wavelets.split_at_mut(2);
        let temporal = match rest.first() {
            Some(wavelet) => wavelet,
            None => return unexpected_error("temporal wavelet missing"),
        };
        let (frame0, frame1) = frames.split_at_mut(1);

        for row in 0..height {
            vector::inverse_temporal(
                temporal.band_row(0, row),
                temporal.band_row(1, row),
                frame0[0].band_row_mut(0, row),
                frame1[0].band_row_mut(0, row),
            );
        }

        debug!("inverse temporal wavelet at level 2");
        self.metrics.inverse_wavelets += 1;
        self.metrics.rows_filtered += height as u64;
        Ok(())
    }

    fn inverse_frame_step(&mut self, index: usize, dest: &mut Plane) -> Result<()> {
        self.state = TransformState::InverseLevel(1);

        let bits = self.precision.bits();
        let height = dest.height();
        let wavelet = &self.wavelets[index];

        debug!("inverse frame wavelet {} at level 1", index);
        let rows = wavelet.height() as u64;
        inverse_frame(wavelet, &mut self.scratch, |row, data| {
            // Rows past the display height are synthesized by the border
            // filter and dropped here.
            if row < height {
                for (d, &s) in dest.row_mut(row).iter_mut().zip(data.iter()) {
                    *d = clamp_display(i32::from(s), bits);
                }
            }
        })?;

        self.metrics.inverse_wavelets += 1;
        self.metrics.rows_filtered += rows;
        Ok(())
    }
}
