// Cinewave
// Copyright (c) 2019-2022 The Project Cinewave Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `ingest` module feeds raster frames into the level-1 frame transform.
//!
//! Each supported source pixel format has one ingest kernel that reads a
//! raster row, demultiplexes it into planar 16-bit samples per channel, and
//! hands the rows straight to the streaming frame transform. No intermediate
//! full-resolution buffer exists; only row staging, sized to one channel row.

use cinewave_core::errors::{bad_argument_error, invalid_format_error, Result};

use crate::transform::{Precision, Transform};

/// A source pixel format tag. The tag travels with the input; every format
/// maps onto planar channels with a fixed precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit 4:2:2, bytes Y0 U Y1 V.
    Yuy2,
    /// Packed 8-bit 4:2:2, bytes U Y0 V Y1.
    Uyvy,
    /// Packed 10-bit 4:2:2: six pixels in four little-endian 32-bit words,
    /// samples ordered Cr Y0 Cb Y1 within each group.
    V210,
    /// Packed 10-bit RGB in 32-bit words with blue in the top ten bits.
    Rgb30,
    /// Planar RGB 4:4:4, one byte per sample.
    RgbPlanar8,
    /// Planar RGB 4:4:4, 10 significant bits in 16-bit little-endian words.
    RgbPlanar10,
    /// Planar RGB 4:4:4, 12 significant bits in 16-bit little-endian words.
    RgbPlanar12,
    /// Planar RGB 4:4:4, 16-bit little-endian words, demoted to 12 bits on
    /// ingest.
    RgbPlanar16,
    /// Bayer with four samples per macropixel. Each stored row covers one
    /// macro-row as four quarter-width segments R, G1, G2, B of 10-bit
    /// samples in 16-bit little-endian words.
    Byr3,
}

impl PixelFormat {
    /// The number of planar channels this format demultiplexes into.
    pub fn channel_count(&self) -> usize {
        match *self {
            PixelFormat::Byr3 => 4,
            _ => 3,
        }
    }

    /// The precision of the planar samples after ingest.
    pub fn precision(&self) -> Precision {
        match *self {
            PixelFormat::Yuy2 | PixelFormat::Uyvy | PixelFormat::RgbPlanar8 => Precision::Bits8,
            PixelFormat::V210 | PixelFormat::Rgb30 | PixelFormat::RgbPlanar10 | PixelFormat::Byr3 => {
                Precision::Bits10
            }
            PixelFormat::RgbPlanar12 | PixelFormat::RgbPlanar16 => Precision::Bits12,
        }
    }

    /// The width of one channel for a frame of the given width.
    pub fn channel_width(&self, channel: usize, width: usize) -> usize {
        match *self {
            PixelFormat::Yuy2 | PixelFormat::Uyvy | PixelFormat::V210 => {
                if channel == 0 {
                    width
                }
                else {
                    width / 2
                }
            }
            PixelFormat::Byr3 => width / 2,
            _ => width,
        }
    }

    /// The height of one channel for a frame of the given height.
    pub fn channel_height(&self, height: usize) -> usize {
        match *self {
            PixelFormat::Byr3 => height / 2,
            _ => height,
        }
    }

    /// The number of stored rows in the frame buffer.
    fn stored_rows(&self, height: usize) -> usize {
        match *self {
            PixelFormat::RgbPlanar8
            | PixelFormat::RgbPlanar10
            | PixelFormat::RgbPlanar12
            | PixelFormat::RgbPlanar16 => 3 * height,
            PixelFormat::Byr3 => height / 2,
            _ => height,
        }
    }

    /// The minimum stored row size in bytes.
    fn min_row_bytes(&self, width: usize) -> usize {
        match *self {
            PixelFormat::Yuy2 | PixelFormat::Uyvy => 2 * width,
            PixelFormat::V210 => width / 6 * 16,
            PixelFormat::Rgb30 => 4 * width,
            PixelFormat::RgbPlanar8 => width,
            PixelFormat::RgbPlanar10 | PixelFormat::RgbPlanar12 | PixelFormat::RgbPlanar16 => {
                2 * width
            }
            PixelFormat::Byr3 => 4 * width,
        }
    }
}

/// A borrowed raster frame with its format tag.
pub struct RasterFrame<'a> {
    format: PixelFormat,
    width: usize,
    height: usize,
    pitch: usize,
    data: &'a [u8],
}

impl<'a> RasterFrame<'a> {
    pub fn new(
        format: PixelFormat,
        width: usize,
        height: usize,
        pitch: usize,
        data: &'a [u8],
    ) -> Result<RasterFrame<'a>> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return invalid_format_error("frame dimensions must be even and non-zero");
        }
        if format == PixelFormat::V210 && width % 6 != 0 {
            return invalid_format_error("v210 frames must be a multiple of six pixels wide");
        }
        if pitch < format.min_row_bytes(width) {
            return invalid_format_error("frame pitch too small for the pixel format");
        }
        if data.len() < format.stored_rows(height) * pitch {
            return invalid_format_error("frame buffer too small for its dimensions");
        }

        Ok(RasterFrame { format, width, height, pitch, data })
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn stored_row(&self, row: usize) -> &[u8] {
        &self.data[row * self.pitch..(row + 1) * self.pitch]
    }

    /// A plane row for the planar formats, which store their planes one
    /// after another.
    fn plane_row(&self, plane: usize, row: usize) -> &[u8] {
        self.stored_row(plane * self.format.channel_height(self.height) + row)
    }

    /// Demultiplex one channel row into planar 16-bit samples.
    ///
    /// `row` indexes channel rows: raster rows for most formats, macro-rows
    /// for Bayer.
    fn unpack_row(&self, row: usize, channels: &mut [Vec<i16>]) {
        match self.format {
            PixelFormat::Yuy2 => unpack_yuy2_row(self.stored_row(row), self.width, channels),
            PixelFormat::Uyvy => unpack_uyvy_row(self.stored_row(row), self.width, channels),
            PixelFormat::V210 => unpack_v210_row(self.stored_row(row), self.width, channels),
            PixelFormat::Rgb30 => unpack_rgb30_row(self.stored_row(row), self.width, channels),
            PixelFormat::RgbPlanar8 => {
                for (plane, channel) in channels.iter_mut().enumerate() {
                    let src = self.plane_row(plane, row);
                    for (d, &s) in channel.iter_mut().zip(src.iter()) {
                        *d = i16::from(s);
                    }
                }
            }
            PixelFormat::RgbPlanar10 | PixelFormat::RgbPlanar12 | PixelFormat::RgbPlanar16 => {
                let shift = if self.format == PixelFormat::RgbPlanar16 { 4 } else { 0 };
                for (plane, channel) in channels.iter_mut().enumerate() {
                    let src = self.plane_row(plane, row);
                    unpack_words_row(src, shift, channel);
                }
            }
            PixelFormat::Byr3 => {
                let src = self.stored_row(row);
                let segment = self.width / 2 * 2;
                for (plane, channel) in channels.iter_mut().enumerate() {
                    unpack_words_row(&src[plane * segment..(plane + 1) * segment], 0, channel);
                }
            }
        }
    }
}

fn unpack_yuy2_row(src: &[u8], width: usize, channels: &mut [Vec<i16>]) {
    for pair in 0..width / 2 {
        let bytes = &src[4 * pair..4 * pair + 4];
        channels[0][2 * pair] = i16::from(bytes[0]);
        channels[1][pair] = i16::from(bytes[1]);
        channels[0][2 * pair + 1] = i16::from(bytes[2]);
        channels[2][pair] = i16::from(bytes[3]);
    }
}

fn unpack_uyvy_row(src: &[u8], width: usize, channels: &mut [Vec<i16>]) {
    for pair in 0..width / 2 {
        let bytes = &src[4 * pair..4 * pair + 4];
        channels[1][pair] = i16::from(bytes[0]);
        channels[0][2 * pair] = i16::from(bytes[1]);
        channels[2][pair] = i16::from(bytes[2]);
        channels[0][2 * pair + 1] = i16::from(bytes[3]);
    }
}

fn unpack_v210_row(src: &[u8], width: usize, channels: &mut [Vec<i16>]) {
    // Each group of four 32-bit words carries six luma and three chroma
    // pairs, ten bits per component, in the sample order Cr0 Y0 Cb0 Y1 Cr1
    // Y2 Cb1 Y3 Cr2 Y4 Cb2 Y5 packed three to a word from the low bits up.
    for group in 0..width / 6 {
        let mut words = [0u32; 4];
        for (index, word) in words.iter_mut().enumerate() {
            let offset = 16 * group + 4 * index;
            *word = u32::from_le_bytes([
                src[offset],
                src[offset + 1],
                src[offset + 2],
                src[offset + 3],
            ]);
        }

        let component = |word: u32, slot: u32| ((word >> (10 * slot)) & 0x3ff) as i16;

        let luma = &mut channels[0];
        luma[6 * group] = component(words[0], 1);
        luma[6 * group + 1] = component(words[1], 0);
        luma[6 * group + 2] = component(words[1], 2);
        luma[6 * group + 3] = component(words[2], 1);
        luma[6 * group + 4] = component(words[3], 0);
        luma[6 * group + 5] = component(words[3], 2);

        let cb = &mut channels[1];
        cb[3 * group] = component(words[0], 2);
        cb[3 * group + 1] = component(words[2], 0);
        cb[3 * group + 2] = component(words[3], 1);

        let cr = &mut channels[2];
        cr[3 * group] = component(words[0], 0);
        cr[3 * group + 1] = component(words[1], 1);
        cr[3 * group + 2] = component(words[2], 2);
    }
}

fn unpack_rgb30_row(src: &[u8], width: usize, channels: &mut [Vec<i16>]) {
    for x in 0..width {
        let offset = 4 * x;
        let word = u32::from_le_bytes([
            src[offset],
            src[offset + 1],
            src[offset + 2],
            src[offset + 3],
        ]);
        // Blue occupies the top ten bits, green the middle, red the low.
        channels[0][x] = (word & 0x3ff) as i16;
        channels[1][x] = ((word >> 10) & 0x3ff) as i16;
        channels[2][x] = ((word >> 20) & 0x3ff) as i16;
    }
}

fn unpack_words_row(src: &[u8], shift: u32, channel: &mut [i16]) {
    for (x, value) in channel.iter_mut().enumerate() {
        let word = u16::from_le_bytes([src[2 * x], src[2 * x + 1]]);
        *value = (word >> shift) as i16;
    }
}

/// Run the level-1 frame transform of every channel over a group of raster
/// frames, then finish each channel's pyramid.
///
/// `transforms` holds one transform per channel, created with that channel's
/// dimensions and the format's precision. The group length must match the
/// topology: one frame for `Spatial`, two for the field topologies.
pub fn encode_group(frames: &[&RasterFrame<'_>], transforms: &mut [Transform]) -> Result<()> {
    let first = match frames.first() {
        Some(frame) => frame,
        None => return bad_argument_error("no frames in the group"),
    };
    let format = first.format;

    if transforms.len() != format.channel_count() {
        return bad_argument_error("one transform per channel is required");
    }
    for (channel, transform) in transforms.iter().enumerate() {
        if transform.topology().frame_count() != frames.len() {
            return bad_argument_error("group length does not match the transform topology");
        }
        if transform.precision() != format.precision() {
            return bad_argument_error("transform precision does not match the pixel format");
        }
        let width = format.channel_width(channel, first.width);
        let height = format.channel_height(first.height);
        if transform.width() != width || transform.height() != height {
            return bad_argument_error("transform dimensions do not match the channel");
        }
    }

    for frame in frames {
        if frame.format != format || frame.width != first.width || frame.height != first.height {
            return bad_argument_error("every frame in a group must share format and size");
        }

        encode_frame_channels(frame, transforms)?;
    }

    for transform in transforms.iter_mut() {
        transform.finish_group()?;
    }
    Ok(())
}

fn encode_frame_channels(frame: &RasterFrame<'_>, transforms: &mut [Transform]) -> Result<()> {
    let format = frame.format;
    let channel_count = format.channel_count();
    let rows = format.channel_height(frame.height);

    // Row staging for the even and odd rows of every channel.
    let mut even: Vec<Vec<i16>> = (0..channel_count)
        .map(|channel| vec![0i16; format.channel_width(channel, frame.width)])
        .collect();
    let mut odd: Vec<Vec<i16>> = (0..channel_count)
        .map(|channel| vec![0i16; format.channel_width(channel, frame.width)])
        .collect();

    let mut forwards = Vec::with_capacity(channel_count);
    for transform in transforms.iter_mut() {
        forwards.push(transform.begin_frame()?);
    }

    for pair in 0..rows / 2 {
        frame.unpack_row(2 * pair, &mut even);
        frame.unpack_row(2 * pair + 1, &mut odd);

        for (channel, forward) in forwards.iter_mut().enumerate() {
            forward.push_row_pair(&even[channel], &odd[channel])?;
        }
    }

    for forward in forwards {
        forward.finish()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Plane;
    use crate::transform::{QuantMode, Topology, TransformOptions};

    fn lossless_options() -> TransformOptions {
        TransformOptions { quant: QuantMode::Lossless, pack_runs: false }
    }

    fn channel_transforms(format: PixelFormat, width: usize, height: usize) -> Vec<Transform> {
        (0..format.channel_count())
            .map(|channel| {
                Transform::new(
                    Topology::Spatial,
                    format.precision(),
                    format.channel_width(channel, width),
                    format.channel_height(height),
                    2,
                    lossless_options(),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn verify_yuy2_unpack() {
        let src = [10u8, 20, 30, 40, 50, 60, 70, 80];
        let mut channels = vec![vec![0i16; 4], vec![0i16; 2], vec![0i16; 2]];
        unpack_yuy2_row(&src, 4, &mut channels);
        assert_eq!(channels[0], [10, 30, 50, 70]);
        assert_eq!(channels[1], [20, 60]);
        assert_eq!(channels[2], [40, 80]);
    }

    #[test]
    fn verify_uyvy_unpack() {
        let src = [10u8, 20, 30, 40, 50, 60, 70, 80];
        let mut channels = vec![vec![0i16; 4], vec![0i16; 2], vec![0i16; 2]];
        unpack_uyvy_row(&src, 4, &mut channels);
        assert_eq!(channels[0], [20, 40, 60, 80]);
        assert_eq!(channels[1], [10, 50]);
        assert_eq!(channels[2], [30, 70]);
    }

    #[test]
    fn verify_v210_unpack() {
        // One group of six pixels with recognizable component values. The
        // group is packed from the documented sample order, Cr0 Y0 Cb0 Y1
        // Cr1 Y2 Cb1 Y3 Cr2 Y4 Cb2 Y5, three samples per word from the low
        // bits up, independently of how the unpacker maps the slots.
        let sequence: [u16; 12] =
            [300, 100, 200, 101, 301, 102, 201, 103, 302, 104, 202, 105];

        let mut src = Vec::new();
        for triple in sequence.chunks_exact(3) {
            let word = u32::from(triple[0])
                | u32::from(triple[1]) << 10
                | u32::from(triple[2]) << 20;
            src.extend_from_slice(&word.to_le_bytes());
        }

        let mut channels = vec![vec![0i16; 6], vec![0i16; 3], vec![0i16; 3]];
        unpack_v210_row(&src, 6, &mut channels);
        assert_eq!(channels[0], [100, 101, 102, 103, 104, 105]);
        assert_eq!(channels[1], [200, 201, 202]);
        assert_eq!(channels[2], [300, 301, 302]);
    }

    #[test]
    fn verify_rgb30_unpack() {
        let word: u32 = 900 << 20 | 500 << 10 | 100;
        let src = word.to_le_bytes();
        let mut channels = vec![vec![0i16; 1], vec![0i16; 1], vec![0i16; 1]];
        unpack_rgb30_row(&src, 1, &mut channels);
        assert_eq!(channels[0], [100]);
        assert_eq!(channels[1], [500]);
        assert_eq!(channels[2], [900]);
    }

    #[test]
    fn verify_frame_validation() {
        let data = vec![0u8; 64];
        // Odd width.
        assert!(RasterFrame::new(PixelFormat::Yuy2, 3, 2, 8, &data).is_err());
        // V210 width not a multiple of six.
        assert!(RasterFrame::new(PixelFormat::V210, 8, 2, 32, &data).is_err());
        // Pitch below the packed row size.
        assert!(RasterFrame::new(PixelFormat::Yuy2, 8, 2, 8, &data).is_err());
        // Buffer shorter than the frame.
        assert!(RasterFrame::new(PixelFormat::Yuy2, 8, 4, 16, &data).is_err());
    }

    #[test]
    fn verify_yuy2_encode_round_trip() {
        let width = 48;
        let height = 32;
        let pitch = 2 * width;

        let mut data = vec![0u8; pitch * height];
        for y in 0..height {
            for x in 0..width {
                data[y * pitch + 2 * x] = ((x * 3 + y * 5) % 256) as u8;
                data[y * pitch + 2 * x + 1] = ((x + 2 * y) % 256) as u8;
            }
        }
        let frame = RasterFrame::new(PixelFormat::Yuy2, width, height, pitch, &data).unwrap();

        let mut transforms = channel_transforms(PixelFormat::Yuy2, width, height);
        encode_group(&[&frame], &mut transforms).unwrap();

        // Reconstruct the luma channel and compare with the packed source.
        let mut luma = Plane::new(width, height).unwrap();
        transforms[0].decode_plane(&mut luma).unwrap();
        for y in 0..height {
            for x in 0..width {
                let expect = u16::from(data[y * pitch + 2 * x]);
                assert_eq!(luma.row(y)[x], expect, "({}, {})", x, y);
            }
        }

        // And one chroma channel.
        let mut cb = Plane::new(width / 2, height).unwrap();
        transforms[1].decode_plane(&mut cb).unwrap();
        for y in 0..height {
            for pair in 0..width / 2 {
                let expect = u16::from(data[y * pitch + 4 * pair + 1]);
                assert_eq!(cb.row(y)[pair], expect, "({}, {})", pair, y);
            }
        }
    }

    #[test]
    fn verify_uyvy_encode_round_trip() {
        // Wide enough that the chroma channels keep the minimum filter
        // extent at the deepest level.
        let width = 48;
        let height = 24;
        let pitch = 2 * width;

        let mut data = vec![0u8; pitch * height];
        for y in 0..height {
            for x in 0..width {
                data[y * pitch + 2 * x] = ((x * 7 + y) % 256) as u8;
                data[y * pitch + 2 * x + 1] = ((x * 2 + y * 9) % 256) as u8;
            }
        }
        let frame = RasterFrame::new(PixelFormat::Uyvy, width, height, pitch, &data).unwrap();

        let mut transforms = channel_transforms(PixelFormat::Uyvy, width, height);
        encode_group(&[&frame], &mut transforms).unwrap();

        // Luma sits at the odd bytes of a UYVY row.
        let mut luma = Plane::new(width, height).unwrap();
        transforms[0].decode_plane(&mut luma).unwrap();
        for y in 0..height {
            for x in 0..width {
                let expect = u16::from(data[y * pitch + 2 * x + 1]);
                assert_eq!(luma.row(y)[x], expect, "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn verify_rgb30_encode_round_trip() {
        let width = 32;
        let height = 24;
        let pitch = 4 * width;

        // Multiples of four survive the 10-bit prescale shift without loss.
        let sample = |c: usize, x: usize, y: usize| (((x * 5 + y * 3 + c * 40) % 250) * 4) as u32;

        let mut data = vec![0u8; pitch * height];
        for y in 0..height {
            for x in 0..width {
                let word = sample(2, x, y) << 20 | sample(1, x, y) << 10 | sample(0, x, y);
                let offset = y * pitch + 4 * x;
                data[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
            }
        }
        let frame = RasterFrame::new(PixelFormat::Rgb30, width, height, pitch, &data).unwrap();

        let mut transforms = channel_transforms(PixelFormat::Rgb30, width, height);
        encode_group(&[&frame], &mut transforms).unwrap();

        for (channel, transform) in transforms.iter_mut().enumerate() {
            let mut plane = Plane::new(width, height).unwrap();
            transform.decode_plane(&mut plane).unwrap();
            for y in 0..height {
                for x in 0..width {
                    assert_eq!(
                        u32::from(plane.row(y)[x]),
                        sample(channel, x, y),
                        "ch {} ({}, {})",
                        channel,
                        x,
                        y
                    );
                }
            }
        }
    }

    #[test]
    fn verify_v210_encode_round_trip() {
        let width = 48;
        let height = 32;
        let pitch = width / 6 * 16;

        // Multiples of four survive the 10-bit prescale shift without loss.
        let luma = |x: usize, y: usize| (((x + y) % 250) * 4) as u16;
        let chroma = |x: usize, y: usize, c: usize| (((x * 2 + y + c * 50) % 250) * 4) as u16;
        let cb = |x: usize, y: usize| chroma(x, y, 0);
        let cr = |x: usize, y: usize| chroma(x, y, 1);

        // Pack each group in the Cr Y0 Cb Y1 sample order, three samples
        // per word from the low bits up.
        let mut data = vec![0u8; pitch * height];
        for y in 0..height {
            for group in 0..width / 6 {
                let gx = 6 * group;
                let cx = 3 * group;
                let words: [u32; 4] = [
                    u32::from(cr(cx, y))
                        | u32::from(luma(gx, y)) << 10
                        | u32::from(cb(cx, y)) << 20,
                    u32::from(luma(gx + 1, y))
                        | u32::from(cr(cx + 1, y)) << 10
                        | u32::from(luma(gx + 2, y)) << 20,
                    u32::from(cb(cx + 1, y))
                        | u32::from(luma(gx + 3, y)) << 10
                        | u32::from(cr(cx + 2, y)) << 20,
                    u32::from(luma(gx + 4, y))
                        | u32::from(cb(cx + 2, y)) << 10
                        | u32::from(luma(gx + 5, y)) << 20,
                ];
                for (index, word) in words.iter().enumerate() {
                    let offset = y * pitch + 16 * group + 4 * index;
                    data[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
                }
            }
        }
        let frame = RasterFrame::new(PixelFormat::V210, width, height, pitch, &data).unwrap();

        let mut transforms = channel_transforms(PixelFormat::V210, width, height);
        encode_group(&[&frame], &mut transforms).unwrap();

        let mut y_plane = Plane::new(width, height).unwrap();
        transforms[0].decode_plane(&mut y_plane).unwrap();
        for y in 0..height {
            for x in 0..width {
                assert_eq!(y_plane.row(y)[x], luma(x, y), "luma ({}, {})", x, y);
            }
        }

        let mut cr_plane = Plane::new(width / 2, height).unwrap();
        transforms[2].decode_plane(&mut cr_plane).unwrap();
        for y in 0..height {
            for x in 0..width / 2 {
                assert_eq!(cr_plane.row(y)[x], chroma(x, y, 1), "cr ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn verify_rgb_planar_encode_round_trip() {
        let width = 32;
        let height = 32;
        let pitch = 2 * width;

        // Multiples of four survive both 12-bit prescale shifts.
        let sample = |plane: usize, x: usize, y: usize| (((x * 5 + y * 3 + plane * 77) % 999) * 4) as u16;

        let mut data = vec![0u8; pitch * 3 * height];
        for plane in 0..3 {
            for y in 0..height {
                for x in 0..width {
                    let offset = (plane * height + y) * pitch + 2 * x;
                    data[offset..offset + 2].copy_from_slice(&sample(plane, x, y).to_le_bytes());
                }
            }
        }
        let frame = RasterFrame::new(PixelFormat::RgbPlanar12, width, height, pitch, &data).unwrap();

        let mut transforms = channel_transforms(PixelFormat::RgbPlanar12, width, height);
        encode_group(&[&frame], &mut transforms).unwrap();

        for (plane_index, transform) in transforms.iter_mut().enumerate() {
            let mut plane = Plane::new(width, height).unwrap();
            transform.decode_plane(&mut plane).unwrap();
            for y in 0..height {
                for x in 0..width {
                    assert_eq!(
                        plane.row(y)[x],
                        sample(plane_index, x, y),
                        "plane {} ({}, {})",
                        plane_index,
                        x,
                        y
                    );
                }
            }
        }
    }

    #[test]
    fn verify_byr3_encode_round_trip() {
        let width = 64;
        let height = 48;
        let pitch = 4 * width;

        // Multiples of four survive the 10-bit prescale shift without loss.
        let mut data = vec![0u8; pitch * height / 2];
        for macro_row in 0..height / 2 {
            for segment in 0..4 {
                for x in 0..width / 2 {
                    let value = (((macro_row * 7 + segment * 13 + x) % 256) * 4) as u16;
                    let offset = macro_row * pitch + segment * width + 2 * x;
                    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
                }
            }
        }
        let frame = RasterFrame::new(PixelFormat::Byr3, width, height, pitch, &data).unwrap();

        let mut transforms = channel_transforms(PixelFormat::Byr3, width, height);
        encode_group(&[&frame], &mut transforms).unwrap();

        for (channel, transform) in transforms.iter_mut().enumerate() {
            let mut plane = Plane::new(width / 2, height / 2).unwrap();
            transform.decode_plane(&mut plane).unwrap();
            for macro_row in 0..height / 2 {
                for x in 0..width / 2 {
                    let expect = (((macro_row * 7 + channel * 13 + x) % 256) * 4) as u16;
                    assert_eq!(
                        plane.row(macro_row)[x],
                        expect,
                        "ch {} ({}, {})",
                        channel,
                        x,
                        macro_row
                    );
                }
            }
        }
    }
}
