// Cinewave
// Copyright (c) 2019-2022 The Project Cinewave Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `bandfile` module reads and writes binary files that contain wavelet
//! band data, for debugging.
//!
//! A band file can contain bands from multiple frames, one or more channels
//! per frame, and any combination of wavelet bands in a channel, so bands
//! computed by different versions of the codec can be compared bit for bit.
//!
//! Every chunk starts with an eight-byte common header: a FourCC type and the
//! total chunk size. A header of a particular kind is not repeated when the
//! previous header of that kind still applies; for example one `wave` header
//! covers all of the bands written for that wavelet. The recommended read
//! path is [`BandFileReader::find_next_band`] followed by
//! [`BandFileReader::read_band_data`].

use std::io::{Read, Write};

use log::warn;

use cinewave_core::errors::{
    bad_argument_error, band_file_error, unexpected_error, BandFileErrorKind, CodecError, Result,
};
use cinewave_core::io::{FourCc, ReadBytes, WriteBytes};

use crate::image::PixelType;
use crate::transform::Transform;

const BAND_HEADER_FILE: FourCc = FourCc::new(b"file");
const BAND_HEADER_FRAME: FourCc = FourCc::new(b"fram");
const BAND_HEADER_CHANNEL: FourCc = FourCc::new(b"chan");
const BAND_HEADER_WAVELET: FourCc = FourCc::new(b"wave");
const BAND_HEADER_DATA: FourCc = FourCc::new(b"band");

const FILE_HEADER_SIZE: u32 = 16;
const INDEX_HEADER_SIZE: u32 = 12;
const BAND_HEADER_SIZE: u32 = 20;

/// Data type of the coefficients in one band of the band file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BandType {
    UInt16,
    Int16,
    /// Encoded band data (reserved block).
    Encoded,
    /// Encoded band data using run-length packing.
    EncodedRuns,
}

impl BandType {
    pub fn to_u16(self) -> u16 {
        match self {
            BandType::UInt16 => 0,
            BandType::Int16 => 1,
            BandType::Encoded => 16,
            BandType::EncodedRuns => 17,
        }
    }

    pub fn from_u16(value: u16) -> Option<BandType> {
        match value {
            0 => Some(BandType::UInt16),
            1 => Some(BandType::Int16),
            16 => Some(BandType::Encoded),
            17 => Some(BandType::EncodedRuns),
            _ => None,
        }
    }
}

/// The parameters of the band found by
/// [`BandFileReader::find_next_band`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BandEntry {
    pub frame: u32,
    pub channel: u16,
    pub wavelet: u16,
    pub band: u16,
    pub band_type: BandType,
    pub width: u16,
    pub height: u16,
    pub size: u32,
}

/// Append-only writer for band files.
///
/// The writer remembers the most recent frame, channel, wavelet, and band
/// indices and emits a header chunk only when the corresponding index
/// changes. Headers cascade: a new frame forces a channel header, a new
/// channel forces a wavelet header, and a new wavelet forces a band header,
/// exactly as the reference stream layout requires.
pub struct BandFileWriter<W: Write> {
    inner: W,
    frame: u32,
    channel: u16,
    wavelet: u16,
    band: u16,
    band_type: u16,
    file_header_written: bool,
    frame_header_written: bool,
    channel_header_written: bool,
    wavelet_header_written: bool,
    band_header_written: bool,
}

impl<W: Write> BandFileWriter<W> {
    pub fn new(inner: W) -> BandFileWriter<W> {
        BandFileWriter {
            inner,
            frame: 0,
            channel: 0,
            wavelet: 0,
            band: 0,
            band_type: 0,
            file_header_written: false,
            frame_header_written: false,
            channel_header_written: false,
            wavelet_header_written: false,
            band_header_written: false,
        }
    }

    /// Write the file header. Must be the first write; the maximum band
    /// dimensions let a reader allocate one buffer for every band.
    pub fn write_file_header(&mut self, max_band_width: u16, max_band_height: u16) -> Result<()> {
        if self.file_header_written {
            return bad_argument_error("band file header already written");
        }

        self.inner.write_quad(BAND_HEADER_FILE)?;
        self.inner.write_u32(FILE_HEADER_SIZE)?;
        self.inner.write_u16(max_band_width)?;
        self.inner.write_u16(max_band_height)?;
        let max_band_size = u32::from(max_band_width) * u32::from(max_band_height) * 2;
        self.inner.write_u32(max_band_size)?;

        self.file_header_written = true;
        self.frame_header_written = false;
        Ok(())
    }

    /// Write one band payload, preceded by whichever headers changed since
    /// the previous write.
    #[allow(clippy::too_many_arguments)]
    pub fn write_band(
        &mut self,
        frame: u32,
        channel: u16,
        wavelet: u16,
        band: u16,
        band_type: BandType,
        width: u16,
        height: u16,
        data: &[u8],
    ) -> Result<()> {
        if !self.file_header_written {
            return bad_argument_error("band data written before the band file header");
        }
        // A repeated identical band would leave its payload with no framing
        // header, so the stream could not be parsed back.
        if self.band_header_written
            && self.frame == frame
            && self.channel == channel
            && self.wavelet == wavelet
            && self.band == band
            && self.band_type == band_type.to_u16()
        {
            return bad_argument_error("consecutive writes of the same band are not framed");
        }

        if !self.frame_header_written || self.frame != frame {
            self.write_frame_header(frame)?;
        }
        if !self.channel_header_written || self.channel != channel {
            self.write_channel_header(channel)?;
        }
        if !self.wavelet_header_written || self.wavelet != wavelet {
            self.write_wavelet_header(wavelet)?;
        }
        if !self.band_header_written || self.band != band || self.band_type != band_type.to_u16() {
            self.write_band_header(band, band_type, width, height, data.len() as u32)?;
        }

        self.inner.write_buf(data)?;
        Ok(())
    }

    /// Convenience wrapper writing signed 16-bit coefficients through a
    /// byte view of the coefficient memory.
    #[allow(clippy::too_many_arguments)]
    pub fn write_band_i16(
        &mut self,
        frame: u32,
        channel: u16,
        wavelet: u16,
        band: u16,
        band_type: BandType,
        width: u16,
        height: u16,
        data: &[i16],
    ) -> Result<()> {
        self.write_band(
            frame,
            channel,
            wavelet,
            band,
            band_type,
            width,
            height,
            bytemuck::cast_slice(data),
        )
    }

    fn write_frame_header(&mut self, frame: u32) -> Result<()> {
        self.inner.write_quad(BAND_HEADER_FRAME)?;
        self.inner.write_u32(INDEX_HEADER_SIZE)?;
        self.inner.write_u32(frame)?;

        self.frame = frame;
        self.frame_header_written = true;
        self.channel_header_written = false;
        Ok(())
    }

    fn write_channel_header(&mut self, channel: u16) -> Result<()> {
        self.inner.write_quad(BAND_HEADER_CHANNEL)?;
        self.inner.write_u32(INDEX_HEADER_SIZE)?;
        self.inner.write_u16(channel)?;
        self.inner.write_u16(0)?;

        self.channel = channel;
        self.channel_header_written = true;
        self.wavelet_header_written = false;
        Ok(())
    }

    fn write_wavelet_header(&mut self, wavelet: u16) -> Result<()> {
        self.inner.write_quad(BAND_HEADER_WAVELET)?;
        self.inner.write_u32(INDEX_HEADER_SIZE)?;
        self.inner.write_u16(wavelet)?;
        self.inner.write_u16(0)?;

        self.wavelet = wavelet;
        self.wavelet_header_written = true;
        self.band_header_written = false;
        Ok(())
    }

    fn write_band_header(
        &mut self,
        band: u16,
        band_type: BandType,
        width: u16,
        height: u16,
        size: u32,
    ) -> Result<()> {
        self.inner.write_quad(BAND_HEADER_DATA)?;
        self.inner.write_u32(BAND_HEADER_SIZE)?;
        self.inner.write_u16(band)?;
        self.inner.write_u16(band_type.to_u16())?;
        self.inner.write_u16(width)?;
        self.inner.write_u16(height)?;
        self.inner.write_u32(size)?;

        self.band = band;
        self.band_type = band_type.to_u16();
        self.band_header_written = true;
        Ok(())
    }

    /// Flush and return the underlying sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reader for band files.
///
/// The reader walks the chunk stream, folding every header it encounters into
/// its current (frame, channel, wavelet, band) state, and stops at each data
/// chunk for the caller to pull the coefficient bytes.
pub struct BandFileReader<R: Read> {
    inner: R,
    frame: u32,
    channel: u16,
    wavelet: u16,
    max_band_width: u16,
    max_band_height: u16,
    max_band_size: u32,
}

impl<R: Read> BandFileReader<R> {
    pub fn new(inner: R) -> BandFileReader<R> {
        BandFileReader {
            inner,
            frame: 0,
            channel: 0,
            wavelet: 0,
            max_band_width: 0,
            max_band_height: 0,
            max_band_size: 0,
        }
    }

    /// Maximum band width declared by the file header, once seen.
    pub fn max_band_width(&self) -> u16 {
        self.max_band_width
    }

    pub fn max_band_height(&self) -> u16 {
        self.max_band_height
    }

    pub fn max_band_size(&self) -> u32 {
        self.max_band_size
    }

    /// Advance to the next band data chunk.
    ///
    /// Returns `Ok(None)` at a clean end of file. A truncated chunk is a
    /// read error.
    pub fn find_next_band(&mut self) -> Result<Option<BandEntry>> {
        loop {
            let tag = match self.read_chunk_tag()? {
                Some(tag) => tag,
                None => return Ok(None),
            };
            let size = self.inner.read_u32()?;

            if tag == BAND_HEADER_FILE {
                self.expect_size(size, FILE_HEADER_SIZE)?;
                self.max_band_width = self.inner.read_u16()?;
                self.max_band_height = self.inner.read_u16()?;
                self.max_band_size = self.inner.read_u32()?;
            }
            else if tag == BAND_HEADER_FRAME {
                self.expect_size(size, INDEX_HEADER_SIZE)?;
                self.frame = self.inner.read_u32()?;
            }
            else if tag == BAND_HEADER_CHANNEL {
                self.expect_size(size, INDEX_HEADER_SIZE)?;
                self.channel = self.inner.read_u16()?;
                let _reserved = self.inner.read_u16()?;
            }
            else if tag == BAND_HEADER_WAVELET {
                self.expect_size(size, INDEX_HEADER_SIZE)?;
                self.wavelet = self.inner.read_u16()?;
                let _reserved = self.inner.read_u16()?;
            }
            else if tag == BAND_HEADER_DATA {
                self.expect_size(size, BAND_HEADER_SIZE)?;
                let band = self.inner.read_u16()?;
                let type_code = self.inner.read_u16()?;
                let width = self.inner.read_u16()?;
                let height = self.inner.read_u16()?;
                let data_size = self.inner.read_u32()?;

                let band_type = match BandType::from_u16(type_code) {
                    Some(band_type) => band_type,
                    None => return unexpected_error("unknown band data type"),
                };

                return Ok(Some(BandEntry {
                    frame: self.frame,
                    channel: self.channel,
                    wavelet: self.wavelet,
                    band,
                    band_type,
                    width,
                    height,
                    size: data_size,
                }));
            }
            else {
                warn!("unknown band file chunk {}", tag);
                return unexpected_error("unknown band file chunk type");
            }
        }
    }

    /// Read the payload of the band found by
    /// [`find_next_band`](BandFileReader::find_next_band). The buffer length
    /// must equal the entry's size.
    pub fn read_band_data(&mut self, data: &mut [u8]) -> Result<()> {
        self.inner.read_buf_exact(data).map_err(read_failed)
    }

    /// Read a band payload of signed 16-bit coefficients through a byte view
    /// of the destination buffer.
    pub fn read_band_data_i16(&mut self, data: &mut [i16]) -> Result<()> {
        self.inner.read_buf_exact(bytemuck::cast_slice_mut(data)).map_err(read_failed)
    }

    /// Read the next chunk tag, distinguishing a clean end of file from a
    /// truncated one.
    fn read_chunk_tag(&mut self) -> Result<Option<FourCc>> {
        let mut tag = [0u8; 4];
        let mut filled = 0;

        while filled < 4 {
            match self.inner.read(&mut tag[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => (),
                Err(err) => return Err(CodecError::IoError(err)),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        if filled < 4 {
            return band_file_error(BandFileErrorKind::ReadFailed);
        }
        Ok(Some(FourCc::new(&tag)))
    }

    fn expect_size(&self, actual: u32, expect: u32) -> Result<()> {
        if actual != expect {
            return band_file_error(BandFileErrorKind::ReadFailed);
        }
        Ok(())
    }
}

fn read_failed(_: CodecError) -> CodecError {
    CodecError::BandFile(BandFileErrorKind::ReadFailed)
}

/// Write selected bands of a channel's pyramid into a band file.
///
/// Each bit of `wavelet_mask` selects the wavelet with that index, and each
/// bit of `band_mask` selects the band with that index within every selected
/// wavelet. Band rows are serialized without their stride padding, so files
/// from builds with different alignment still compare equal.
pub fn write_transform_bands<W: Write>(
    writer: &mut BandFileWriter<W>,
    frame: u32,
    channel: u16,
    transform: &Transform,
    wavelet_mask: u32,
    band_mask: u32,
) -> Result<()> {
    for wavelet_index in 0..transform.wavelet_count() {
        if wavelet_mask & (1 << wavelet_index) == 0 {
            continue;
        }
        let wavelet = match transform.wavelet(wavelet_index) {
            Some(wavelet) => wavelet,
            None => return unexpected_error("selected wavelet missing from the transform"),
        };

        for band in 0..wavelet.band_count() {
            if band_mask & (1 << band) == 0 {
                continue;
            }

            let band_type = match wavelet.pixel_type(band) {
                PixelType::RunsInt16 => BandType::EncodedRuns,
                PixelType::UInt16 => BandType::UInt16,
                _ => BandType::Int16,
            };

            let mut data = Vec::with_capacity(wavelet.width() * wavelet.height());
            for row in 0..wavelet.height() {
                data.extend_from_slice(wavelet.band_row(band, row));
            }

            writer.write_band_i16(
                frame,
                channel,
                wavelet_index as u16,
                band as u16,
                band_type,
                wavelet.width() as u16,
                wavelet.height() as u16,
                &data,
            )?;
        }
    }
    Ok(())
}
