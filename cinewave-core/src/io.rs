// Cinewave
// Copyright (c) 2019-2022 The Project Cinewave Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements composable byte-level I/O.
//!
//! All multi-byte integers are read and written little-endian. Four-character
//! codes are the exception: the four ASCII characters appear in reading order
//! on disk regardless of the host byte order, so a tag is handled as a plain
//! four-byte array rather than as an integer.

use std::io;

use crate::errors::Result;

/// A four-character code identifying a chunk in a binary container.
///
/// The code is stored as the raw bytes in reading order, which is also the
/// on-disk order on every platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FourCc([u8; 4]);

impl FourCc {
    /// Instantiate a FourCC from a byte literal such as `b"band"`.
    pub const fn new(tag: &[u8; 4]) -> FourCc {
        FourCc(*tag)
    }

    /// The four tag bytes in reading order.
    pub const fn bytes(&self) -> [u8; 4] {
        self.0
    }
}

impl std::fmt::Display for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.0.iter() {
            let c = if b.is_ascii_graphic() { char::from(b) } else { '.' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// `ReadBytes` provides methods to read bytes and little-endian integers from
/// any source implementing [`std::io::Read`].
pub trait ReadBytes {
    /// Reads a single byte and returns it.
    fn read_u8(&mut self) -> Result<u8>;

    /// Reads two bytes and interprets them as a little-endian u16.
    fn read_u16(&mut self) -> Result<u16>;

    /// Reads four bytes and interprets them as a little-endian u32.
    fn read_u32(&mut self) -> Result<u32>;

    /// Reads four bytes in reading order and returns them as a FourCC.
    fn read_quad(&mut self) -> Result<FourCc>;

    /// Reads exactly the number of bytes required to fill the buffer.
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()>;
}

impl<R: io::Read> ReadBytes for R {
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_quad(&mut self) -> Result<FourCc> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(FourCc(buf))
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.read_exact(buf)?;
        Ok(())
    }
}

/// `WriteBytes` provides methods to write bytes and little-endian integers to
/// any sink implementing [`std::io::Write`].
pub trait WriteBytes {
    /// Writes a single byte.
    fn write_u8(&mut self, value: u8) -> Result<()>;

    /// Writes a u16 as two little-endian bytes.
    fn write_u16(&mut self, value: u16) -> Result<()>;

    /// Writes a u32 as four little-endian bytes.
    fn write_u32(&mut self, value: u32) -> Result<()>;

    /// Writes the four FourCC bytes in reading order.
    fn write_quad(&mut self, tag: FourCc) -> Result<()>;

    /// Writes the entire buffer.
    fn write_buf(&mut self, buf: &[u8]) -> Result<()>;
}

impl<W: io::Write> WriteBytes for W {
    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_all(&[value])?;
        Ok(())
    }

    fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_quad(&mut self, tag: FourCc) -> Result<()> {
        self.write_all(&tag.bytes())?;
        Ok(())
    }

    fn write_buf(&mut self, buf: &[u8]) -> Result<()> {
        self.write_all(buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_little_endian_round_trip() {
        let mut buf = Vec::new();
        buf.write_u16(0x1234).unwrap();
        buf.write_u32(0xdead_beef).unwrap();
        assert_eq!(&buf, &[0x34, 0x12, 0xef, 0xbe, 0xad, 0xde]);

        let mut cursor = std::io::Cursor::new(buf);
        assert_eq!(cursor.read_u16().unwrap(), 0x1234);
        assert_eq!(cursor.read_u32().unwrap(), 0xdead_beef);
    }

    #[test]
    fn verify_fourcc_on_disk_order() {
        // The tag characters must appear in reading order on disk even though
        // the host is little-endian.
        let mut buf = Vec::new();
        buf.write_quad(FourCc::new(b"band")).unwrap();
        assert_eq!(&buf, b"band");

        let mut cursor = std::io::Cursor::new(buf);
        let tag = cursor.read_quad().unwrap();
        assert_eq!(tag, FourCc::new(b"band"));
        assert_eq!(tag.to_string(), "band");
    }
}
