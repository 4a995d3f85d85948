// Cinewave
// Copyright (c) 2019-2022 The Project Cinewave Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `BandFileErrorKind` is a list of reasons why reading or writing a band
/// file may fail.
#[derive(Debug)]
pub enum BandFileErrorKind {
    /// The band file could not be opened for reading.
    OpenFailed,
    /// The band file could not be created for writing.
    CreateFailed,
    /// A chunk header or payload was truncated.
    ReadFailed,
    /// A chunk header or payload could not be written.
    WriteFailed,
}

impl BandFileErrorKind {
    fn as_str(&self) -> &'static str {
        match *self {
            BandFileErrorKind::OpenFailed => "could not open band file for reading",
            BandFileErrorKind::CreateFailed => "could not create band file for writing",
            BandFileErrorKind::ReadFailed => "error reading data from the band file",
            BandFileErrorKind::WriteFailed => "error writing data to the band file",
        }
    }
}

/// `CodecError` provides an enumeration of all possible errors reported by
/// the codec core.
///
/// Subsystems that collaborate with the core (the bit-stream reader and the
/// entropy coder) report their own error codes; those are carried through in
/// the `Bitstream` variant so the numeric projection returned by
/// [`CodecError::code`] keeps the top bits identifying the subsystem.
#[derive(Debug)]
pub enum CodecError {
    /// A subroutine argument violated the API contract. Never retried.
    BadArgument(&'static str),
    /// An internal invariant did not hold; indicates a bug in the caller or
    /// in the codec itself.
    Unexpected(&'static str),
    /// A coefficient buffer allocation failed.
    OutOfMemory,
    /// The transform scratch buffer is missing or too small.
    TransformMemory(&'static str),
    /// The encoder cannot handle the source format.
    BadFormat(&'static str),
    /// The format tag or dimensions are not supported.
    InvalidFormat(&'static str),
    /// An error occurred while reading or writing a band file.
    BandFile(BandFileErrorKind),
    /// An IO error occurred while reading, writing, or seeking the stream.
    IoError(io::Error),
    /// A pass-through error code from the bit-stream or entropy subsystem.
    Bitstream(u32),
}

/// Numeric blocks for the error code projection.
///
/// The codec's own errors occupy the block below 0x100. A block starting at
/// 0x100 is reserved for embedded bit-stream error codes and the block
/// starting at 0x400 for application-level errors, which includes the band
/// file codes.
const ERROR_BLOCK_BITSTREAM: u32 = 0x100;
const ERROR_BLOCK_APPLICATION: u32 = 0x400;

impl CodecError {
    /// Project the error onto the numeric code space shared with the other
    /// subsystems of the codec.
    pub fn code(&self) -> u32 {
        match *self {
            CodecError::BadArgument(_) => 0x39,
            CodecError::Unexpected(_) => 0x41,
            CodecError::OutOfMemory => 0x1f,
            CodecError::TransformMemory(_) => 0x2d,
            CodecError::BadFormat(_) => 0x35,
            CodecError::InvalidFormat(_) => 0x37,
            CodecError::BandFile(ref kind) => match *kind {
                BandFileErrorKind::OpenFailed => ERROR_BLOCK_APPLICATION + 2,
                BandFileErrorKind::CreateFailed => ERROR_BLOCK_APPLICATION + 3,
                BandFileErrorKind::ReadFailed => ERROR_BLOCK_APPLICATION + 4,
                BandFileErrorKind::WriteFailed => ERROR_BLOCK_APPLICATION + 5,
            },
            CodecError::IoError(_) => ERROR_BLOCK_APPLICATION + 4,
            CodecError::Bitstream(code) => ERROR_BLOCK_BITSTREAM | code,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CodecError::BadArgument(msg) => {
                write!(f, "bad argument: {}", msg)
            }
            CodecError::Unexpected(msg) => {
                write!(f, "unexpected condition: {}", msg)
            }
            CodecError::OutOfMemory => {
                write!(f, "could not allocate coefficient memory")
            }
            CodecError::TransformMemory(msg) => {
                write!(f, "transform memory: {}", msg)
            }
            CodecError::BadFormat(msg) => {
                write!(f, "bad source format: {}", msg)
            }
            CodecError::InvalidFormat(msg) => {
                write!(f, "invalid format: {}", msg)
            }
            CodecError::BandFile(ref kind) => {
                write!(f, "band file: {}", kind.as_str())
            }
            CodecError::IoError(ref err) => {
                write!(f, "io error: {}", err)
            }
            CodecError::Bitstream(code) => {
                write!(f, "bitstream error code {:#x}", code)
            }
        }
    }
}

impl error::Error for CodecError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            CodecError::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> CodecError {
        CodecError::IoError(err)
    }
}

pub type Result<T> = result::Result<T, CodecError>;

/// Convenience function to create a bad argument error.
pub fn bad_argument_error<T>(msg: &'static str) -> Result<T> {
    Err(CodecError::BadArgument(msg))
}

/// Convenience function to create an unexpected condition error.
pub fn unexpected_error<T>(msg: &'static str) -> Result<T> {
    Err(CodecError::Unexpected(msg))
}

/// Convenience function to create an out-of-memory error.
pub fn out_of_memory_error<T>() -> Result<T> {
    Err(CodecError::OutOfMemory)
}

/// Convenience function to create a transform memory error.
pub fn transform_memory_error<T>(msg: &'static str) -> Result<T> {
    Err(CodecError::TransformMemory(msg))
}

/// Convenience function to create a bad format error.
pub fn bad_format_error<T>(msg: &'static str) -> Result<T> {
    Err(CodecError::BadFormat(msg))
}

/// Convenience function to create an invalid format error.
pub fn invalid_format_error<T>(msg: &'static str) -> Result<T> {
    Err(CodecError::InvalidFormat(msg))
}

/// Convenience function to create a band file error.
pub fn band_file_error<T>(kind: BandFileErrorKind) -> Result<T> {
    Err(CodecError::BandFile(kind))
}
