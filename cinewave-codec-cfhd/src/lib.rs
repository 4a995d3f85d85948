// Cinewave
// Copyright (c) 2019-2022 The Project Cinewave Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The CFHD wavelet transform and subband coding engine.
//!
//! The engine builds a multi-level wavelet pyramid over each color channel of
//! a video frame (or a two-frame group), quantizes the highpass subbands, and
//! reconstructs planar 16-bit unsigned rasters from the pyramid. A FourCC
//! framed band file serializer is provided for bit-exact cross-version
//! debugging.
//!
//! Each color channel owns an independent [`transform::Transform`] and a
//! disjoint scratch buffer, so channels of the same frame may be processed on
//! parallel workers without any synchronization inside the engine.

pub mod bandfile;
pub mod filter;
pub mod image;
pub mod ingest;
pub mod quantize;
pub mod transform;
