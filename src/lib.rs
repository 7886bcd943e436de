// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! A sampled-audio system: identify audio files with a fixed list of readers,
//! convert between formats with a fixed list of codecs, and play audio
//! through an output line.

pub mod codec;
pub mod config;
pub mod error;
pub mod file_format;
pub mod format;
pub mod line;
pub mod reader;
pub mod spi;
pub mod stream;
pub mod system;
pub mod util;

#[cfg(test)]
mod testutil;

pub use error::AudioSystemError;
pub use file_format::{AudioFileFormat, AudioFileType};
pub use format::{AudioFormat, Encoding, NOT_SPECIFIED, NOT_SPECIFIED_RATE};
pub use stream::{AudioInputStream, MediaSource};
