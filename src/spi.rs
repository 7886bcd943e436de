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
//! Capabilities implemented by the providers the audio system consults.

pub mod error;

pub use error::{ConversionError, ReaderError};

use crate::file_format::AudioFileFormat;
use crate::format::{AudioFormat, Encoding};
use crate::stream::{AudioInputStream, MediaSource};

/// Recognises and decodes one family of audio files.
pub trait AudioFileReader: Send + Sync {
    /// A short name used in logs.
    fn name(&self) -> &'static str;

    /// Describes the audio file at the current position of `source`.
    ///
    /// Whether or not the data is recognised, the position of `source` must be
    /// the same on return as it was on entry. Returns
    /// [`ReaderError::Unsupported`] if the data is not understood and
    /// [`ReaderError::Io`] if the source could not be read.
    fn audio_file_format(
        &self,
        source: &mut dyn MediaSource,
    ) -> Result<AudioFileFormat, ReaderError>;

    /// Opens a stream over the audio data of `source`. Only called after
    /// [`AudioFileReader::audio_file_format`] recognised the same source, whose
    /// result is passed back in as `file_format`.
    fn audio_input_stream(
        &self,
        source: Box<dyn MediaSource>,
        file_format: &AudioFileFormat,
    ) -> Result<AudioInputStream, ReaderError>;
}

/// Converts audio streams between formats.
pub trait FormatConversionProvider: Send + Sync {
    /// A short name used in logs.
    fn name(&self) -> &'static str;

    /// Encodings this provider can read.
    fn source_encodings(&self) -> Vec<Encoding>;

    /// Encodings this provider can produce.
    fn target_encodings(&self) -> Vec<Encoding>;

    /// Encodings this provider can produce from `source`.
    fn target_encodings_for(&self, source: &AudioFormat) -> Vec<Encoding>;

    /// Formats with `target_encoding` that `source` can be converted to.
    /// Fields left open by the provider are [`crate::format::NOT_SPECIFIED`].
    fn target_formats(&self, target_encoding: Encoding, source: &AudioFormat) -> Vec<AudioFormat>;

    /// Whether `source` can be converted to exactly `target`. Depends only on
    /// the two descriptors, never on stream contents.
    fn is_conversion_supported(&self, target: &AudioFormat, source: &AudioFormat) -> bool;

    /// Whether `source` can be converted to some format with `target_encoding`.
    fn is_encoding_conversion_supported(
        &self,
        target_encoding: Encoding,
        source: &AudioFormat,
    ) -> bool {
        !self.target_formats(target_encoding, source).is_empty()
    }

    /// Wraps `source` in a stream producing `target`.
    fn convert(
        &self,
        target: &AudioFormat,
        source: AudioInputStream,
    ) -> Result<AudioInputStream, ConversionError>;
}
