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

//! Providers that record how the audio system drives them.

use std::io::{self, Read, SeekFrom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::file_format::{AudioFileFormat, AudioFileType};
use crate::format::{AudioFormat, Encoding, NOT_SPECIFIED};
use crate::spi::{AudioFileReader, ConversionError, FormatConversionProvider, ReaderError};
use crate::stream::{AudioInputStream, MediaSource};

/// What a spy reader does when asked to describe a source.
#[derive(Clone)]
pub enum Behavior {
    /// Recognises any source as the given format.
    Recognize(AudioFormat),
    /// Rejects the source and restores its position.
    Reject,
    /// Rejects the source but leaves it moved on by the given number of bytes.
    RejectAndMove(i64),
    /// Fails with an I/O error.
    Fail,
}

/// A reader that counts its calls and records the source position it was
/// handed on each describe.
pub struct SpyReader {
    name: &'static str,
    behavior: Behavior,
    describes: Arc<AtomicUsize>,
    decodes: Arc<AtomicUsize>,
    positions: Arc<Mutex<Vec<u64>>>,
}

impl SpyReader {
    pub fn new(name: &'static str, behavior: Behavior) -> SpyReader {
        SpyReader {
            name,
            behavior,
            describes: Arc::new(AtomicUsize::new(0)),
            decodes: Arc::new(AtomicUsize::new(0)),
            positions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn describes(&self) -> usize {
        self.describes.load(Ordering::SeqCst)
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    /// Source positions seen on entry to each describe call.
    pub fn positions(&self) -> Vec<u64> {
        self.positions.lock().clone()
    }

    fn file_format(format: AudioFormat) -> AudioFileFormat {
        AudioFileFormat::new(
            AudioFileType::Wave,
            i64::from(NOT_SPECIFIED),
            format,
            i64::from(NOT_SPECIFIED),
        )
    }
}

impl AudioFileReader for SpyReader {
    fn name(&self) -> &'static str {
        self.name
    }

    fn audio_file_format(
        &self,
        source: &mut dyn MediaSource,
    ) -> Result<AudioFileFormat, ReaderError> {
        self.describes.fetch_add(1, Ordering::SeqCst);
        self.positions.lock().push(source.stream_position()?);

        match &self.behavior {
            Behavior::Recognize(format) => Ok(Self::file_format(*format)),
            Behavior::Reject => Err(ReaderError::Unsupported(format!(
                "{} does not know this data",
                self.name
            ))),
            Behavior::RejectAndMove(offset) => {
                source.seek(SeekFrom::Current(*offset))?;
                Err(ReaderError::Unsupported(format!(
                    "{} does not know this data",
                    self.name
                )))
            }
            Behavior::Fail => Err(ReaderError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("{} lost the source", self.name),
            ))),
        }
    }

    fn audio_input_stream(
        &self,
        mut source: Box<dyn MediaSource>,
        file_format: &AudioFileFormat,
    ) -> Result<AudioInputStream, ReaderError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);

        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        Ok(AudioInputStream::new(
            io::Cursor::new(data),
            *file_format.format(),
            i64::from(NOT_SPECIFIED),
        ))
    }
}

/// A codec that counts its calls. It claims the conversions it was told to
/// and converts by relabelling the source bytes.
pub struct SpyCodec {
    name: &'static str,
    supported: bool,
    formats: Vec<AudioFormat>,
    queries: Arc<AtomicUsize>,
    conversions: Arc<AtomicUsize>,
}

impl SpyCodec {
    pub fn new(name: &'static str, supported: bool, formats: Vec<AudioFormat>) -> SpyCodec {
        SpyCodec {
            name,
            supported,
            formats,
            queries: Arc::new(AtomicUsize::new(0)),
            conversions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times the codec was asked about a conversion.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn conversions(&self) -> usize {
        self.conversions.load(Ordering::SeqCst)
    }

    /// Total calls of any kind.
    pub fn calls(&self) -> usize {
        self.queries() + self.conversions()
    }
}

impl FormatConversionProvider for SpyCodec {
    fn name(&self) -> &'static str {
        self.name
    }

    fn source_encodings(&self) -> Vec<Encoding> {
        vec![Encoding::PcmSigned]
    }

    fn target_encodings(&self) -> Vec<Encoding> {
        let mut encodings: Vec<Encoding> = self.formats.iter().map(|f| f.encoding()).collect();
        encodings.dedup();
        encodings
    }

    fn target_encodings_for(&self, _source: &AudioFormat) -> Vec<Encoding> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.target_encodings()
    }

    fn target_formats(&self, target_encoding: Encoding, _source: &AudioFormat) -> Vec<AudioFormat> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.formats
            .iter()
            .filter(|f| f.encoding() == target_encoding)
            .copied()
            .collect()
    }

    fn is_conversion_supported(&self, _target: &AudioFormat, _source: &AudioFormat) -> bool {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.supported
    }

    fn convert(
        &self,
        target: &AudioFormat,
        source: AudioInputStream,
    ) -> Result<AudioInputStream, ConversionError> {
        self.conversions.fetch_add(1, Ordering::SeqCst);
        let frame_length = source.frame_length();
        Ok(AudioInputStream::from_boxed(
            source.into_inner(),
            *target,
            frame_length,
        ))
    }
}
