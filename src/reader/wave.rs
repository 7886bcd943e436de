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
use std::io::{self, Read, Seek, SeekFrom};

use hound::WavReader;
use tracing::debug;

use crate::file_format::{AudioFileFormat, AudioFileType};
use crate::format::AudioFormat;
use crate::spi::{AudioFileReader, ReaderError};
use crate::stream::{AudioInputStream, MediaSource};

/// Reads RIFF/WAVE files holding integer PCM or IEEE float samples, including
/// WAVE_FORMAT_EXTENSIBLE files with those subformats. The decoded stream is
/// the data chunk as stored: little-endian, unsigned for 8-bit samples.
pub struct WaveFileReader;

impl WaveFileReader {
    /// Maps a hound spec onto the format of the raw data chunk. Samples stored
    /// in wider containers than their bit depth needs are declined.
    fn data_format(spec: &hound::WavSpec, stored_bytes: u16) -> Result<AudioFormat, ReaderError> {
        let bits = i32::from(spec.bits_per_sample);
        if i32::from(stored_bytes) != (bits + 7) / 8 {
            return Err(ReaderError::Unsupported(format!(
                "{}-bit samples stored in {} bytes",
                bits, stored_bytes
            )));
        }

        let sample_rate = spec.sample_rate as f32;
        let channels = i32::from(spec.channels);
        Ok(match spec.sample_format {
            hound::SampleFormat::Float => AudioFormat::float(sample_rate, bits, channels, false),
            // 8-bit WAVE data is unsigned, wider samples are signed.
            hound::SampleFormat::Int => {
                AudioFormat::pcm(sample_rate, bits, channels, bits > 8, false)
            }
        })
    }

    /// Parses the header at the current position of `source`, leaving the
    /// source positioned at the start of the sample data.
    fn read_header<R: Read>(source: R) -> Result<WavReader<R>, ReaderError> {
        WavReader::new(source).map_err(|e| match e {
            hound::Error::IoError(e) => ReaderError::Io(e),
            other => ReaderError::Unsupported(other.to_string()),
        })
    }

    /// Returns the bytes each stored sample occupies, from the block alignment
    /// of the fmt chunk. Chunks are walked the way hound walks them.
    fn stored_sample_bytes<R: Read>(mut source: R) -> Result<u16, ReaderError> {
        let mut riff = [0u8; 12];
        source.read_exact(&mut riff)?;
        loop {
            let mut header = [0u8; 8];
            source.read_exact(&mut header)?;
            let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            if &header[..4] == b"fmt " {
                let mut fmt = [0u8; 14];
                source.read_exact(&mut fmt)?;
                let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
                let block_align = u16::from_le_bytes([fmt[12], fmt[13]]);
                if channels == 0 {
                    return Err(ReaderError::Unsupported("zero channels".to_string()));
                }
                return Ok(block_align / channels);
            }
            io::copy(&mut (&mut source).take(u64::from(len)), &mut io::sink())?;
        }
    }

    /// Reads the format of the WAVE file at the current position of `source`
    /// and its length in frames. The position is restored on return.
    fn describe(source: &mut dyn MediaSource) -> Result<(AudioFormat, u32), ReaderError> {
        let start = source.stream_position()?;
        let end = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(start))?;

        let mut magic = Vec::with_capacity(12);
        let sniffed = (&mut *source).take(12).read_to_end(&mut magic);
        source.seek(SeekFrom::Start(start))?;
        sniffed?;
        if AudioFileType::sniff(&magic) != Some(AudioFileType::Wave) {
            return Err(ReaderError::Unsupported("no RIFF/WAVE header".to_string()));
        }

        let header =
            Self::read_header(&mut *source).map(|reader| (reader.spec(), reader.duration()));
        let stopped_at = source.stream_position()?;
        source.seek(SeekFrom::Start(start))?;
        let (spec, frames) = match header {
            // hound does not report running out of header as UnexpectedEof.
            Err(ReaderError::Io(e)) if stopped_at >= end => {
                return Err(ReaderError::Unsupported(format!(
                    "truncated WAVE header: {}",
                    e
                )));
            }
            other => other?,
        };

        let stored = Self::stored_sample_bytes(&mut *source);
        source.seek(SeekFrom::Start(start))?;
        let format = Self::data_format(&spec, stored?)?;
        debug!(
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            bits = spec.bits_per_sample,
            "Recognized WAVE header."
        );
        Ok((format, frames))
    }
}

impl AudioFileReader for WaveFileReader {
    fn name(&self) -> &'static str {
        "wave"
    }

    fn audio_file_format(
        &self,
        source: &mut dyn MediaSource,
    ) -> Result<AudioFileFormat, ReaderError> {
        let start = source.stream_position()?;
        let end = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(start))?;

        let (format, frames) = Self::describe(source)?;
        Ok(AudioFileFormat::new(
            AudioFileType::Wave,
            (end - start) as i64,
            format,
            i64::from(frames),
        ))
    }

    fn audio_input_stream(
        &self,
        mut source: Box<dyn MediaSource>,
        file_format: &AudioFileFormat,
    ) -> Result<AudioInputStream, ReaderError> {
        let (format, frames) = Self::describe(&mut *source)?;
        let frame_length = i64::from(frames);

        // Skip to the first sample frame.
        let reader = Self::read_header(source)?;
        let data_bytes = frame_length as u64 * format.frame_size() as u64;
        let data = reader.into_inner().take(data_bytes);

        debug_assert_eq!(file_format.format(), &format);
        Ok(AudioInputStream::new(data, format, frame_length))
    }
}
