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
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::file_format::{AudioFileFormat, AudioFileType};
use crate::format::{AudioFormat, NOT_SPECIFIED};
use crate::spi::{AudioFileReader, ReaderError};
use crate::stream::{AudioInputStream, MediaSource};

/// How much of a source is buffered to describe it.
const DESCRIBE_WINDOW: u64 = 1 << 20;

/// Upper bound for the retry that buffers the whole source, for containers
/// whose headers do not fit in the describe window.
const MAX_DESCRIBE_BYTES: u64 = 256 << 20;

/// Reads any container symphonia recognises (FLAC, AIFF, MP3, Ogg, CAF, MP4,
/// Matroska, and WAVE variants the WAVE reader declines). Streams are decoded
/// to interleaved 32-bit little-endian float frames.
pub struct ContainerFileReader;

/// An opened container: the format reader, a decoder for its first audio
/// track, and the properties of the decoded audio.
struct Opened {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    frame_length: i64,
    /// Samples decoded while detecting the channel count.
    primed: Vec<f32>,
}

impl ContainerFileReader {
    fn decoded_format(sample_rate: u32, channels: usize) -> AudioFormat {
        AudioFormat::float(sample_rate as f32, 32, channels as i32, false)
    }

    /// Identifies `mss` and prepares a decoder for its first audio track.
    fn open(mss: MediaSourceStream, file_type: AudioFileType) -> Result<Opened, ReaderError> {
        let mut hint = Hint::new();
        hint.with_extension(file_type.extension());

        let identified = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(classify)?;
        let format_reader = identified.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| ReaderError::Unsupported("no audio track found".to_string()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| ReaderError::Unsupported("sample rate not specified".to_string()))?;
        let frame_length = params
            .n_frames
            .map(|n| n as i64)
            .unwrap_or(i64::from(NOT_SPECIFIED));

        let decoder = get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(classify)?;

        let mut opened = Opened {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels: params.channels.map(|c| c.count()).unwrap_or(0),
            frame_length,
            primed: Vec::new(),
        };

        // Without channel metadata, decode the first packet to find out.
        if opened.channels == 0 {
            match next_samples(
                opened.format_reader.as_mut(),
                opened.decoder.as_mut(),
                opened.track_id,
            )? {
                Some((samples, channels)) => {
                    opened.channels = channels;
                    opened.primed = samples;
                }
                None => {
                    return Err(ReaderError::Unsupported(
                        "channels not specified".to_string(),
                    ))
                }
            }
        }

        Ok(opened)
    }

    /// Reads up to `limit` bytes from the current position of `source`, then
    /// rewinds to `start`.
    fn read_window(
        source: &mut dyn MediaSource,
        start: u64,
        limit: u64,
    ) -> Result<Vec<u8>, ReaderError> {
        let mut window = Vec::new();
        let read = (&mut *source).take(limit).read_to_end(&mut window);
        source.seek(SeekFrom::Start(start))?;
        read?;
        Ok(window)
    }

    /// Describes the bytes from the current position of `source` up to `limit`.
    fn describe_window(
        source: &mut dyn MediaSource,
        start: u64,
        limit: u64,
        file_type: AudioFileType,
    ) -> Result<Opened, ReaderError> {
        let window = Self::read_window(source, start, limit)?;
        let mss = MediaSourceStream::new(
            Box::new(Cursor::new(window)),
            MediaSourceStreamOptions::default(),
        );
        Self::open(mss, file_type)
    }
}

impl AudioFileReader for ContainerFileReader {
    fn name(&self) -> &'static str {
        "container"
    }

    fn audio_file_format(
        &self,
        source: &mut dyn MediaSource,
    ) -> Result<AudioFileFormat, ReaderError> {
        let start = source.stream_position()?;
        let end = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(start))?;
        let remaining = end.saturating_sub(start);

        let header = Self::read_window(source, start, 64)?;
        let file_type = AudioFileType::sniff(&header)
            .ok_or_else(|| ReaderError::Unsupported("unrecognized container".to_string()))?;

        let opened = match Self::describe_window(source, start, DESCRIBE_WINDOW, file_type) {
            // Headers larger than the window: retry with the whole source.
            Err(ReaderError::Unsupported(reason))
                if remaining > DESCRIBE_WINDOW && remaining <= MAX_DESCRIBE_BYTES =>
            {
                debug!(reason = %reason, remaining, "Describe window too small, retrying.");
                Self::describe_window(source, start, remaining, file_type)?
            }
            other => other?,
        };

        debug!(
            file_type = file_type.name(),
            channels = opened.channels,
            sample_rate = opened.sample_rate,
            "Recognized container."
        );

        Ok(AudioFileFormat::new(
            file_type,
            remaining as i64,
            Self::decoded_format(opened.sample_rate, opened.channels),
            opened.frame_length,
        ))
    }

    fn audio_input_stream(
        &self,
        source: Box<dyn MediaSource>,
        file_format: &AudioFileFormat,
    ) -> Result<AudioInputStream, ReaderError> {
        let adapter = SourceAdapter::new(source)?;
        let mss = MediaSourceStream::new(Box::new(adapter), MediaSourceStreamOptions::default());
        let opened = Self::open(mss, file_format.file_type())?;

        let format = Self::decoded_format(opened.sample_rate, opened.channels);
        let frame_length = opened.frame_length;
        let pending = samples_to_bytes(&opened.primed);
        let decoded = DecodedStream {
            format_reader: opened.format_reader,
            decoder: opened.decoder,
            track_id: opened.track_id,
            pending,
            position: 0,
            finished: false,
        };
        Ok(AudioInputStream::new(decoded, format, frame_length))
    }
}

/// Maps symphonia errors onto the reader protocol. Anything that is not an
/// I/O failure means the data is not understood.
fn classify(err: SymphoniaError) -> ReaderError {
    match err {
        SymphoniaError::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            ReaderError::Unsupported("truncated header".to_string())
        }
        SymphoniaError::IoError(e) => ReaderError::Io(e),
        other => ReaderError::Unsupported(other.to_string()),
    }
}

/// Decodes packets of `track_id` until one yields samples. Returns the
/// interleaved samples and their channel count, or `None` at end of stream.
fn next_samples(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
) -> Result<Option<(Vec<f32>, usize)>, ReaderError> {
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Ok(None)
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) => return Err(ReaderError::Io(e)),
            Err(e) => return Err(ReaderError::Unsupported(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt packets are skipped.
            Err(SymphoniaError::DecodeError(reason)) => {
                debug!(reason, "Skipping undecodable packet.");
                continue;
            }
            Err(SymphoniaError::IoError(e)) => return Err(ReaderError::Io(e)),
            Err(e) => return Err(ReaderError::Unsupported(e.to_string())),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if decoded.frames() == 0 || channels == 0 {
            continue;
        }
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        return Ok(Some((buffer.samples().to_vec(), channels)));
    }
}

fn samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Decoded float frames as a byte stream.
struct DecodedStream {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    pending: Vec<u8>,
    position: usize,
    finished: bool,
}

impl Read for DecodedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.position >= self.pending.len() {
            if self.finished {
                return Ok(0);
            }
            match next_samples(
                self.format_reader.as_mut(),
                self.decoder.as_mut(),
                self.track_id,
            ) {
                Ok(Some((samples, _))) => {
                    self.pending = samples_to_bytes(&samples);
                    self.position = 0;
                }
                Ok(None) => self.finished = true,
                Err(ReaderError::Io(e)) => return Err(e),
                Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            }
        }

        let n = buf.len().min(self.pending.len() - self.position);
        buf[..n].copy_from_slice(&self.pending[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

/// Presents a [`MediaSource`] to symphonia, with positions relative to where
/// the source was when it was handed over.
struct SourceAdapter {
    inner: Box<dyn MediaSource>,
    base: u64,
    len: u64,
}

impl SourceAdapter {
    fn new(mut inner: Box<dyn MediaSource>) -> io::Result<SourceAdapter> {
        let base = inner.stream_position()?;
        let end = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(base))?;
        Ok(SourceAdapter {
            inner,
            base,
            len: end.saturating_sub(base),
        })
    }
}

impl Read for SourceAdapter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for SourceAdapter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let absolute = match pos {
            SeekFrom::Start(offset) => self.inner.seek(SeekFrom::Start(self.base + offset))?,
            other => self.inner.seek(other)?,
        };
        if absolute < self.base {
            self.inner.seek(SeekFrom::Start(self.base))?;
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of audio file",
            ));
        }
        Ok(absolute - self.base)
    }
}

impl symphonia::core::io::MediaSource for SourceAdapter {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.len)
    }
}
