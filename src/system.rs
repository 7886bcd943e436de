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
//! The audio system facade.
//!
//! Every operation consults a fixed list of providers in registration order
//! and the first capable provider wins. Each operation has a `*_with` twin
//! taking an explicit provider list. Nothing here holds state between calls.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use tracing::{debug, info};
use url::Url;

use crate::codec::PcmFormatConverter;
use crate::config;
use crate::error::AudioSystemError;
use crate::file_format::AudioFileFormat;
use crate::format::{AudioFormat, Encoding, NOT_SPECIFIED};
use crate::line::{CpalSourceDataLine, SourceDataLine};
use crate::reader::{ContainerFileReader, WaveFileReader};
use crate::spi::{AudioFileReader, FormatConversionProvider, ReaderError};
use crate::stream::{AudioInputStream, MediaSource};


/// The registered file readers, in the order they are tried.
pub static AUDIO_FILE_READERS: &[&dyn AudioFileReader] = &[&WaveFileReader, &ContainerFileReader];

/// The registered format converters, in the order they are tried.
pub static FORMAT_CONVERSION_PROVIDERS: &[&dyn FormatConversionProvider] =
    &[&PcmFormatConverter];

/// Largest body fetched for an http(s) URL.
const MAX_REMOTE_BYTES: u64 = 256 * 1024 * 1024;

const UNSUPPORTED_STREAM: &str = "stream of unsupported format";
const UNSUPPORTED_FILE: &str = "file is not a supported file type";
const UNSUPPORTED_URL: &str = "URL of unsupported format";

pub fn audio_file_readers() -> &'static [&'static dyn AudioFileReader] {
    AUDIO_FILE_READERS
}

pub fn format_conversion_providers() -> &'static [&'static dyn FormatConversionProvider] {
    FORMAT_CONVERSION_PROVIDERS
}

/// Offers `source` to each reader in turn. Returns the first reader that
/// recognises it along with its description, or None if none does. An I/O
/// failure stops the search.
fn find_reader<'r>(
    readers: &[&'r dyn AudioFileReader],
    source: &mut dyn MediaSource,
) -> Result<Option<(&'r dyn AudioFileReader, AudioFileFormat)>, AudioSystemError> {
    for &reader in readers {
        debug!(reader = reader.name(), "Trying audio file reader.");
        match reader.audio_file_format(source) {
            Ok(file_format) => {
                info!(
                    reader = reader.name(),
                    file_type = %file_format.file_type(),
                    format = %file_format.format(),
                    "Recognized audio file."
                );
                return Ok(Some((reader, file_format)));
            }
            Err(ReaderError::Unsupported(reason)) => {
                debug!(reader = reader.name(), reason = %reason, "Reader passed.");
            }
            Err(ReaderError::Io(e)) => return Err(e.into()),
        }
    }
    Ok(None)
}

fn describe(
    readers: &[&dyn AudioFileReader],
    source: &mut dyn MediaSource,
    unsupported: &str,
) -> Result<AudioFileFormat, AudioSystemError> {
    match find_reader(readers, source)? {
        Some((_, file_format)) => Ok(file_format),
        None => Err(AudioSystemError::UnsupportedAudioFile(unsupported.to_string())),
    }
}

fn decode(
    readers: &[&dyn AudioFileReader],
    mut source: Box<dyn MediaSource>,
    unsupported: &str,
) -> Result<AudioInputStream, AudioSystemError> {
    let Some((reader, file_format)) = find_reader(readers, &mut *source)? else {
        return Err(AudioSystemError::UnsupportedAudioFile(unsupported.to_string()));
    };
    reader
        .audio_input_stream(source, &file_format)
        .map_err(|e| match e {
            ReaderError::Unsupported(_) => {
                AudioSystemError::UnsupportedAudioFile(unsupported.to_string())
            }
            ReaderError::Io(e) => AudioSystemError::Io(e),
        })
}

/// Describes the audio file at the current position of `source`. The position
/// is unchanged on return.
pub fn audio_file_format(
    source: &mut dyn MediaSource,
) -> Result<AudioFileFormat, AudioSystemError> {
    audio_file_format_with(AUDIO_FILE_READERS, source)
}

pub fn audio_file_format_with(
    readers: &[&dyn AudioFileReader],
    source: &mut dyn MediaSource,
) -> Result<AudioFileFormat, AudioSystemError> {
    describe(readers, source, UNSUPPORTED_STREAM)
}

/// Describes the audio file at `path`.
pub fn audio_file_format_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<AudioFileFormat, AudioSystemError> {
    audio_file_format_from_path_with(AUDIO_FILE_READERS, path)
}

pub fn audio_file_format_from_path_with<P: AsRef<Path>>(
    readers: &[&dyn AudioFileReader],
    path: P,
) -> Result<AudioFileFormat, AudioSystemError> {
    let mut source = open_path(path.as_ref())?;
    describe(readers, &mut *source, UNSUPPORTED_FILE)
}

/// Describes the audio file a `file:`, `http:` or `https:` URL points to.
pub fn audio_file_format_from_url(url: &str) -> Result<AudioFileFormat, AudioSystemError> {
    audio_file_format_from_url_with(AUDIO_FILE_READERS, url)
}

pub fn audio_file_format_from_url_with(
    readers: &[&dyn AudioFileReader],
    url: &str,
) -> Result<AudioFileFormat, AudioSystemError> {
    let mut source = open_url(url)?;
    describe(readers, &mut *source, UNSUPPORTED_URL)
}

/// Opens a stream over the audio held in `source`, starting at its current
/// position.
pub fn audio_input_stream(
    source: Box<dyn MediaSource>,
) -> Result<AudioInputStream, AudioSystemError> {
    audio_input_stream_with(AUDIO_FILE_READERS, source)
}

pub fn audio_input_stream_with(
    readers: &[&dyn AudioFileReader],
    source: Box<dyn MediaSource>,
) -> Result<AudioInputStream, AudioSystemError> {
    decode(readers, source, UNSUPPORTED_STREAM)
}

pub fn audio_input_stream_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<AudioInputStream, AudioSystemError> {
    audio_input_stream_from_path_with(AUDIO_FILE_READERS, path)
}

pub fn audio_input_stream_from_path_with<P: AsRef<Path>>(
    readers: &[&dyn AudioFileReader],
    path: P,
) -> Result<AudioInputStream, AudioSystemError> {
    decode(readers, open_path(path.as_ref())?, UNSUPPORTED_FILE)
}

pub fn audio_input_stream_from_url(url: &str) -> Result<AudioInputStream, AudioSystemError> {
    audio_input_stream_from_url_with(AUDIO_FILE_READERS, url)
}

pub fn audio_input_stream_from_url_with(
    readers: &[&dyn AudioFileReader],
    url: &str,
) -> Result<AudioInputStream, AudioSystemError> {
    decode(readers, open_url(url)?, UNSUPPORTED_URL)
}

fn open_path(path: &Path) -> Result<Box<dyn MediaSource>, AudioSystemError> {
    Ok(Box::new(BufReader::new(File::open(path)?)))
}

/// Opens a URL as a seekable source. Remote bodies are fetched into memory.
fn open_url(url: &str) -> Result<Box<dyn MediaSource>, AudioSystemError> {
    let url = Url::parse(url)?;
    match url.scheme() {
        "file" => {
            let path = url.to_file_path().map_err(|_| {
                AudioSystemError::UnsupportedAudioFile(format!(
                    "URL {url} does not name a local file"
                ))
            })?;
            open_path(&path)
        }
        "http" | "https" => {
            debug!(%url, "Fetching audio over HTTP.");
            let response = ureq::get(url.as_str())
                .call()
                .map_err(|e| AudioSystemError::Http(e.to_string()))?;
            let body = read_body(response.into_reader(), MAX_REMOTE_BYTES)?;
            Ok(Box::new(Cursor::new(body)))
        }
        scheme => Err(AudioSystemError::UnsupportedAudioFile(format!(
            "URL scheme {scheme} is not supported"
        ))),
    }
}

/// Reads a whole response body, failing rather than truncating one longer than
/// `limit` bytes.
fn read_body(body: impl Read, limit: u64) -> Result<Vec<u8>, AudioSystemError> {
    let mut data = Vec::new();
    body.take(limit + 1).read_to_end(&mut data)?;
    if data.len() as u64 > limit {
        return Err(AudioSystemError::Http(format!(
            "response body is larger than {} bytes",
            limit
        )));
    }
    Ok(data)
}

/// Converts `source` to `target`. A stream whose format already matches
/// `target` is returned as is.
pub fn convert(
    target: &AudioFormat,
    source: AudioInputStream,
) -> Result<AudioInputStream, AudioSystemError> {
    convert_with(FORMAT_CONVERSION_PROVIDERS, target, source)
}

pub fn convert_with(
    codecs: &[&dyn FormatConversionProvider],
    target: &AudioFormat,
    source: AudioInputStream,
) -> Result<AudioInputStream, AudioSystemError> {
    if source.format().matches(target) {
        debug!(format = %target, "Stream already has the target format.");
        return Ok(source);
    }

    for &codec in codecs {
        if codec.is_conversion_supported(target, source.format()) {
            info!(
                codec = codec.name(),
                from = %source.format(),
                to = %target,
                "Converting audio."
            );
            return Ok(codec.convert(target, source)?);
        }
        debug!(codec = codec.name(), "Codec cannot convert.");
    }

    Err(AudioSystemError::UnsupportedConversion {
        target: *target,
        from: *source.format(),
    })
}

/// Converts `source` to some format with `encoding`, preferring one that
/// keeps the source's sample size and byte order.
pub fn convert_to_encoding(
    encoding: Encoding,
    source: AudioInputStream,
) -> Result<AudioInputStream, AudioSystemError> {
    convert_to_encoding_with(FORMAT_CONVERSION_PROVIDERS, encoding, source)
}

pub fn convert_to_encoding_with(
    codecs: &[&dyn FormatConversionProvider],
    encoding: Encoding,
    source: AudioInputStream,
) -> Result<AudioInputStream, AudioSystemError> {
    let from = *source.format();
    if from.encoding() == encoding {
        return Ok(source);
    }

    for &codec in codecs {
        let candidates: Vec<AudioFormat> = codec
            .target_formats(encoding, &from)
            .into_iter()
            .filter(|target| codec.is_conversion_supported(target, &from))
            .collect();
        let preferred = candidates
            .iter()
            .find(|target| {
                target.sample_size_in_bits() == from.sample_size_in_bits()
                    && target.is_big_endian() == from.is_big_endian()
            })
            .or_else(|| candidates.first());

        if let Some(target) = preferred {
            info!(
                codec = codec.name(),
                from = %from,
                to = %target,
                "Converting audio to encoding."
            );
            return Ok(codec.convert(target, source)?);
        }
    }

    Err(AudioSystemError::UnsupportedConversion {
        target: AudioFormat::new(
            encoding,
            from.sample_rate(),
            NOT_SPECIFIED,
            from.channels(),
            NOT_SPECIFIED,
            from.frame_rate(),
            from.is_big_endian(),
        ),
        from,
    })
}

/// Every format with `encoding` that some codec can convert `source` to, in
/// codec registration order. Duplicates across codecs are kept.
pub fn target_formats(encoding: Encoding, source: &AudioFormat) -> Vec<AudioFormat> {
    target_formats_with(FORMAT_CONVERSION_PROVIDERS, encoding, source)
}

pub fn target_formats_with(
    codecs: &[&dyn FormatConversionProvider],
    encoding: Encoding,
    source: &AudioFormat,
) -> Vec<AudioFormat> {
    codecs
        .iter()
        .flat_map(|codec| codec.target_formats(encoding, source))
        .collect()
}

/// The distinct encodings some codec can convert `source` to, in the order
/// they are first reported.
pub fn target_encodings(source: &AudioFormat) -> Vec<Encoding> {
    target_encodings_with(FORMAT_CONVERSION_PROVIDERS, source)
}

pub fn target_encodings_with(
    codecs: &[&dyn FormatConversionProvider],
    source: &AudioFormat,
) -> Vec<Encoding> {
    let mut encodings = Vec::new();
    for codec in codecs {
        for encoding in codec.target_encodings_for(source) {
            if !encodings.contains(&encoding) {
                encodings.push(encoding);
            }
        }
    }
    encodings
}

/// Whether `source` can be converted to `target`, trivially or by a codec.
pub fn is_conversion_supported(target: &AudioFormat, source: &AudioFormat) -> bool {
    is_conversion_supported_with(FORMAT_CONVERSION_PROVIDERS, target, source)
}

pub fn is_conversion_supported_with(
    codecs: &[&dyn FormatConversionProvider],
    target: &AudioFormat,
    source: &AudioFormat,
) -> bool {
    source.matches(target)
        || codecs
            .iter()
            .any(|codec| codec.is_conversion_supported(target, source))
}

/// Whether `source` can be converted to some format with `encoding`.
pub fn is_encoding_conversion_supported(encoding: Encoding, source: &AudioFormat) -> bool {
    is_encoding_conversion_supported_with(FORMAT_CONVERSION_PROVIDERS, encoding, source)
}

pub fn is_encoding_conversion_supported_with(
    codecs: &[&dyn FormatConversionProvider],
    encoding: Encoding,
    source: &AudioFormat,
) -> bool {
    source.encoding() == encoding
        || codecs
            .iter()
            .any(|codec| codec.is_encoding_conversion_supported(encoding, source))
}

/// Returns an output line bound to `format`. The line is not open yet.
pub fn source_data_line(format: &AudioFormat) -> Box<dyn SourceDataLine> {
    source_data_line_with_config(format, config::Line::default())
}

pub fn source_data_line_with_config(
    format: &AudioFormat,
    config: config::Line,
) -> Box<dyn SourceDataLine> {
    debug!(%format, device = ?config.device(), "Creating output line.");
    Box::new(CpalSourceDataLine::with_config(*format, config))
}
