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
use tracing::debug;

use crate::format::{AudioFormat, Encoding, NOT_SPECIFIED, NOT_SPECIFIED_RATE};
use crate::spi::{ConversionError, FormatConversionProvider};
use crate::stream::AudioInputStream;

use super::pcm::SampleLayout;
use super::planar::{ChannelMapper, FrameEncoder, PlanarSource, StreamDecoder};
use super::resampler::SampleRateConverter;

const SOURCE_ENCODINGS: [Encoding; 5] = [
    Encoding::PcmSigned,
    Encoding::PcmUnsigned,
    Encoding::PcmFloat,
    Encoding::ULaw,
    Encoding::ALaw,
];

const TARGET_ENCODINGS: [Encoding; 3] =
    [Encoding::PcmSigned, Encoding::PcmUnsigned, Encoding::PcmFloat];

/// Converts between linear PCM layouts: integer width, signedness, float,
/// byte order, channel count and sample rate. Companded u-law and a-law
/// streams are accepted as sources.
pub struct PcmFormatConverter;

impl PcmFormatConverter {
    /// Fills the fields `target` leaves open from `source`.
    fn resolve(target: &AudioFormat, source: &AudioFormat) -> AudioFormat {
        let channels = if target.channels() == NOT_SPECIFIED {
            source.channels()
        } else {
            target.channels()
        };
        let sample_rate = if target.sample_rate() == NOT_SPECIFIED_RATE {
            source.sample_rate()
        } else {
            target.sample_rate()
        };
        AudioFormat::new(
            target.encoding(),
            sample_rate,
            target.sample_size_in_bits(),
            channels,
            ((target.sample_size_in_bits() + 7) / 8) * channels,
            sample_rate,
            target.is_big_endian(),
        )
    }

    /// Sample rates of a supported conversion, if they differ.
    fn rate_change(target: &AudioFormat, source: &AudioFormat) -> Option<(u32, u32)> {
        let from = source.sample_rate_hz()?;
        let to = target.sample_rate_hz()?;
        (from != to).then_some((from, to))
    }
}

impl FormatConversionProvider for PcmFormatConverter {
    fn name(&self) -> &'static str {
        "pcm"
    }

    fn source_encodings(&self) -> Vec<Encoding> {
        SOURCE_ENCODINGS.to_vec()
    }

    fn target_encodings(&self) -> Vec<Encoding> {
        TARGET_ENCODINGS.to_vec()
    }

    fn target_encodings_for(&self, source: &AudioFormat) -> Vec<Encoding> {
        if SampleLayout::for_format(source).is_some() && source.channels() > 0 {
            TARGET_ENCODINGS.to_vec()
        } else {
            Vec::new()
        }
    }

    fn target_formats(&self, target_encoding: Encoding, source: &AudioFormat) -> Vec<AudioFormat> {
        if !self.target_encodings_for(source).contains(&target_encoding) {
            return Vec::new();
        }

        let channels = source.channels();
        let sizes: &[i32] = match target_encoding {
            Encoding::PcmSigned | Encoding::PcmUnsigned => &[8, 16, 24],
            Encoding::PcmFloat => &[32, 64],
            Encoding::ULaw | Encoding::ALaw => &[],
        };

        let mut formats = Vec::new();
        for &bits in sizes {
            // Byte order does not apply to single byte samples.
            let orders: &[bool] = if bits == 8 { &[false] } else { &[false, true] };
            for &big_endian in orders {
                formats.push(AudioFormat::new(
                    target_encoding,
                    NOT_SPECIFIED_RATE,
                    bits,
                    channels,
                    (bits / 8) * channels,
                    NOT_SPECIFIED_RATE,
                    big_endian,
                ));
            }
        }
        formats
    }

    fn is_conversion_supported(&self, target: &AudioFormat, source: &AudioFormat) -> bool {
        if source.channels() <= 0 || SampleLayout::for_format(source).is_none() {
            return false;
        }
        if !TARGET_ENCODINGS.contains(&target.encoding()) {
            return false;
        }
        if target.channels() == 0 || target.channels() < NOT_SPECIFIED {
            return false;
        }
        // Resampling needs both rates.
        if target.sample_rate() != NOT_SPECIFIED_RATE
            && (target.sample_rate_hz().is_none() || source.sample_rate_hz().is_none())
        {
            return false;
        }

        let resolved = Self::resolve(target, source);
        SampleLayout::for_format(&resolved).is_some_and(|layout| layout.can_encode())
    }

    fn convert(
        &self,
        target: &AudioFormat,
        source: AudioInputStream,
    ) -> Result<AudioInputStream, ConversionError> {
        let source_format = *source.format();
        let unsupported = || ConversionError::Unsupported {
            target: *target,
            from: source_format,
        };
        if !self.is_conversion_supported(target, &source_format) {
            return Err(unsupported());
        }

        let resolved = Self::resolve(target, &source_format);
        let (Some(source_layout), Some(target_layout)) = (
            SampleLayout::for_format(&source_format),
            SampleLayout::for_format(&resolved),
        ) else {
            return Err(unsupported());
        };

        let source_channels = source_format.channels() as usize;
        let target_channels = resolved.channels() as usize;
        // Without a frame size the source length counts bytes, not frames.
        let mut frame_length = if source_format.frame_size() == NOT_SPECIFIED {
            i64::from(NOT_SPECIFIED)
        } else {
            source.frame_length()
        };

        let mut pipeline: Box<dyn PlanarSource> =
            Box::new(StreamDecoder::new(source, source_layout, source_channels));
        if source_channels != target_channels {
            pipeline = Box::new(ChannelMapper::new(pipeline, target_channels));
        }
        if let Some((from, to)) = Self::rate_change(&resolved, &source_format) {
            pipeline = Box::new(SampleRateConverter::new(pipeline, from, to)?);
            // The resampled length is not known exactly up front.
            frame_length = i64::from(NOT_SPECIFIED);
        }

        debug!(
            from = %source_format,
            to = %resolved,
            "Converting audio stream."
        );
        Ok(AudioInputStream::new(
            FrameEncoder::new(pipeline, target_layout),
            resolved,
            frame_length,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Read};

    use super::*;
    use crate::testutil::audio::sine;

    fn stream(format: AudioFormat, data: Vec<u8>) -> AudioInputStream {
        let frames = data.len() as i64 / i64::from(format.frame_size());
        AudioInputStream::new(Cursor::new(data), format, frames)
    }

    #[test]
    fn test_target_formats() {
        let source = AudioFormat::pcm(44100.0, 16, 2, true, false);
        let formats = PcmFormatConverter.target_formats(Encoding::PcmSigned, &source);

        assert_eq!(formats.len(), 5);
        assert!(formats.iter().all(|f| f.channels() == 2));
        assert!(formats.iter().all(|f| f.sample_rate() == NOT_SPECIFIED_RATE));
        assert!(formats.contains(&AudioFormat::new(
            Encoding::PcmSigned,
            NOT_SPECIFIED_RATE,
            24,
            2,
            6,
            NOT_SPECIFIED_RATE,
            true
        )));

        let floats = PcmFormatConverter.target_formats(Encoding::PcmFloat, &source);
        assert_eq!(floats.len(), 4);
        assert!(PcmFormatConverter
            .target_formats(Encoding::ULaw, &source)
            .is_empty());
    }

    #[test]
    fn test_conversion_support() {
        let source = AudioFormat::pcm(44100.0, 16, 2, true, false);
        assert!(PcmFormatConverter
            .is_conversion_supported(&AudioFormat::float(48000.0, 32, 1, false), &source));
        assert!(PcmFormatConverter.is_conversion_supported(
            &AudioFormat::pcm(NOT_SPECIFIED_RATE, 8, NOT_SPECIFIED, false, false),
            &source
        ));

        // No sample size to encode to.
        assert!(!PcmFormatConverter.is_conversion_supported(
            &AudioFormat::pcm(44100.0, NOT_SPECIFIED, 2, true, false),
            &source
        ));
        // Companded targets are not produced.
        let ulaw = AudioFormat::new(Encoding::ULaw, 8000.0, 8, 1, 1, 8000.0, false);
        assert!(!PcmFormatConverter.is_conversion_supported(&ulaw, &source));
        assert!(PcmFormatConverter
            .is_conversion_supported(&AudioFormat::pcm(8000.0, 16, 1, true, false), &ulaw));
        // Unknown source rate cannot be resampled.
        let open_rate = AudioFormat::pcm(NOT_SPECIFIED_RATE, 16, 2, true, false);
        assert!(!PcmFormatConverter.is_conversion_supported(&source, &open_rate));
    }

    #[test]
    fn test_byte_swap() {
        let source = AudioFormat::pcm(44100.0, 16, 1, true, false);
        let target = AudioFormat::pcm(44100.0, 16, 1, true, true);
        let mut converted = PcmFormatConverter
            .convert(&target, stream(source, vec![0x01, 0x02, 0x03, 0x04]))
            .unwrap();

        assert_eq!(converted.format(), &target);
        assert_eq!(converted.frame_length(), 2);
        assert_eq!(converted.read_all().unwrap(), vec![0x02, 0x01, 0x04, 0x03]);
    }

    /// Hands out at most three bytes per read.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(3);
            self.0.read(&mut buf[..len])
        }
    }

    #[test]
    fn test_source_without_frame_size_converts_every_frame() {
        let source = AudioFormat::new(
            Encoding::PcmSigned,
            44100.0,
            16,
            2,
            NOT_SPECIFIED,
            44100.0,
            false,
        );
        let data: Vec<u8> = (0..16i16).flat_map(|i| (i * 256).to_le_bytes()).collect();
        let input = AudioInputStream::new(
            Trickle(Cursor::new(data)),
            source,
            i64::from(NOT_SPECIFIED),
        );

        let target = AudioFormat::float(44100.0, 32, 2, false);
        let mut converted = PcmFormatConverter.convert(&target, input).unwrap();
        assert_eq!(converted.frame_length(), i64::from(NOT_SPECIFIED));

        let bytes = converted.read_all().unwrap();
        assert_eq!(bytes.len(), 64);
        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let expected: Vec<f32> = (0..16i16).map(|i| f32::from(i * 256) / 32768.0).collect();
        assert_eq!(samples, expected);
    }

    #[test]
    fn test_float_to_unsigned_8_mono() {
        let source = AudioFormat::float(8000.0, 32, 2, false);
        let mut data = Vec::new();
        for sample in [0.5f32, 0.5, -1.0, 0.0] {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        let target = AudioFormat::pcm(NOT_SPECIFIED_RATE, 8, 1, false, false);

        let mut converted = PcmFormatConverter
            .convert(&target, stream(source, data))
            .unwrap();
        assert_eq!(converted.format().sample_rate(), 8000.0);
        assert_eq!(converted.format().frame_size(), 1);
        assert_eq!(converted.read_all().unwrap(), vec![0xc0, 0x40]);
    }

    #[test]
    fn test_resample_changes_rate() {
        let source = AudioFormat::float(44100.0, 32, 1, false);
        let data: Vec<u8> = sine(440.0, 44100, 4410)
            .into_iter()
            .flat_map(f32::to_le_bytes)
            .collect();
        let target = AudioFormat::pcm(22050.0, 16, 1, true, false);

        let mut converted = PcmFormatConverter
            .convert(&target, stream(source, data))
            .unwrap();
        assert_eq!(converted.frame_length(), i64::from(NOT_SPECIFIED));
        let frames = converted.read_all().unwrap().len() / 2;
        assert!((2000..2800).contains(&frames), "{frames} frames");
    }

    #[test]
    fn test_unsupported_names_both_formats() {
        let source = AudioFormat::pcm(44100.0, 16, 2, true, false);
        let target = AudioFormat::pcm(44100.0, 12, 2, true, false).with_channels(0);
        let err = PcmFormatConverter
            .convert(&target, stream(source, vec![0; 8]))
            .unwrap_err();
        match err {
            ConversionError::Unsupported { target: t, from } => {
                assert_eq!(t, target);
                assert_eq!(from, source);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
