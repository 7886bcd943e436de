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

use std::{fmt, str::FromStr};

/// Stands for an unknown numeric value. Only meaningful for quantities that are
/// never negative (sample rates, sizes, channel counts, lengths).
pub const NOT_SPECIFIED: i32 = -1;

/// The float flavour of [`NOT_SPECIFIED`], used for rates.
pub const NOT_SPECIFIED_RATE: f32 = -1.0;

/// How the samples of a format are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Signed, linear PCM.
    PcmSigned,
    /// Unsigned, linear PCM.
    PcmUnsigned,
    /// IEEE floating point PCM.
    PcmFloat,
    /// G.711 u-law.
    ULaw,
    /// G.711 a-law.
    ALaw,
}

impl Encoding {
    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::PcmSigned => "PCM_SIGNED",
            Encoding::PcmUnsigned => "PCM_UNSIGNED",
            Encoding::PcmFloat => "PCM_FLOAT",
            Encoding::ULaw => "ULAW",
            Encoding::ALaw => "ALAW",
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "pcm_signed" | "signed" => Ok(Encoding::PcmSigned),
            "pcm_unsigned" | "unsigned" => Ok(Encoding::PcmUnsigned),
            "pcm_float" | "float" => Ok(Encoding::PcmFloat),
            "ulaw" => Ok(Encoding::ULaw),
            "alaw" => Ok(Encoding::ALaw),
            _ => Err(format!("Unsupported encoding: {}", s)),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable description of how sampled audio is laid out.
///
/// Any integer field may be [`NOT_SPECIFIED`] and any rate may be
/// [`NOT_SPECIFIED_RATE`]; such fields act as wildcards when the format is the
/// argument of [`AudioFormat::matches`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFormat {
    encoding: Encoding,
    sample_rate: f32,
    sample_size_in_bits: i32,
    channels: i32,
    frame_size: i32,
    frame_rate: f32,
    big_endian: bool,
}

impl AudioFormat {
    /// Creates a format with every field given explicitly.
    pub fn new(
        encoding: Encoding,
        sample_rate: f32,
        sample_size_in_bits: i32,
        channels: i32,
        frame_size: i32,
        frame_rate: f32,
        big_endian: bool,
    ) -> AudioFormat {
        AudioFormat {
            encoding,
            sample_rate,
            sample_size_in_bits,
            channels,
            frame_size,
            frame_rate,
            big_endian,
        }
    }

    /// Creates a linear PCM format. The frame size is derived from the sample
    /// size and channel count, and the frame rate equals the sample rate.
    pub fn pcm(
        sample_rate: f32,
        sample_size_in_bits: i32,
        channels: i32,
        signed: bool,
        big_endian: bool,
    ) -> AudioFormat {
        let encoding = if signed {
            Encoding::PcmSigned
        } else {
            Encoding::PcmUnsigned
        };
        AudioFormat::new(
            encoding,
            sample_rate,
            sample_size_in_bits,
            channels,
            derive_frame_size(sample_size_in_bits, channels),
            sample_rate,
            big_endian,
        )
    }

    /// Creates an IEEE float PCM format.
    pub fn float(
        sample_rate: f32,
        sample_size_in_bits: i32,
        channels: i32,
        big_endian: bool,
    ) -> AudioFormat {
        AudioFormat::new(
            Encoding::PcmFloat,
            sample_rate,
            sample_size_in_bits,
            channels,
            derive_frame_size(sample_size_in_bits, channels),
            sample_rate,
            big_endian,
        )
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn sample_size_in_bits(&self) -> i32 {
        self.sample_size_in_bits
    }

    pub fn channels(&self) -> i32 {
        self.channels
    }

    pub fn frame_size(&self) -> i32 {
        self.frame_size
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    pub fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    /// Returns a copy of this format with a different sample and frame rate.
    pub fn with_sample_rate(&self, sample_rate: f32) -> AudioFormat {
        AudioFormat {
            sample_rate,
            frame_rate: sample_rate,
            ..*self
        }
    }

    /// Returns a copy of this format with a different channel count. The frame
    /// size is re-derived.
    pub fn with_channels(&self, channels: i32) -> AudioFormat {
        AudioFormat {
            channels,
            frame_size: derive_frame_size(self.sample_size_in_bits, channels),
            ..*self
        }
    }

    /// Returns true if this format satisfies `format`.
    ///
    /// Encodings must be equal. Channels, sample rate, sample size, frame rate
    /// and frame size must be equal unless `format` leaves them unspecified.
    /// Byte order only matters for samples wider than 8 bits.
    pub fn matches(&self, format: &AudioFormat) -> bool {
        format.encoding == self.encoding
            && (format.channels == NOT_SPECIFIED || format.channels == self.channels)
            && (format.sample_rate == NOT_SPECIFIED_RATE
                || format.sample_rate == self.sample_rate)
            && (format.sample_size_in_bits == NOT_SPECIFIED
                || format.sample_size_in_bits == self.sample_size_in_bits)
            && (format.frame_rate == NOT_SPECIFIED_RATE || format.frame_rate == self.frame_rate)
            && (format.frame_size == NOT_SPECIFIED || format.frame_size == self.frame_size)
            && (self.sample_size_in_bits <= 8 || format.big_endian == self.big_endian)
    }

    /// Returns the sample rate as an integer, or None if it is unspecified.
    pub fn sample_rate_hz(&self) -> Option<u32> {
        if self.sample_rate == NOT_SPECIFIED_RATE || self.sample_rate <= 0.0 {
            None
        } else {
            Some(self.sample_rate.round() as u32)
        }
    }
}

fn derive_frame_size(sample_size_in_bits: i32, channels: i32) -> i32 {
    if sample_size_in_bits == NOT_SPECIFIED || channels == NOT_SPECIFIED {
        NOT_SPECIFIED
    } else {
        ((sample_size_in_bits + 7) / 8) * channels
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.encoding)?;

        if self.sample_rate == NOT_SPECIFIED_RATE {
            write!(f, "unknown sample rate, ")?;
        } else {
            write!(f, "{:.1} Hz, ", self.sample_rate)?;
        }

        if self.sample_size_in_bits == NOT_SPECIFIED {
            write!(f, "unknown bits per sample, ")?;
        } else {
            write!(f, "{} bit, ", self.sample_size_in_bits)?;
        }

        match self.channels {
            1 => write!(f, "mono, ")?,
            2 => write!(f, "stereo, ")?,
            NOT_SPECIFIED => write!(f, "unknown number of channels, ")?,
            n => write!(f, "{} channels, ", n)?,
        }

        if self.frame_size == NOT_SPECIFIED {
            write!(f, "unknown frame size, ")?;
        } else {
            write!(f, "{} bytes/frame, ", self.frame_size)?;
        }

        // Frame rate is only worth printing when it differs from the sample rate.
        if (self.frame_rate - self.sample_rate).abs() > 0.00001 {
            if self.frame_rate == NOT_SPECIFIED_RATE {
                write!(f, "unknown frame rate, ")?;
            } else {
                write!(f, "{:.1} frames/second, ", self.frame_rate)?;
            }
        }

        if self.sample_size_in_bits > 8 || self.sample_size_in_bits == NOT_SPECIFIED {
            if self.big_endian {
                write!(f, "big-endian")?;
            } else {
                write!(f, "little-endian")?;
            }
        } else {
            write!(f, "single byte")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_from_str() {
        assert_eq!(
            Encoding::from_str("PCM_SIGNED").unwrap(),
            Encoding::PcmSigned
        );
        assert_eq!(Encoding::from_str("float").unwrap(), Encoding::PcmFloat);
        assert_eq!(
            Encoding::from_str("pcm-unsigned").unwrap(),
            Encoding::PcmUnsigned
        );
        assert_eq!(Encoding::from_str("ULAW").unwrap(), Encoding::ULaw);
        assert!(Encoding::from_str("mp3").is_err());
        assert!(Encoding::from_str("").is_err());
    }

    #[test]
    fn test_encoding_display() {
        assert_eq!(format!("{}", Encoding::PcmFloat), "PCM_FLOAT");
        assert_eq!(format!("{}", Encoding::ALaw), "ALAW");
    }

    #[test]
    fn test_pcm_derives_frame_size() {
        let format = AudioFormat::pcm(44100.0, 16, 2, true, false);
        assert_eq!(format.frame_size(), 4);
        assert_eq!(format.frame_rate(), 44100.0);
        assert_eq!(format.encoding(), Encoding::PcmSigned);

        let format = AudioFormat::pcm(48000.0, 24, 6, true, false);
        assert_eq!(format.frame_size(), 18);

        let format = AudioFormat::pcm(48000.0, NOT_SPECIFIED, 2, true, false);
        assert_eq!(format.frame_size(), NOT_SPECIFIED);
    }

    #[test]
    fn test_matches_identical() {
        let format = AudioFormat::pcm(44100.0, 16, 2, true, false);
        assert!(format.matches(&format.clone()));
    }

    #[test]
    fn test_matches_wildcards_on_argument() {
        let concrete = AudioFormat::pcm(44100.0, 16, 2, true, false);
        let wildcard = AudioFormat::new(
            Encoding::PcmSigned,
            NOT_SPECIFIED_RATE,
            16,
            2,
            4,
            NOT_SPECIFIED_RATE,
            false,
        );

        assert!(concrete.matches(&wildcard));
        // Wildcards on the receiver do not match concrete arguments.
        assert!(!wildcard.matches(&concrete));
    }

    #[test]
    fn test_matches_rejects_differences() {
        let format = AudioFormat::pcm(44100.0, 16, 2, true, false);
        assert!(!format.matches(&AudioFormat::pcm(48000.0, 16, 2, true, false)));
        assert!(!format.matches(&AudioFormat::pcm(44100.0, 24, 2, true, false)));
        assert!(!format.matches(&AudioFormat::pcm(44100.0, 16, 1, true, false)));
        assert!(!format.matches(&AudioFormat::pcm(44100.0, 16, 2, false, false)));
        assert!(!format.matches(&AudioFormat::pcm(44100.0, 16, 2, true, true)));
    }

    #[test]
    fn test_matches_ignores_byte_order_for_single_byte() {
        let little = AudioFormat::pcm(8000.0, 8, 1, false, false);
        let big = AudioFormat::pcm(8000.0, 8, 1, false, true);
        assert!(little.matches(&big));
        assert!(big.matches(&little));
    }

    #[test]
    fn test_with_channels_rederives_frame_size() {
        let format = AudioFormat::float(48000.0, 32, 2, false).with_channels(1);
        assert_eq!(format.channels(), 1);
        assert_eq!(format.frame_size(), 4);
    }

    #[test]
    fn test_sample_rate_hz() {
        assert_eq!(
            AudioFormat::pcm(44100.0, 16, 2, true, false).sample_rate_hz(),
            Some(44100)
        );
        assert_eq!(
            AudioFormat::pcm(NOT_SPECIFIED_RATE, 16, 2, true, false).sample_rate_hz(),
            None
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            AudioFormat::pcm(44100.0, 16, 2, true, false).to_string(),
            "PCM_SIGNED 44100.0 Hz, 16 bit, stereo, 4 bytes/frame, little-endian"
        );
        assert_eq!(
            AudioFormat::pcm(8000.0, 8, 1, false, false).to_string(),
            "PCM_UNSIGNED 8000.0 Hz, 8 bit, mono, 1 bytes/frame, single byte"
        );
        assert_eq!(
            AudioFormat::float(NOT_SPECIFIED_RATE, 32, 4, true).to_string(),
            "PCM_FLOAT unknown sample rate, 32 bit, 4 channels, 16 bytes/frame, big-endian"
        );
    }
}
