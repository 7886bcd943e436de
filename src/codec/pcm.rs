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
use crate::format::{AudioFormat, Encoding, NOT_SPECIFIED};

/// How a single sample is stored in bytes, for the encodings the converter
/// understands. Samples are exchanged as f32 in [-1.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    encoding: Encoding,
    bytes: usize,
    big_endian: bool,
}

impl SampleLayout {
    /// Returns the layout of `format`, or None if its samples cannot be
    /// decoded.
    pub fn for_format(format: &AudioFormat) -> Option<SampleLayout> {
        let bits = format.sample_size_in_bits();
        let bytes = match format.encoding() {
            Encoding::PcmSigned | Encoding::PcmUnsigned if (1..=32).contains(&bits) => {
                ((bits + 7) / 8) as usize
            }
            Encoding::PcmFloat if bits == 32 || bits == 64 => (bits / 8) as usize,
            Encoding::ULaw | Encoding::ALaw if bits == 8 => 1,
            _ => return None,
        };

        // A declared frame size has to agree with the sample size.
        let channels = format.channels();
        if channels > 0
            && format.frame_size() != NOT_SPECIFIED
            && format.frame_size() as usize != bytes * channels as usize
        {
            return None;
        }

        Some(SampleLayout {
            encoding: format.encoding(),
            bytes,
            big_endian: format.is_big_endian(),
        })
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bytes
    }

    /// Whether samples can be written in this layout. Companded encodings are
    /// decode only.
    pub fn can_encode(&self) -> bool {
        !matches!(self.encoding, Encoding::ULaw | Encoding::ALaw)
    }

    /// Decodes one sample from the first `bytes_per_sample` bytes of `data`.
    pub fn decode(&self, data: &[u8]) -> f32 {
        let data = &data[..self.bytes];
        match self.encoding {
            Encoding::PcmSigned => {
                let raw = self.read_uint(data);
                let width = self.bytes * 8;
                // Sign-extend from the container width.
                let value = ((raw << (64 - width)) as i64) >> (64 - width);
                value as f32 / full_scale(width)
            }
            Encoding::PcmUnsigned => {
                let width = self.bytes * 8;
                let value = self.read_uint(data) as i64 - (1i64 << (width - 1));
                value as f32 / full_scale(width)
            }
            Encoding::PcmFloat => {
                if self.bytes == 4 {
                    f32::from_bits(self.read_uint(data) as u32)
                } else {
                    f64::from_bits(self.read_uint(data)) as f32
                }
            }
            Encoding::ULaw => ulaw_to_linear(data[0]) as f32 / full_scale(16),
            Encoding::ALaw => alaw_to_linear(data[0]) as f32 / full_scale(16),
        }
    }

    /// Encodes one sample into the first `bytes_per_sample` bytes of `out`.
    /// Integer encodings clip out-of-range samples.
    pub fn encode(&self, sample: f32, out: &mut [u8]) {
        let width = self.bytes * 8;
        let raw = match self.encoding {
            Encoding::PcmSigned => quantize(sample, width) as u64,
            Encoding::PcmUnsigned => (quantize(sample, width) + (1i64 << (width - 1))) as u64,
            Encoding::PcmFloat => {
                if self.bytes == 4 {
                    u64::from(sample.to_bits())
                } else {
                    f64::from(sample).to_bits()
                }
            }
            // Rejected by can_encode; write silence.
            Encoding::ULaw | Encoding::ALaw => {
                out[0] = 0xff;
                return;
            }
        };
        self.write_uint(raw, &mut out[..self.bytes]);
    }

    fn read_uint(&self, data: &[u8]) -> u64 {
        let mut value = 0u64;
        if self.big_endian {
            for &byte in data {
                value = (value << 8) | u64::from(byte);
            }
        } else {
            for &byte in data.iter().rev() {
                value = (value << 8) | u64::from(byte);
            }
        }
        value
    }

    fn write_uint(&self, value: u64, out: &mut [u8]) {
        let len = out.len();
        for (i, byte) in out.iter_mut().enumerate() {
            let shift = if self.big_endian {
                (len - 1 - i) * 8
            } else {
                i * 8
            };
            *byte = (value >> shift) as u8;
        }
    }
}

#[inline]
fn full_scale(width: usize) -> f32 {
    (1i64 << (width - 1)) as f32
}

#[inline]
fn quantize(sample: f32, width: usize) -> i64 {
    let max = (1i64 << (width - 1)) - 1;
    let min = -(1i64 << (width - 1));
    ((f64::from(sample) * (max as f64 + 1.0)).round() as i64).clamp(min, max)
}

/// G.711 u-law to 16-bit linear.
fn ulaw_to_linear(value: u8) -> i16 {
    let value = !value;
    let sign = value & 0x80;
    let exponent = (value >> 4) & 0x07;
    let mantissa = value & 0x0f;
    let magnitude = (((i32::from(mantissa) << 3) + 0x84) << exponent) - 0x84;
    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// G.711 a-law to 16-bit linear.
fn alaw_to_linear(value: u8) -> i16 {
    let value = value ^ 0x55;
    let sign = value & 0x80;
    let exponent = (value >> 4) & 0x07;
    let mantissa = i32::from(value & 0x0f);
    let magnitude = match exponent {
        0 => (mantissa << 4) + 8,
        e => ((mantissa << 4) + 0x108) << (e - 1),
    };
    if sign != 0 {
        magnitude as i16
    } else {
        -magnitude as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(format: AudioFormat) -> SampleLayout {
        SampleLayout::for_format(&format).unwrap()
    }

    #[test]
    fn test_signed_16_little_endian() {
        let layout = layout(AudioFormat::pcm(44100.0, 16, 1, true, false));
        assert_eq!(layout.decode(&[0x00, 0x40]), 0.5);
        assert_eq!(layout.decode(&[0x00, 0xc0]), -0.5);
        assert_eq!(layout.decode(&[0x00, 0x80]), -1.0);

        let mut out = [0u8; 2];
        layout.encode(0.5, &mut out);
        assert_eq!(out, [0x00, 0x40]);
    }

    #[test]
    fn test_signed_24_big_endian() {
        let layout = layout(AudioFormat::pcm(48000.0, 24, 1, true, true));
        assert_eq!(layout.decode(&[0x40, 0x00, 0x00]), 0.5);

        let mut out = [0u8; 3];
        layout.encode(-0.5, &mut out);
        assert_eq!(out, [0xc0, 0x00, 0x00]);
    }

    #[test]
    fn test_unsigned_8() {
        let layout = layout(AudioFormat::pcm(8000.0, 8, 1, false, false));
        assert_eq!(layout.decode(&[0x80]), 0.0);
        assert_eq!(layout.decode(&[0x00]), -1.0);

        let mut out = [0u8; 1];
        layout.encode(0.0, &mut out);
        assert_eq!(out, [0x80]);
    }

    #[test]
    fn test_encode_clips() {
        let layout = layout(AudioFormat::pcm(44100.0, 16, 1, true, false));
        let mut out = [0u8; 2];
        layout.encode(2.0, &mut out);
        assert_eq!(i16::from_le_bytes(out), i16::MAX);
        layout.encode(-2.0, &mut out);
        assert_eq!(i16::from_le_bytes(out), i16::MIN);
    }

    #[test]
    fn test_float_64_big_endian() {
        let layout = layout(AudioFormat::float(44100.0, 64, 1, true));
        let mut out = [0u8; 8];
        layout.encode(0.25, &mut out);
        assert_eq!(out, 0.25f64.to_be_bytes());
        assert_eq!(layout.decode(&out), 0.25);
    }

    #[test]
    fn test_companded_decode() {
        let ulaw = layout(AudioFormat::new(
            Encoding::ULaw,
            8000.0,
            8,
            1,
            1,
            8000.0,
            false,
        ));
        assert_eq!(ulaw.decode(&[0xff]), 0.0);
        assert!(ulaw.decode(&[0x00]) < -0.9);
        assert!(!ulaw.can_encode());

        let alaw = layout(AudioFormat::new(
            Encoding::ALaw,
            8000.0,
            8,
            1,
            1,
            8000.0,
            false,
        ));
        assert!(alaw.decode(&[0xd5]).abs() < 0.001);
    }

    #[test]
    fn test_unsupported_layouts() {
        assert!(SampleLayout::for_format(&AudioFormat::float(44100.0, 16, 1, false)).is_none());
        assert!(
            SampleLayout::for_format(&AudioFormat::pcm(44100.0, NOT_SPECIFIED, 1, true, false))
                .is_none()
        );
        // Frame size disagreeing with the sample size.
        let odd = AudioFormat::new(Encoding::PcmSigned, 44100.0, 16, 2, 8, 44100.0, false);
        assert!(SampleLayout::for_format(&odd).is_none());
    }
}
