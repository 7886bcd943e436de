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

use std::{error::Error, fs, io::Cursor, path::PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Encodes per-channel samples as an in-memory WAVE file. The bit depth is the
/// width of `S`.
pub fn wav_bytes<S: hound::Sample + Copy + 'static>(
    samples: Vec<Vec<S>>,
    sample_rate: u32,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let bits_per_sample = (std::mem::size_of::<S>() * 8) as u16;
    wav_bytes_with_bits(samples, sample_rate, bits_per_sample)
}

pub fn wav_bytes_with_bits<S: hound::Sample + Copy + 'static>(
    samples: Vec<Vec<S>>,
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<Vec<u8>, Box<dyn Error>> {
    // Determine sample format based on the type
    let sample_format = if std::any::TypeId::of::<S>() == std::any::TypeId::of::<f32>() {
        SampleFormat::Float
    } else if std::any::TypeId::of::<S>() == std::any::TypeId::of::<i32>()
        || std::any::TypeId::of::<S>() == std::any::TypeId::of::<i16>()
        || std::any::TypeId::of::<S>() == std::any::TypeId::of::<i8>()
    {
        SampleFormat::Int
    } else {
        return Err("Unsupported sample format".into());
    };

    let num_channels = samples.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let num_frames = samples.first().map(|c| c.len()).unwrap_or(0);

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels: num_channels as u16,
                sample_rate,
                bits_per_sample,
                sample_format,
            },
        )?;

        // Interleave the channels frame by frame.
        for frame in 0..num_frames {
            for channel_samples in &samples {
                writer.write_sample(channel_samples[frame])?;
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Builds a WAVE file by hand from a 16-byte fmt chunk and raw sample data, for
/// layouts hound will not write.
pub fn raw_wave_bytes(
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    block_align: u16,
    data: &[u8],
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(44 + data.len());
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&format_tag.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&bits_per_sample.to_le_bytes());

    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(data);
    bytes
}

/// Writes per-channel samples to a WAVE file on disk.
pub fn write_wav<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    fs::write(path, wav_bytes(samples, sample_rate)?)?;
    Ok(())
}

/// A sine wave at `frequency` Hz, `frames` samples long.
pub fn sine(frequency: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            0.5 * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Calculate RMS (Root Mean Square) of a signal
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
