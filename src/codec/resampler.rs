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
use rubato::{
    SincFixedIn, SincInterpolationParameters, SincInterpolationType, VecResampler, WindowFunction,
};

use crate::spi::ConversionError;

use super::planar::{PlanarSource, CHUNK_FRAMES};

/// Sliding window of input frames waiting for the resampler.
struct InputWindow {
    channels: Vec<Vec<f32>>,
    source_finished: bool,
}

impl InputWindow {
    fn new(num_channels: usize) -> Self {
        Self {
            channels: vec![Vec::new(); num_channels],
            source_finished: false,
        }
    }

    fn len(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    fn push(&mut self, planar: &[Vec<f32>], frames: usize) {
        for (ch, input) in self.channels.iter_mut().zip(planar) {
            ch.extend_from_slice(&input[..frames.min(input.len())]);
        }
    }

    fn drain(&mut self, frames: usize) {
        for ch in &mut self.channels {
            ch.drain(..frames.min(ch.len()));
        }
    }
}

/// Resampled frames ready to hand out.
struct OutputFifo {
    channels: Vec<Vec<f32>>,
    read_pos: usize,
}

impl OutputFifo {
    fn new(num_channels: usize) -> Self {
        Self {
            channels: vec![Vec::new(); num_channels],
            read_pos: 0,
        }
    }

    fn available(&self) -> usize {
        self.channels
            .first()
            .map(|c| c.len().saturating_sub(self.read_pos))
            .unwrap_or(0)
    }

    fn drain_into(&mut self, output: &mut [Vec<f32>], max_frames: usize) -> usize {
        let to_copy = self.available().min(max_frames);
        if to_copy == 0 {
            return 0;
        }

        for (out, ch) in output.iter_mut().zip(&self.channels) {
            out.extend_from_slice(&ch[self.read_pos..self.read_pos + to_copy]);
        }
        self.read_pos += to_copy;

        if self.read_pos > 4096 {
            for ch in self.channels.iter_mut() {
                ch.drain(..self.read_pos);
            }
            self.read_pos = 0;
        }
        to_copy
    }

    fn push(&mut self, planar: &[Vec<f32>], frames: usize) {
        for (ch, input) in self.channels.iter_mut().zip(planar) {
            ch.extend_from_slice(&input[..frames.min(input.len())]);
        }
    }
}

/// Changes the sample rate of a planar source with a sinc resampler.
pub(crate) struct SampleRateConverter<S: PlanarSource> {
    source: S,
    resampler: SincFixedIn<f32>,
    source_rate: u32,
    target_rate: u32,
    input: InputWindow,
    output: OutputFifo,
    /// Reused resampler output buffers.
    output_scratch: Vec<Vec<f32>>,
    /// Reused source read buffers.
    source_scratch: Vec<Vec<f32>>,
}

impl<S: PlanarSource> SampleRateConverter<S> {
    pub fn new(
        source: S,
        source_rate: u32,
        target_rate: u32,
    ) -> Result<SampleRateConverter<S>, ConversionError> {
        let channels = source.channel_count();
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            oversampling_factor: 128,
            interpolation: SincInterpolationType::Linear,
            window: WindowFunction::BlackmanHarris2,
        };
        let ratio = f64::from(target_rate) / f64::from(source_rate);

        let resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, channels)
            .map_err(|_| ConversionError::ResamplingFailed(source_rate, target_rate))?;
        let output_scratch = resampler.output_buffer_allocate(true);

        Ok(SampleRateConverter {
            source,
            resampler,
            source_rate,
            target_rate,
            input: InputWindow::new(channels),
            output: OutputFifo::new(channels),
            output_scratch,
            source_scratch: vec![Vec::with_capacity(CHUNK_FRAMES); channels],
        })
    }

    /// Runs the resampler once if there is enough input, or flushes the tail
    /// once the source is done. Returns true if any output was produced.
    fn fill_output(&mut self) -> Result<bool, ConversionError> {
        let needed = self.resampler.input_frames_next();
        let (from, to) = (self.source_rate, self.target_rate);

        while !self.input.source_finished && self.input.len() < needed {
            let frames = self
                .source
                .next_chunk(&mut self.source_scratch, needed - self.input.len())?;
            if frames == 0 {
                self.input.source_finished = true;
                break;
            }
            self.input.push(&self.source_scratch, frames);
        }

        let (consumed, produced) = if self.input.len() >= needed {
            self.resampler
                .process_into_buffer(&self.input.channels, &mut self.output_scratch, None)
                .map_err(|_| ConversionError::ResamplingFailed(from, to))?
        } else if self.input.source_finished && self.input.len() > 0 {
            let (_, produced) = self
                .resampler
                .process_partial_into_buffer(
                    Some(&self.input.channels as &[Vec<f32>]),
                    &mut self.output_scratch,
                    None,
                )
                .map_err(|_| ConversionError::ResamplingFailed(from, to))?;
            (self.input.len(), produced)
        } else {
            return Ok(false);
        };

        self.input.drain(consumed);
        if produced > 0 {
            self.output.push(&self.output_scratch, produced);
        }
        Ok(produced > 0)
    }
}

impl<S: PlanarSource> PlanarSource for SampleRateConverter<S> {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, ConversionError> {
        for ch in output.iter_mut() {
            ch.clear();
        }

        let mut total = 0;
        while total < max_frames {
            total += self.output.drain_into(output, max_frames - total);
            if total >= max_frames {
                break;
            }

            if !self.fill_output()?
                && self.input.source_finished
                && self.input.len() == 0
                && self.output.available() == 0
            {
                break;
            }
        }
        Ok(total)
    }

    fn channel_count(&self) -> usize {
        self.source.channel_count()
    }
}
