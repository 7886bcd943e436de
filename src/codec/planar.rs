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
use std::io::{self, Read};

use crate::spi::ConversionError;
use crate::stream::AudioInputStream;

use super::pcm::SampleLayout;

/// Frames pulled through the conversion pipeline per step.
pub(crate) const CHUNK_FRAMES: usize = 1024;

/// A stage of the conversion pipeline producing planar f32 samples.
/// Planar means all samples for channel 0, then all samples for channel 1, etc.
pub(crate) trait PlanarSource: Send {
    /// Clears `output` and fills each channel with up to `max_frames` samples.
    /// Every channel gets the same number of samples. Returns the number of
    /// frames written, 0 at end of stream.
    ///
    /// `output` must have exactly `channel_count()` elements.
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, ConversionError>;

    fn channel_count(&self) -> usize;
}

impl PlanarSource for Box<dyn PlanarSource> {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, ConversionError> {
        (**self).next_chunk(output, max_frames)
    }

    fn channel_count(&self) -> usize {
        (**self).channel_count()
    }
}

/// Decodes the interleaved frames of an audio input stream.
pub(crate) struct StreamDecoder {
    stream: AudioInputStream,
    layout: SampleLayout,
    channels: usize,
    buffer: Vec<u8>,
    /// Bytes of a frame split across reads.
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new(stream: AudioInputStream, layout: SampleLayout, channels: usize) -> StreamDecoder {
        StreamDecoder {
            stream,
            layout,
            channels,
            buffer: Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl PlanarSource for StreamDecoder {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, ConversionError> {
        for ch in output.iter_mut() {
            ch.clear();
        }

        let sample_bytes = self.layout.bytes_per_sample();
        let frame_bytes = sample_bytes * self.channels;
        if max_frames == 0 || frame_bytes == 0 {
            return Ok(0);
        }
        self.buffer.resize(frame_bytes * max_frames, 0);

        let mut filled = self.pending.len();
        self.buffer[..filled].copy_from_slice(&self.pending);
        self.pending.clear();

        // Streams without a known frame size may split frames across reads.
        while filled < frame_bytes {
            match self.stream.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let frames = filled / frame_bytes;
        let whole = frames * frame_bytes;
        self.pending.extend_from_slice(&self.buffer[whole..filled]);
        for frame in self.buffer[..whole].chunks_exact(frame_bytes) {
            for (ch, sample) in output.iter_mut().zip(frame.chunks_exact(sample_bytes)) {
                ch.push(self.layout.decode(sample));
            }
        }
        Ok(frames)
    }

    fn channel_count(&self) -> usize {
        self.channels
    }
}

/// Changes the channel count of a planar source. Mono is duplicated to every
/// output channel and multichannel audio is averaged down to mono. Otherwise
/// channels are copied by index and missing ones are silent.
pub(crate) struct ChannelMapper<S: PlanarSource> {
    source: S,
    channels: usize,
    scratch: Vec<Vec<f32>>,
}

impl<S: PlanarSource> ChannelMapper<S> {
    pub fn new(source: S, channels: usize) -> ChannelMapper<S> {
        let scratch = vec![Vec::with_capacity(CHUNK_FRAMES); source.channel_count()];
        ChannelMapper {
            source,
            channels,
            scratch,
        }
    }
}

impl<S: PlanarSource> PlanarSource for ChannelMapper<S> {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, ConversionError> {
        for ch in output.iter_mut() {
            ch.clear();
        }

        let frames = self.source.next_chunk(&mut self.scratch, max_frames)?;
        if frames == 0 {
            return Ok(0);
        }

        let source_channels = self.scratch.len();
        if source_channels == 1 {
            for ch in output.iter_mut() {
                ch.extend_from_slice(&self.scratch[0]);
            }
        } else if self.channels == 1 {
            let scale = 1.0 / source_channels as f32;
            output[0].extend((0..frames).map(|i| {
                self.scratch.iter().map(|ch| ch[i]).sum::<f32>() * scale
            }));
        } else {
            for (idx, ch) in output.iter_mut().enumerate() {
                match self.scratch.get(idx) {
                    Some(source) => ch.extend_from_slice(source),
                    None => ch.resize(frames, 0.0),
                }
            }
        }
        Ok(frames)
    }

    fn channel_count(&self) -> usize {
        self.channels
    }
}

/// Encodes a planar source into interleaved frames.
pub(crate) struct FrameEncoder<S: PlanarSource> {
    source: S,
    layout: SampleLayout,
    planar: Vec<Vec<f32>>,
    pending: Vec<u8>,
    pos: usize,
}

impl<S: PlanarSource> FrameEncoder<S> {
    pub fn new(source: S, layout: SampleLayout) -> FrameEncoder<S> {
        let planar = vec![Vec::with_capacity(CHUNK_FRAMES); source.channel_count()];
        FrameEncoder {
            source,
            layout,
            planar,
            pending: Vec::new(),
            pos: 0,
        }
    }

    fn refill(&mut self) -> Result<bool, ConversionError> {
        let frames = self.source.next_chunk(&mut self.planar, CHUNK_FRAMES)?;
        if frames == 0 {
            return Ok(false);
        }

        let sample_bytes = self.layout.bytes_per_sample();
        let frame_bytes = sample_bytes * self.planar.len();
        self.pending.resize(frames * frame_bytes, 0);
        self.pos = 0;

        for (i, frame) in self.pending.chunks_exact_mut(frame_bytes).enumerate() {
            for (ch, out) in self.planar.iter().zip(frame.chunks_exact_mut(sample_bytes)) {
                self.layout.encode(ch[i], out);
            }
        }
        Ok(true)
    }
}

impl<S: PlanarSource> Read for FrameEncoder<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.pending.len() {
            match self.refill() {
                Ok(true) => {}
                Ok(false) => return Ok(0),
                Err(ConversionError::Io(e)) => return Err(e),
                Err(e) => return Err(io::Error::other(e)),
            }
        }

        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
