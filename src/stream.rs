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
use std::fmt;
use std::io::{self, Read, Seek};

use crate::format::{AudioFormat, NOT_SPECIFIED};

/// A positionable byte source that readers can inspect. The current position is
/// the mark: a reader that does not recognise the data must leave it as found.
pub trait MediaSource: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> MediaSource for T {}

/// A readable stream of audio frames in a known format.
///
/// Reads always return a whole number of frames and never go past the frame
/// length, if one is known. The stream is owned by whoever holds it.
pub struct AudioInputStream {
    inner: Box<dyn Read + Send>,
    format: AudioFormat,
    frame_size: usize,
    frame_length: i64,
    frame_position: i64,
}

impl AudioInputStream {
    /// Wraps a byte reader whose contents are frames in `format`. The frame
    /// length may be [`NOT_SPECIFIED`].
    pub fn new<R: Read + Send + 'static>(
        inner: R,
        format: AudioFormat,
        frame_length: i64,
    ) -> AudioInputStream {
        Self::from_boxed(Box::new(inner), format, frame_length)
    }

    pub fn from_boxed(
        inner: Box<dyn Read + Send>,
        format: AudioFormat,
        frame_length: i64,
    ) -> AudioInputStream {
        // Encodings with no fixed frame size are read a byte at a time.
        let frame_size = if format.frame_size() > 0 {
            format.frame_size() as usize
        } else {
            1
        };
        AudioInputStream {
            inner,
            format,
            frame_size,
            frame_length,
            frame_position: 0,
        }
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Total number of frames, or [`NOT_SPECIFIED`].
    pub fn frame_length(&self) -> i64 {
        self.frame_length
    }

    /// Number of frames read or skipped so far.
    pub fn frame_position(&self) -> i64 {
        self.frame_position
    }

    fn remaining_frames(&self) -> Option<u64> {
        if self.frame_length == i64::from(NOT_SPECIFIED) {
            None
        } else {
            Some((self.frame_length - self.frame_position).max(0) as u64)
        }
    }

    /// Skips up to `frames` frames and returns how many were skipped.
    pub fn skip_frames(&mut self, frames: u64) -> io::Result<u64> {
        let mut scratch = vec![0u8; self.frame_size * 1024];
        let mut skipped = 0;
        while skipped < frames {
            let want = ((frames - skipped) as usize).min(1024) * self.frame_size;
            let read = self.read(&mut scratch[..want])?;
            if read == 0 {
                break;
            }
            skipped += (read / self.frame_size) as u64;
        }
        Ok(skipped)
    }

    /// Reads the rest of the stream into memory.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        self.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Consumes the stream, returning the underlying reader.
    pub fn into_inner(self) -> Box<dyn Read + Send> {
        self.inner
    }
}

impl Read for AudioInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut max_frames = buf.len() / self.frame_size;
        if let Some(remaining) = self.remaining_frames() {
            max_frames = max_frames.min(remaining.min(usize::MAX as u64) as usize);
        }
        if max_frames == 0 {
            return Ok(0);
        }

        let want = max_frames * self.frame_size;
        let mut read = self.inner.read(&mut buf[..want])?;
        if read == 0 {
            return Ok(0);
        }

        // Complete a partial frame so callers only ever see whole frames.
        while read % self.frame_size != 0 {
            let more = self.inner.read(&mut buf[read..want])?;
            if more == 0 {
                read -= read % self.frame_size;
                break;
            }
            read += more;
        }

        self.frame_position += (read / self.frame_size) as i64;
        Ok(read)
    }
}

impl fmt::Debug for AudioInputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioInputStream")
            .field("format", &self.format)
            .field("frame_length", &self.frame_length)
            .field("frame_position", &self.frame_position)
            .finish()
    }
}
