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
//! Output lines that audio data can be written to.

use std::time::Duration;

use crate::format::AudioFormat;

mod cpal;

pub use self::cpal::CpalSourceDataLine;

/// Error types for output line operations.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("line is not open")]
    NotOpen,

    #[error("line does not support format {0}")]
    UnsupportedFormat(AudioFormat),

    #[error("write of {len} bytes is not a whole number of {frame_size} byte frames")]
    PartialFrame { len: usize, frame_size: usize },

    #[error("no output device found with name {0}")]
    NoDevice(String),

    #[error("output thread exited before the stream started")]
    Disconnected,

    #[error("queued audio did not play out within {0:?}")]
    DrainTimeout(Duration),

    #[error("CPAL host unavailable: {0}")]
    Host(#[from] ::cpal::HostUnavailable),

    #[error("unable to list devices: {0}")]
    Devices(#[from] ::cpal::DevicesError),

    #[error("unable to get device name: {0}")]
    DeviceName(#[from] ::cpal::DeviceNameError),

    #[error("unable to get default output config: {0}")]
    DefaultConfig(#[from] ::cpal::DefaultStreamConfigError),

    #[error("unable to build output stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),

    #[error("unable to start output stream: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A line bound to one audio format with an open/close lifecycle.
pub trait Line: Send {
    /// The format the line was created with.
    fn format(&self) -> &AudioFormat;

    /// Acquires the system resources the line needs. Opening an open line
    /// does nothing.
    fn open(&mut self) -> Result<(), LineError>;

    /// Releases the line's system resources. Queued audio is discarded.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// A line that plays audio written to it.
pub trait SourceDataLine: Line {
    /// Queues `data` for playback, blocking until all of it is queued.
    /// `data` must hold a whole number of frames. Returns the bytes written.
    fn write(&mut self, data: &[u8]) -> Result<usize, LineError>;

    /// Blocks until all queued audio has been played.
    fn drain(&mut self) -> Result<(), LineError>;

    /// Discards queued audio that has not been played yet.
    fn flush(&mut self);

    /// Bytes that can be written without blocking.
    fn available(&self) -> usize;

    /// Size of the line's queue in bytes.
    fn buffer_size(&self) -> usize;
}
