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
use crate::format::AudioFormat;

/// Error types for file reader operations.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// The reader does not understand the data. The source position is
    /// unchanged, so the next reader may try.
    #[error("Unsupported audio file: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReaderError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ReaderError::Unsupported(_))
    }
}

/// Error types for format conversion operations.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Unsupported conversion: {target} from {from}")]
    Unsupported {
        target: AudioFormat,
        from: AudioFormat,
    },

    #[error("Resampling failed: {0}Hz -> {1}Hz")]
    ResamplingFailed(u32, u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
