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
use crate::spi::ConversionError;

/// Errors returned by the audio system facade.
#[derive(Debug, thiserror::Error)]
pub enum AudioSystemError {
    /// No reader recognised the input.
    #[error("Unsupported audio file: {0}")]
    UnsupportedAudioFile(String),

    /// No codec can convert between the two formats.
    #[error("Unsupported conversion: {target} from {from}")]
    UnsupportedConversion {
        target: AudioFormat,
        from: AudioFormat,
    },

    #[error("Conversion failed: {0}")]
    Conversion(ConversionError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AudioSystemError {
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            AudioSystemError::UnsupportedAudioFile(_)
                | AudioSystemError::UnsupportedConversion { .. }
        )
    }
}

impl From<ConversionError> for AudioSystemError {
    fn from(e: ConversionError) -> Self {
        match e {
            ConversionError::Unsupported { target, from } => {
                AudioSystemError::UnsupportedConversion { target, from }
            }
            ConversionError::Io(e) => AudioSystemError::Io(e),
            other => AudioSystemError::Conversion(other),
        }
    }
}
