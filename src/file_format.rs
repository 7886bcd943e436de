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
use std::time::Duration;

use crate::format::{AudioFormat, NOT_SPECIFIED};

/// The container type of an audio file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFileType {
    Wave,
    Aiff,
    Au,
    Flac,
    Mp3,
    Ogg,
    Caf,
    Mp4,
    Matroska,
}

impl AudioFileType {
    pub fn name(self) -> &'static str {
        match self {
            AudioFileType::Wave => "WAVE",
            AudioFileType::Aiff => "AIFF",
            AudioFileType::Au => "AU",
            AudioFileType::Flac => "FLAC",
            AudioFileType::Mp3 => "MP3",
            AudioFileType::Ogg => "OGG",
            AudioFileType::Caf => "CAF",
            AudioFileType::Mp4 => "MP4",
            AudioFileType::Matroska => "MATROSKA",
        }
    }

    /// The conventional file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            AudioFileType::Wave => "wav",
            AudioFileType::Aiff => "aif",
            AudioFileType::Au => "au",
            AudioFileType::Flac => "flac",
            AudioFileType::Mp3 => "mp3",
            AudioFileType::Ogg => "ogg",
            AudioFileType::Caf => "caf",
            AudioFileType::Mp4 => "m4a",
            AudioFileType::Matroska => "mka",
        }
    }

    /// Guesses the container from the leading bytes of a file.
    pub fn sniff(header: &[u8]) -> Option<AudioFileType> {
        let starts = |magic: &[u8]| header.len() >= magic.len() && &header[..magic.len()] == magic;
        let at = |offset: usize, magic: &[u8]| {
            header.len() >= offset + magic.len() && &header[offset..offset + magic.len()] == magic
        };

        if (starts(b"RIFF") || starts(b"RIFX") || starts(b"RF64")) && at(8, b"WAVE") {
            Some(AudioFileType::Wave)
        } else if starts(b"FORM") && (at(8, b"AIFF") || at(8, b"AIFC")) {
            Some(AudioFileType::Aiff)
        } else if starts(b".snd") {
            Some(AudioFileType::Au)
        } else if starts(b"fLaC") {
            Some(AudioFileType::Flac)
        } else if starts(b"OggS") {
            Some(AudioFileType::Ogg)
        } else if starts(b"caff") {
            Some(AudioFileType::Caf)
        } else if at(4, b"ftyp") {
            Some(AudioFileType::Mp4)
        } else if starts(&[0x1a, 0x45, 0xdf, 0xa3]) {
            Some(AudioFileType::Matroska)
        } else if starts(b"ID3") || (header.len() >= 2 && header[0] == 0xff && header[1] & 0xe0 == 0xe0)
        {
            Some(AudioFileType::Mp3)
        } else {
            None
        }
    }
}

impl fmt::Display for AudioFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Describes a recognised audio file: its container, its size and the format of
/// the audio data it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFileFormat {
    file_type: AudioFileType,
    byte_length: i64,
    format: AudioFormat,
    frame_length: i64,
}

impl AudioFileFormat {
    /// Creates a new file format. Unknown lengths are [`NOT_SPECIFIED`].
    pub fn new(
        file_type: AudioFileType,
        byte_length: i64,
        format: AudioFormat,
        frame_length: i64,
    ) -> AudioFileFormat {
        AudioFileFormat {
            file_type,
            byte_length,
            format,
            frame_length,
        }
    }

    pub fn file_type(&self) -> AudioFileType {
        self.file_type
    }

    /// Size of the whole file in bytes, or [`NOT_SPECIFIED`].
    pub fn byte_length(&self) -> i64 {
        self.byte_length
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Number of sample frames in the file, or [`NOT_SPECIFIED`].
    pub fn frame_length(&self) -> i64 {
        self.frame_length
    }

    /// The playing time, if both the frame length and frame rate are known.
    pub fn duration(&self) -> Option<Duration> {
        let frame_rate = self.format.frame_rate();
        if self.frame_length == i64::from(NOT_SPECIFIED) || frame_rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            self.frame_length as f64 / f64::from(frame_rate),
        ))
    }
}

impl fmt::Display for AudioFileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) file", self.file_type, self.file_type.extension())?;
        if self.byte_length != i64::from(NOT_SPECIFIED) {
            write!(f, ", byte length: {}", self.byte_length)?;
        }
        write!(f, ", data format: {}", self.format)?;
        if self.frame_length != i64::from(NOT_SPECIFIED) {
            write!(f, ", frame length: {}", self.frame_length)?;
        }
        Ok(())
    }
}
