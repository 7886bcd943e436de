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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::ConfigError;

const DEFAULT_BUFFER_FRAMES: usize = 4096;
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A YAML representation of the output line configuration.
#[derive(Deserialize, Clone, Default, Debug)]
pub struct Line {
    /// The output device name. The host default is used when unset.
    device: Option<String>,

    /// Frames the line queues ahead of the device (default: 4096).
    buffer_frames: Option<usize>,

    /// How long drain waits for queued audio to play out (default: 5s).
    drain_timeout: Option<String>,
}

impl Line {
    /// Creates a line configuration for the given device.
    pub fn new(device: Option<&str>) -> Line {
        Line {
            device: device.map(str::to_string),
            ..Default::default()
        }
    }

    /// Returns the configured device name, if any.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Replaces the configured device.
    pub fn set_device(&mut self, device: Option<String>) {
        self.device = device;
    }

    /// Returns the queue size in frames. Never zero.
    pub fn buffer_frames(&self) -> usize {
        self.buffer_frames.unwrap_or(DEFAULT_BUFFER_FRAMES).max(1)
    }

    pub fn drain_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.drain_timeout {
            Some(value) => DurationString::from_string(value.clone())
                .map(Into::into)
                .map_err(|reason| ConfigError::Duration {
                    value: value.clone(),
                    reason: reason.to_string(),
                }),
            None => Ok(DEFAULT_DRAIN_TIMEOUT),
        }
    }
}
