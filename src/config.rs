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
//! Configuration for the sampled tool, read from YAML and overridden by
//! `SAMPLED__` environment variables, e.g. `SAMPLED__LINE__DEVICE`.
use std::path::Path;

use ::config::{Environment, File, FileFormat};
use serde::Deserialize;

mod error;
mod line;

pub use error::ConfigError;
pub use line::Line;

const ENV_PREFIX: &str = "SAMPLED";

/// A YAML representation of the sampled configuration.
#[derive(Deserialize, Clone, Default)]
pub struct Config {
    /// The output line.
    line: Option<Line>,
}

impl Config {
    /// Loads the configuration from an optional YAML file, then applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }
        Ok(builder
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?)
    }

    /// Parses the configuration from a YAML string, then applies environment
    /// overrides.
    pub fn from_yaml(yaml: &str) -> Result<Config, ConfigError> {
        Ok(::config::Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    /// Returns the line configuration, or the defaults if none was given.
    pub fn line(&self) -> Line {
        self.line.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::{env, fs, time::Duration};

    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_defaults() {
        let config = Config::from_yaml("").unwrap();
        let line = config.line();
        assert_eq!(line.device(), None);
        assert_eq!(line.buffer_frames(), 4096);
        assert_eq!(line.drain_timeout().unwrap(), Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn test_yaml() {
        let yaml = r#"
            line:
              device: "USB Audio"
              buffer_frames: 2048
              drain_timeout: 250ms
        "#;

        let line = Config::from_yaml(yaml).unwrap().line();
        assert_eq!(line.device(), Some("USB Audio"));
        assert_eq!(line.buffer_frames(), 2048);
        assert_eq!(line.drain_timeout().unwrap(), Duration::from_millis(250));
    }

    #[test]
    #[serial]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sampled.yaml");
        fs::write(&path, "line:\n  buffer_frames: 512\n").unwrap();

        let line = Config::load(Some(&path)).unwrap().line();
        assert_eq!(line.buffer_frames(), 512);
        assert_eq!(line.device(), None);
    }

    #[test]
    #[serial]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("missing.yaml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    #[serial]
    fn test_environment_overrides_yaml() {
        env::set_var("SAMPLED__LINE__DEVICE", "pulse");
        let result = Config::from_yaml("line:\n  device: hw0\n  buffer_frames: 1024\n");
        env::remove_var("SAMPLED__LINE__DEVICE");

        let line = result.unwrap().line();
        assert_eq!(line.device(), Some("pulse"));
        assert_eq!(line.buffer_frames(), 1024);
    }

    #[test]
    #[serial]
    fn test_bad_duration() {
        let line = Config::from_yaml("line:\n  drain_timeout: soon\n")
            .unwrap()
            .line();
        assert!(line.drain_timeout().is_err());
    }
}
