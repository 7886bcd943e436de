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
use std::error::Error;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{crate_version, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sampled::config::Config;
use sampled::format::{AudioFormat, Encoding};
use sampled::line::{Line, SourceDataLine};
use sampled::stream::AudioInputStream;
use sampled::system;
use sampled::util::{
    duration_minutes_seconds, encodings_display, filename_display, is_url, length_display,
};

/// Bytes handed to the output line per write.
const PLAY_CHUNK_BYTES: usize = 16 * 1024;

/// Frames read from the stream per write when converting to a file.
const WRITE_CHUNK_FRAMES: usize = 4096;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sampled-audio toolbox: inspect, convert and play audio files."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describes the file format of a file or URL.
    Info {
        /// A path on disk or a URL.
        input: String,
    },
    /// Lists the target formats a file can be converted to.
    Targets {
        /// A path on disk or a URL.
        input: String,
        /// Only list formats of this encoding.
        #[arg(short, long)]
        encoding: Option<Encoding>,
    },
    /// Lists the encodings a file can be converted to.
    Encodings {
        /// A path on disk or a URL.
        input: String,
    },
    /// Converts a file and writes the result as a WAVE file.
    Convert {
        /// A path on disk or a URL.
        input: String,
        /// The WAVE file to write.
        output: PathBuf,
        /// Target encoding, either PCM_SIGNED or PCM_FLOAT.
        #[arg(short, long, default_value = "PCM_SIGNED")]
        encoding: Encoding,
        /// Target sample rate. Defaults to the source rate.
        #[arg(short, long)]
        rate: Option<u32>,
        /// Target sample size in bits.
        #[arg(short, long, default_value_t = 16)]
        bits: u16,
        /// Target channel count. Defaults to the source channel count.
        #[arg(short, long)]
        channels: Option<u16>,
    },
    /// Plays a file through an audio output device.
    Play {
        /// A path on disk or a URL.
        input: String,
        /// An optional YAML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// The output device. Overrides the configuration file.
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Lists the registered file readers and format converters.
    Providers {},
}

fn open(input: &str) -> Result<AudioInputStream, Box<dyn Error>> {
    Ok(if is_url(input) {
        system::audio_input_stream_from_url(input)?
    } else {
        system::audio_input_stream_from_path(input)?
    })
}

fn source_format(input: &str) -> Result<AudioFormat, Box<dyn Error>> {
    let file_format = if is_url(input) {
        system::audio_file_format_from_url(input)?
    } else {
        system::audio_file_format_from_path(input)?
    };
    Ok(*file_format.format())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => {
            let file_format = if is_url(&input) {
                system::audio_file_format_from_url(&input)?
            } else {
                system::audio_file_format_from_path(&input)?
            };
            let name = if is_url(&input) {
                input.as_str()
            } else {
                filename_display(Path::new(&input))
            };
            let format = file_format.format();

            println!("{}:", name);
            println!("- type: {}", file_format.file_type());
            println!("- encoding: {}", format.encoding());
            println!("- sample rate: {}", format.sample_rate());
            println!("- sample size: {} bits", format.sample_size_in_bits());
            println!("- channels: {}", format.channels());
            println!("- frame size: {} bytes", format.frame_size());
            println!(
                "- byte order: {}",
                if format.is_big_endian() { "big" } else { "little" }
            );
            println!("- frames: {}", length_display(file_format.frame_length()));
            if let Some(duration) = file_format.duration() {
                println!("- duration: {}", duration_minutes_seconds(duration));
            }
        }
        Commands::Targets { input, encoding } => {
            let source = source_format(&input)?;
            let encodings = match encoding {
                Some(encoding) => vec![encoding],
                None => system::target_encodings(&source),
            };

            let formats: Vec<AudioFormat> = encodings
                .into_iter()
                .flat_map(|encoding| system::target_formats(encoding, &source))
                .collect();
            if formats.is_empty() {
                println!("No target formats found.");
                return Ok(());
            }

            println!("Target formats (count: {}):", formats.len());
            for format in formats {
                println!("- {}", format);
            }
        }
        Commands::Encodings { input } => {
            let source = source_format(&input)?;
            let encodings = system::target_encodings(&source);
            if encodings.is_empty() {
                println!("No target encodings found.");
                return Ok(());
            }

            println!("Target encodings:");
            for encoding in encodings {
                println!("- {}", encoding);
            }
        }
        Commands::Convert {
            input,
            output,
            encoding,
            rate,
            bits,
            channels,
        } => {
            let stream = open(&input)?;
            let source = *stream.format();
            let rate = rate.map(|r| r as f32).unwrap_or(source.sample_rate());
            let channels = channels.map(i32::from).unwrap_or(source.channels());

            let (target, sample_format) = match encoding {
                Encoding::PcmSigned => (
                    AudioFormat::pcm(rate, i32::from(bits), channels, true, false),
                    hound::SampleFormat::Int,
                ),
                Encoding::PcmFloat => (
                    AudioFormat::float(rate, i32::from(bits), channels, false),
                    hound::SampleFormat::Float,
                ),
                other => return Err(format!("cannot write {} to a WAVE file", other).into()),
            };

            let mut converted = system::convert(&target, stream)?;
            let spec = hound::WavSpec {
                channels: u16::try_from(target.channels())?,
                sample_rate: rate as u32,
                bits_per_sample: bits,
                sample_format,
            };
            let frames = write_wave(&output, spec, &mut converted)?;
            info!(
                output = %output.display(),
                frames,
                format = %target,
                "Converted."
            );
            println!("Wrote {} frames to {}.", frames, output.display());
        }
        Commands::Play {
            input,
            config,
            device,
        } => {
            let config = Config::load(config.as_deref())?;
            let mut line_config = config.line();
            if device.is_some() {
                line_config.set_device(device);
            }

            let stream = open(&input)?;
            let source = *stream.format();
            let playable = AudioFormat::pcm(
                source.sample_rate(),
                16,
                source.channels(),
                true,
                source.is_big_endian(),
            );
            let mut stream = if source.matches(&playable) {
                stream
            } else {
                system::convert(&playable, stream)?
            };

            let mut line = system::source_data_line_with_config(stream.format(), line_config);
            line.open()?;
            info!(input = %input, format = %line.format(), "Playing.");

            let mut buf = vec![0u8; PLAY_CHUNK_BYTES];
            loop {
                let read = stream.read(&mut buf)?;
                if read == 0 {
                    break;
                }
                let mut written = 0;
                while written < read {
                    written += line.write(&buf[written..read])?;
                }
            }
            line.drain()?;
            line.close();
        }
        Commands::Providers {} => {
            println!("File readers:");
            for reader in system::audio_file_readers() {
                println!("- {}", reader.name());
            }

            println!("\nFormat converters:");
            for codec in system::format_conversion_providers() {
                println!("- {}", codec.name());
                println!("    from: {}", encodings_display(&codec.source_encodings()));
                println!("    to:   {}", encodings_display(&codec.target_encodings()));
            }
        }
    };

    Ok(())
}

/// Writes little-endian frames from the stream as a WAVE file and returns the
/// number of frames written.
fn write_wave(
    path: &Path,
    spec: hound::WavSpec,
    stream: &mut AudioInputStream,
) -> Result<u64, Box<dyn Error>> {
    let bytes = usize::from(spec.bits_per_sample / 8);
    let frame_size = bytes * usize::from(spec.channels);
    if spec.bits_per_sample % 8 != 0 || frame_size == 0 {
        return Err(format!(
            "cannot write {} channels of {}-bit samples",
            spec.channels, spec.bits_per_sample
        )
        .into());
    }
    let mut writer = hound::WavWriter::create(path, spec)?;

    let mut buf = vec![0u8; WRITE_CHUNK_FRAMES * frame_size];
    let mut filled = 0;
    let mut frames = 0u64;
    loop {
        let read = stream.read(&mut buf[filled..])?;
        if read == 0 {
            // A trailing partial frame is dropped.
            break;
        }
        filled += read;
        let whole = filled - filled % frame_size;

        for sample in buf[..whole].chunks_exact(bytes) {
            write_sample(&mut writer, spec, sample)?;
        }
        frames += (whole / frame_size) as u64;
        buf.copy_within(whole..filled, 0);
        filled -= whole;
    }
    writer.finalize()?;

    Ok(frames)
}

fn write_sample<W: std::io::Write + std::io::Seek>(
    writer: &mut hound::WavWriter<W>,
    spec: hound::WavSpec,
    sample: &[u8],
) -> Result<(), Box<dyn Error>> {
    match (spec.sample_format, sample.len()) {
        (hound::SampleFormat::Float, 4) => {
            writer.write_sample(f32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]))?
        }
        (hound::SampleFormat::Int, 1) => writer.write_sample(sample[0] as i8)?,
        (hound::SampleFormat::Int, 2) => {
            writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?
        }
        (hound::SampleFormat::Int, 3) => {
            // Sign extend from the top byte.
            let value = i32::from_le_bytes([0, sample[0], sample[1], sample[2]]) >> 8;
            writer.write_sample(value)?
        }
        (hound::SampleFormat::Int, 4) => {
            writer.write_sample(i32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]))?
        }
        _ => {
            return Err(format!(
                "cannot write {}-bit {:?} samples",
                spec.bits_per_sample, spec.sample_format
            )
            .into())
        }
    }
    Ok(())
}
