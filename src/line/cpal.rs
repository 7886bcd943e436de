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
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use super::{Line, LineError, SourceDataLine};
use crate::codec::SampleLayout;
use crate::config;
use crate::format::AudioFormat;

/// How often drain checks whether the queue has played out.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Samples waiting to be played, shared with the device callback.
struct Queue {
    samples: Mutex<VecDeque<f32>>,
    space: Condvar,
    capacity: usize,
}

impl Queue {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            space: Condvar::new(),
            capacity,
        }
    }

    fn len(&self) -> usize {
        self.samples.lock().len()
    }

    fn clear(&self) {
        self.samples.lock().clear();
        self.space.notify_all();
    }

    /// Queues all of `samples`, waiting for the device to make room while
    /// `running` holds. Returns the number of samples queued.
    fn push(&self, samples: &[f32], running: &AtomicBool) -> usize {
        let mut written = 0;
        let mut queue = self.samples.lock();
        while written < samples.len() {
            let space = self.capacity - queue.len();
            if space == 0 {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                self.space.wait_for(&mut queue, Duration::from_millis(100));
                continue;
            }
            let n = space.min(samples.len() - written);
            queue.extend(&samples[written..written + n]);
            written += n;
        }
        written
    }

    /// Fills `output` from the queue and pads any shortfall with silence.
    fn pop_into(&self, output: &mut [f32]) -> usize {
        let mut queue = self.samples.lock();
        let n = queue.len().min(output.len());
        for (dst, src) in output.iter_mut().zip(queue.drain(..n)) {
            *dst = src;
        }
        drop(queue);

        output[n..].fill(0.0);
        self.space.notify_all();
        n
    }
}

/// The running device stream. The cpal stream itself lives on the output
/// thread, since it cannot move between threads on every platform.
struct Output {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// A source data line that plays through a cpal output device.
///
/// Creating the line does not touch the audio hardware. The device is
/// located and the stream started when the line is opened.
pub struct CpalSourceDataLine {
    format: AudioFormat,
    config: config::Line,
    queue: Arc<Queue>,
    running: Arc<AtomicBool>,
    drain_timeout: Duration,
    output: Option<Output>,
}

impl CpalSourceDataLine {
    /// Creates a line for `format` using the default configuration.
    pub fn new(format: AudioFormat) -> CpalSourceDataLine {
        Self::with_config(format, config::Line::default())
    }

    pub fn with_config(format: AudioFormat, config: config::Line) -> CpalSourceDataLine {
        let channels = format.channels().max(1) as usize;
        let queue = Arc::new(Queue::new(config.buffer_frames() * channels));
        CpalSourceDataLine {
            format,
            config,
            queue,
            running: Arc::new(AtomicBool::new(false)),
            drain_timeout: Duration::ZERO,
            output: None,
        }
    }

    /// Returns the sample layout, channel count and rate of the line's format
    /// if it can be played.
    fn playable(&self) -> Result<(SampleLayout, u16, u32), LineError> {
        let unsupported = || LineError::UnsupportedFormat(self.format);
        let layout = SampleLayout::for_format(&self.format).ok_or_else(unsupported)?;
        let channels = u16::try_from(self.format.channels())
            .ok()
            .filter(|channels| *channels > 0)
            .ok_or_else(unsupported)?;
        let sample_rate = self.format.sample_rate_hz().ok_or_else(unsupported)?;
        Ok((layout, channels, sample_rate))
    }

    fn frame_size(&self) -> usize {
        self.format.frame_size().max(1) as usize
    }

    /// Starts the output thread and waits for it to report whether the stream
    /// started.
    fn start_output(&mut self, channels: u16, sample_rate: u32) -> Result<(), LineError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let device_name = self.config.device().map(str::to_string);
        let queue = self.queue.clone();
        let thread_stop = stop.clone();

        let thread = thread::spawn(move || {
            let stream = match build_stream(device_name.as_deref(), channels, sample_rate, queue)
            {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e.into()));
                return;
            }
            info!(channels, sample_rate, "CPAL output stream started.");
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive until the line is closed.
            while !thread_stop.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(50));
            }
            debug!("CPAL output stream stopped.");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.output = Some(Output { stop, thread });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(LineError::Disconnected)
            }
        }
    }
}

impl Line for CpalSourceDataLine {
    fn format(&self) -> &AudioFormat {
        &self.format
    }

    fn open(&mut self) -> Result<(), LineError> {
        if self.is_open() {
            return Ok(());
        }

        let (_, channels, sample_rate) = self.playable()?;
        self.drain_timeout = self.config.drain_timeout()?;
        self.start_output(channels, sample_rate)?;
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(output) = self.output.take() {
            output.stop.store(true, Ordering::Release);
            if output.thread.join().is_err() {
                error!("CPAL output thread panicked.");
            }
        }
        self.queue.clear();
    }

    fn is_open(&self) -> bool {
        self.output.is_some()
    }
}

impl SourceDataLine for CpalSourceDataLine {
    fn write(&mut self, data: &[u8]) -> Result<usize, LineError> {
        if !self.is_open() {
            return Err(LineError::NotOpen);
        }
        let frame_size = self.frame_size();
        if data.len() % frame_size != 0 {
            return Err(LineError::PartialFrame {
                len: data.len(),
                frame_size,
            });
        }

        let (layout, _, _) = self.playable()?;
        let samples: Vec<f32> = data
            .chunks_exact(layout.bytes_per_sample())
            .map(|sample| layout.decode(sample))
            .collect();

        let queued = self.queue.push(&samples, &self.running);
        Ok(queued * layout.bytes_per_sample())
    }

    fn drain(&mut self) -> Result<(), LineError> {
        if !self.is_open() {
            return Ok(());
        }

        let timeout = self.drain_timeout;
        let start = Instant::now();
        while self.queue.len() > 0 {
            if start.elapsed() >= timeout {
                return Err(LineError::DrainTimeout(timeout));
            }
            spin_sleep::sleep(DRAIN_POLL_INTERVAL);
        }
        Ok(())
    }

    fn flush(&mut self) {
        self.queue.clear();
    }

    fn available(&self) -> usize {
        let channels = self.format.channels().max(1) as usize;
        let free_frames = (self.queue.capacity - self.queue.len()) / channels;
        free_frames * self.frame_size()
    }

    fn buffer_size(&self) -> usize {
        self.config.buffer_frames() * self.frame_size()
    }
}

impl Drop for CpalSourceDataLine {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for CpalSourceDataLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpalSourceDataLine")
            .field("format", &self.format)
            .field("device", &self.config.device())
            .field("open", &self.is_open())
            .finish()
    }
}

/// Finds the named output device, or the default device of the default host.
fn find_device(name: Option<&str>) -> Result<cpal::Device, LineError> {
    let name = match name {
        Some(name) if name != "default" => name,
        _ => {
            return cpal::default_host()
                .default_output_device()
                .ok_or_else(|| LineError::NoDevice("default".to_string()));
        }
    };

    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    for host_id in cpal::available_hosts() {
        let devices = match cpal::host_from_id(host_id)?.output_devices() {
            Ok(devices) => devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };
        for device in devices {
            if device.description()?.name().trim() == name {
                return Ok(device);
            }
        }
    }
    Err(LineError::NoDevice(name.to_string()))
}

/// Builds a paused output stream that plays from `queue`, in the device's
/// preferred sample type.
fn build_stream(
    device_name: Option<&str>,
    channels: u16,
    sample_rate: u32,
    queue: Arc<Queue>,
) -> Result<cpal::Stream, LineError> {
    let device = find_device(device_name)?;
    let sample_format = device.default_output_config()?.sample_format();
    let config = cpal::StreamConfig {
        channels,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    debug!(
        device = %device
            .description()
            .map(|d| d.name().to_string())
            .unwrap_or_default(),
        channels,
        sample_rate,
        ?sample_format,
        "Building CPAL output stream."
    );

    let stream = match sample_format {
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config,
            write_callback::<i16>(queue),
            |err| error!("CPAL output stream error: {}", err),
            None,
        )?,
        cpal::SampleFormat::I32 => device.build_output_stream(
            &config,
            write_callback::<i32>(queue),
            |err| error!("CPAL output stream error: {}", err),
            None,
        )?,
        _ => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                queue.pop_into(data);
            },
            |err| error!("CPAL output stream error: {}", err),
            None,
        )?,
    };
    Ok(stream)
}

/// Integer callback: read from the queue and convert.
fn write_callback<T: cpal::SizedSample + cpal::FromSample<f32>>(
    queue: Arc<Queue>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    let mut temp = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        temp.resize(data.len(), 0.0f32);
        queue.pop_into(&mut temp);
        for (dst, &src) in data.iter_mut().zip(temp.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Encoding;

    fn stereo16() -> AudioFormat {
        AudioFormat::pcm(44100.0, 16, 2, true, false)
    }

    #[test]
    fn test_new_line_is_closed() {
        let line = CpalSourceDataLine::new(stereo16());
        assert!(!line.is_open());
        assert_eq!(line.format(), &stereo16());
    }

    #[test]
    fn test_write_before_open() {
        let mut line = CpalSourceDataLine::new(stereo16());
        assert!(matches!(line.write(&[0; 4]), Err(LineError::NotOpen)));
        // Drain on a closed line has nothing to wait for.
        assert!(line.drain().is_ok());
    }

    #[test]
    fn test_buffer_size_follows_config() {
        let config: config::Line = ::config::Config::builder()
            .add_source(::config::File::from_str(
                "buffer_frames: 256",
                ::config::FileFormat::Yaml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let line = CpalSourceDataLine::with_config(stereo16(), config);
        assert_eq!(line.buffer_size(), 1024);
        assert_eq!(line.available(), 1024);
    }

    #[test]
    fn test_open_rejects_unplayable_format() {
        let unknown_rate = AudioFormat::pcm(-1.0, 16, 2, true, false);
        let mut line = CpalSourceDataLine::new(unknown_rate);
        assert!(matches!(
            line.open(),
            Err(LineError::UnsupportedFormat(_))
        ));
        assert!(!line.is_open());

        let no_size = AudioFormat::new(Encoding::PcmFloat, 44100.0, 12, 1, 2, 44100.0, false);
        let mut line = CpalSourceDataLine::new(no_size);
        assert!(matches!(
            line.open(),
            Err(LineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_open_unknown_device_reports_error() {
        let config = config::Line::new(Some("no such output device"));
        let mut line = CpalSourceDataLine::with_config(stereo16(), config);

        // The output thread reports the failure back before open returns.
        assert!(line.open().is_err());
        assert!(!line.is_open());
        assert!(matches!(line.write(&[0; 4]), Err(LineError::NotOpen)));
    }

    #[test]
    fn test_queue_pads_with_silence() {
        let queue = Queue::new(8);
        let running = AtomicBool::new(true);
        assert_eq!(queue.push(&[0.5, -0.5, 0.25], &running), 3);

        let mut output = [1.0f32; 5];
        assert_eq!(queue.pop_into(&mut output), 3);
        assert_eq!(output, [0.5, -0.5, 0.25, 0.0, 0.0]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_queue_stops_when_full_and_not_running() {
        let queue = Queue::new(2);
        let running = AtomicBool::new(false);
        assert_eq!(queue.push(&[0.1, 0.2, 0.3], &running), 2);
    }

    #[test]
    fn test_queue_waits_for_consumer() {
        let queue = Arc::new(Queue::new(4));
        let running = Arc::new(AtomicBool::new(true));

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut output = [0.0f32; 4];
                let mut consumed = 0;
                while consumed < 10 {
                    consumed += queue.pop_into(&mut output);
                    thread::sleep(Duration::from_millis(1));
                }
                consumed
            })
        };

        let samples = [0.1f32; 10];
        assert_eq!(queue.push(&samples, &running), 10);
        assert_eq!(consumer.join().unwrap(), 10);
    }
}
