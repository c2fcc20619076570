//! Audio device adapter for tone playback and loopback capture
//!
//! Wraps cpal device and stream management around the core:
//! - The output callback pulls frames through [`TonePlayback::fill`]
//! - The input callback pushes captured frames into a
//!   [`CaptureWriter`](crate::audio::capture::CaptureWriter)
//!
//! The core never initiates calls into the platform layer; per-callback
//! state is moved directly into the stream closures so the hot path takes
//! no locks.

use crate::audio::capture::{capture_channel, CaptureHandle};
use crate::audio::sine::{SineGenerator, ToneControl};
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No audio devices found")]
    NoDevicesFound,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("No device selected")]
    NoDeviceSelected,

    #[error("No input channels available")]
    NoInputChannels,

    #[error("No output channels available")]
    NoOutputChannels,
}

/// Audio device information
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device name
    pub name: String,
    /// Whether this is the default device
    pub is_default: bool,
    /// Supported sample rates
    pub sample_rates: Vec<u32>,
    /// Number of input channels
    pub input_channels: u16,
    /// Number of output channels
    pub output_channels: u16,
}

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Engine is stopped
    Stopped,
    /// Streams are open and running
    Running,
}

/// Per-period fill operation for the output callback
///
/// Owns the generator for the lifetime of a stream; the platform layer
/// invokes [`fill`] once per buffer period and must receive every frame
/// before the call returns.
///
/// [`fill`]: TonePlayback::fill
#[derive(Debug)]
pub struct TonePlayback {
    generator: SineGenerator,
    control: Arc<ToneControl>,
    channels: usize,
}

impl TonePlayback {
    /// Create a fill operation for a generator and output channel count
    pub fn new(generator: SineGenerator, control: Arc<ToneControl>, channels: usize) -> Self {
        Self {
            generator,
            control,
            channels,
        }
    }

    /// Fill an interleaved output buffer with the next tone frames
    ///
    /// Control changes land at buffer boundaries only; each mono sample is
    /// replicated across every output channel.
    pub fn fill(&mut self, out: &mut [f32]) {
        self.generator.apply(&self.control);
        for frame in out.chunks_mut(self.channels) {
            let sample = self.generator.next_sample() as f32;
            frame.fill(sample);
        }
    }

    /// Output channel count
    pub fn channels(&self) -> usize {
        self.channels
    }
}

/// Audio engine managing playback and capture streams
pub struct ToneEngine {
    state: EngineState,
    sample_rate: u32,
    device_name: Option<String>,
    device: Option<Device>,
    output_stream: Option<Stream>,
    input_stream: Option<Stream>,
    control: Option<Arc<ToneControl>>,
    running: Option<Arc<AtomicBool>>,
    frames_played: Option<Arc<AtomicUsize>>,
    frames_captured: Option<Arc<AtomicUsize>>,
}

impl ToneEngine {
    /// Create a new engine with default settings
    pub fn new() -> Self {
        Self {
            state: EngineState::Stopped,
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            device_name: None,
            device: None,
            output_stream: None,
            input_stream: None,
            control: None,
            running: None,
            frames_played: None,
            frames_captured: None,
        }
    }

    /// Get current engine state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Get configured sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Set sample rate (must be called before start)
    pub fn set_sample_rate(&mut self, rate: u32) {
        if (8000..=384000).contains(&rate) {
            self.sample_rate = rate;
        }
    }

    /// List available audio devices
    pub fn list_devices() -> Result<Vec<DeviceInfo>> {
        let host = cpal::default_host();
        let mut devices = Vec::new();

        let default_input = host.default_input_device().map(|d| d.name().ok());
        let default_output = host.default_output_device().map(|d| d.name().ok());

        for device in host.devices()? {
            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

            let is_default = default_input
                .as_ref()
                .map(|d| d.as_ref() == Some(&name))
                .unwrap_or(false)
                || default_output
                    .as_ref()
                    .map(|d| d.as_ref() == Some(&name))
                    .unwrap_or(false);

            let input_channels = device
                .default_input_config()
                .map(|c| c.channels())
                .unwrap_or(0);

            let output_channels = device
                .default_output_config()
                .map(|c| c.channels())
                .unwrap_or(0);

            // Common sample rates to check
            let common_rates = [44100, 48000, 88200, 96000, 176400, 192000];
            let mut sample_rates = Vec::new();

            if let Ok(configs) = device.supported_output_configs() {
                for config in configs {
                    for &rate in &common_rates {
                        if (config.min_sample_rate().0..=config.max_sample_rate().0).contains(&rate)
                            && !sample_rates.contains(&rate)
                        {
                            sample_rates.push(rate);
                        }
                    }
                }
            }

            sample_rates.sort();

            devices.push(DeviceInfo {
                name,
                is_default,
                sample_rates,
                input_channels,
                output_channels,
            });
        }

        Ok(devices)
    }

    /// Select a device by name
    pub fn select_device(&mut self, name: &str) -> Result<()> {
        let host = cpal::default_host();

        let device = host
            .devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| EngineError::DeviceNotFound(name.to_string()))?;

        self.device_name = Some(name.to_string());
        self.device = Some(device);

        Ok(())
    }

    /// Select the default output device
    pub fn select_default(&mut self) -> Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(EngineError::NoDevicesFound)?;

        self.device_name = device.name().ok();
        self.device = Some(device);

        Ok(())
    }

    /// Get the selected device name
    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    /// Control handle for runtime frequency/amplitude changes
    ///
    /// Available while a stream is running; changes take effect at the next
    /// buffer boundary.
    pub fn control(&self) -> Option<Arc<ToneControl>> {
        self.control.clone()
    }

    /// Pick a working sample rate, preferring the configured one
    fn probe_sample_rate(&self, device: &Device, channels: u16) -> u32 {
        let device_rate = device
            .default_output_config()
            .map(|c| c.sample_rate().0)
            .unwrap_or(self.sample_rate);

        let rates_to_try = if device_rate != self.sample_rate {
            vec![self.sample_rate, device_rate]
        } else {
            vec![self.sample_rate]
        };

        for &rate in &rates_to_try {
            let config = StreamConfig {
                channels,
                sample_rate: SampleRate(rate),
                buffer_size: cpal::BufferSize::Default,
            };
            match device.build_output_stream(
                &config,
                |_: &mut [f32], _: &cpal::OutputCallbackInfo| {},
                |_| {},
                None,
            ) {
                Ok(_stream) => {
                    if rate != self.sample_rate {
                        tracing::warn!(
                            "Configured rate {} Hz failed, using device default {} Hz",
                            self.sample_rate,
                            rate
                        );
                    }
                    return rate;
                }
                Err(e) => {
                    tracing::warn!("Sample rate {} Hz failed: {}", rate, e);
                    continue;
                }
            }
        }

        device_rate
    }

    /// Start tone playback on the selected device
    ///
    /// Opens an output stream and begins filling it with a phase-continuous
    /// sine tone replicated across all device channels.
    pub fn start_playback(&mut self, frequency: f64, amplitude: f64) -> Result<()> {
        self.open_streams(frequency, amplitude, None)?;
        Ok(())
    }

    /// Start playback plus loopback capture on the selected device
    ///
    /// Opens both an output stream carrying the tone and an input stream
    /// accumulating channel 0 of the captured frames. The returned handle
    /// signals when `duration_secs` of audio has been collected; the engine
    /// enforces no timeout.
    pub fn start_loopback(
        &mut self,
        frequency: f64,
        amplitude: f64,
        duration_secs: f64,
    ) -> Result<CaptureHandle> {
        let handle = self.open_streams(frequency, amplitude, Some(duration_secs))?;
        handle.ok_or_else(|| anyhow!("Capture handle missing after loopback start"))
    }

    fn open_streams(
        &mut self,
        frequency: f64,
        amplitude: f64,
        capture_duration_secs: Option<f64>,
    ) -> Result<Option<CaptureHandle>> {
        let device = self.device.as_ref().ok_or(EngineError::NoDeviceSelected)?;

        let default_output = device.default_output_config();
        let output_channels = default_output.as_ref().map(|c| c.channels()).unwrap_or(2);
        if output_channels == 0 {
            return Err(EngineError::NoOutputChannels.into());
        }

        let effective_rate = self.probe_sample_rate(device, output_channels);
        tracing::info!("Effective sample rate: {} Hz", effective_rate);

        let output_config = StreamConfig {
            channels: output_channels,
            sample_rate: SampleRate(effective_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let generator = SineGenerator::new(frequency, f64::from(effective_rate), amplitude)?;
        let control = Arc::new(ToneControl::new(frequency, amplitude));

        let running = Arc::new(AtomicBool::new(true));
        let frames_played = Arc::new(AtomicUsize::new(0));
        let frames_captured = Arc::new(AtomicUsize::new(0));

        // Output stream: TonePlayback moved into the closure (no locks)
        let mut playback = TonePlayback::new(generator, Arc::clone(&control), output_channels as usize);
        let output_running = Arc::clone(&running);
        let output_frames = Arc::clone(&frames_played);
        let num_output_channels = output_channels as usize;
        let output_stream = device.build_output_stream(
            &output_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if output_running.load(Ordering::Relaxed) {
                    playback.fill(data);

                    let frame_count = data.len() / num_output_channels;
                    let prev = output_frames.fetch_add(frame_count, Ordering::Relaxed);
                    if prev == 0 {
                        tracing::info!(
                            "Output callback started: {} frames ({} channels), first sample {:.4}",
                            frame_count,
                            num_output_channels,
                            data.first().copied().unwrap_or(0.0)
                        );
                    }
                } else {
                    data.fill(0.0);
                }
            },
            move |err| {
                tracing::error!("Output stream error: {}", err);
            },
            None,
        )?;

        // Input stream only for loopback captures
        let (input_stream, capture_handle) = match capture_duration_secs {
            Some(duration_secs) => {
                let default_input = device.default_input_config();
                let input_channels = default_input.as_ref().map(|c| c.channels()).unwrap_or(0);
                if input_channels == 0 {
                    return Err(EngineError::NoInputChannels.into());
                }

                let input_config = StreamConfig {
                    channels: input_channels,
                    sample_rate: SampleRate(effective_rate),
                    buffer_size: cpal::BufferSize::Default,
                };

                let target = (duration_secs * f64::from(effective_rate)) as usize;
                let (mut writer, handle) = capture_channel(target);

                // CaptureWriter moved into the closure (no locks)
                let input_running = Arc::clone(&running);
                let input_frames = Arc::clone(&frames_captured);
                let num_input_channels = input_channels as usize;
                let input_stream = device.build_input_stream(
                    &input_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if input_running.load(Ordering::Relaxed) {
                            let accepted = writer.push_frames(data, num_input_channels);

                            let prev = input_frames.fetch_add(accepted, Ordering::Relaxed);
                            if prev == 0 && accepted > 0 {
                                tracing::info!(
                                    "Input callback started: {} frames ({} channels)",
                                    accepted,
                                    num_input_channels
                                );
                            }
                        }
                    },
                    move |err| {
                        tracing::error!("Input stream error: {}", err);
                    },
                    None,
                )?;

                (Some(input_stream), Some(handle))
            }
            None => (None, None),
        };

        output_stream.play()?;
        if let Some(ref stream) = input_stream {
            stream.play()?;
        }

        self.output_stream = Some(output_stream);
        self.input_stream = input_stream;
        self.control = Some(control);
        self.running = Some(running);
        self.frames_played = Some(frames_played);
        self.frames_captured = Some(frames_captured);
        self.state = EngineState::Running;
        self.sample_rate = effective_rate;

        tracing::info!(
            "Engine started: {} @ {}Hz, {:.1} Hz tone",
            self.device_name.as_deref().unwrap_or("unknown"),
            effective_rate,
            frequency
        );

        Ok(capture_handle)
    }

    /// Stop audio processing
    ///
    /// Streams are torn down; generator phase lives in the streams and is
    /// not carried across a restart.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(ref running) = self.running {
            running.store(false, Ordering::Relaxed);
        }

        self.input_stream = None;
        self.output_stream = None;
        self.control = None;
        self.running = None;
        self.frames_played = None;
        self.frames_captured = None;

        self.state = EngineState::Stopped;

        tracing::info!("Engine stopped");

        Ok(())
    }

    /// Get frame counts for diagnostics (played, captured)
    pub fn frame_counts(&self) -> (usize, usize) {
        let played = self
            .frames_played
            .as_ref()
            .map(|s| s.load(Ordering::Relaxed))
            .unwrap_or(0);
        let captured = self
            .frames_captured
            .as_ref()
            .map(|s| s.load(Ordering::Relaxed))
            .unwrap_or(0);
        (played, captured)
    }
}

impl Default for ToneEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ToneEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
