//! Tonecheck - sine tone generation and loopback verification
//!
//! This library synthesizes a phase-continuous reference tone for playback
//! through an audio device and verifies, from a captured loopback signal,
//! that the tone arriving at an input path still carries the expected
//! frequency and amplitude.

pub mod audio;
pub mod config;

pub use audio::analyzer::{AnalysisResult, LoopbackAnalyzer, Tolerances};
pub use audio::capture::{CaptureAccumulator, CaptureHandle, CaptureWriter};
pub use audio::engine::ToneEngine;
pub use audio::format::{FormatEncoder, SampleFormat};
pub use audio::sine::{SineGenerator, ToneControl};
pub use config::TestConfig;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default sample rate for tone generation and capture
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default reference tone frequency (A4)
pub const DEFAULT_FREQUENCY_HZ: f64 = 440.0;

/// Default tone amplitude (-6 dBFS to leave headroom)
pub const DEFAULT_AMPLITUDE: f64 = 0.5;

/// Default capture duration in seconds for loopback verification
pub const DEFAULT_DURATION_SECS: f64 = 2.0;
