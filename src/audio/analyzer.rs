//! Loopback signal analysis
//!
//! Batch verification of a captured tone: zero-crossing frequency detection
//! plus RMS and DC-offset checks against configured tolerances. Both checks
//! are pure functions over a finite buffer, invoked once after capture
//! accumulation completes.

use crate::audio::format::SampleFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during analysis
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Not enough samples to analyze: got {got}, need at least {need}")]
    InsufficientData { got: usize, need: usize },
}

/// Analysis tolerances, in units of the sample format's full scale
///
/// Defaults are expressed for normalized float samples; use [`scaled_to`]
/// to apply the same logical tolerance to integer PCM buffers.
///
/// [`scaled_to`]: Tolerances::scaled_to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// RMS below this is reported as too quiet
    pub min_rms: f64,
    /// |mean| above this is reported as a DC offset
    pub max_dc_offset: f64,
    /// Maximum accepted |detected - expected| frequency error in Hz
    pub frequency_tolerance_hz: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            min_rms: 0.01,
            max_dc_offset: 0.1,
            frequency_tolerance_hz: 5.0,
        }
    }
}

impl Tolerances {
    /// Scale the amplitude thresholds to a format's full-scale value
    ///
    /// The frequency tolerance is format-independent and passes through.
    pub fn scaled_to(&self, format: SampleFormat) -> Self {
        let full_scale = format.full_scale();
        Self {
            min_rms: self.min_rms * full_scale,
            max_dc_offset: self.max_dc_offset * full_scale,
            frequency_tolerance_hz: self.frequency_tolerance_hz,
        }
    }
}

/// Amplitude verdict with the measured values that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct AmplitudeCheck {
    /// Root mean square over the buffer
    pub rms: f64,
    /// Arithmetic mean over the buffer
    pub mean: f64,
    /// RMS fell below the configured quiet threshold
    pub too_quiet: bool,
    /// |mean| exceeded the configured offset threshold
    pub dc_offset: bool,
}

impl AmplitudeCheck {
    /// Whether both amplitude checks passed
    pub fn passed(&self) -> bool {
        !self.too_quiet && !self.dc_offset
    }
}

/// Combined verdict for a captured loopback buffer
///
/// Immutable once produced. Tolerance failures are carried here as data,
/// never raised as errors.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Frequency estimated from zero crossings, in Hz
    pub detected_frequency_hz: f64,
    /// |detected - expected| in Hz
    pub frequency_error_hz: f64,
    /// Root mean square over the buffer
    pub rms: f64,
    /// Arithmetic mean over the buffer
    pub mean_dc_offset: f64,
    /// Frequency error within tolerance
    pub frequency_ok: bool,
    /// RMS below the quiet threshold
    pub too_quiet: bool,
    /// |mean| above the offset threshold
    pub dc_offset: bool,
    /// Overall verdict against all configured tolerances
    pub passed: bool,
}

/// Estimate signal frequency by counting zero crossings
///
/// A crossing is a transition where the previous sample is negative and the
/// current is non-negative, or the previous is non-negative and the current
/// is negative. A sample of exactly zero is classified as non-negative.
///
/// For a pure sine of frequency `f` observed over duration `D` with
/// `D·f >> 1`, the detection error is bounded roughly by `1/D`.
///
/// # Example
/// ```
/// use tonecheck::audio::analyzer::detect_frequency;
/// use tonecheck::audio::sine::SineGenerator;
///
/// let mut gen = SineGenerator::new(440.0, 48000.0, 0.5).unwrap();
/// let mut samples = vec![0.0f32; 96000];
/// gen.fill_buffer(&mut samples);
///
/// let detected = detect_frequency(&samples, 48000).unwrap();
/// assert!((detected - 440.0).abs() <= 5.0);
/// ```
pub fn detect_frequency(samples: &[f32], sample_rate: u32) -> Result<f64, AnalysisError> {
    if samples.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            got: samples.len(),
            need: 2,
        });
    }

    let mut crossings = 0usize;
    let mut prev = samples[0];
    for &curr in &samples[1..] {
        if (prev < 0.0 && curr >= 0.0) || (prev >= 0.0 && curr < 0.0) {
            crossings += 1;
        }
        prev = curr;
    }

    let duration = samples.len() as f64 / f64::from(sample_rate);
    Ok((crossings as f64 / 2.0) / duration)
}

/// Compute mean and RMS and judge them against tolerances
pub fn check_amplitude(
    samples: &[f32],
    tolerances: &Tolerances,
) -> Result<AmplitudeCheck, AnalysisError> {
    if samples.is_empty() {
        return Err(AnalysisError::InsufficientData { got: 0, need: 1 });
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for &sample in samples {
        let s = f64::from(sample);
        sum += s;
        sum_sq += s * s;
    }

    let mean = sum / samples.len() as f64;
    let rms = (sum_sq / samples.len() as f64).sqrt();

    Ok(AmplitudeCheck {
        rms,
        mean,
        too_quiet: rms < tolerances.min_rms,
        dc_offset: mean.abs() > tolerances.max_dc_offset,
    })
}

/// Analyzer for a captured loopback buffer
///
/// Holds the expected frequency and tolerances; [`analyze`] combines the
/// frequency and amplitude checks into a single [`AnalysisResult`].
///
/// [`analyze`]: LoopbackAnalyzer::analyze
#[derive(Debug, Clone)]
pub struct LoopbackAnalyzer {
    sample_rate: u32,
    expected_frequency_hz: f64,
    tolerances: Tolerances,
}

impl LoopbackAnalyzer {
    /// Create an analyzer with default tolerances
    ///
    /// # Arguments
    /// * `sample_rate` - Capture sample rate in Hz
    /// * `expected_frequency_hz` - Reference tone frequency in Hz
    pub fn new(sample_rate: u32, expected_frequency_hz: f64) -> Self {
        Self {
            sample_rate,
            expected_frequency_hz,
            tolerances: Tolerances::default(),
        }
    }

    /// Replace the tolerances
    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    /// Capture sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Expected tone frequency in Hz
    pub fn expected_frequency_hz(&self) -> f64 {
        self.expected_frequency_hz
    }

    /// Analyze a captured mono buffer
    ///
    /// # Returns
    /// Combined verdict, or [`AnalysisError::InsufficientData`] for buffers
    /// too short to measure.
    pub fn analyze(&self, samples: &[f32]) -> Result<AnalysisResult, AnalysisError> {
        let detected_frequency_hz = detect_frequency(samples, self.sample_rate)?;
        let amplitude = check_amplitude(samples, &self.tolerances)?;

        let frequency_error_hz = (detected_frequency_hz - self.expected_frequency_hz).abs();
        let frequency_ok = frequency_error_hz <= self.tolerances.frequency_tolerance_hz;
        let passed = frequency_ok && amplitude.passed();

        tracing::debug!(
            detected_frequency_hz,
            frequency_error_hz,
            rms = amplitude.rms,
            mean = amplitude.mean,
            passed,
            "Loopback analysis complete"
        );

        Ok(AnalysisResult {
            detected_frequency_hz,
            frequency_error_hz,
            rms: amplitude.rms,
            mean_dc_offset: amplitude.mean,
            frequency_ok,
            too_quiet: amplitude.too_quiet,
            dc_offset: amplitude.dc_offset,
            passed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sine::SineGenerator;

    fn sine_buffer(frequency: f64, sample_rate: u32, seconds: f64, amplitude: f64) -> Vec<f32> {
        let mut gen = SineGenerator::new(frequency, f64::from(sample_rate), amplitude).unwrap();
        let mut samples = vec![0.0f32; (seconds * f64::from(sample_rate)) as usize];
        gen.fill_buffer(&mut samples);
        samples
    }

    #[test]
    fn test_detect_440hz() {
        let samples = sine_buffer(440.0, 48000, 2.0, 0.5);
        let detected = detect_frequency(&samples, 48000).unwrap();
        assert!(
            (detected - 440.0).abs() <= 5.0,
            "Detected {} Hz, expected 440 ± 5 Hz",
            detected
        );
    }

    #[test]
    fn test_detect_requires_two_samples() {
        assert_eq!(
            detect_frequency(&[], 48000),
            Err(AnalysisError::InsufficientData { got: 0, need: 2 })
        );
        assert_eq!(
            detect_frequency(&[0.5], 48000),
            Err(AnalysisError::InsufficientData { got: 1, need: 2 })
        );
    }

    #[test]
    fn test_zero_classified_non_negative() {
        // -1 -> 0 crosses, 0 -> 1 does not, 1 -> -1 crosses
        let samples = [-1.0f32, 0.0, 1.0, -1.0];
        let detected = detect_frequency(&samples, 4).unwrap();
        // 2 crossings over 1 second
        assert_eq!(detected, 1.0);
    }

    #[test]
    fn test_silent_buffer_too_quiet() {
        let samples = vec![0.0f32; 4800];
        let check = check_amplitude(&samples, &Tolerances::default()).unwrap();
        assert!(check.too_quiet);
        assert!(!check.dc_offset);
        assert!(!check.passed());
    }

    #[test]
    fn test_dc_offset_detected() {
        let mut samples = sine_buffer(440.0, 48000, 1.0, 0.5);
        for sample in samples.iter_mut() {
            *sample += 0.2;
        }
        let check = check_amplitude(&samples, &Tolerances::default()).unwrap();
        assert!(check.dc_offset);
        assert!(!check.too_quiet);
    }

    #[test]
    fn test_clean_sine_passes_amplitude() {
        let samples = sine_buffer(440.0, 48000, 1.0, 0.5);
        let check = check_amplitude(&samples, &Tolerances::default()).unwrap();
        assert!(check.passed());
        // RMS of a 0.5 amplitude sine is 0.5 / sqrt(2)
        assert!((check.rms - 0.3536).abs() < 0.01);
        assert!(check.mean.abs() < 0.001);
    }

    #[test]
    fn test_empty_amplitude_rejected() {
        assert_eq!(
            check_amplitude(&[], &Tolerances::default()),
            Err(AnalysisError::InsufficientData { got: 0, need: 1 })
        );
    }

    #[test]
    fn test_analyzer_verdict() {
        let analyzer = LoopbackAnalyzer::new(48000, 440.0);
        let samples = sine_buffer(440.0, 48000, 2.0, 0.5);
        let result = analyzer.analyze(&samples).unwrap();

        assert!(result.passed);
        assert!(result.frequency_ok);
        assert!(!result.too_quiet);
        assert!(!result.dc_offset);
    }

    #[test]
    fn test_analyzer_fails_on_wrong_frequency() {
        let analyzer = LoopbackAnalyzer::new(48000, 1000.0);
        let samples = sine_buffer(440.0, 48000, 2.0, 0.5);
        let result = analyzer.analyze(&samples).unwrap();

        assert!(!result.passed);
        assert!(!result.frequency_ok);
        assert!(result.frequency_error_hz > 500.0);
    }

    #[test]
    fn test_tolerances_scale_with_full_scale() {
        let scaled = Tolerances::default().scaled_to(SampleFormat::Pcm16);
        assert!((scaled.min_rms - 327.67).abs() < 1e-9);
        assert!((scaled.max_dc_offset - 3276.7).abs() < 1e-9);
        assert_eq!(scaled.frequency_tolerance_hz, 5.0);
    }
}
