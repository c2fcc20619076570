//! E2E tests for capture accumulation and completion signaling
//!
//! Simulates an input callback delivering interleaved buffers into a
//! capture session and verifies the completion handoff.

use std::time::Duration;
use tonecheck::audio::capture::{capture_channel, CaptureAccumulator};
use tonecheck::audio::sine::SineGenerator;

/// A capture session fills from periodic interleaved buffers and signals once
#[test]
fn test_capture_session_completes() {
    let sample_rate = 48000u32;
    let target = sample_rate as usize; // 1 second
    let (mut writer, handle) = capture_channel(target);

    // Simulate stereo input callbacks of 480 frames each
    let mut gen = SineGenerator::new(440.0, f64::from(sample_rate), 0.5).unwrap();
    let mut mono = vec![0.0f32; 480];
    let mut interleaved = vec![0.0f32; 960];

    let mut callbacks = 0;
    while !writer.is_done() {
        gen.fill_buffer(&mut mono);
        for (frame, &sample) in interleaved.chunks_mut(2).zip(&mono) {
            frame[0] = sample;
            frame[1] = -sample; // right channel differs, must be ignored
        }
        writer.push_frames(&interleaved, 2);
        callbacks += 1;
        assert!(callbacks <= 101, "Capture never completed");
    }

    let capture = handle
        .wait_timeout(Duration::from_millis(100))
        .expect("Completion signal should have fired");
    assert_eq!(capture.len(), target);
    assert!(capture.is_full());

    // Channel 0 was extracted: the buffer is the positive-channel tone
    let mut check = SineGenerator::new(440.0, f64::from(sample_rate), 0.5).unwrap();
    for (i, &sample) in capture.samples().iter().enumerate().take(960) {
        let expected = check.next_sample() as f32;
        assert_eq!(sample, expected, "Sample {} mismatch", i);
    }
}

/// Frames delivered after the target are dropped without re-signaling
#[test]
fn test_overrun_frames_dropped() {
    let (mut writer, handle) = capture_channel(100);

    let buffer = vec![0.25f32; 150];
    assert_eq!(writer.push_frames(&buffer, 1), 100);
    assert!(writer.is_done());

    assert_eq!(writer.push_frames(&buffer, 1), 0);

    let capture = handle.try_take().expect("Capture should be complete");
    assert_eq!(capture.len(), 100);
    assert!(handle.try_take().is_none(), "Completion must fire only once");
}

/// An unfilled session times out from the caller's side
#[test]
fn test_incomplete_capture_times_out() {
    let (mut writer, handle) = capture_channel(1000);
    writer.push_frames(&[0.1f32; 64], 1);

    let start = std::time::Instant::now();
    assert!(handle.wait_timeout(Duration::from_millis(20)).is_none());
    assert!(start.elapsed() >= Duration::from_millis(20));
}

/// Accumulator target follows duration * sample_rate
#[test]
fn test_target_from_duration() {
    let acc = CaptureAccumulator::for_duration(2.0, 48000);
    assert_eq!(acc.target_sample_count(), 96000);

    let acc = CaptureAccumulator::for_duration(0.5, 44100);
    assert_eq!(acc.target_sample_count(), 22050);
}
