//! Capture accumulation for loopback verification
//!
//! The input callback pushes captured frames into a fixed-capacity
//! accumulator; when the target sample count is reached the filled buffer
//! moves to the waiting analysis side through a bounded channel. The channel
//! is the completion signal - there is no progress polling, and the core
//! enforces no timeout (callers impose one with [`CaptureHandle::wait_timeout`]).

use crossbeam_channel::{bounded, Receiver, Sender};
use std::time::Duration;

/// Fixed-capacity mono sample accumulator
///
/// Grows monotonically until it reaches its target sample count, then stays
/// read-only. The backing storage is allocated once at construction; pushes
/// never reallocate.
#[derive(Debug)]
pub struct CaptureAccumulator {
    samples: Vec<f32>,
    target: usize,
}

impl CaptureAccumulator {
    /// Create an accumulator for a fixed number of samples
    pub fn new(target_sample_count: usize) -> Self {
        Self {
            samples: Vec::with_capacity(target_sample_count),
            target: target_sample_count,
        }
    }

    /// Create an accumulator sized for a capture duration
    ///
    /// The target is `duration_secs * sample_rate` samples.
    pub fn for_duration(duration_secs: f64, sample_rate: u32) -> Self {
        Self::new((duration_secs * f64::from(sample_rate)) as usize)
    }

    /// Extract channel 0 of each interleaved frame into the accumulator
    ///
    /// Frames beyond the target are dropped. Safe to call from a real-time
    /// callback: no allocation, no locks.
    ///
    /// # Arguments
    /// * `interleaved` - Raw captured frames
    /// * `channels` - Channel count of the interleaved layout
    ///
    /// # Returns
    /// Number of frames accepted
    pub fn push_frames(&mut self, interleaved: &[f32], channels: usize) -> usize {
        if channels == 0 {
            return 0;
        }

        let mut accepted = 0;
        for frame in interleaved.chunks(channels) {
            if self.samples.len() >= self.target {
                break;
            }
            self.samples.push(frame[0]);
            accepted += 1;
        }
        accepted
    }

    /// Whether the target sample count has been reached
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.target
    }

    /// Samples accumulated so far
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing has been accumulated yet
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Configured target sample count
    pub fn target_sample_count(&self) -> usize {
        self.target
    }

    /// Samples still needed to reach the target
    pub fn remaining(&self) -> usize {
        self.target - self.samples.len().min(self.target)
    }

    /// Accumulated samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consume the accumulator, returning the sample buffer
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Producer half of a capture session, moved into the input callback
///
/// Owns the accumulator until it fills, then hands it off through the
/// completion channel exactly once. Subsequent frames are discarded.
#[derive(Debug)]
pub struct CaptureWriter {
    accumulator: Option<CaptureAccumulator>,
    done_tx: Sender<CaptureAccumulator>,
}

impl CaptureWriter {
    /// Push captured frames, signaling completion when the target is reached
    ///
    /// # Returns
    /// Number of frames accepted (zero once the capture has completed)
    pub fn push_frames(&mut self, interleaved: &[f32], channels: usize) -> usize {
        let Some(accumulator) = self.accumulator.as_mut() else {
            return 0;
        };

        let accepted = accumulator.push_frames(interleaved, channels);
        if accumulator.is_full() {
            if let Some(full) = self.accumulator.take() {
                // bounded(1) with a single send; try_send never blocks the
                // callback
                let _ = self.done_tx.try_send(full);
            }
        }
        accepted
    }

    /// Whether the accumulator has filled and been handed off
    pub fn is_done(&self) -> bool {
        self.accumulator.is_none()
    }
}

/// Consumer half of a capture session: the completion signal
///
/// [`wait`] blocks until capture completes - indefinitely, if the stream
/// never delivers enough frames. Callers that need a bound use
/// [`wait_timeout`].
///
/// [`wait`]: CaptureHandle::wait
/// [`wait_timeout`]: CaptureHandle::wait_timeout
#[derive(Debug)]
pub struct CaptureHandle {
    done_rx: Receiver<CaptureAccumulator>,
}

impl CaptureHandle {
    /// Block until the capture completes
    ///
    /// Returns `None` if the writer was dropped before completing.
    pub fn wait(&self) -> Option<CaptureAccumulator> {
        self.done_rx.recv().ok()
    }

    /// Block until the capture completes or the timeout elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CaptureAccumulator> {
        self.done_rx.recv_timeout(timeout).ok()
    }

    /// Take the completed capture without blocking, if it is ready
    pub fn try_take(&self) -> Option<CaptureAccumulator> {
        self.done_rx.try_recv().ok()
    }
}

/// Create a linked capture writer/handle pair
///
/// # Arguments
/// * `target_sample_count` - Mono samples to accumulate before completion
pub fn capture_channel(target_sample_count: usize) -> (CaptureWriter, CaptureHandle) {
    let (done_tx, done_rx) = bounded(1);
    (
        CaptureWriter {
            accumulator: Some(CaptureAccumulator::new(target_sample_count)),
            done_tx,
        },
        CaptureHandle { done_rx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_zero_extraction() {
        let mut acc = CaptureAccumulator::new(4);
        // Stereo frames: left channel carries the ramp
        let frames = [0.1f32, -0.1, 0.2, -0.2, 0.3, -0.3];
        let accepted = acc.push_frames(&frames, 2);

        assert_eq!(accepted, 3);
        assert_eq!(acc.samples(), &[0.1, 0.2, 0.3]);
        assert!(!acc.is_full());
        assert_eq!(acc.remaining(), 1);
    }

    #[test]
    fn test_excess_frames_dropped() {
        let mut acc = CaptureAccumulator::new(2);
        let frames = [1.0f32, 2.0, 3.0, 4.0];
        let accepted = acc.push_frames(&frames, 1);

        assert_eq!(accepted, 2);
        assert!(acc.is_full());
        assert_eq!(acc.push_frames(&frames, 1), 0);
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn test_duration_sizing() {
        let acc = CaptureAccumulator::for_duration(2.0, 48000);
        assert_eq!(acc.target_sample_count(), 96000);
    }

    #[test]
    fn test_completion_fires_once() {
        let (mut writer, handle) = capture_channel(3);

        assert!(handle.try_take().is_none());
        writer.push_frames(&[0.1, 0.2], 1);
        assert!(handle.try_take().is_none());
        writer.push_frames(&[0.3, 0.4], 1);

        assert!(writer.is_done());
        let capture = handle.try_take().expect("capture should be complete");
        assert_eq!(capture.samples(), &[0.1, 0.2, 0.3]);

        // Further pushes are discarded and never re-signal
        assert_eq!(writer.push_frames(&[0.5], 1), 0);
        assert!(handle.try_take().is_none());
    }

    #[test]
    fn test_wait_timeout_on_incomplete_capture() {
        let (mut writer, handle) = capture_channel(10);
        writer.push_frames(&[0.1; 4], 1);

        assert!(handle.wait_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_dropped_writer_unblocks_wait() {
        let (writer, handle) = capture_channel(10);
        drop(writer);
        assert!(handle.wait().is_none());
    }
}
