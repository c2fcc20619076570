//! Wire format encoding for the output path
//!
//! Maps normalized mono samples into the interleaved representations audio
//! endpoints actually negotiate: IEEE float32 and 16/24/32-bit signed PCM.
//! Each output frame replicates the mono value identically across every
//! channel.

use thiserror::Error;

/// Errors that can occur during format resolution and encoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unsupported sample format: {bits_per_sample}-bit, float={is_float}")]
    Unsupported { is_float: bool, bits_per_sample: u16 },

    #[error("Output buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },
}

/// Resolved sample representation on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 32-bit IEEE float, written unconverted
    Float32,
    /// 16-bit signed PCM
    Pcm16,
    /// 24-bit signed PCM packed as 3 little-endian bytes
    Pcm24,
    /// 32-bit signed PCM
    Pcm32,
}

impl SampleFormat {
    /// Resolve a format from a wire-format descriptor
    ///
    /// The external audio layer is responsible for unwrapping an extensible
    /// format tag down to `(is_float, bits_per_sample)`; this selects the
    /// encoding path for that pair.
    pub fn from_descriptor(is_float: bool, bits_per_sample: u16) -> Result<Self, FormatError> {
        match (is_float, bits_per_sample) {
            (true, 32) => Ok(Self::Float32),
            (false, 16) => Ok(Self::Pcm16),
            (false, 24) => Ok(Self::Pcm24),
            (false, 32) => Ok(Self::Pcm32),
            _ => Err(FormatError::Unsupported {
                is_float,
                bits_per_sample,
            }),
        }
    }

    /// Bytes occupied by one sample of this format
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Pcm16 => 2,
            Self::Pcm24 => 3,
            Self::Pcm32 => 4,
        }
    }

    /// Bit depth of this format
    pub fn bits_per_sample(self) -> u16 {
        match self {
            Self::Float32 => 32,
            Self::Pcm16 => 16,
            Self::Pcm24 => 24,
            Self::Pcm32 => 32,
        }
    }

    /// Full-scale magnitude of this format
    ///
    /// Amplitude tolerances are expressed relative to this value so the same
    /// logical tolerance applies across formats.
    pub fn full_scale(self) -> f64 {
        match self {
            Self::Float32 => 1.0,
            Self::Pcm16 => 32767.0,
            Self::Pcm24 => 8_388_607.0,
            Self::Pcm32 => 2_147_483_647.0,
        }
    }

    /// Whether this format carries IEEE float samples
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32)
    }
}

/// Encoder from normalized mono samples to an interleaved byte buffer
#[derive(Debug, Clone, Copy)]
pub struct FormatEncoder {
    format: SampleFormat,
    channels: usize,
}

impl FormatEncoder {
    /// Create an encoder for a resolved format and channel count
    ///
    /// # Panics
    /// Panics if `channels` is zero.
    pub fn new(format: SampleFormat, channels: usize) -> Self {
        assert!(channels >= 1, "At least one output channel required");
        Self { format, channels }
    }

    /// Target format
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Output channel count
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Encoded byte length for a given mono frame count
    pub fn encoded_len(&self, frames: usize) -> usize {
        frames * self.channels * self.format.bytes_per_sample()
    }

    /// Encode mono samples into an interleaved little-endian byte buffer
    ///
    /// Every channel of each output frame receives the same mono value.
    /// The output slice must be exactly `encoded_len(mono.len())` bytes.
    ///
    /// # Returns
    /// Number of bytes written
    pub fn encode(&self, mono: &[f32], out: &mut [u8]) -> Result<usize, FormatError> {
        let expected = self.encoded_len(mono.len());
        if out.len() != expected {
            return Err(FormatError::BufferSize {
                expected,
                actual: out.len(),
            });
        }

        let stride = self.channels * self.format.bytes_per_sample();
        match self.format {
            SampleFormat::Float32 => {
                for (frame, &value) in out.chunks_exact_mut(stride).zip(mono) {
                    let bytes = value.to_le_bytes();
                    for slot in frame.chunks_exact_mut(4) {
                        slot.copy_from_slice(&bytes);
                    }
                }
            }
            SampleFormat::Pcm16 => {
                for (frame, &value) in out.chunks_exact_mut(stride).zip(mono) {
                    // `as` truncates toward zero, keeping full-scale peaks at
                    // exactly 32767.
                    let pcm = (f64::from(value) * 32767.0) as i16;
                    let bytes = pcm.to_le_bytes();
                    for slot in frame.chunks_exact_mut(2) {
                        slot.copy_from_slice(&bytes);
                    }
                }
            }
            SampleFormat::Pcm24 => {
                for (frame, &value) in out.chunks_exact_mut(stride).zip(mono) {
                    // Low 3 bytes of the two's-complement i32 carry the
                    // sign-extended 24-bit value.
                    let pcm = (f64::from(value) * 8_388_607.0) as i32;
                    let bytes = pcm.to_le_bytes();
                    for slot in frame.chunks_exact_mut(3) {
                        slot.copy_from_slice(&bytes[..3]);
                    }
                }
            }
            SampleFormat::Pcm32 => {
                for (frame, &value) in out.chunks_exact_mut(stride).zip(mono) {
                    let pcm = (f64::from(value) * 2_147_483_647.0) as i32;
                    let bytes = pcm.to_le_bytes();
                    for slot in frame.chunks_exact_mut(4) {
                        slot.copy_from_slice(&bytes);
                    }
                }
            }
        }

        Ok(expected)
    }

    /// Encode with an unresolved descriptor, silencing the buffer on failure
    ///
    /// If the descriptor names a format this encoder does not implement, the
    /// whole output buffer is zero-filled and the error reported to the
    /// caller; the buffer never carries garbage.
    pub fn encode_or_silence(
        mono: &[f32],
        is_float: bool,
        bits_per_sample: u16,
        channels: usize,
        out: &mut [u8],
    ) -> Result<usize, FormatError> {
        match SampleFormat::from_descriptor(is_float, bits_per_sample) {
            Ok(format) => Self::new(format, channels).encode(mono, out),
            Err(e) => {
                out.fill(0);
                Err(e)
            }
        }
    }
}
