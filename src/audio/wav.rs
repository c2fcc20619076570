//! Fixed-layout tone file container
//!
//! Minimal mono 16-bit PCM file with the canonical 44-byte header, used for
//! offline verification of a generated tone. The header's file size field is
//! always `36 + data_size`.

use crate::audio::format::{FormatEncoder, FormatError, SampleFormat};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur reading or writing a tone file
#[derive(Error, Debug)]
pub enum WavError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode failed: {0}")]
    Encode(#[from] FormatError),

    #[error("Malformed header: {0}")]
    MalformedHeader(&'static str),

    #[error("Unsupported layout: {0}")]
    UnsupportedLayout(String),
}

/// Header fields of a tone file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneFileInfo {
    /// Channel count (always 1 for files this module writes)
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bit depth (always 16 for files this module writes)
    pub bits_per_sample: u16,
    /// Raw sample data size in bytes
    pub data_size: u32,
    /// Header file size field: total size minus 8, i.e. `36 + data_size`
    pub file_size: u32,
}

/// Write normalized mono samples as a 16-bit PCM tone file
///
/// # Arguments
/// * `path` - Destination file path
/// * `samples` - Normalized mono samples
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
/// The header fields as written
pub fn write_tone_file(
    path: &Path,
    samples: &[f32],
    sample_rate: u32,
) -> Result<ToneFileInfo, WavError> {
    let encoder = FormatEncoder::new(SampleFormat::Pcm16, 1);
    let mut data = vec![0u8; encoder.encoded_len(samples.len())];
    encoder.encode(samples, &mut data)?;

    let data_size = data.len() as u32;
    let file_size = 36 + data_size;

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(b"RIFF")?;
    writer.write_all(&file_size.to_le_bytes())?;
    writer.write_all(b"WAVE")?;
    writer.write_all(b"fmt ")?;
    writer.write_all(&16u32.to_le_bytes())?; // fmt chunk size
    writer.write_all(&1u16.to_le_bytes())?; // format code: PCM
    writer.write_all(&1u16.to_le_bytes())?; // mono
    writer.write_all(&sample_rate.to_le_bytes())?;
    writer.write_all(&(sample_rate * 2).to_le_bytes())?; // byte rate
    writer.write_all(&2u16.to_le_bytes())?; // block align
    writer.write_all(&16u16.to_le_bytes())?; // bits per sample
    writer.write_all(b"data")?;
    writer.write_all(&data_size.to_le_bytes())?;
    writer.write_all(&data)?;
    writer.flush()?;

    tracing::info!(
        path = %path.display(),
        samples = samples.len(),
        sample_rate,
        "Tone file written"
    );

    Ok(ToneFileInfo {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        data_size,
        file_size,
    })
}

/// Read a tone file written by [`write_tone_file`]
///
/// Validates the fixed layout (PCM format code, 16-byte fmt chunk, 16-bit
/// samples) and returns the header fields plus the raw samples.
pub fn read_tone_file(path: &Path) -> Result<(ToneFileInfo, Vec<i16>), WavError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut header = [0u8; 44];
    reader.read_exact(&mut header)?;

    if &header[0..4] != b"RIFF" {
        return Err(WavError::MalformedHeader("missing RIFF tag"));
    }
    if &header[8..12] != b"WAVE" {
        return Err(WavError::MalformedHeader("missing WAVE tag"));
    }
    if &header[12..16] != b"fmt " {
        return Err(WavError::MalformedHeader("missing fmt tag"));
    }
    if &header[36..40] != b"data" {
        return Err(WavError::MalformedHeader("missing data tag"));
    }

    let file_size = u32_at(&header, 4);
    let fmt_size = u32_at(&header, 16);
    let format_code = u16_at(&header, 20);
    let channels = u16_at(&header, 22);
    let sample_rate = u32_at(&header, 24);
    let bits_per_sample = u16_at(&header, 34);
    let data_size = u32_at(&header, 40);

    if fmt_size != 16 {
        return Err(WavError::UnsupportedLayout(format!(
            "fmt chunk size {fmt_size}, expected 16"
        )));
    }
    if format_code != 1 {
        return Err(WavError::UnsupportedLayout(format!(
            "format code {format_code}, expected 1 (PCM)"
        )));
    }
    if bits_per_sample != 16 {
        return Err(WavError::UnsupportedLayout(format!(
            "{bits_per_sample} bits per sample, expected 16"
        )));
    }

    if file_size != 36 + data_size {
        tracing::warn!(
            file_size,
            data_size,
            "File size field does not match 36 + data_size"
        );
    }

    let mut data = vec![0u8; data_size as usize];
    reader.read_exact(&mut data)?;

    let samples = data
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();

    Ok((
        ToneFileInfo {
            channels,
            sample_rate,
            bits_per_sample,
            data_size,
            file_size,
        },
        samples,
    ))
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sine::SineGenerator;

    #[test]
    fn test_header_fields_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let mut gen = SineGenerator::new(440.0, 48000.0, 0.5).unwrap();
        let mut samples = vec![0.0f32; 4800];
        gen.fill_buffer(&mut samples);

        let written = write_tone_file(&path, &samples, 48000).unwrap();
        assert_eq!(written.sample_rate, 48000);
        assert_eq!(written.data_size, 4800 * 2);
        assert_eq!(written.file_size, 36 + 4800 * 2);

        let (read, decoded) = read_tone_file(&path).unwrap();
        assert_eq!(read, written);
        assert_eq!(decoded.len(), 4800);
    }

    #[test]
    fn test_samples_survive_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let samples = [0.0f32, 0.5, -0.5, 1.0, -1.0];
        write_tone_file(&path, &samples, 44100).unwrap();

        let (_, decoded) = read_tone_file(&path).unwrap();
        assert_eq!(decoded, vec![0, 16383, -16383, 32767, -32767]);
    }

    #[test]
    fn test_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.wav");
        std::fs::write(&path, vec![0u8; 100]).unwrap();

        match read_tone_file(&path) {
            Err(WavError::MalformedHeader(_)) => {}
            other => panic!("Expected malformed header, got {:?}", other.map(|r| r.0)),
        }
    }
}
