//! E2E tests for the tone file container
//!
//! Verifies the fixed 44-byte header layout survives a write/read
//! round-trip exactly.

use tonecheck::audio::sine::SineGenerator;
use tonecheck::audio::wav::{read_tone_file, write_tone_file};

/// Header fields survive a round-trip exactly
#[test]
fn test_header_roundtrip_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone_440hz.wav");

    let sample_rate = 48000u32;
    let num_samples = 2 * sample_rate as usize;
    let mut gen = SineGenerator::new(440.0, f64::from(sample_rate), 0.5).unwrap();
    let mut samples = vec![0.0f32; num_samples];
    gen.fill_buffer(&mut samples);

    let written = write_tone_file(&path, &samples, sample_rate).unwrap();
    let (read, decoded) = read_tone_file(&path).unwrap();

    assert_eq!(read.sample_rate, sample_rate);
    assert_eq!(read.channels, 1);
    assert_eq!(read.bits_per_sample, 16);
    assert_eq!(read.data_size, (num_samples * 2) as u32);
    assert_eq!(read.file_size, 36 + read.data_size);
    assert_eq!(read, written);
    assert_eq!(decoded.len(), num_samples);
}

/// The on-disk byte layout matches the fixed 44-byte header
#[test]
fn test_raw_header_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layout.wav");

    let samples = [0.0f32; 100];
    write_tone_file(&path, &samples, 44100).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 44 + 200);

    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 36 + 200);
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(&bytes[12..16], b"fmt ");
    assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 16);
    assert_eq!(u16::from_le_bytes(bytes[20..22].try_into().unwrap()), 1);
    assert_eq!(u16::from_le_bytes(bytes[22..24].try_into().unwrap()), 1);
    assert_eq!(
        u32::from_le_bytes(bytes[24..28].try_into().unwrap()),
        44100
    );
    assert_eq!(
        u32::from_le_bytes(bytes[28..32].try_into().unwrap()),
        44100 * 2
    );
    assert_eq!(u16::from_le_bytes(bytes[32..34].try_into().unwrap()), 2);
    assert_eq!(u16::from_le_bytes(bytes[34..36].try_into().unwrap()), 16);
    assert_eq!(&bytes[36..40], b"data");
    assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), 200);
}

/// Sample data survives the round-trip through 16-bit PCM
#[test]
fn test_tone_survives_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.wav");

    let mut gen = SineGenerator::new(440.0, 48000.0, 1.0).unwrap();
    let mut samples = vec![0.0f32; 4800];
    gen.fill_buffer(&mut samples);

    write_tone_file(&path, &samples, 48000).unwrap();
    let (_, decoded) = read_tone_file(&path).unwrap();

    for (original, &stored) in samples.iter().zip(&decoded) {
        let expected = (f64::from(*original) * 32767.0) as i16;
        assert_eq!(stored, expected);
    }
}
