//! Tonecheck - sine tone generator and loopback verification tool
//!
//! Entry point for the command-line application.

use anyhow::Result;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tonecheck::audio::analyzer::LoopbackAnalyzer;
use tonecheck::audio::engine::ToneEngine;
use tonecheck::audio::sine::SineGenerator;
use tonecheck::audio::wav;
use tonecheck::TestConfig;
use tracing::{error, info};

enum Mode {
    Playback,
    Loopback,
    WavFile(PathBuf),
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tonecheck=info".parse().unwrap()),
        )
        .init();

    println!("Tonecheck v{} - Audio Path Verification", tonecheck::VERSION);
    println!();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let mut config = TestConfig::default();
    let mut mode = Mode::Playback;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--list" | "-l" => {
                list_devices()?;
                return Ok(());
            }
            "--version" | "-v" => {
                println!("tonecheck {}", tonecheck::VERSION);
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: --config requires a file path");
                    return Ok(());
                };
                config = TestConfig::load(Path::new(value));
                i += 2;
                continue;
            }
            "--device" | "-d" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: --device requires a device name");
                    return Ok(());
                };
                config.device = Some(value.clone());
                i += 2;
                continue;
            }
            "--sample-rate" | "-r" => {
                let Some(value) = parse_value(&args, i, "sample rate") else {
                    return Ok(());
                };
                config.sample_rate = value;
                i += 2;
                continue;
            }
            "--frequency" | "-f" => {
                let Some(value) = parse_value(&args, i, "frequency") else {
                    return Ok(());
                };
                config.frequency_hz = value;
                i += 2;
                continue;
            }
            "--amplitude" | "-a" => {
                let Some(value) = parse_value(&args, i, "amplitude") else {
                    return Ok(());
                };
                config.amplitude = value;
                i += 2;
                continue;
            }
            "--duration" => {
                let Some(value) = parse_value(&args, i, "duration") else {
                    return Ok(());
                };
                config.duration_secs = value;
                i += 2;
                continue;
            }
            "--loopback" => {
                mode = Mode::Loopback;
            }
            "--wav" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: --wav requires a file path");
                    return Ok(());
                };
                mode = Mode::WavFile(PathBuf::from(value));
                i += 2;
                continue;
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                return Ok(());
            }
            _ => {
                // Positional argument - treat as device name if not set
                if config.device.is_none() {
                    config.device = Some(args[i].clone());
                }
            }
        }
        i += 1;
    }

    match mode {
        Mode::WavFile(path) => write_wav(&config, &path),
        Mode::Loopback => run_loopback(&config),
        Mode::Playback => {
            if config.device.is_none() && !pick_device_interactively(&mut config)? {
                return Ok(());
            }
            run_playback(&config)
        }
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, what: &str) -> Option<T> {
    let Some(raw) = args.get(i + 1) else {
        eprintln!("Error: {} requires a value", args[i]);
        return None;
    };
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            eprintln!("Error: Invalid {}: {}", what, raw);
            None
        }
    }
}

fn print_help() {
    println!("Usage: tonecheck [OPTIONS] [DEVICE]");
    println!();
    println!("Options:");
    println!("  -l, --list              List available audio devices");
    println!("  -d, --device NAME       Use the named device");
    println!("  -r, --sample-rate RATE  Sample rate in Hz (default: 48000)");
    println!("  -f, --frequency HZ      Tone frequency in Hz (default: 440)");
    println!("  -a, --amplitude AMP     Tone amplitude 0.0-1.0 (default: 0.5)");
    println!("      --duration SECS     Loopback capture duration (default: 2)");
    println!("      --loopback          Play the tone and verify it via capture");
    println!("      --wav FILE          Write the tone to a file and exit");
    println!("      --config FILE       Load settings from a JSON config file");
    println!("  -v, --version           Show version");
    println!("  -h, --help              Show this help");
    println!();
    println!("Examples:");
    println!("  tonecheck --list");
    println!("  tonecheck -d \"Loopback Cable\" --loopback");
    println!("  tonecheck --wav tone_440hz.wav -f 440 --duration 2");
    println!();
    println!("Without arguments, starts in interactive mode.");
}

fn list_devices() -> Result<()> {
    println!("Scanning for audio devices...");
    println!();

    match ToneEngine::list_devices() {
        Ok(devices) => {
            if devices.is_empty() {
                println!("No audio devices found.");
            } else {
                println!("Found {} device(s):", devices.len());
                println!();
                for (i, device) in devices.iter().enumerate() {
                    let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
                    println!("  {}. {}{}", i + 1, device.name, default_marker);
                    println!(
                        "     Channels: {} in, {} out",
                        device.input_channels, device.output_channels
                    );
                    if !device.sample_rates.is_empty() {
                        println!("     Sample rates: {:?}", device.sample_rates);
                    }
                    println!();
                }
            }
        }
        Err(e) => {
            error!("Failed to list devices: {}", e);
            println!("Error: {}", e);
        }
    }

    Ok(())
}

fn write_wav(config: &TestConfig, path: &Path) -> Result<()> {
    println!("Generating tone file...");
    println!("  Frequency: {:.1} Hz", config.frequency_hz);
    println!("  Sample rate: {} Hz", config.sample_rate);
    println!("  Duration: {:.1} seconds", config.duration_secs);

    let mut generator = SineGenerator::new(
        config.frequency_hz,
        f64::from(config.sample_rate),
        config.amplitude,
    )?;
    let num_samples = (config.duration_secs * f64::from(config.sample_rate)) as usize;
    let mut samples = vec![0.0f32; num_samples];
    generator.fill_buffer(&mut samples);

    let written = wav::write_tone_file(path, &samples, config.sample_rate)?;
    println!(
        "  Wrote {} ({} bytes of sample data)",
        path.display(),
        written.data_size
    );

    Ok(())
}

fn select_device(engine: &mut ToneEngine, config: &TestConfig) -> Result<bool> {
    if let Some(ref name) = config.device {
        if let Err(e) = engine.select_device(name) {
            error!("Failed to select device: {}", e);
            println!("Error: Could not find device '{}'", name);
            println!();
            println!("Use --list to see available devices.");
            return Ok(false);
        }
    } else if let Err(e) = engine.select_default() {
        error!("Failed to select default device: {}", e);
        println!("Error: {}", e);
        return Ok(false);
    }
    Ok(true)
}

fn run_loopback(config: &TestConfig) -> Result<()> {
    println!("Loopback verification");
    println!("  Expected frequency: {:.2} Hz", config.frequency_hz);
    println!("  Duration: {:.1} seconds", config.duration_secs);
    println!();

    let mut engine = ToneEngine::new();
    engine.set_sample_rate(config.sample_rate);
    if !select_device(&mut engine, config)? {
        return Ok(());
    }

    let handle = engine.start_loopback(config.frequency_hz, config.amplitude, config.duration_secs)?;
    info!("Capturing {} seconds of loopback audio", config.duration_secs);

    // The engine enforces no timeout; bound the wait here so a dead route
    // fails instead of hanging forever.
    let timeout = Duration::from_secs_f64(config.duration_secs + 10.0);
    let capture = match handle.wait_timeout(timeout) {
        Some(capture) => capture,
        None => {
            let (played, captured) = engine.frame_counts();
            engine.stop()?;
            error!(played, captured, "Capture did not complete");
            println!("FAIL: Capture did not complete within {:?}", timeout);
            std::process::exit(1);
        }
    };
    engine.stop()?;

    println!("Captured {} samples. Analyzing...", capture.len());
    println!();

    let analyzer = LoopbackAnalyzer::new(engine.sample_rate(), config.frequency_hz)
        .with_tolerances(config.tolerances.clone());
    let result = analyzer.analyze(capture.samples())?;

    println!("=== Analysis Results ===");
    println!("Detected frequency: {:.2} Hz", result.detected_frequency_hz);
    println!("Frequency error: {:.2} Hz", result.frequency_error_hz);
    println!("RMS: {:.4}", result.rms);
    println!("Mean (DC offset): {:.4}", result.mean_dc_offset);
    println!();

    if result.too_quiet {
        println!("FAIL: Signal too quiet (RMS {:.4})", result.rms);
    }
    if result.dc_offset {
        println!("FAIL: Signal has DC offset (mean {:.4})", result.mean_dc_offset);
    }
    if !result.frequency_ok {
        println!(
            "FAIL: Frequency mismatch (expected {:.2} Hz, got {:.2} Hz)",
            config.frequency_hz, result.detected_frequency_hz
        );
    }

    if result.passed {
        println!("=== TEST PASSED ===");
        Ok(())
    } else {
        println!("=== TEST FAILED ===");
        std::process::exit(1);
    }
}

fn run_playback(config: &TestConfig) -> Result<()> {
    println!(
        "Playing {:.1} Hz tone at amplitude {:.2}",
        config.frequency_hz, config.amplitude
    );
    println!();

    let mut engine = ToneEngine::new();
    engine.set_sample_rate(config.sample_rate);
    if !select_device(&mut engine, config)? {
        return Ok(());
    }

    engine.start_playback(config.frequency_hz, config.amplitude)?;

    println!("Playback started. Press Ctrl+C to stop.");
    println!();

    // Set up Ctrl+C handler
    let running = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, std::sync::atomic::Ordering::SeqCst);
    })
    .ok();

    let mut iteration = 0u32;
    while running.load(std::sync::atomic::Ordering::SeqCst) {
        let (played, _) = engine.frame_counts();

        if iteration > 0 && iteration % 10 == 0 {
            info!("Audio output: {} frames played", played);
        }
        iteration += 1;

        std::thread::sleep(Duration::from_millis(100));
    }

    println!();
    println!("Stopping...");
    engine.stop()?;
    println!("Done.");

    Ok(())
}

fn pick_device_interactively(config: &mut TestConfig) -> Result<bool> {
    println!("Interactive Mode");
    println!();

    list_devices()?;

    let devices = ToneEngine::list_devices().unwrap_or_default();
    if devices.is_empty() {
        println!("No devices available. Exiting.");
        return Ok(false);
    }

    print!("Enter device number (1-{}): ", devices.len());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let device_num: usize = match input.trim().parse() {
        Ok(n) if n >= 1 && n <= devices.len() => n,
        _ => {
            println!("Invalid selection. Exiting.");
            return Ok(false);
        }
    };

    config.device = Some(devices[device_num - 1].name.clone());
    Ok(true)
}
