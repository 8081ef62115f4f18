//! PravahaIO - IMU telemetry acquisition daemon
//!
//! Opens the configured serial port, runs the reader task, and drains a
//! frame subscription into the log at a throttled rate. Stops cleanly on
//! Ctrl-C.

use pravaha_io::{AppConfig, Error, FrameReceiver, ImuReader, ReaderState, Result};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Parse config path from command line arguments.
///
/// Supports:
/// - `pravaha-io <path>` (positional)
/// - `pravaha-io --config <path>` (flag-based)
/// - `pravaha-io -c <path>` (short flag)
///
/// Defaults to `/etc/pravaha.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/pravaha.toml".to_string()
}

/// Drain a frame subscription, logging roughly once per second
fn frame_logger(rx: FrameReceiver, running: Arc<AtomicBool>) {
    let mut last_log = Instant::now();
    let mut since_last = 0u64;

    while running.load(Ordering::Relaxed) {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(frame) => {
                since_last += 1;
                if last_log.elapsed() >= Duration::from_secs(1) {
                    if let (Some(accel), Some(mag), Some(gyro)) =
                        (frame.accel(), frame.mag(), frame.gyro())
                    {
                        log::info!(
                            "Frame {}: accel=[{:.2}, {:.2}, {:.2}] mag=[{:.2}, {:.2}, {:.2}] gyro=[{:.2}, {:.2}, {:.2}] ({} frames/s)",
                            frame.generation(),
                            accel[0], accel[1], accel[2],
                            mag[0], mag[1], mag[2],
                            gyro[0], gyro[1], gyro[2],
                            since_last
                        );
                    } else {
                        log::info!(
                            "Frame {}: {:?} ({} frames/s)",
                            frame.generation(),
                            frame.channels(),
                            since_last
                        );
                    }
                    last_log = Instant::now();
                    since_last = 0;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn main() -> Result<()> {
    let config_path = parse_config_path();

    let config = match AppConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Config {} not loaded ({}); using Razor defaults",
                config_path, e
            );
            AppConfig::default()
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("PravahaIO starting...");
    log::info!(
        "Sensor: {} at {} baud, {} channels",
        config.sensor.port,
        config.sensor.baud_rate,
        config.sensor.channel_count
    );

    let mut reader = ImuReader::new(config.sensor)?;
    let rx = reader.subscribe();
    reader.start()?;

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let logger_running = Arc::clone(&running);
    let logger_handle = thread::Builder::new()
        .name("frame-logger".to_string())
        .spawn(move || frame_logger(rx, logger_running))
        .map_err(|e| Error::Other(format!("Failed to spawn frame logger: {}", e)))?;

    log::info!("PravahaIO running. Press Ctrl-C to stop.");

    while running.load(Ordering::Relaxed) {
        if reader.state() == ReaderState::Faulted {
            let stats = reader.stats();
            log::error!(
                "Reader faulted after {} frames ({} desyncs); restart required",
                stats.frames_published,
                stats.desyncs
            );
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }

    // Shutdown
    log::info!("Shutting down...");
    running.store(false, Ordering::Relaxed);
    reader.stop();
    if logger_handle.join().is_err() {
        log::error!("Frame logger thread panicked");
    }

    let stats = reader.stats();
    log::info!(
        "PravahaIO stopped ({} frames published, {} desyncs, {} bytes discarded)",
        stats.frames_published,
        stats.desyncs,
        stats.bytes_discarded
    );
    Ok(())
}
