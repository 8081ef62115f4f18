//! End-to-end demo without hardware: feeds synthetic IMU frames through
//! the mock transport and prints what the reader publishes.
//!
//! Run with:
//! ```sh
//! RUST_LOG=debug cargo run --example mock_stream
//! ```

use pravaha_io::{ImuReader, MockTransport, SensorConfig};
use std::thread;
use std::time::Duration;

const MARKER: [u8; 4] = [0x7F, 0x80, 0x00, 0x00];
const FRAMES: u64 = 50;

fn encode_frame(values: &[f32]) -> Vec<u8> {
    let mut wire = MARKER.to_vec();
    wire.extend(values.iter().flat_map(|v| v.to_le_bytes()));
    wire
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mock = MockTransport::new();
    let feeder = mock.clone();

    // Feed one synthetic frame every 20ms, as a 50Hz sensor would
    thread::spawn(move || {
        for n in 1..=FRAMES {
            let t = n as f32 * 0.02;
            let values = [
                t.sin(),
                t.cos(),
                9.81, // gravity on accel Z
                0.2,
                0.0,
                -0.4, // magnetometer
                0.0,
                0.0,
                t * 0.1, // slow yaw-axis rotation
            ];
            feeder.inject_read(&encode_frame(&values));
            thread::sleep(Duration::from_millis(20));
        }
        feeder.close();
    });

    let mut reader = ImuReader::new(SensorConfig::razor_defaults())?;
    let rx = reader.subscribe();
    reader.start_with_transport(mock)?;

    while let Ok(frame) = rx.recv_timeout(Duration::from_secs(2)) {
        println!(
            "frame {:3}  accel={:?}  gyro={:?}",
            frame.generation(),
            frame.accel().unwrap(),
            frame.gyro().unwrap()
        );
    }

    reader.stop();
    let stats = reader.stats();
    println!(
        "done: {} frames published, {} desyncs",
        stats.frames_published, stats.desyncs
    );
    Ok(())
}
