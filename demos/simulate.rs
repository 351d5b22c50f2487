//! Run the scripted performer through the full pipeline and print what the
//! solenoid controller would receive.
//!
//! Usage: cargo run --example simulate [seconds]
//! Set BLOOM_SERIAL_PORT to drive real hardware, RUST_LOG=debug for engine logs.

use bloom::protocol::{self, TuningParam};
use bloom::{Actuator, EngineConfig, Published, SimSensor, Worker};
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let seconds: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(12);

    let config = EngineConfig::from_env();
    let actuator = Actuator::from_config(&config.actuator);
    println!("Actuator: {:?}", actuator);

    let worker = match Worker::start(SimSensor::new(), actuator, config) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Failed to start worker: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = worker.request_tuning() {
        eprintln!("Failed to request tuning: {}", e);
    }

    println!("Simulating for {}s...", seconds);

    let start = Instant::now();
    let mut gestures: u64 = 0;
    let mut depth_frames: u64 = 0;
    let mut last_byte = None;

    while start.elapsed() < Duration::from_secs(seconds) {
        match worker.recv_timeout(Duration::from_secs(2)) {
            Ok(Published::Gesture(update)) => {
                gestures += 1;
                // After five seconds, make the flames react harder to hand speed
                if gestures == 150 {
                    let _ = worker.tune(TuningParam::InputExponent, 0.5);
                }
                // Only print changes to keep the terminal readable
                if last_byte != Some(update.effect_byte) {
                    let s = &update.state;
                    println!(
                        "t={:>6.2}s  byte={:#04x}  main={} red={} green={} yellow={}  intensity={:.2}  readout={}  slot={:?}",
                        start.elapsed().as_secs_f64(),
                        update.effect_byte,
                        s.main_effect_on as u8,
                        s.red_on as u8,
                        s.green_on as u8,
                        s.yellow_on as u8,
                        s.intensity,
                        update.debug_readout,
                        update.controlling_slot,
                    );
                    last_byte = Some(update.effect_byte);
                }
            }
            Ok(Published::Depth(_)) => depth_frames += 1,
            Ok(Published::Video(_)) => {}
            Ok(Published::Tuning(line)) => print!("{}", line),
            Ok(Published::Status(line)) => {
                if let Some(ratio) = protocol::read_value(&line, "fSpeedRatio") {
                    log::debug!("speed ratio {:.3}", ratio);
                }
            }
            Err(bloom::BloomError::Timeout) => {
                eprintln!("Timeout waiting for the worker");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    println!(
        "\nTotal: {} gesture updates, {} depth frames in {:.1}s",
        gestures,
        depth_frames,
        start.elapsed().as_secs_f64()
    );
    worker.stop();
}
