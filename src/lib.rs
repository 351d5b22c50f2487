//! # bloom - skeleton-tracking gesture engine for flame and color effects
//!
//! Turns a depth sensor's skeleton stream into the one-byte effect state
//! driving a solenoid controller. Provides:
//! - Controlling-performer selection with hysteresis
//! - Posture and velocity features over a 60-frame history
//! - Gesture state machine with rate-limited color flashes
//! - Depth colorization for the operator display
//! - A worker thread tying sensor, engine and actuator together
//! - A line protocol for live speed-ratio tuning
//! - C FFI for hosts that run their own sensor loop
//!
//! ## Quick Start
//! ```no_run
//! use bloom::{Actuator, EngineConfig, Published, SimSensor, Worker};
//! use std::time::Duration;
//!
//! let config = EngineConfig::from_env();
//! let actuator = Actuator::from_config(&config.actuator);
//! let worker = Worker::start(SimSensor::new(), actuator, config).unwrap();
//! for _ in 0..100 {
//!     if let Ok(Published::Gesture(update)) = worker.recv_timeout(Duration::from_secs(1)) {
//!         println!("effect byte: {:#04x}", update.effect_byte);
//!     }
//! }
//! ```

pub mod error;
pub mod types;
pub mod history;
pub mod selector;
pub mod features;
pub mod gesture;
pub mod protocol;
pub mod depth;
pub mod config;
pub mod engine;
pub mod actuator;
pub mod sensor;
pub mod worker;
pub mod ffi;

pub use actuator::Actuator;
pub use config::{ActuatorConfig, EngineConfig};
pub use engine::Engine;
pub use error::BloomError;
pub use sensor::{ChannelSensor, Sensor, SensorFeed, SensorStreams, SimSensor};
pub use types::*;
pub use worker::{GestureUpdate, Published, Worker};

/// Result type alias for bloom operations.
pub type Result<T> = std::result::Result<T, BloomError>;
