//! Byte sink for the solenoid controller.
//!
//! The installation must keep running when the controller is unplugged, so
//! opening never fails and write errors only disconnect the sink.

use std::io::Write;

use crate::config::ActuatorConfig;
use crate::protocol;
use crate::types::GestureState;
use crate::Result;

pub struct Actuator {
    sink: Option<Box<dyn Write + Send>>,
    name: String,
}

impl Actuator {
    /// Open `port` at `baud_rate`. Logs and returns a disconnected actuator on failure.
    pub fn open(port: &str, baud_rate: u32) -> Self {
        match open_port(port, baud_rate) {
            Ok(sink) => {
                log::info!("Actuator opened on {} at {} baud", port, baud_rate);
                Self {
                    sink: Some(sink),
                    name: port.to_string(),
                }
            }
            Err(e) => {
                log::warn!("Actuator {} unavailable, running without it: {}", port, e);
                Self::disconnected()
            }
        }
    }

    /// Open the configured port, or run disconnected when none is set.
    pub fn from_config(config: &ActuatorConfig) -> Self {
        match &config.port {
            Some(port) => Self::open(port, config.baud_rate),
            None => {
                log::info!("No actuator port configured");
                Self::disconnected()
            }
        }
    }

    /// Wrap an arbitrary byte sink.
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Some(Box::new(writer)),
            name: "writer".into(),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            sink: None,
            name: String::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    /// Write the encoded state byte. Returns whether a byte went out.
    pub fn send(&mut self, state: &GestureState) -> bool {
        self.send_byte(protocol::encode_effect(state))
    }

    pub fn send_byte(&mut self, byte: u8) -> bool {
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };
        match sink.write_all(&[byte]).and_then(|_| sink.flush()) {
            Ok(()) => {
                log::trace!("Actuator <- {:#04x}", byte);
                true
            }
            Err(e) => {
                log::warn!("Actuator {} write failed, disconnecting: {}", self.name, e);
                self.sink = None;
                false
            }
        }
    }
}

impl std::fmt::Debug for Actuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actuator")
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(feature = "serial")]
fn open_port(port: &str, baud_rate: u32) -> Result<Box<dyn Write + Send>> {
    let serial = serialport::new(port, baud_rate).open()?;
    Ok(Box::new(serial))
}

#[cfg(not(feature = "serial"))]
fn open_port(port: &str, _baud_rate: u32) -> Result<Box<dyn Write + Send>> {
    let file = std::fs::OpenOptions::new().write(true).open(port)?;
    Ok(Box::new(file))
}
