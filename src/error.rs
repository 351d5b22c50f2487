use std::fmt;

/// Errors produced by the gesture engine and its I/O collaborators.
#[derive(Debug, thiserror::Error)]
pub enum BloomError {
    #[error("Sensor initialization failed: {0}")]
    SensorInit(String),

    #[error("No frame available")]
    FrameUnavailable,

    #[error("Invalid frame buffer: expected {expected} samples, got {actual}")]
    InvalidBuffer { expected: usize, actual: usize },

    #[error("Actuator I/O error: {0}")]
    Actuator(#[from] std::io::Error),

    #[cfg(feature = "serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Invalid tuning message: {0}")]
    InvalidTuning(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Worker stopped")]
    WorkerStopped,

    #[error("Timeout waiting for data")]
    Timeout,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &BloomError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
