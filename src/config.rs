//! Engine configuration.
//!
//! Defaults reproduce the tuned installation values. `from_env` overlays
//! `BLOOM_*` environment variables on top; unparsable values fall back to
//! the default rather than failing startup.

use std::time::Duration;

use crate::depth::ColorizerConfig;
use crate::features::FeatureConfig;
use crate::gesture::GestureConfig;
use crate::history::DEFAULT_CAPACITY;
use crate::selector::SelectorConfig;
use crate::{BloomError, Result};

/// Serial link to the solenoid controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorConfig {
    /// Serial device path (`COM3`, `/dev/ttyUSB0`). `None` runs without hardware.
    pub port: Option<String>,
    pub baud_rate: u32,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9600,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Frames kept for velocity lookback.
    pub history_capacity: usize,
    pub features: FeatureConfig,
    pub gesture: GestureConfig,
    pub selector: SelectorConfig,
    pub colorizer: ColorizerConfig,
    /// No tracked skeleton for this long turns the effect off.
    pub idle_timeout: Duration,
    /// Worker wakes at least this often to check the idle timeout.
    pub poll_timeout: Duration,
    pub actuator: ActuatorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            features: FeatureConfig::default(),
            gesture: GestureConfig::default(),
            selector: SelectorConfig::default(),
            colorizer: ColorizerConfig::default(),
            idle_timeout: Duration::from_millis(250),
            poll_timeout: Duration::from_millis(100),
            actuator: ActuatorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `BLOOM_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `BLOOM_*` name.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let f = &mut config.features;

        config.history_capacity =
            read_parsed(&lookup, "BLOOM_HISTORY_FRAMES", config.history_capacity);
        f.past_frame_offset = read_parsed(&lookup, "BLOOM_PAST_FRAMES", f.past_frame_offset);
        f.min_speed_ratio = read_parsed(&lookup, "BLOOM_MIN_SPEED_RATIO", f.min_speed_ratio);
        f.max_speed_ratio = read_parsed(&lookup, "BLOOM_MAX_SPEED_RATIO", f.max_speed_ratio);
        f.new_speed_weight = read_parsed(&lookup, "BLOOM_SPEED_WEIGHT", f.new_speed_weight);
        f.input_exponent = read_parsed(&lookup, "BLOOM_INPUT_EXPONENT", f.input_exponent);

        config.gesture.max_solenoid_frequency = read_parsed(
            &lookup,
            "BLOOM_SOLENOID_HZ",
            config.gesture.max_solenoid_frequency,
        );
        config.idle_timeout = Duration::from_millis(read_parsed(
            &lookup,
            "BLOOM_IDLE_TIMEOUT_MS",
            config.idle_timeout.as_millis() as u64,
        ));
        config.colorizer.dim_palette =
            read_bool(&lookup, "BLOOM_DIM_PALETTE", config.colorizer.dim_palette);

        config.actuator.port = lookup("BLOOM_SERIAL_PORT")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        config.actuator.baud_rate = read_parsed(&lookup, "BLOOM_BAUD", config.actuator.baud_rate);

        config
    }

    /// Reject combinations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(BloomError::InvalidConfig(
                "history capacity must be at least 1".into(),
            ));
        }
        let f = &self.features;
        if f.past_frame_offset >= self.history_capacity {
            return Err(BloomError::InvalidConfig(format!(
                "past frame offset {} must be below history capacity {}",
                f.past_frame_offset, self.history_capacity
            )));
        }
        if !(0.0..=1.0).contains(&f.min_speed_ratio) || !(0.0..=1.0).contains(&f.max_speed_ratio) {
            return Err(BloomError::InvalidConfig(format!(
                "speed ratio bounds {}..{} must lie within 0..1",
                f.min_speed_ratio, f.max_speed_ratio
            )));
        }
        if f.min_speed_ratio > f.max_speed_ratio {
            return Err(BloomError::InvalidConfig(format!(
                "min speed ratio {} above max {}",
                f.min_speed_ratio, f.max_speed_ratio
            )));
        }
        let g = &self.gesture;
        if g.max_solenoid_frequency == 0 || g.max_solenoid_frequency > g.input_rate_hz {
            return Err(BloomError::InvalidConfig(format!(
                "solenoid frequency {} Hz must be in 1..={} Hz",
                g.max_solenoid_frequency, g.input_rate_hz
            )));
        }
        let c = &self.colorizer;
        if !(0.0..=1.0).contains(&c.intensity_floor) || !(0.0..=1.0).contains(&c.intensity_ceiling) {
            return Err(BloomError::InvalidConfig(format!(
                "intensity clamp {}..{} must lie within 0..1",
                c.intensity_floor, c.intensity_ceiling
            )));
        }
        if c.intensity_floor > c.intensity_ceiling {
            return Err(BloomError::InvalidConfig(format!(
                "intensity floor {} above ceiling {}",
                c.intensity_floor, c.intensity_ceiling
            )));
        }
        Ok(())
    }
}

fn read_parsed<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(name)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn read_bool<F>(lookup: &F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}
