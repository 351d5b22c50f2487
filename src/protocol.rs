use crate::features::{FeatureConfig, SpeedSample};
use crate::types::{EffectFlags, GestureState};
use crate::{BloomError, Result};

// -- Actuator byte layout --
pub const FLAGS_MASK: u8 = 0x0F;
pub const INTENSITY_SHIFT: u8 = 4;
/// Highest 4-bit intensity level.
pub const INTENSITY_MAX: u8 = 0x0F;

// -- Tuning line protocol --
pub const REQUEST_TUNING: &str = "REQUEST_TUNING";
pub const NEW_TUNING: &str = "NEW_TUNING";
pub const TUNING_PREFIX: &str = "TUNING";
pub const STATUS_PREFIX: &str = "STATUS";

/// Quantize an intensity to 0..=15, truncating. Input is clamped to [0, 1] first.
pub fn intensity_level(intensity: f32) -> u8 {
    (intensity.clamp(0.0, 1.0) * INTENSITY_MAX as f32) as u8
}

/// Pack a gesture state into the actuator byte.
///
/// `[7..4]` intensity level, `[3]` yellow, `[2]` green, `[1]` red, `[0]` main.
pub fn encode_effect(state: &GestureState) -> u8 {
    state.flags().bits() | (intensity_level(state.intensity) << INTENSITY_SHIFT)
}

/// Unpack an actuator byte. The intensity comes back quantized to sixteenths of 15.
pub fn decode_effect(byte: u8) -> GestureState {
    let flags = EffectFlags::from_bits_truncate(byte & FLAGS_MASK);
    let level = byte >> INTENSITY_SHIFT;
    GestureState::from_flags(flags, level as f32 / INTENSITY_MAX as f32)
}

/// Human calibration readout: speed-ratio decile, plus 1000 when the actuator is connected.
pub fn debug_readout(speed_ratio: f32, actuator_connected: bool) -> i32 {
    let mut readout = (speed_ratio * 10.0) as i32;
    if actuator_connected {
        readout += 1000;
    }
    readout
}

/// Speed-ratio parameters adjustable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningParam {
    MinSpeed,
    MaxSpeed,
    NewSpeedWeight,
    InputExponent,
}

impl TuningParam {
    pub const ALL: [TuningParam; 4] = [
        TuningParam::MinSpeed,
        TuningParam::MaxSpeed,
        TuningParam::NewSpeedWeight,
        TuningParam::InputExponent,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::MinSpeed => "MinSpeed",
            Self::MaxSpeed => "MaxSpeed",
            Self::NewSpeedWeight => "NewSpeedWeight",
            Self::InputExponent => "InputExponent",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn get(&self, config: &FeatureConfig) -> f32 {
        match self {
            Self::MinSpeed => config.min_speed_ratio,
            Self::MaxSpeed => config.max_speed_ratio,
            Self::NewSpeedWeight => config.new_speed_weight,
            Self::InputExponent => config.input_exponent,
        }
    }

    /// Write `value` into `config`, refusing values that would break the smoother.
    pub fn apply(&self, config: &mut FeatureConfig, value: f32) -> Result<()> {
        if !value.is_finite() {
            return Err(BloomError::InvalidTuning(format!("{}={}", self.name(), value)));
        }
        let mut updated = config.clone();
        match self {
            Self::MinSpeed => updated.min_speed_ratio = value,
            Self::MaxSpeed => updated.max_speed_ratio = value,
            Self::NewSpeedWeight => updated.new_speed_weight = value,
            Self::InputExponent => updated.input_exponent = value,
        }
        if updated.min_speed_ratio > updated.max_speed_ratio
            || updated.min_speed_ratio < 0.0
            || updated.max_speed_ratio > 1.0
        {
            return Err(BloomError::InvalidTuning(format!(
                "speed ratio range [{}, {}] outside [0, 1]",
                updated.min_speed_ratio, updated.max_speed_ratio
            )));
        }
        if !(0.0..=1.0).contains(&updated.new_speed_weight) {
            return Err(BloomError::InvalidTuning(format!(
                "NewSpeedWeight={} outside [0, 1]",
                updated.new_speed_weight
            )));
        }
        if updated.input_exponent <= 0.0 {
            return Err(BloomError::InvalidTuning(format!(
                "InputExponent={} must be positive",
                updated.input_exponent
            )));
        }
        *config = updated;
        Ok(())
    }
}

/// Inbound tuning line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TuningCommand {
    /// `REQUEST_TUNING`
    Request,
    /// `NEW_TUNING <Name>=<value>`
    Set(TuningParam, f32),
}

/// Parse one inbound line (trailing newline allowed).
pub fn parse_command(line: &str) -> Result<TuningCommand> {
    let line = line.trim();
    if line == REQUEST_TUNING {
        return Ok(TuningCommand::Request);
    }

    let rest = line
        .strip_prefix(NEW_TUNING)
        .ok_or_else(|| BloomError::InvalidTuning(line.to_string()))?
        .trim();
    let (name, value) = rest
        .split_once('=')
        .ok_or_else(|| BloomError::InvalidTuning(line.to_string()))?;
    let param = TuningParam::from_name(name.trim())
        .ok_or_else(|| BloomError::InvalidTuning(format!("unknown parameter '{}'", name)))?;
    let value = value
        .trim()
        .parse::<f32>()
        .map_err(|_| BloomError::InvalidTuning(line.to_string()))?;
    Ok(TuningCommand::Set(param, value))
}

/// `TUNING MinSpeed=<v> MaxSpeed=<v> NewSpeedWeight=<v> InputExponent=<v> \n`
///
/// Every value is followed by a space; readers scan to the next space.
pub fn format_tuning(config: &FeatureConfig) -> String {
    let mut line = String::from(TUNING_PREFIX);
    for param in TuningParam::ALL {
        line.push_str(&format!(" {}={}", param.name(), param.get(config)));
    }
    line.push_str(" \n");
    line
}

/// `STATUS fRawSpeed=<v> fCurSpeed=<v> fNewSpeedRatio=<v> fSpeedRatio=<v> \n`
pub fn format_status(sample: &SpeedSample) -> String {
    format!(
        "{} fRawSpeed={} fCurSpeed={} fNewSpeedRatio={} fSpeedRatio={} \n",
        STATUS_PREFIX,
        sample.raw_speed,
        sample.cur_speed,
        sample.new_speed_ratio,
        sample.speed_ratio
    )
}

/// Read the value of `name=` out of a `TUNING` or `STATUS` line.
pub fn read_value(line: &str, name: &str) -> Option<f32> {
    line.split_whitespace()
        .filter_map(|token| token.split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| value.parse().ok())
}
