//! Per-frame kinematic signals for the controlling skeleton.
//!
//! Posture flags come from the newest frame alone. Velocities compare the
//! newest frame with the one `past_frame_offset` pushes earlier, reading the
//! same slot index in both even if the sensor has since reassigned it.

use crate::history::FrameHistory;
use crate::types::{Joint, TrackingState, JOINT_COUNT};

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    /// How many frames back to look for velocity.
    pub past_frame_offset: usize,
    /// Hand counts as up above `shoulder_center.y + hand_up_threshold` (meters).
    pub hand_up_threshold: f32,
    /// Hand counts as forward when this far in front of the shoulder center (meters).
    pub forward_buffer: f32,
    /// Height one foot must clear over the other to count as up (meters).
    pub foot_up_threshold: f32,
    /// Scales summed hand speed into the speed ratio input.
    pub hand_velocity_factor: f32,
    /// Weight of the newest sample in the exponential smoother.
    pub new_speed_weight: f32,
    /// Power applied to the scaled hand speed before smoothing.
    pub input_exponent: f32,
    /// Floor of the smoothed speed ratio.
    pub min_speed_ratio: f32,
    /// Ceiling of the smoothed speed ratio.
    pub max_speed_ratio: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            past_frame_offset: 4,
            hand_up_threshold: -0.1,
            forward_buffer: 0.2,
            foot_up_threshold: 0.25,
            hand_velocity_factor: 0.3,
            new_speed_weight: 0.2,
            input_exponent: 1.0,
            min_speed_ratio: 0.0,
            max_speed_ratio: 1.0,
        }
    }
}

/// A left/right pair of values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pair<T> {
    pub left: T,
    pub right: T,
}

/// Signals derived from one frame. Consumed by the state machine, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    pub hand_up: Pair<bool>,
    pub hand_forward: Pair<bool>,
    pub foot_up: Pair<bool>,
    /// Seconds between the current and the past frame.
    pub delta_seconds: f32,
    /// Speed of every joint, meters per second, indexed by [`Joint::index`].
    pub velocity: [f32; JOINT_COUNT],
}

impl Features {
    pub fn speed(&self, joint: Joint) -> f32 {
        self.velocity[joint.index()]
    }
}

/// Derive features for `slot` from the newest frame in `history`.
///
/// The elapsed time is not guarded: equal timestamps give infinite or NaN
/// velocities, and callers must keep `past_frame_offset` below the history
/// capacity.
pub fn extract(config: &FeatureConfig, history: &FrameHistory, slot: usize) -> Features {
    let current_frame = history.at(0);
    let past_frame = history.at(-(config.past_frame_offset as isize));
    let current = current_frame.skeleton(slot);
    let past = past_frame.skeleton(slot);

    let shoulder = current.joint(Joint::ShoulderCenter);
    let left_hand = current.joint(Joint::HandLeft);
    let right_hand = current.joint(Joint::HandRight);
    let left_foot = current.joint(Joint::FootLeft);
    let right_foot = current.joint(Joint::FootRight);

    let hand_up = Pair {
        left: left_hand.y > shoulder.y + config.hand_up_threshold,
        right: right_hand.y > shoulder.y + config.hand_up_threshold,
    };
    // Smaller z is closer to the camera.
    let hand_forward = Pair {
        left: left_hand.z < shoulder.z - config.forward_buffer,
        right: right_hand.z < shoulder.z - config.forward_buffer,
    };
    let foot_up = Pair {
        left: current.joint_state(Joint::FootLeft) == TrackingState::Tracked
            && left_foot.y > right_foot.y + config.foot_up_threshold,
        right: current.joint_state(Joint::FootRight) == TrackingState::Tracked
            && right_foot.y > left_foot.y + config.foot_up_threshold,
    };

    let elapsed_ms = current_frame.timestamp_ms as i64 - past_frame.timestamp_ms as i64;
    let delta_seconds = elapsed_ms as f32 * 0.001;

    let mut velocity = [0.0f32; JOINT_COUNT];
    for (i, v) in velocity.iter_mut().enumerate() {
        *v = current.positions[i].distance(&past.positions[i]) / delta_seconds;
    }

    Features {
        hand_up,
        hand_forward,
        foot_up,
        delta_seconds,
        velocity,
    }
}

/// Intermediate values of one speed-ratio update, reported on the status line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeedSample {
    /// Left plus right hand speed.
    pub raw_speed: f32,
    /// Raw speed times the hand velocity factor.
    pub cur_speed: f32,
    /// Scaled speed raised to the input exponent.
    pub new_speed_ratio: f32,
    /// Smoothed, clamped accumulator after this update.
    pub speed_ratio: f32,
}

/// Exponentially smoothed hand-speed accumulator. Persists across frames.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeedRatio {
    value: f32,
}

impl SpeedRatio {
    pub fn new(initial: f32) -> Self {
        Self { value: initial }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Fold one frame's hand speeds into the accumulator.
    pub fn update(&mut self, config: &FeatureConfig, features: &Features) -> SpeedSample {
        let raw_speed = features.speed(Joint::HandLeft) + features.speed(Joint::HandRight);
        let cur_speed = raw_speed * config.hand_velocity_factor;
        let new_speed_ratio = cur_speed.powf(config.input_exponent);

        let smoothed = self.value * (1.0 - config.new_speed_weight)
            + new_speed_ratio * config.new_speed_weight;
        self.value = smoothed.clamp(config.min_speed_ratio, config.max_speed_ratio);

        SpeedSample {
            raw_speed,
            cur_speed,
            new_speed_ratio,
            speed_ratio: self.value,
        }
    }
}
