//! Gesture state machine: features in, effect state out.
//!
//! Only two things survive between frames: the speed-ratio accumulator and
//! the color-cycle counter. Every flag is recomputed from the current
//! features each frame.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::features::{FeatureConfig, Features, SpeedRatio, SpeedSample};
use crate::types::{GestureState, Joint};

#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    /// Assumed skeleton frame rate.
    pub input_rate_hz: u32,
    /// Fastest the color solenoids may be toggled.
    pub max_solenoid_frequency: u32,
    /// A raised foot must move faster than this (m/s) to flash colors.
    pub foot_flash_speed: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            input_rate_hz: 30,
            max_solenoid_frequency: 6,
            foot_flash_speed: 1.0,
        }
    }
}

impl GestureConfig {
    /// Frames between color-cycle ticks.
    pub fn cycle_period(&self) -> u32 {
        (self.input_rate_hz / self.max_solenoid_frequency.max(1)).max(1)
    }
}

/// Outcome of one foot-driven color draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    /// Neither color.
    Dark,
    /// The foot's own color: red for the left foot, green for the right.
    Primary,
    Yellow,
}

impl Flash {
    /// Map a uniform draw in [0, 1) onto three equal bands.
    pub fn from_draw(draw: f32) -> Self {
        if draw < 1.0 / 3.0 {
            Flash::Dark
        } else if draw < 2.0 / 3.0 {
            Flash::Primary
        } else {
            Flash::Yellow
        }
    }
}

/// Result of one state-machine step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureOutput {
    pub state: GestureState,
    pub speed: SpeedSample,
    pub cycle_tick: bool,
}

pub struct GestureMachine<R = StdRng> {
    config: GestureConfig,
    speed: SpeedRatio,
    cycle_counter: u32,
    rng: R,
}

impl GestureMachine<StdRng> {
    pub fn new(config: GestureConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic color cycling, for tests and replays.
    pub fn with_seed(config: GestureConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> GestureMachine<R> {
    pub fn with_rng(config: GestureConfig, rng: R) -> Self {
        Self {
            config,
            speed: SpeedRatio::default(),
            cycle_counter: 0,
            rng,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn speed_ratio(&self) -> f32 {
        self.speed.value()
    }

    /// Advance one frame.
    pub fn update(&mut self, features: &Features, feature_config: &FeatureConfig) -> GestureOutput {
        self.cycle_counter += 1;
        let cycle_tick = self.cycle_counter >= self.config.cycle_period();
        if cycle_tick {
            self.cycle_counter = 0;
        }

        let speed = self.speed.update(feature_config, features);

        let hand_up = features.hand_up;
        let foot_up = features.foot_up;
        let mut state = GestureState {
            main_effect_on: hand_up.left || hand_up.right || foot_up.left || foot_up.right,
            ..GestureState::OFF
        };

        if !state.main_effect_on {
            state.intensity = speed.speed_ratio;
            return GestureOutput {
                state,
                speed,
                cycle_tick,
            };
        }

        let left_pose = hand_up.left && features.hand_forward.left;
        let right_pose = hand_up.right && features.hand_forward.right;
        if left_pose && right_pose {
            state.yellow_on = true;
        } else if left_pose {
            state.red_on = true;
        } else if right_pose {
            state.green_on = true;
        }

        // Left foot wins when both are up.
        let flash_speed = self.config.foot_flash_speed;
        if foot_up.left && features.speed(Joint::FootLeft) > flash_speed {
            if cycle_tick {
                let flash = Flash::from_draw(self.rng.gen::<f32>());
                state.red_on = flash == Flash::Primary;
                state.yellow_on = flash == Flash::Yellow;
            }
        } else if foot_up.right && features.speed(Joint::FootRight) > flash_speed {
            if cycle_tick {
                let flash = Flash::from_draw(self.rng.gen::<f32>());
                state.green_on = flash == Flash::Primary;
                state.yellow_on = flash == Flash::Yellow;
            }
        }

        state.intensity = 1.0;
        GestureOutput {
            state,
            speed,
            cycle_tick,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Pair;
    use crate::types::JOINT_COUNT;

    fn idle() -> Features {
        Features {
            hand_up: Pair::default(),
            hand_forward: Pair::default(),
            foot_up: Pair::default(),
            delta_seconds: 0.132,
            velocity: [0.0; JOINT_COUNT],
        }
    }

    fn machine() -> GestureMachine {
        GestureMachine::with_seed(GestureConfig::default(), 7)
    }

    #[test]
    fn test_cycle_period() {
        assert_eq!(GestureConfig::default().cycle_period(), 5);
        let fast = GestureConfig {
            max_solenoid_frequency: 60,
            ..GestureConfig::default()
        };
        assert_eq!(fast.cycle_period(), 1);
    }

    #[test]
    fn test_flash_bands() {
        assert_eq!(Flash::from_draw(0.0), Flash::Dark);
        assert_eq!(Flash::from_draw(0.33), Flash::Dark);
        assert_eq!(Flash::from_draw(0.34), Flash::Primary);
        assert_eq!(Flash::from_draw(0.66), Flash::Primary);
        assert_eq!(Flash::from_draw(0.67), Flash::Yellow);
        assert_eq!(Flash::from_draw(0.999), Flash::Yellow);
    }

    #[test]
    fn test_off_uses_speed_ratio_for_intensity() {
        let mut m = machine();
        let mut f = idle();
        f.velocity[Joint::HandLeft.index()] = 2.0;
        let out = m.update(&f, &FeatureConfig::default());
        assert!(!out.state.main_effect_on);
        assert!(!out.state.red_on && !out.state.green_on && !out.state.yellow_on);
        assert!((out.state.intensity - 0.12).abs() < 1e-4);
    }

    #[test]
    fn test_hand_colors() {
        let config = FeatureConfig::default();
        let mut m = machine();

        let mut f = idle();
        f.hand_up.left = true;
        f.hand_forward.left = true;
        let out = m.update(&f, &config);
        assert!(out.state.main_effect_on && out.state.red_on);
        assert!(!out.state.green_on && !out.state.yellow_on);
        assert_eq!(out.state.intensity, 1.0);

        f.hand_up.right = true;
        f.hand_forward.right = true;
        let out = m.update(&f, &config);
        assert!(out.state.yellow_on && !out.state.red_on && !out.state.green_on);

        f.hand_up.left = false;
        let out = m.update(&f, &config);
        assert!(out.state.green_on && !out.state.red_on && !out.state.yellow_on);

        // Up but not forward: effect on, no color.
        f.hand_forward.right = false;
        let out = m.update(&f, &config);
        assert!(out.state.main_effect_on);
        assert!(!out.state.red_on && !out.state.green_on && !out.state.yellow_on);
    }

    #[test]
    fn test_main_effect_is_or_of_limbs() {
        let config = FeatureConfig::default();
        let mut m = machine();
        for bits in 0u8..16 {
            let mut f = idle();
            f.hand_up.left = bits & 1 != 0;
            f.hand_up.right = bits & 2 != 0;
            f.foot_up.left = bits & 4 != 0;
            f.foot_up.right = bits & 8 != 0;
            let out = m.update(&f, &config);
            assert_eq!(out.state.main_effect_on, bits != 0);
        }
    }

    #[test]
    fn test_cycle_ticks_every_period() {
        let config = FeatureConfig::default();
        let mut m = machine();
        let ticks: Vec<bool> = (0..10).map(|_| m.update(&idle(), &config).cycle_tick).collect();
        assert_eq!(
            ticks,
            vec![false, false, false, false, true, false, false, false, false, true]
        );
    }

    #[test]
    fn test_left_foot_flash_only_on_tick() {
        let config = FeatureConfig::default();
        let mut m = machine();
        let mut f = idle();
        f.foot_up.left = true;
        f.velocity[Joint::FootLeft.index()] = 3.0;
        // Green from the right hand must survive the left-foot override.
        f.hand_up.right = true;
        f.hand_forward.right = true;

        for frame in 1..=10 {
            let out = m.update(&f, &config);
            assert!(out.state.main_effect_on);
            assert!(out.state.green_on);
            if !out.cycle_tick {
                assert!(!out.state.red_on && !out.state.yellow_on, "frame {}", frame);
            } else {
                assert!(!(out.state.red_on && out.state.yellow_on));
            }
        }
    }

    #[test]
    fn test_slow_foot_does_not_flash() {
        let config = FeatureConfig::default();
        let mut m = machine();
        let mut f = idle();
        f.foot_up.right = true;
        f.velocity[Joint::FootRight.index()] = 0.5;
        for _ in 0..10 {
            let out = m.update(&f, &config);
            assert!(out.state.main_effect_on);
            assert!(!out.state.green_on && !out.state.yellow_on && !out.state.red_on);
        }
    }

    #[test]
    fn test_left_foot_takes_precedence() {
        let config = FeatureConfig::default();
        let mut m = machine();
        let mut f = idle();
        f.foot_up.left = true;
        f.foot_up.right = true;
        f.velocity[Joint::FootLeft.index()] = 3.0;
        f.velocity[Joint::FootRight.index()] = 3.0;
        for _ in 0..50 {
            let out = m.update(&f, &config);
            assert!(!out.state.green_on);
        }
    }

    #[test]
    fn test_flash_distribution_covers_all_bands() {
        let config = FeatureConfig::default();
        let mut m = machine();
        let mut f = idle();
        f.foot_up.left = true;
        f.velocity[Joint::FootLeft.index()] = 3.0;

        let (mut dark, mut red, mut yellow) = (0, 0, 0);
        for _ in 0..600 {
            let out = m.update(&f, &config);
            if !out.cycle_tick {
                continue;
            }
            match (out.state.red_on, out.state.yellow_on) {
                (false, false) => dark += 1,
                (true, false) => red += 1,
                (false, true) => yellow += 1,
                _ => panic!("red and yellow together"),
            }
        }
        assert_eq!(dark + red + yellow, 120);
        assert!(dark > 0 && red > 0 && yellow > 0);
    }
}
