//! Single-writer gesture pipeline.
//!
//! Owns everything that persists between frames: the frame history, the
//! selector's controlling slot, the gesture machine and the idle watch.
//! Callers pass the current time to `poll_idle`; the engine never reads a clock.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::EngineConfig;
use crate::depth::{self, ColorizeContext};
use crate::features::{self, SpeedSample};
use crate::gesture::{GestureMachine, GestureOutput};
use crate::history::FrameHistory;
use crate::protocol::{self, TuningCommand, TuningParam};
use crate::selector::SkeletonSelector;
use crate::types::{ColorFrame, DepthFrame, Frame, GestureState};
use crate::Result;

/// Tracks how long the sensor has gone without a tracked skeleton.
///
/// The clock starts at the first poll after the last tracked frame, and the
/// off state fires once per loss episode.
#[derive(Debug, Clone, Default)]
struct IdleWatch {
    idle_since: Option<Instant>,
    blanked: bool,
}

impl IdleWatch {
    fn skeleton_found(&mut self) {
        self.idle_since = None;
        self.blanked = false;
    }

    fn poll(&mut self, now: Instant, timeout: Duration) -> bool {
        let since = *self.idle_since.get_or_insert(now);
        if self.blanked || now.saturating_duration_since(since) <= timeout {
            return false;
        }
        self.blanked = true;
        true
    }
}

pub struct Engine<R = StdRng> {
    config: EngineConfig,
    history: FrameHistory,
    selector: SkeletonSelector,
    machine: GestureMachine<R>,
    state: GestureState,
    last_speed: SpeedSample,
    idle: IdleWatch,
}

impl Engine<StdRng> {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let machine = GestureMachine::new(config.gesture.clone());
        Ok(Self::with_machine(config, machine))
    }

    /// Engine with a seeded color-flash generator.
    pub fn with_seed(config: EngineConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let machine = GestureMachine::with_seed(config.gesture.clone(), seed);
        Ok(Self::with_machine(config, machine))
    }
}

impl<R: Rng> Engine<R> {
    fn with_machine(config: EngineConfig, machine: GestureMachine<R>) -> Self {
        Self {
            history: FrameHistory::new(config.history_capacity),
            selector: SkeletonSelector::new(config.selector.clone()),
            machine,
            state: GestureState::OFF,
            last_speed: SpeedSample::default(),
            idle: IdleWatch::default(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn history(&self) -> &FrameHistory {
        &self.history
    }

    /// Most recent gesture state, including an idle-timeout off.
    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn controlling_slot(&self) -> Option<usize> {
        self.selector.current()
    }

    pub fn last_speed(&self) -> SpeedSample {
        self.last_speed
    }

    /// Run one skeleton frame through the pipeline.
    ///
    /// Returns `None` without touching the history when no skeleton is tracked.
    /// The selection still runs, so control is released on such frames.
    pub fn process_frame(&mut self, frame: &Frame) -> Option<GestureOutput> {
        let slot = self.selector.select(frame)?;
        self.idle.skeleton_found();

        self.history.push(frame);
        let features = features::extract(&self.config.features, &self.history, slot);
        let output = self.machine.update(&features, &self.config.features);

        self.state = output.state;
        self.last_speed = output.speed;
        Some(output)
    }

    /// Check the idle timeout. Returns the off state once when it fires.
    pub fn poll_idle(&mut self, now: Instant) -> Option<GestureState> {
        if !self.idle.poll(now, self.config.idle_timeout) {
            return None;
        }
        log::debug!("No skeleton for {:?}, effects off", self.config.idle_timeout);
        self.state = GestureState::OFF;
        Some(self.state)
    }

    pub fn colorize_context(&self) -> ColorizeContext {
        ColorizeContext {
            controlling_slot: self.selector.current(),
            state: self.state,
        }
    }

    pub fn colorize(&self, frame: &DepthFrame) -> Result<ColorFrame> {
        depth::colorize_frame(frame, &self.colorize_context(), &self.config.colorizer)
    }

    pub fn effect_byte(&self) -> u8 {
        protocol::encode_effect(&self.state)
    }

    pub fn debug_readout(&self, actuator_connected: bool) -> i32 {
        protocol::debug_readout(self.machine.speed_ratio(), actuator_connected)
    }

    /// Change one speed-ratio parameter. The old value stays on error.
    pub fn tune(&mut self, param: TuningParam, value: f32) -> Result<()> {
        param.apply(&mut self.config.features, value)?;
        log::info!("Tuning {}={}", param.name(), value);
        Ok(())
    }

    /// Apply a tuning command and return the `TUNING` reply line.
    pub fn handle_command(&mut self, command: TuningCommand) -> Result<String> {
        if let TuningCommand::Set(param, value) = command {
            self.tune(param, value)?;
        }
        Ok(self.tuning_line())
    }

    pub fn tuning_line(&self) -> String {
        protocol::format_tuning(&self.config.features)
    }

    pub fn status_line(&self) -> String {
        protocol::format_status(&self.last_speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Joint, SkeletonSnapshot, Vector4, JOINT_COUNT};

    fn engine() -> Engine {
        Engine::with_seed(EngineConfig::default(), 11).unwrap()
    }

    fn performer(left_hand: Vector4) -> SkeletonSnapshot {
        let mut skel = SkeletonSnapshot::tracked(3, [Vector4::point(0.0, 0.0, 2.5); JOINT_COUNT]);
        skel.set_joint(Joint::ShoulderCenter, Vector4::point(0.0, 0.9, 2.5));
        skel.set_joint(Joint::HandLeft, left_hand);
        skel.set_joint(Joint::HandRight, Vector4::point(0.3, 0.0, 2.5));
        skel.set_joint(Joint::FootLeft, Vector4::point(-0.2, -0.9, 2.5));
        skel.set_joint(Joint::FootRight, Vector4::point(0.2, -0.9, 2.5));
        skel
    }

    fn frame(n: u32, slot: usize, skel: SkeletonSnapshot) -> Frame {
        let mut frame = Frame::new(1000 + n as u64 * 33, n);
        frame.skeletons[slot] = skel;
        frame
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.features.past_frame_offset = 100;
        assert!(Engine::with_seed(config, 1).is_err());
    }

    #[test]
    fn test_left_hand_up_forward_turns_red() {
        let mut e = engine();
        let rest = Vector4::point(-0.3, 1.0, 2.0);
        for n in 0..5 {
            e.process_frame(&frame(n, 2, performer(rest)));
        }
        let out = e.process_frame(&frame(5, 2, performer(rest))).unwrap();
        assert!(out.state.main_effect_on && out.state.red_on);
        assert_eq!(e.controlling_slot(), Some(2));
        assert_eq!(e.effect_byte() & 0x0F, 0b0011);
        assert_eq!(e.effect_byte() >> 4, 15);
    }

    #[test]
    fn test_untracked_frame_is_not_recorded() {
        let mut e = engine();
        e.process_frame(&frame(0, 0, performer(Vector4::point(0.0, 0.0, 2.5))));
        assert!(e.process_frame(&Frame::new(2000, 1)).is_none());
        assert_eq!(e.history().at(0).frame_number, 0);
        assert_eq!(e.history().at(0).timestamp_ms, 1000);
    }

    #[test]
    fn test_untracked_frame_releases_control() {
        let mut e = engine();
        let raised = Vector4::point(-0.3, 1.0, 2.0);
        for n in 0..3 {
            e.process_frame(&frame(n, 2, performer(raised)));
        }
        assert_eq!(e.controlling_slot(), Some(2));

        assert!(e.process_frame(&Frame::new(1099, 3)).is_none());
        assert_eq!(e.controlling_slot(), None);
        assert!(e.selector.scores().iter().all(|s| s.total() == 0.0));
        assert_eq!(e.colorize_context().controlling_slot, None);
    }

    #[test]
    fn test_idle_off_fires_once_per_episode() {
        let mut e = engine();
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let up = performer(Vector4::point(-0.3, 1.0, 2.0));

        e.process_frame(&frame(0, 0, up));
        assert!(e.state().main_effect_on);

        // Clock starts at the first poll.
        assert_eq!(e.poll_idle(t0), None);
        assert_eq!(e.poll_idle(t0 + ms(250)), None);
        assert_eq!(e.poll_idle(t0 + ms(251)), Some(GestureState::OFF));
        assert_eq!(e.poll_idle(t0 + ms(400)), None);
        assert_eq!(e.effect_byte(), 0);

        // A tracked frame resets the episode.
        e.process_frame(&frame(1, 0, up));
        assert_eq!(e.poll_idle(t0 + ms(600)), None);
        assert_eq!(e.poll_idle(t0 + ms(900)), Some(GestureState::OFF));
    }

    #[test]
    fn test_tracking_keeps_idle_quiet() {
        let mut e = engine();
        let t0 = Instant::now();
        let skel = performer(Vector4::point(0.0, 0.0, 2.5));
        for n in 0..30u32 {
            let now = t0 + Duration::from_millis(33 * n as u64);
            e.process_frame(&frame(n, 1, skel));
            assert_eq!(e.poll_idle(now), None);
        }
    }

    #[test]
    fn test_colorize_follows_state() {
        let mut e = engine();
        e.process_frame(&frame(0, 0, performer(Vector4::point(-0.3, 1.0, 2.0))));
        let ctx = e.colorize_context();
        assert_eq!(ctx.controlling_slot, Some(0));
        assert!(ctx.state.red_on);

        let depth = DepthFrame {
            timestamp_ms: 0,
            samples: vec![0; 3],
        };
        assert!(e.colorize(&depth).is_err());
    }

    #[test]
    fn test_tuning_commands() {
        let mut e = engine();
        let reply = e
            .handle_command(TuningCommand::Set(TuningParam::InputExponent, 2.0))
            .unwrap();
        assert_eq!(protocol::read_value(&reply, "InputExponent"), Some(2.0));
        assert_eq!(e.config().features.input_exponent, 2.0);

        assert!(e.tune(TuningParam::MaxSpeed, -1.0).is_err());
        assert_eq!(e.config().features.max_speed_ratio, 1.0);

        let status = e.status_line();
        assert_eq!(protocol::read_value(&status, "fSpeedRatio"), Some(0.0));
    }

    #[test]
    fn test_debug_readout() {
        let e = engine();
        assert_eq!(e.debug_readout(false), 0);
        assert_eq!(e.debug_readout(true), 1000);
    }
}
