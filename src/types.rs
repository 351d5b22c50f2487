use crate::{BloomError, Result};

/// Maximum number of bodies the sensor tracks at once (tracking slots).
pub const SKELETON_COUNT: usize = 6;

/// Number of joints in every skeleton snapshot.
pub const JOINT_COUNT: usize = 20;

/// Depth stream geometry (16-bit depth + player-index samples).
pub const DEPTH_WIDTH: usize = 320;
pub const DEPTH_HEIGHT: usize = 240;

/// Color stream geometry (4 bytes per pixel, BGRX).
pub const VIDEO_WIDTH: usize = 640;
pub const VIDEO_HEIGHT: usize = 480;
pub const VIDEO_BYTES_PER_PIXEL: usize = 4;

/// Joint position in sensor space, meters. `w` is carried through but never compared.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vector4 {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// A point with the homogeneous coordinate set to 1.
    pub const fn point(x: f32, y: f32, z: f32) -> Self {
        Self::new(x, y, z, 1.0)
    }

    /// Euclidean distance over x, y, z.
    pub fn distance(&self, other: &Vector4) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Skeletal landmarks, in the sensor's fixed joint order.
///
/// The discriminant is the index into every per-joint array, and is stable
/// across frames so the same index can be subtracted over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Joint {
    HipCenter = 0,
    Spine,
    ShoulderCenter,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
}

impl Joint {
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::HipCenter,
        Joint::Spine,
        Joint::ShoulderCenter,
        Joint::Head,
        Joint::ShoulderLeft,
        Joint::ElbowLeft,
        Joint::WristLeft,
        Joint::HandLeft,
        Joint::ShoulderRight,
        Joint::ElbowRight,
        Joint::WristRight,
        Joint::HandRight,
        Joint::HipLeft,
        Joint::KneeLeft,
        Joint::AnkleLeft,
        Joint::FootLeft,
        Joint::HipRight,
        Joint::KneeRight,
        Joint::AnkleRight,
        Joint::FootRight,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Bone chains for the skeleton overlay, drawn as polylines.
pub const SKELETON_SEGMENTS: [&[Joint]; 5] = [
    &[Joint::HipCenter, Joint::Spine, Joint::ShoulderCenter, Joint::Head],
    &[
        Joint::ShoulderCenter,
        Joint::ShoulderLeft,
        Joint::ElbowLeft,
        Joint::WristLeft,
        Joint::HandLeft,
    ],
    &[
        Joint::ShoulderCenter,
        Joint::ShoulderRight,
        Joint::ElbowRight,
        Joint::WristRight,
        Joint::HandRight,
    ],
    &[
        Joint::HipCenter,
        Joint::HipLeft,
        Joint::KneeLeft,
        Joint::AnkleLeft,
        Joint::FootLeft,
    ],
    &[
        Joint::HipCenter,
        Joint::HipRight,
        Joint::KneeRight,
        Joint::AnkleRight,
        Joint::FootRight,
    ],
];

/// Confidence classification, used both per skeleton and per joint.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackingState {
    #[default]
    NotTracked = 0,
    PositionOnly = 1,
    Tracked = 2,
}

impl TrackingState {
    /// Map a raw sensor value; anything unknown counts as not tracked.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => TrackingState::PositionOnly,
            2 => TrackingState::Tracked,
            _ => TrackingState::NotTracked,
        }
    }
}

/// One body in one frame. Joint arrays are indexed by [`Joint::index`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SkeletonSnapshot {
    pub tracking_state: TrackingState,
    pub track_id: u32,
    pub positions: [Vector4; JOINT_COUNT],
    pub joint_states: [TrackingState; JOINT_COUNT],
}

impl SkeletonSnapshot {
    /// A fully tracked skeleton with every joint tracked at the given positions.
    pub fn tracked(track_id: u32, positions: [Vector4; JOINT_COUNT]) -> Self {
        Self {
            tracking_state: TrackingState::Tracked,
            track_id,
            positions,
            joint_states: [TrackingState::Tracked; JOINT_COUNT],
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.tracking_state == TrackingState::Tracked
    }

    pub fn joint(&self, joint: Joint) -> Vector4 {
        self.positions[joint.index()]
    }

    pub fn joint_state(&self, joint: Joint) -> TrackingState {
        self.joint_states[joint.index()]
    }

    pub fn set_joint(&mut self, joint: Joint, position: Vector4) {
        self.positions[joint.index()] = position;
    }
}

/// One skeleton frame. Slots are sensor-assigned and carry no stable identity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frame {
    /// Monotonic timestamp in milliseconds.
    pub timestamp_ms: u64,
    pub frame_number: u32,
    pub skeletons: [SkeletonSnapshot; SKELETON_COUNT],
}

impl Frame {
    pub fn new(timestamp_ms: u64, frame_number: u32) -> Self {
        Self {
            timestamp_ms,
            frame_number,
            ..Default::default()
        }
    }

    pub fn skeleton(&self, slot: usize) -> &SkeletonSnapshot {
        &self.skeletons[slot]
    }

    pub fn any_tracked(&self) -> bool {
        self.skeletons.iter().any(SkeletonSnapshot::is_tracked)
    }

    /// Indices of the currently tracked slots, lowest first.
    pub fn tracked_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.skeletons
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_tracked())
            .map(|(i, _)| i)
    }
}

/// Raw depth frame: 13-bit depth in bits 3..15, player slot id in bits 0..2.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    pub timestamp_ms: u64,
    pub samples: Vec<u16>,
}

impl DepthFrame {
    /// Reject buffers whose length doesn't match the 320x240 stream.
    pub fn validate(&self) -> Result<()> {
        let expected = DEPTH_WIDTH * DEPTH_HEIGHT;
        if self.samples.len() != expected {
            return Err(BloomError::InvalidBuffer {
                expected,
                actual: self.samples.len(),
            });
        }
        Ok(())
    }
}

/// Raw color frame, passed through to the display untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub timestamp_ms: u64,
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    pub fn validate(&self) -> Result<()> {
        let expected = VIDEO_WIDTH * VIDEO_HEIGHT * VIDEO_BYTES_PER_PIXEL;
        if self.pixels.len() != expected {
            return Err(BloomError::InvalidBuffer {
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// Display color.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn gray(v: u8) -> Self {
        Self::new(v, v, v)
    }
}

/// Colorized depth frame ready for the display surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFrame {
    pub timestamp_ms: u64,
    pub pixels: Vec<Rgb>,
}

bitflags::bitflags! {
    /// Low nibble of the actuator byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct EffectFlags: u8 {
        const MAIN   = 1 << 0;
        const RED    = 1 << 1;
        const GREEN  = 1 << 2;
        const YELLOW = 1 << 3;
    }
}

/// Output of the gesture state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GestureState {
    pub main_effect_on: bool,
    pub red_on: bool,
    pub green_on: bool,
    pub yellow_on: bool,
    /// Flame intensity in [0, 1].
    pub intensity: f32,
}

impl GestureState {
    /// Everything off, zero intensity.
    pub const OFF: GestureState = GestureState {
        main_effect_on: false,
        red_on: false,
        green_on: false,
        yellow_on: false,
        intensity: 0.0,
    };

    pub fn flags(&self) -> EffectFlags {
        let mut flags = EffectFlags::empty();
        flags.set(EffectFlags::MAIN, self.main_effect_on);
        flags.set(EffectFlags::RED, self.red_on);
        flags.set(EffectFlags::GREEN, self.green_on);
        flags.set(EffectFlags::YELLOW, self.yellow_on);
        flags
    }

    pub fn from_flags(flags: EffectFlags, intensity: f32) -> Self {
        Self {
            main_effect_on: flags.contains(EffectFlags::MAIN),
            red_on: flags.contains(EffectFlags::RED),
            green_on: flags.contains(EffectFlags::GREEN),
            yellow_on: flags.contains(EffectFlags::YELLOW),
            intensity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_indices_follow_declaration_order() {
        for (i, joint) in Joint::ALL.iter().enumerate() {
            assert_eq!(joint.index(), i);
        }
        assert_eq!(Joint::FootRight.index(), JOINT_COUNT - 1);
    }

    #[test]
    fn test_segments_cover_every_joint() {
        let mut seen = [false; JOINT_COUNT];
        for chain in SKELETON_SEGMENTS.iter() {
            assert!(chain.len() >= 2);
            for joint in chain.iter() {
                seen[joint.index()] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_distance_ignores_w() {
        let a = Vector4::new(0.0, 0.0, 0.0, 1.0);
        let b = Vector4::new(3.0, 4.0, 0.0, 7.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_tracked_slots() {
        let mut frame = Frame::new(1000, 1);
        frame.skeletons[1].tracking_state = TrackingState::Tracked;
        frame.skeletons[4].tracking_state = TrackingState::Tracked;
        frame.skeletons[5].tracking_state = TrackingState::PositionOnly;
        assert_eq!(frame.tracked_slots().collect::<Vec<_>>(), vec![1, 4]);
        assert!(frame.any_tracked());
        assert!(!Frame::default().any_tracked());
    }

    #[test]
    fn test_tracking_state_from_raw() {
        assert_eq!(TrackingState::from_raw(2), TrackingState::Tracked);
        assert_eq!(TrackingState::from_raw(1), TrackingState::PositionOnly);
        assert_eq!(TrackingState::from_raw(99), TrackingState::NotTracked);
    }

    #[test]
    fn test_depth_frame_validate() {
        let good = DepthFrame {
            timestamp_ms: 0,
            samples: vec![0; DEPTH_WIDTH * DEPTH_HEIGHT],
        };
        assert!(good.validate().is_ok());

        let bad = DepthFrame {
            timestamp_ms: 0,
            samples: vec![0; 10],
        };
        assert!(matches!(
            bad.validate(),
            Err(BloomError::InvalidBuffer { actual: 10, .. })
        ));
    }

    #[test]
    fn test_gesture_state_flags() {
        let state = GestureState {
            main_effect_on: true,
            red_on: false,
            green_on: true,
            yellow_on: false,
            intensity: 1.0,
        };
        assert_eq!(state.flags(), EffectFlags::MAIN | EffectFlags::GREEN);
        assert_eq!(GestureState::from_flags(state.flags(), 1.0), state);
        assert_eq!(GestureState::OFF.flags(), EffectFlags::empty());
    }
}
