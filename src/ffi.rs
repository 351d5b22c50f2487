//! C FFI layer for bloom.
//!
//! Provides an opaque engine handle for hosts that run their own sensor
//! loop and only need the gesture pipeline from Rust.
//! The generated C header is written to `include/bloom.h` by cbindgen.

use crate::depth;
use crate::engine::Engine;
use crate::error::LastError;
use crate::protocol;
use crate::types::{
    Frame, GestureState, Rgb, SkeletonSnapshot, TrackingState, Vector4, DEPTH_HEIGHT, DEPTH_WIDTH,
    JOINT_COUNT, SKELETON_COUNT,
};
use crate::{BloomError, EngineConfig};
use std::ffi::{c_char, c_int};
use std::time::Instant;

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Opaque engine handle for C consumers.
pub struct BloomEngine(Engine);

/// One tracking slot in C-compatible layout.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BloomSkeleton {
    /// 0 = not tracked, 1 = position only, 2 = tracked.
    pub tracking_state: u32,
    pub track_id: u32,
    pub positions: [Vector4; JOINT_COUNT],
    /// Per-joint tracking state, same encoding as `tracking_state`.
    pub joint_states: [u32; JOINT_COUNT],
}

/// Skeleton frame in C-compatible layout.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BloomFrame {
    /// Sensor timestamp in milliseconds.
    pub timestamp_ms: u64,
    pub frame_number: u32,
    pub skeletons: [BloomSkeleton; SKELETON_COUNT],
}

/// Gesture state in C-compatible layout.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct BloomGestureState {
    pub main_effect_on: bool,
    pub red_on: bool,
    pub green_on: bool,
    pub yellow_on: bool,
    /// Effect intensity [0..1].
    pub intensity: f32,
    /// The byte sent to the solenoid controller.
    pub effect_byte: u8,
}

impl From<&BloomSkeleton> for SkeletonSnapshot {
    fn from(raw: &BloomSkeleton) -> Self {
        SkeletonSnapshot {
            tracking_state: TrackingState::from_raw(raw.tracking_state),
            track_id: raw.track_id,
            positions: raw.positions,
            joint_states: raw.joint_states.map(TrackingState::from_raw),
        }
    }
}

impl From<&BloomFrame> for Frame {
    fn from(raw: &BloomFrame) -> Self {
        let mut frame = Frame::new(raw.timestamp_ms, raw.frame_number);
        for (slot, skel) in frame.skeletons.iter_mut().zip(raw.skeletons.iter()) {
            *slot = SkeletonSnapshot::from(skel);
        }
        frame
    }
}

impl From<GestureState> for BloomGestureState {
    fn from(state: GestureState) -> Self {
        BloomGestureState {
            main_effect_on: state.main_effect_on,
            red_on: state.red_on,
            green_on: state.green_on,
            yellow_on: state.yellow_on,
            intensity: state.intensity,
            effect_byte: protocol::encode_effect(&state),
        }
    }
}

impl From<&BloomGestureState> for GestureState {
    fn from(raw: &BloomGestureState) -> Self {
        GestureState {
            main_effect_on: raw.main_effect_on,
            red_on: raw.red_on,
            green_on: raw.green_on,
            yellow_on: raw.yellow_on,
            intensity: raw.intensity,
        }
    }
}

/// Create an engine configured from `BLOOM_*` environment variables.
/// Returns NULL on error (check bloom_last_error()).
#[no_mangle]
pub extern "C" fn bloom_engine_new() -> *mut BloomEngine {
    match Engine::new(EngineConfig::from_env()) {
        Ok(engine) => Box::into_raw(Box::new(BloomEngine(engine))),
        Err(e) => {
            LAST_ERROR.set(&e);
            std::ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// `engine` must be a pointer returned by `bloom_engine_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn bloom_engine_free(engine: *mut BloomEngine) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Run one skeleton frame through the engine.
/// Returns 1 and fills `out` when a skeleton was tracked, 0 when the frame
/// had none (nothing recorded), -1 on bad arguments.
///
/// # Safety
/// `engine`, `frame` and `out` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn bloom_engine_process_frame(
    engine: *mut BloomEngine,
    frame: *const BloomFrame,
    out: *mut BloomGestureState,
) -> c_int {
    if engine.is_null() || frame.is_null() || out.is_null() {
        return -1;
    }
    let engine = &mut *engine;
    let frame = Frame::from(&*frame);

    match engine.0.process_frame(&frame) {
        Some(output) => {
            out.write(BloomGestureState::from(output.state));
            1
        }
        None => 0,
    }
}

/// Check the idle timeout against the host's monotonic clock.
/// Returns 1 and writes the off state to `out` the first time it fires in a
/// loss episode, 0 otherwise, -1 on bad arguments.
///
/// # Safety
/// `engine` and `out` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn bloom_engine_poll_idle(
    engine: *mut BloomEngine,
    out: *mut BloomGestureState,
) -> c_int {
    if engine.is_null() || out.is_null() {
        return -1;
    }
    let engine = &mut *engine;
    match engine.0.poll_idle(Instant::now()) {
        Some(off) => {
            out.write(BloomGestureState::from(off));
            1
        }
        None => 0,
    }
}

/// Colorize a 320x240 depth image into `out`.
/// Returns 0 on success, -1 on error.
///
/// # Safety
/// `samples` must point to `len` u16 values and `out` to `len` `Rgb` values.
#[no_mangle]
pub unsafe extern "C" fn bloom_engine_colorize_depth(
    engine: *const BloomEngine,
    samples: *const u16,
    out: *mut Rgb,
    len: usize,
) -> c_int {
    if engine.is_null() || samples.is_null() || out.is_null() {
        return -1;
    }
    let expected = DEPTH_WIDTH * DEPTH_HEIGHT;
    if len != expected {
        LAST_ERROR.set(&BloomError::InvalidBuffer {
            expected,
            actual: len,
        });
        return -1;
    }
    let engine = &*engine;
    let samples = std::slice::from_raw_parts(samples, len);
    let out = std::slice::from_raw_parts_mut(out, len);
    depth::colorize_into(
        samples,
        &engine.0.colorize_context(),
        &engine.0.config().colorizer,
        out,
    );
    0
}

/// Speed-ratio calibration readout (plus 1000 when the actuator is connected).
///
/// # Safety
/// `engine` must be a valid engine pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn bloom_engine_debug_readout(
    engine: *const BloomEngine,
    actuator_connected: bool,
) -> c_int {
    if engine.is_null() {
        return 0;
    }
    let engine = &*engine;
    engine.0.debug_readout(actuator_connected)
}

/// Pack a gesture state into the actuator byte. `effect_byte` is ignored.
#[no_mangle]
pub extern "C" fn bloom_encode_effect(state: BloomGestureState) -> u8 {
    protocol::encode_effect(&GestureState::from(&state))
}

/// Unpack an actuator byte. Intensity comes back in steps of 1/15.
#[no_mangle]
pub extern "C" fn bloom_decode_effect(byte: u8) -> BloomGestureState {
    let mut state = BloomGestureState::from(protocol::decode_effect(byte));
    state.effect_byte = byte;
    state
}

/// Get the last error message. Returns NULL if no error.
/// The message stays set until the next error replaces it; the returned
/// pointer is valid until then.
#[no_mangle]
pub extern "C" fn bloom_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}
