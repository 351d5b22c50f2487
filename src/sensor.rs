//! Sensor collaborator: where skeleton, depth and video frames come from.
//!
//! A sensor hands the worker three receivers. A frame the sensor failed to
//! retrieve arrives as `Err` and is skipped; a closed channel means the
//! sensor is gone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};

use crate::types::{
    DepthFrame, Frame, Joint, SkeletonSnapshot, Vector4, VideoFrame, DEPTH_HEIGHT, DEPTH_WIDTH,
    JOINT_COUNT, VIDEO_BYTES_PER_PIXEL, VIDEO_HEIGHT, VIDEO_WIDTH,
};
use crate::{BloomError, Result};

/// Receiving ends of the three sensor streams.
pub struct SensorStreams {
    pub skeleton: Receiver<Result<Frame>>,
    pub depth: Receiver<Result<DepthFrame>>,
    pub video: Receiver<Result<VideoFrame>>,
}

/// Sending ends matching a [`SensorStreams`].
#[derive(Clone)]
pub struct SensorFeed {
    pub skeleton: Sender<Result<Frame>>,
    pub depth: Sender<Result<DepthFrame>>,
    pub video: Sender<Result<VideoFrame>>,
}

/// Bounded stream pair with room for `capacity` frames per stream.
pub fn sensor_channels(capacity: usize) -> (SensorFeed, SensorStreams) {
    let (skeleton_tx, skeleton_rx) = crossbeam_channel::bounded(capacity);
    let (depth_tx, depth_rx) = crossbeam_channel::bounded(capacity);
    let (video_tx, video_rx) = crossbeam_channel::bounded(capacity);
    (
        SensorFeed {
            skeleton: skeleton_tx,
            depth: depth_tx,
            video: video_tx,
        },
        SensorStreams {
            skeleton: skeleton_rx,
            depth: depth_rx,
            video: video_rx,
        },
    )
}

pub trait Sensor: Send {
    /// Start streaming. Failure here is fatal to the worker.
    fn open(&mut self) -> Result<SensorStreams>;
}

/// Sensor fed by hand through a [`SensorFeed`].
pub struct ChannelSensor {
    streams: Option<SensorStreams>,
}

impl ChannelSensor {
    pub fn new(capacity: usize) -> (Self, SensorFeed) {
        let (feed, streams) = sensor_channels(capacity);
        (
            Self {
                streams: Some(streams),
            },
            feed,
        )
    }
}

impl Sensor for ChannelSensor {
    fn open(&mut self) -> Result<SensorStreams> {
        self.streams
            .take()
            .ok_or_else(|| BloomError::SensorInit("channel sensor already opened".into()))
    }
}

/// Length of one pass through the scripted performance, in frames.
pub const SCRIPT_FRAMES: u32 = 300;

/// Scripted performer pose for `frame_number`, or `None` while out of view.
///
/// One pass: standing, left hand up and forward, both hands, a fast left foot
/// lift, the right hand, then a second of nobody in view.
pub fn performer_pose(frame_number: u32) -> Option<SkeletonSnapshot> {
    let n = frame_number % SCRIPT_FRAMES;
    if n >= 270 {
        return None;
    }

    let t = n as f32 / 30.0;
    let sway = (t * 2.0).sin() * 0.05;
    let mut skel = SkeletonSnapshot::tracked(1, [Vector4::point(sway, 0.0, 2.5); JOINT_COUNT]);
    skel.set_joint(Joint::Head, Vector4::point(sway, 1.1, 2.5));
    skel.set_joint(Joint::ShoulderCenter, Vector4::point(sway, 0.9, 2.5));
    skel.set_joint(Joint::HipCenter, Vector4::point(sway, 0.3, 2.5));

    let low_left = Vector4::point(sway - 0.3, 0.1, 2.5);
    let low_right = Vector4::point(sway + 0.3, 0.1, 2.5);
    let up_left = Vector4::point(sway - 0.3, 1.1, 2.1);
    let up_right = Vector4::point(sway + 0.3, 1.1, 2.1);
    let (left_hand, right_hand) = match n {
        60..=119 => (up_left, low_right),
        120..=179 => (up_left, up_right),
        240..=269 => (low_left, up_right),
        _ => (low_left, low_right),
    };
    skel.set_joint(Joint::HandLeft, left_hand);
    skel.set_joint(Joint::HandRight, right_hand);

    // Kicking: the left foot bobs fast enough to flash colors.
    let kick = if (180..240).contains(&n) {
        0.45 + (t * 20.0).sin() * 0.15
    } else {
        0.0
    };
    skel.set_joint(Joint::FootLeft, Vector4::point(sway - 0.2, -0.9 + kick, 2.5));
    skel.set_joint(Joint::FootRight, Vector4::point(sway + 0.2, -0.9, 2.5));
    Some(skel)
}

/// Depth image with the performer as player 1 on a sloped background.
pub fn performer_depth(timestamp_ms: u64, tracked: bool) -> DepthFrame {
    let mut samples = Vec::with_capacity(DEPTH_WIDTH * DEPTH_HEIGHT);
    for y in 0..DEPTH_HEIGHT {
        for x in 0..DEPTH_WIDTH {
            let in_body = tracked && (130..190).contains(&x) && (40..220).contains(&y);
            let (depth_mm, player) = if in_body {
                (2500u16, 1u16)
            } else {
                (3500 + y as u16 * 2, 0)
            };
            samples.push((depth_mm << 3) | player);
        }
    }
    DepthFrame {
        timestamp_ms,
        samples,
    }
}

/// Synthetic sensor playing [`performer_pose`] at a fixed rate.
pub struct SimSensor {
    rate_hz: u32,
    frame_limit: Option<u32>,
    realtime: bool,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SimSensor {
    /// Real-time 30 Hz playback until dropped.
    pub fn new() -> Self {
        Self {
            rate_hz: 30,
            frame_limit: None,
            realtime: true,
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Stop after `frames` frames, closing the streams.
    pub fn with_frame_limit(mut self, frames: u32) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Deliver frames as fast as the consumer takes them. Timestamps still advance at the frame rate.
    pub fn unpaced(mut self) -> Self {
        self.realtime = false;
        self
    }
}

impl Default for SimSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for SimSensor {
    fn open(&mut self) -> Result<SensorStreams> {
        if self.thread.is_some() {
            return Err(BloomError::SensorInit("sim sensor already running".into()));
        }
        let (feed, streams) = sensor_channels(4);
        let stop = self.stop.clone();
        let rate_hz = self.rate_hz;
        let frame_limit = self.frame_limit;
        let realtime = self.realtime;

        let thread = std::thread::Builder::new()
            .name("bloom-sim".into())
            .spawn(move || sim_loop(feed, stop, rate_hz, frame_limit, realtime))
            .map_err(|e| BloomError::SensorInit(format!("Failed to spawn sim thread: {}", e)))?;
        self.thread = Some(thread);
        log::info!("Sim sensor started at {} Hz", rate_hz);
        Ok(streams)
    }
}

impl Drop for SimSensor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn sim_loop(
    feed: SensorFeed,
    stop: Arc<AtomicBool>,
    rate_hz: u32,
    frame_limit: Option<u32>,
    realtime: bool,
) {
    let period = Duration::from_secs(1) / rate_hz.max(1);
    let period_ms = period.as_millis() as u64;
    let mut frame_number = 0u32;

    while !stop.load(Ordering::Relaxed) {
        if frame_limit.is_some_and(|limit| frame_number >= limit) {
            break;
        }
        let timestamp_ms = 1000 + frame_number as u64 * period_ms;
        let mut frame = Frame::new(timestamp_ms, frame_number);
        let pose = performer_pose(frame_number);
        if let Some(skel) = pose {
            frame.skeletons[0] = skel;
        }

        let video = VideoFrame {
            timestamp_ms,
            pixels: vec![(frame_number % 256) as u8; VIDEO_WIDTH * VIDEO_HEIGHT * VIDEO_BYTES_PER_PIXEL],
        };
        let delivered = deliver(&feed.skeleton, Ok(frame), &stop)
            && deliver(&feed.depth, Ok(performer_depth(timestamp_ms, pose.is_some())), &stop)
            && deliver(&feed.video, Ok(video), &stop);
        if !delivered {
            break;
        }

        frame_number += 1;
        if realtime {
            std::thread::sleep(period);
        }
    }
    log::debug!("Sim sensor stopped after {} frames", frame_number);
}

/// Blocking send that gives up once `stop` is raised or the receiver is gone.
fn deliver<T>(tx: &Sender<T>, item: T, stop: &AtomicBool) -> bool {
    let mut item = item;
    loop {
        match tx.send_timeout(item, Duration::from_millis(50)) {
            Ok(()) => return true,
            Err(SendTimeoutError::Disconnected(_)) => return false,
            Err(SendTimeoutError::Timeout(back)) => {
                if stop.load(Ordering::Relaxed) {
                    return false;
                }
                item = back;
            }
        }
    }
}
