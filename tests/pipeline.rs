//! End-to-end worker tests: channel-backed sensor in, in-memory actuator out.

use bloom::protocol::{self, TuningParam};
use bloom::{
    Actuator, BloomError, ChannelSensor, DepthFrame, EngineConfig, Frame, GestureState,
    GestureUpdate, Joint, Published, SensorFeed, SimSensor, SkeletonSnapshot, Vector4, Worker,
    DEPTH_HEIGHT, DEPTH_WIDTH, JOINT_COUNT,
};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn fast_idle_config() -> EngineConfig {
    EngineConfig {
        idle_timeout: Duration::from_millis(50),
        poll_timeout: Duration::from_millis(10),
        ..EngineConfig::default()
    }
}

fn start(config: EngineConfig) -> (Worker, SensorFeed, SharedBuf) {
    let (sensor, feed) = ChannelSensor::new(16);
    let buf = SharedBuf::default();
    let worker = Worker::start(sensor, Actuator::from_writer(buf.clone()), config).unwrap();
    (worker, feed, buf)
}

fn raised_left_hand(n: u32) -> Frame {
    let mut skel = SkeletonSnapshot::tracked(4, [Vector4::point(0.0, 0.0, 2.5); JOINT_COUNT]);
    skel.set_joint(Joint::ShoulderCenter, Vector4::point(0.0, 0.9, 2.5));
    skel.set_joint(Joint::HandLeft, Vector4::point(-0.3, 1.0, 2.0));
    let mut frame = Frame::new(1000 + n as u64 * 33, n);
    frame.skeletons[3] = skel;
    frame
}

/// Next gesture update, skipping everything else.
fn next_gesture(worker: &Worker, timeout: Duration) -> Option<GestureUpdate> {
    let deadline = Instant::now() + timeout;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match worker.recv_timeout(left) {
            Ok(Published::Gesture(update)) => return Some(update),
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    None
}

/// Everything published within `window`.
fn collect(worker: &Worker, window: Duration) -> Vec<Published> {
    let deadline = Instant::now() + window;
    let mut items = Vec::new();
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match worker.recv_timeout(left) {
            Ok(item) => items.push(item),
            Err(_) => break,
        }
    }
    items
}

fn next_tuning(worker: &Worker) -> String {
    loop {
        match worker.recv_timeout(Duration::from_secs(2)) {
            Ok(Published::Tuning(line)) => return line,
            Ok(_) => {}
            Err(e) => panic!("no tuning reply: {}", e),
        }
    }
}

#[test]
fn test_tracked_frame_drives_actuator() {
    let (worker, feed, buf) = start(EngineConfig::default());
    feed.skeleton.send(Ok(raised_left_hand(0))).unwrap();

    let update = loop {
        let update = next_gesture(&worker, Duration::from_secs(2)).expect("gesture update");
        if update.state.main_effect_on {
            break update;
        }
    };
    assert!(update.state.red_on);
    assert_eq!(update.effect_byte, 0xF3);
    assert_eq!(update.controlling_slot, Some(3));
    assert_eq!(update.debug_readout / 1000, 1);
    assert!(buf.bytes().contains(&0xF3));
    worker.stop();
}

#[test]
fn test_idle_off_sent_once_per_loss() {
    let (worker, feed, buf) = start(fast_idle_config());

    // Nobody has been seen since startup, so the first timeout blanks.
    let startup = next_gesture(&worker, Duration::from_secs(2)).expect("startup off");
    assert_eq!(startup.state, GestureState::OFF);
    assert_eq!(startup.controlling_slot, None);

    for round in 0..2u32 {
        feed.skeleton.send(Ok(raised_left_hand(round))).unwrap();
        let on = next_gesture(&worker, Duration::from_secs(2)).expect("gesture update");
        assert!(on.state.main_effect_on);

        let offs = collect(&worker, Duration::from_millis(300))
            .into_iter()
            .filter(|item| matches!(item, Published::Gesture(u) if u.state == GestureState::OFF))
            .count();
        assert_eq!(offs, 1, "round {}", round);
    }

    assert_eq!(buf.bytes(), vec![0x00, 0xF3, 0x00, 0xF3, 0x00]);
    worker.stop();
}

#[test]
fn test_empty_frames_do_not_reach_actuator() {
    let mut config = fast_idle_config();
    config.idle_timeout = Duration::from_secs(60);
    let (worker, feed, buf) = start(config);

    for n in 0..5 {
        feed.skeleton.send(Ok(Frame::new(1000 + n * 33, n as u32))).unwrap();
    }
    feed.skeleton.send(Err(BloomError::FrameUnavailable)).unwrap();
    assert!(next_gesture(&worker, Duration::from_millis(200)).is_none());
    assert!(buf.bytes().is_empty());
    worker.stop();
}

#[test]
fn test_depth_frames_colorized_and_bad_ones_skipped() {
    let (worker, feed, _buf) = start(EngineConfig::default());

    feed.depth.send(Err(BloomError::FrameUnavailable)).unwrap();
    feed.depth
        .send(Ok(DepthFrame {
            timestamp_ms: 1,
            samples: vec![0; 10],
        }))
        .unwrap();
    feed.depth
        .send(Ok(DepthFrame {
            timestamp_ms: 2,
            samples: vec![(100 << 3) | 2; DEPTH_WIDTH * DEPTH_HEIGHT],
        }))
        .unwrap();

    let depth: Vec<_> = collect(&worker, Duration::from_millis(300))
        .into_iter()
        .filter_map(|item| match item {
            Published::Depth(frame) => Some(frame),
            _ => None,
        })
        .collect();
    assert_eq!(depth.len(), 1);
    assert_eq!(depth[0].timestamp_ms, 2);
    assert_eq!(depth[0].pixels[0].r, 0);
    assert!(depth[0].pixels[0].g > 200);
    worker.stop();
}

#[test]
fn test_tuning_round_trip() {
    let (worker, _feed, _buf) = start(EngineConfig::default());

    worker.request_tuning().unwrap();
    let line = next_tuning(&worker);
    assert_eq!(protocol::read_value(&line, "NewSpeedWeight"), Some(0.2));

    worker.tune(TuningParam::MinSpeed, 0.3).unwrap();
    let line = next_tuning(&worker);
    assert_eq!(protocol::read_value(&line, "MinSpeed"), Some(0.3));

    // Rejected values leave the tuning unchanged.
    worker.tune(TuningParam::MaxSpeed, 0.1).unwrap();
    let line = next_tuning(&worker);
    assert_eq!(protocol::read_value(&line, "MaxSpeed"), Some(1.0));
    worker.stop();
}

#[test]
fn test_closed_skeleton_stream_stops_worker() {
    let (worker, feed, _buf) = start(EngineConfig::default());
    assert!(worker.is_active());
    drop(feed);

    let deadline = Instant::now() + Duration::from_secs(2);
    while worker.is_active() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(!worker.is_active());
    assert!(matches!(worker.request_tuning(), Err(BloomError::WorkerStopped)));
}

#[test]
fn test_sim_performance_shows_every_hand_color() {
    let sensor = SimSensor::new().with_frame_limit(270).unpaced();
    let worker = Worker::start(sensor, Actuator::disconnected(), EngineConfig::default()).unwrap();

    let (mut red, mut green, mut yellow) = (false, false, false);
    loop {
        match worker.recv_timeout(Duration::from_secs(5)) {
            Ok(Published::Gesture(update)) => {
                red |= update.state.red_on;
                green |= update.state.green_on;
                yellow |= update.state.yellow_on;
                assert!(update.debug_readout < 1000);
            }
            Ok(_) => {}
            Err(BloomError::WorkerStopped) => break,
            Err(e) => panic!("unexpected: {}", e),
        }
    }
    assert!(red && green && yellow);
}
