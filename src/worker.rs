use crate::actuator::Actuator;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::protocol::{TuningCommand, TuningParam};
use crate::sensor::{Sensor, SensorStreams};
use crate::types::{ColorFrame, GestureState, VideoFrame};
use crate::{BloomError, Result};
use crossbeam_channel::{select, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Gesture state as sent to the actuator, with its calibration readout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureUpdate {
    pub state: GestureState,
    pub effect_byte: u8,
    pub debug_readout: i32,
    /// Skeleton slot in control, `None` for an idle-timeout off.
    pub controlling_slot: Option<usize>,
}

/// Item published to the display consumer.
#[derive(Debug, Clone)]
pub enum Published {
    Depth(ColorFrame),
    Video(VideoFrame),
    Gesture(GestureUpdate),
    /// `TUNING ...` reply line.
    Tuning(String),
    /// `STATUS ...` line, one per color-cycle tick.
    Status(String),
}

/// Handle to the running gesture worker.
///
/// The worker thread owns the sensor, the engine and the actuator. It wakes
/// on any sensor stream, on a tuning command or at least every poll timeout
/// to check for a lost performer.
pub struct Worker {
    receiver: Receiver<Published>,
    control: Sender<TuningCommand>,
    stop: Option<Sender<()>>,
    active: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Worker {
    /// Open `sensor` and start processing.
    ///
    /// Configuration and sensor errors are returned here. After startup only
    /// the skeleton stream closing ends the worker.
    pub fn start<S>(mut sensor: S, actuator: Actuator, config: EngineConfig) -> Result<Worker>
    where
        S: Sensor + 'static,
    {
        let engine = Engine::new(config)?;
        let streams = sensor.open()?;

        let (sender, receiver) = crossbeam_channel::bounded(256);
        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let active = Arc::new(AtomicBool::new(true));
        let active_clone = active.clone();

        let thread = std::thread::Builder::new()
            .name("bloom-worker".into())
            .spawn(move || {
                let mut ctx = WorkerContext {
                    engine,
                    actuator,
                    publish: sender,
                };
                ctx.run(&streams, &control_rx, &stop_rx);
                active_clone.store(false, Ordering::Relaxed);
                drop(sensor);
            })
            .map_err(|e| BloomError::SensorInit(format!("Failed to spawn worker thread: {}", e)))?;

        Ok(Worker {
            receiver,
            control: control_tx,
            stop: Some(stop_tx),
            active,
            thread: Some(thread),
        })
    }

    /// Receive the next published item (blocks until available).
    pub fn recv(&self) -> Result<Published> {
        self.receiver.recv().map_err(|_| BloomError::WorkerStopped)
    }

    /// Try to receive a published item without blocking.
    pub fn try_recv(&self) -> Option<Published> {
        self.receiver.try_recv().ok()
    }

    /// Receive a published item with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Published> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => BloomError::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => BloomError::WorkerStopped,
        })
    }

    /// Queue a tuning command. The worker answers with a `TUNING` line.
    pub fn send_command(&self, command: TuningCommand) -> Result<()> {
        self.control
            .send(command)
            .map_err(|_| BloomError::WorkerStopped)
    }

    pub fn tune(&self, param: TuningParam, value: f32) -> Result<()> {
        self.send_command(TuningCommand::Set(param, value))
    }

    pub fn request_tuning(&self) -> Result<()> {
        self.send_command(TuningCommand::Request)
    }

    /// Check if the worker thread is still running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Stop the worker and wait for its thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the stop sender wakes the worker's select.
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct WorkerContext {
    engine: Engine,
    actuator: Actuator,
    publish: Sender<Published>,
}

impl WorkerContext {
    fn run(
        &mut self,
        streams: &SensorStreams,
        control: &Receiver<TuningCommand>,
        stop: &Receiver<()>,
    ) {
        let poll_timeout = self.engine.config().poll_timeout;
        log::info!("Worker started (actuator connected: {})", self.actuator.is_connected());

        // A closed image stream is swapped for one that never fires.
        let no_depth = crossbeam_channel::never();
        let no_video = crossbeam_channel::never();
        let mut depth_open = true;
        let mut video_open = true;

        loop {
            let depth_rx = if depth_open { &streams.depth } else { &no_depth };
            let video_rx = if video_open { &streams.video } else { &no_video };

            select! {
                recv(stop) -> _ => break,
                recv(depth_rx) -> msg => match msg {
                    Ok(Ok(depth)) => match self.engine.colorize(&depth) {
                        Ok(colored) => self.emit(Published::Depth(colored)),
                        Err(e) => log::warn!("Depth frame skipped: {}", e),
                    },
                    Ok(Err(e)) => log::warn!("Depth frame unavailable: {}", e),
                    Err(_) => {
                        log::warn!("Depth stream closed");
                        depth_open = false;
                    }
                },
                recv(video_rx) -> msg => match msg {
                    Ok(Ok(video)) => match video.validate() {
                        Ok(()) => self.emit(Published::Video(video)),
                        Err(e) => log::warn!("Video frame skipped: {}", e),
                    },
                    Ok(Err(e)) => log::warn!("Video frame unavailable: {}", e),
                    Err(_) => {
                        log::warn!("Video stream closed");
                        video_open = false;
                    }
                },
                recv(streams.skeleton) -> msg => match msg {
                    Ok(Ok(frame)) => {
                        if let Some(output) = self.engine.process_frame(&frame) {
                            self.drive(output.state, self.engine.controlling_slot());
                            if output.cycle_tick {
                                self.emit(Published::Status(self.engine.status_line()));
                            }
                        }
                    }
                    Ok(Err(e)) => log::warn!("Skeleton frame unavailable: {}", e),
                    Err(_) => {
                        log::warn!("Skeleton stream closed");
                        break;
                    }
                },
                recv(control) -> msg => match msg {
                    Ok(command) => {
                        let line = match self.engine.handle_command(command) {
                            Ok(line) => line,
                            Err(e) => {
                                log::warn!("Tuning rejected: {}", e);
                                self.engine.tuning_line()
                            }
                        };
                        self.emit(Published::Tuning(line));
                    }
                    Err(_) => break,
                },
                default(poll_timeout) => {}
            }

            if let Some(off) = self.engine.poll_idle(Instant::now()) {
                self.drive(off, None);
            }
        }

        log::info!("Worker stopped");
    }

    /// Send `state` to the actuator and publish it.
    fn drive(&mut self, state: GestureState, controlling_slot: Option<usize>) {
        self.actuator.send(&state);
        let update = GestureUpdate {
            state,
            effect_byte: self.engine.effect_byte(),
            debug_readout: self.engine.debug_readout(self.actuator.is_connected()),
            controlling_slot,
        };
        self.emit(Published::Gesture(update));
    }

    fn emit(&self, item: Published) {
        match self.publish.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::trace!("Display consumer lagging, item dropped"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
