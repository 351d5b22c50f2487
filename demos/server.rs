//! Bloom tuning server: gesture engine → WebSocket → browser.
//!
//!   - Runs the gesture worker on the scripted performer
//!   - Broadcasts GESTURE / STATUS / TUNING lines to every connected client
//!   - Accepts REQUEST_TUNING and NEW_TUNING lines back from clients
//!
//! Usage:
//!   cargo run --release --example server
//!   Connect a WebSocket client to ws://localhost:8081

use bloom::protocol;
use bloom::{Actuator, EngineConfig, GestureUpdate, Published, SimSensor, Worker};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tungstenite::Message;

const PORT: u16 = 8081;

type WsClient = Arc<Mutex<tungstenite::WebSocket<TcpStream>>>;

fn main() {
    env_logger::init();

    let config = EngineConfig::from_env();
    let actuator = Actuator::from_config(&config.actuator);
    let worker = match Worker::start(SimSensor::new(), actuator, config) {
        Ok(w) => Arc::new(w),
        Err(e) => {
            eprintln!("[BLOOM] Failed to start worker: {}", e);
            std::process::exit(1);
        }
    };

    let clients: Arc<Mutex<Vec<WsClient>>> = Arc::new(Mutex::new(Vec::new()));

    let broadcast_clients = clients.clone();
    let broadcast_worker = worker.clone();
    std::thread::Builder::new()
        .name("bloom-broadcast".into())
        .spawn(move || broadcast_loop(&broadcast_worker, &broadcast_clients))
        .expect("Failed to spawn broadcast thread");

    let listener = TcpListener::bind(format!("0.0.0.0:{}", PORT)).unwrap_or_else(|e| {
        eprintln!("Failed to bind port {}: {}", PORT, e);
        std::process::exit(1);
    });
    eprintln!("[WS] Listening on ws://localhost:{}", PORT);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[TCP] accept error: {}", e);
                continue;
            }
        };

        let clients = clients.clone();
        let worker = worker.clone();
        std::thread::spawn(move || handle_websocket(stream, clients, &worker));
    }
}

/// Add the client to the broadcast list and forward its tuning lines to the worker.
fn handle_websocket(stream: TcpStream, clients: Arc<Mutex<Vec<WsClient>>>, worker: &Worker) {
    // Short read timeout so the broadcast thread gets the socket between polls
    stream.set_read_timeout(Some(Duration::from_millis(20))).ok();
    stream.set_write_timeout(Some(Duration::from_secs(2))).ok();
    stream.set_nodelay(true).ok();

    let ws = match tungstenite::accept(stream) {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("[WS] handshake error: {}", e);
            return;
        }
    };

    let ws = Arc::new(Mutex::new(ws));
    {
        let mut list = clients.lock().unwrap();
        list.push(ws.clone());
        eprintln!("[WS] Client connected ({} total)", list.len());
    }
    let _ = worker.request_tuning();

    loop {
        let incoming = ws.lock().unwrap().read();
        match incoming {
            Ok(Message::Text(text)) => {
                for line in text.lines() {
                    match protocol::parse_command(line) {
                        Ok(command) => {
                            let _ = worker.send_command(command);
                        }
                        Err(e) => eprintln!("[WS] ignored: {}", e),
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                std::thread::sleep(Duration::from_millis(30));
            }
            Err(_) => break,
        }

        // The broadcast thread drops clients it can't write to
        let still_active = clients.lock().unwrap().iter().any(|c| Arc::ptr_eq(c, &ws));
        if !still_active {
            break;
        }
    }

    let mut list = clients.lock().unwrap();
    list.retain(|c| !Arc::ptr_eq(c, &ws));
    eprintln!("[WS] Client disconnected ({} total)", list.len());
}

/// Forward worker output to every client. Depth and video stay server-side.
fn broadcast_loop(worker: &Worker, clients: &Mutex<Vec<WsClient>>) {
    loop {
        let line = match worker.recv_timeout(Duration::from_secs(2)) {
            Ok(Published::Gesture(update)) => gesture_line(&update),
            Ok(Published::Tuning(line)) | Ok(Published::Status(line)) => line,
            Ok(Published::Depth(_)) | Ok(Published::Video(_)) => continue,
            Err(bloom::BloomError::Timeout) => continue,
            Err(e) => {
                eprintln!("[BLOOM] Worker ended: {}", e);
                return;
            }
        };

        let msg = Message::Text(line);
        let mut list = clients.lock().unwrap();
        list.retain(|ws_arc| {
            let mut ws = ws_arc.lock().unwrap();
            ws.send(msg.clone()).is_ok()
        });
    }
}

fn gesture_line(update: &GestureUpdate) -> String {
    let s = &update.state;
    format!(
        "GESTURE byte={} main={} red={} green={} yellow={} intensity={} readout={} \n",
        update.effect_byte,
        s.main_effect_on as u8,
        s.red_on as u8,
        s.green_on as u8,
        s.yellow_on as u8,
        s.intensity,
        update.debug_readout,
    )
}
