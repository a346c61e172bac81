//! Shared fixtures: an in-memory gateway, a scripted `Gateway` and a
//! recording listener.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use openwebnet::config::GatewayConfig;
use openwebnet::core::frame::{ACK, MON_SESSION};
use openwebnet::error::{OwnError, Result};
use openwebnet::message::{DeviceType, OpenMessage, Where};
use openwebnet::protocol::{GatewayListener, Notifier, Response};
use openwebnet::session::Gateway;
use openwebnet::transport::{Connector, FrameChannel, FrameReader, FrameWriter};
use openwebnet::utils::FirmwareQuirks;
use tokio::sync::{broadcast, Notify};

/// Test configuration with short timings.
pub fn fast_config() -> GatewayConfig {
    GatewayConfig::default_with_overrides(|c| {
        c.timing.handshake_timeout = Duration::from_millis(500);
        c.timing.cmd_read_timeout = Duration::from_millis(500);
        c.reconnect.initial_delay = Duration::from_millis(10);
        c.reconnect.max_delay = Duration::from_millis(50);
    })
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

// ============================================================================
// IN-MEMORY GATEWAY
// ============================================================================

struct MockState {
    usb: bool,
    replies: Mutex<HashMap<String, Vec<String>>>,
    received: Mutex<Vec<String>>,
    connects: AtomicUsize,
    refuse: AtomicBool,
    events: broadcast::Sender<String>,
    kill: broadcast::Sender<()>,
}

/// Gateway served over `tokio::io::duplex`.
///
/// BUS mode runs the unauthenticated handshake and serves MON and CMD
/// channels; USB mode serves requests and events on one channel. Requests
/// without a scripted reply are answered with ACK.
#[derive(Clone)]
pub struct MockGateway {
    state: Arc<MockState>,
}

impl MockGateway {
    fn with_mode(usb: bool) -> Self {
        Self {
            state: Arc::new(MockState {
                usb,
                replies: Mutex::new(HashMap::new()),
                received: Mutex::new(Vec::new()),
                connects: AtomicUsize::new(0),
                refuse: AtomicBool::new(false),
                events: broadcast::channel(64).0,
                kill: broadcast::channel(4).0,
            }),
        }
    }

    pub fn bus() -> Self {
        Self::with_mode(false)
    }

    pub fn usb() -> Self {
        Self::with_mode(true)
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    pub fn reply(&self, request: &str, frames: &[&str]) {
        self.state.replies.lock().unwrap().insert(
            request.to_string(),
            frames.iter().map(|f| f.to_string()).collect(),
        );
    }

    /// Push a frame to every MON (BUS) or serial (USB) channel.
    pub fn push_event(&self, frame: &str) {
        let _ = self.state.events.send(frame.to_string());
    }

    /// Close every open channel from the gateway side.
    pub fn drop_connections(&self) {
        let _ = self.state.kill.send(());
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.state.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Frames received, MON frames prefixed with `MON `
    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn has_received(&self, frame: &str) -> bool {
        self.state.received.lock().unwrap().iter().any(|f| f == frame)
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }
}

impl MockState {
    fn replies_for(&self, request: &str) -> Vec<String> {
        self.replies
            .lock()
            .unwrap()
            .get(request)
            .cloned()
            .unwrap_or_else(|| vec![ACK.to_string()])
    }

    async fn serve(self: Arc<Self>, mut channel: FrameChannel) {
        let events = self.events.subscribe();
        let kill = self.kill.subscribe();

        if self.usb {
            let (reader, writer) = channel.into_split();
            self.answer(reader, writer, Some(events), kill).await;
            return;
        }

        if channel.write_frame(ACK).await.is_err() {
            return;
        }
        let Ok(Some(request)) = channel.read_frame().await else {
            return;
        };
        if channel.write_frame(ACK).await.is_err() {
            return;
        }

        let (reader, writer) = channel.into_split();
        if request == MON_SESSION {
            self.monitor(reader, writer, events, kill).await;
        } else {
            self.answer(reader, writer, None, kill).await;
        }
    }

    async fn monitor(
        &self,
        mut reader: FrameReader,
        mut writer: FrameWriter,
        mut events: broadcast::Receiver<String>,
        mut kill: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = kill.recv() => return,
                event = events.recv() => match event {
                    Ok(frame) => {
                        if writer.write_frame(&frame).await.is_err() {
                            return;
                        }
                    }
                    Err(_) => return,
                },
                frame = reader.read_frame() => match frame {
                    Ok(Some(frame)) => {
                        self.received.lock().unwrap().push(format!("MON {frame}"));
                    }
                    _ => return,
                },
            }
        }
    }

    async fn answer(
        &self,
        mut reader: FrameReader,
        mut writer: FrameWriter,
        mut events: Option<broadcast::Receiver<String>>,
        mut kill: broadcast::Receiver<()>,
    ) {
        loop {
            let next_event = async {
                match events.as_mut() {
                    Some(events) => events.recv().await.ok(),
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                _ = kill.recv() => return,
                event = next_event => match event {
                    Some(frame) => {
                        if writer.write_frame(&frame).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                },
                frame = reader.read_frame() => match frame {
                    Ok(Some(request)) => {
                        self.received.lock().unwrap().push(request.clone());
                        for reply in self.replies_for(&request) {
                            if writer.write_frame(&reply).await.is_err() {
                                return;
                            }
                        }
                    }
                    _ => return,
                },
            }
        }
    }
}

#[async_trait]
impl Connector for MockGateway {
    async fn connect(&self) -> Result<FrameChannel> {
        if self.state.refuse.load(Ordering::SeqCst) {
            return Err(OwnError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock gateway refused",
            )));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);

        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(Arc::clone(&self.state).serve(FrameChannel::new(server)));
        Ok(FrameChannel::new(client))
    }

    fn describe(&self) -> String {
        "mock://gateway".to_string()
    }
}

// ============================================================================
// SCRIPTED GATEWAY
// ============================================================================

/// `Gateway` answering from a script, without any I/O.
pub struct StubGateway {
    replies: Mutex<HashMap<String, Result<Vec<String>>>>,
    /// Events published after the reply to a request is built
    events_after: Mutex<HashMap<String, Vec<String>>>,
    sent: Mutex<Vec<String>>,
    quirks: FirmwareQuirks,
    gate: Option<Arc<Notify>>,
    notifier: Notifier,
    events: broadcast::Sender<OpenMessage>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::with_quirks(FirmwareQuirks::default())
    }

    pub fn with_quirks(quirks: FirmwareQuirks) -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            events_after: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            quirks,
            gate: None,
            notifier: Notifier::new(64),
            events: broadcast::channel(64).0,
        }
    }

    /// Every `send` waits for `gate` to be notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn reply(&self, request: &str, frames: &[&str]) {
        self.replies.lock().unwrap().insert(
            request.to_string(),
            Ok(frames.iter().map(|f| f.to_string()).collect()),
        );
    }

    pub fn fail(&self, request: &str, error: OwnError) {
        self.replies
            .lock()
            .unwrap()
            .insert(request.to_string(), Err(error));
    }

    pub fn event_after(&self, request: &str, frames: &[&str]) {
        self.events_after.lock().unwrap().insert(
            request.to_string(),
            frames.iter().map(|f| f.to_string()).collect(),
        );
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for StubGateway {
    async fn send(&self, msg: &OpenMessage) -> Result<Response> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.sent.lock().unwrap().push(msg.frame().to_string());

        let script = self
            .replies
            .lock()
            .unwrap()
            .get(msg.frame())
            .cloned()
            .unwrap_or_else(|| Ok(vec![ACK.to_string()]))?;

        let mut response = Response::new(msg.clone());
        for frame in script {
            response.add(OpenMessage::parse(&frame)?)?;
        }

        let after = self.events_after.lock().unwrap().get(msg.frame()).cloned();
        for frame in after.unwrap_or_default() {
            let _ = self.events.send(OpenMessage::parse(&frame)?);
        }
        Ok(response)
    }

    fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn subscribe(&self) -> broadcast::Receiver<OpenMessage> {
        self.events.subscribe()
    }

    fn firmware_quirks(&self) -> FirmwareQuirks {
        self.quirks
    }
}

// ============================================================================
// RECORDING LISTENER
// ============================================================================

/// Records every callback as a short string.
#[derive(Default)]
pub struct Recorder {
    seen: Mutex<Vec<String>>,
    devices: Mutex<Vec<(String, DeviceType)>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.as_str() == name)
            .count()
    }

    pub fn devices(&self) -> Vec<(String, DeviceType)> {
        self.devices.lock().unwrap().clone()
    }

    fn push(&self, entry: impl Into<String>) {
        self.seen.lock().unwrap().push(entry.into());
    }
}

impl GatewayListener for Recorder {
    fn on_connected(&self) {
        self.push("connected");
    }

    fn on_connection_error(&self, _error: &OwnError) {
        self.push("connection_error");
    }

    fn on_connection_closed(&self) {
        self.push("closed");
    }

    fn on_disconnected(&self, _error: &OwnError) {
        self.push("disconnected");
    }

    fn on_reconnected(&self) {
        self.push("reconnected");
    }

    fn on_event_message(&self, msg: &OpenMessage) {
        self.push(msg.frame());
    }

    fn on_new_device(&self, address: &Where, device_type: DeviceType, _msg: &OpenMessage) {
        self.devices
            .lock()
            .unwrap()
            .push((address.value().to_string(), device_type));
        self.push("new_device");
    }

    fn on_discovery_completed(&self) {
        self.push("completed");
    }
}
