//! USB (ZigBee) gateway session.
//!
//! The serial link carries commands and events on the same channel, so one
//! reader task routes every frame. While a request is pending, terminal
//! frames and frames with the request's WHO belong to its response; anything
//! else is an event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{GatewayConfig, TimingConfig};
use crate::core::frame::FrameFields;
use crate::error::{OwnError, Result};
use crate::message::{gateway, OpenMessage, Who};
use crate::protocol::{GatewayEvent, GatewayListener, Notifier, Response};
use crate::session::{
    lock, reconnect_with_backoff, ChannelState, Gateway, ReconnectBackoff,
    EVENT_BROADCAST_CAPACITY,
};
use crate::transport::{Connector, FrameReader, FrameWriter, SerialConnector};
use crate::utils::timeout::with_timeout_error;
use crate::utils::{FirmwareQuirks, Metrics, MetricsSnapshot};

struct PendingRequest {
    response: Response,
    who: Option<Who>,
    done: oneshot::Sender<Result<Response>>,
}

impl PendingRequest {
    fn claims(&self, msg: &OpenMessage) -> bool {
        msg.is_terminal() || (msg.who().is_some() && msg.who() == self.who)
    }

    /// A frame that failed to parse belongs to the request when its WHO
    /// section matches, or when it cannot be split at all.
    fn claims_raw(&self, frame: &str) -> bool {
        match FrameFields::parse(frame) {
            Ok(fields) => match (fields.who.parse::<u32>(), self.who) {
                (Ok(code), Some(who)) => code == who.code(),
                _ => false,
            },
            Err(_) => true,
        }
    }
}

struct UsbInner {
    connector: Arc<dyn Connector>,
    timing: TimingConfig,
    backoff: ReconnectBackoff,
    auto_reconnect: bool,

    writer: Mutex<Option<FrameWriter>>,
    /// One request in flight
    send_lock: Mutex<()>,
    open_lock: Mutex<()>,
    pending: StdMutex<Option<PendingRequest>>,
    state: watch::Sender<ChannelState>,

    firmware: StdMutex<Option<String>>,
    quirks: StdMutex<FirmwareQuirks>,

    lifecycle: StdMutex<CancellationToken>,
    reader_token: StdMutex<Option<CancellationToken>>,
    closing: AtomicBool,
    reconnecting: AtomicBool,
    reconnect_tx: mpsc::Sender<()>,

    notifier: Notifier,
    events: broadcast::Sender<OpenMessage>,
    metrics: Metrics,
}

/// Session with a USB ZigBee gateway.
///
/// `connect()` opens the serial port, puts the gateway in supervisor mode
/// and reads its firmware version; the version selects the
/// [`FirmwareQuirks`] discovery has to work around.
pub struct UsbSession {
    inner: Arc<UsbInner>,
}

impl UsbSession {
    pub fn new(connector: Arc<dyn Connector>, config: &GatewayConfig) -> Self {
        let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
        let (events, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);

        let inner = Arc::new(UsbInner {
            connector,
            timing: config.timing.clone(),
            backoff: ReconnectBackoff::from_config(&config.reconnect),
            auto_reconnect: config.reconnect.auto_reconnect,
            writer: Mutex::new(None),
            send_lock: Mutex::new(()),
            open_lock: Mutex::new(()),
            pending: StdMutex::new(None),
            state: watch::channel(ChannelState::Closed).0,
            firmware: StdMutex::new(None),
            quirks: StdMutex::new(FirmwareQuirks::default()),
            lifecycle: StdMutex::new(CancellationToken::new()),
            reader_token: StdMutex::new(None),
            closing: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
            reconnect_tx,
            notifier: Notifier::new(config.events.queue_capacity),
            events,
            metrics: Metrics::new(),
        });

        tokio::spawn(reconnect_supervisor(Arc::downgrade(&inner), reconnect_rx));
        Self { inner }
    }

    /// Session over the serial port in `config.usb`
    pub fn serial(config: &GatewayConfig) -> Self {
        let connector = SerialConnector::from_config(&config.usb);
        Self::new(Arc::new(connector), config)
    }

    #[instrument(skip(self), fields(gateway = %self.inner.connector.describe()))]
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        inner.closing.store(false, Ordering::SeqCst);
        {
            let mut token = lock(&inner.lifecycle);
            if token.is_cancelled() {
                *token = CancellationToken::new();
            }
        }

        match inner.open().await {
            Ok(()) => {
                info!("Connected to USB gateway");
                inner.notifier.notify(GatewayEvent::Connected).await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Connection to USB gateway failed");
                inner.metrics.connection_error();
                inner.stop().await;
                inner
                    .notifier
                    .notify(GatewayEvent::ConnectionError(Arc::new(e.clone())))
                    .await;
                Err(e)
            }
        }
    }

    pub async fn close(&self) {
        let inner = &self.inner;
        inner.closing.store(true, Ordering::SeqCst);
        lock(&inner.lifecycle).cancel();
        inner.stop().await;
        info!("USB gateway session closed");
        inner.metrics.log_metrics();
        inner.notifier.notify(GatewayEvent::ConnectionClosed).await;
    }

    pub async fn reconnect(&self) -> Result<()> {
        self.inner.reconnect().await
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    /// Firmware version read at connect, e.g. `"1.2.3"`
    pub fn firmware_version(&self) -> Option<String> {
        lock(&self.inner.firmware).clone()
    }

    pub fn add_listener<L>(&self, listener: &Arc<L>) -> Result<()>
    where
        L: GatewayListener + 'static,
    {
        self.inner.notifier.add_listener(listener)
    }

    pub fn remove_listener<L>(&self, listener: &Arc<L>) -> Result<()>
    where
        L: GatewayListener + 'static,
    {
        self.inner.notifier.remove_listener(listener)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl Drop for UsbSession {
    fn drop(&mut self) {
        self.inner.closing.store(true, Ordering::SeqCst);
        lock(&self.inner.lifecycle).cancel();
        if let Some(token) = lock(&self.inner.reader_token).take() {
            token.cancel();
        }
    }
}

#[async_trait]
impl Gateway for UsbSession {
    async fn send(&self, msg: &OpenMessage) -> Result<Response> {
        self.inner.send(msg).await
    }

    fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    fn subscribe(&self) -> broadcast::Receiver<OpenMessage> {
        self.inner.events.subscribe()
    }

    fn firmware_quirks(&self) -> FirmwareQuirks {
        *lock(&self.inner.quirks)
    }
}

async fn reconnect_supervisor(inner: Weak<UsbInner>, mut requests: mpsc::Receiver<()>) {
    while requests.recv().await.is_some() {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if let Err(e) = inner.reconnect().await {
            debug!(error = %e, "Automatic reconnect ended");
        }
    }
}

impl UsbInner {
    async fn open(self: &Arc<Self>) -> Result<()> {
        let _opening = self.open_lock.lock().await;
        if *self.state.borrow() == ChannelState::Open {
            return Ok(());
        }

        self.state.send_replace(ChannelState::Connecting);
        let channel = match self.connector.connect().await {
            Ok(channel) => channel,
            Err(e) => {
                self.state.send_replace(ChannelState::Closed);
                return Err(e);
            }
        };
        self.metrics.connection_opened();

        let (reader, writer) = channel.into_split();
        *self.writer.lock().await = Some(writer);

        let token = lock(&self.lifecycle).child_token();
        let previous = lock(&self.reader_token).replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        tokio::spawn(Arc::clone(self).read_loop(reader, token));
        self.state.send_replace(ChannelState::Open);

        self.init_gateway().await
    }

    /// Supervisor mode, then firmware version.
    async fn init_gateway(&self) -> Result<()> {
        let supervisor = self.send(&gateway::request_supervisor()?).await?;
        if !supervisor.is_success() {
            warn!("Gateway refused supervisor mode");
        }

        let firmware = self.send(&gateway::request_firmware_version()?).await?;
        match firmware
            .messages()
            .iter()
            .find_map(gateway::parse_firmware_version)
        {
            Some(version) => {
                let quirks = FirmwareQuirks::for_version(&version);
                info!(firmware = %version, ?quirks, "USB gateway firmware");
                *lock(&self.quirks) = quirks;
                *lock(&self.firmware) = Some(version);
            }
            None => warn!("USB gateway did not report its firmware version"),
        }
        Ok(())
    }

    async fn stop(&self) {
        let token = lock(&self.reader_token).take();
        if let Some(token) = token {
            token.cancel();
        }
        // Dropping the sender fails the waiting request
        lock(&self.pending).take();
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.close().await;
        }
        self.state.send_replace(ChannelState::Closed);
    }

    #[instrument(skip(self, msg), fields(frame = %msg))]
    async fn send(&self, msg: &OpenMessage) -> Result<Response> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(OwnError::ConnectionClosed);
        }

        let _turn = self.send_lock.lock().await;
        let (done, completed) = oneshot::channel();
        *lock(&self.pending) = Some(PendingRequest {
            response: Response::new(msg.clone()),
            who: msg.who(),
            done,
        });

        let written = match self.writer.lock().await.as_mut() {
            Some(writer) => writer.write_frame(msg.frame()).await,
            None => Err(OwnError::ConnectionClosed),
        };
        if let Err(e) = written {
            lock(&self.pending).take();
            self.metrics.command_failed();
            return Err(e);
        }
        self.metrics.frame_sent();

        let outcome = with_timeout_error(
            async { completed.await.unwrap_or(Err(OwnError::ConnectionClosed)) },
            self.timing.cmd_read_timeout,
        )
        .await;
        lock(&self.pending).take();

        match outcome {
            Ok(response) => {
                self.metrics.command_completed();
                debug!(replies = response.messages().len(), success = response.is_success(), "Request completed");
                Ok(response)
            }
            Err(OwnError::Timeout) => {
                self.metrics.command_failed();
                warn!("No terminal reply from USB gateway");
                Err(OwnError::Timeout)
            }
            Err(e) => {
                self.metrics.command_failed();
                warn!(error = %e, "Request failed");
                Err(e)
            }
        }
    }

    async fn read_loop(self: Arc<Self>, mut reader: FrameReader, token: CancellationToken) {
        loop {
            let read = tokio::select! {
                _ = token.cancelled() => {
                    debug!("USB reader stopped");
                    return;
                }
                read = reader.read_frame() => read,
            };

            match read {
                Ok(Some(frame)) => {
                    if let Some(event) = self.route(&frame) {
                        debug!(msg = %event, "USB event");
                        // No subscribers is fine
                        let _ = self.events.send(event.clone());
                        self.notifier.notify(GatewayEvent::Message(event)).await;
                    }
                }
                Ok(None) => {
                    self.lost(OwnError::ConnectionClosed).await;
                    return;
                }
                Err(e) => {
                    self.lost(e).await;
                    return;
                }
            }
        }
    }

    /// Hand a frame to the pending request, or return it as an event.
    fn route(&self, frame: &str) -> Option<OpenMessage> {
        self.metrics.frame_received();
        let msg = match OpenMessage::parse(frame) {
            Ok(msg) => msg,
            Err(e) => {
                let mut pending = lock(&self.pending);
                if pending.as_ref().is_some_and(|p| p.claims_raw(frame)) {
                    if let Some(request) = pending.take() {
                        warn!(%frame, error = %e, "Unreadable reply aborts request");
                        let _ = request.done.send(Err(e));
                    }
                    return None;
                }
                self.metrics.frame_skipped();
                warn!(%frame, error = %e, "Skipping USB frame");
                return None;
            }
        };

        let mut pending = lock(&self.pending);
        if pending.as_ref().is_some_and(|p| p.claims(&msg)) {
            if let Some(request) = pending.as_mut() {
                if let Err(e) = request.response.add(msg) {
                    warn!(error = %e, "Reply dropped");
                }
            }
            if pending.as_ref().is_some_and(|p| p.response.is_complete()) {
                if let Some(request) = pending.take() {
                    // The requester may have timed out
                    let _ = request.done.send(Ok(request.response));
                }
            }
            return None;
        }
        drop(pending);

        if msg.is_terminal() {
            self.metrics.protocol_violation();
            let violation = OwnError::ProtocolViolation(format!("unsolicited {msg}"));
            warn!(error = %violation, "Ignoring USB frame");
            return None;
        }
        Some(msg)
    }

    async fn lost(&self, error: OwnError) {
        lock(&self.pending).take();
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.close().await;
        }
        self.state.send_replace(ChannelState::Closed);

        if self.closing.load(Ordering::SeqCst) {
            debug!(error = %error, "USB channel closed during shutdown");
            return;
        }

        warn!(error = %error, "USB channel lost");
        self.metrics.connection_error();
        self.notifier
            .notify(GatewayEvent::Disconnected(Arc::new(error)))
            .await;
        if self.auto_reconnect && self.reconnect_tx.try_send(()).is_err() {
            debug!("Reconnect already requested");
        }
    }

    async fn reconnect(self: &Arc<Self>) -> Result<()> {
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let token = lock(&self.lifecycle).clone();
        let result = reconnect_with_backoff(&self.backoff, &token, move || self.reopen()).await;
        self.reconnecting.store(false, Ordering::SeqCst);

        match result {
            Ok(attempts) => {
                self.metrics.reconnected();
                info!(attempts, "Reconnected to USB gateway");
                self.notifier.notify(GatewayEvent::Reconnected).await;
                Ok(())
            }
            Err(OwnError::Cancelled) => Err(OwnError::Cancelled),
            Err(e) => {
                error!(error = %e, "Reconnect abandoned");
                self.notifier
                    .notify(GatewayEvent::ConnectionError(Arc::new(e.clone())))
                    .await;
                Err(e)
            }
        }
    }

    async fn reopen(self: &Arc<Self>) -> Result<()> {
        match self.open().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.stop().await;
                Err(e)
            }
        }
    }
}
