//! Ethernet (BUS) gateway session.
//!
//! A BUS gateway is reached through two independent channels on the same
//! port:
//!
//! - **MON**: opened with `*99*1##`, receives every bus event. A background
//!   loop reads it, dispatches events and sends an ACK keepalive so the
//!   gateway does not drop an idle connection.
//! - **CMD**: opened with `*99*9##`, carries request/response exchanges. It is
//!   opened lazily and replaced when it has been idle longer than the
//!   freshness window.
//!
//! When MON is lost the session reports `Disconnected` and, if enabled,
//! reconnects both channels with exponential backoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{GatewayConfig, TimingConfig};
use crate::core::frame::ACK;
use crate::error::{constants, OwnError, Result};
use crate::message::{gateway, OpenMessage};
use crate::protocol::{
    negotiate_with_timeout, ChannelKind, GatewayEvent, GatewayListener, Notifier, Response,
};
use crate::session::{
    lock, reconnect_with_backoff, ChannelState, Gateway, ReconnectBackoff,
    EVENT_BROADCAST_CAPACITY,
};
use crate::transport::{Connector, FrameChannel, FrameReader, FrameWriter, TcpConnector};
use crate::utils::{Metrics, MetricsSnapshot};

#[derive(Default)]
struct CmdSlot {
    channel: Option<FrameChannel>,
    /// Handshake or last completed exchange
    last_activity: Option<Instant>,
}

impl CmdSlot {
    fn is_fresh(&self, window: Duration) -> bool {
        self.channel.is_some() && self.last_activity.is_some_and(|t| t.elapsed() < window)
    }
}

struct BusInner {
    connector: Arc<dyn Connector>,
    password: String,
    timing: TimingConfig,
    backoff: ReconnectBackoff,
    auto_reconnect: bool,

    cmd: Mutex<CmdSlot>,
    mon_writer: Mutex<Option<FrameWriter>>,
    mon_open: Mutex<()>,
    mon_state: watch::Sender<ChannelState>,
    cmd_state: watch::Sender<ChannelState>,

    /// Cancelled by `close()`; renewed by the next `connect()`
    lifecycle: StdMutex<CancellationToken>,
    /// Stops the current MON loop and its keepalive
    mon_token: StdMutex<Option<CancellationToken>>,
    closing: AtomicBool,
    reconnecting: AtomicBool,
    reconnect_tx: mpsc::Sender<()>,

    notifier: Notifier,
    events: broadcast::Sender<OpenMessage>,
    metrics: Metrics,
}

/// Session with an Ethernet gateway.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Must be created
/// inside a Tokio runtime. Dropping the session stops its background tasks.
///
/// ```rust,no_run
/// use openwebnet::config::GatewayConfig;
/// use openwebnet::message::lighting;
/// use openwebnet::session::{BusSession, Gateway};
///
/// # async fn run() -> openwebnet::error::Result<()> {
/// let config = GatewayConfig::from_env()?;
/// let session = BusSession::tcp(&config);
/// session.connect().await?;
///
/// let response = session.send(&lighting::request_turn_on("0311#4#01")?).await?;
/// assert!(response.is_success());
/// session.close().await;
/// # Ok(())
/// # }
/// ```
pub struct BusSession {
    inner: Arc<BusInner>,
}

impl BusSession {
    pub fn new(connector: Arc<dyn Connector>, config: &GatewayConfig) -> Self {
        let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
        let (events, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);

        let inner = Arc::new(BusInner {
            connector,
            password: config.bus.password.clone(),
            timing: config.timing.clone(),
            backoff: ReconnectBackoff::from_config(&config.reconnect),
            auto_reconnect: config.reconnect.auto_reconnect,
            cmd: Mutex::new(CmdSlot::default()),
            mon_writer: Mutex::new(None),
            mon_open: Mutex::new(()),
            mon_state: watch::channel(ChannelState::Closed).0,
            cmd_state: watch::channel(ChannelState::Closed).0,
            lifecycle: StdMutex::new(CancellationToken::new()),
            mon_token: StdMutex::new(None),
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

    /// Session over TCP to `config.bus`
    pub fn tcp(config: &GatewayConfig) -> Self {
        let connector = TcpConnector::from_config(&config.bus, &config.timing);
        Self::new(Arc::new(connector), config)
    }

    /// Open MON then CMD.
    ///
    /// Listeners receive `Connected` on success. On failure both channels are
    /// closed, listeners receive `ConnectionError` and the error is returned.
    #[instrument(skip(self), fields(gateway = %self.inner.connector.describe()))]
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        inner.closing.store(false, Ordering::SeqCst);
        inner.renew_lifecycle();

        let opened = match inner.open_mon().await {
            Ok(()) => inner.open_cmd().await,
            Err(e) => Err(e),
        };

        match opened {
            Ok(()) => {
                info!("Connected to gateway");
                inner.notifier.notify(GatewayEvent::Connected).await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Connection to gateway failed");
                inner.metrics.connection_error();
                inner.stop_mon().await;
                inner.close_cmd().await;
                inner
                    .notifier
                    .notify(GatewayEvent::ConnectionError(Arc::new(e.clone())))
                    .await;
                Err(e)
            }
        }
    }

    /// Close both channels and stop keepalive and reconnection.
    ///
    /// A request already in flight keeps its CMD channel until it completes;
    /// later requests fail with `ConnectionClosed` until the next `connect()`.
    pub async fn close(&self) {
        let inner = &self.inner;
        inner.closing.store(true, Ordering::SeqCst);
        lock(&inner.lifecycle).cancel();
        inner.stop_mon().await;

        match inner.cmd.try_lock() {
            Ok(mut slot) => inner.drop_cmd(&mut slot).await,
            Err(_) => debug!("CMD channel busy, closing after the current request"),
        }

        info!("Gateway session closed");
        inner.metrics.log_metrics();
        inner.notifier.notify(GatewayEvent::ConnectionClosed).await;
    }

    /// Reconnect both channels now, with backoff between failed attempts.
    pub async fn reconnect(&self) -> Result<()> {
        self.inner.reconnect().await
    }

    pub fn mon_state(&self) -> ChannelState {
        *self.inner.mon_state.borrow()
    }

    pub fn cmd_state(&self) -> ChannelState {
        *self.inner.cmd_state.borrow()
    }

    /// Follow MON state changes
    pub fn watch_mon_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.mon_state.subscribe()
    }

    pub fn watch_cmd_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.cmd_state.subscribe()
    }

    /// Whether the CMD channel can be reused without a new handshake.
    pub async fn is_cmd_fresh(&self) -> bool {
        self.inner
            .cmd
            .lock()
            .await
            .is_fresh(self.inner.timing.cmd_fresh_window)
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

impl Drop for BusSession {
    fn drop(&mut self) {
        self.inner.closing.store(true, Ordering::SeqCst);
        lock(&self.inner.lifecycle).cancel();
        if let Some(token) = lock(&self.inner.mon_token).take() {
            token.cancel();
        }
    }
}

#[async_trait]
impl Gateway for BusSession {
    async fn send(&self, msg: &OpenMessage) -> Result<Response> {
        self.inner.send(msg).await
    }

    fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    fn subscribe(&self) -> broadcast::Receiver<OpenMessage> {
        self.inner.events.subscribe()
    }
}

/// Runs reconnects requested by the MON loop. Holds the session weakly so
/// that dropping the last handle ends the task.
async fn reconnect_supervisor(inner: Weak<BusInner>, mut requests: mpsc::Receiver<()>) {
    while requests.recv().await.is_some() {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if let Err(e) = inner.reconnect().await {
            debug!(error = %e, "Automatic reconnect ended");
        }
    }
    debug!("Reconnect supervisor stopped");
}

impl BusInner {
    fn state_for(&self, kind: ChannelKind) -> &watch::Sender<ChannelState> {
        match kind {
            ChannelKind::Monitor => &self.mon_state,
            ChannelKind::Command => &self.cmd_state,
        }
    }

    fn lifecycle_token(&self) -> CancellationToken {
        lock(&self.lifecycle).clone()
    }

    fn renew_lifecycle(&self) {
        let mut token = lock(&self.lifecycle);
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
    }

    /// Connect and authenticate one channel, tracking its state.
    async fn open_channel(&self, kind: ChannelKind) -> Result<FrameChannel> {
        let state = self.state_for(kind);
        state.send_replace(ChannelState::Connecting);

        let channel = match self.connector.connect().await {
            Ok(channel) => channel,
            Err(e) => {
                state.send_replace(ChannelState::Closed);
                return Err(e);
            }
        };
        self.metrics.connection_opened();

        state.send_replace(ChannelState::Handshaking);
        self.metrics.handshake_attempt();
        match negotiate_with_timeout(channel, kind, &self.password, self.timing.handshake_timeout)
            .await
        {
            Ok((channel, mode)) => {
                self.metrics.handshake_success();
                debug!(?kind, ?mode, "Channel authenticated");
                state.send_replace(ChannelState::Open);
                Ok(channel)
            }
            Err(e) => {
                self.metrics.handshake_failed();
                state.send_replace(ChannelState::Closed);
                Err(e)
            }
        }
    }

    async fn open_mon(self: &Arc<Self>) -> Result<()> {
        let _opening = self.mon_open.lock().await;
        if *self.mon_state.borrow() == ChannelState::Open {
            return Ok(());
        }

        let channel = self.open_channel(ChannelKind::Monitor).await?;
        let (reader, writer) = channel.into_split();
        *self.mon_writer.lock().await = Some(writer);

        let token = self.lifecycle_token().child_token();
        let previous = lock(&self.mon_token).replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        tokio::spawn(Arc::clone(self).mon_loop(reader, token.clone()));
        tokio::spawn(Arc::clone(self).keepalive_loop(token));
        info!("MON channel open");
        Ok(())
    }

    async fn open_cmd(&self) -> Result<()> {
        let mut slot = self.cmd.lock().await;
        if slot.channel.is_none() {
            slot.channel = Some(self.open_channel(ChannelKind::Command).await?);
            slot.last_activity = Some(Instant::now());
        }
        Ok(())
    }

    /// Stop the MON loop and keepalive and close the MON channel.
    async fn stop_mon(&self) {
        let token = lock(&self.mon_token).take();
        if let Some(token) = token {
            token.cancel();
        }
        if let Some(mut writer) = self.mon_writer.lock().await.take() {
            writer.close().await;
        }
        self.mon_state.send_replace(ChannelState::Closed);
    }

    async fn close_cmd(&self) {
        let mut slot = self.cmd.lock().await;
        self.drop_cmd(&mut slot).await;
    }

    async fn drop_cmd(&self, slot: &mut CmdSlot) {
        if let Some(mut channel) = slot.channel.take() {
            channel.close().await;
        }
        slot.last_activity = None;
        self.cmd_state.send_replace(ChannelState::Closed);
    }

    #[instrument(skip(self, msg), fields(frame = %msg))]
    async fn send(&self, msg: &OpenMessage) -> Result<Response> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(OwnError::ConnectionClosed);
        }

        let mut slot = self.cmd.lock().await;
        if slot.channel.is_some() && !slot.is_fresh(self.timing.cmd_fresh_window) {
            debug!("CMD channel idle too long, reopening");
            self.drop_cmd(&mut slot).await;
        }

        let result = match self.exchange(&mut slot, msg).await {
            Err(e) if e.is_transport() => {
                warn!(error = %e, "CMD exchange failed, retrying on a new channel");
                self.drop_cmd(&mut slot).await;
                self.exchange(&mut slot, msg).await
            }
            other => other,
        };

        match &result {
            Ok(response) => {
                self.metrics.command_completed();
                debug!(replies = response.messages().len(), success = response.is_success(), "Request completed");
            }
            Err(e) => {
                self.metrics.command_failed();
                warn!(error = %e, "Request failed");
                self.drop_cmd(&mut slot).await;
            }
        }
        if self.closing.load(Ordering::SeqCst) {
            self.drop_cmd(&mut slot).await;
        }
        result
    }

    /// One request/response round trip on the CMD channel.
    async fn exchange(&self, slot: &mut CmdSlot, msg: &OpenMessage) -> Result<Response> {
        if slot.channel.is_none() {
            slot.channel = Some(self.open_channel(ChannelKind::Command).await?);
            slot.last_activity = Some(Instant::now());
        }
        let channel = slot.channel.as_mut().ok_or(OwnError::ConnectionClosed)?;
        self.discard_stale(channel)?;

        channel.write_frame(msg.frame()).await?;
        self.metrics.frame_sent();

        let mut response = Response::new(msg.clone());
        while !response.is_complete() {
            let frame = channel
                .read_frame_timeout(self.timing.cmd_read_timeout)
                .await?
                .ok_or(OwnError::ConnectionClosed)?;
            self.metrics.frame_received();
            response.add(OpenMessage::parse(&frame)?)?;
        }

        slot.last_activity = Some(Instant::now());
        Ok(response)
    }

    /// Drop frames the gateway sent after the previous exchange completed.
    /// They belong to no request.
    fn discard_stale(&self, channel: &mut FrameChannel) -> Result<()> {
        while let Some(read) = channel.try_read_frame() {
            let Some(frame) = read? else {
                return Err(OwnError::ConnectionClosed);
            };
            self.metrics.frame_received();
            self.metrics.protocol_violation();
            let violation =
                OwnError::ProtocolViolation(format!("{}: {frame}", constants::ERR_STALE_REPLY));
            warn!(error = %violation, "Discarding CMD frame");
        }
        Ok(())
    }

    async fn mon_loop(self: Arc<Self>, mut reader: FrameReader, token: CancellationToken) {
        let _stop_keepalive = token.clone().drop_guard();
        let idle = self.timing.mon_read_timeout;

        loop {
            let read = tokio::select! {
                _ = token.cancelled() => {
                    debug!("MON loop stopped");
                    return;
                }
                read = tokio::time::timeout(idle, reader.read_frame()) => read,
            };

            match read {
                Ok(Ok(Some(frame))) => self.dispatch(&frame).await,
                Ok(Ok(None)) => {
                    self.mon_lost(OwnError::ConnectionClosed).await;
                    return;
                }
                Ok(Err(e)) => {
                    self.mon_lost(e).await;
                    return;
                }
                Err(_) => {
                    debug!(idle_s = idle.as_secs(), "MON idle, probing gateway");
                    if let Err(e) = self.probe().await {
                        self.mon_lost(e).await;
                        return;
                    }
                }
            }
        }
    }

    async fn dispatch(&self, frame: &str) {
        self.metrics.frame_received();
        match OpenMessage::parse(frame) {
            Ok(msg) if msg.is_terminal() => debug!(%msg, "Ignoring acknowledgement on MON"),
            Ok(msg) => {
                debug!(%msg, "MON event");
                // No subscribers is fine
                let _ = self.events.send(msg.clone());
                self.notifier.notify(GatewayEvent::Message(msg)).await;
            }
            Err(e) => {
                self.metrics.frame_skipped();
                warn!(%frame, error = %e, "Skipping MON frame");
            }
        }
    }

    /// Liveness check on the CMD channel.
    async fn probe(&self) -> Result<()> {
        let request = gateway::request_model()?;
        self.send(&request).await.map(|_| ())
    }

    async fn mon_lost(&self, error: OwnError) {
        if let Some(mut writer) = self.mon_writer.lock().await.take() {
            writer.close().await;
        }
        self.mon_state.send_replace(ChannelState::Closed);

        if self.closing.load(Ordering::SeqCst) {
            debug!(error = %error, "MON closed during shutdown");
            return;
        }

        warn!(error = %error, "MON channel lost");
        self.metrics.connection_error();
        self.notifier
            .notify(GatewayEvent::Disconnected(Arc::new(error)))
            .await;
        if self.auto_reconnect && self.reconnect_tx.try_send(()).is_err() {
            debug!("Reconnect already requested");
        }
    }

    async fn keepalive_loop(self: Arc<Self>, token: CancellationToken) {
        let period = self.timing.keepalive_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let mut writer = self.mon_writer.lock().await;
            let Some(writer) = writer.as_mut() else {
                return;
            };
            match writer.write_frame(ACK).await {
                Ok(()) => debug!("MON keepalive sent"),
                Err(e) => warn!(error = %e, "MON keepalive failed"),
            }
        }
    }

    async fn reconnect(self: &Arc<Self>) -> Result<()> {
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            debug!("Reconnect already running");
            return Ok(());
        }

        let token = self.lifecycle_token();
        let result = reconnect_with_backoff(&self.backoff, &token, move || self.reopen()).await;
        self.reconnecting.store(false, Ordering::SeqCst);

        match result {
            Ok(attempts) => {
                self.metrics.reconnected();
                info!(attempts, "Reconnected to gateway");
                self.notifier.notify(GatewayEvent::Reconnected).await;
                Ok(())
            }
            Err(OwnError::Cancelled) => {
                debug!("Reconnect cancelled");
                Err(OwnError::Cancelled)
            }
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
        self.close_cmd().await;
        self.open_mon().await?;
        self.open_cmd().await
    }
}
