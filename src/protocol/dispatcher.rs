use std::sync::{Arc, RwLock, Weak};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{constants, OwnError, Result};
use crate::message::{DeviceType, OpenMessage, Where};

/// Receives session and discovery events.
///
/// Every callback has an empty default, so listeners implement only what they
/// need. Callbacks run on the dispatch task, one event at a time and in the
/// order events were produced; a slow listener delays the ones after it.
pub trait GatewayListener: Send + Sync {
    fn on_connected(&self) {}
    fn on_connection_error(&self, _error: &OwnError) {}
    fn on_connection_closed(&self) {}
    fn on_disconnected(&self, _error: &OwnError) {}
    fn on_reconnected(&self) {}
    fn on_event_message(&self, _msg: &OpenMessage) {}
    fn on_new_device(&self, _address: &Where, _device_type: DeviceType, _msg: &OpenMessage) {}
    fn on_discovery_completed(&self) {}
}

/// Event queued for delivery to listeners
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Connected,
    ConnectionError(Arc<OwnError>),
    ConnectionClosed,
    Disconnected(Arc<OwnError>),
    Reconnected,
    Message(OpenMessage),
    NewDevice {
        address: Where,
        device_type: DeviceType,
        message: OpenMessage,
    },
    DiscoveryCompleted,
}

type ListenerList = Arc<RwLock<Vec<Weak<dyn GatewayListener>>>>;

/// Ordered fan-out of [`GatewayEvent`]s to registered listeners.
///
/// Listeners are held weakly: dropping the last `Arc` unregisters a listener.
/// Events go through one bounded queue drained by a single task, which keeps
/// delivery order identical to production order. Must be created inside a
/// Tokio runtime.
#[derive(Clone)]
pub struct Notifier {
    listeners: ListenerList,
    tx: mpsc::Sender<GatewayEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let listeners: ListenerList = Arc::new(RwLock::new(Vec::new()));
        tokio::spawn(run_dispatch(Arc::clone(&listeners), rx));
        Self { listeners, tx }
    }

    pub fn add_listener<L>(&self, listener: &Arc<L>) -> Result<()>
    where
        L: GatewayListener + 'static,
    {
        let weak = Arc::downgrade(listener);
        let weak: Weak<dyn GatewayListener> = weak;
        let mut listeners = self.listeners.write().map_err(|_| {
            OwnError::ProtocolViolation(constants::ERR_LISTENERS_WRITE_LOCK.to_string())
        })?;
        listeners.push(weak);
        Ok(())
    }

    pub fn remove_listener<L>(&self, listener: &Arc<L>) -> Result<()>
    where
        L: GatewayListener + 'static,
    {
        let target = Arc::as_ptr(listener) as *const ();
        let mut listeners = self.listeners.write().map_err(|_| {
            OwnError::ProtocolViolation(constants::ERR_LISTENERS_WRITE_LOCK.to_string())
        })?;
        listeners.retain(|w| w.as_ptr() as *const () != target && w.strong_count() > 0);
        Ok(())
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> Result<usize> {
        let listeners = self.listeners.read().map_err(|_| {
            OwnError::ProtocolViolation(constants::ERR_LISTENERS_READ_LOCK.to_string())
        })?;
        Ok(listeners.iter().filter(|w| w.strong_count() > 0).count())
    }

    /// Queue an event; waits while the queue is full.
    pub async fn notify(&self, event: GatewayEvent) {
        trace!(?event, "Queueing listener event");
        if self.tx.send(event).await.is_err() {
            debug!("Listener dispatch task has stopped, event dropped");
        }
    }
}

async fn run_dispatch(listeners: ListenerList, mut rx: mpsc::Receiver<GatewayEvent>) {
    while let Some(event) = rx.recv().await {
        for listener in snapshot(&listeners) {
            deliver(listener.as_ref(), &event);
        }
    }
    debug!("Listener dispatch task finished");
}

/// Upgrade the live listeners and prune the dead ones.
fn snapshot(listeners: &ListenerList) -> Vec<Arc<dyn GatewayListener>> {
    let (live, dead) = {
        let guard = match listeners.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let live: Vec<_> = guard.iter().filter_map(Weak::upgrade).collect();
        let dead = live.len() != guard.len();
        (live, dead)
    };

    if dead {
        if let Ok(mut guard) = listeners.write() {
            guard.retain(|w| w.strong_count() > 0);
        }
    }
    live
}

fn deliver(listener: &dyn GatewayListener, event: &GatewayEvent) {
    match event {
        GatewayEvent::Connected => listener.on_connected(),
        GatewayEvent::ConnectionError(e) => listener.on_connection_error(e),
        GatewayEvent::ConnectionClosed => listener.on_connection_closed(),
        GatewayEvent::Disconnected(e) => listener.on_disconnected(e),
        GatewayEvent::Reconnected => listener.on_reconnected(),
        GatewayEvent::Message(msg) => listener.on_event_message(msg),
        GatewayEvent::NewDevice {
            address,
            device_type,
            message,
        } => listener.on_new_device(address, *device_type, message),
        GatewayEvent::DiscoveryCompleted => listener.on_discovery_completed(),
    }
}
