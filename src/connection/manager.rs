//! Connection manager.
//!
//! Owns the single logical channel to one terminal endpoint: attaches a fresh
//! auth token per attempt, pumps inbound frames to the observer in order, and
//! schedules a fixed-delay reconnect after abnormal closures.
//!
//! Every attempt runs under a generation number. `disconnect()` and each new
//! `connect()` bump it, and any event that arrives for an older generation is
//! discarded, so a superseded transport can never mutate state or reach the
//! observer.

use super::endpoint::Endpoint;
use super::frame::{ClientFrame, ServerFrame};
use super::transport::{CloseInfo, Connector, Outgoing, TransportEvent, TransportLink};
use super::{ConnectionObserver, ConnectionState};
use crate::auth::AuthProvider;
use crate::config::ConnectionOptions;
use crate::error::BridgeError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: Endpoint,
    options: ConnectionOptions,
    auth: Arc<dyn AuthProvider>,
    connector: Arc<dyn Connector>,
    runtime: Handle,
    observer: Mutex<Option<Weak<dyn ConnectionObserver>>>,
    shared: Mutex<Shared>,
}

#[derive(Default)]
struct Shared {
    state: ConnectionState,
    generation: u64,
    live: Option<LiveLink>,
    pending_reconnect: Option<ReconnectTimer>,
    last_error: Option<String>,
}

/// The open transport of the current generation. Dropping it stops that
/// generation's pump, even if the peer never answers the close.
struct LiveLink {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    _stop_pump: oneshot::Sender<()>,
}

/// The single pending reconnect. Dropping it cancels the timer.
struct ReconnectTimer {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl ReconnectTimer {
    /// Release the handle without cancelling; used by the timer task itself.
    fn disarm(mut self) {
        self.task.take();
    }
}

impl Drop for ReconnectTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConnectionManager {
    /// Create a manager for `endpoint`. Must be called from within a Tokio
    /// runtime; its handle drives every attempt and timer.
    pub fn new(
        endpoint: Endpoint,
        options: ConnectionOptions,
        auth: Arc<dyn AuthProvider>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoint,
                options,
                auth,
                connector,
                runtime: Handle::current(),
                observer: Mutex::new(None),
                shared: Mutex::new(Shared::default()),
            }),
        }
    }

    /// Register the lifecycle observer. Only a weak reference is kept.
    pub fn set_observer(&self, observer: &Arc<dyn ConnectionObserver>) {
        *lock(&self.inner.observer) = Some(Arc::downgrade(observer));
    }

    /// Start connecting. Returns immediately; the outcome is reported through
    /// the observer. Fails synchronously only when nobody is signed in.
    pub fn connect(&self) -> Result<(), BridgeError> {
        self.inner.connect()
    }

    /// Close the channel with a normal closure and suppress auto-reconnect.
    pub fn disconnect(&self) {
        self.inner.disconnect("User disconnected");
    }

    /// Best-effort send; dropped unless connected.
    pub fn send(&self, frame: &ClientFrame) -> bool {
        self.inner.send(frame)
    }

    pub fn send_input(&self, data: &str) -> bool {
        self.send(&ClientFrame::input(data))
    }

    pub fn send_resize(&self, cols: u16, rows: u16) -> bool {
        self.send(&ClientFrame::resize(cols, rows))
    }

    /// A weak sending handle that does not keep the manager alive.
    pub fn sender(&self) -> FrameSender {
        FrameSender {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.inner.shared).state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner.shared).last_error.clone()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn reconnect_pending(&self) -> bool {
        lock(&self.inner.shared).pending_reconnect.is_some()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.inner.disconnect("Terminal closed");
    }
}

/// Cloneable sending half of a [`ConnectionManager`].
#[derive(Clone)]
pub struct FrameSender {
    inner: Weak<Inner>,
}

impl FrameSender {
    pub fn send(&self, frame: &ClientFrame) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.send(frame),
            None => false,
        }
    }

    pub fn send_input(&self, data: &str) -> bool {
        self.send(&ClientFrame::input(data))
    }

    pub fn send_resize(&self, cols: u16, rows: u16) -> bool {
        self.send(&ClientFrame::resize(cols, rows))
    }
}

impl Inner {
    fn shared(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.shared().generation == generation
    }

    fn notify(&self, f: impl FnOnce(&dyn ConnectionObserver)) {
        let observer = lock(&self.observer).as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            f(observer.as_ref());
        }
    }

    fn connect(self: &Arc<Self>) -> Result<(), BridgeError> {
        if !self.auth.is_authenticated() {
            let err = BridgeError::AuthRequired("not authenticated".to_string());
            self.shared().last_error = Some(err.to_string());
            return Err(err);
        }

        let generation = {
            let mut shared = self.shared();
            if shared.state != ConnectionState::Disconnected {
                log::debug!("connect({}) ignored, already {}", self.endpoint, shared.state);
                return Ok(());
            }
            shared.pending_reconnect = None;
            shared.generation += 1;
            shared.state = ConnectionState::Connecting;
            shared.generation
        };

        let inner = Arc::clone(self);
        self.runtime.spawn(async move { inner.run(generation).await });
        Ok(())
    }

    async fn run(self: Arc<Self>, generation: u64) {
        let token = match self.auth.access_token().await {
            Ok(token) => token,
            Err(e) => {
                log::warn!("Token fetch for {} failed: {}", self.endpoint, e);
                self.fail_attempt(generation, BridgeError::AuthRequired(e.to_string()));
                return;
            }
        };

        let url = match self.endpoint.url(&self.options.api_url, &token) {
            Ok(url) => url,
            Err(e) => {
                log::error!("Cannot build URL for {}: {}", self.endpoint, e);
                self.fail_attempt(generation, e);
                return;
            }
        };

        if !self.is_current(generation) {
            return;
        }
        log::info!("Connecting to {}", self.endpoint);

        let link = match self.connector.open(url.as_str()).await {
            Ok(link) => link,
            Err(e) => {
                log::warn!("Handshake with {} failed: {}", self.endpoint, e);
                self.handle_error(generation, e);
                self.handle_close(generation, CloseInfo::abnormal("handshake failed"));
                return;
            }
        };
        let TransportLink { outgoing, mut events } = link;
        let (stop_pump, mut pump_stopped) = oneshot::channel::<()>();

        {
            let mut shared = self.shared();
            if shared.generation != generation {
                let _ = outgoing.send(Outgoing::Close(CloseInfo::normal("Superseded")));
                return;
            }
            shared.state = ConnectionState::Connected;
            shared.last_error = None;
            shared.pending_reconnect = None;
            shared.live = Some(LiveLink {
                outgoing,
                _stop_pump: stop_pump,
            });
        }
        log::info!("Connected to {}", self.endpoint);
        self.notify(|o| o.on_connect());

        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = &mut pump_stopped => {
                    log::debug!("Pump for {} released", self.endpoint);
                    return;
                }
            };
            let Some(event) = event else {
                break;
            };
            if !self.is_current(generation) {
                return;
            }
            match event {
                TransportEvent::Message(text) => match ServerFrame::decode(&text) {
                    Ok(frame) => {
                        log::trace!("<- {:?}", frame);
                        self.notify(|o| o.on_frame(frame));
                    }
                    Err(e) => log::warn!("Dropping frame from {}: {}", self.endpoint, e),
                },
                TransportEvent::Error(message) => {
                    log::warn!("Transport error on {}: {}", self.endpoint, message);
                    self.handle_error(generation, BridgeError::Transport(message));
                }
                TransportEvent::Closed(close) => {
                    self.handle_close(generation, close);
                    return;
                }
            }
        }

        self.handle_close(generation, CloseInfo::abnormal("transport dropped"));
    }

    /// Token or URL failure: terminal for this attempt, no reconnect.
    fn fail_attempt(&self, generation: u64, err: BridgeError) {
        {
            let mut shared = self.shared();
            if shared.generation != generation {
                return;
            }
            shared.state = ConnectionState::Disconnected;
            shared.last_error = Some(err.to_string());
        }
        self.notify(|o| o.on_error(&err));
    }

    /// Record a transport fault. State is left to the close that follows.
    fn handle_error(&self, generation: u64, err: BridgeError) {
        {
            let mut shared = self.shared();
            if shared.generation != generation {
                return;
            }
            shared.last_error = Some(err.to_string());
        }
        self.notify(|o| o.on_error(&err));
    }

    fn handle_close(self: &Arc<Self>, generation: u64, close: CloseInfo) {
        {
            let mut shared = self.shared();
            if shared.generation != generation {
                return;
            }
            shared.state = ConnectionState::Disconnected;
            shared.live = None;

            if close.is_normal() {
                log::info!("Connection to {} closed", self.endpoint);
            } else {
                let err = BridgeError::AbnormalClosure {
                    code: close.code,
                    reason: close.reason.clone(),
                };
                log::warn!("{} on {}", err, self.endpoint);
                if shared.last_error.is_none() {
                    shared.last_error = Some(err.to_string());
                }
                if self.options.auto_reconnect && shared.pending_reconnect.is_none() {
                    shared.pending_reconnect = Some(self.schedule_reconnect(generation));
                }
            }
        }
        self.notify(|o| o.on_disconnect(&close));
    }

    fn schedule_reconnect(self: &Arc<Self>, generation: u64) -> ReconnectTimer {
        let delay = self.options.reconnect_delay();
        log::info!("Reconnecting to {} in {:?}", self.endpoint, delay);

        let weak = Arc::downgrade(self);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let timer = {
                let mut shared = inner.shared();
                match shared.pending_reconnect.take() {
                    Some(timer) if timer.generation == generation => timer,
                    other => {
                        shared.pending_reconnect = other;
                        return;
                    }
                }
            };
            timer.disarm();
            if let Err(e) = inner.connect() {
                log::warn!("Reconnect to {} failed: {}", inner.endpoint, e);
                inner.notify(|o| o.on_error(&e));
            }
        });

        ReconnectTimer {
            generation,
            task: Some(task),
        }
    }

    fn disconnect(&self, reason: &str) {
        let (live, previous) = {
            let mut shared = self.shared();
            shared.pending_reconnect = None;
            shared.generation += 1;
            let previous = std::mem::replace(&mut shared.state, ConnectionState::Disconnected);
            (shared.live.take(), previous)
        };

        if let Some(link) = live {
            let _ = link.outgoing.send(Outgoing::Close(CloseInfo::normal(reason)));
            log::info!("Disconnected from {}", self.endpoint);
        }
        if previous == ConnectionState::Connected {
            self.notify(|o| o.on_disconnect(&CloseInfo::normal(reason)));
        }
    }

    fn send(&self, frame: &ClientFrame) -> bool {
        let shared = self.shared();
        let outgoing = match (&shared.live, shared.state) {
            (Some(link), ConnectionState::Connected) => &link.outgoing,
            _ => {
                log::trace!("Dropping {:?}, not connected", frame);
                return false;
            }
        };
        match frame.encode() {
            Ok(text) => {
                log::trace!("-> {}", text);
                outgoing.send(Outgoing::Text(text)).is_ok()
            }
            Err(e) => {
                log::error!("Cannot encode {:?}: {}", frame, e);
                false
            }
        }
    }
}
