//! Scripted transport for unit tests.

use super::transport::{CloseInfo, Connector, Outgoing, TransportEvent, TransportLink};
use crate::error::BridgeError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Server side of one link opened through [`MockConnector`].
pub(crate) struct MockServer {
    pub url: String,
    events: mpsc::UnboundedSender<TransportEvent>,
    outgoing: Mutex<mpsc::UnboundedReceiver<Outgoing>>,
}

impl MockServer {
    pub fn push(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    pub fn send_text(&self, text: &str) {
        self.push(TransportEvent::Message(text.to_string()));
    }

    pub fn close(&self, code: u16) {
        self.push(TransportEvent::Closed(CloseInfo {
            code,
            reason: String::new(),
        }));
    }

    /// The client stopped listening to this link.
    pub fn is_abandoned(&self) -> bool {
        self.events.is_closed()
    }

    /// Everything the client wrote since the last call.
    pub fn drain(&self) -> Vec<Outgoing> {
        let mut rx = self.outgoing.lock().unwrap();
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(item);
        }
        out
    }

    /// Text frames only, since the last call.
    pub fn drain_text(&self) -> Vec<String> {
        self.drain()
            .into_iter()
            .filter_map(|o| match o {
                Outgoing::Text(text) => Some(text),
                Outgoing::Close(_) => None,
            })
            .collect()
    }
}

#[derive(Default)]
pub(crate) struct MockConnector {
    servers: Mutex<Vec<Arc<MockServer>>>,
    refuse: AtomicBool,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of `open` calls, successful or not.
    pub fn open_count(&self) -> usize {
        self.servers.lock().unwrap().len()
    }

    pub fn last(&self) -> Arc<MockServer> {
        let servers = self.servers.lock().unwrap();
        Arc::clone(servers.last().unwrap())
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> Result<TransportLink, BridgeError> {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.servers.lock().unwrap().push(Arc::new(MockServer {
            url: url.to_string(),
            events: events_tx,
            outgoing: Mutex::new(outgoing_rx),
        }));
        if self.refuse.load(Ordering::SeqCst) {
            return Err(BridgeError::Transport("connection refused".to_string()));
        }
        Ok(TransportLink {
            outgoing: outgoing_tx,
            events: events_rx,
        })
    }
}
