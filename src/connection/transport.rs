//! WebSocket transport.
//!
//! A [`Connector`] opens one full-duplex link and hands back a pair of
//! channels: outgoing text/close requests, and incoming lifecycle events.
//! Keeping the socket behind channels lets the manager be driven by any
//! transport, including scripted ones in tests.

use crate::error::BridgeError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::Once;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Intentional, non-error shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close frame carried no status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;
/// Link dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Code and reason of a transport close.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn normal(reason: impl Into<String>) -> Self {
        Self {
            code: NORMAL_CLOSURE,
            reason: reason.into(),
        }
    }

    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: ABNORMAL_CLOSURE,
            reason: reason.into(),
        }
    }

    pub fn is_normal(&self) -> bool {
        self.code == NORMAL_CLOSURE
    }
}

/// Requests from the manager to the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outgoing {
    Text(String),
    /// Send a close frame and stop writing.
    Close(CloseInfo),
}

/// Events from the transport to the manager, in delivery order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Message(String),
    /// A fault that does not by itself close the link.
    Error(String),
    /// Always the last event of a link.
    Closed(CloseInfo),
}

/// One open link.
pub struct TransportLink {
    pub outgoing: mpsc::UnboundedSender<Outgoing>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Complete the handshake with `url` and return the live link.
    async fn open(&self, url: &str) -> Result<TransportLink, BridgeError>;
}

/// Install `ring` as the process TLS provider unless the host already chose one.
fn install_tls_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            log::debug!("TLS crypto provider already installed");
        }
    });
}

/// Production connector backed by `tokio-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<TransportLink, BridgeError> {
        install_tls_provider();
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Outgoing>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(request) = outgoing_rx.recv().await {
                match request {
                    Outgoing::Text(text) => {
                        if let Err(e) = sink.send(Message::text(text)).await {
                            log::warn!("WebSocket write failed: {}", e);
                            break;
                        }
                    }
                    Outgoing::Close(close) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(close.code),
                            reason: close.reason.into(),
                        };
                        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                            log::debug!("WebSocket close failed: {}", e);
                        }
                        break;
                    }
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            let close = loop {
                let next = tokio::select! {
                    next = source.next() => next,
                    // Manager went away; stop reading even if the peer is silent.
                    _ = events_tx.closed() => return,
                };
                let event = match next {
                    Some(Ok(Message::Text(text))) => TransportEvent::Message(text.to_string()),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => TransportEvent::Message(text),
                        Err(_) => {
                            log::warn!("Dropping non UTF-8 binary message ({} bytes)", bytes.len());
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => CloseInfo {
                                code: u16::from(frame.code),
                                reason: frame.reason.to_string(),
                            },
                            None => CloseInfo {
                                code: NO_STATUS_RECEIVED,
                                reason: String::new(),
                            },
                        };
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let _ = events_tx.send(TransportEvent::Error(e.to_string()));
                        break CloseInfo::abnormal(e.to_string());
                    }
                    None => break CloseInfo::abnormal("connection reset"),
                };
                if events_tx.send(event).is_err() {
                    return;
                }
            };
            let _ = events_tx.send(TransportEvent::Closed(close));
        });

        Ok(TransportLink {
            outgoing: outgoing_tx,
            events: events_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_close_info() {
        assert!(CloseInfo::normal("bye").is_normal());
        assert!(!CloseInfo::abnormal("lost").is_normal());
        assert_eq!(CloseInfo::abnormal("lost").code, 1006);
    }

    #[tokio::test]
    async fn test_ws_connector_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::text(r#"{"type":"output","data":"hi"}"#.to_string()))
                .await
                .unwrap();
            let received = loop {
                match ws.next().await.unwrap().unwrap() {
                    Message::Text(text) => break text.to_string(),
                    _ => continue,
                }
            };
            ws.send(Message::Close(Some(CloseFrame {
                code: CloseCode::from(4001),
                reason: "gone".to_string().into(),
            })))
            .await
            .unwrap();
            received
        });

        let url = format!("ws://{}/ws/terminal/box-1?token=t", addr);
        let mut link = WsConnector.open(&url).await.unwrap();

        assert_eq!(
            link.events.recv().await,
            Some(TransportEvent::Message(r#"{"type":"output","data":"hi"}"#.to_string()))
        );
        link.outgoing
            .send(Outgoing::Text(r#"{"type":"input","data":"ls\n"}"#.to_string()))
            .unwrap();
        assert_eq!(
            link.events.recv().await,
            Some(TransportEvent::Closed(CloseInfo {
                code: 4001,
                reason: "gone".to_string(),
            }))
        );
        assert_eq!(server.await.unwrap(), r#"{"type":"input","data":"ls\n"}"#);
    }

    #[tokio::test]
    async fn test_ws_connector_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsConnector.open(&format!("ws://{}/ws/terminal/x", addr)).await;
        assert!(matches!(result, Err(BridgeError::Transport(_))));
    }

    #[tokio::test]
    async fn test_wss_attempts_tls_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Hang up without speaking TLS.
            if let Ok((tcp, _)) = listener.accept().await {
                drop(tcp);
            }
        });

        let url = format!("wss://{}/ws/terminal/box-1?token=t", addr);
        let message = match WsConnector.open(&url).await {
            Ok(_) => panic!("plain TCP peer accepted a TLS handshake"),
            Err(BridgeError::Transport(message)) => message,
            Err(other) => panic!("unexpected error: {}", other),
        };
        assert!(!message.contains("TLS support not compiled in"), "{}", message);
    }
}
