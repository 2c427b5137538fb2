//! JSON frames exchanged with the terminal server.
//!
//! Every frame is an object tagged by `type`. Client frames carry keystrokes
//! and geometry; server frames carry pty output and out-of-band notices.

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};

/// Frames sent from the bridge to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Keystrokes or pasted text for the remote process's stdin.
    Input { data: String },
    Resize { cols: u16, rows: u16 },
}

impl ClientFrame {
    pub fn input(data: impl Into<String>) -> Self {
        ClientFrame::Input { data: data.into() }
    }

    pub fn resize(cols: u16, rows: u16) -> Self {
        ClientFrame::Resize { cols, rows }
    }

    pub fn encode(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Frames pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Raw pty output, possibly containing ANSI escape sequences.
    Output {
        #[serde(default)]
        data: String,
    },
    /// The server attached the session and is ready for input.
    Connected {
        #[serde(default)]
        message: Option<String>,
    },
    /// Progress notice, e.g. a provisioning phase.
    Status {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    /// Server-side failure; the connection may stay open.
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    /// Any `type` this client does not know about.
    #[serde(other)]
    Unknown,
}

impl ServerFrame {
    pub fn decode(text: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frames_wire_format() {
        assert_eq!(
            ClientFrame::input("openclaw tui\n").encode().unwrap(),
            r#"{"type":"input","data":"openclaw tui\n"}"#
        );
        assert_eq!(
            ClientFrame::resize(120, 40).encode().unwrap(),
            r#"{"type":"resize","cols":120,"rows":40}"#
        );
    }

    #[test]
    fn test_decode_server_frames() {
        assert_eq!(
            ServerFrame::decode(r#"{"type":"output","data":"\u001b[32mhi"}"#).unwrap(),
            ServerFrame::Output { data: "\x1b[32mhi".to_string() }
        );
        assert_eq!(
            ServerFrame::decode(r#"{"type":"connected","message":"Connected"}"#).unwrap(),
            ServerFrame::Connected { message: Some("Connected".to_string()) }
        );
        assert_eq!(
            ServerFrame::decode(r#"{"type":"connected"}"#).unwrap(),
            ServerFrame::Connected { message: None }
        );
        assert_eq!(
            ServerFrame::decode(r#"{"type":"status","status":"provisioning","message":"2/5"}"#)
                .unwrap(),
            ServerFrame::Status {
                status: Some("provisioning".to_string()),
                message: Some("2/5".to_string()),
            }
        );
        assert_eq!(
            ServerFrame::decode(r#"{"type":"error","message":"pty died"}"#).unwrap(),
            ServerFrame::Error { message: Some("pty died".to_string()) }
        );
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        assert_eq!(
            ServerFrame::decode(r#"{"type":"heartbeat","seq":3}"#).unwrap(),
            ServerFrame::Unknown
        );
    }

    #[test]
    fn test_malformed_frames_are_decode_errors() {
        assert!(matches!(ServerFrame::decode("not json"), Err(BridgeError::Decode(_))));
        assert!(matches!(ServerFrame::decode(r#"{"data":"x"}"#), Err(BridgeError::Decode(_))));
        assert!(matches!(ServerFrame::decode(r#"[1,2]"#), Err(BridgeError::Decode(_))));
    }
}
