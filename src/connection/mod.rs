pub mod endpoint;
pub mod frame;
pub mod manager;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use endpoint::Endpoint;
pub use frame::{ClientFrame, ServerFrame};
pub use manager::{ConnectionManager, FrameSender};
pub use transport::{CloseInfo, Connector, WsConnector};

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the single logical channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Lifecycle callbacks from a [`ConnectionManager`].
///
/// The manager only holds a weak reference to its observer, so callbacks
/// stop as soon as the observer is dropped.
pub trait ConnectionObserver: Send + Sync {
    fn on_connect(&self) {}
    fn on_frame(&self, _frame: ServerFrame) {}
    fn on_disconnect(&self, _close: &CloseInfo) {}
    fn on_error(&self, _error: &BridgeError) {}
}
