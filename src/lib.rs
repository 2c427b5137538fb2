//! Boxterm Core: terminal engine for remote boxes and agent consoles
//!
//! Provides terminal emulation, a resilient WebSocket connection with
//! token auth and auto-reconnect, and a C FFI interface for host UIs.

pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod ffi;
pub mod terminal;

pub use auth::{AuthProvider, EnvToken, StaticToken};
pub use config::BridgeConfig;
pub use connection::{ConnectionManager, ConnectionState, Endpoint};
pub use error::BridgeError;
pub use terminal::{ScreenSnapshot, SessionHooks, TerminalSession};
