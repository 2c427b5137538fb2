pub mod emulator;
pub mod fit;
pub mod theme;

use crate::auth::AuthProvider;
use crate::config::BridgeConfig;
use crate::connection::{
    CloseInfo, ConnectionManager, ConnectionObserver, ConnectionState, Connector, Endpoint,
    FrameSender, ServerFrame, WsConnector,
};
use crate::error::BridgeError;
use emulator::{Link, VtEmulator};
use fit::{CellMetrics, Geometry};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use theme::Theme;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Host-side notifications from a [`TerminalSession`].
pub trait SessionHooks: Send + Sync {
    fn on_connect(&self) {}
    fn on_disconnect(&self, _close: &CloseInfo) {}
    /// A connection-level fault: auth, transport or an abnormal close.
    fn on_error(&self, _error: &BridgeError) {}
    /// The server pushed an `error` frame. Always
    /// [`BridgeError::ServerReported`]; the connection stays up.
    fn on_server_error(&self, _error: &BridgeError) {}
    /// The screen content changed and should be redrawn.
    fn on_screen_changed(&self) {}
}

/// A terminal surface bound to one endpoint.
///
/// Owns the emulator and the [`ConnectionManager`]. Keystrokes and geometry
/// changes go out as frames; inbound frames are rendered into the emulator.
pub struct TerminalSession {
    shared: Arc<SessionShared>,
    manager: ConnectionManager,
}

/// Point-in-time view of the screen for hosts.
#[derive(Clone, Debug, Serialize)]
pub struct ScreenSnapshot {
    pub cols: u16,
    pub rows: u16,
    pub cursor_col: usize,
    pub cursor_row: usize,
    pub title: Option<String>,
    pub cursor_visible: bool,
    pub alternate_screen: bool,
    pub lines: Vec<String>,
    pub links: Vec<Link>,
    pub scrollback: usize,
    pub state: ConnectionState,
    pub last_error: Option<String>,
}

struct SessionShared {
    emulator: Mutex<VtEmulator>,
    viewport: Mutex<Viewport>,
    sender: FrameSender,
    hooks: Option<Arc<dyn SessionHooks>>,
    runtime: Handle,
    alive: Arc<AtomicBool>,
    initial_command: Option<String>,
    initial_command_delay: Duration,
    initial_command_sent: AtomicBool,
    initial_command_task: Mutex<Option<JoinHandle<()>>>,
}

/// Last known container size and cell metrics, used to re-fit.
struct Viewport {
    container: Option<(f32, f32)>,
    cell: CellMetrics,
    geometry: Geometry,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TerminalSession {
    /// Create a session over the production WebSocket transport.
    /// Must be called from within a Tokio runtime.
    pub fn new(endpoint: Endpoint, config: BridgeConfig, auth: Arc<dyn AuthProvider>) -> Self {
        Self::with_parts(endpoint, config, auth, Arc::new(WsConnector), None)
    }

    pub fn with_parts(
        endpoint: Endpoint,
        config: BridgeConfig,
        auth: Arc<dyn AuthProvider>,
        connector: Arc<dyn Connector>,
        hooks: Option<Arc<dyn SessionHooks>>,
    ) -> Self {
        let BridgeConfig {
            connection,
            session: options,
        } = config;

        let manager = ConnectionManager::new(endpoint, connection, auth, connector);
        let geometry = Geometry::new(options.cols, options.rows);
        let mut emulator = VtEmulator::with_scrollback(
            geometry.cols as usize,
            geometry.rows as usize,
            options.scrollback,
        );
        emulator.write_str(&welcome_banner(&options.title));

        let shared = Arc::new(SessionShared {
            emulator: Mutex::new(emulator),
            viewport: Mutex::new(Viewport {
                container: None,
                cell: CellMetrics::for_font_size(options.font_size),
                geometry,
            }),
            sender: manager.sender(),
            hooks,
            runtime: Handle::current(),
            alive: Arc::new(AtomicBool::new(true)),
            initial_command: options
                .initial_command
                .clone()
                .filter(|c| !c.trim().is_empty()),
            initial_command_delay: options.initial_command_delay(),
            initial_command_sent: AtomicBool::new(false),
            initial_command_task: Mutex::new(None),
        });
        let observer: Arc<dyn ConnectionObserver> = shared.clone();
        manager.set_observer(&observer);

        let session = Self { shared, manager };
        log::info!("Terminal session created for {}", session.manager.endpoint());
        if options.auto_connect {
            if let Err(e) = session.connect() {
                log::warn!("Auto-connect to {} failed: {}", session.manager.endpoint(), e);
            }
        }
        session
    }

    pub fn connect(&self) -> Result<(), BridgeError> {
        self.manager.connect()
    }

    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn last_error(&self) -> Option<String> {
        self.manager.last_error()
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.manager.endpoint()
    }

    /// Forward keystrokes or pasted text to the remote process.
    pub fn write_input(&self, data: &str) -> bool {
        if data.is_empty() {
            return false;
        }
        self.manager.send_input(data)
    }

    /// The container was resized to `width` x `height` px.
    pub fn fit(&self, width: f32, height: f32) -> Geometry {
        lock(&self.shared.viewport).container = Some((width, height));
        self.shared.refit_and_announce()
    }

    /// The host measured its real glyph box.
    pub fn set_cell_metrics(&self, cell: CellMetrics) -> Geometry {
        lock(&self.shared.viewport).cell = cell;
        self.shared.refit_and_announce()
    }

    /// Set the grid directly, for hosts that lay out in cells.
    pub fn resize(&self, cols: u16, rows: u16) -> Geometry {
        {
            let mut viewport = lock(&self.shared.viewport);
            viewport.container = None;
            viewport.geometry = Geometry::new(cols, rows);
        }
        self.shared.refit_and_announce()
    }

    pub fn geometry(&self) -> Geometry {
        lock(&self.shared.viewport).geometry
    }

    pub fn theme(&self) -> Theme {
        Theme::default()
    }

    /// Run `f` against the emulator, e.g. to paint cells.
    pub fn with_emulator<R>(&self, f: impl FnOnce(&VtEmulator) -> R) -> R {
        f(&lock(&self.shared.emulator))
    }

    pub fn snapshot(&self) -> ScreenSnapshot {
        let geometry = self.geometry();
        let emulator = lock(&self.shared.emulator);
        let (cursor_col, cursor_row) = emulator.cursor();
        ScreenSnapshot {
            cols: geometry.cols,
            rows: geometry.rows,
            cursor_col,
            cursor_row,
            title: emulator.title().map(str::to_string),
            cursor_visible: emulator.cursor_visible(),
            alternate_screen: emulator.is_alternate_screen(),
            lines: emulator.visible_lines(),
            links: emulator.links(),
            scrollback: emulator.scrollback_len(),
            state: self.manager.state(),
            last_error: self.manager.last_error(),
        }
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::SeqCst);
        if let Some(task) = lock(&self.shared.initial_command_task).take() {
            task.abort();
        }
        log::info!("Terminal session for {} closed", self.manager.endpoint());
        // The manager drops next and closes its own transport.
    }
}

impl SessionShared {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn write(&self, text: &str) {
        lock(&self.emulator).write_str(text);
    }

    fn banner(&self, color: &str, text: &str) {
        self.write(&format!("\r\n{}{}{}\r\n", color, text, RESET));
    }

    fn screen_changed(&self) {
        if let Some(hooks) = &self.hooks {
            hooks.on_screen_changed();
        }
    }

    /// Recompute the grid, resize the emulator, and send the geometry.
    fn refit_and_announce(&self) -> Geometry {
        let geometry = {
            let mut viewport = lock(&self.viewport);
            if let Some((width, height)) = viewport.container {
                viewport.geometry = Geometry::fit(width, height, viewport.cell);
            }
            viewport.geometry
        };
        {
            let mut emulator = lock(&self.emulator);
            let (cols, rows) = (geometry.cols as usize, geometry.rows as usize);
            if emulator.cols() != cols || emulator.rows() != rows {
                emulator.resize(cols, rows);
            }
        }
        self.sender.send_resize(geometry.cols, geometry.rows);
        geometry
    }

    fn schedule_initial_command(&self) {
        let Some(command) = self.initial_command.clone() else {
            return;
        };
        if self.initial_command_sent.swap(true, Ordering::SeqCst) {
            return;
        }

        let sender = self.sender.clone();
        let alive = Arc::clone(&self.alive);
        let delay = self.initial_command_delay;
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if !alive.load(Ordering::SeqCst) {
                return;
            }
            log::info!("Sending initial command");
            if !sender.send_input(&format!("{}\n", command)) {
                log::warn!("Initial command dropped, connection went away");
            }
        });
        *lock(&self.initial_command_task) = Some(task);
    }
}

impl ConnectionObserver for SessionShared {
    fn on_connect(&self) {
        if !self.is_alive() {
            return;
        }
        self.write(&format!("{}Connecting...{}\r\n", GREEN, RESET));
        let geometry = self.refit_and_announce();
        log::debug!("Synced geometry {}x{}", geometry.cols, geometry.rows);
        self.screen_changed();
        if let Some(hooks) = &self.hooks {
            hooks.on_connect();
        }
    }

    fn on_frame(&self, frame: ServerFrame) {
        if !self.is_alive() {
            return;
        }
        match frame {
            ServerFrame::Output { data } => self.write(&data),
            ServerFrame::Connected { message } => {
                lock(&self.emulator).clear_screen();
                self.banner(GREEN, message.as_deref().unwrap_or("Connected"));
                self.schedule_initial_command();
            }
            ServerFrame::Error { message } => {
                let message = message.unwrap_or_else(|| "Unknown error".to_string());
                self.banner(RED, &format!("Error: {}", message));
                if let Some(hooks) = &self.hooks {
                    hooks.on_server_error(&BridgeError::ServerReported(message));
                }
            }
            ServerFrame::Status { status, message } => {
                self.banner(
                    YELLOW,
                    &format!(
                        "Status: {} - {}",
                        status.unwrap_or_default(),
                        message.unwrap_or_default()
                    ),
                );
            }
            ServerFrame::Unknown => return,
        }
        self.screen_changed();
    }

    fn on_disconnect(&self, close: &CloseInfo) {
        if !self.is_alive() {
            return;
        }
        self.banner(RED, "Disconnected");
        self.screen_changed();
        if let Some(hooks) = &self.hooks {
            hooks.on_disconnect(close);
        }
    }

    fn on_error(&self, error: &BridgeError) {
        if !self.is_alive() {
            return;
        }
        match error {
            BridgeError::Transport(_) => self.banner(RED, "Connection error"),
            other => self.banner(RED, &other.to_string()),
        }
        self.screen_changed();
        if let Some(hooks) = &self.hooks {
            hooks.on_error(error);
        }
    }
}

fn welcome_banner(title: &str) -> String {
    let width = title.chars().count() + 8;
    let rule = "─".repeat(width);
    format!(
        "{m}┌{rule}┐{r}\r\n{m}│{r}  {b}{title}{r}      {m}│{r}\r\n{m}└{rule}┘{r}\r\n\r\n",
        m = MAGENTA,
        r = RESET,
        b = BOLD,
        rule = rule,
        title = title,
    )
}
