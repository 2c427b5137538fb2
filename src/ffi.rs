//! C FFI interface for host UI integration.
//!
//! All functions exported here are callable through the generated C header.
//! Naming convention: boxterm_<module>_<action>

use crate::auth::{AuthProvider, StaticToken};
use crate::config::BridgeConfig;
use crate::connection::Endpoint;
use crate::terminal::TerminalSession;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::{Arc, OnceLock};

/// Global tokio runtime driving every session created over the C ABI.
/// `None` if the runtime could not be built; creation then fails cleanly.
fn runtime() -> Option<&'static tokio::runtime::Runtime> {
    static RUNTIME: OnceLock<Option<tokio::runtime::Runtime>> = OnceLock::new();
    RUNTIME
        .get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("boxterm-io")
                .enable_all()
                .build()
                .map_err(|e| log::error!("Failed to create tokio runtime: {}", e))
                .ok()
        })
        .as_ref()
}

/// Borrow a C string as `&str`. Null or non-UTF-8 yields `None`.
unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

fn into_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

// ═══════════════════════════════════════════════════════════
// Session FFI
// ═══════════════════════════════════════════════════════════

/// Opaque pointer to a TerminalSession.
pub type BoxtermSessionHandle = *mut TerminalSession;

/// Create a terminal session for the WebSocket endpoint at `path`
/// (e.g. "/ws/terminal/<box id>").
/// `token` may be null when nobody is signed in.
/// `config_json` may be null to use defaults plus `BOXTERM_API_URL`.
/// Returns null on failure.
#[no_mangle]
pub extern "C" fn boxterm_session_create(
    path: *const c_char,
    token: *const c_char,
    config_json: *const c_char,
) -> BoxtermSessionHandle {
    let Some(path_str) = (unsafe { c_str(path) }) else {
        log::error!("Session path is null or not UTF-8");
        return std::ptr::null_mut();
    };
    let endpoint = match Endpoint::new(path_str) {
        Ok(endpoint) => endpoint,
        Err(e) => {
            log::error!("Failed to create session: {}", e);
            return std::ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        BridgeConfig::from_env()
    } else {
        let parsed = unsafe { c_str(config_json) }
            .ok_or_else(|| "config is not UTF-8".to_string())
            .and_then(|json| BridgeConfig::from_json(json).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                log::error!("Invalid session config: {}", e);
                return std::ptr::null_mut();
            }
        }
    };

    let auth: Arc<dyn AuthProvider> = match unsafe { c_str(token) } {
        Some(token) => Arc::new(StaticToken::new(token)),
        None => Arc::new(StaticToken::none()),
    };

    let Some(rt) = runtime() else {
        return std::ptr::null_mut();
    };
    let _guard = rt.enter();
    let session = TerminalSession::new(endpoint, config, auth);
    Box::into_raw(Box::new(session))
}

/// Destroy a session. Closes its connection and cancels pending timers.
#[no_mangle]
pub extern "C" fn boxterm_session_destroy(handle: BoxtermSessionHandle) {
    if !handle.is_null() {
        unsafe {
            drop(Box::from_raw(handle));
        }
    }
}

/// Start connecting. Returns 0 if an attempt is under way (or already
/// connected), -1 if nobody is signed in or the handle is null.
#[no_mangle]
pub extern "C" fn boxterm_session_connect(handle: BoxtermSessionHandle) -> i32 {
    if handle.is_null() {
        return -1;
    }
    let session = unsafe { &*handle };
    match session.connect() {
        Ok(()) => 0,
        Err(e) => {
            log::warn!("Connect failed: {}", e);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn boxterm_session_disconnect(handle: BoxtermSessionHandle) -> i32 {
    if handle.is_null() {
        return -1;
    }
    let session = unsafe { &*handle };
    session.disconnect();
    0
}

/// Returns 1 if connected, 0 if not, -1 on invalid handle.
#[no_mangle]
pub extern "C" fn boxterm_session_is_connected(handle: BoxtermSessionHandle) -> i32 {
    if handle.is_null() {
        return -1;
    }
    let session = unsafe { &*handle };
    if session.is_connected() { 1 } else { 0 }
}

/// Most recent error message, or null if none.
/// Caller must free with boxterm_string_free.
#[no_mangle]
pub extern "C" fn boxterm_session_last_error(handle: BoxtermSessionHandle) -> *mut c_char {
    if handle.is_null() {
        return std::ptr::null_mut();
    }
    let session = unsafe { &*handle };
    match session.last_error() {
        Some(message) => into_c_string(message),
        None => std::ptr::null_mut(),
    }
}

/// Send keystrokes. `data` is UTF-8 of `len` bytes.
/// Returns 0 if sent, -1 if dropped (not connected) or invalid.
#[no_mangle]
pub extern "C" fn boxterm_session_write(
    handle: BoxtermSessionHandle,
    data: *const u8,
    len: usize,
) -> i32 {
    if handle.is_null() || data.is_null() {
        return -1;
    }

    let session = unsafe { &*handle };
    let bytes = unsafe { std::slice::from_raw_parts(data, len) };
    let Ok(text) = std::str::from_utf8(bytes) else {
        log::warn!("Dropping non-UTF-8 input of {} bytes", len);
        return -1;
    };

    if session.write_input(text) { 0 } else { -1 }
}

/// Fit the grid to a container of `width` x `height` px.
/// Returns the resulting geometry packed as `cols << 16 | rows`, or -1.
#[no_mangle]
pub extern "C" fn boxterm_session_fit(
    handle: BoxtermSessionHandle,
    width: f32,
    height: f32,
) -> i64 {
    if handle.is_null() {
        return -1;
    }
    let session = unsafe { &*handle };
    let geometry = session.fit(width, height);
    ((geometry.cols as i64) << 16) | geometry.rows as i64
}

#[no_mangle]
pub extern "C" fn boxterm_session_resize(
    handle: BoxtermSessionHandle,
    cols: u16,
    rows: u16,
) -> i32 {
    if handle.is_null() {
        return -1;
    }
    let session = unsafe { &*handle };
    session.resize(cols, rows);
    0
}

/// Screen snapshot as JSON.
/// Caller must free with boxterm_string_free.
#[no_mangle]
pub extern "C" fn boxterm_session_snapshot(handle: BoxtermSessionHandle) -> *mut c_char {
    if handle.is_null() {
        return std::ptr::null_mut();
    }
    let session = unsafe { &*handle };
    match serde_json::to_string(&session.snapshot()) {
        Ok(json) => into_c_string(json),
        Err(e) => {
            log::error!("Failed to serialize snapshot: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Colour theme as JSON, for painting cells.
/// Caller must free with boxterm_string_free.
#[no_mangle]
pub extern "C" fn boxterm_session_theme(handle: BoxtermSessionHandle) -> *mut c_char {
    if handle.is_null() {
        return std::ptr::null_mut();
    }
    let session = unsafe { &*handle };
    match serde_json::to_string(&session.theme()) {
        Ok(json) => into_c_string(json),
        Err(_) => std::ptr::null_mut(),
    }
}

// ═══════════════════════════════════════════════════════════
// Utility FFI
// ═══════════════════════════════════════════════════════════

/// Free a string allocated by Rust.
#[no_mangle]
pub extern "C" fn boxterm_string_free(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            drop(CString::from_raw(s));
        }
    }
}

/// Initialize the Rust logger.
#[no_mangle]
pub extern "C" fn boxterm_init() {
    let _ = env_logger::try_init();
    log::info!("Boxterm Core initialized");
}
