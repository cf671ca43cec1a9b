//! C-compatible exports called by the bootstrap and the camera logic

use std::ffi::c_void;

use tracing::instrument;
use tracing_subscriber::EnvFilter;

use camhook_core::CoreConfig;
use camhook_engine::{gate, is_camera_enabled, is_input_blocked, BufferToken};

/// Environment variable read for the log filter
const LOG_ENV: &str = "CAMHOOK_LOG";

/// Receives raw mouse input blocks: pointer to the block, length in bytes
pub type RawMouseCallback = extern "C" fn(block: *const u8, len: usize);

/// Load the config and install the input hooks
///
/// Returns `true` if every hook was installed and activated.
#[no_mangle]
pub extern "C" fn camhook_start() -> bool {
    let loaded = CoreConfig::load();
    let debug = loaded.as_ref().map(|c| c.debug).unwrap_or(false);
    init_logging(debug);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            CoreConfig::default()
        }
    };

    match std::panic::catch_unwind(|| camhook_core::start(&config)) {
        Ok(report) => {
            for (target, reason) in &report.failed {
                tracing::warn!("{} not intercepted: {}", target, reason);
            }
            report.is_complete()
        }
        Err(_) => {
            tracing::error!("Panic during start");
            false
        }
    }
}

/// Restore all hooked functions
#[no_mangle]
#[instrument(skip_all)]
pub extern "C" fn camhook_shutdown() -> bool {
    match std::panic::catch_unwind(crate::shutdown) {
        Ok(()) => true,
        Err(_) => {
            tracing::error!("Panic during shutdown");
            false
        }
    }
}

#[no_mangle]
pub extern "C" fn camhook_set_camera_enabled(enabled: bool) {
    gate().set_camera_enabled(enabled);
}

#[no_mangle]
pub extern "C" fn camhook_is_camera_enabled() -> bool {
    is_camera_enabled()
}

#[no_mangle]
pub extern "C" fn camhook_set_input_blocked(blocked: bool) {
    gate().set_input_blocked(blocked);
}

#[no_mangle]
pub extern "C" fn camhook_is_input_blocked() -> bool {
    is_input_blocked()
}

/// Flip input blocking, returning the new value
#[no_mangle]
pub extern "C" fn camhook_toggle_input_blocked() -> bool {
    gate().toggle_input_blocked()
}

/// Mark `buffer` as the tool's own XInputGetState output buffer
///
/// Polls into this buffer always receive real controller state. Null clears it.
#[no_mangle]
pub extern "C" fn camhook_set_controller_buffer(buffer: *const c_void) {
    let token = (!buffer.is_null()).then(|| BufferToken::of(buffer));
    gate().set_own_controller_buffer(token);
}

/// Forward raw mouse input blocks to `callback`, or stop forwarding if null
///
/// Must be called after [`camhook_start`]. The callback runs on the host's
/// message loop thread and must return quickly.
///
/// Returns `false` if the input filter is not installed yet.
#[no_mangle]
pub extern "C" fn camhook_set_raw_mouse_callback(callback: Option<RawMouseCallback>) -> bool {
    let Some(filter) = camhook_core::filter() else {
        return false;
    };

    match callback {
        Some(callback) => filter.set_raw_mouse_sink(move |block| callback(block.as_ptr(), block.len())),
        None => filter.clear_raw_mouse_sink(),
    }
    true
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
