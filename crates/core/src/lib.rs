//! camhook - Core Logic
//!
//! Startup and shutdown of the input interception layer injected alongside
//! a free camera tool.
//!
//! # Re-exports
//!
//! This crate re-exports the SDK and engine crates for convenience:
//! - [`sdk`] - Win32 input record layouts, message codes and API signatures
//! - [`engine`] - Export resolution and the process-wide enablement gate

use parking_lot::Mutex;
use tracing::{info, warn};

pub use camhook_engine as engine;
pub use camhook_sdk as sdk;

pub mod config;
pub mod hooks;
pub mod input;

pub use config::{ConfigError, ConfigResult, CoreConfig};
pub use hooks::{
    HookError, HookTarget, InlineHookKey, InlineHookRegistry, SubstitutionRegistry,
};
pub use input::{
    filter, install_filter, install_input_hooks, InputFilter, InstallReport, RawMouseSink,
    Removal, SystemRawInput,
};

struct Started {
    registry: InlineHookRegistry,
    report: InstallReport,
}

static STARTED: Mutex<Option<Started>> = Mutex::new(None);

/// Install the input hooks described by `config`
///
/// Seeds the blocked flag, installs the process-wide filter over the
/// engine's gate, then registers and activates every detour. Calling this
/// again while started returns the first report and installs nothing.
pub fn start(config: &CoreConfig) -> InstallReport {
    let mut started = STARTED.lock();
    if let Some(state) = started.as_ref() {
        warn!("camhook already started; ignoring repeated start");
        return state.report.clone();
    }

    info!("camhook starting (xinput module: {})", config.xinput_module);

    let gate = engine::gate();
    gate.set_input_blocked(config.block_input_on_start);

    // The filter is installed once and outlives a shutdown
    if install_filter(InputFilter::new(gate.clone(), SystemRawInput)) {
        tracing::debug!("Installed input filter");
    }

    let mut registry = InlineHookRegistry::default();
    let report = install_input_hooks(&mut registry, config);

    if config.register_raw_mouse {
        match input::register_raw_mouse() {
            Ok(true) => info!("Registered for raw mouse input"),
            Ok(false) => tracing::debug!("Raw mouse registration not available"),
            Err(e) => warn!("Raw mouse registration failed: {}", e),
        }
    }

    info!(
        "camhook started: {} hooks installed, {} failed",
        report.installed.len(),
        report.failed.len()
    );

    *started = Some(Started {
        registry,
        report: report.clone(),
    });
    report
}

/// Whether [`start`] has run without a matching [`shutdown`]
pub fn is_started() -> bool {
    STARTED.lock().is_some()
}

/// Restore every hooked function and release the host's input
///
/// Hook entries are dropped along with the restored bytes, so a later
/// [`start`] hooks the same functions afresh. Original slots are left
/// pointing at the old trampolines until that start overwrites them, since
/// a detour entered just before the restore still calls through them.
///
/// Called from the FFI layer when the tool unloads.
pub fn shutdown() {
    info!("camhook shutting down...");

    let Some(mut state) = STARTED.lock().take() else {
        return;
    };

    if let Err(e) = state.registry.remove_all() {
        warn!("Failed to restore hooked functions: {}", e);
    }

    let gate = engine::gate();
    gate.set_camera_enabled(false);
    gate.set_input_blocked(false);
    gate.set_own_controller_buffer(None);

    if let Some(filter) = filter() {
        filter.clear_raw_mouse_sink();
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_sdk_types_exist() {
        // Verify SDK types are accessible through the re-export
        use crate::sdk::{Msg, XInputState};
        assert!(XInputState::default().is_neutral());
        assert!(!Msg::default().has_window());
    }

    #[test]
    fn test_shutdown_without_start() {
        assert!(!crate::is_started());
        crate::shutdown();
        assert!(!crate::is_started());
    }
}
