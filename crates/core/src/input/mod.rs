//! Input interception
//!
//! The host retrieves window messages and polls controllers through five
//! OS entry points. Each is detoured; the detour calls the real function and
//! then hands the result to an [`InputFilter`], which decides whether the
//! host gets to see it.
//!
//! - [`classify`] - is a retrieved message input the host should not see
//! - [`neutralize`] - turn a hidden message into `WM_NULL` in place
//! - [`raw`] - two-step raw input fetch and raw mouse registration
//! - [`substitute`] - per-API policy run after the original returns
//! - [`detours`] - the `extern "system"` entry points and their installation

pub mod classify;
pub mod detours;
pub mod neutralize;
pub mod raw;
pub mod substitute;

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use camhook_engine::EnablementGate;

pub use classify::{is_input_message, INPUT_MESSAGES};
pub use detours::{install_input_hooks, InstallReport};
pub use neutralize::neutralize;
pub use raw::{fetch_raw_input, register_raw_mouse, RawFetch, RawInputSource, SystemRawInput};
pub use substitute::Removal;

/// Receives complete raw mouse input blocks, header included
pub type RawMouseSink = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Suppression policy for retrieved input
///
/// Holds the enablement gate it consults instead of reading globals, so
/// tests can run filters side by side with their own gates.
pub struct InputFilter<R = SystemRawInput> {
    gate: Arc<EnablementGate>,
    raw_input: R,
    raw_mouse_sink: RwLock<Option<RawMouseSink>>,
}

impl<R: RawInputSource> InputFilter<R> {
    pub fn new(gate: Arc<EnablementGate>, raw_input: R) -> Self {
        Self {
            gate,
            raw_input,
            raw_mouse_sink: RwLock::new(None),
        }
    }

    /// The gate this filter consults
    pub fn gate(&self) -> &EnablementGate {
        &self.gate
    }

    /// Forward complete raw mouse blocks to `sink` (replacing any previous sink)
    ///
    /// The sink runs on the host's message loop thread and must not block.
    pub fn set_raw_mouse_sink<F>(&self, sink: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        *self.raw_mouse_sink.write() = Some(Box::new(sink));
    }

    /// Stop forwarding raw mouse blocks
    pub fn clear_raw_mouse_sink(&self) {
        *self.raw_mouse_sink.write() = None;
    }
}

static FILTER: OnceLock<InputFilter> = OnceLock::new();

/// Install the process-wide filter used by the detours
///
/// Returns `false` if a filter was already installed; the first one stays.
pub fn install_filter(filter: InputFilter) -> bool {
    FILTER.set(filter).is_ok()
}

/// The process-wide filter, if installed
pub fn filter() -> Option<&'static InputFilter> {
    FILTER.get()
}
