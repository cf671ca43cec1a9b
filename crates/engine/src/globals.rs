//! Process-wide state
//!
//! The camera logic and the detours share a single gate for the lifetime of
//! the host process. Code that can take an explicit gate (the input filter,
//! tests) should; the accessors here exist for the FFI boundary and for the
//! detours, which cannot carry context.

use std::sync::{Arc, LazyLock};

use crate::gate::EnablementGate;

static GATE: LazyLock<Arc<EnablementGate>> = LazyLock::new(|| Arc::new(EnablementGate::new()));

/// The process-wide enablement gate
pub fn gate() -> &'static Arc<EnablementGate> {
    &GATE
}

/// Whether the free camera is currently active
pub fn is_camera_enabled() -> bool {
    GATE.camera_enabled()
}

/// Whether input to the host is currently blocked
pub fn is_input_blocked() -> bool {
    GATE.input_blocked()
}
