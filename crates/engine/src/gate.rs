//! Enablement gate
//!
//! Two independent process-wide flags written by the camera logic and read by
//! the interception policy: whether the free camera is active (gates event
//! classification) and whether input to the host should currently be blocked.
//! Camera and blocking are separate axes; either may be set without the other.
//!
//! The gate also remembers which controller state buffer belongs to the tool
//! itself, so the XInput detour can tell the tool's own polls apart from the
//! host's.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Opaque identity of a controller state buffer
///
/// Compared by equality only. Never dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferToken(usize);

impl BufferToken {
    /// Identity of the buffer at `buffer`
    pub fn of<T>(buffer: *const T) -> Self {
        Self(buffer as usize)
    }

    fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Process-wide enablement flags
#[derive(Debug, Default)]
pub struct EnablementGate {
    camera_enabled: AtomicBool,
    input_blocked: AtomicBool,
    /// Zero while no buffer is registered
    own_controller_buffer: AtomicUsize,
}

impl EnablementGate {
    /// Gate with the camera off, input unblocked and no registered buffer
    pub const fn new() -> Self {
        Self {
            camera_enabled: AtomicBool::new(false),
            input_blocked: AtomicBool::new(false),
            own_controller_buffer: AtomicUsize::new(0),
        }
    }

    /// Whether the free camera is currently active
    pub fn camera_enabled(&self) -> bool {
        self.camera_enabled.load(Ordering::Relaxed)
    }

    pub fn set_camera_enabled(&self, enabled: bool) {
        self.camera_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether input delivery to the host should be suppressed
    pub fn input_blocked(&self) -> bool {
        self.input_blocked.load(Ordering::Relaxed)
    }

    pub fn set_input_blocked(&self, blocked: bool) {
        self.input_blocked.store(blocked, Ordering::Relaxed);
    }

    /// Flip the blocking flag, returning the new value
    pub fn toggle_input_blocked(&self) -> bool {
        !self.input_blocked.fetch_xor(true, Ordering::Relaxed)
    }

    /// Register (or clear) the tool's own controller polling buffer
    pub fn set_own_controller_buffer(&self, token: Option<BufferToken>) {
        let raw = token.map(|t| t.0).unwrap_or(0);
        self.own_controller_buffer.store(raw, Ordering::Relaxed);
    }

    /// True if `token` identifies the tool's own polling buffer
    pub fn owns_controller_buffer(&self, token: BufferToken) -> bool {
        if token.is_null() {
            return false;
        }
        self.own_controller_buffer.load(Ordering::Relaxed) == token.0
    }
}
