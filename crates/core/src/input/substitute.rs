//! Policy applied after each intercepted call returns
//!
//! Every entry point calls the original exactly once, first, with the
//! caller's arguments. Only what comes back is altered: a retrieved message
//! may be neutralized, a polled controller state may be zeroed. The return
//! value is always the original's.

use camhook_engine::BufferToken;
use camhook_sdk::messages::PM_REMOVE;
use camhook_sdk::{Bool, Msg, XInputState, FALSE};

use super::neutralize::neutralize;
use super::raw::RawInputSource;
use super::InputFilter;

/// Whether a retrieval takes the message off the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Remove,
    Keep,
}

impl Removal {
    /// Removal requested by a PeekMessage `wRemoveMsg` argument
    pub fn from_peek_flags(flags: u32) -> Self {
        if flags & PM_REMOVE != 0 {
            Removal::Remove
        } else {
            Removal::Keep
        }
    }
}

impl<R: RawInputSource> InputFilter<R> {
    /// Apply suppression to a message just retrieved by the host
    ///
    /// Messages are only touched as they leave the queue. A peek that leaves
    /// the message queued must see it unchanged, or a later removal would
    /// classify an already rewritten message.
    ///
    /// Returns `true` if the message was neutralized.
    pub fn process_retrieved(&self, msg: &mut Msg, removal: Removal) -> bool {
        if removal == Removal::Keep || !msg.has_window() || !self.should_hide(msg) {
            return false;
        }

        // Blocking is read now, not at classification, and may have changed since
        if !self.gate.input_blocked() {
            return false;
        }

        tracing::trace!("Blocking message {:#06x} for {:p}", msg.message, msg.hwnd);
        neutralize(msg);
        true
    }

    /// GetMessage policy
    ///
    /// `original` must perform the real call with the caller's arguments.
    ///
    /// # Safety
    /// `msg` must be the pointer passed to the real call: null, or valid for
    /// writes once `original` returns.
    pub unsafe fn on_get_message<F>(&self, msg: *mut Msg, original: F) -> Bool
    where
        F: FnOnce() -> Bool,
    {
        let result = original();

        // 0 is WM_QUIT and -1 an error with nothing retrieved; neither is ours
        if result == FALSE || result == -1 {
            return result;
        }

        if let Some(msg) = msg.as_mut() {
            self.process_retrieved(msg, Removal::Remove);
        }
        result
    }

    /// PeekMessage policy
    ///
    /// # Safety
    /// Same contract as [`on_get_message`](Self::on_get_message).
    pub unsafe fn on_peek_message<F>(&self, msg: *mut Msg, remove_flags: u32, original: F) -> Bool
    where
        F: FnOnce() -> Bool,
    {
        let result = original();
        if result == FALSE {
            return result;
        }

        if let Some(msg) = msg.as_mut() {
            self.process_retrieved(msg, Removal::from_peek_flags(remove_flags));
        }
        result
    }

    /// XInputGetState policy
    ///
    /// The real controller is read on every call. Polls into the tool's own
    /// buffer always see real input; anyone else gets an idle controller
    /// while input is blocked.
    ///
    /// # Safety
    /// `state` must be the pointer passed to the real call: null, or valid
    /// for writes once `original` returns.
    pub unsafe fn on_get_state<F>(&self, state: *mut XInputState, original: F) -> u32
    where
        F: FnOnce() -> u32,
    {
        let result = original();

        if self.gate.owns_controller_buffer(BufferToken::of(state)) {
            return result;
        }

        if self.gate.input_blocked() {
            if let Some(state) = state.as_mut() {
                *state = XInputState::default();
            }
        }
        result
    }
}
