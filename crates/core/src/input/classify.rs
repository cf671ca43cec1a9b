//! Message classification
//!
//! Decides whether a retrieved message is input the host should not see
//! while the free camera is active.

use camhook_sdk::messages::*;
use camhook_sdk::{Msg, RawInputHeader};

use super::raw::{fetch_raw_input, RawFetch, RawInputSource};
use super::InputFilter;

/// Keyboard and mouse messages hidden whenever the camera is active
///
/// `WM_INPUT` is not listed: it is hidden too, but only after its raw
/// payload has been fetched.
pub const INPUT_MESSAGES: [u32; 37] = [
    WM_KEYDOWN,
    WM_KEYUP,
    WM_CAPTURECHANGED,
    WM_MOUSEACTIVATE,
    WM_NCHITTEST,
    WM_MOUSEMOVE,
    WM_MOUSEHOVER,
    WM_MOUSELEAVE,
    WM_MOUSEWHEEL,
    WM_MOUSEHWHEEL,
    WM_LBUTTONDOWN,
    WM_LBUTTONUP,
    WM_LBUTTONDBLCLK,
    WM_RBUTTONDOWN,
    WM_RBUTTONUP,
    WM_RBUTTONDBLCLK,
    WM_MBUTTONDOWN,
    WM_MBUTTONUP,
    WM_MBUTTONDBLCLK,
    WM_XBUTTONDOWN,
    WM_XBUTTONUP,
    WM_XBUTTONDBLCLK,
    WM_NCMOUSEMOVE,
    WM_NCMOUSEHOVER,
    WM_NCMOUSELEAVE,
    WM_NCLBUTTONDOWN,
    WM_NCLBUTTONUP,
    WM_NCLBUTTONDBLCLK,
    WM_NCRBUTTONDOWN,
    WM_NCRBUTTONUP,
    WM_NCRBUTTONDBLCLK,
    WM_NCMBUTTONDOWN,
    WM_NCMBUTTONUP,
    WM_NCMBUTTONDBLCLK,
    WM_NCXBUTTONDOWN,
    WM_NCXBUTTONUP,
    WM_NCXBUTTONDBLCLK,
];

/// True for the keyboard and mouse messages in [`INPUT_MESSAGES`]
pub fn is_input_message(message: u32) -> bool {
    INPUT_MESSAGES.contains(&message)
}

impl<R: RawInputSource> InputFilter<R> {
    /// Should `msg` be hidden from the host?
    ///
    /// Always `false` while the camera is disabled or when the message has
    /// no destination window. A `WM_INPUT` message is hidden even when its
    /// payload can't be read.
    pub fn should_hide(&self, msg: &Msg) -> bool {
        if !msg.has_window() || !self.gate.camera_enabled() {
            return false;
        }

        match msg.message {
            WM_INPUT => {
                self.consume_raw_input(msg.l_param);
                true
            }
            message => is_input_message(message),
        }
    }

    fn consume_raw_input(&self, handle: isize) {
        let block = match fetch_raw_input(&self.raw_input, handle) {
            RawFetch::Complete(block) => block,
            RawFetch::Malformed => {
                tracing::trace!("Discarding short raw input read for {:x}", handle);
                return;
            }
        };

        if RawInputHeader::device_type(&block) != Some(RIM_TYPEMOUSE) {
            return;
        }

        if let Some(sink) = self.raw_mouse_sink.read().as_ref() {
            sink(&block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::raw::tests::FakeRawInput;
    use camhook_engine::EnablementGate;
    use camhook_sdk::Hwnd;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn window() -> Hwnd {
        0x0001_0042 as Hwnd
    }

    fn filter_with_camera(enabled: bool, raw: FakeRawInput) -> InputFilter<FakeRawInput> {
        let gate = Arc::new(EnablementGate::new());
        gate.set_camera_enabled(enabled);
        InputFilter::new(gate, raw)
    }

    #[test]
    fn test_hidden_set_with_camera_enabled() {
        let filter = filter_with_camera(true, FakeRawInput::empty());

        for message in 0..=0x03FFu32 {
            if message == WM_INPUT {
                continue;
            }
            let msg = Msg::new(window(), message, 0, 0);
            assert_eq!(
                filter.should_hide(&msg),
                INPUT_MESSAGES.contains(&message),
                "message {:#06x}",
                message
            );
        }
    }

    #[test]
    fn test_nothing_hidden_with_camera_disabled() {
        let filter = filter_with_camera(false, FakeRawInput::mouse_block());

        for message in 0..=0x03FFu32 {
            let msg = Msg::new(window(), message, 0, 0);
            assert!(!filter.should_hide(&msg), "message {:#06x}", message);
        }
        assert_eq!(filter.raw_input.reads(), 0);
    }

    #[test]
    fn test_null_window_passes_through() {
        let filter = filter_with_camera(true, FakeRawInput::mouse_block());

        for &message in INPUT_MESSAGES.iter().chain(&[WM_INPUT]) {
            let msg = Msg::new(std::ptr::null_mut(), message, 0, 0);
            assert!(!filter.should_hide(&msg));
        }
        assert_eq!(filter.raw_input.reads(), 0);
    }

    #[test]
    fn test_common_messages_pass_through() {
        let filter = filter_with_camera(true, FakeRawInput::empty());

        for message in [WM_NULL, WM_PAINT, WM_QUIT, WM_TIMER, WM_CHAR, WM_SYSKEYDOWN, WM_SYSKEYUP] {
            assert!(!filter.should_hide(&Msg::new(window(), message, 0, 0)));
        }
    }

    #[test]
    fn test_raw_mouse_forwarded_to_sink() {
        let filter = filter_with_camera(true, FakeRawInput::mouse_block());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        filter.set_raw_mouse_sink(move |block| {
            assert_eq!(RawInputHeader::device_type(block), Some(RIM_TYPEMOUSE));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(filter.should_hide(&Msg::new(window(), WM_INPUT, 0, 0x77)));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(filter.raw_input.reads(), 1);
    }

    #[test]
    fn test_raw_keyboard_hidden_but_not_forwarded() {
        let filter = filter_with_camera(true, FakeRawInput::keyboard_block());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        filter.set_raw_mouse_sink(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(filter.should_hide(&Msg::new(window(), WM_INPUT, 0, 0x77)));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_short_raw_read_still_hidden() {
        let filter = filter_with_camera(true, FakeRawInput::mouse_block().short_by(4));
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        filter.set_raw_mouse_sink(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(filter.should_hide(&Msg::new(window(), WM_INPUT, 0, 0x77)));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unqueryable_raw_input_still_hidden() {
        let filter = filter_with_camera(true, FakeRawInput::empty());
        assert!(filter.should_hide(&Msg::new(window(), WM_INPUT, 0, 0x77)));
    }
}
