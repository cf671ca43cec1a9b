//! Message neutralization

use camhook_sdk::messages::WM_NULL;
use camhook_sdk::Msg;

/// Rewrite `msg` into `WM_NULL` in place
///
/// Only the message code changes. Window, parameters, time and cursor
/// position are left as retrieved, so the host's loop still sees one
/// message per retrieval and dispatches it as a no-op.
pub fn neutralize(msg: &mut Msg) {
    msg.message = WM_NULL;
}

#[cfg(test)]
mod tests {
    use super::*;
    use camhook_sdk::messages::{WM_KEYDOWN, WM_LBUTTONDOWN};
    use camhook_sdk::{Hwnd, Point};

    fn sample(message: u32) -> Msg {
        Msg {
            hwnd: 0x0002_0010 as Hwnd,
            message,
            w_param: 0x41,
            l_param: 0x001E_0001,
            time: 123_456,
            pt: Point { x: 640, y: 360 },
        }
    }

    #[test]
    fn test_only_message_code_changes() {
        let mut msg = sample(WM_KEYDOWN);
        neutralize(&mut msg);

        let expected = Msg {
            message: WM_NULL,
            ..sample(WM_KEYDOWN)
        };
        assert_eq!(msg, expected);
    }

    #[test]
    fn test_idempotent() {
        let mut once = sample(WM_LBUTTONDOWN);
        neutralize(&mut once);

        let mut twice = sample(WM_LBUTTONDOWN);
        neutralize(&mut twice);
        neutralize(&mut twice);

        assert_eq!(once, twice);
        assert_eq!(twice.message, WM_NULL);
    }
}
