//! Intercepted entry points
//!
//! Module and export names must match what the system DLLs export.
//! Signatures use the `system` ABI (`WINAPI`).

use crate::types::{Bool, Hwnd, Msg, XInputState};

/// Module exporting the message retrieval functions
pub const USER32: &str = "user32";

/// XInput module loaded by most DirectX titles of the era
pub const XINPUT_DEFAULT: &str = "xinput9_1_0";

pub const GET_MESSAGE_A: &str = "GetMessageA";
pub const GET_MESSAGE_W: &str = "GetMessageW";
pub const PEEK_MESSAGE_A: &str = "PeekMessageA";
pub const PEEK_MESSAGE_W: &str = "PeekMessageW";
pub const XINPUT_GET_STATE: &str = "XInputGetState";

/// `GetMessageA` / `GetMessageW`
pub type GetMessageFn =
    unsafe extern "system" fn(msg: *mut Msg, hwnd: Hwnd, filter_min: u32, filter_max: u32) -> Bool;

/// `PeekMessageA` / `PeekMessageW`
pub type PeekMessageFn = unsafe extern "system" fn(
    msg: *mut Msg,
    hwnd: Hwnd,
    filter_min: u32,
    filter_max: u32,
    remove: u32,
) -> Bool;

/// `XInputGetState`
pub type XInputGetStateFn = unsafe extern "system" fn(user_index: u32, state: *mut XInputState) -> u32;

