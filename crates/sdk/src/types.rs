//! Win32 input record layouts
//!
//! Field order and widths match `MSG`, `RAWINPUTHEADER` and `XINPUT_STATE`
//! from the Windows SDK headers. The host hands us pointers to these, so
//! the layouts must not drift.

use std::ffi::c_void;

/// Window handle (`HWND`)
pub type Hwnd = *mut c_void;

/// Win32 `BOOL`
pub type Bool = i32;

pub const FALSE: Bool = 0;
pub const TRUE: Bool = 1;

/// `ERROR_SUCCESS`, returned by XInputGetState for a connected controller
pub const ERROR_SUCCESS: u32 = 0;

/// `ERROR_DEVICE_NOT_CONNECTED`
pub const ERROR_DEVICE_NOT_CONNECTED: u32 = 1167;

/// Screen coordinate (`POINT`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Queued window message (`MSG`)
///
/// Owned by the host's message loop. Detours get temporary mutable access
/// for the duration of a single retrieval call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Msg {
    pub hwnd: Hwnd,
    pub message: u32,
    pub w_param: usize,
    pub l_param: isize,
    pub time: u32,
    pub pt: Point,
}

impl Msg {
    /// Build a message addressed to `hwnd`
    pub fn new(hwnd: Hwnd, message: u32, w_param: usize, l_param: isize) -> Self {
        Self {
            hwnd,
            message,
            w_param,
            l_param,
            time: 0,
            pt: Point::default(),
        }
    }

    /// True if the message has a destination window
    pub fn has_window(&self) -> bool {
        !self.hwnd.is_null()
    }
}

impl Default for Msg {
    fn default() -> Self {
        Self::new(std::ptr::null_mut(), 0, 0, 0)
    }
}

/// Header preceding every raw input block (`RAWINPUTHEADER`)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInputHeader {
    pub dw_type: u32,
    pub dw_size: u32,
    pub h_device: *mut c_void,
    pub w_param: usize,
}

impl RawInputHeader {
    /// Size passed as `cbSizeHeader` to GetRawInputData
    pub const SIZE: u32 = std::mem::size_of::<RawInputHeader>() as u32;

    /// Read the device type from the front of a fetched raw input block
    ///
    /// Returns `None` if the block is too short to hold a header.
    pub fn device_type(block: &[u8]) -> Option<u32> {
        if block.len() < Self::SIZE as usize {
            return None;
        }
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&block[..4]);
        Some(u32::from_ne_bytes(tag))
    }
}

/// Gamepad portion of an XInput state (`XINPUT_GAMEPAD`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XInputGamepad {
    pub w_buttons: u16,
    pub b_left_trigger: u8,
    pub b_right_trigger: u8,
    pub s_thumb_lx: i16,
    pub s_thumb_ly: i16,
    pub s_thumb_rx: i16,
    pub s_thumb_ry: i16,
}

/// Point-in-time controller state (`XINPUT_STATE`)
///
/// `Default` is the all-zero state: sticks centered, triggers released,
/// no buttons held.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XInputState {
    pub dw_packet_number: u32,
    pub gamepad: XInputGamepad,
}

impl XInputState {
    /// True if every field is zero
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn test_xinput_layout() {
        assert_eq!(mem::size_of::<XInputGamepad>(), 12);
        assert_eq!(mem::size_of::<XInputState>(), 16);
    }

    #[test]
    fn test_msg_layout() {
        #[cfg(target_pointer_width = "64")]
        assert_eq!(mem::size_of::<Msg>(), 48);
        #[cfg(target_pointer_width = "32")]
        assert_eq!(mem::size_of::<Msg>(), 28);
    }

    #[test]
    fn test_raw_header_device_type() {
        let mut block = vec![0u8; RawInputHeader::SIZE as usize + 8];
        block[..4].copy_from_slice(&2u32.to_ne_bytes());
        assert_eq!(RawInputHeader::device_type(&block), Some(2));
        assert_eq!(RawInputHeader::device_type(&block[..3]), None);
    }
}
