//! Raw input access
//!
//! `WM_INPUT` carries only a handle. The payload is read with a two-step
//! protocol: ask for the block size, then fetch exactly that many bytes. A
//! read that returns any other count is treated as unusable.

use camhook_sdk::messages::{HID_USAGE_GENERIC_MOUSE, HID_USAGE_PAGE_GENERIC};

/// Source of raw input payloads
pub trait RawInputSource: Send + Sync {
    /// Size in bytes of the raw input block behind `handle`
    ///
    /// `None` if the handle can't be queried.
    fn payload_size(&self, handle: isize) -> Option<u32>;

    /// Copy the block behind `handle` into `buf`
    ///
    /// Returns the number of bytes written, or `u32::MAX` on failure.
    fn read_payload(&self, handle: isize, buf: &mut [u8]) -> u32;
}

/// Outcome of a raw input fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFetch {
    /// The full block, header first
    Complete(Vec<u8>),
    /// Size query failed or the read came back short
    Malformed,
}

/// Read the raw input block behind `handle`
pub fn fetch_raw_input<R: RawInputSource + ?Sized>(source: &R, handle: isize) -> RawFetch {
    let Some(size) = source.payload_size(handle).filter(|&size| size > 0) else {
        return RawFetch::Malformed;
    };

    let mut block = vec![0u8; size as usize];
    let read = source.read_payload(handle, &mut block);
    if read == size {
        RawFetch::Complete(block)
    } else {
        RawFetch::Malformed
    }
}

/// Raw input from the OS (`GetRawInputData`)
///
/// Reports nothing on platforms without raw input.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRawInput;

#[cfg(windows)]
impl RawInputSource for SystemRawInput {
    fn payload_size(&self, handle: isize) -> Option<u32> {
        use windows::Win32::UI::Input::{GetRawInputData, HRAWINPUT, RID_INPUT};

        let mut size = 0u32;
        let result = unsafe {
            GetRawInputData(
                HRAWINPUT(handle as *mut std::ffi::c_void),
                RID_INPUT,
                None,
                &mut size,
                camhook_sdk::RawInputHeader::SIZE,
            )
        };
        (result != u32::MAX).then_some(size)
    }

    fn read_payload(&self, handle: isize, buf: &mut [u8]) -> u32 {
        use windows::Win32::UI::Input::{GetRawInputData, HRAWINPUT, RID_INPUT};

        let mut size = buf.len() as u32;
        unsafe {
            GetRawInputData(
                HRAWINPUT(handle as *mut std::ffi::c_void),
                RID_INPUT,
                Some(buf.as_mut_ptr() as *mut std::ffi::c_void),
                &mut size,
                camhook_sdk::RawInputHeader::SIZE,
            )
        }
    }
}

#[cfg(not(windows))]
impl RawInputSource for SystemRawInput {
    fn payload_size(&self, _handle: isize) -> Option<u32> {
        None
    }

    fn read_payload(&self, _handle: isize, _buf: &mut [u8]) -> u32 {
        u32::MAX
    }
}

/// Error registering for raw mouse input
#[derive(Debug, thiserror::Error)]
pub enum RawInputError {
    #[error("No visible top-level window owned by this process")]
    NoMainWindow,

    #[error("Couldn't register raw input: {0}")]
    Registration(String),
}

/// Register the host's main window for raw mouse input
///
/// Without this the host only receives `WM_INPUT` for devices it registered
/// itself. Returns `Ok(false)` on platforms without raw input.
pub fn register_raw_mouse() -> Result<bool, RawInputError> {
    register_raw_mouse_impl(HID_USAGE_PAGE_GENERIC, HID_USAGE_GENERIC_MOUSE)
}

#[cfg(windows)]
fn register_raw_mouse_impl(usage_page: u16, usage: u16) -> Result<bool, RawInputError> {
    use windows::Win32::UI::Input::{RegisterRawInputDevices, RAWINPUTDEVICE, RAWINPUTDEVICE_FLAGS};

    let hwnd = main_window::find().ok_or(RawInputError::NoMainWindow)?;
    let device = RAWINPUTDEVICE {
        usUsagePage: usage_page,
        usUsage: usage,
        dwFlags: RAWINPUTDEVICE_FLAGS(0),
        hwndTarget: hwnd,
    };

    unsafe {
        RegisterRawInputDevices(&[device], std::mem::size_of::<RAWINPUTDEVICE>() as u32)
    }
    .map_err(|e| RawInputError::Registration(e.to_string()))?;

    tracing::debug!("Raw mouse input registered for {:?}", hwnd);
    Ok(true)
}

#[cfg(not(windows))]
fn register_raw_mouse_impl(_usage_page: u16, _usage: u16) -> Result<bool, RawInputError> {
    Ok(false)
}

#[cfg(windows)]
mod main_window {
    use windows::Win32::Foundation::{BOOL, FALSE, HWND, LPARAM, TRUE};
    use windows::Win32::System::Threading::GetCurrentProcessId;
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowThreadProcessId, IsWindowVisible,
    };

    struct Search {
        process_id: u32,
        found: Option<HWND>,
    }

    unsafe extern "system" fn visit(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let search = &mut *(lparam.0 as *mut Search);

        let mut process_id = 0u32;
        GetWindowThreadProcessId(hwnd, Some(&mut process_id));
        if process_id == search.process_id && IsWindowVisible(hwnd).as_bool() {
            search.found = Some(hwnd);
            return FALSE;
        }
        TRUE
    }

    /// First visible top-level window owned by the current process
    pub(super) fn find() -> Option<HWND> {
        let mut search = Search {
            process_id: unsafe { GetCurrentProcessId() },
            found: None,
        };

        // Stopping the enumeration early reports an error; the result is in `search`
        let _ = unsafe { EnumWindows(Some(visit), LPARAM(&mut search as *mut Search as isize)) };
        search.found
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use camhook_sdk::messages::{RIM_TYPEKEYBOARD, RIM_TYPEMOUSE};
    use camhook_sdk::RawInputHeader;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Raw input source serving one canned block
    pub(crate) struct FakeRawInput {
        block: Option<Vec<u8>>,
        shortfall: u32,
        reads: AtomicUsize,
    }

    impl FakeRawInput {
        /// Every size query fails
        pub(crate) fn empty() -> Self {
            Self {
                block: None,
                shortfall: 0,
                reads: AtomicUsize::new(0),
            }
        }

        fn with_type(device_type: u32) -> Self {
            let mut block = vec![0u8; RawInputHeader::SIZE as usize + 24];
            block[..4].copy_from_slice(&device_type.to_ne_bytes());
            Self {
                block: Some(block),
                shortfall: 0,
                reads: AtomicUsize::new(0),
            }
        }

        pub(crate) fn mouse_block() -> Self {
            Self::with_type(RIM_TYPEMOUSE)
        }

        pub(crate) fn keyboard_block() -> Self {
            Self::with_type(RIM_TYPEKEYBOARD)
        }

        /// Reads report `bytes` fewer than the queried size
        pub(crate) fn short_by(mut self, bytes: u32) -> Self {
            self.shortfall = bytes;
            self
        }

        pub(crate) fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl RawInputSource for FakeRawInput {
        fn payload_size(&self, _handle: isize) -> Option<u32> {
            self.block.as_ref().map(|b| b.len() as u32)
        }

        fn read_payload(&self, _handle: isize, buf: &mut [u8]) -> u32 {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let Some(block) = &self.block else {
                return u32::MAX;
            };
            let len = block.len().min(buf.len());
            buf[..len].copy_from_slice(&block[..len]);
            len as u32 - self.shortfall
        }
    }

    #[test]
    fn test_complete_fetch() {
        let source = FakeRawInput::mouse_block();
        match fetch_raw_input(&source, 0x10) {
            RawFetch::Complete(block) => {
                assert_eq!(RawInputHeader::device_type(&block), Some(RIM_TYPEMOUSE));
            }
            RawFetch::Malformed => panic!("expected a complete block"),
        }
    }

    #[test]
    fn test_size_mismatch_is_malformed() {
        let source = FakeRawInput::mouse_block().short_by(1);
        assert_eq!(fetch_raw_input(&source, 0x10), RawFetch::Malformed);
        assert_eq!(source.reads(), 1);
    }

    #[test]
    fn test_failed_size_query_skips_read() {
        let source = FakeRawInput::empty();
        assert_eq!(fetch_raw_input(&source, 0x10), RawFetch::Malformed);
        assert_eq!(source.reads(), 0);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_no_raw_input_off_windows() {
        assert_eq!(fetch_raw_input(&SystemRawInput, 0x10), RawFetch::Malformed);
        assert!(!register_raw_mouse().unwrap());
    }
}
