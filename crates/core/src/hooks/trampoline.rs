//! Trampoline memory allocation
//!
//! Hands out executable memory within ±2GB of a hook target, so the target
//! can reach its relay with a 5-byte `jmp rel32` and relocated RIP-relative
//! operands stay encodable.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ptr::NonNull;

/// Page size (4KB on most systems)
const PAGE_SIZE: usize = 4096;

/// Trampolines are carved on this boundary
const SLOT_ALIGN: usize = 16;

/// Maximum distance reachable by a rel32 displacement, minus a page of slack
const MAX_RANGE: usize = 0x7FFF_0000;

/// Distance between probe addresses when searching for a free region
const PROBE_STEP: usize = PAGE_SIZE * 64;

static ALLOCATOR: Mutex<TrampolineAllocator> = Mutex::new(TrampolineAllocator::new());

struct TrampolineAllocator {
    /// Pages allocated, keyed by base address
    pages: BTreeMap<usize, PageInfo>,
}

struct PageInfo {
    base: *mut u8,
    used: usize,
}

// SAFETY: Pages are only touched while holding the allocator mutex
unsafe impl Send for PageInfo {}

/// True if `a` and `b` are close enough for a rel32 displacement
pub fn within_rel32(a: usize, b: usize) -> bool {
    a.abs_diff(b) < MAX_RANGE
}

impl TrampolineAllocator {
    const fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    fn alloc_near(&mut self, target: usize, size: usize) -> Option<NonNull<u8>> {
        let size = size.next_multiple_of(SLOT_ALIGN);
        if size > PAGE_SIZE {
            return None;
        }

        for (&base, page) in &mut self.pages {
            if within_rel32(base, target) && page.used + size <= PAGE_SIZE {
                let ptr = unsafe { page.base.add(page.used) };
                page.used += size;
                return NonNull::new(ptr);
            }
        }

        let base = self.alloc_page_near(target)?;
        self.pages.insert(base as usize, PageInfo { base, used: size });
        NonNull::new(base)
    }

    /// Give back `size` bytes at `ptr` if they are the last carved from their page
    fn release(&mut self, ptr: usize, size: usize) -> bool {
        let size = size.next_multiple_of(SLOT_ALIGN);
        let Some((_, page)) = self.pages.range_mut(..=ptr).next_back() else {
            return false;
        };

        let base = page.base as usize;
        if page.used >= size && base + page.used - size == ptr {
            page.used -= size;
            true
        } else {
            false
        }
    }

    #[cfg(unix)]
    fn alloc_page_near(&mut self, target: usize) -> Option<*mut u8> {
        use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};
        use std::num::NonZeroUsize;

        let length = NonZeroUsize::new(PAGE_SIZE)?;
        let prot = ProtFlags::PROT_READ | ProtFlags::PROT_WRITE | ProtFlags::PROT_EXEC;
        let flags = MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS;

        let search_start = target.saturating_sub(MAX_RANGE) & !(PAGE_SIZE - 1);
        let search_end = target.saturating_add(MAX_RANGE);

        for hint in (search_start..search_end).step_by(PROBE_STEP) {
            let Some(hint) = NonZeroUsize::new(hint) else {
                continue;
            };

            // The hint is advisory; the kernel may place the mapping elsewhere
            let Ok(ptr) = (unsafe { mmap_anonymous(Some(hint), length, prot, flags) }) else {
                continue;
            };

            if within_rel32(ptr.as_ptr() as usize, target) {
                return Some(ptr.as_ptr() as *mut u8);
            }

            unsafe {
                let _ = munmap(ptr, PAGE_SIZE);
            }
        }

        tracing::error!("Failed to allocate trampoline page near {:x}", target);
        None
    }

    #[cfg(windows)]
    fn alloc_page_near(&mut self, target: usize) -> Option<*mut u8> {
        use windows::Win32::System::Memory::{
            VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE,
            PAGE_EXECUTE_READWRITE,
        };

        /// VirtualAlloc rounds reservations down to this granularity
        const ALLOCATION_GRANULARITY: usize = 0x1_0000;

        let search_start = target.saturating_sub(MAX_RANGE) & !(ALLOCATION_GRANULARITY - 1);
        let search_end = target.saturating_add(MAX_RANGE);

        for hint in (search_start..search_end).step_by(PROBE_STEP) {
            if hint == 0 {
                continue;
            }

            let result = unsafe {
                VirtualAlloc(
                    Some(hint as *const std::ffi::c_void),
                    PAGE_SIZE,
                    MEM_COMMIT | MEM_RESERVE,
                    PAGE_EXECUTE_READWRITE,
                )
            };

            if result.is_null() {
                continue;
            }

            if within_rel32(result as usize, target) {
                return Some(result as *mut u8);
            }

            unsafe {
                let _ = VirtualFree(result, 0, MEM_RELEASE);
            }
        }

        tracing::error!("Failed to allocate trampoline page near {:x}", target);
        None
    }
}

/// Allocate `size` bytes of executable memory near `target`
///
/// Trampolines are never freed; hooks live for the process lifetime.
pub fn alloc_trampoline(target: *const u8, size: usize) -> Option<NonNull<u8>> {
    ALLOCATOR.lock().alloc_near(target as usize, size)
}

/// Return a trampoline that was never handed to a hook
///
/// Only the most recent allocation in a page can be reclaimed; anything
/// else stays reserved.
pub fn release_trampoline(ptr: NonNull<u8>, size: usize) {
    if !ALLOCATOR.lock().release(ptr.as_ptr() as usize, size) {
        tracing::debug!("Trampoline at {:p} not reclaimed", ptr);
    }
}
