//! Inline function hooks built on iced-x86
//!
//! A hook steals the whole instructions covering the first 5 bytes of the
//! target, relocates them into a trampoline near the target and replaces them
//! with a `jmp rel32` to a relay that jumps on to the detour. Calling the
//! trampoline runs the original function.
//!
//! Trampoline layout:
//! ```text
//! [relocated prologue][jmp abs -> target + stolen][relay: jmp abs -> detour]
//! ```
//!
//! Hooks are created disabled and patched in batches with
//! [`enable_inline_hooks`], so a set of related hooks goes live together.

use iced_x86::{
    BlockEncoder, BlockEncoderOptions, Decoder, DecoderOptions, FlowControl, Instruction,
    InstructionBlock,
};
use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use camhook_engine::ResolveError;

use super::trampoline::{alloc_trampoline, release_trampoline, within_rel32};

new_key_type! {
    /// Handle for an inline hook
    pub struct InlineHookKey;
}

/// Length of the `jmp rel32` written over the target
const PATCH_LEN: usize = 5;

/// Length of `jmp [rip+0]` followed by the 64-bit destination
const ABS_JMP_LEN: usize = 14;

/// Bytes examined at the target when stealing the prologue
const MAX_PROLOGUE: usize = 32;

/// Bytes reserved per trampoline
const TRAMPOLINE_SIZE: usize = 96;

/// Error type for hook operations
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Failed to resolve target: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Invalid address: {0:x}")]
    InvalidAddress(usize),

    #[error("Target already hooked: {0:x}")]
    AlreadyHooked(usize),

    #[error("Failed to decode instruction at {0:x}")]
    Decode(usize),

    #[error("Not enough space at target for hook: {0:x}")]
    NotEnoughSpace(usize),

    #[error("Instruction relocation failed: {0}")]
    RelocationFailed(String),

    #[error("Failed to allocate trampoline near {0:x}")]
    Allocation(usize),

    #[error("Memory protection failed: {0}")]
    MemoryProtection(String),

    #[error("Failed to enable hook: {0}")]
    EnableFailed(String),

    #[error("Failed to disable hook: {0}")]
    DisableFailed(String),

    #[error("Hook not found")]
    NotFound,

    #[error("Inline hooks are only supported on x86_64")]
    UnsupportedArch,
}

/// Internal storage for an inline hook
struct InlineHookEntry {
    /// Debug name
    name: String,

    /// Hooked function address
    target: usize,

    /// Callable original (relocated prologue + jump back)
    trampoline: usize,

    /// `jmp rel32` to the relay
    patch: [u8; PATCH_LEN],

    /// Target bytes overwritten by `patch`
    saved: [u8; PATCH_LEN],

    enabled: bool,
}

static INLINE_HOOKS: LazyLock<RwLock<SlotMap<InlineHookKey, InlineHookEntry>>> =
    LazyLock::new(|| RwLock::new(SlotMap::with_key()));

/// Create a disabled inline hook
///
/// # Safety
/// - `target` must point to the start of a function in executable memory
/// - `detour` must be a function with the same signature and calling convention
///
/// # Returns
/// A key to manage the hook, and a pointer to call the original function.
/// The original pointer is valid immediately, even before the hook is enabled.
pub unsafe fn create_inline_hook(
    name: &str,
    target: *const (),
    detour: *const (),
) -> Result<(InlineHookKey, *const ()), HookError> {
    if !cfg!(target_arch = "x86_64") {
        return Err(HookError::UnsupportedArch);
    }

    let target = target as usize;
    let detour = detour as usize;
    if target == 0 {
        return Err(HookError::InvalidAddress(target));
    }
    if detour == 0 {
        return Err(HookError::InvalidAddress(detour));
    }

    tracing::debug!(
        "Creating inline hook '{}' at {:x} -> {:x}",
        name,
        target,
        detour
    );

    let mut hooks = INLINE_HOOKS.write();
    if hooks.values().any(|e| e.target == target) {
        return Err(HookError::AlreadyHooked(target));
    }

    let stolen = steal_prologue(target)?;
    let stolen_len: usize = stolen.iter().map(|i| i.len()).sum();

    let trampoline = alloc_trampoline(target as *const u8, TRAMPOLINE_SIZE)
        .ok_or(HookError::Allocation(target))?;

    let built = build_trampoline(&stolen, target + stolen_len, detour, trampoline.as_ptr())
        .and_then(|relay| jmp_rel32(target, relay).ok_or(HookError::InvalidAddress(relay)));
    let patch = match built {
        Ok(patch) => patch,
        Err(e) => {
            release_trampoline(trampoline, TRAMPOLINE_SIZE);
            return Err(e);
        }
    };
    let trampoline = trampoline.as_ptr() as usize;

    let mut saved = [0u8; PATCH_LEN];
    std::ptr::copy_nonoverlapping(target as *const u8, saved.as_mut_ptr(), PATCH_LEN);

    let key = hooks.insert(InlineHookEntry {
        name: name.to_string(),
        target,
        trampoline,
        patch,
        saved,
        enabled: false,
    });

    tracing::info!(
        "Created inline hook '{}' at {:x} ({} bytes relocated)",
        name,
        target,
        stolen_len
    );

    Ok((key, trampoline as *const ()))
}

/// Relocate `stolen` into `code`, then append the jump back to `resume` and
/// the relay to `detour`
///
/// Returns the relay address.
///
/// # Safety
/// `code` must be writable for [`TRAMPOLINE_SIZE`] bytes.
unsafe fn build_trampoline(
    stolen: &[Instruction],
    resume: usize,
    detour: usize,
    code: *mut u8,
) -> Result<usize, HookError> {
    let relocated = BlockEncoder::encode(
        64,
        InstructionBlock::new(stolen, code as u64),
        BlockEncoderOptions::NONE,
    )
    .map_err(|e| HookError::RelocationFailed(e.to_string()))?
    .code_buffer;

    if relocated.len() + 2 * ABS_JMP_LEN > TRAMPOLINE_SIZE {
        let target = stolen.first().map_or(resume, |i| i.ip() as usize);
        return Err(HookError::NotEnoughSpace(target));
    }

    std::ptr::copy_nonoverlapping(relocated.as_ptr(), code, relocated.len());
    let back = code.add(relocated.len());
    std::ptr::copy_nonoverlapping(jmp_abs(resume).as_ptr(), back, ABS_JMP_LEN);
    let relay = back.add(ABS_JMP_LEN);
    std::ptr::copy_nonoverlapping(jmp_abs(detour).as_ptr(), relay, ABS_JMP_LEN);

    Ok(relay as usize)
}

/// Decode whole instructions at `target` until the patch is covered
///
/// Reads at most [`MAX_PROLOGUE`] bytes, and never past the end of the
/// mapped region holding `target`.
///
/// # Safety
/// `target` must be mapped and readable.
unsafe fn steal_prologue(target: usize) -> Result<Vec<Instruction>, HookError> {
    let mapped = region::query(target as *const u8)
        .map_err(|_| HookError::InvalidAddress(target))?
        .as_range();
    let readable = mapped.end.saturating_sub(target).min(MAX_PROLOGUE);
    let code = std::slice::from_raw_parts(target as *const u8, readable);
    let mut decoder = Decoder::with_ip(64, code, target as u64, DecoderOptions::NONE);

    let mut stolen = Vec::new();
    let mut covered = 0;
    while covered < PATCH_LEN {
        if !decoder.can_decode() {
            return Err(HookError::NotEnoughSpace(target));
        }

        let instruction = decoder.decode();
        if instruction.is_invalid() {
            return Err(HookError::Decode(instruction.ip() as usize));
        }
        covered += instruction.len();

        // Code after a terminator may belong to another function
        let terminates = matches!(
            instruction.flow_control(),
            FlowControl::Return
                | FlowControl::UnconditionalBranch
                | FlowControl::IndirectBranch
                | FlowControl::Interrupt
        );
        stolen.push(instruction);
        if terminates && covered < PATCH_LEN {
            return Err(HookError::NotEnoughSpace(target));
        }
    }

    Ok(stolen)
}

/// `jmp rel32` from `from` to `to`, if `to` is in range
fn jmp_rel32(from: usize, to: usize) -> Option<[u8; PATCH_LEN]> {
    let next = from.checked_add(PATCH_LEN)?;
    if !within_rel32(next, to) {
        return None;
    }
    let displacement = i32::try_from(to as i64 - next as i64).ok()?;

    let mut bytes = [0xE9, 0, 0, 0, 0];
    bytes[1..].copy_from_slice(&displacement.to_le_bytes());
    Some(bytes)
}

/// `jmp qword ptr [rip+0]` followed by the absolute destination
fn jmp_abs(to: usize) -> [u8; ABS_JMP_LEN] {
    let mut bytes = [0u8; ABS_JMP_LEN];
    bytes[..6].copy_from_slice(&[0xFF, 0x25, 0x00, 0x00, 0x00, 0x00]);
    bytes[6..].copy_from_slice(&(to as u64).to_le_bytes());
    bytes
}

/// Overwrite code at `address`
///
/// When the bytes fit in one aligned 8-byte word they are written with a
/// single store, so a thread executing the target never sees a torn jump.
unsafe fn write_code(address: usize, bytes: &[u8]) -> Result<(), HookError> {
    let word = address & !7;
    let fits_word = address + bytes.len() <= word + 8;
    let (start, len) = if fits_word {
        (word, 8)
    } else {
        (address, bytes.len())
    };

    let _guard = region::protect_with_handle(
        start as *const u8,
        len,
        region::Protection::READ_WRITE_EXECUTE,
    )
    .map_err(|e| HookError::MemoryProtection(e.to_string()))?;

    if fits_word {
        let cell = &*(word as *const AtomicU64);
        let mut current = cell.load(Ordering::SeqCst).to_ne_bytes();
        current[address - word..][..bytes.len()].copy_from_slice(bytes);
        cell.store(u64::from_ne_bytes(current), Ordering::SeqCst);
    } else {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), address as *mut u8, bytes.len());
    }

    Ok(())
}

/// Enable a batch of hooks
///
/// Either every hook in `keys` ends up enabled, or none of the hooks this call
/// touched are left patched.
pub fn enable_inline_hooks(keys: &[InlineHookKey]) -> Result<(), HookError> {
    let mut hooks = INLINE_HOOKS.write();
    let mut patched = Vec::with_capacity(keys.len());

    for &key in keys {
        let Some(entry) = hooks.get_mut(key) else {
            rollback(&mut hooks, &patched);
            return Err(HookError::NotFound);
        };

        if entry.enabled {
            continue;
        }

        if let Err(e) = unsafe { write_code(entry.target, &entry.patch) } {
            let message = format!("'{}': {}", entry.name, e);
            rollback(&mut hooks, &patched);
            return Err(HookError::EnableFailed(message));
        }

        entry.enabled = true;
        patched.push(key);
        tracing::debug!("Enabled inline hook '{}' at {:x}", entry.name, entry.target);
    }

    Ok(())
}

fn rollback(hooks: &mut SlotMap<InlineHookKey, InlineHookEntry>, patched: &[InlineHookKey]) {
    for &key in patched {
        if let Some(entry) = hooks.get_mut(key) {
            match unsafe { write_code(entry.target, &entry.saved) } {
                Ok(()) => entry.enabled = false,
                Err(e) => tracing::error!("Failed to roll back hook '{}': {}", entry.name, e),
            }
        }
    }
}

/// Disable a batch of hooks, restoring the original bytes
///
/// Keeps going past failures and reports the first one.
pub fn disable_inline_hooks(keys: &[InlineHookKey]) -> Result<(), HookError> {
    let mut hooks = INLINE_HOOKS.write();
    let mut first_error = None;

    for &key in keys {
        let Some(entry) = hooks.get_mut(key) else {
            first_error.get_or_insert(HookError::NotFound);
            continue;
        };

        if !entry.enabled {
            continue;
        }

        match unsafe { write_code(entry.target, &entry.saved) } {
            Ok(()) => {
                entry.enabled = false;
                tracing::debug!("Disabled inline hook '{}' at {:x}", entry.name, entry.target);
            }
            Err(e) => {
                first_error.get_or_insert(HookError::DisableFailed(format!(
                    "'{}': {}",
                    entry.name, e
                )));
            }
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// Restore and forget a batch of hooks
///
/// Each target gets its original bytes back and its entry is dropped, so the
/// same target can be hooked again. Trampolines stay mapped: a thread may
/// still be running through one. Entries whose bytes can't be restored are
/// kept, and the first such failure is reported.
pub fn remove_inline_hooks(keys: &[InlineHookKey]) -> Result<(), HookError> {
    let mut hooks = INLINE_HOOKS.write();
    let mut first_error = None;

    for &key in keys {
        let Some(entry) = hooks.get(key) else {
            continue;
        };

        if entry.enabled {
            if let Err(e) = unsafe { write_code(entry.target, &entry.saved) } {
                first_error.get_or_insert(HookError::DisableFailed(format!(
                    "'{}': {}",
                    entry.name, e
                )));
                continue;
            }
        }

        if let Some(entry) = hooks.remove(key) {
            tracing::debug!("Removed inline hook '{}' at {:x}", entry.name, entry.target);
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// Check if an inline hook is enabled
pub fn is_inline_hook_enabled(key: InlineHookKey) -> bool {
    INLINE_HOOKS
        .read()
        .get(key)
        .map(|e| e.enabled)
        .unwrap_or(false)
}

/// Get the original function trampoline for an inline hook
pub fn get_inline_hook_original(key: InlineHookKey) -> Option<*const ()> {
    INLINE_HOOKS
        .read()
        .get(key)
        .map(|e| e.trampoline as *const ())
}
