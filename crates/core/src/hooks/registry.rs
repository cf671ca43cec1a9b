//! Substitution registry
//!
//! The input policy only needs two capabilities from the hooking layer:
//! register a substitute for an API identity (getting back a callable
//! original), then activate everything registered. [`SubstitutionRegistry`]
//! is that seam; [`InlineHookRegistry`] implements it with inline detours on
//! exported functions.

use std::fmt;

use camhook_engine::ExportResolver;

use super::inline::{self, HookError, InlineHookKey};

/// Identity of an intercepted API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookTarget<'a> {
    /// Module name without extension (e.g., "user32")
    pub module: &'a str,
    /// Exported symbol (e.g., "PeekMessageW")
    pub symbol: &'a str,
}

impl<'a> HookTarget<'a> {
    pub const fn new(module: &'a str, symbol: &'a str) -> Self {
        Self { module, symbol }
    }
}

impl fmt::Display for HookTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.module, self.symbol)
    }
}

/// Installs substitutes for API entry points
pub trait SubstitutionRegistry {
    /// Prepare a substitute for `target` without activating it
    ///
    /// # Safety
    /// `detour` must have the exact signature and calling convention of the
    /// function identified by `target`.
    ///
    /// # Returns
    /// A pointer that runs the unhooked target
    unsafe fn register(
        &mut self,
        target: HookTarget<'_>,
        detour: *const (),
    ) -> Result<*const (), HookError>;

    /// Activate every substitute registered so far
    fn activate_all(&mut self) -> Result<(), HookError>;
}

/// Registry backed by inline hooks on resolved exports
#[derive(Debug, Default)]
pub struct InlineHookRegistry {
    resolver: ExportResolver,
    keys: Vec<InlineHookKey>,
}

impl InlineHookRegistry {
    pub fn new(resolver: ExportResolver) -> Self {
        Self {
            resolver,
            keys: Vec::new(),
        }
    }

    /// Keys of the hooks created through this registry
    pub fn keys(&self) -> &[InlineHookKey] {
        &self.keys
    }

    /// Restore and drop every hook created through this registry
    ///
    /// Targets removed here can be registered again by a later registry.
    /// Keys whose bytes could not be restored stay tracked.
    pub fn remove_all(&mut self) -> Result<(), HookError> {
        let result = inline::remove_inline_hooks(&self.keys);
        self.keys
            .retain(|&key| inline::get_inline_hook_original(key).is_some());
        result
    }
}

impl SubstitutionRegistry for InlineHookRegistry {
    unsafe fn register(
        &mut self,
        target: HookTarget<'_>,
        detour: *const (),
    ) -> Result<*const (), HookError> {
        let address = self.resolver.resolve(target.module, target.symbol)?;
        let name = target.to_string();
        let (key, original) =
            inline::create_inline_hook(&name, address.as_ptr() as *const (), detour)?;
        self.keys.push(key);
        Ok(original)
    }

    fn activate_all(&mut self) -> Result<(), HookError> {
        inline::enable_inline_hooks(&self.keys)
    }
}
