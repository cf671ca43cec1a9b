//! Hook system
//!
//! - Inline hooks (function detours relocated with iced-x86)
//! - Trampoline allocation near hook targets
//! - The substitution registry the input layer installs through

pub mod inline;
pub mod registry;
mod trampoline;

pub use inline::{
    disable_inline_hooks, enable_inline_hooks, remove_inline_hooks, HookError, InlineHookKey,
};
pub use registry::{HookTarget, InlineHookRegistry, SubstitutionRegistry};
