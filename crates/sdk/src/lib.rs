//! camhook SDK - Win32 Input ABI Definitions
//!
//! This crate mirrors the Win32 records and constants that the interception
//! core reads and rewrites. It has no dependencies and compiles on every
//! platform, so the suppression policy can be tested away from Windows.
//!
//! # Modules
//!
//! - [`types`] - `#[repr(C)]` message, raw input and XInput records
//! - [`messages`] - Window message codes and retrieval flags
//! - [`apis`] - Modules, exports and signatures of the intercepted functions

pub mod apis;
pub mod messages;
pub mod types;

pub use apis::{GetMessageFn, PeekMessageFn, XInputGetStateFn};
pub use types::*;
