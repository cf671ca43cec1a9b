//! camhook Engine - Export Resolution and Process-Wide State
//!
//! This crate handles:
//! - Resolving `module!export` identities to code addresses
//! - The enablement gate shared by the camera logic and the input detours
//!
//! # Architecture
//!
//! Hook targets are resolved once during startup via [`ExportResolver`].
//! The [`EnablementGate`] is written by the camera logic and read by the
//! detours; the process-wide instance is reached through [`gate()`].
//!
//! # Thread Safety
//!
//! Gate flags are word-sized atomics. Message detours run on the host's
//! message loop thread while the XInput detour may run on another, and
//! neither takes a lock on the gate.

pub mod error;
pub mod gate;
pub mod globals;
pub mod loader;

pub use error::ResolveError;
pub use gate::{BufferToken, EnablementGate};
pub use globals::{gate, is_camera_enabled, is_input_blocked};
pub use loader::ExportResolver;
