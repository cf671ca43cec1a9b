//! camhook - FFI Layer
//!
//! C ABI boundary between the injection bootstrap / camera logic and the
//! Rust core. Compiles to a cdylib loaded into the host process.

pub mod ffi;

pub use camhook_core::shutdown;
