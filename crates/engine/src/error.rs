//! Error types for export resolution

/// Error type for resolving a hook target to a code address
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The module is not loaded and could not be loaded
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// The module is loaded but does not export the symbol
    #[error("Export not found: {module}!{symbol}")]
    ExportNotFound { module: String, symbol: String },

    /// Module or symbol name contains an interior NUL
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
}
