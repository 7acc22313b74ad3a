//! relational-memory error types

/// relational-memory result type
pub type Result<T> = std::result::Result<T, Error>;

/// relational-memory errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from numr operations
    #[error("numr error: {0}")]
    Numr(#[from] numr::error::Error),

    /// Configuration invariant violated, or a config file could not be read
    #[error("invalid config: {reason}")]
    InvalidConfig {
        /// Description of what went wrong
        reason: String,
    },

    /// Tensor passed to an operation has the wrong rank or axis sizes
    #[error("shape mismatch for '{arg}': {reason}")]
    ShapeMismatch {
        /// Argument name
        arg: &'static str,
        /// Why it's invalid
        reason: String,
    },

    /// Named weight absent from a VarMap
    #[error("weight not found: {name}")]
    MissingWeight {
        /// Fully-qualified weight name
        name: String,
    },
}
