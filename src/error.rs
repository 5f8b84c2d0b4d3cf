//! Error types for the memoization layer
//!
//! Only configuration problems live here. Failures of the wrapped
//! computation keep their own error type and are returned unchanged.

use thiserror::Error;

// == Memo Error Enum ==
/// Configuration errors raised before any wrapped call is made.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoError {
    /// TTL is negative, not finite, or not a number
    #[error("Invalid TTL: {0}")]
    InvalidTtl(String),

    /// Any other malformed configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for configuration operations.
pub type Result<T> = std::result::Result<T, MemoError>;
