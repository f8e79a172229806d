//! Error types for registry namespace operations.
//!
//! This module provides the error taxonomy shared by every operation in the
//! crate: missing nodes, permission failures, other store failures, and
//! malformed addresses, plus the decoding and command errors raised by the
//! value and firewall layers.

use std::io;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while addressing, reading or mutating the namespace.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Node is absent from the store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks the rights needed for the operation.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Any other store-level failure.
    #[error("Store error {code}: {message}")]
    AccessError {
        code: i32,
        message: String,
    },

    /// Address is empty or cannot be represented.
    #[error("Malformed address: {0}")]
    MalformedAddress(String),

    /// I/O error not covered by the classified variants.
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// Invalid UTF-16 string data.
    #[error("Invalid UTF-16 string data ({len} bytes)")]
    InvalidUtf16 {
        len: usize,
    },

    /// Raw value data shorter than its type requires.
    #[error("Truncated value data: expected {expected} bytes, got {actual} bytes")]
    TruncatedData {
        expected: usize,
        actual: usize,
    },

    /// External command exited unsuccessfully.
    #[error("Command '{program}' failed with status {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: i32,
        stderr: String,
    },
}

impl From<io::Error> for RegistryError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => Self::AccessDenied(err.to_string()),
            _ => Self::Io(err),
        }
    }
}

impl RegistryError {
    /// Creates a not found error with context about what was being searched.
    ///
    /// # Arguments
    ///
    /// * `item_type` - Type of item (e.g., "key", "value")
    /// * `name` - Name of the item that wasn't found
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_sweep::error::RegistryError;
    /// let err = RegistryError::not_found("value", "DisplayName");
    /// assert!(err.is_not_found());
    /// ```
    pub fn not_found(item_type: &str, name: &str) -> Self {
        Self::NotFound(format!("{} '{}'", item_type, name))
    }

    /// Creates an access denied error for the named item.
    pub fn access_denied(item_type: &str, name: &str) -> Self {
        Self::AccessDenied(format!("{} '{}'", item_type, name))
    }

    /// Creates a generic store failure.
    ///
    /// # Arguments
    ///
    /// * `code` - Platform error code, or `-1` when none applies
    /// * `message` - Description of the failure
    pub fn access_error(code: i32, message: impl Into<String>) -> Self {
        Self::AccessError {
            code,
            message: message.into(),
        }
    }

    /// Creates a malformed address error.
    pub fn malformed_address(message: impl Into<String>) -> Self {
        Self::MalformedAddress(message.into())
    }

    /// Returns true if this error means the node does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this error is a permission failure.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}
