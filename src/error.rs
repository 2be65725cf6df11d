//! Error types for AtlasDB
//!
//! Provides a unified error type for all operations. Variants fall into the
//! classes reported by [`AtlasError::kind`]; internal invariant violations are
//! panics, and only [`guard_internal`] turns them into [`AtlasError::Internal`].

use std::io;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// Result type alias using AtlasError
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Unified error type for AtlasDB operations
#[derive(Debug, Error)]
pub enum AtlasError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("IO error during {op} at offset {offset}: {source}")]
    IoAt {
        op: &'static str,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("short {op} at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortIo {
        op: &'static str,
        offset: u64,
        expected: usize,
        actual: usize,
    },

    // -------------------------------------------------------------------------
    // File Format Errors
    // -------------------------------------------------------------------------
    #[error("bad file signature")]
    BadSignature,

    #[error("unsupported format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("file format error: {0}")]
    FileFormat(String),

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("{what} of {size} bytes exceeds maximum of {max}")]
    CapacityExceeded {
        what: &'static str,
        size: u64,
        max: u64,
    },

    // -------------------------------------------------------------------------
    // Logical Errors
    // -------------------------------------------------------------------------
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("key column {column}: expected {expected}, found {found}")]
    KeyTypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("column {column}: expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("column {column}: value {value} out of range")]
    ValueOutOfRange { column: String, value: String },

    #[error("missing value for column {0}")]
    MissingColumn(String),

    #[error("unknown column {0}")]
    UnknownColumn(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    // -------------------------------------------------------------------------
    // Internal Errors
    // -------------------------------------------------------------------------
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Seek/read/write failures of the underlying stream
    Io,
    /// Bad signature, version, corrupt header or node
    FileFormat,
    /// Data or segment beyond a size limit
    Capacity,
    /// Bad input: duplicate key, missing key, schema misuse
    Logical,
    /// An engine invariant was violated
    Internal,
}

impl AtlasError {
    /// Build a closure that wraps an io::Error with operation and offset
    pub(crate) fn io_at(op: &'static str, offset: u64) -> impl FnOnce(io::Error) -> Self {
        move |source| AtlasError::IoAt { op, offset, source }
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        AtlasError::FileFormat(message.into())
    }

    /// The class this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            AtlasError::Io(_) | AtlasError::IoAt { .. } | AtlasError::ShortIo { .. } => {
                ErrorKind::Io
            }
            AtlasError::BadSignature
            | AtlasError::UnsupportedVersion { .. }
            | AtlasError::FileFormat(_) => ErrorKind::FileFormat,
            AtlasError::CapacityExceeded { .. } => ErrorKind::Capacity,
            AtlasError::Internal(_) => ErrorKind::Internal,
            _ => ErrorKind::Logical,
        }
    }

    pub fn is_file_format(&self) -> bool {
        self.kind() == ErrorKind::FileFormat
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AtlasError::KeyNotFound(_) | AtlasError::TableNotFound(_)
        )
    }
}

/// Run `op`, converting an invariant-violation panic into `AtlasError::Internal`
///
/// Meant for the outermost boundary (CLI, bindings). Inside the crate those
/// panics stay panics.
pub fn guard_internal<T>(op: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(result) => result,
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            tracing::error!("internal invariant violated: {}", message);
            Err(AtlasError::Internal(message))
        }
    }
}
