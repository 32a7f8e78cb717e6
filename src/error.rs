//! Error types and error code constants for declump.
//!
//! This module provides a unified error type (`DeclumpError`) that bridges
//! domain-specific errors from different subsystems (edit planning,
//! interaction, model loading) into a common format suitable for CLI output.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad input from caller, invalid selection)
//! - `3`: Resolution errors (declaration not found, file not found)
//! - `4`: Apply errors (edit conflicts, pre-image mismatches)
//! - `10`: Internal errors (bugs, structural inconsistencies that escaped
//!   the self-healing index)
//!
//! ## Design
//!
//! - **Unified type**: `DeclumpError` is the single error type for CLI output
//! - **Bridging**: `impl From<X> for DeclumpError` bridges domain errors
//! - **Code mapping**: `OutputErrorCode` provides stable integer codes

use std::fmt;

use thiserror::Error;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for CLI output.
///
/// These codes map to CLI exit codes and appear in JSON error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, invalid selection).
    InvalidArguments = 2,
    /// Resolution errors (declaration not found, file not found).
    ResolutionError = 3,
    /// Apply errors (edit conflict, pre-image mismatch).
    ApplyError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
///
/// This is the canonical error type that all subsystem errors are converted
/// to before being rendered as output. Each variant carries enough context to
/// produce a helpful error message.
#[derive(Debug, Error)]
pub enum DeclumpError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The selected property set or extraction target is not valid.
    #[error("invalid selection: {message}")]
    InvalidSelection { message: String },

    /// No usable default value could be determined for a property during
    /// call-site rewriting, and the user declined to supply one.
    #[error("no default value available for property '{property}' in '{context}'")]
    AmbiguousDefault { property: String, context: String },

    /// A reused extraction target defines an accessor that would collide
    /// with a synthesized one, and the user declined to reuse it.
    #[error("accessor '{accessor}' on class '{class}' conflicts with extraction")]
    AccessorConflict { class: String, accessor: String },

    /// The user cancelled an interactive step.
    #[error("operation cancelled")]
    Cancelled,

    /// A declaration could not be resolved by qualified name.
    #[error("declaration not found: {qualified_name}")]
    DeclarationNotFound { qualified_name: String },

    /// File not found in the source model.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// Failed to apply the planned edits.
    #[error("apply error: {message}")]
    ApplyError {
        message: String,
        file: Option<String>,
    },

    /// IO error (CLI file handling).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error (model dump, report sink).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&DeclumpError> for OutputErrorCode {
    fn from(err: &DeclumpError) -> Self {
        match err {
            DeclumpError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            DeclumpError::InvalidSelection { .. } => OutputErrorCode::InvalidArguments,
            DeclumpError::AmbiguousDefault { .. } => OutputErrorCode::ResolutionError,
            DeclumpError::AccessorConflict { .. } => OutputErrorCode::InvalidArguments,
            DeclumpError::Cancelled => OutputErrorCode::InvalidArguments,
            DeclumpError::DeclarationNotFound { .. } => OutputErrorCode::ResolutionError,
            DeclumpError::FileNotFound { .. } => OutputErrorCode::ResolutionError,
            DeclumpError::ApplyError { .. } => OutputErrorCode::ApplyError,
            DeclumpError::Io(_) => OutputErrorCode::InternalError,
            DeclumpError::Json(_) => OutputErrorCode::InvalidArguments,
            DeclumpError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<DeclumpError> for OutputErrorCode {
    fn from(err: DeclumpError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<crate::edit::EditError> for DeclumpError {
    fn from(err: crate::edit::EditError) -> Self {
        use crate::edit::EditError;
        match err {
            EditError::Overlap { file, first, second } => DeclumpError::ApplyError {
                message: format!("overlapping edits {} and {}", first, second),
                file: Some(file),
            },
            EditError::PreimageMismatch { file, span } => DeclumpError::ApplyError {
                message: format!("content at {} changed since planning", span),
                file: Some(file),
            },
            EditError::OutOfBounds { file, span, file_len } => DeclumpError::ApplyError {
                message: format!("edit span {} exceeds file length {}", span, file_len),
                file: Some(file),
            },
            EditError::UnknownFile { path } => DeclumpError::FileNotFound { path },
            EditError::DuplicateNewFile { path } => DeclumpError::ApplyError {
                message: format!("new file already exists: {}", path),
                file: Some(path),
            },
        }
    }
}

impl From<crate::interaction::InteractionError> for DeclumpError {
    fn from(err: crate::interaction::InteractionError) -> Self {
        use crate::interaction::InteractionError;
        match err {
            InteractionError::Cancelled => DeclumpError::Cancelled,
            InteractionError::Unavailable => DeclumpError::Cancelled,
            InteractionError::InvalidInput(msg) => DeclumpError::InvalidArguments {
                message: format!("invalid interactive input: {}", msg),
            },
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl DeclumpError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        DeclumpError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create an invalid selection error.
    pub fn invalid_selection(message: impl Into<String>) -> Self {
        DeclumpError::InvalidSelection {
            message: message.into(),
        }
    }

    /// Create a declaration not found error.
    pub fn declaration_not_found(qualified_name: impl Into<String>) -> Self {
        DeclumpError::DeclarationNotFound {
            qualified_name: qualified_name.into(),
        }
    }

    /// Create an ambiguous default error.
    pub fn ambiguous_default(property: impl Into<String>, context: impl Into<String>) -> Self {
        DeclumpError::AmbiguousDefault {
            property: property.into(),
            context: context.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        DeclumpError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DeclumpError>;

// ============================================================================
// Tests
// ============================================================================
