//! Domain-specific error types and error handling utilities.
//!
//! This module defines [`SyncError`] which covers every failure mode of the
//! synchronization core. It uses `thiserror` for ergonomic error definitions
//! and includes specialized error constructors for common failure scenarios.
//!
//! # Public API
//! - [`SyncError`]: Main error enum covering all failure modes
//! - [`Result<T>`]: Type alias for `std::result::Result<T, SyncError>`
//!
//! # Error Categories
//! - **Adapter errors**: missing paths (with a POSIX-style code) and the
//!   unsupported symlink family; always propagated, never retried
//! - **Classification errors**: an unrecognized status tuple, fatal to the
//!   caller because it signals an engine contract change
//! - **Vault errors**: uninitialized vault, authentication failures during
//!   decryption
//! - **Provider errors**: authentication, non-fast-forward rejection, and
//!   user-cancelled repository creation
//! - **Passthrough**: HTTP, git engine, IO, and serialization errors

use thiserror::Error;

/// Domain-specific error types for the synchronization core
#[derive(Error, Debug)]
pub enum SyncError {
    // Filesystem adapter errors
    #[error("ENOENT: no such file or directory, '{path}'")]
    NotFound { path: String },

    #[error("ENOTSUP: operation not supported, '{operation}'")]
    Unsupported { operation: &'static str },

    // Status classification errors
    #[error("unrecognized status tuple {key} for '{path}'")]
    UnknownStatusTuple { path: String, key: String },

    // Credential vault errors
    #[error("master key not initialized")]
    VaultUninitialized,

    #[error("master key material is invalid")]
    InvalidMasterKey,

    #[error("credential encryption failed")]
    EncryptionFailed,

    #[error("credential decryption failed")]
    DecryptionFailed,

    // Provider errors
    #[error("authentication failed for {domain}")]
    AuthenticationFailed { domain: String },

    #[error("no stored credential for {domain}")]
    AuthenticationRequired { domain: String },

    #[error("remote rejected non-fast-forward update: {message}")]
    NonFastForward { message: String },

    #[error("repository creation cancelled")]
    CreationCancelled,

    #[error("no repository handle available; look up or create the repository first")]
    MissingRepoHandle,

    #[error("no provider registered for domain '{domain}'")]
    UnknownProvider { domain: String },

    #[error("no remote configured; call clone or set_remote first")]
    NoRemoteConfigured,

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    // Passthrough errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("git engine error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid UTF-8 in decrypted payload: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Convenience type alias for Results using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Create a not-found error for an adapter path
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an unsupported-operation error for a stubbed adapter method
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// Create an unknown-status-tuple error
    pub fn unknown_status_tuple(path: impl Into<String>, key: impl Into<String>) -> Self {
        Self::UnknownStatusTuple {
            path: path.into(),
            key: key.into(),
        }
    }

    /// Create an authentication-failed error for a domain
    pub fn authentication_failed(domain: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            domain: domain.into(),
        }
    }

    /// Create an API error with provider context
    pub fn api(provider: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            provider,
            status,
            message: message.into(),
        }
    }

    /// POSIX-style error code, for the errors that carry one.
    ///
    /// The embedded engine inspects this to decide whether a path is new
    /// (`ENOENT`) as opposed to genuinely broken.
    pub fn posix_code(&self) -> Option<&'static str> {
        match self {
            SyncError::NotFound { .. } => Some("ENOENT"),
            SyncError::Unsupported { .. } => Some("ENOTSUP"),
            _ => None,
        }
    }

    /// True if this error means the path does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }
}
