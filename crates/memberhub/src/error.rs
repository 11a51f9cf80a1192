//! Error types for memberhub.
//!
//! This module defines all error types used throughout the memberhub crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for memberhub operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Menu Errors ===
    /// The menu data source failed to answer a request.
    #[error("failed to fetch menu '{menu_type}': {message}")]
    MenuSource {
        /// The menu category that was requested.
        menu_type: String,
        /// Description of what went wrong.
        message: String,
    },

    /// A refetch was requested before any menu type was fetched.
    #[error("no menu has been requested yet")]
    NoMenuRequested,

    // === Session Errors ===
    /// The session slot backend failed.
    #[error("session slot '{key}' unavailable: {message}")]
    SlotBackend {
        /// The slot key being accessed.
        key: String,
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for memberhub operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a menu source error for the given menu type.
    #[must_use]
    pub fn menu_source(menu_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MenuSource {
            menu_type: menu_type.into(),
            message: message.into(),
        }
    }

    /// Create a slot backend error for the given key.
    #[must_use]
    pub fn slot_backend(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SlotBackend {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Check if this error came from the menu data source.
    #[must_use]
    pub fn is_menu_source(&self) -> bool {
        matches!(self, Self::MenuSource { .. })
    }
}
