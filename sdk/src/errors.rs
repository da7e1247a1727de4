//! Error types and handling
//!
//! This module provides the error taxonomy shared by the memory gateway, the
//! workers and the conductor. Every error implements [`SquadErrorExt`], which
//! supplies a user-safe hint and a recoverability flag.
//!
//! # Error Categories
//!
//! - **Validation**: malformed memory records or queries, rejected at the boundary
//! - **Generation**: the text-generation backend failed (quota, auth, timeout)
//! - **NotFound**: unknown project or partition id
//! - **Worker**: a worker pipeline phase failed
//! - **Workflow**: illegal transitions and late results for finished projects
//!
//! # Examples
//!
//! ```
//! use sdk::errors::{SquadError, SquadErrorExt, ValidationError};
//!
//! let error = SquadError::Validation(ValidationError::missing(vec!["kind", "content"]));
//! assert!(error.to_string().contains("kind, content"));
//! assert!(!error.is_recoverable());
//! ```

use std::fmt;
use thiserror::Error;

/// Trait for squad error extensions
///
/// Hints never echo record content or backend responses back to the user.
pub trait SquadErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether retrying the same call could succeed
    fn is_recoverable(&self) -> bool;
}

/// Every field that failed validation, in the order it was checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub fields: Vec<String>,
    pub reason: String,
}

impl ValidationError {
    pub fn missing<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            reason: "missing required fields".to_string(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            fields: vec![field.into()],
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.fields.join(", "))
    }
}

impl std::error::Error for ValidationError {}

/// Main error type for the squad engine
#[derive(Debug, Error)]
pub enum SquadError {
    // Boundary errors
    #[error("Validation error: {0}")]
    Validation(ValidationError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    // External collaborators
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("Memory gateway unavailable: {0}")]
    Unavailable(String),

    // Worker pipeline errors
    #[error("{worker} failed during {phase}: {message}")]
    Worker {
        worker: String,
        phase: String,
        message: String,
    },

    // Workflow errors
    #[error("Invalid workflow transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Result discarded: {0}")]
    Discarded(String),

    // Infrastructure
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SquadError {
    /// Wraps a failure inside a worker pipeline phase.
    pub fn worker(
        worker: impl Into<String>,
        phase: impl Into<String>,
        source: impl fmt::Display,
    ) -> Self {
        Self::Worker {
            worker: worker.into(),
            phase: phase.into(),
            message: source.to_string(),
        }
    }

    pub fn project_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Project",
            id: id.into(),
        }
    }

    pub fn partition_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Partition",
            id: id.into(),
        }
    }
}

impl From<ValidationError> for SquadError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl SquadErrorExt for SquadError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Validation(_) => "Check the request fields and try again",
            Self::NotFound { .. } => "The requested item does not exist",
            Self::Generation(_) => "Text generation backend failed. Check the model server",
            Self::Provider(_) => "A pricing or research source failed. Try again later",
            Self::Timeout { .. } => "A planning step took too long. Try again",
            Self::Unavailable(_) => "Memory is shutting down. Restart the engine",
            Self::Worker { .. } => "A planning step failed. Inspect the project for details",
            Self::InvalidTransition { .. } => "The project is not in a state that allows this",
            Self::Discarded(_) => "The project already finished",
            Self::Persistence(_) => "Saving state failed. Results are still available",
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Validation(_)
            | Self::NotFound { .. }
            | Self::InvalidTransition { .. }
            | Self::Discarded(_)
            | Self::Config(_) => false,

            _ => true,
        }
    }
}
