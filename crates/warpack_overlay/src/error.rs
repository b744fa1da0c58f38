//! Error types for webapp assembly.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses
//! [`Error`] as the error type. External error types (`std::io::Error`,
//! `zip` errors, glob pattern errors) are converted via `From` impls.
//!
//! The variants split into three families: configuration errors
//! ([`InvalidOverlayConfiguration`](Error::InvalidOverlayConfiguration)),
//! which are reported before any file is written; build failures
//! ([`MissingDescriptor`](Error::MissingDescriptor)); and execution errors
//! (everything I/O- or archive-shaped), which abort the remaining pipeline.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assembling a webapp.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed (copying files, creating directories, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize a package report.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing an archive failed.
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A directory walk failed while enumerating files.
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// An include/exclude pattern could not be compiled.
    #[error("invalid include/exclude pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// The project definition itself is invalid.
    #[error("project error: {0}")]
    Project(#[from] warpack_project::ProjectError),

    /// A declared overlay does not resolve to exactly one mergeable
    /// dependency, or the same overlay is declared twice. Always reported
    /// before any file is written.
    #[error("invalid overlay configuration: {0}")]
    InvalidOverlayConfiguration(String),

    /// The deployment descriptor is required but absent.
    #[error("deployment descriptor not found: {0}")]
    MissingDescriptor(Utf8PathBuf),

    /// The filtering collaborator failed on a file marked as filtered.
    #[error("filtering failed: {0}")]
    Filter(String),

    /// Catch-all for collaborator-provided errors.
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
