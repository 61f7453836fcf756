//! Error handling for k8s-template.
//! Defines the error taxonomy of a run and maps each class onto a process exit code.

use std::io;
use thiserror::Error;

use crate::constants::{EXIT_CONFIG, EXIT_FATAL, EXIT_TRANSFORM, EXIT_USAGE};

/// Fatal errors of a k8s-template run.
///
/// Recoverable substitution problems never surface here; they are logged and
/// the offending fragment is left in the output.
#[derive(Error, Debug)]
pub enum Error {
    /// Reading a standard stream or another unnamed I/O failure
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    /// A file named by a mapping entry, a `file` call or a command line flag could not be read
    #[error("Failed to read '{path}': {source}.")]
    FileReadError { path: String, source: io::Error },

    /// A network fetch failed at the transport level or returned a non-success status
    #[error("Failed to fetch '{uri}': {reason}.")]
    FetchError { uri: String, reason: String },

    /// A mapping entry set both `file` and `uri`
    #[error("Configuration error: mapping '{name}' may either be a file or uri, not both.")]
    ConflictingSourceError { name: String },

    /// A mapping entry is malformed
    #[error("Configuration error: {0}.")]
    ConfigError(String),

    /// The mapping document could not be read as YAML
    #[error("Transform error: {0}.")]
    TransformError(String),

    /// Invalid combination of command line inputs
    #[error("Usage error: {0}.")]
    UsageError(String),

    /// `base64Decode` was handed text that is not standard base64
    #[error("Base64 decode error: {0}.")]
    DecodeError(String),

    /// Substitution kept changing text after the allowed number of passes
    #[error("Cycle detected: {context} still changing after {passes} passes.")]
    CycleError { context: String, passes: usize },
}

impl Error {
    /// Process exit status for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::UsageError(_) => EXIT_USAGE,
            Error::TransformError(_) => EXIT_TRANSFORM,
            Error::ConflictingSourceError { .. } | Error::ConfigError(_) => EXIT_CONFIG,
            Error::IoError(_)
            | Error::FileReadError { .. }
            | Error::FetchError { .. }
            | Error::DecodeError(_)
            | Error::CycleError { .. } => EXIT_FATAL,
        }
    }
}

/// Convenience type alias for Results with Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Behavior
/// Prints the error message to stderr and exits with [`Error::exit_code`]
pub fn default_error_handler(err: Error) -> ! {
    eprintln!("{err}");
    std::process::exit(err.exit_code());
}
