//! Error types for publish-build.
//!
//! This module defines the crate-wide error type, using a combination of
//! `thiserror` for ergonomic error definitions and `miette` for rich
//! diagnostic output.
//!
//! # Error Handling Strategy
//!
//! - All errors surface as [`PublishError`]
//! - Configuration and validation errors are raised before any network call
//! - Store failures are classified by [`StoreError`]; only the fatal and
//!   exhausted cases ever reach this type
//! - Errors are automatically converted to `miette::Result` for CLI output
//!
//! # Example
//!
//! ```no_run
//! use publish_build::error::{PublishError, Result};
//!
//! fn require_quality(quality: Option<String>) -> Result<String> {
//!     quality.ok_or(PublishError::MissingConfig {
//!         key: "VSCODE_QUALITY",
//!     })
//! }
//! ```

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::store::StoreError;

/// Error types that can occur while publishing a build record
#[derive(Error, Debug, Diagnostic)]
pub enum PublishError {
    /// A required configuration key was not supplied.
    ///
    /// Raised by `PublishConfigBuilder::build()` before the record is built
    /// or any credential is exchanged. Every key can be given either as a
    /// command-line flag or through the environment variable of the same
    /// name.
    #[error("Missing configuration: {key}")]
    #[diagnostic(
        code(publish_build::config::missing),
        help("Set the {key} environment variable or pass the matching command-line flag.")
    )]
    MissingConfig {
        /// Environment variable name of the missing key
        key: &'static str,
    },

    /// A configuration key was supplied but its value is unusable.
    ///
    /// Examples: an endpoint that is not an absolute URL, or a retry budget
    /// of zero attempts.
    #[error("Invalid configuration for {key}: {message}")]
    #[diagnostic(code(publish_build::config::invalid))]
    InvalidConfig {
        /// Environment variable name of the offending key
        key: &'static str,
        /// Why the value was rejected
        message: String,
    },

    /// A build record field failed validation.
    ///
    /// Raised by `BuildRecord::build()` when the version or quality is empty
    /// or the commit id is not a full hexadecimal object id. Never retried.
    #[error("Invalid build {field}: {message}")]
    #[diagnostic(code(publish_build::record::invalid_input))]
    InvalidInput {
        /// The record field that failed validation
        field: &'static str,
        /// Description of the problem
        message: String,
    },

    /// Git repository not found in the working directory or any parent.
    ///
    /// Only relevant when no commit id was configured and publish-build tries
    /// to read HEAD from the enclosing repository instead.
    #[error("Git repository not found in '{path}' or any parent directories")]
    #[diagnostic(
        code(publish_build::git::repo_not_found),
        help("Run inside the source checkout or set BUILD_SOURCEVERSION.")
    )]
    RepoNotFound {
        /// The path where the Git repository was searched for
        path: PathBuf,
    },

    /// Failed to resolve HEAD to a commit.
    #[error("Failed to resolve the HEAD commit")]
    #[diagnostic(code(publish_build::git::head_error))]
    GitError(#[from] git2::Error),

    /// The client credential could not be exchanged for a store session.
    #[error("Failed to authenticate against the document store")]
    #[diagnostic(
        code(publish_build::store::auth),
        help("Check AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET.")
    )]
    Authentication(#[source] StoreError),

    /// The store rejected the insert with a non-retryable error.
    ///
    /// Authorization failures and malformed requests end the publish on the
    /// first occurrence, without consuming the retry budget.
    #[error("Document store rejected the build in partition '{partition}'")]
    #[diagnostic(code(publish_build::store::fatal))]
    Fatal {
        /// Partition (container) the insert targeted
        partition: String,
        /// The store's classification of the failure
        #[source]
        source: StoreError,
    },

    /// Every attempt failed with a transient error.
    #[error("Gave up publishing the build after {attempts} attempts")]
    #[diagnostic(
        code(publish_build::store::exhausted),
        help(
            "The store kept failing transiently. Re-running the pipeline step is safe: the \
             commit id deduplicates the record."
        )
    )]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// The failure reported by the last attempt
        #[source]
        last: StoreError,
    },
}

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, PublishError>;
