//! The document store the build record is written to.
//!
//! [`DocumentStore`] is the single capability the publisher needs: an atomic
//! insert into a named partition. [`cosmos::CosmosStore`] implements it over
//! HTTPS; tests substitute in-memory fakes.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::record::BuildRecord;

pub mod cosmos;

pub use cosmos::{ClientCredential, CosmosSettings, CosmosStore};

/// Atomic, partition-scoped insert.
///
/// Implementations must either persist the whole record or nothing. A record
/// whose `id` already exists in the partition must be reported as
/// [`StoreError::Conflict`], never overwritten.
pub trait DocumentStore {
    /// Insert `record` into `partition`.
    fn atomic_insert(&self, partition: &str, record: &BuildRecord) -> Result<(), StoreError>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn atomic_insert(&self, partition: &str, record: &BuildRecord) -> Result<(), StoreError> {
        (**self).atomic_insert(partition, record)
    }
}

/// Failure reported by a [`DocumentStore`] insert.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store is rate limiting this client.
    #[error("Request throttled by the document store")]
    #[diagnostic(code(publish_build::store::throttled))]
    Throttled {
        /// How long the store asked us to wait, when it said
        retry_after: Option<Duration>,
    },

    /// A document with the same id already exists in the partition.
    #[error("A build with id '{id}' already exists")]
    #[diagnostic(code(publish_build::store::conflict))]
    Conflict {
        /// The conflicting document id
        id: String,
    },

    /// The credential was rejected or lacks permission.
    #[error("Not authorized: {0}")]
    #[diagnostic(code(publish_build::store::unauthorized))]
    Unauthorized(String),

    /// The request itself is invalid and will never succeed as sent.
    #[error(
        "Request rejected{}: {message}",
        .status.map(|s| format!(" with status {s}")).unwrap_or_default()
    )]
    #[diagnostic(code(publish_build::store::rejected))]
    Rejected {
        /// HTTP status, when the rejection came from the service
        status: Option<u16>,
        /// Service or client error message
        message: String,
    },

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    #[diagnostic(code(publish_build::store::timeout))]
    Timeout(String),

    /// Connection failures and 5xx-class service errors.
    #[error("Document store unavailable: {0}")]
    #[diagnostic(code(publish_build::store::unavailable))]
    Unavailable(String),
}

impl StoreError {
    /// Whether retrying the same insert may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Throttled { .. } | Self::Timeout(_) | Self::Unavailable(_)
        )
    }

    /// Whether the store already holds a document with this id.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Delay the store asked for before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }
}
