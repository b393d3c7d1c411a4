//! # publish-build
//!
//! Publishes the build record for a release pipeline run to the release
//! document store, exactly once, and exits.
//!
//! ## Overview
//!
//! Every pipeline run that produces a build records it in a per-quality
//! container before any assets are uploaded. The record's id is the source
//! commit, so the insert is idempotent: retrying after a lost acknowledgement
//! finds the record already present and treats that as success.
//!
//! ## Architecture
//!
//! - [`cli`]: Command-line interface definitions using clap
//! - [`config`]: Validated configuration, assembled once per run
//! - [`record`]: Pure construction of the [`record::BuildRecord`]
//! - [`retry`]: Retry policy and backoff schedule
//! - [`publisher`]: Retry-guarded, idempotent insert
//! - [`store`]: The document store capability and its Cosmos DB
//!   implementation
//! - [`commands`]: The end-to-end publish workflow
//! - [`error`]: Error types and handling with thiserror + miette
//!
//! Internal modules (not part of the public API):
//! - `discovery`: Reads the HEAD commit when none is configured
//! - `timestamp`: Wall-clock milliseconds for the record
//!
//! ## Library Usage
//!
//! ```no_run
//! use publish_build::config::PublishConfig;
//! use publish_build::publisher::RetryingPublisher;
//! use publish_build::record::BuildRecord;
//! use publish_build::store::CosmosStore;
//!
//! let config = PublishConfig::builder()
//!     .version("1.85.0")
//!     .quality("insiders")
//!     .commit("4f1b2c3d4e5f60718293a4b5c6d7e8f901234567")
//!     .queued_by("Release Bot")
//!     .source_branch("refs/heads/main")
//!     .tenant_id("tenant")
//!     .client_id("client")
//!     .client_secret("secret")
//!     .endpoint("https://account.documents.azure.com:443/")
//!     .build()?;
//!
//! let record = BuildRecord::build(config.build_inputs())?;
//! let store = CosmosStore::authenticate(config.store().clone(), config.credential())?;
//! RetryingPublisher::new(*config.retry()).publish(&record, &store)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! The crate uses a combination of:
//! - `thiserror` for strongly-typed errors
//! - `miette` for rich diagnostic output in CLI

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod publisher;
pub mod record;
pub mod retry;
pub mod store;

// Internal modules
mod discovery;
mod timestamp;
