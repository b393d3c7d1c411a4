//! Publish configuration.
//!
//! [`PublishConfig`] is assembled once, at process start, from command-line
//! flags (which fall back to the pipeline's environment variables) and is
//! then passed by reference into the record builder and the publisher. Core
//! logic never reads the environment itself.
//!
//! # Example
//!
//! ```no_run
//! use publish_build::config::PublishConfig;
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
//! assert_eq!(config.quality(), "insiders");
//! # Ok::<(), publish_build::error::PublishError>(())
//! ```

use std::time::Duration;

use url::Url;

use crate::error::{PublishError, Result};
use crate::record::BuildInputs;
use crate::retry::{
    Backoff, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, RetryPolicy,
};
use crate::store::cosmos::{DEFAULT_AUTHORITY_HOST, DEFAULT_REQUEST_TIMEOUT};
use crate::store::{ClientCredential, CosmosSettings};

/// Names of the recognized configuration keys, as environment variables.
pub mod keys {
    /// Positional version argument
    pub const VERSION: &str = "VERSION";
    pub const QUALITY: &str = "VSCODE_QUALITY";
    pub const COMMIT: &str = "BUILD_SOURCEVERSION";
    pub const QUEUED_BY: &str = "BUILD_QUEUEDBY";
    pub const SOURCE_BRANCH: &str = "BUILD_SOURCEBRANCH";
    pub const TENANT_ID: &str = "AZURE_TENANT_ID";
    pub const CLIENT_ID: &str = "AZURE_CLIENT_ID";
    pub const CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
    pub const ENDPOINT: &str = "AZURE_DOCUMENTDB_ENDPOINT";
    pub const AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";
    pub const DISTRO_REF: &str = "VSCODE_DISTRO_REF";
    pub const DATABASE: &str = "PUBLISH_BUILD_DATABASE";
    pub const PROCEDURE: &str = "PUBLISH_BUILD_PROCEDURE";
    pub const MAX_ATTEMPTS: &str = "PUBLISH_BUILD_MAX_ATTEMPTS";
    pub const INITIAL_DELAY_MS: &str = "PUBLISH_BUILD_INITIAL_DELAY_MS";
    pub const MAX_DELAY_MS: &str = "PUBLISH_BUILD_MAX_DELAY_MS";
}

/// Database holding one container per quality channel.
pub const DEFAULT_DATABASE: &str = "builds";
/// Stored procedure performing the atomic insert.
pub const DEFAULT_PROCEDURE: &str = "createBuild";

/// Validated configuration for one publish run.
#[derive(Clone, Debug)]
pub struct PublishConfig {
    version: String,
    quality: String,
    commit: String,
    queued_by: String,
    source_branch: String,
    is_private: bool,
    credential: ClientCredential,
    store: CosmosSettings,
    retry: RetryPolicy,
}

impl PublishConfig {
    /// Creates a new builder for [`PublishConfig`]
    pub fn builder() -> PublishConfigBuilder {
        PublishConfigBuilder::default()
    }

    /// Version as given on the command line, without quality suffix
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn quality(&self) -> &str {
        &self.quality
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    pub fn queued_by(&self) -> &str {
        &self.queued_by
    }

    pub fn source_branch(&self) -> &str {
        &self.source_branch
    }

    pub fn is_private(&self) -> bool {
        self.is_private
    }

    pub fn credential(&self) -> &ClientCredential {
        &self.credential
    }

    pub fn store(&self) -> &CosmosSettings {
        &self.store
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Inputs for `BuildRecord::build`
    pub fn build_inputs(&self) -> BuildInputs {
        BuildInputs {
            raw_version: self.version.clone(),
            quality: self.quality.clone(),
            commit_id: self.commit.clone(),
            source_branch: self.source_branch.clone(),
            queued_by: self.queued_by.clone(),
            is_private: self.is_private,
        }
    }
}

/// Builder for [`PublishConfig`]
///
/// Every value is optional until [`PublishConfigBuilder::build`], which
/// reports the first missing required key.
#[derive(Debug, Default, Clone)]
pub struct PublishConfigBuilder {
    pub(crate) version: Option<String>,
    pub(crate) quality: Option<String>,
    pub(crate) commit: Option<String>,
    pub(crate) queued_by: Option<String>,
    pub(crate) source_branch: Option<String>,
    pub(crate) tenant_id: Option<String>,
    pub(crate) client_id: Option<String>,
    pub(crate) client_secret: Option<String>,
    pub(crate) endpoint: Option<String>,
    pub(crate) authority_host: Option<String>,
    pub(crate) distro_ref: Option<String>,
    pub(crate) database: Option<String>,
    pub(crate) procedure: Option<String>,
    pub(crate) max_attempts: Option<u32>,
    pub(crate) initial_delay_ms: Option<u64>,
    pub(crate) max_delay_ms: Option<u64>,
}

impl PublishConfigBuilder {
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn queued_by(mut self, queued_by: impl Into<String>) -> Self {
        self.queued_by = Some(queued_by.into());
        self
    }

    pub fn source_branch(mut self, branch: impl Into<String>) -> Self {
        self.source_branch = Some(branch.into());
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Identity platform to request tokens from (default: Entra ID public cloud).
    pub fn authority_host(mut self, authority_host: impl Into<String>) -> Self {
        self.authority_host = Some(authority_host.into());
        self
    }

    /// Mark the build private when `distro_ref` is non-empty.
    pub fn distro_ref(mut self, distro_ref: impl Into<String>) -> Self {
        self.distro_ref = Some(distro_ref.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn procedure(mut self, procedure: impl Into<String>) -> Self {
        self.procedure = Some(procedure.into());
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn initial_delay_ms(mut self, delay: u64) -> Self {
        self.initial_delay_ms = Some(delay);
        self
    }

    pub fn max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = Some(delay);
        self
    }

    /// Whether a commit id has been supplied.
    pub fn has_commit(&self) -> bool {
        self.commit.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// - [`PublishError::MissingConfig`] naming the first required key that is
    ///   absent or empty
    /// - [`PublishError::InvalidConfig`] for an unusable endpoint or retry
    ///   setting
    pub fn build(self) -> Result<PublishConfig> {
        let version = self.version.ok_or(PublishError::MissingConfig {
            key: keys::VERSION,
        })?;
        let quality = required(self.quality, keys::QUALITY)?;
        let commit = required(self.commit, keys::COMMIT)?;
        let queued_by = required(self.queued_by, keys::QUEUED_BY)?;
        let source_branch = required(self.source_branch, keys::SOURCE_BRANCH)?;
        let tenant_id = required(self.tenant_id, keys::TENANT_ID)?;
        let client_id = required(self.client_id, keys::CLIENT_ID)?;
        let client_secret = required(self.client_secret, keys::CLIENT_SECRET)?;
        let endpoint = required(self.endpoint, keys::ENDPOINT)?;
        let endpoint = parse_endpoint(&endpoint, keys::ENDPOINT)?;
        let authority_host = parse_endpoint(
            &non_empty_or(self.authority_host, DEFAULT_AUTHORITY_HOST),
            keys::AUTHORITY_HOST,
        )?;

        let retry = retry_policy(self.max_attempts, self.initial_delay_ms, self.max_delay_ms)?;

        Ok(PublishConfig {
            version,
            quality,
            commit,
            queued_by,
            source_branch,
            is_private: self.distro_ref.is_some_and(|r| !r.is_empty()),
            credential: ClientCredential {
                tenant_id,
                client_id,
                client_secret,
            },
            store: CosmosSettings {
                endpoint,
                authority_host,
                database: non_empty_or(self.database, DEFAULT_DATABASE),
                procedure: non_empty_or(self.procedure, DEFAULT_PROCEDURE),
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            retry,
        })
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(PublishError::MissingConfig { key })
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_endpoint(raw: &str, key: &'static str) -> Result<Url> {
    let invalid = |message: String| PublishError::InvalidConfig { key, message };

    let url = Url::parse(raw).map_err(|e| invalid(format!("'{raw}' is not a URL: {e}")))?;
    if !matches!(url.scheme(), "https" | "http") || url.cannot_be_a_base() {
        return Err(invalid(format!("'{raw}' is not an http(s) endpoint")));
    }

    Ok(url)
}

fn retry_policy(
    max_attempts: Option<u32>,
    initial_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
) -> Result<RetryPolicy> {
    let max_attempts = max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
    if max_attempts == 0 {
        return Err(PublishError::InvalidConfig {
            key: keys::MAX_ATTEMPTS,
            message: "at least one attempt is required".to_string(),
        });
    }

    let initial = initial_delay_ms.map_or(DEFAULT_INITIAL_DELAY, Duration::from_millis);
    let max = max_delay_ms.map_or(DEFAULT_MAX_DELAY, Duration::from_millis);
    if max < initial {
        return Err(PublishError::InvalidConfig {
            key: keys::MAX_DELAY_MS,
            message: format!(
                "maximum delay {}ms is shorter than the initial delay {}ms",
                max.as_millis(),
                initial.as_millis()
            ),
        });
    }

    Ok(RetryPolicy::new(
        max_attempts,
        Backoff::Exponential {
            initial,
            factor: 2,
            max,
        },
    ))
}
