//! Command-line interface definitions for publish-build.
//!
//! Every option falls back to the pipeline environment variable of the same
//! meaning, so in CI the tool is usually invoked with just the version:
//!
//! ```bash
//! publish-build 1.85.0
//! ```
//!
//! # Example
//!
//! ```no_run
//! use publish_build::cli::Cli;
//!
//! let cli = Cli::parse_args();
//! println!("Publishing {}", cli.version());
//! ```

use clap::Parser;

use crate::config::{PublishConfigBuilder, keys};

/// Main command-line interface for publish-build.
#[derive(Parser, Debug)]
#[command(
    name = "publish-build",
    bin_name = "publish-build",
    author,
    version,
    about = "Record a pipeline build in the release document store",
    long_about = None
)]
pub struct Cli {
    /// Product version being built, without quality suffix (e.g. 1.85.0)
    #[arg(value_name = "VERSION")]
    target_version: String,

    #[command(flatten)]
    global_opts: GlobalOpts,

    #[command(flatten)]
    build_opts: BuildOpts,

    #[command(flatten)]
    store_opts: StoreOpts,

    #[command(flatten)]
    retry_opts: RetryOpts,
}

/// Output options.
#[derive(Parser, Debug)]
pub struct GlobalOpts {
    /// Enable verbose output (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, env = "PUBLISH_BUILD_VERBOSE")]
    verbose: u8,

    /// Silence all output except for errors
    #[arg(short, long, conflicts_with = "verbose", env = "PUBLISH_BUILD_QUIET")]
    quiet: bool,
}

impl GlobalOpts {
    /// Get the verbose level
    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

/// Provenance of the build being recorded.
#[derive(Parser, Debug)]
struct BuildOpts {
    /// Quality channel (stable, insiders, ...); also selects the container
    #[arg(long, env = keys::QUALITY)]
    quality: Option<String>,

    /// Commit the build was produced from (defaults to HEAD of the checkout)
    #[arg(long, env = keys::COMMIT)]
    commit: Option<String>,

    /// Who queued the pipeline run
    #[arg(long, env = keys::QUEUED_BY)]
    queued_by: Option<String>,

    /// Branch the pipeline ran on
    #[arg(long, env = keys::SOURCE_BRANCH)]
    source_branch: Option<String>,

    /// Distribution ref; any non-empty value marks the build private
    #[arg(long, env = keys::DISTRO_REF)]
    distro_ref: Option<String>,
}

/// Document store location and credentials.
#[derive(Parser, Debug)]
struct StoreOpts {
    /// Cosmos DB account endpoint
    #[arg(long, env = keys::ENDPOINT)]
    endpoint: Option<String>,

    /// Identity platform issuing tokens (default: https://login.microsoftonline.com/)
    #[arg(long, env = keys::AUTHORITY_HOST)]
    authority_host: Option<String>,

    /// Entra ID tenant of the publishing service principal
    #[arg(long, env = keys::TENANT_ID)]
    tenant_id: Option<String>,

    /// Client id of the publishing service principal
    #[arg(long, env = keys::CLIENT_ID)]
    client_id: Option<String>,

    /// Client secret of the publishing service principal
    #[arg(long, env = keys::CLIENT_SECRET, hide_env_values = true)]
    client_secret: Option<String>,

    /// Database holding the per-quality build containers (default: builds)
    #[arg(long, env = keys::DATABASE)]
    database: Option<String>,

    /// Stored procedure performing the insert (default: createBuild)
    #[arg(long, env = keys::PROCEDURE)]
    procedure: Option<String>,
}

/// Retry tuning for the insert.
#[derive(Parser, Debug)]
struct RetryOpts {
    /// Maximum insert attempts, including the first (default: 5)
    #[arg(long, env = keys::MAX_ATTEMPTS)]
    max_attempts: Option<u32>,

    /// Delay before the first retry in milliseconds (default: 1000)
    #[arg(long, env = keys::INITIAL_DELAY_MS)]
    initial_delay_ms: Option<u64>,

    /// Upper bound for any retry delay in milliseconds (default: 30000)
    #[arg(long, env = keys::MAX_DELAY_MS)]
    max_delay_ms: Option<u64>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the version argument
    pub fn version(&self) -> &str {
        &self.target_version
    }

    /// Get the global options
    pub fn global_opts(&self) -> &GlobalOpts {
        &self.global_opts
    }

    /// Collect every supplied option into an unvalidated configuration.
    pub fn config_builder(&self) -> PublishConfigBuilder {
        PublishConfigBuilder {
            version: Some(self.target_version.clone()),
            quality: self.build_opts.quality.clone(),
            commit: self.build_opts.commit.clone(),
            queued_by: self.build_opts.queued_by.clone(),
            source_branch: self.build_opts.source_branch.clone(),
            tenant_id: self.store_opts.tenant_id.clone(),
            client_id: self.store_opts.client_id.clone(),
            client_secret: self.store_opts.client_secret.clone(),
            endpoint: self.store_opts.endpoint.clone(),
            authority_host: self.store_opts.authority_host.clone(),
            distro_ref: self.build_opts.distro_ref.clone(),
            database: self.store_opts.database.clone(),
            procedure: self.store_opts.procedure.clone(),
            max_attempts: self.retry_opts.max_attempts,
            initial_delay_ms: self.retry_opts.initial_delay_ms,
            max_delay_ms: self.retry_opts.max_delay_ms,
        }
    }
}
