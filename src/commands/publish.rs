//! Publish command implementation.

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::config::PublishConfig;
use crate::discovery::head_commit;
use crate::error::{PublishError, Result};
use crate::logging::Logger;
use crate::publisher::{PublishOutcome, PublishReceipt, RetryingPublisher};
use crate::record::BuildRecord;
use crate::retry::Sleeper;
use crate::store::{CosmosStore, DocumentStore, StoreError};

/// Executes the publish workflow against the store returned by `connect`.
///
/// Configuration is resolved and the record is built and validated before
/// `connect` is called, so a missing key or malformed input never reaches the
/// network. A credential rejected during the publish is reported as
/// [`PublishError::Authentication`].
pub fn execute_with<S, C, Z>(
    cli: &Cli,
    working_dir: Option<&Path>,
    connect: C,
    sleeper: Z,
) -> Result<PublishReceipt>
where
    S: DocumentStore,
    C: FnOnce(&PublishConfig, Logger) -> Result<S>,
    Z: Sleeper,
{
    let quiet = cli.global_opts().quiet();
    let log = Logger::new(cli.global_opts().verbose(), quiet);

    let config = resolve_config(cli, working_dir, log)?;

    log.info("Creating build...");
    log.info(format!("Quality: {}", config.quality()));

    let record = BuildRecord::build(config.build_inputs())?;

    log.info(format!("Version: {}", record.version()));
    log.info(format!("Commit: {}", record.id()));
    if record.is_private() {
        log.verbose(1, "Build is private");
    }

    let store = connect(&config, log)?;

    let receipt = RetryingPublisher::new(*config.retry())
        .with_sleeper(sleeper)
        .with_logger(log)
        .publish(&record, &store)
        .map_err(|error| match error {
            PublishError::Fatal {
                source: source @ StoreError::Unauthorized(_),
                ..
            } => PublishError::Authentication(source),
            other => other,
        })?;

    match receipt.outcome {
        PublishOutcome::Created => log.info("Build successfully created"),
        PublishOutcome::AlreadyExisted => log.info(format!(
            "Build successfully created (already present in '{}')",
            record.partition_key()
        )),
    }
    if log.level() > 0 && receipt.attempts > 1 {
        log.info(format!("Published after {} attempts", receipt.attempts));
    }

    Ok(receipt)
}

/// Opens a session on the Cosmos DB account named in `config`.
///
/// The token is requested by the first insert, inside the retry budget.
pub fn connect_cosmos(config: &PublishConfig, log: Logger) -> Result<CosmosStore> {
    log.verbose(1, format!("Connecting to {}", config.store().endpoint));

    CosmosStore::connect(config.store().clone(), config.credential().clone(), log).map_err(
        |source| PublishError::Fatal {
            partition: config.quality().to_string(),
            source,
        },
    )
}

/// Build the configuration, reading the commit from the checkout if needed.
fn resolve_config(cli: &Cli, working_dir: Option<&Path>, log: Logger) -> Result<PublishConfig> {
    let mut builder = cli.config_builder();

    if !builder.has_commit() {
        let dir = working_dir
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        match head_commit(&dir) {
            Ok(commit) => {
                log.verbose(1, format!("Using HEAD commit of {}", dir.display()));
                builder = builder.commit(commit);
            }
            Err(e) => log.verbose(1, format!("Could not read HEAD commit: {e}")),
        }
    }

    builder.build()
}
