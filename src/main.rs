//! # publish-build CLI
//!
//! Records a pipeline build in the release document store. Run once per
//! build, after the version is known and before any asset is uploaded:
//!
//! ```bash
//! publish-build 1.85.0
//! ```
//!
//! ## Environment Variables
//!
//! - `VSCODE_QUALITY`: Quality channel, also the target container
//! - `BUILD_SOURCEVERSION`: Commit id (default: HEAD of the checkout)
//! - `BUILD_QUEUEDBY`, `BUILD_SOURCEBRANCH`: Provenance metadata
//! - `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`: Service
//!   principal used to authenticate
//! - `AZURE_DOCUMENTDB_ENDPOINT`: Cosmos DB account endpoint
//! - `AZURE_AUTHORITY_HOST`: Identity platform (default: Entra ID public cloud)
//! - `VSCODE_DISTRO_REF`: Marks the build private when set
//!
//! Run `publish-build --help` for retry and store overrides.

use std::io::IsTerminal;

use publish_build::cli::Cli;

fn main() -> miette::Result<()> {
    miette::set_panic_hook();

    // Plain reports when stderr is a pipeline log rather than a terminal
    if std::io::stderr().is_terminal() {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::unicode_nocolor())
                    .with_context_lines(3),
            )
        }))?;
    } else {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::none())
                    .with_context_lines(0),
            )
        }))?;
    }

    let cli = Cli::parse_args();

    publish_build::commands::execute(&cli)
        .map(|_| ())
        .map_err(Into::into)
}
