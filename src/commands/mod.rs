//! Implementation of the publish-build command.
//!
//! `mod.rs` is a thin entry point; the publish workflow lives in
//! [`publish`].

use std::path::Path;

use crate::cli::Cli;
use crate::error::Result;
use crate::publisher::PublishReceipt;
use crate::retry::ThreadSleeper;

pub(crate) mod publish;

pub use publish::{connect_cosmos, execute_with};


/// Execute the command described by the parsed CLI arguments.
pub fn execute(cli: &Cli) -> Result<PublishReceipt> {
    execute_with_dir(cli, None)
}

/// Execute with an explicit working directory for commit discovery.
pub fn execute_with_dir(cli: &Cli, working_dir: Option<&Path>) -> Result<PublishReceipt> {
    execute_with(cli, working_dir, connect_cosmos, ThreadSleeper)
}
