//! The build record published for every pipeline run.
//!
//! A [`BuildRecord`] is assembled once from [`BuildInputs`] and never mutated
//! afterwards. Its `id` is the source commit, which doubles as the idempotency
//! key inside the quality channel's partition.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{PublishError, Result};
use crate::timestamp::now_millis;

/// Quality channel whose versions carry no suffix.
pub const STABLE_QUALITY: &str = "stable";

/// Everything the builder needs to assemble a [`BuildRecord`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildInputs {
    /// Version as passed on the command line, without quality suffix
    pub raw_version: String,
    /// Release channel, e.g. `stable` or `insiders`
    pub quality: String,
    /// Full hexadecimal commit id the build was produced from
    pub commit_id: String,
    pub source_branch: String,
    pub queued_by: String,
    /// Whether the build comes from a distribution-specific source
    pub is_private: bool,
}

/// Download or installer artifact attached to a build by later pipeline steps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub platform: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub hash: String,
    pub size: u64,
}

/// The document written to the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    id: String,
    timestamp: u64,
    version: String,
    is_released: bool,
    private: bool,
    source_branch: String,
    queued_by: String,
    assets: Vec<Asset>,
    updates: BTreeMap<String, String>,
    #[serde(skip)]
    partition_key: String,
}

impl BuildRecord {
    /// Build a record stamped with the current wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidInput`] if the version or quality is
    /// empty, or the commit id is not a full lowercase hex object id.
    pub fn build(inputs: BuildInputs) -> Result<Self> {
        Self::build_at(inputs, now_millis())
    }

    /// Build a record with an explicit `timestamp` in milliseconds.
    pub fn build_at(inputs: BuildInputs, timestamp: u64) -> Result<Self> {
        validate(&inputs)?;

        let version = versioned(&inputs.raw_version, &inputs.quality);

        Ok(Self {
            id: inputs.commit_id,
            timestamp,
            version,
            is_released: false,
            private: inputs.is_private,
            source_branch: inputs.source_branch,
            queued_by: inputs.queued_by,
            assets: Vec::new(),
            updates: BTreeMap::new(),
            partition_key: inputs.quality,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_released(&self) -> bool {
        self.is_released
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn source_branch(&self) -> &str {
        &self.source_branch
    }

    pub fn queued_by(&self) -> &str {
        &self.queued_by
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn updates(&self) -> &BTreeMap<String, String> {
        &self.updates
    }

    /// Partition (container) that receives this record; the quality channel.
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }
}

/// Append the quality suffix unless the channel is stable.
pub fn versioned(raw_version: &str, quality: &str) -> String {
    if quality == STABLE_QUALITY {
        raw_version.to_string()
    } else {
        format!("{raw_version}-{quality}")
    }
}

/// Check that `commit_id` is a full SHA-1 or SHA-256 object id in lowercase hex.
pub fn is_commit_id(commit_id: &str) -> bool {
    static COMMIT_ID_RE: OnceLock<Regex> = OnceLock::new();

    let re = COMMIT_ID_RE.get_or_init(|| {
        Regex::new(r"^(?:[0-9a-f]{40}|[0-9a-f]{64})$").expect("commit id regex should compile")
    });

    re.is_match(commit_id)
}

fn validate(inputs: &BuildInputs) -> Result<()> {
    if inputs.raw_version.is_empty() {
        return Err(PublishError::InvalidInput {
            field: "version",
            message: "version must not be empty".to_string(),
        });
    }

    if inputs.quality.is_empty() {
        return Err(PublishError::InvalidInput {
            field: "quality",
            message: "quality must not be empty".to_string(),
        });
    }

    if !is_commit_id(&inputs.commit_id) {
        return Err(PublishError::InvalidInput {
            field: "commit",
            message: format!(
                "'{}' is not a full lowercase hexadecimal commit id",
                inputs.commit_id
            ),
        });
    }

    Ok(())
}
