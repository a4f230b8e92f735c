//! Terminal result of a release run.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::error::ReleaseError;
use super::trigger::VersionTag;

/// Acknowledgement returned by a channel publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishAck {
    /// Channel that accepted the artifact, e.g. `index`.
    pub channel: String,

    /// Where the published artifact can be found, if the channel says.
    pub location: Option<String>,
}

/// Aggregate over all targets of one trigger. Terminal: a partial outcome
/// (some published, some failed) is valid and is never rolled back, because
/// the channels are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReleaseOutcome {
    /// The ref did not match the release pattern. No side effects.
    Rejected { raw_ref: String },

    /// The run completed all phases for every target.
    Done {
        version: VersionTag,
        published: BTreeSet<String>,
        failed: BTreeMap<String, ReleaseError>,
    },
}

impl ReleaseOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// True when at least one target ended in the failed mapping.
    pub fn has_failures(&self) -> bool {
        match self {
            Self::Rejected { .. } => false,
            Self::Done { failed, .. } => !failed.is_empty(),
        }
    }

    /// Names of targets that published, empty for rejected runs.
    pub fn published(&self) -> BTreeSet<String> {
        match self {
            Self::Rejected { .. } => BTreeSet::new(),
            Self::Done { published, .. } => published.clone(),
        }
    }

    /// Per-target failures, empty for rejected runs.
    pub fn failed(&self) -> BTreeMap<String, ReleaseError> {
        match self {
            Self::Rejected { .. } => BTreeMap::new(),
            Self::Done { failed, .. } => failed.clone(),
        }
    }
}
