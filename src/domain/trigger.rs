//! Trigger matching and version tag parsing.
//!
//! Only refs of the exact shape `v<major>.<minor>.<patch>` start a release
//! run. Everything else (ordinary commits, branch refs, pre-release tags)
//! parses to an unmatched trigger, which the orchestrator treats as a no-op.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A parsed release version tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTag {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,

    /// The tag exactly as pushed, e.g. `v1.0.1`.
    pub raw: String,
}

impl VersionTag {
    /// Version without the leading `v`, as embedded in package metadata
    /// and distribution filenames.
    pub fn number(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The result of matching an incoming ref against the release pattern.
///
/// Immutable once constructed; an unmatched trigger is not an error.
#[derive(Debug, Clone)]
pub struct ReleaseTrigger {
    pub raw_ref: String,
    pub matched: bool,
    pub version: Option<VersionTag>,
}

impl ReleaseTrigger {
    /// Match a pushed ref against `v<major>.<minor>.<patch>`.
    ///
    /// Fails closed: suffixes, missing components, and non-numeric
    /// components all yield `matched = false` and no version.
    pub fn parse(raw_ref: &str) -> Self {
        let version = parse_version(raw_ref);
        Self {
            raw_ref: raw_ref.to_string(),
            matched: version.is_some(),
            version,
        }
    }
}

fn parse_version(raw: &str) -> Option<VersionTag> {
    let rest = raw.strip_prefix('v')?;
    let mut parts = rest.split('.');

    let major = parse_component(parts.next()?)?;
    let minor = parse_component(parts.next()?)?;
    let patch = parse_component(parts.next()?)?;

    if parts.next().is_some() {
        return None;
    }

    Some(VersionTag {
        major,
        minor,
        patch,
        raw: raw.to_string(),
    })
}

fn parse_component(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
