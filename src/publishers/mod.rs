//! Channel publishers: upload verified artifacts to their destinations.
//!
//! Publishers only ever see artifacts with `verified == true`; the
//! orchestrator enforces that precondition. Credentials are passed into
//! constructors explicitly so the pipeline stays testable with fakes.

use std::fmt;

use async_trait::async_trait;

use crate::domain::{BuildArtifact, PublishAck, ReleaseError, VersionTag};

pub mod assets;
pub mod index;

pub use assets::ReleaseAssetPublisher;
pub use index::IndexPublisher;

/// An opaque channel secret.
///
/// `Debug` is redacted and there is no `Display`; token bytes leave this
/// type only at request-building time and must never enter logs or
/// diagnostics.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Raw token for request construction only.
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    /// Destination channel name, used in acks and duplicate reports.
    fn channel(&self) -> &str;

    /// Upload one verified artifact. A channel-side "version already
    /// exists" condition maps to [`ReleaseError::DuplicateRelease`], which
    /// callers report rather than retry.
    async fn publish(
        &self,
        artifact: &BuildArtifact,
        version: &VersionTag,
    ) -> Result<PublishAck, ReleaseError>;
}

/// Publisher that acknowledges without uploading anywhere. Used for dry
/// runs, where the operator wants build + verify with no channel traffic.
pub struct NullPublisher {
    channel: String,
}

impl NullPublisher {
    pub fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
        }
    }
}

#[async_trait]
impl ChannelPublisher for NullPublisher {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn publish(
        &self,
        _artifact: &BuildArtifact,
        _version: &VersionTag,
    ) -> Result<PublishAck, ReleaseError> {
        Ok(PublishAck {
            channel: format!("{} (dry run)", self.channel),
            location: None,
        })
    }
}
