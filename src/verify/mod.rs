//! Verification gates: cheap smoke checks between build and publish.
//!
//! A gate never errors out-of-band; it hands back the artifact with
//! `verified` set (or a failure recorded on it), keeping the per-target
//! failure isolation intact.

use async_trait::async_trait;

use crate::domain::{BuildArtifact, VersionTag};

pub mod executable;
pub mod package;

pub use executable::ExecutableGate;
pub use package::PackageGate;

#[async_trait]
pub trait VerificationGate: Send + Sync {
    /// Check one produced artifact. Returns the artifact with `verified`
    /// updated; a failed check records the observed condition on it.
    async fn verify(&self, artifact: BuildArtifact, version: &VersionTag) -> BuildArtifact;
}
