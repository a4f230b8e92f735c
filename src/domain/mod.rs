//! Data structures shared across the release pipeline.
//!
//! Everything here is plain data: triggers, targets, artifacts, outcomes,
//! and the error taxonomy. Pipeline stages pass these by value, so no
//! locking is needed anywhere in a run.

pub mod artifact;
pub mod error;
pub mod outcome;
pub mod target;
pub mod trigger;

pub use artifact::{ArtifactFile, BuildArtifact};
pub use error::{sanitize, ReleaseError};
pub use outcome::{PublishAck, ReleaseOutcome};
pub use target::{BuildTarget, TargetKind};
pub use trigger::{ReleaseTrigger, VersionTag};
