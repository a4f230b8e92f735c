//! tagship - tag-triggered release orchestrator
//!
//! Turns a single version-control tag push into a verified, multi-channel
//! release: a source distribution and wheel published to a package index,
//! plus one self-contained executable per platform attached to the hosted
//! release record.
//!
//! # Architecture
//!
//! The pipeline is built around per-target isolation:
//! - A trigger ref either matches `v<major>.<minor>.<patch>` or the run is
//!   a no-op
//! - Every target builds and verifies in its own task, bounded by timeouts
//! - Only verified artifacts reach a channel publisher
//! - One target's failure never blocks its siblings; partial outcomes are
//!   terminal and never rolled back
//!
//! # Modules
//!
//! - `domain`: data structures (triggers, targets, artifacts, outcomes)
//! - `builders`: package and executable artifact builders
//! - `verify`: structural and smoke-check verification gates
//! - `publishers`: package-index and release-asset channels
//! - `core`: the orchestrator
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Release the tag that was just pushed
//! tagship run v1.2.3 --source .
//!
//! # Re-run a single failed target
//! tagship run v1.2.3 --only exe-macos
//!
//! # Validate the manifest without building
//! tagship check
//! ```

pub mod builders;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod publishers;
pub mod verify;

// Re-export main types at crate root for convenience
pub use builders::{ArtifactBuilder, ExecutableBuilder, PackageBuilder, SourceTree};
pub use config::ReleaseConfig;
pub use core::{Orchestrator, RunLimits};
pub use domain::{
    ArtifactFile, BuildArtifact, BuildTarget, PublishAck, ReleaseError, ReleaseOutcome,
    ReleaseTrigger, TargetKind, VersionTag,
};
pub use publishers::{ChannelPublisher, Credential, IndexPublisher, ReleaseAssetPublisher};
pub use verify::{ExecutableGate, PackageGate, VerificationGate};
