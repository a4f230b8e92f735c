//! Artifact builders: one per target kind, shared contract.
//!
//! Builders invoke external packaging tools as subprocesses. They never
//! return an error to the orchestrator; a failure comes back as an artifact
//! with `produced = false` so one target's build cannot abort its siblings.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::{BuildArtifact, BuildTarget, ReleaseError, TargetKind, VersionTag};

pub mod executable;
pub mod package;

pub use executable::ExecutableBuilder;
pub use package::PackageBuilder;

/// The source checkout a release run builds from.
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
}

impl SourceTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a manifest-declared relative path inside the tree.
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }
}

/// Shared contract for the package and executable builders.
///
/// Builders must be invocable independently for every configured target with
/// no shared mutable state between invocations; the orchestrator runs one
/// task per target on top of this guarantee.
#[async_trait]
pub trait ArtifactBuilder: Send + Sync {
    /// Target kind this builder produces.
    fn kind(&self) -> TargetKind;

    /// Build one target from the source tree.
    ///
    /// The version is the tag driving the run; builders validate that what
    /// they produce actually carries it, so a mismatch fails at build time
    /// rather than surfacing after publish.
    async fn build(
        &self,
        target: &BuildTarget,
        source: &SourceTree,
        version: &VersionTag,
    ) -> BuildArtifact;
}

/// Run an external build tool to completion in the given directory.
///
/// `kill_on_drop` ensures a tool whose task is timed out or cancelled does
/// not linger as an orphan process.
pub(crate) async fn run_tool(command: &[String], cwd: &Path) -> Result<(), ReleaseError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| ReleaseError::build("build command is empty"))?;

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ReleaseError::build(&format!("failed to spawn {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);
        return Err(ReleaseError::build(&format!(
            "{program} exited with code {code}: {}",
            stderr.trim()
        )));
    }

    Ok(())
}
