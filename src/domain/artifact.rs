//! Build artifacts flowing through the pipeline.
//!
//! Each artifact is owned by exactly one pipeline stage at a time: the
//! builder creates it, the verification gate sets `verified`, and a
//! publisher consumes it. Artifacts are never shared across targets.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::ReleaseError;
use super::target::BuildTarget;

/// One file produced by a builder, with its checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: PathBuf,

    /// Hex-encoded SHA-256 of the file contents.
    pub sha256: String,
}

impl ArtifactFile {
    /// Read a produced file and record its digest.
    pub async fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read artifact file: {}", path.display()))?;
        Ok(Self {
            sha256: hex::encode(Sha256::digest(&bytes)),
            path,
        })
    }

    /// Basename used when uploading to a channel.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// The result of building (and later verifying) one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildArtifact {
    pub target: BuildTarget,

    /// Files on disk, empty unless `produced`.
    pub files: Vec<ArtifactFile>,

    pub produced: bool,
    pub verified: bool,

    /// Populated whenever `produced` or `verified` is false.
    pub error: Option<ReleaseError>,

    pub built_at: DateTime<Utc>,
}

impl BuildArtifact {
    /// A successful build, not yet verified.
    pub fn produced(target: BuildTarget, files: Vec<ArtifactFile>) -> Self {
        Self {
            target,
            files,
            produced: true,
            verified: false,
            error: None,
            built_at: Utc::now(),
        }
    }

    /// A failed build. Skips verification and goes straight into the
    /// outcome's failed mapping.
    pub fn failed(target: BuildTarget, error: ReleaseError) -> Self {
        Self {
            target,
            files: Vec::new(),
            produced: false,
            verified: false,
            error: Some(error),
            built_at: Utc::now(),
        }
    }

    /// Mark the artifact as having passed its verification gate.
    pub fn pass_verification(mut self) -> Self {
        self.verified = true;
        self.error = None;
        self
    }

    /// Mark the artifact as having failed its verification gate.
    pub fn fail_verification(mut self, error: ReleaseError) -> Self {
        self.verified = false;
        self.error = Some(error);
        self
    }

    /// First produced file, for single-file artifacts (executables).
    pub fn primary_file(&self) -> Option<&Path> {
        self.files.first().map(|f| f.path.as_path())
    }
}
