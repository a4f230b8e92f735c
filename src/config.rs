//! Release manifest loading.
//!
//! The manifest is a YAML file describing the one fixed target set for a
//! project: the package target plus one executable target per platform.
//! It is configuration, not runtime state; the orchestrator never mutates it.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::BuildTarget;

/// Parsed release manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseConfig {
    /// Project name as declared in package metadata, e.g. `claude-monitor`.
    pub project: String,

    #[serde(default)]
    pub package: PackageSection,

    #[serde(default)]
    pub executable: ExecutableSection,

    #[serde(default)]
    pub limits: Limits,

    #[serde(default)]
    pub publish: PublishSection,
}

/// Package target settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PackageSection {
    /// Command that produces the sdist and wheel.
    pub build_command: Vec<String>,

    /// Directory (relative to the source tree) the tool writes into.
    pub dist_dir: String,
}

impl Default for PackageSection {
    fn default() -> Self {
        Self {
            build_command: ["python", "-m", "build", "--outdir", "dist"]
                .map(String::from)
                .to_vec(),
            dist_dir: "dist".to_string(),
        }
    }
}

/// Executable target settings, shared by every platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutableSection {
    /// Binary name; falls back to the project name when empty.
    pub binary_name: String,

    /// Script the freeze tool bundles, relative to the source tree.
    pub entry_point: String,

    /// Auxiliary data directories (templates, static assets) bundled into
    /// the executable. Each must exist for the build to proceed.
    pub data_dirs: Vec<String>,

    /// Modules the freeze tool cannot discover on its own.
    pub hidden_imports: Vec<String>,

    /// Freeze tool invocation prefix; target-specific flags are appended.
    pub bundle_command: Vec<String>,

    /// Output directory the per-platform binaries land under.
    pub out_dir: String,

    /// Flag used by the smoke check, e.g. `--version`.
    pub probe_flag: String,

    /// Platforms to build one executable target for.
    pub platforms: Vec<String>,
}

impl Default for ExecutableSection {
    fn default() -> Self {
        Self {
            binary_name: String::new(),
            entry_point: String::new(),
            data_dirs: Vec::new(),
            hidden_imports: Vec::new(),
            bundle_command: ["pyinstaller", "--onefile", "--noconfirm"]
                .map(String::from)
                .to_vec(),
            out_dir: "dist".to_string(),
            probe_flag: "--version".to_string(),
            platforms: Vec::new(),
        }
    }
}

/// Per-task execution bounds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub build_timeout_seconds: u64,
    pub verify_timeout_seconds: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            build_timeout_seconds: 600,
            verify_timeout_seconds: 30,
        }
    }
}

/// Channel destinations. Credentials are supplied out-of-band, never here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublishSection {
    /// Package index upload endpoint.
    pub index_url: Option<String>,

    /// Repository API base of the release host.
    pub release_api: Option<String>,
}

impl ReleaseConfig {
    /// Load a manifest from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read release manifest: {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse a manifest from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("failed to parse release manifest")
    }

    /// Check the manifest is internally coherent before any run.
    pub fn validate(&self) -> Result<()> {
        if self.project.is_empty() {
            anyhow::bail!("manifest has an empty project name");
        }
        if self.package.build_command.is_empty() {
            anyhow::bail!("package.build_command cannot be empty");
        }
        if !self.executable.platforms.is_empty() {
            if self.executable.bundle_command.is_empty() {
                anyhow::bail!("executable.bundle_command cannot be empty");
            }
            if self.executable.entry_point.is_empty() {
                anyhow::bail!("executable.entry_point is required when platforms are configured");
            }
        }
        for platform in &self.executable.platforms {
            let count = self
                .executable
                .platforms
                .iter()
                .filter(|p| *p == platform)
                .count();
            if count > 1 {
                anyhow::bail!("platform '{platform}' is configured more than once");
            }
        }
        Ok(())
    }

    /// The fixed target set this manifest configures.
    pub fn targets(&self) -> Vec<BuildTarget> {
        let mut targets = vec![BuildTarget::package()];
        for platform in &self.executable.platforms {
            targets.push(BuildTarget::executable(platform));
        }
        targets
    }

    /// Executable binary name, defaulting to the project name.
    pub fn binary_name(&self) -> &str {
        if self.executable.binary_name.is_empty() {
            &self.project
        } else {
            &self.executable.binary_name
        }
    }
}
