//! Executable builder: freezes the application into one self-contained
//! binary per platform.
//!
//! Declared auxiliary inputs (template/static directories, the entry point)
//! are validated before the freeze tool runs, so a missing path fails the
//! build here rather than at runtime of the shipped executable.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::config::ExecutableSection;
use crate::domain::{ArtifactFile, BuildArtifact, BuildTarget, ReleaseError, TargetKind, VersionTag};

use super::{run_tool, ArtifactBuilder, SourceTree};

/// Builds one platform's executable target via the configured freeze tool.
pub struct ExecutableBuilder {
    cfg: ExecutableSection,
    binary_name: String,
}

impl ExecutableBuilder {
    pub fn new(cfg: ExecutableSection, binary_name: &str) -> Self {
        Self {
            cfg,
            binary_name: binary_name.to_string(),
        }
    }

    fn binary_file_name(&self, platform: &str) -> String {
        if platform.starts_with("win") {
            format!("{}.exe", self.binary_name)
        } else {
            self.binary_name.clone()
        }
    }

    async fn check_declared_paths(&self, source: &SourceTree) -> Result<(), ReleaseError> {
        for dir in &self.cfg.data_dirs {
            let path = source.join(dir);
            if !is_dir(&path).await {
                return Err(ReleaseError::build(&format!(
                    "declared data directory does not exist: {dir}"
                )));
            }
        }
        let entry = source.join(&self.cfg.entry_point);
        if !is_file(&entry).await {
            return Err(ReleaseError::build(&format!(
                "entry point does not exist: {}",
                self.cfg.entry_point
            )));
        }
        Ok(())
    }

    async fn build_inner(
        &self,
        target: &BuildTarget,
        source: &SourceTree,
    ) -> Result<Vec<ArtifactFile>, ReleaseError> {
        let platform = target
            .platform
            .as_deref()
            .ok_or_else(|| ReleaseError::build("executable target has no platform"))?;

        self.check_declared_paths(source).await?;

        let out_dir = format!("{}/{platform}", self.cfg.out_dir);
        let mut command = self.cfg.bundle_command.clone();
        command.extend(["--name".to_string(), self.binary_name.clone()]);
        command.extend(["--distpath".to_string(), out_dir.clone()]);
        for dir in &self.cfg.data_dirs {
            let dest = Path::new(dir)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| dir.clone());
            command.extend(["--add-data".to_string(), format!("{dir}:{dest}")]);
        }
        for import in &self.cfg.hidden_imports {
            command.extend(["--hidden-import".to_string(), import.clone()]);
        }
        command.push(self.cfg.entry_point.clone());

        if let Some(tool) = command.first() {
            debug!(platform, %tool, "invoking freeze tool");
        }
        run_tool(&command, source.root()).await?;

        let binary = source
            .join(&out_dir)
            .join(self.binary_file_name(platform));
        if !is_file(&binary).await {
            return Err(ReleaseError::build(&format!(
                "freeze tool completed but produced no binary at {out_dir}/{}",
                self.binary_file_name(platform)
            )));
        }

        let file = ArtifactFile::from_path(binary)
            .await
            .map_err(|e| ReleaseError::build(&format!("{e:#}")))?;
        Ok(vec![file])
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[async_trait]
impl ArtifactBuilder for ExecutableBuilder {
    fn kind(&self) -> TargetKind {
        TargetKind::Executable
    }

    async fn build(
        &self,
        target: &BuildTarget,
        source: &SourceTree,
        _version: &VersionTag,
    ) -> BuildArtifact {
        match self.build_inner(target, source).await {
            Ok(files) => BuildArtifact::produced(target.clone(), files),
            Err(error) => BuildArtifact::failed(target.clone(), error),
        }
    }
}
