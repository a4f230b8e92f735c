//! Package builder: source distribution + wheel via the packaging tool.

use async_trait::async_trait;
use tracing::debug;

use crate::config::PackageSection;
use crate::domain::{ArtifactFile, BuildArtifact, BuildTarget, ReleaseError, TargetKind, VersionTag};

use super::{run_tool, ArtifactBuilder, SourceTree};

/// Builds the package-index target by running the configured packaging
/// command, then requiring both distributions for the tag's version to
/// exist on disk.
pub struct PackageBuilder {
    project: String,
    cfg: PackageSection,
}

impl PackageBuilder {
    pub fn new(project: &str, cfg: PackageSection) -> Self {
        Self {
            project: project.to_string(),
            cfg,
        }
    }

    /// Project name as it appears in distribution filenames
    /// (dashes become underscores).
    fn dist_stem(&self) -> String {
        self.project.replace('-', "_").to_lowercase()
    }

    async fn build_inner(
        &self,
        source: &SourceTree,
        version: &VersionTag,
    ) -> Result<Vec<ArtifactFile>, ReleaseError> {
        run_tool(&self.cfg.build_command, source.root()).await?;

        let dist_dir = source.join(&self.cfg.dist_dir);
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&dist_dir).await.map_err(|e| {
            ReleaseError::build(&format!(
                "dist directory {} not readable after build: {e}",
                self.cfg.dist_dir
            ))
        })?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ReleaseError::build(&format!("failed to scan dist directory: {e}")))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        let stem = self.dist_stem();
        let number = version.number();

        let sdist = self.find_dist(
            &names,
            &format!("{stem}-{number}.tar.gz"),
            ".tar.gz",
            version,
        )?;
        let wheel_prefix = format!("{stem}-{number}-");
        let wheel = names
            .iter()
            .find(|n| n.starts_with(&wheel_prefix) && n.ends_with(".whl"))
            .cloned()
            .ok_or_else(|| self.missing_dist_error(&names, ".whl", version))?;

        debug!(sdist = %sdist, wheel = %wheel, "package distributions produced");

        let mut files = Vec::with_capacity(2);
        for name in [sdist, wheel] {
            let file = ArtifactFile::from_path(dist_dir.join(&name))
                .await
                .map_err(|e| ReleaseError::build(&format!("{e:#}")))?;
            files.push(file);
        }
        Ok(files)
    }

    fn find_dist(
        &self,
        names: &[String],
        expected: &str,
        suffix: &str,
        version: &VersionTag,
    ) -> Result<String, ReleaseError> {
        if names.iter().any(|n| n == expected) {
            return Ok(expected.to_string());
        }
        Err(self.missing_dist_error(names, suffix, version))
    }

    /// Distinguish "tool produced nothing" from "tool produced a different
    /// version", so the mismatch is caught at build time.
    fn missing_dist_error(
        &self,
        names: &[String],
        suffix: &str,
        version: &VersionTag,
    ) -> ReleaseError {
        let stem = format!("{}-", self.dist_stem());
        if let Some(other) = names
            .iter()
            .find(|n| n.starts_with(&stem) && n.ends_with(suffix))
        {
            return ReleaseError::build(&format!(
                "declared version mismatch: built {other} but tag is {}",
                version.raw
            ));
        }
        ReleaseError::build(&format!(
            "no {suffix} distribution for {} found in {}",
            version.number(),
            self.cfg.dist_dir
        ))
    }
}

#[async_trait]
impl ArtifactBuilder for PackageBuilder {
    fn kind(&self) -> TargetKind {
        TargetKind::Package
    }

    async fn build(
        &self,
        target: &BuildTarget,
        source: &SourceTree,
        version: &VersionTag,
    ) -> BuildArtifact {
        match self.build_inner(source, version).await {
            Ok(files) => BuildArtifact::produced(target.clone(), files),
            Err(error) => BuildArtifact::failed(target.clone(), error),
        }
    }
}
