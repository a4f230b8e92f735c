//! Structural checks for package distributions.
//!
//! Offline by design: the sdist must be a readable gzipped tar with a
//! parseable `PKG-INFO`, the wheel a readable zip with a parseable
//! `METADATA`, and both must declare the tag's version. No network, no
//! install.

use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tracing::debug;

use crate::domain::{BuildArtifact, ReleaseError, VersionTag};

use super::VerificationGate;

/// Gate for the package target's sdist + wheel pair.
#[derive(Debug, Default)]
pub struct PackageGate;

impl PackageGate {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VerificationGate for PackageGate {
    async fn verify(&self, artifact: BuildArtifact, version: &VersionTag) -> BuildArtifact {
        for file in &artifact.files {
            let name = file.file_name();
            let result = if name.ends_with(".whl") {
                check_wheel(&file.path, version)
            } else if name.ends_with(".tar.gz") {
                check_sdist(&file.path, version)
            } else {
                Err(format!("unexpected distribution file: {name}"))
            };

            if let Err(reason) = result {
                return artifact
                    .fail_verification(ReleaseError::verification(&format!("{name}: {reason}")));
            }
            debug!(file = %name, "distribution structurally sound");
        }
        artifact.pass_verification()
    }
}

fn check_wheel(path: &Path, version: &VersionTag) -> Result<(), String> {
    let file = std::fs::File::open(path).map_err(|e| format!("cannot open wheel: {e}"))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| format!("wheel is not a valid zip: {e}"))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| format!("unreadable wheel entry: {e}"))?;
        if entry.name().ends_with(".dist-info/METADATA") {
            let mut metadata = String::new();
            entry
                .read_to_string(&mut metadata)
                .map_err(|e| format!("METADATA is not readable text: {e}"))?;
            return check_metadata_version(&metadata, version);
        }
    }
    Err("wheel has no dist-info METADATA".to_string())
}

fn check_sdist(path: &Path, version: &VersionTag) -> Result<(), String> {
    let file = std::fs::File::open(path).map_err(|e| format!("cannot open sdist: {e}"))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    let entries = archive
        .entries()
        .map_err(|e| format!("sdist is not a valid tar archive: {e}"))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| format!("unreadable sdist entry: {e}"))?;
        let is_pkg_info = entry
            .path()
            .map(|p| p.file_name().is_some_and(|n| n == "PKG-INFO"))
            .unwrap_or(false);
        if is_pkg_info {
            let mut metadata = String::new();
            entry
                .read_to_string(&mut metadata)
                .map_err(|e| format!("PKG-INFO is not readable text: {e}"))?;
            return check_metadata_version(&metadata, version);
        }
    }
    Err("sdist has no PKG-INFO".to_string())
}

fn check_metadata_version(metadata: &str, version: &VersionTag) -> Result<(), String> {
    let declared = metadata
        .lines()
        .find_map(|line| line.strip_prefix("Version:"))
        .map(str::trim)
        .ok_or("metadata has no Version field")?;

    if declared != version.number() {
        return Err(format!(
            "metadata declares version {declared}, tag is {}",
            version.raw
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::domain::{ArtifactFile, BuildTarget, ReleaseTrigger};

    fn version(raw: &str) -> VersionTag {
        ReleaseTrigger::parse(raw).version.unwrap()
    }

    fn metadata(version: &str) -> String {
        format!("Metadata-Version: 2.1\nName: claude-monitor\nVersion: {version}\n")
    }

    fn write_wheel(path: &Path, version: &str) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(
                "claude_monitor-0.0.0.dist-info/METADATA",
                SimpleFileOptions::default(),
            )
            .unwrap();
        writer.write_all(metadata(version).as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    fn write_sdist(path: &Path, version: &str) {
        let file = std::fs::File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let body = metadata(version);
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(
                &mut header,
                format!("claude_monitor-{version}/PKG-INFO"),
                body.as_bytes(),
            )
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    async fn artifact_for(paths: Vec<std::path::PathBuf>) -> BuildArtifact {
        let mut files = Vec::new();
        for path in paths {
            files.push(ArtifactFile::from_path(path).await.unwrap());
        }
        BuildArtifact::produced(BuildTarget::package(), files)
    }

    #[tokio::test]
    async fn test_wellformed_distributions_verify() {
        let dir = tempfile::tempdir().unwrap();
        let sdist = dir.path().join("claude_monitor-1.0.1.tar.gz");
        let wheel = dir.path().join("claude_monitor-1.0.1-py3-none-any.whl");
        write_sdist(&sdist, "1.0.1");
        write_wheel(&wheel, "1.0.1");

        let artifact = artifact_for(vec![sdist, wheel]).await;
        let verified = PackageGate::new().verify(artifact, &version("v1.0.1")).await;

        assert!(verified.verified, "error: {:?}", verified.error);
    }

    #[tokio::test]
    async fn test_metadata_version_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let wheel = dir.path().join("claude_monitor-1.0.1-py3-none-any.whl");
        write_wheel(&wheel, "0.9.0");

        let artifact = artifact_for(vec![wheel]).await;
        let checked = PackageGate::new().verify(artifact, &version("v1.0.1")).await;

        assert!(!checked.verified);
        match checked.error {
            Some(ReleaseError::Verification { reason }) => {
                assert!(reason.contains("0.9.0"), "reason: {reason}");
            }
            other => panic!("expected verification failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_corrupt_archive_fails() {
        let dir = tempfile::tempdir().unwrap();
        let wheel = dir.path().join("claude_monitor-1.0.1-py3-none-any.whl");
        std::fs::write(&wheel, b"this is not a zip file").unwrap();

        let artifact = artifact_for(vec![wheel]).await;
        let checked = PackageGate::new().verify(artifact, &version("v1.0.1")).await;

        assert!(!checked.verified);
        assert!(matches!(
            checked.error,
            Some(ReleaseError::Verification { .. })
        ));
    }

    #[tokio::test]
    async fn test_sdist_without_pkg_info_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sdist = dir.path().join("claude_monitor-1.0.1.tar.gz");

        let file = std::fs::File::create(&sdist).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(2);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "claude_monitor-1.0.1/README", &b"hi"[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let artifact = artifact_for(vec![sdist]).await;
        let checked = PackageGate::new().verify(artifact, &version("v1.0.1")).await;

        assert!(!checked.verified);
        match checked.error {
            Some(ReleaseError::Verification { reason }) => {
                assert!(reason.contains("PKG-INFO"), "reason: {reason}");
            }
            other => panic!("expected verification failure, got {other:?}"),
        }
    }
}
