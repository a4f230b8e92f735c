//! Package index publisher.
//!
//! Uploads each distribution file with a bearer credential. An index-side
//! "already exists" response is a distinct, non-fatal duplicate-release
//! outcome: re-running a publish for a shipped version is a common operator
//! mistake and must not read as a generic failure.

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::domain::{sanitize, BuildArtifact, PublishAck, ReleaseError, VersionTag};

use super::{ChannelPublisher, Credential};

pub const CHANNEL: &str = "index";

/// Publishes the package target's distributions to a package index.
pub struct IndexPublisher {
    upload_url: String,
    credential: Credential,
    client: reqwest::Client,
}

impl IndexPublisher {
    pub fn new(upload_url: &str, credential: Credential) -> Self {
        Self {
            upload_url: upload_url.to_string(),
            credential,
            client: reqwest::Client::new(),
        }
    }

    async fn upload_file(
        &self,
        file_name: &str,
        sha256: &str,
        bytes: Vec<u8>,
        version: &VersionTag,
    ) -> Result<(), ReleaseError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new()
            .text(":action", "file_upload")
            .text("protocol_version", "1")
            .text("version", version.number())
            .text("sha256_digest", sha256.to_string())
            .part("content", part);

        let response = self
            .client
            .post(&self.upload_url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("token {}", self.credential.expose()),
            )
            .multipart(form)
            .send()
            .await
            .map_err(|e| ReleaseError::publish(&format!("index upload failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Err(ReleaseError::DuplicateRelease {
                channel: CHANNEL.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::BAD_REQUEST
                && body.to_ascii_lowercase().contains("already exist")
            {
                return Err(ReleaseError::DuplicateRelease {
                    channel: CHANNEL.to_string(),
                });
            }
            return Err(ReleaseError::publish(&format!(
                "index rejected {file_name} with status {status}: {}",
                sanitize(&body)
            )));
        }

        debug!(file = %file_name, %sha256, "index accepted distribution");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChannelPublisher for IndexPublisher {
    fn channel(&self) -> &str {
        CHANNEL
    }

    async fn publish(
        &self,
        artifact: &BuildArtifact,
        version: &VersionTag,
    ) -> Result<PublishAck, ReleaseError> {
        for file in &artifact.files {
            let bytes = tokio::fs::read(&file.path).await.map_err(|e| {
                ReleaseError::publish(&format!("cannot read {}: {e}", file.file_name()))
            })?;
            self.upload_file(&file.file_name(), &file.sha256, bytes, version)
                .await?;
        }

        info!(version = %version, files = artifact.files.len(), "package published to index");
        Ok(PublishAck {
            channel: CHANNEL.to_string(),
            location: None,
        })
    }
}
