//! Release-asset publisher.
//!
//! Attaches executables to the hosted release record for the tag,
//! creating the record first if one does not yet exist (idempotent
//! create-or-attach).

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::{sanitize, BuildArtifact, PublishAck, ReleaseError, VersionTag};

use super::{ChannelPublisher, Credential};

pub const CHANNEL: &str = "release-assets";

/// Publishes executable targets as assets on the hosted release record.
pub struct ReleaseAssetPublisher {
    /// Repository API base, e.g. `https://api.example.com/repos/owner/name`.
    api_base: String,
    credential: Credential,
    client: reqwest::Client,
}

/// The subset of the host's release record we need.
#[derive(Debug, Clone, Deserialize)]
struct ReleaseRecord {
    html_url: Option<String>,

    /// Asset endpoint, possibly suffixed with a `{?name,label}` template.
    upload_url: String,
}

impl ReleaseAssetPublisher {
    pub fn new(api_base: &str, credential: Credential) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            credential,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the release record for the tag, creating it if absent.
    async fn ensure_release(&self, version: &VersionTag) -> Result<ReleaseRecord, ReleaseError> {
        let lookup_url = format!("{}/releases/tags/{}", self.api_base, version.raw);
        let response = self
            .client
            .get(&lookup_url)
            .bearer_auth(self.credential.expose())
            .send()
            .await
            .map_err(|e| ReleaseError::publish(&format!("release lookup failed: {e}")))?;

        if response.status() != StatusCode::NOT_FOUND {
            return parse_record(response, "release lookup").await;
        }

        debug!(tag = %version.raw, "no release record yet, creating one");
        let response = self
            .client
            .post(format!("{}/releases", self.api_base))
            .bearer_auth(self.credential.expose())
            .json(&serde_json::json!({
                "tag_name": version.raw,
                "name": version.raw,
            }))
            .send()
            .await
            .map_err(|e| ReleaseError::publish(&format!("release creation failed: {e}")))?;

        parse_record(response, "release creation").await
    }

    async fn upload_asset(
        &self,
        upload_base: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ReleaseError> {
        let response = self
            .client
            .post(format!("{upload_base}?name={file_name}"))
            .bearer_auth(self.credential.expose())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ReleaseError::publish(&format!("asset upload failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            // The host refuses same-named assets; this tag already carries one.
            return Err(ReleaseError::DuplicateRelease {
                channel: CHANNEL.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReleaseError::publish(&format!(
                "host rejected asset {file_name} with status {status}: {}",
                sanitize(&body)
            )));
        }

        debug!(file = %file_name, "asset attached to release");
        Ok(())
    }
}

async fn parse_record(
    response: reqwest::Response,
    operation: &str,
) -> Result<ReleaseRecord, ReleaseError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ReleaseError::publish(&format!(
            "{operation} returned status {status}: {}",
            sanitize(&body)
        )));
    }
    response
        .json()
        .await
        .map_err(|e| ReleaseError::publish(&format!("{operation} returned malformed record: {e}")))
}

#[async_trait::async_trait]
impl ChannelPublisher for ReleaseAssetPublisher {
    fn channel(&self) -> &str {
        CHANNEL
    }

    async fn publish(
        &self,
        artifact: &BuildArtifact,
        version: &VersionTag,
    ) -> Result<PublishAck, ReleaseError> {
        let record = self.ensure_release(version).await?;
        let upload_base = record
            .upload_url
            .split('{')
            .next()
            .unwrap_or(&record.upload_url)
            .to_string();

        for file in &artifact.files {
            let bytes = tokio::fs::read(&file.path).await.map_err(|e| {
                ReleaseError::publish(&format!("cannot read {}: {e}", file.file_name()))
            })?;
            self.upload_asset(&upload_base, &file.file_name(), bytes)
                .await?;
        }

        info!(
            target = %artifact.target.name,
            tag = %version.raw,
            "executable attached to release"
        );
        Ok(PublishAck {
            channel: CHANNEL.to_string(),
            location: record.html_url,
        })
    }
}
