//! Smoke check for frozen executables.
//!
//! Invokes the produced binary with a trivial probe flag and requires exit
//! code 0 within a bounded timeout. A hung or broken binary marks the
//! artifact unverified; nothing is retried here.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::domain::{BuildArtifact, ReleaseError, VersionTag};

use super::VerificationGate;

/// Gate for executable targets.
pub struct ExecutableGate {
    probe_flag: String,
    probe_timeout: Duration,
}

impl ExecutableGate {
    pub fn new(probe_flag: &str, probe_timeout: Duration) -> Self {
        Self {
            probe_flag: probe_flag.to_string(),
            probe_timeout,
        }
    }
}

#[async_trait]
impl VerificationGate for ExecutableGate {
    async fn verify(&self, artifact: BuildArtifact, _version: &VersionTag) -> BuildArtifact {
        let Some(binary) = artifact.primary_file().map(|p| p.to_path_buf()) else {
            return artifact
                .fail_verification(ReleaseError::verification("artifact has no executable file"));
        };

        debug!(binary = %binary.display(), flag = %self.probe_flag, "running smoke probe");

        let probe = Command::new(&binary)
            .arg(&self.probe_flag)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match timeout(self.probe_timeout, probe).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return artifact.fail_verification(ReleaseError::verification(&format!(
                    "failed to invoke executable: {e}"
                )));
            }
            Err(_) => {
                return artifact.fail_verification(ReleaseError::VerificationTimeout {
                    limit_seconds: self.probe_timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            return artifact.fail_verification(ReleaseError::verification(&format!(
                "probe exited with code {code}: {}",
                stderr.trim()
            )));
        }

        artifact.pass_verification()
    }
}
