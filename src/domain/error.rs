//! Release error taxonomy and diagnostic sanitization.
//!
//! A trigger mismatch is deliberately absent here: a ref that does not look
//! like a release tag is a normal "do not run" signal, not an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on externally supplied text embedded in a diagnostic.
pub const MAX_DIAGNOSTIC_LEN: usize = 400;

/// Per-target failure reported in a [`crate::domain::ReleaseOutcome`].
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReleaseError {
    #[error("build failed: {reason}")]
    Build { reason: String },

    #[error("build timed out after {limit_seconds}s")]
    BuildTimeout { limit_seconds: u64 },

    #[error("verification failed: {reason}")]
    Verification { reason: String },

    #[error("verification timed out after {limit_seconds}s")]
    VerificationTimeout { limit_seconds: u64 },

    #[error("publish failed: {reason}")]
    Publish { reason: String },

    #[error("version already published to {channel}")]
    DuplicateRelease { channel: String },

    #[error("run cancelled before target completed")]
    Cancelled,
}

impl ReleaseError {
    /// Build failure with a sanitized reason.
    pub fn build(reason: &str) -> Self {
        Self::Build {
            reason: sanitize(reason),
        }
    }

    /// Verification failure with a sanitized reason.
    pub fn verification(reason: &str) -> Self {
        Self::Verification {
            reason: sanitize(reason),
        }
    }

    /// Publish failure with a sanitized reason.
    pub fn publish(reason: &str) -> Self {
        Self::Publish {
            reason: sanitize(reason),
        }
    }

    /// Whether this is the non-fatal "channel already has this version" case.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateRelease { .. })
    }
}

/// Strip control characters and truncate before external input enters a
/// diagnostic. Subprocess stderr, HTTP bodies, and raw refs all pass through
/// here; credentials must never reach this function in the first place.
pub fn sanitize(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let trimmed = cleaned.trim();

    if trimmed.chars().count() > MAX_DIAGNOSTIC_LEN {
        let cut: String = trimmed.chars().take(MAX_DIAGNOSTIC_LEN).collect();
        format!("{}...", cut.trim_end())
    } else {
        trimmed.to_string()
    }
}
