//! Build target configuration.
//!
//! Targets are a fixed set resolved from the release manifest: one package
//! target plus one executable target per supported platform.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which pipeline variant handles a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Source distribution + wheel for the package index.
    Package,

    /// Self-contained executable for one platform.
    Executable,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package => f.write_str("package"),
            Self::Executable => f.write_str("executable"),
        }
    }
}

/// One independent build-and-publish unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
    /// Unique name used in outcomes and logs, e.g. `package` or `exe-linux`.
    pub name: String,

    pub kind: TargetKind,

    /// Platform identifier for executable targets.
    pub platform: Option<String>,
}

impl BuildTarget {
    /// The single package-index target.
    pub fn package() -> Self {
        Self {
            name: "package".to_string(),
            kind: TargetKind::Package,
            platform: None,
        }
    }

    /// The executable target for one platform.
    pub fn executable(platform: &str) -> Self {
        Self {
            name: format!("exe-{platform}"),
            kind: TargetKind::Executable,
            platform: Some(platform.to_string()),
        }
    }
}
