//! Command-line interface for tagship.
//!
//! Wraps the orchestrator core: `run` executes a release for a pushed ref,
//! `check` validates the manifest offline, `targets` lists the configured
//! target set.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::builders::{ExecutableBuilder, PackageBuilder, SourceTree};
use crate::config::ReleaseConfig;
use crate::core::{Orchestrator, RunLimits};
use crate::domain::{ReleaseOutcome, TargetKind};
use crate::publishers::{Credential, IndexPublisher, NullPublisher, ReleaseAssetPublisher};
use crate::verify::{ExecutableGate, PackageGate};

/// tagship - tag-triggered release orchestrator
#[derive(Parser, Debug)]
#[command(name = "tagship")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Release manifest path
    #[arg(short, long, default_value = "release.yaml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a release for a pushed ref
    Run {
        /// The pushed version-control ref (e.g. v1.2.3)
        r#ref: String,

        /// Source tree to build from
        #[arg(short, long, default_value = ".")]
        source: PathBuf,

        /// Restrict the run to the named targets (repeatable)
        #[arg(long = "only", value_name = "TARGET")]
        only: Vec<String>,

        /// Build and verify, but publish nowhere
        #[arg(long)]
        dry_run: bool,

        /// Package index upload token
        #[arg(long, env = "TAGSHIP_INDEX_TOKEN", hide_env_values = true)]
        index_token: Option<String>,

        /// Release host credential
        #[arg(long, env = "TAGSHIP_RELEASE_TOKEN", hide_env_values = true)]
        release_token: Option<String>,
    },

    /// Validate the release manifest without building anything
    Check {
        /// Source tree to resolve declared paths against
        #[arg(short, long, default_value = ".")]
        source: PathBuf,
    },

    /// List configured build targets
    Targets,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = ReleaseConfig::from_file(&self.config)?;
        config.validate()?;

        match self.command {
            Commands::Run {
                r#ref,
                source,
                only,
                dry_run,
                index_token,
                release_token,
            } => {
                run_release(
                    config,
                    &r#ref,
                    source,
                    &only,
                    dry_run,
                    index_token,
                    release_token,
                )
                .await
            }
            Commands::Check { source } => check_manifest(&config, &source),
            Commands::Targets => {
                for target in config.targets() {
                    println!("{}  ({})", target.name, target.kind);
                }
                Ok(())
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_release(
    config: ReleaseConfig,
    raw_ref: &str,
    source: PathBuf,
    only: &[String],
    dry_run: bool,
    index_token: Option<String>,
    release_token: Option<String>,
) -> Result<()> {
    let mut targets = config.targets();
    if !only.is_empty() {
        targets.retain(|t| only.iter().any(|name| name == &t.name));
        if targets.is_empty() {
            anyhow::bail!("no configured target matches --only");
        }
    }

    let limits = RunLimits {
        build_timeout: Duration::from_secs(config.limits.build_timeout_seconds),
        verify_timeout: Duration::from_secs(config.limits.verify_timeout_seconds),
    };

    let mut orchestrator = Orchestrator::new(targets, limits)
        .with_builder(Arc::new(PackageBuilder::new(
            &config.project,
            config.package.clone(),
        )))
        .with_builder(Arc::new(ExecutableBuilder::new(
            config.executable.clone(),
            config.binary_name(),
        )))
        .with_gate(TargetKind::Package, Arc::new(PackageGate::new()))
        .with_gate(
            TargetKind::Executable,
            Arc::new(ExecutableGate::new(
                &config.executable.probe_flag,
                limits.verify_timeout,
            )),
        );

    orchestrator = if dry_run {
        orchestrator
            .with_publisher(TargetKind::Package, Arc::new(NullPublisher::new("index")))
            .with_publisher(
                TargetKind::Executable,
                Arc::new(NullPublisher::new("release-assets")),
            )
    } else {
        let index_url = config
            .publish
            .index_url
            .clone()
            .context("publish.index_url is not set in the manifest")?;
        let release_api = config
            .publish
            .release_api
            .clone()
            .context("publish.release_api is not set in the manifest")?;
        let index_token = index_token
            .context("package index token required (set TAGSHIP_INDEX_TOKEN or --index-token)")?;
        let release_token = release_token
            .context("release host token required (set TAGSHIP_RELEASE_TOKEN or --release-token)")?;

        orchestrator
            .with_publisher(
                TargetKind::Package,
                Arc::new(IndexPublisher::new(&index_url, Credential::new(index_token))),
            )
            .with_publisher(
                TargetKind::Executable,
                Arc::new(ReleaseAssetPublisher::new(
                    &release_api,
                    Credential::new(release_token),
                )),
            )
    };
    orchestrator.validate()?;

    let orchestrator = Arc::new(orchestrator);
    let canceller = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight targets");
            canceller.cancel();
        }
    });

    let outcome = orchestrator.run(raw_ref, &SourceTree::new(source)).await;
    report(&outcome);

    if outcome.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

/// Offline manifest check: catches missing declared paths before a tag is
/// ever pushed.
fn check_manifest(config: &ReleaseConfig, source: &PathBuf) -> Result<()> {
    let tree = SourceTree::new(source);
    let mut problems = Vec::new();

    for dir in &config.executable.data_dirs {
        if !tree.join(dir).is_dir() {
            problems.push(format!("declared data directory does not exist: {dir}"));
        }
    }
    if !config.executable.platforms.is_empty() && !tree.join(&config.executable.entry_point).is_file()
    {
        problems.push(format!(
            "entry point does not exist: {}",
            config.executable.entry_point
        ));
    }

    if problems.is_empty() {
        println!(
            "manifest ok: {} targets configured for {}",
            config.targets().len(),
            config.project
        );
        return Ok(());
    }
    for problem in &problems {
        eprintln!("error: {problem}");
    }
    anyhow::bail!("manifest check failed with {} problem(s)", problems.len());
}

fn report(outcome: &ReleaseOutcome) {
    match outcome {
        ReleaseOutcome::Rejected { raw_ref } => {
            println!(
                "ref {:?} is not a release tag; nothing to do",
                crate::domain::sanitize(raw_ref)
            );
        }
        ReleaseOutcome::Done {
            version,
            published,
            failed,
        } => {
            println!("release {version}:");
            for name in published {
                println!("  published  {name}");
            }
            for (name, error) in failed {
                println!("  failed     {name}: {error}");
            }
            if failed.is_empty() {
                println!("all {} target(s) published", published.len());
            }
        }
    }
}
