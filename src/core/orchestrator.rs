//! Release orchestrator: match the trigger, fan out per target, gate each
//! artifact, publish what passed, aggregate.
//!
//! One instance runs one trigger at a time. Each target's data stays
//! private to its task until the single-writer aggregation step, so the
//! run needs no locks.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::builders::{ArtifactBuilder, SourceTree};
use crate::domain::{
    sanitize, BuildArtifact, BuildTarget, PublishAck, ReleaseError, ReleaseOutcome,
    ReleaseTrigger, TargetKind, VersionTag,
};
use crate::publishers::ChannelPublisher;
use crate::verify::VerificationGate;

/// Per-task execution bounds for one run. A hung build or probe is cut off
/// at these limits so it cannot block sibling targets.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub build_timeout: Duration,
    pub verify_timeout: Duration,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            build_timeout: Duration::from_secs(600),
            verify_timeout: Duration::from_secs(30),
        }
    }
}

/// Top-level controller for one release trigger.
pub struct Orchestrator {
    targets: Vec<BuildTarget>,
    builders: HashMap<TargetKind, Arc<dyn ArtifactBuilder>>,
    gates: HashMap<TargetKind, Arc<dyn VerificationGate>>,
    publishers: HashMap<TargetKind, Arc<dyn ChannelPublisher>>,
    limits: RunLimits,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl Orchestrator {
    pub fn new(targets: Vec<BuildTarget>, limits: RunLimits) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            targets,
            builders: HashMap::new(),
            gates: HashMap::new(),
            publishers: HashMap::new(),
            limits,
            cancel_tx,
            cancel_rx,
        }
    }

    pub fn with_builder(mut self, builder: Arc<dyn ArtifactBuilder>) -> Self {
        self.builders.insert(builder.kind(), builder);
        self
    }

    pub fn with_gate(mut self, kind: TargetKind, gate: Arc<dyn VerificationGate>) -> Self {
        self.gates.insert(kind, gate);
        self
    }

    pub fn with_publisher(mut self, kind: TargetKind, publisher: Arc<dyn ChannelPublisher>) -> Self {
        self.publishers.insert(kind, publisher);
        self
    }

    /// Check every configured target has a builder, gate, and publisher.
    pub fn validate(&self) -> anyhow::Result<()> {
        for target in &self.targets {
            if !self.builders.contains_key(&target.kind) {
                anyhow::bail!("no builder registered for {} targets", target.kind);
            }
            if !self.gates.contains_key(&target.kind) {
                anyhow::bail!("no verification gate registered for {} targets", target.kind);
            }
            if !self.publishers.contains_key(&target.kind) {
                anyhow::bail!("no publisher registered for {} targets", target.kind);
            }
        }
        Ok(())
    }

    /// Signal in-flight build/verify/publish tasks to stop. Publishes
    /// already acknowledged by a channel are not undone.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Run the full pipeline for one trigger event.
    ///
    /// Never fails outright: a non-matching ref yields the `Rejected`
    /// outcome and every per-target problem lands in the `failed` mapping.
    #[instrument(skip(self, source), fields(raw_ref = %sanitize(raw_ref)))]
    pub async fn run(&self, raw_ref: &str, source: &SourceTree) -> ReleaseOutcome {
        let trigger = ReleaseTrigger::parse(raw_ref);
        let Some(version) = trigger.version.clone() else {
            // Ordinary commits and branch refs land here; nothing to do.
            info!("ref does not match the release pattern, skipping");
            return ReleaseOutcome::Rejected {
                raw_ref: trigger.raw_ref,
            };
        };

        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            version = %version,
            targets = self.targets.len(),
            "starting release run"
        );

        let artifacts = self.build_and_verify(&version, source).await;

        let mut published = BTreeSet::new();
        let mut failed = BTreeMap::new();
        let mut ready = Vec::new();

        for artifact in artifacts {
            if artifact.verified {
                ready.push(artifact);
            } else {
                let error = artifact
                    .error
                    .clone()
                    .unwrap_or_else(|| ReleaseError::verification("artifact was not verified"));
                warn!(target = %artifact.target.name, %error, "target failed before publish");
                failed.insert(artifact.target.name.clone(), error);
            }
        }

        for (name, result) in self.publish_all(&version, ready).await {
            match result {
                Ok(ack) => {
                    info!(target = %name, channel = %ack.channel, "published");
                    published.insert(name);
                }
                Err(error) => {
                    warn!(target = %name, %error, "publish did not complete");
                    failed.insert(name, error);
                }
            }
        }

        info!(
            %run_id,
            published = published.len(),
            failed = failed.len(),
            "release run complete"
        );
        ReleaseOutcome::Done {
            version,
            published,
            failed,
        }
    }

    /// Fan out one build+verify task per target and collect the artifacts.
    async fn build_and_verify(
        &self,
        version: &VersionTag,
        source: &SourceTree,
    ) -> Vec<BuildArtifact> {
        let mut artifacts = Vec::with_capacity(self.targets.len());
        let mut tasks = JoinSet::new();

        for target in &self.targets {
            let Some(builder) = self.builders.get(&target.kind).cloned() else {
                artifacts.push(BuildArtifact::failed(
                    target.clone(),
                    ReleaseError::build("no builder registered for target kind"),
                ));
                continue;
            };
            let gate = self.gates.get(&target.kind).cloned();
            let target = target.clone();
            let source = source.clone();
            let version = version.clone();
            let limits = self.limits;
            let mut cancel = self.cancel_rx.clone();

            tasks.spawn(async move {
                tokio::select! {
                    artifact = target_task(builder, gate, &target, &source, &version, limits) => artifact,
                    _ = cancel.wait_for(|cancelled| *cancelled) => {
                        BuildArtifact::failed(target.clone(), ReleaseError::Cancelled)
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => warn!(error = %e, "target task aborted unexpectedly"),
            }
        }
        artifacts
    }

    /// Fan out publishing for verified artifacts, one task per target.
    async fn publish_all(
        &self,
        version: &VersionTag,
        ready: Vec<BuildArtifact>,
    ) -> Vec<(String, Result<PublishAck, ReleaseError>)> {
        let mut results = Vec::with_capacity(ready.len());
        let mut tasks = JoinSet::new();

        for artifact in ready {
            debug_assert!(artifact.verified, "unverified artifact reached publishing");

            let name = artifact.target.name.clone();
            // A cancelled run starts no new publishes; anything a channel
            // already acknowledged stays published.
            if *self.cancel_rx.borrow() {
                results.push((name, Err(ReleaseError::Cancelled)));
                continue;
            }
            let Some(publisher) = self.publishers.get(&artifact.target.kind).cloned() else {
                results.push((
                    name,
                    Err(ReleaseError::publish("no publisher registered for target kind")),
                ));
                continue;
            };
            let version = version.clone();
            let mut cancel = self.cancel_rx.clone();

            tasks.spawn(async move {
                debug!(target = %name, channel = %publisher.channel(), "publishing");
                let result = tokio::select! {
                    result = publisher.publish(&artifact, &version) => result,
                    _ = cancel.wait_for(|cancelled| *cancelled) => Err(ReleaseError::Cancelled),
                };
                (name, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => warn!(error = %e, "publish task aborted unexpectedly"),
            }
        }
        results
    }
}

/// Build one target, then gate it. Runs inside its own task with no shared
/// mutable state; everything comes back on the returned artifact.
async fn target_task(
    builder: Arc<dyn ArtifactBuilder>,
    gate: Option<Arc<dyn VerificationGate>>,
    target: &BuildTarget,
    source: &SourceTree,
    version: &VersionTag,
    limits: RunLimits,
) -> BuildArtifact {
    debug!(target = %target.name, "building");
    let artifact = match timeout(limits.build_timeout, builder.build(target, source, version)).await
    {
        Ok(artifact) => artifact,
        Err(_) => {
            return BuildArtifact::failed(
                target.clone(),
                ReleaseError::BuildTimeout {
                    limit_seconds: limits.build_timeout.as_secs(),
                },
            );
        }
    };

    if !artifact.produced {
        return artifact;
    }

    let Some(gate) = gate else {
        return artifact
            .fail_verification(ReleaseError::verification("no gate registered for target kind"));
    };

    debug!(target = %target.name, "verifying");
    let pending = artifact.clone();
    match timeout(limits.verify_timeout, gate.verify(artifact, version)).await {
        Ok(checked) => checked,
        Err(_) => pending.fail_verification(ReleaseError::VerificationTimeout {
            limit_seconds: limits.verify_timeout.as_secs(),
        }),
    }
}
