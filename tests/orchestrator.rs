//! Orchestrator Integration Tests
//!
//! Exercises trigger rejection, parallel fan-out, verification gating,
//! partial-failure isolation, duplicate handling, and cancellation using
//! fake builders, gates, and publishers.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tagship::{
    ArtifactBuilder, BuildArtifact, BuildTarget, ChannelPublisher, Orchestrator, PublishAck,
    ReleaseError, ReleaseOutcome, RunLimits, SourceTree, TargetKind, VerificationGate, VersionTag,
};

struct FakeBuilder {
    kind: TargetKind,
    calls: Arc<AtomicUsize>,
    fail_targets: BTreeSet<String>,
    delay: Option<Duration>,
}

impl FakeBuilder {
    fn new(kind: TargetKind, calls: Arc<AtomicUsize>) -> Self {
        Self {
            kind,
            calls,
            fail_targets: BTreeSet::new(),
            delay: None,
        }
    }

    fn failing(mut self, target: &str) -> Self {
        self.fail_targets.insert(target.to_string());
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ArtifactBuilder for FakeBuilder {
    fn kind(&self) -> TargetKind {
        self.kind
    }

    async fn build(
        &self,
        target: &BuildTarget,
        _source: &SourceTree,
        _version: &VersionTag,
    ) -> BuildArtifact {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_targets.contains(&target.name) {
            BuildArtifact::failed(
                target.clone(),
                ReleaseError::build("declared data directory does not exist: templates"),
            )
        } else {
            BuildArtifact::produced(target.clone(), Vec::new())
        }
    }
}

#[derive(Default)]
struct FakeGate {
    fail_targets: BTreeSet<String>,
    hang_targets: BTreeSet<String>,
}

impl FakeGate {
    fn failing(mut self, target: &str) -> Self {
        self.fail_targets.insert(target.to_string());
        self
    }

    fn hanging(mut self, target: &str) -> Self {
        self.hang_targets.insert(target.to_string());
        self
    }
}

#[async_trait]
impl VerificationGate for FakeGate {
    async fn verify(&self, artifact: BuildArtifact, _version: &VersionTag) -> BuildArtifact {
        if self.hang_targets.contains(&artifact.target.name) {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        if self.fail_targets.contains(&artifact.target.name) {
            artifact.fail_verification(ReleaseError::verification("probe exited with code 1"))
        } else {
            artifact.pass_verification()
        }
    }
}

/// Records every artifact it is handed, so tests can assert the "only
/// verified artifacts are published" contract under concurrent scheduling.
struct RecordingPublisher {
    channel: String,
    published: Arc<Mutex<Vec<String>>>,
    unverified_seen: Arc<AtomicUsize>,
    duplicate_targets: BTreeSet<String>,
}

impl RecordingPublisher {
    fn new(channel: &str, published: Arc<Mutex<Vec<String>>>, unverified: Arc<AtomicUsize>) -> Self {
        Self {
            channel: channel.to_string(),
            published,
            unverified_seen: unverified,
            duplicate_targets: BTreeSet::new(),
        }
    }

    fn duplicating(mut self, target: &str) -> Self {
        self.duplicate_targets.insert(target.to_string());
        self
    }
}

#[async_trait]
impl ChannelPublisher for RecordingPublisher {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn publish(
        &self,
        artifact: &BuildArtifact,
        _version: &VersionTag,
    ) -> Result<PublishAck, ReleaseError> {
        if !artifact.verified {
            self.unverified_seen.fetch_add(1, Ordering::SeqCst);
        }
        if self.duplicate_targets.contains(&artifact.target.name) {
            return Err(ReleaseError::DuplicateRelease {
                channel: self.channel.clone(),
            });
        }
        self.published
            .lock()
            .unwrap()
            .push(artifact.target.name.clone());
        Ok(PublishAck {
            channel: self.channel.clone(),
            location: None,
        })
    }
}

struct Harness {
    build_calls: Arc<AtomicUsize>,
    published_log: Arc<Mutex<Vec<String>>>,
    unverified_seen: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        Self {
            build_calls: Arc::new(AtomicUsize::new(0)),
            published_log: Arc::new(Mutex::new(Vec::new())),
            unverified_seen: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn three_targets() -> Vec<BuildTarget> {
        vec![
            BuildTarget::package(),
            BuildTarget::executable("linux"),
            BuildTarget::executable("macos"),
        ]
    }

    fn limits() -> RunLimits {
        RunLimits {
            build_timeout: Duration::from_secs(5),
            verify_timeout: Duration::from_millis(200),
        }
    }

    fn publisher(&self, channel: &str) -> RecordingPublisher {
        RecordingPublisher::new(
            channel,
            self.published_log.clone(),
            self.unverified_seen.clone(),
        )
    }

    fn orchestrator(&self, gate: FakeGate) -> Orchestrator {
        Orchestrator::new(Self::three_targets(), Self::limits())
            .with_builder(Arc::new(FakeBuilder::new(
                TargetKind::Package,
                self.build_calls.clone(),
            )))
            .with_builder(Arc::new(FakeBuilder::new(
                TargetKind::Executable,
                self.build_calls.clone(),
            )))
            .with_gate(TargetKind::Package, Arc::new(FakeGate::default()))
            .with_gate(TargetKind::Executable, Arc::new(gate))
            .with_publisher(TargetKind::Package, Arc::new(self.publisher("index")))
            .with_publisher(
                TargetKind::Executable,
                Arc::new(self.publisher("release-assets")),
            )
    }
}

fn source() -> SourceTree {
    SourceTree::new(".")
}

fn published_names(outcome: &ReleaseOutcome) -> Vec<String> {
    outcome.published().into_iter().collect()
}

#[tokio::test]
async fn test_non_release_refs_cause_no_side_effects() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(FakeGate::default());

    for raw in ["main", "v1.0", "v1.0.1-rc1", "refs/heads/feature"] {
        let outcome = orchestrator.run(raw, &source()).await;
        assert!(outcome.is_rejected(), "expected rejection for {raw:?}");
    }

    assert_eq!(harness.build_calls.load(Ordering::SeqCst), 0);
    assert!(harness.published_log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_full_release_publishes_every_target() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(FakeGate::default());

    let outcome = orchestrator.run("v2.3.0", &source()).await;

    assert_eq!(
        published_names(&outcome),
        vec!["exe-linux", "exe-macos", "package"]
    );
    assert!(outcome.failed().is_empty());
    assert_eq!(harness.build_calls.load(Ordering::SeqCst), 3);

    match outcome {
        ReleaseOutcome::Done { version, .. } => assert_eq!(version.raw, "v2.3.0"),
        other => panic!("expected done outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_verification_timeout_is_isolated_to_its_target() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(FakeGate::default().hanging("exe-macos"));

    let outcome = orchestrator.run("v2.3.0", &source()).await;

    assert_eq!(published_names(&outcome), vec!["exe-linux", "package"]);
    let failed = outcome.failed();
    assert_eq!(failed.len(), 1);
    assert!(matches!(
        failed.get("exe-macos"),
        Some(ReleaseError::VerificationTimeout { .. })
    ));
}

#[tokio::test]
async fn test_build_failure_does_not_cross_target_boundaries() {
    let harness = Harness::new();
    let orchestrator = Orchestrator::new(Harness::three_targets(), Harness::limits())
        .with_builder(Arc::new(FakeBuilder::new(
            TargetKind::Package,
            harness.build_calls.clone(),
        )))
        .with_builder(Arc::new(
            FakeBuilder::new(TargetKind::Executable, harness.build_calls.clone())
                .failing("exe-linux"),
        ))
        .with_gate(TargetKind::Package, Arc::new(FakeGate::default()))
        .with_gate(TargetKind::Executable, Arc::new(FakeGate::default()))
        .with_publisher(TargetKind::Package, Arc::new(harness.publisher("index")))
        .with_publisher(
            TargetKind::Executable,
            Arc::new(harness.publisher("release-assets")),
        );

    let outcome = orchestrator.run("v2.3.0", &source()).await;

    // The independent package target still publishes.
    assert!(outcome.published().contains("package"));
    assert!(outcome.published().contains("exe-macos"));
    let failed = outcome.failed();
    assert!(matches!(
        failed.get("exe-linux"),
        Some(ReleaseError::Build { .. })
    ));
}

#[tokio::test]
async fn test_unverified_artifacts_never_reach_a_publisher() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(
        FakeGate::default()
            .failing("exe-linux")
            .failing("exe-macos"),
    );

    let outcome = orchestrator.run("v2.3.0", &source()).await;

    assert_eq!(harness.unverified_seen.load(Ordering::SeqCst), 0);
    assert_eq!(published_names(&outcome), vec!["package"]);
    let failed = outcome.failed();
    assert!(matches!(
        failed.get("exe-linux"),
        Some(ReleaseError::Verification { .. })
    ));
    assert!(matches!(
        failed.get("exe-macos"),
        Some(ReleaseError::Verification { .. })
    ));
}

#[tokio::test]
async fn test_duplicate_release_is_reported_not_fatal() {
    let harness = Harness::new();
    let orchestrator = Orchestrator::new(Harness::three_targets(), Harness::limits())
        .with_builder(Arc::new(FakeBuilder::new(
            TargetKind::Package,
            harness.build_calls.clone(),
        )))
        .with_builder(Arc::new(FakeBuilder::new(
            TargetKind::Executable,
            harness.build_calls.clone(),
        )))
        .with_gate(TargetKind::Package, Arc::new(FakeGate::default()))
        .with_gate(TargetKind::Executable, Arc::new(FakeGate::default()))
        .with_publisher(
            TargetKind::Package,
            Arc::new(harness.publisher("index").duplicating("package")),
        )
        .with_publisher(
            TargetKind::Executable,
            Arc::new(harness.publisher("release-assets")),
        );

    let outcome = orchestrator.run("v1.0.1", &source()).await;

    // Not-yet-published executable targets still attempt and succeed.
    assert_eq!(published_names(&outcome), vec!["exe-linux", "exe-macos"]);
    let failed = outcome.failed();
    let package_error = failed.get("package").expect("package should be reported");
    assert!(package_error.is_duplicate());
}

#[tokio::test]
async fn test_cancellation_stops_in_flight_targets() {
    let harness = Harness::new();
    let orchestrator = Arc::new(
        Orchestrator::new(Harness::three_targets(), Harness::limits())
            .with_builder(Arc::new(FakeBuilder::new(
                TargetKind::Package,
                harness.build_calls.clone(),
            )))
            .with_builder(Arc::new(
                FakeBuilder::new(TargetKind::Executable, harness.build_calls.clone())
                    .slow(Duration::from_secs(4)),
            ))
            .with_gate(TargetKind::Package, Arc::new(FakeGate::default()))
            .with_gate(TargetKind::Executable, Arc::new(FakeGate::default()))
            .with_publisher(TargetKind::Package, Arc::new(harness.publisher("index")))
            .with_publisher(
                TargetKind::Executable,
                Arc::new(harness.publisher("release-assets")),
            ),
    );

    let runner = orchestrator.clone();
    let run = tokio::spawn(async move { runner.run("v1.0.1", &source()).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    orchestrator.cancel();

    let outcome = run.await.unwrap();
    let failed = outcome.failed();
    assert_eq!(failed.get("exe-linux"), Some(&ReleaseError::Cancelled));
    assert_eq!(failed.get("exe-macos"), Some(&ReleaseError::Cancelled));
    // The package target built and verified before the signal, but a
    // cancelled run starts no new publishes.
    assert_eq!(failed.get("package"), Some(&ReleaseError::Cancelled));
    assert!(outcome.published().is_empty());
}

#[tokio::test]
async fn test_build_timeout_marks_target_failed() {
    let harness = Harness::new();
    let orchestrator = Orchestrator::new(
        vec![BuildTarget::package()],
        RunLimits {
            build_timeout: Duration::from_millis(100),
            verify_timeout: Duration::from_millis(200),
        },
    )
    .with_builder(Arc::new(
        FakeBuilder::new(TargetKind::Package, harness.build_calls.clone())
            .slow(Duration::from_secs(60)),
    ))
    .with_gate(TargetKind::Package, Arc::new(FakeGate::default()))
    .with_publisher(TargetKind::Package, Arc::new(harness.publisher("index")));

    let outcome = orchestrator.run("v1.0.1", &source()).await;

    let failed = outcome.failed();
    assert!(matches!(
        failed.get("package"),
        Some(ReleaseError::BuildTimeout { .. })
    ));
    assert!(outcome.published().is_empty());
}
