use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use terraform_indexer::{
    Collaborators, ContentSource, Coordinator, CoordinatorHandle, CrawlReport,
    DiagnosticCollection, DocumentParser, FailureKind, FileEvent, FileIdentity, FsSource,
    HclDocumentParser, IndexRegistry, IndexingConfig, NoProgress, Outcome, OverlaySource,
    SkipReason, StaticConfig, TextSnapshot, WorkspaceScanner,
};
use tokio::sync::RwLock;

const VALID_TEMPLATE: &str = r#"
resource "aws_s3_bucket" "logs" {
  bucket = "logs"
}

module "network" {
  source = "./modules/network"
}
"#;

const BROKEN_TEMPLATE: &str = r#"
resource "aws_s3_bucket" "broken" {
  bucket = "oops"
"#;

const VALID_PLAN: &str = r#"{
  "format_version": "1.2",
  "terraform_version": "1.7.5",
  "resource_changes": [
    {
      "address": "aws_s3_bucket.logs",
      "mode": "managed",
      "type": "aws_s3_bucket",
      "name": "logs",
      "change": { "actions": ["create"], "before": null, "after": { "bucket": "logs" } }
    }
  ]
}"#;

struct Workspace {
    dir: TempDir,
    handle: CoordinatorHandle,
    diagnostics: Arc<DiagnosticCollection>,
}

impl Workspace {
    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn id(&self, name: &str) -> FileIdentity {
        FileIdentity::new(self.root().join(name)).unwrap()
    }

    fn write(&self, name: &str, content: &str) -> FileIdentity {
        let path = self.root().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        self.id(name)
    }

    async fn indexed(&self, id: &FileIdentity) -> bool {
        let registry = self.handle.registry();
        let registry = registry.read().await;
        registry
            .resolve(id)
            .is_some_and(|index| index.contains(id))
    }

    async fn crawl(&self) -> CrawlReport {
        self.handle
            .crawl(&WorkspaceScanner::new(self.root()), &NoProgress)
            .await
            .unwrap()
    }
}

fn start(
    dir: TempDir,
    config: IndexingConfig,
    content: Option<Arc<dyn ContentSource>>,
) -> Workspace {
    let mut registry = IndexRegistry::new();
    registry.register_root(dir.path()).unwrap();
    let registry = Arc::new(RwLock::new(registry));

    let diagnostics = Arc::new(DiagnosticCollection::new());
    let mut collaborators = Collaborators::filesystem(
        Arc::new(StaticConfig::new(config).unwrap()),
        diagnostics.clone(),
    );
    if let Some(content) = content {
        collaborators.content = content;
    }

    Workspace {
        dir,
        handle: Coordinator::new(registry, collaborators).start(64),
        diagnostics,
    }
}

fn workspace() -> Workspace {
    start(tempfile::tempdir().unwrap(), IndexingConfig::default(), None)
}

#[tokio::test]
async fn crawl_indexes_valid_files_and_reports_broken_templates() {
    let ws = workspace();
    let a = ws.write("a.tf", VALID_TEMPLATE);
    let b = ws.write("b.tf", BROKEN_TEMPLATE);
    let c = ws.write("c.tfplan", VALID_PLAN);

    let report = ws.crawl().await;
    assert_eq!(
        report,
        CrawlReport {
            files: 3,
            indexed: 2,
            failed: 1,
            ..CrawlReport::default()
        }
    );

    assert!(ws.indexed(&a).await);
    assert!(!ws.indexed(&b).await);
    assert!(ws.indexed(&c).await);

    let diagnostics = ws.diagnostics.get(&b);
    assert_eq!(diagnostics.len(), 1);
    let parse_error = HclDocumentParser.parse(BROKEN_TEMPLATE).unwrap_err();
    assert_eq!(
        diagnostics[0].message,
        format!("Unhandled error parsing document: {parse_error}")
    );
    assert_eq!(ws.diagnostics.file_count(), 1);

    let registry = ws.handle.registry();
    let registry = registry.read().await;
    let index = registry.resolve(&a).unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index.find_resource("aws_s3_bucket.logs").len(), 1);
    assert_eq!(index.find_module("network").len(), 1);
    assert_eq!(index.planned_changes("aws_s3_bucket.logs").len(), 1);
}

#[tokio::test]
async fn deleting_a_plan_removes_only_that_entry() {
    let ws = workspace();
    let a = ws.write("a.tf", VALID_TEMPLATE);
    let c = ws.write("c.tfplan", VALID_PLAN);
    ws.crawl().await;

    std::fs::remove_file(c.path()).unwrap();
    let outcome = ws.handle.process(FileEvent::deleted(c.clone())).await.unwrap();

    assert_eq!(outcome, Outcome::Removed);
    assert!(!ws.indexed(&c).await);
    assert!(ws.indexed(&a).await);
}

#[tokio::test]
async fn fixing_a_template_clears_its_diagnostic() {
    let ws = workspace();
    let b = ws.write("b.tf", BROKEN_TEMPLATE);

    let outcome = ws.handle.process(FileEvent::created(b.clone())).await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::Failed {
            kind: FailureKind::Parse,
            ..
        }
    ));
    assert_eq!(ws.diagnostics.get(&b).len(), 1);

    ws.write("b.tf", VALID_TEMPLATE);
    let outcome = ws.handle.process(FileEvent::changed(b.clone())).await.unwrap();
    assert_eq!(outcome, Outcome::Indexed);
    assert!(ws.diagnostics.get(&b).is_empty());
}

#[tokio::test]
async fn parse_error_keeps_previous_entry() {
    let ws = workspace();
    let a = ws.write("a.tf", VALID_TEMPLATE);
    ws.handle.process(FileEvent::created(a.clone())).await.unwrap();

    ws.write("a.tf", BROKEN_TEMPLATE);
    ws.handle.process(FileEvent::changed(a.clone())).await.unwrap();

    let registry = ws.handle.registry();
    let registry = registry.read().await;
    let doc = registry.resolve(&a).unwrap().get(&a).unwrap();
    assert!(doc
        .template()
        .is_some_and(|model| model.declares_resource("aws_s3_bucket.logs")));
}

#[tokio::test]
async fn malformed_plan_is_reported_without_indexing() {
    let ws = workspace();
    let plan = ws.write("broken.tfplan", r#"{"format_version": "1.2", "resource_changes": ["#);

    let outcome = ws.handle.process(FileEvent::created(plan.clone())).await.unwrap();

    assert!(matches!(
        outcome,
        Outcome::Failed {
            kind: FailureKind::MalformedPlan,
            ..
        }
    ));
    assert!(!ws.indexed(&plan).await);
    assert_eq!(ws.diagnostics.file_count(), 0);
}

#[tokio::test]
async fn file_outside_every_root_is_unresolved() {
    let ws = workspace();
    let elsewhere = tempfile::tempdir().unwrap();
    let stray = elsewhere.path().join("main.tf");
    std::fs::write(&stray, VALID_TEMPLATE).unwrap();
    let stray = FileIdentity::new(stray).unwrap();

    let outcome = ws.handle.process(FileEvent::created(stray)).await.unwrap();

    assert_eq!(outcome, Outcome::Unresolved);
    let registry = ws.handle.registry();
    assert!(registry.read().await.indexes().all(|index| index.is_empty()));
}

#[tokio::test]
async fn unregistered_root_stops_resolving() {
    let ws = workspace();
    let a = ws.write("a.tf", VALID_TEMPLATE);

    ws.handle
        .registry()
        .write()
        .await
        .unregister_root(ws.root())
        .unwrap();

    let outcome = ws.handle.process(FileEvent::changed(a)).await.unwrap();
    assert_eq!(outcome, Outcome::Unresolved);
}

#[tokio::test]
async fn unknown_file_kinds_are_ignored() {
    let ws = workspace();
    let readme = ws.write("README.md", "# stack");

    let outcome = ws.handle.process(FileEvent::created(readme)).await.unwrap();
    assert_eq!(outcome, Outcome::Ignored);
}

#[tokio::test]
async fn excluded_files_are_skipped() {
    let config = IndexingConfig {
        exclude: vec!["generated/**".to_string()],
        ..IndexingConfig::default()
    };
    let ws = start(tempfile::tempdir().unwrap(), config, None);
    let generated = ws.write("generated/main.tf", VALID_TEMPLATE);
    let kept = ws.write("main.tf", VALID_TEMPLATE);

    let report = ws.crawl().await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.indexed, 1);
    assert!(!ws.indexed(&generated).await);
    assert!(ws.indexed(&kept).await);
}

#[tokio::test]
async fn disabled_indexing_still_applies_deletes() {
    let config = IndexingConfig {
        enabled: false,
        ..IndexingConfig::default()
    };
    let ws = start(tempfile::tempdir().unwrap(), config, None);
    let a = ws.write("a.tf", VALID_TEMPLATE);

    let outcome = ws.handle.process(FileEvent::created(a.clone())).await.unwrap();
    assert_eq!(outcome, Outcome::Skipped(SkipReason::Disabled));

    let outcome = ws.handle.process(FileEvent::deleted(a)).await.unwrap();
    assert_eq!(outcome, Outcome::Removed);
}

#[tokio::test]
async fn unsaved_editor_buffers_are_not_indexed() {
    let dir = tempfile::tempdir().unwrap();
    let overlay = Arc::new(OverlaySource::new(Arc::new(FsSource)));
    let ws = start(dir, IndexingConfig::default(), Some(overlay.clone()));
    let a = ws.write("a.tf", VALID_TEMPLATE);

    overlay.open(a.clone(), BROKEN_TEMPLATE, true);
    let outcome = ws.handle.process(FileEvent::changed(a.clone())).await.unwrap();
    assert_eq!(outcome, Outcome::Skipped(SkipReason::Unstable));
    assert!(!ws.indexed(&a).await);
    assert!(ws.diagnostics.get(&a).is_empty());

    overlay.close(&a);
    let outcome = ws.handle.process(FileEvent::changed(a.clone())).await.unwrap();
    assert_eq!(outcome, Outcome::Indexed);
}

#[tokio::test]
async fn later_change_wins() {
    let ws = workspace();
    let a = ws.write("a.tf", r#"resource "aws_s3_bucket" "first" {}"#);
    ws.handle.process(FileEvent::created(a.clone())).await.unwrap();

    ws.write("a.tf", r#"resource "aws_s3_bucket" "second" {}"#);
    ws.handle.submit(FileEvent::changed(a.clone())).await.unwrap();
    ws.handle.process(FileEvent::changed(a.clone())).await.unwrap();

    let registry = ws.handle.registry();
    let registry = registry.read().await;
    let model = registry
        .resolve(&a)
        .and_then(|index| index.get(&a))
        .and_then(|doc| doc.template())
        .unwrap();
    assert!(model.declares_resource("aws_s3_bucket.second"));
    assert!(!model.declares_resource("aws_s3_bucket.first"));
}

/// Counts reads and holds the first one long enough for more events to queue up.
struct SlowSource {
    reads: AtomicUsize,
}

#[async_trait]
impl ContentSource for SlowSource {
    async fn get_text(&self, id: &FileIdentity) -> io::Result<TextSnapshot> {
        if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        FsSource.get_text(id).await
    }
}

#[tokio::test]
async fn burst_of_changes_is_coalesced() {
    let source = Arc::new(SlowSource {
        reads: AtomicUsize::new(0),
    });
    let ws = start(
        tempfile::tempdir().unwrap(),
        IndexingConfig::default(),
        Some(source.clone()),
    );
    let a = ws.write("a.tf", VALID_TEMPLATE);

    for _ in 0..5 {
        ws.handle.submit(FileEvent::changed(a.clone())).await.unwrap();
    }
    let outcome = ws.handle.process(FileEvent::changed(a.clone())).await.unwrap();

    assert_eq!(outcome, Outcome::Indexed);
    assert_eq!(source.reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn shutdown_drains_and_stops_accepting_events() {
    let ws = workspace();
    let a = ws.write("a.tf", VALID_TEMPLATE);

    ws.handle.submit(FileEvent::created(a.clone())).await.unwrap();
    ws.handle.shutdown().await.unwrap();

    // The loop exits once drained and drops its receiver.
    let mut attempts = 0;
    while ws.handle.process(FileEvent::changed(a.clone())).await.is_ok() {
        attempts += 1;
        assert!(attempts < 50, "coordinator kept running after shutdown");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(ws.indexed(&a).await);
}

/// Panics on every read of `poison.tf`.
struct PanickingSource;

#[async_trait]
impl ContentSource for PanickingSource {
    async fn get_text(&self, id: &FileIdentity) -> io::Result<TextSnapshot> {
        if id.path().ends_with("poison.tf") {
            panic!("content source blew up");
        }
        FsSource.get_text(id).await
    }
}

#[tokio::test]
async fn panicking_apply_releases_its_file() {
    let ws = start(
        tempfile::tempdir().unwrap(),
        IndexingConfig::default(),
        Some(Arc::new(PanickingSource)),
    );
    let poison = ws.write("poison.tf", VALID_TEMPLATE);
    let healthy = ws.write("main.tf", VALID_TEMPLATE);

    for _ in 0..2 {
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            ws.handle.process(FileEvent::changed(poison.clone())),
        )
        .await
        .expect("waiter answered")
        .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Failed {
                kind: FailureKind::Internal,
                ..
            }
        ));
    }

    let outcome = ws.handle.process(FileEvent::changed(healthy)).await.unwrap();
    assert_eq!(outcome, Outcome::Indexed);
}
