use crate::config::ConfigProvider;
use crate::diagnostics::{Diagnostic, DiagnosticSink, Range};
use crate::error::{IndexerError, Result};
use crate::identity::{FileIdentity, FileKind};
use crate::registry::IndexRegistry;
use crate::sources::{ByteSource, ContentSource, EventSource, FsSource};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use terraform_plan::decode_plan;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::{Id as TaskId, JoinSet};

/// Log target for every line the coordinator writes.
pub const LOG_TARGET: &str = "terraform.crawler";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub id: FileIdentity,
    pub kind: FileEventKind,
}

impl FileEvent {
    pub const fn created(id: FileIdentity) -> Self {
        Self {
            id,
            kind: FileEventKind::Created,
        }
    }

    pub const fn changed(id: FileIdentity) -> Self {
        Self {
            id,
            kind: FileEventKind::Changed,
        }
    }

    pub const fn deleted(id: FileIdentity) -> Self {
        Self {
            id,
            kind: FileEventKind::Deleted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Matched an exclude pattern.
    Excluded,
    /// The content source holds unsaved edits.
    Unstable,
    /// Indexing is switched off in the configuration.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Io,
    MalformedPlan,
    Parse,
    Internal,
}

/// What handling one event did to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Indexed,
    Removed,
    Skipped(SkipReason),
    Failed { kind: FailureKind, message: String },
    /// No registered root owns the file.
    Unresolved,
    /// Not a template, variables or plan file.
    Ignored,
}

/// Host collaborators the coordinator reads from and reports to.
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentSource>,
    pub bytes: Arc<dyn ByteSource>,
    pub config: Arc<dyn ConfigProvider>,
    pub diagnostics: Arc<dyn DiagnosticSink>,
}

impl Collaborators {
    /// Read files straight from disk.
    pub fn filesystem(
        config: Arc<dyn ConfigProvider>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            content: Arc::new(FsSource),
            bytes: Arc::new(FsSource),
            config,
            diagnostics,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlProgress {
    /// 1-based position of `id` in the crawl.
    pub current: usize,
    pub total: usize,
    pub id: FileIdentity,
}

impl CrawlProgress {
    pub fn message(&self) -> String {
        format!("Indexing {}", self.id)
    }
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &CrawlProgress);

    fn finish(&self, _report: &CrawlReport) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: &CrawlProgress) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    pub files: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub removed: usize,
    pub failed: usize,
    pub unresolved: usize,
    pub ignored: usize,
}

impl CrawlReport {
    fn record(&mut self, outcome: &Outcome) {
        self.files += 1;
        match outcome {
            Outcome::Indexed => self.indexed += 1,
            Outcome::Removed => self.removed += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Unresolved => self.unresolved += 1,
            Outcome::Ignored => self.ignored += 1,
        }
    }
}

enum Command {
    Event {
        event: FileEvent,
        reply: Option<oneshot::Sender<Outcome>>,
    },
    Shutdown,
}

/// Applies file events to the indexes of an [`IndexRegistry`].
pub struct Coordinator {
    registry: Arc<RwLock<IndexRegistry>>,
    collaborators: Collaborators,
}

impl Coordinator {
    pub fn new(registry: Arc<RwLock<IndexRegistry>>, collaborators: Collaborators) -> Self {
        Self {
            registry,
            collaborators,
        }
    }

    /// Spawn the event loop on the current tokio runtime.
    pub fn start(self, queue_capacity: usize) -> CoordinatorHandle {
        let (command_tx, command_rx) = mpsc::channel(queue_capacity.max(1));
        let registry = Arc::clone(&self.registry);
        tokio::spawn(run_event_loop(Arc::new(self), command_rx));
        CoordinatorHandle {
            command_tx,
            registry,
        }
    }

    /// Handle one event. Every error is caught here and turned into an [`Outcome`].
    pub async fn apply(&self, event: &FileEvent) -> Outcome {
        let id = &event.id;
        let Some(kind) = id.kind() else {
            debug!(target: LOG_TARGET, "Ignoring {id}");
            return Outcome::Ignored;
        };

        if self.registry.read().await.resolve(id).is_none() {
            return unresolved(id);
        }

        debug!(target: LOG_TARGET, "{:?} {} file {id}", event.kind, kind.as_str());
        if event.kind == FileEventKind::Deleted {
            return self.remove(id, kind).await;
        }

        if !self.collaborators.config.indexing(id).enabled {
            debug!(target: LOG_TARGET, "Indexing disabled, skipping {id}");
            return Outcome::Skipped(SkipReason::Disabled);
        }

        match kind {
            FileKind::Plan => self.update_plan(id).await,
            FileKind::Template | FileKind::Variables => self.update_document(id).await,
        }
    }

    async fn update_plan(&self, id: &FileIdentity) -> Outcome {
        let bytes = match self.collaborators.bytes.read_bytes(id.path()).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let err = IndexerError::from(err);
                warn!(target: LOG_TARGET, "Could not read plan file {id}: {err}");
                return failed(FailureKind::Io, &err);
            }
        };

        let plan = match decode_plan(&bytes) {
            Ok(plan) => plan,
            Err(err) => {
                let err = IndexerError::from(err);
                warn!(target: LOG_TARGET, "Could not parse plan file {id}: {err}");
                return failed(FailureKind::MalformedPlan, &err);
            }
        };

        let options = self.collaborators.config.options(id);
        let mut registry = self.registry.write().await;
        let Some(index) = registry.resolve_mut(id) else {
            return unresolved(id);
        };
        if index.upsert_plan_bytes(id, plan, &bytes, &options) {
            info!(target: LOG_TARGET, "Indexed {id}");
            Outcome::Indexed
        } else {
            info!(target: LOG_TARGET, "Index not generated for: {id}");
            Outcome::Skipped(SkipReason::Excluded)
        }
    }

    async fn update_document(&self, id: &FileIdentity) -> Outcome {
        let snapshot = match self.collaborators.content.get_text(id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let err = IndexerError::from(err);
                warn!(target: LOG_TARGET, "Could not read template file {id}: {err}");
                return failed(FailureKind::Io, &err);
            }
        };
        if snapshot.unstable {
            debug!(target: LOG_TARGET, "Skipping {id}: unsaved changes");
            return Outcome::Skipped(SkipReason::Unstable);
        }

        let options = self.collaborators.config.options(id);
        let result = {
            let mut registry = self.registry.write().await;
            let Some(index) = registry.resolve_mut(id) else {
                return unresolved(id);
            };
            index.upsert_document(id, &snapshot.text, &options)
        };

        match result {
            Ok(true) => {
                info!(target: LOG_TARGET, "Indexed {id}");
                self.collaborators.diagnostics.clear(id);
                Outcome::Indexed
            }
            Ok(false) => {
                info!(target: LOG_TARGET, "Index not generated for: {id}");
                Outcome::Skipped(SkipReason::Excluded)
            }
            Err(parse_error) => {
                self.collaborators.diagnostics.publish(
                    id,
                    vec![Diagnostic::error(
                        Range::file_start(),
                        format!("Unhandled error parsing document: {parse_error}"),
                    )],
                );
                let err = IndexerError::from(parse_error);
                warn!(target: LOG_TARGET, "Could not index template file: {err}");
                failed(FailureKind::Parse, &err)
            }
        }
    }

    async fn remove(&self, id: &FileIdentity, kind: FileKind) -> Outcome {
        {
            let mut registry = self.registry.write().await;
            let Some(index) = registry.resolve_mut(id) else {
                return unresolved(id);
            };
            match kind {
                FileKind::Plan => index.remove_plan(id),
                FileKind::Template | FileKind::Variables => index.remove(id),
            }
        }
        if kind != FileKind::Plan {
            self.collaborators.diagnostics.clear(id);
        }
        info!(target: LOG_TARGET, "Removed {id}");
        Outcome::Removed
    }
}

fn unresolved(id: &FileIdentity) -> Outcome {
    let err = IndexerError::UnresolvedIdentity(id.path().to_path_buf());
    warn!(target: LOG_TARGET, "{err}");
    Outcome::Unresolved
}

fn failed(kind: FailureKind, err: &IndexerError) -> Outcome {
    Outcome::Failed {
        kind,
        message: err.to_string(),
    }
}

/// Cloneable handle to a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    command_tx: mpsc::Sender<Command>,
    registry: Arc<RwLock<IndexRegistry>>,
}

impl CoordinatorHandle {
    pub fn registry(&self) -> Arc<RwLock<IndexRegistry>> {
        Arc::clone(&self.registry)
    }

    /// Queue `event` without waiting for it to be applied.
    pub async fn submit(&self, event: FileEvent) -> Result<()> {
        self.command_tx
            .send(Command::Event { event, reply: None })
            .await
            .map_err(|_| stopped())
    }

    /// Queue `event` from outside the runtime, e.g. a file watcher callback thread.
    pub fn blocking_submit(&self, event: FileEvent) -> Result<()> {
        self.command_tx
            .blocking_send(Command::Event { event, reply: None })
            .map_err(|_| stopped())
    }

    /// Queue `event` and wait until it, or a later event it was coalesced into, is applied.
    pub async fn process(&self, event: FileEvent) -> Result<Outcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Event {
                event,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| stopped())?;
        reply_rx.await.map_err(|_| stopped())
    }

    /// Index every file `source` enumerates, one at a time and in enumeration order.
    pub async fn crawl(
        &self,
        source: &dyn EventSource,
        progress: &dyn ProgressSink,
    ) -> Result<CrawlReport> {
        info!(target: LOG_TARGET, "Crawling workspace for terraform files...");
        let ids = source.enumerate().await?;
        let total = ids.len();
        let mut report = CrawlReport::default();

        for (idx, id) in ids.into_iter().enumerate() {
            let progress_update = CrawlProgress {
                current: idx + 1,
                total,
                id: id.clone(),
            };
            progress.report(&progress_update);
            let outcome = self.process(FileEvent::changed(id)).await?;
            report.record(&outcome);
        }

        info!(
            target: LOG_TARGET,
            "Crawl finished: {} files, {} indexed, {} failed",
            report.files,
            report.indexed,
            report.failed
        );
        progress.finish(&report);
        Ok(report)
    }

    /// Stop the loop once in-flight and pending work has drained.
    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| stopped())
    }
}

fn stopped() -> IndexerError {
    IndexerError::Other("coordinator is not running".to_string())
}

/// Per-identity single-flight bookkeeping.
///
/// An identity is either idle (absent), in flight, or in flight with exactly one pending
/// event queued behind it. A newer event for an in-flight identity replaces the pending one;
/// its waiters are carried over and answered with the outcome of the event that finally runs.
#[derive(Default)]
struct SingleFlight {
    in_flight: HashMap<FileIdentity, Vec<oneshot::Sender<Outcome>>>,
    pending: HashMap<FileIdentity, (FileEvent, Vec<oneshot::Sender<Outcome>>)>,
}

impl SingleFlight {
    /// Returns the event if it may start now.
    fn admit(
        &mut self,
        event: FileEvent,
        reply: Option<oneshot::Sender<Outcome>>,
    ) -> Option<FileEvent> {
        if self.in_flight.contains_key(&event.id) {
            let slot = self
                .pending
                .entry(event.id.clone())
                .or_insert_with(|| (event.clone(), Vec::new()));
            slot.0 = event;
            slot.1.extend(reply);
            return None;
        }
        self.in_flight
            .insert(event.id.clone(), reply.into_iter().collect());
        Some(event)
    }

    /// Record completion of the in-flight event for `id`; returns the pending event to start
    /// next, if any.
    fn complete(&mut self, id: &FileIdentity, outcome: &Outcome) -> Option<FileEvent> {
        for waiter in self.in_flight.remove(id).unwrap_or_default() {
            let _ = waiter.send(outcome.clone());
        }
        let (next, waiters) = self.pending.remove(id)?;
        self.in_flight.insert(id.clone(), waiters);
        Some(next)
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }
}

async fn run_event_loop(coordinator: Arc<Coordinator>, mut command_rx: mpsc::Receiver<Command>) {
    let mut flights = SingleFlight::default();
    let mut tasks = Tasks::default();
    let mut draining = false;

    loop {
        tokio::select! {
            command = command_rx.recv(), if !draining => match command {
                Some(Command::Event { event, reply }) => {
                    if let Some(event) = flights.admit(event, reply) {
                        tasks.spawn(&coordinator, event);
                    }
                }
                Some(Command::Shutdown) | None => draining = true,
            },
            Some((id, outcome)) = tasks.join_next(), if !tasks.is_empty() => {
                if let Some(next) = flights.complete(&id, &outcome) {
                    tasks.spawn(&coordinator, next);
                }
            },
            else => break,
        }

        if draining && tasks.is_empty() {
            break;
        }
    }
    debug!(target: LOG_TARGET, "Coordinator stopped");
}

/// Running applies, with the identity each task works on so a task that panics still
/// releases its identity.
#[derive(Default)]
struct Tasks {
    set: JoinSet<Outcome>,
    ids: HashMap<TaskId, FileIdentity>,
}

impl Tasks {
    fn spawn(&mut self, coordinator: &Arc<Coordinator>, event: FileEvent) {
        let coordinator = Arc::clone(coordinator);
        let id = event.id.clone();
        let handle = self
            .set
            .spawn(async move { coordinator.apply(&event).await });
        self.ids.insert(handle.id(), id);
    }

    fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Next finished task. A task that panicked or was cancelled yields
    /// [`FailureKind::Internal`].
    async fn join_next(&mut self) -> Option<(FileIdentity, Outcome)> {
        loop {
            let (task_id, outcome) = match self.set.join_next_with_id().await? {
                Ok(finished) => finished,
                Err(err) => {
                    error!(target: LOG_TARGET, "Index task failed: {err}");
                    let outcome = Outcome::Failed {
                        kind: FailureKind::Internal,
                        message: err.to_string(),
                    };
                    (err.id(), outcome)
                }
            };
            if let Some(id) = self.ids.remove(&task_id) {
                return Some((id, outcome));
            }
        }
    }
}
