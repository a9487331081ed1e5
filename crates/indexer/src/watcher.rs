use crate::coordinator::{CoordinatorHandle, FileEvent, FileEventKind, LOG_TARGET};
use crate::error::{IndexerError, Result};
use crate::filter::WorkspaceFilter;
use crate::identity::FileIdentity;
use log::{debug, warn};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Forward created/changed files. Deletions are always forwarded so the index never keeps
    /// entries for files that are gone.
    pub live_indexing: bool,
    pub notify_poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            live_indexing: true,
            notify_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Feeds file-system events for indexable files under a set of roots into a coordinator.
/// Paths go through the same [`WorkspaceFilter`] as the crawl. Watching stops when the value
/// is dropped.
///
/// Start the watcher before crawling: events that arrive while the crawl runs are ordered
/// against it per file by the coordinator.
pub struct WorkspaceWatcher {
    _watcher: RecommendedWatcher,
    forwarder: JoinHandle<()>,
}

impl WorkspaceWatcher {
    pub fn start<P: AsRef<Path>>(
        roots: &[P],
        handle: CoordinatorHandle,
        config: WatcherConfig,
    ) -> Result<Self> {
        let filter = WorkspaceFilter::new(roots)?;
        let (event_tx, event_rx) = mpsc::channel(1024);
        let watcher = create_fs_watcher(roots, event_tx, config.notify_poll_interval)?;
        let forwarder = tokio::spawn(forward_events(
            event_rx,
            handle,
            filter,
            config.live_indexing,
        ));
        Ok(Self {
            _watcher: watcher,
            forwarder,
        })
    }
}

impl Drop for WorkspaceWatcher {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

fn create_fs_watcher<P: AsRef<Path>>(
    roots: &[P],
    sender: mpsc::Sender<notify::Result<Event>>,
    poll_interval: Duration,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default().with_poll_interval(poll_interval),
    )?;
    for root in roots {
        let root = root.as_ref();
        watcher.watch(root, RecursiveMode::Recursive).map_err(|e| {
            IndexerError::Other(format!("failed to watch {}: {e}", root.display()))
        })?;
    }
    Ok(watcher)
}

async fn forward_events(
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    handle: CoordinatorHandle,
    filter: WorkspaceFilter,
    live_indexing: bool,
) {
    while let Some(event) = event_rx.recv().await {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                warn!(target: LOG_TARGET, "Watcher error: {err}");
                continue;
            }
        };
        for file_event in forwarded_events(&event, &filter, live_indexing) {
            if handle.submit(file_event).await.is_err() {
                debug!(target: LOG_TARGET, "Coordinator gone, watcher stops forwarding");
                return;
            }
        }
    }
}

/// File events the watcher submits for `event`. Without live indexing only deletions pass, so
/// the index never keeps entries for files that are gone.
fn forwarded_events(
    event: &Event,
    filter: &WorkspaceFilter,
    live_indexing: bool,
) -> Vec<FileEvent> {
    let mut events = file_events(event, filter);
    if !live_indexing {
        events.retain(|e| e.kind == FileEventKind::Deleted);
    }
    events
}

/// Translate one `notify` event into file events for paths `filter` lets through.
pub fn file_events(event: &Event, filter: &WorkspaceFilter) -> Vec<FileEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => FileEventKind::Created,
        EventKind::Remove(_) => FileEventKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut events = Vec::new();
            if let Some(from) = event.paths.first() {
                events.extend(file_event(filter, from, FileEventKind::Deleted));
            }
            if let Some(to) = event.paths.get(1) {
                events.extend(file_event(filter, to, FileEventKind::Created));
            }
            return events;
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => FileEventKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => FileEventKind::Created,
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Rename without a direction: look at the disk.
            return event
                .paths
                .iter()
                .filter_map(|path| {
                    let kind = if path.exists() {
                        FileEventKind::Created
                    } else {
                        FileEventKind::Deleted
                    };
                    file_event(filter, path, kind)
                })
                .collect();
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => FileEventKind::Changed,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter_map(|path| file_event(filter, path, kind))
        .collect()
}

fn file_event(filter: &WorkspaceFilter, path: &Path, kind: FileEventKind) -> Option<FileEvent> {
    let id = FileIdentity::new(path).ok()?;
    filter.is_indexable(&id).then_some(FileEvent { id, kind })
}
