//! # Terraform Indexer
//!
//! Incremental, in-memory index of Terraform templates (`*.tf`), variable files (`*.tfvars`)
//! and plan artifacts (`*.tfplan`) for one or more workspace roots.
//!
//! ## Pipeline
//!
//! ```text
//! Initial crawl (WorkspaceScanner)   File events (WorkspaceWatcher)
//!     │                                   │
//!     └──────────────┬────────────────────┘
//!                    ▼
//!        Coordinator (single flight per file)
//!            ├─ *.tf / *.tfvars ─> ContentSource ─> DocumentParser ─┐
//!            └─ *.tfplan ──────── ByteSource ───> decode_plan ─────┤
//!                                                                   ▼
//!                             IndexRegistry ─> Index (owning root)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use terraform_indexer::{
//!     Collaborators, Coordinator, DiagnosticCollection, IndexRegistry, NoProgress,
//!     StaticConfig, WorkspaceScanner,
//! };
//! use tokio::sync::RwLock;
//!
//! #[tokio::main]
//! async fn main() -> terraform_indexer::Result<()> {
//!     let mut registry = IndexRegistry::new();
//!     registry.register_root("/path/to/stack")?;
//!     let registry = Arc::new(RwLock::new(registry));
//!
//!     let collaborators = Collaborators::filesystem(
//!         Arc::new(StaticConfig::default()),
//!         Arc::new(DiagnosticCollection::new()),
//!     );
//!     let handle = Coordinator::new(registry, collaborators).start(1024);
//!
//!     let report = handle
//!         .crawl(&WorkspaceScanner::new("/path/to/stack"), &NoProgress)
//!         .await?;
//!     println!("Indexed {} of {} files", report.indexed, report.files);
//!     Ok(())
//! }
//! ```

mod config;
mod coordinator;
mod diagnostics;
mod document;
mod error;
mod filter;
mod identity;
mod index;
mod registry;
mod scanner;
mod sources;
mod watcher;

pub use config::{ConfigProvider, ExcludeSet, IndexOptions, IndexingConfig, StaticConfig, CONFIG_FILE_NAME};
pub use coordinator::{
    Collaborators, Coordinator, CoordinatorHandle, CrawlProgress, CrawlReport, FailureKind,
    FileEvent, FileEventKind, NoProgress, Outcome, ProgressSink, SkipReason, LOG_TARGET,
};
pub use diagnostics::{
    Diagnostic, DiagnosticCollection, DiagnosticSink, Position, Range, Severity,
    DIAGNOSTIC_SOURCE,
};
pub use document::{
    DocumentParser, HclDocumentParser, ModuleRef, ParseError, ParsedTemplate, ResourceRef,
    TemplateModel,
};
pub use error::{IndexerError, Result};
pub use filter::WorkspaceFilter;
pub use identity::{FileIdentity, FileKind};
pub use index::{DocumentKind, Index, IndexedContent, IndexedDocument};
pub use registry::IndexRegistry;
pub use scanner::WorkspaceScanner;
pub use sources::{ByteSource, ContentSource, EventSource, FsSource, OverlaySource, TextSnapshot};
pub use watcher::{file_events, WatcherConfig, WorkspaceWatcher};
