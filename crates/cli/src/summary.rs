use serde::Serialize;
use std::fmt;
use terraform_indexer::{
    CrawlReport, DiagnosticCollection, DocumentKind, FileIdentity, Index, IndexRegistry,
};
use terraform_plan::PlanSummary;

#[derive(Debug, Serialize)]
pub struct Summary {
    pub crawl: CrawlReport,
    pub roots: Vec<RootSummary>,
    pub diagnostics: Vec<FileDiagnostics>,
}

#[derive(Debug, Default, Serialize)]
pub struct RootSummary {
    pub root: String,
    pub templates: usize,
    pub plans: usize,
    pub resources: usize,
    pub modules: usize,
    pub planned: PlanSummary,
}

#[derive(Debug, Serialize)]
pub struct FileDiagnostics {
    pub path: String,
    pub messages: Vec<String>,
}

impl Summary {
    pub fn collect(
        crawl: CrawlReport,
        registry: &IndexRegistry,
        diagnostics: &DiagnosticCollection,
    ) -> Self {
        Self {
            crawl,
            roots: registry.indexes().map(RootSummary::from_index).collect(),
            diagnostics: diagnostics
                .snapshot()
                .into_iter()
                .map(|(id, entries)| FileDiagnostics {
                    path: display_path(&id),
                    messages: entries.into_iter().map(|d| d.message).collect(),
                })
                .collect(),
        }
    }
}

impl RootSummary {
    fn from_index(index: &Index) -> Self {
        let mut summary = Self {
            root: display_path(index.root()),
            ..Self::default()
        };
        for doc in index.documents() {
            match doc.kind() {
                DocumentKind::Template => summary.templates += 1,
                DocumentKind::Plan => summary.plans += 1,
            }
            if let Some(model) = doc.template() {
                summary.resources += model.resources.len();
                summary.modules += model.modules.len();
            }
            if let Some(plan) = doc.plan() {
                let planned = plan.summary();
                summary.planned.create += planned.create;
                summary.planned.update += planned.update;
                summary.planned.delete += planned.delete;
                summary.planned.no_op += planned.no_op;
                summary.planned.replace += planned.replace;
                summary.planned.read += planned.read;
                summary.planned.forget += planned.forget;
            }
        }
        summary
    }
}

fn display_path(id: &FileIdentity) -> String {
    id.path().display().to_string()
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let crawl = &self.crawl;
        writeln!(
            f,
            "Crawled {} files: {} indexed, {} skipped, {} failed",
            crawl.files, crawl.indexed, crawl.skipped, crawl.failed
        )?;
        for root in &self.roots {
            writeln!(f)?;
            writeln!(f, "{}", root.root)?;
            writeln!(
                f,
                "  {} templates, {} resources, {} modules",
                root.templates, root.resources, root.modules
            )?;
            if root.plans > 0 {
                let planned = &root.planned;
                writeln!(
                    f,
                    "  {} plans: {} to add, {} to change, {} to destroy, {} to replace",
                    root.plans, planned.create, planned.update, planned.delete, planned.replace
                )?;
                if planned.forget > 0 {
                    writeln!(f, "  {} to forget", planned.forget)?;
                }
            }
        }
        if !self.diagnostics.is_empty() {
            writeln!(f)?;
            writeln!(f, "Diagnostics:")?;
            for file in &self.diagnostics {
                for message in &file.messages {
                    writeln!(f, "  {}: {message}", file.path)?;
                }
            }
        }
        Ok(())
    }
}
