use crate::config::IndexOptions;
use crate::document::{DocumentParser, HclDocumentParser, ParseError, TemplateModel};
use crate::identity::FileIdentity;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use terraform_plan::{Plan, ResourceChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Template,
    Plan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexedContent {
    Template(TemplateModel),
    Plan(Plan),
}

/// Structural model of one indexed file. Replaced wholesale on every successful re-index.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: FileIdentity,
    pub content: IndexedContent,
    /// blake3 digest of the source the content was derived from.
    pub fingerprint: Option<String>,
    pub indexed_at: SystemTime,
    /// Non-fatal problems the parser skipped over.
    pub parse_error: Option<String>,
}

impl IndexedDocument {
    pub const fn kind(&self) -> DocumentKind {
        match self.content {
            IndexedContent::Template(_) => DocumentKind::Template,
            IndexedContent::Plan(_) => DocumentKind::Plan,
        }
    }

    pub const fn template(&self) -> Option<&TemplateModel> {
        match &self.content {
            IndexedContent::Template(model) => Some(model),
            IndexedContent::Plan(_) => None,
        }
    }

    pub const fn plan(&self) -> Option<&Plan> {
        match &self.content {
            IndexedContent::Plan(plan) => Some(plan),
            IndexedContent::Template(_) => None,
        }
    }
}

/// Index of every template and plan file under one workspace root.
pub struct Index {
    root: FileIdentity,
    documents: HashMap<FileIdentity, IndexedDocument>,
    parser: Arc<dyn DocumentParser>,
}

impl Index {
    pub fn new(root: FileIdentity) -> Self {
        Self::with_parser(root, Arc::new(HclDocumentParser))
    }

    pub fn with_parser(root: FileIdentity, parser: Arc<dyn DocumentParser>) -> Self {
        Self {
            root,
            documents: HashMap::new(),
            parser,
        }
    }

    pub const fn root(&self) -> &FileIdentity {
        &self.root
    }

    /// Parse `content` and store it under `id`.
    ///
    /// Returns `Ok(false)` without touching the index when `id` is excluded. On a parse error
    /// any previous entry for `id` is kept as is.
    pub fn upsert_document(
        &mut self,
        id: &FileIdentity,
        content: &str,
        options: &IndexOptions,
    ) -> Result<bool, ParseError> {
        if options.exclude.is_excluded(id, &self.root) {
            return Ok(false);
        }

        let parsed = self.parser.parse(content)?;
        let parse_error = (!parsed.problems.is_empty()).then(|| parsed.problems.join("; "));
        self.documents.insert(
            id.clone(),
            IndexedDocument {
                id: id.clone(),
                content: IndexedContent::Template(parsed.model),
                fingerprint: Some(fingerprint(content.as_bytes())),
                indexed_at: SystemTime::now(),
                parse_error,
            },
        );
        Ok(true)
    }

    /// Store an already decoded plan under `id`. Returns `false` when `id` is excluded.
    pub fn upsert_plan(&mut self, id: &FileIdentity, plan: Plan, options: &IndexOptions) -> bool {
        self.insert_plan(id, plan, None, options)
    }

    /// Like [`Index::upsert_plan`], recording the fingerprint of the bytes `plan` was decoded
    /// from.
    pub fn upsert_plan_bytes(
        &mut self,
        id: &FileIdentity,
        plan: Plan,
        bytes: &[u8],
        options: &IndexOptions,
    ) -> bool {
        self.insert_plan(id, plan, Some(fingerprint(bytes)), options)
    }

    fn insert_plan(
        &mut self,
        id: &FileIdentity,
        plan: Plan,
        fingerprint: Option<String>,
        options: &IndexOptions,
    ) -> bool {
        if options.exclude.is_excluded(id, &self.root) {
            return false;
        }
        self.documents.insert(
            id.clone(),
            IndexedDocument {
                id: id.clone(),
                content: IndexedContent::Plan(plan),
                fingerprint,
                indexed_at: SystemTime::now(),
                parse_error: None,
            },
        );
        true
    }

    pub fn remove(&mut self, id: &FileIdentity) {
        self.documents.remove(id);
    }

    /// Remove `id` only if it is indexed as a plan.
    pub fn remove_plan(&mut self, id: &FileIdentity) {
        if self
            .documents
            .get(id)
            .is_some_and(|doc| doc.kind() == DocumentKind::Plan)
        {
            self.documents.remove(id);
        }
    }

    pub fn get(&self, id: &FileIdentity) -> Option<&IndexedDocument> {
        self.documents.get(id)
    }

    pub fn contains(&self, id: &FileIdentity) -> bool {
        self.documents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &IndexedDocument> {
        self.documents.values()
    }

    /// Template documents declaring `address` (`type.name` or `data.type.name`).
    pub fn find_resource(&self, address: &str) -> Vec<&IndexedDocument> {
        let mut found: Vec<&IndexedDocument> = self
            .documents()
            .filter(|doc| {
                doc.template()
                    .is_some_and(|model| model.declares_resource(address))
            })
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    pub fn find_module(&self, name: &str) -> Vec<&IndexedDocument> {
        let mut found: Vec<&IndexedDocument> = self
            .documents()
            .filter(|doc| doc.template().is_some_and(|model| model.module(name).is_some()))
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Planned changes to `address` across every indexed plan.
    pub fn planned_changes(&self, address: &str) -> Vec<(&FileIdentity, &ResourceChange)> {
        let mut found: Vec<(&FileIdentity, &ResourceChange)> = self
            .documents()
            .filter_map(|doc| {
                doc.plan()
                    .and_then(|plan| plan.change_for(address))
                    .map(|change| (&doc.id, change))
            })
            .collect();
        found.sort_by(|a, b| a.0.cmp(b.0));
        found
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
