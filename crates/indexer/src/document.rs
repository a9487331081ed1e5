use hcl_edit::expr::Expression;
use hcl_edit::structure::{Block, BlockLabel, Body};
use serde::Serialize;
use terraform_plan::ResourceMode;
use thiserror::Error;

/// The document parser could not produce a structural model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRef {
    pub mode: ResourceMode,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
}

impl ResourceRef {
    /// Address as Terraform spells it: `type.name` or `data.type.name`.
    pub fn address(&self) -> String {
        match self.mode {
            ResourceMode::Managed => format!("{}.{}", self.resource_type, self.name),
            ResourceMode::Data => format!("data.{}.{}", self.resource_type, self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Top-level declarations of one template or variables file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateModel {
    pub resources: Vec<ResourceRef>,
    pub data_sources: Vec<ResourceRef>,
    pub variables: Vec<String>,
    pub outputs: Vec<String>,
    pub providers: Vec<String>,
    pub modules: Vec<ModuleRef>,
    pub locals: Vec<String>,
    /// Top-level attributes; the whole content of a `.tfvars` file.
    pub assignments: Vec<String>,
}

impl TemplateModel {
    pub fn declares_resource(&self, address: &str) -> bool {
        self.resources
            .iter()
            .chain(&self.data_sources)
            .any(|resource| resource.address() == address)
    }

    pub fn module(&self, name: &str) -> Option<&ModuleRef> {
        self.modules.iter().find(|module| module.name == name)
    }

    pub fn declaration_count(&self) -> usize {
        self.resources.len()
            + self.data_sources.len()
            + self.variables.len()
            + self.outputs.len()
            + self.providers.len()
            + self.modules.len()
            + self.locals.len()
            + self.assignments.len()
    }
}

/// Result of a successful parse. `problems` lists blocks that were skipped because their
/// shape was wrong; they do not prevent indexing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTemplate {
    pub model: TemplateModel,
    pub problems: Vec<String>,
}

/// Turns source text into a [`TemplateModel`].
pub trait DocumentParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<ParsedTemplate, ParseError>;
}

/// [`DocumentParser`] backed by `hcl-edit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HclDocumentParser;

impl DocumentParser for HclDocumentParser {
    fn parse(&self, text: &str) -> Result<ParsedTemplate, ParseError> {
        let body = hcl_edit::parser::parse_body(text).map_err(|e| ParseError::new(e.to_string()))?;
        Ok(collect_declarations(&body))
    }
}

fn collect_declarations(body: &Body) -> ParsedTemplate {
    let mut parsed = ParsedTemplate::default();
    let model = &mut parsed.model;

    for attribute in body.attributes() {
        model.assignments.push(attribute.key.as_str().to_string());
    }

    for block in body.blocks() {
        let labels: Vec<&str> = block.labels.iter().map(label_str).collect();
        match (block.ident.as_str(), labels.as_slice()) {
            ("resource", [resource_type, name]) => model.resources.push(ResourceRef {
                mode: ResourceMode::Managed,
                resource_type: (*resource_type).to_string(),
                name: (*name).to_string(),
            }),
            ("data", [resource_type, name]) => model.data_sources.push(ResourceRef {
                mode: ResourceMode::Data,
                resource_type: (*resource_type).to_string(),
                name: (*name).to_string(),
            }),
            ("variable", [name]) => model.variables.push((*name).to_string()),
            ("output", [name]) => model.outputs.push((*name).to_string()),
            ("provider", [name]) => model.providers.push((*name).to_string()),
            ("module", [name]) => model.modules.push(ModuleRef {
                name: (*name).to_string(),
                source: string_attribute(block, "source"),
            }),
            ("locals", []) => {
                for attribute in block.body.attributes() {
                    model.locals.push(attribute.key.as_str().to_string());
                }
            }
            (
                kind @ ("resource" | "data" | "variable" | "output" | "provider" | "module"
                | "locals"),
                labels,
            ) => parsed.problems.push(format!(
                "`{kind}` block with {} label(s) skipped",
                labels.len()
            )),
            // terraform, moved, import, check, ...
            _ => {}
        }
    }

    parsed
}

fn label_str(label: &BlockLabel) -> &str {
    match label {
        BlockLabel::String(value) => value.value().as_str(),
        BlockLabel::Ident(ident) => ident.as_str(),
    }
}

fn string_attribute(block: &Block, key: &str) -> Option<String> {
    let attribute = block.body.get_attribute(key)?;
    match &attribute.value {
        Expression::String(value) => Some(value.value().clone()),
        _ => None,
    }
}
