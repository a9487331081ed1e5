use serde::Serialize;
use serde_json::Value;

/// What a plan intends to do with a resource or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Delete,
    NoOp,
    /// Destroy and re-create, in either order.
    Replace,
    Read,
    /// Drop from state without destroying the remote object.
    Forget,
    /// Create the replacement, then forget the old object.
    CreateThenForget,
}

impl Action {
    /// Parse the `actions` list of a change object.
    pub fn from_actions<S: AsRef<str>>(actions: &[S]) -> Option<Self> {
        let actions: Vec<&str> = actions.iter().map(AsRef::as_ref).collect();
        match actions.as_slice() {
            ["create"] => Some(Self::Create),
            ["update"] => Some(Self::Update),
            ["delete"] => Some(Self::Delete),
            ["no-op"] => Some(Self::NoOp),
            ["read"] => Some(Self::Read),
            ["delete", "create"] | ["create", "delete"] => Some(Self::Replace),
            ["forget"] => Some(Self::Forget),
            ["create", "forget"] => Some(Self::CreateThenForget),
            _ => None,
        }
    }

    /// The canonical `actions` list for this action.
    pub const fn as_actions(self) -> &'static [&'static str] {
        match self {
            Self::Create => &["create"],
            Self::Update => &["update"],
            Self::Delete => &["delete"],
            Self::NoOp => &["no-op"],
            Self::Read => &["read"],
            Self::Replace => &["delete", "create"],
            Self::Forget => &["forget"],
            Self::CreateThenForget => &["create", "forget"],
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::NoOp => "no-op",
            Self::Replace => "replace",
            Self::Read => "read",
            Self::Forget => "forget",
            Self::CreateThenForget => "create-then-forget",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMode {
    Managed,
    Data,
}

impl ResourceMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::Data => "data",
        }
    }
}

/// A single planned resource change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceChange {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_address: Option<String>,
    pub mode: ResourceMode,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    pub action: Action,
    /// Attribute snapshot before the change; `None` when the object does not exist yet.
    pub before: Option<Value>,
    /// Attribute snapshot after the change; `None` when the object is destroyed.
    pub after: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputChange {
    pub name: String,
    pub action: Action,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Decoded plan artifact. Resource changes keep the order they had in the artifact; output
/// changes are ordered by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub format_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform_version: Option<String>,
    pub resource_changes: Vec<ResourceChange>,
    pub output_changes: Vec<OutputChange>,
}

impl Plan {
    /// First resource change for `address`, if the plan touches it.
    pub fn change_for(&self, address: &str) -> Option<&ResourceChange> {
        self.resource_changes
            .iter()
            .find(|change| change.address == address)
    }

    /// Number of resource changes per action.
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for change in &self.resource_changes {
            match change.action {
                Action::Create => summary.create += 1,
                Action::Update => summary.update += 1,
                Action::Delete => summary.delete += 1,
                Action::NoOp => summary.no_op += 1,
                Action::Replace => summary.replace += 1,
                Action::Read => summary.read += 1,
                Action::Forget => summary.forget += 1,
                Action::CreateThenForget => {
                    summary.create += 1;
                    summary.forget += 1;
                }
            }
        }
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.resource_changes.is_empty() && self.output_changes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_op: usize,
    pub replace: usize,
    pub read: usize,
    pub forget: usize,
}

impl PlanSummary {
    /// Effects that would modify infrastructure or state (everything except no-op and read).
    /// A create-then-forget change counts toward both `create` and `forget`.
    pub const fn pending(&self) -> usize {
        self.create + self.update + self.delete + self.replace + self.forget
    }
}
