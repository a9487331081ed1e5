use crate::error::MalformedPlanError;
use crate::types::{Action, OutputChange, Plan, ResourceChange, ResourceMode};
use serde::Deserialize;
use serde_json::error::Category;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Major `format_version` this decoder understands.
pub const SUPPORTED_FORMAT_MAJOR: u64 = 1;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Deserialize)]
struct RawPlan {
    format_version: Option<Value>,
    terraform_version: Option<String>,
    #[serde(default)]
    resource_changes: Vec<RawResourceChange>,
    #[serde(default)]
    output_changes: BTreeMap<String, RawChange>,
}

#[derive(Deserialize)]
struct RawResourceChange {
    address: Option<String>,
    module_address: Option<String>,
    mode: Option<String>,
    #[serde(rename = "type")]
    resource_type: Option<String>,
    name: Option<String>,
    provider_name: Option<String>,
    change: Option<RawChange>,
}

#[derive(Deserialize)]
struct RawChange {
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    before: Value,
    #[serde(default)]
    after: Value,
}

/// Decode a plan artifact.
///
/// A zero-length (or whitespace-only) buffer is always an error: a producer that is still
/// writing the file can leave it empty for a moment, and that must not read as "no changes".
pub fn decode_plan(buffer: &[u8]) -> Result<Plan, MalformedPlanError> {
    let buffer = buffer.strip_prefix(UTF8_BOM).unwrap_or(buffer);

    let Some(first) = buffer.iter().position(|b| !b.is_ascii_whitespace()) else {
        return Err(MalformedPlanError::Empty);
    };

    if buffer.starts_with(ZIP_MAGIC) {
        return Err(MalformedPlanError::UnrecognizedFormat(
            "binary plan archive; convert it with `terraform show -json`".to_string(),
        ));
    }
    if buffer[first] != b'{' {
        return Err(MalformedPlanError::UnrecognizedFormat(format!(
            "expected a JSON object, found byte 0x{:02x} at offset {first}",
            buffer[first]
        )));
    }

    let raw: RawPlan = serde_json::from_slice(buffer).map_err(classify_json_error)?;

    let format_version = match raw.format_version {
        Some(Value::String(version)) => version,
        Some(other) => {
            return Err(MalformedPlanError::Schema(format!(
                "format_version must be a string, found {other}"
            )))
        }
        None => {
            return Err(MalformedPlanError::Schema(
                "missing format_version".to_string(),
            ))
        }
    };
    check_format_version(&format_version)?;

    let resource_changes = raw
        .resource_changes
        .into_iter()
        .enumerate()
        .map(|(idx, change)| convert_resource_change(idx, change))
        .collect::<Result<Vec<_>, _>>()?;

    let output_changes = raw
        .output_changes
        .into_iter()
        .map(|(name, change)| {
            let action = Action::from_actions(&change.actions).ok_or_else(|| {
                MalformedPlanError::Schema(format!(
                    "output_changes.{name}: unsupported actions {:?}",
                    change.actions
                ))
            })?;
            Ok(OutputChange {
                name,
                action,
                before: non_null(change.before),
                after: non_null(change.after),
            })
        })
        .collect::<Result<Vec<_>, MalformedPlanError>>()?;

    Ok(Plan {
        format_version,
        terraform_version: raw.terraform_version,
        resource_changes,
        output_changes,
    })
}

/// Serialize a plan back into the JSON shape accepted by [`decode_plan`].
pub fn encode_plan(plan: &Plan) -> serde_json::Result<Vec<u8>> {
    let resource_changes: Vec<Value> = plan
        .resource_changes
        .iter()
        .map(|change| {
            let mut object = Map::new();
            object.insert("address".into(), json!(change.address));
            if let Some(module_address) = &change.module_address {
                object.insert("module_address".into(), json!(module_address));
            }
            object.insert("mode".into(), json!(change.mode.as_str()));
            object.insert("type".into(), json!(change.resource_type));
            object.insert("name".into(), json!(change.name));
            if let Some(provider_name) = &change.provider_name {
                object.insert("provider_name".into(), json!(provider_name));
            }
            object.insert(
                "change".into(),
                encode_change(change.action, &change.before, &change.after),
            );
            Value::Object(object)
        })
        .collect();

    let output_changes: Map<String, Value> = plan
        .output_changes
        .iter()
        .map(|change| {
            (
                change.name.clone(),
                encode_change(change.action, &change.before, &change.after),
            )
        })
        .collect();

    let mut root = Map::new();
    root.insert("format_version".into(), json!(plan.format_version));
    if let Some(terraform_version) = &plan.terraform_version {
        root.insert("terraform_version".into(), json!(terraform_version));
    }
    root.insert("resource_changes".into(), Value::Array(resource_changes));
    root.insert("output_changes".into(), Value::Object(output_changes));

    serde_json::to_vec_pretty(&Value::Object(root))
}

fn encode_change(action: Action, before: &Option<Value>, after: &Option<Value>) -> Value {
    json!({
        "actions": action.as_actions(),
        "before": before.clone().unwrap_or(Value::Null),
        "after": after.clone().unwrap_or(Value::Null),
    })
}

fn classify_json_error(err: serde_json::Error) -> MalformedPlanError {
    match err.classify() {
        Category::Eof => MalformedPlanError::Truncated {
            line: err.line(),
            column: err.column(),
        },
        Category::Data => MalformedPlanError::Schema(err.to_string()),
        Category::Syntax | Category::Io => MalformedPlanError::Syntax(err.to_string()),
    }
}

fn check_format_version(version: &str) -> Result<(), MalformedPlanError> {
    let major = version
        .split('.')
        .next()
        .and_then(|major| major.trim().parse::<u64>().ok());
    match major {
        Some(SUPPORTED_FORMAT_MAJOR) => Ok(()),
        Some(_) => Err(MalformedPlanError::UnsupportedVersion(version.to_string())),
        None => Err(MalformedPlanError::Schema(format!(
            "format_version {version:?} is not a version number"
        ))),
    }
}

fn convert_resource_change(
    idx: usize,
    raw: RawResourceChange,
) -> Result<ResourceChange, MalformedPlanError> {
    let Some(address) = raw.address else {
        return Err(MalformedPlanError::Schema(format!(
            "resource_changes[{idx}]: missing address"
        )));
    };
    let Some(change) = raw.change else {
        return Err(MalformedPlanError::Schema(format!(
            "resource_changes[{idx}] ({address}): missing change"
        )));
    };
    let action = Action::from_actions(&change.actions).ok_or_else(|| {
        MalformedPlanError::Schema(format!(
            "resource_changes[{idx}] ({address}): unsupported actions {:?}",
            change.actions
        ))
    })?;
    let mode = match raw.mode.as_deref() {
        None | Some("managed") => ResourceMode::Managed,
        Some("data") => ResourceMode::Data,
        Some(other) => {
            return Err(MalformedPlanError::Schema(format!(
                "resource_changes[{idx}] ({address}): unknown mode {other:?}"
            )))
        }
    };

    // Older producers omit type/name; recover them from the address.
    let (fallback_type, fallback_name) = split_address(&address);
    let resource_type = raw.resource_type.unwrap_or(fallback_type);
    let name = raw.name.unwrap_or(fallback_name);

    Ok(ResourceChange {
        address,
        module_address: raw.module_address,
        mode,
        resource_type,
        name,
        provider_name: raw.provider_name,
        action,
        before: non_null(change.before),
        after: non_null(change.after),
    })
}

fn split_address(address: &str) -> (String, String) {
    let mut local = address;
    while let Some(rest) = local.strip_prefix("module.") {
        local = rest.split_once('.').map_or(rest, |(_, resource)| resource);
    }
    let local = local.strip_prefix("data.").unwrap_or(local);
    let (resource_type, name) = local.split_once('.').unwrap_or((local, ""));
    let name = name.split('[').next().unwrap_or(name);
    (resource_type.to_string(), name.to_string())
}

fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::{check_format_version, split_address};
    use crate::MalformedPlanError;

    #[test]
    fn splits_plain_and_module_addresses() {
        assert_eq!(
            split_address("aws_instance.web"),
            ("aws_instance".to_string(), "web".to_string())
        );
        assert_eq!(
            split_address("module.net.aws_vpc.main[0]"),
            ("aws_vpc".to_string(), "main".to_string())
        );
        assert_eq!(
            split_address("data.aws_ami.ubuntu"),
            ("aws_ami".to_string(), "ubuntu".to_string())
        );
    }

    #[test]
    fn accepts_any_minor_of_supported_major() {
        assert!(check_format_version("1.0").is_ok());
        assert!(check_format_version("1.2").is_ok());
        assert_eq!(
            check_format_version("2.0"),
            Err(MalformedPlanError::UnsupportedVersion("2.0".to_string()))
        );
        assert!(matches!(
            check_format_version("latest"),
            Err(MalformedPlanError::Schema(_))
        ));
    }
}
