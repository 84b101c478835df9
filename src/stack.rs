//! Stack definitions and the CloudFormation side of the AWS CLI.
use crate::aws::{AwsCli, RemoteError};
use crate::config::{parameter_text, Capability, CfutConfig};
use crate::deploy::{StackApi, StackRequest};
use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

const CLOUDFORMATION: &str = "cloudformation";

/// A stack as one invocation sees it: config entry plus CLI overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDefinition {
    /// Local alias from `cfut.json`.
    pub name: String,
    pub remote_name: String,
    pub template_path: Option<String>,
    pub capabilities: Vec<Capability>,
    pub parameters: BTreeMap<String, String>,
}

/// Look up `id` in the config and merge `KEY=VALUE` overrides over its
/// parameters. Overrides win.
pub fn resolve_stack(
    config: &CfutConfig,
    id: &str,
    parameter_overrides: &[String],
) -> Result<StackDefinition> {
    let template = config.template(id).ok_or_else(|| {
        let known: Vec<&str> = config.templates.keys().map(String::as_str).collect();
        anyhow!(
            "unknown stack alias {id:?} (configured: {})",
            if known.is_empty() {
                "none".to_string()
            } else {
                known.join(", ")
            }
        )
    })?;

    let mut parameters: BTreeMap<String, String> = template
        .parameters
        .iter()
        .flatten()
        .map(|(key, value)| (key.clone(), parameter_text(value)))
        .collect();
    for raw in parameter_overrides {
        let (key, value) = parse_parameter_override(raw)?;
        parameters.insert(key, value);
    }

    Ok(StackDefinition {
        name: id.to_string(),
        remote_name: template.name.clone(),
        template_path: Some(template.path.clone()),
        capabilities: template.capabilities.clone().unwrap_or_default(),
        parameters,
    })
}

pub fn parse_parameter_override(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid parameter {raw:?}, expected KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("invalid parameter {raw:?}, empty key"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// One row of `describe-stack-events`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StackEvent {
    pub timestamp: String,
    pub logical_resource_id: Option<String>,
    pub resource_type: Option<String>,
    pub resource_status: Option<String>,
    pub resource_status_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct StackEventsPage {
    stack_events: Vec<StackEvent>,
}

pub fn parse_stack_events(value: Value) -> Result<Vec<StackEvent>, serde_json::Error> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let page: StackEventsPage = serde_json::from_value(value)?;
    Ok(page.stack_events)
}

/// Tab-separated event lines, oldest first.
pub fn render_events(events: &[StackEvent]) -> String {
    events
        .iter()
        .rev()
        .map(|event| {
            [
                event.timestamp.as_str(),
                event.logical_resource_id.as_deref().unwrap_or("-"),
                event.resource_type.as_deref().unwrap_or("-"),
                event.resource_status.as_deref().unwrap_or("-"),
                event.resource_status_reason.as_deref().unwrap_or(""),
            ]
            .join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn stack_name_args(command: &str, remote_name: &str) -> Vec<String> {
    vec![
        command.to_string(),
        "--stack-name".to_string(),
        remote_name.to_string(),
    ]
}

/// Arguments for `create-stack` / `update-stack`.
pub fn template_command_args(command: &str, request: &StackRequest<'_>) -> Vec<String> {
    let mut args = stack_name_args(command, request.remote_name);
    args.push("--template-body".to_string());
    args.push(format!("file://{}", request.template_path));
    if !request.capabilities.is_empty() {
        args.push("--capabilities".to_string());
        args.extend(request.capabilities.iter().map(|cap| cap.as_str().to_string()));
    }
    if !request.parameters.is_empty() {
        args.push("--parameters".to_string());
        args.extend(
            request
                .parameters
                .iter()
                .map(|(key, value)| format!("ParameterKey={key},ParameterValue={value}")),
        );
    }
    args
}

/// `remote_name` may be an ARN; fall back to the first stack when no name matches.
fn status_from_describe(remote_name: &str, value: &Value) -> Option<String> {
    let stacks = value.get("Stacks")?.as_array()?;
    let named =
        |stack: &&Value| stack.get("StackName").and_then(Value::as_str) == Some(remote_name);
    stacks
        .iter()
        .find(named)
        .or_else(|| stacks.first())?
        .get("StackStatus")?
        .as_str()
        .map(str::to_string)
}

impl StackApi for AwsCli {
    fn describe_status(&self, remote_name: &str) -> Result<String, RemoteError> {
        let args = stack_name_args("describe-stacks", remote_name);
        let value = self.json(CLOUDFORMATION, &args)?;
        status_from_describe(remote_name, &value).ok_or_else(|| {
            RemoteError::new(
                "aws cloudformation describe-stacks",
                format!("no StackStatus for {remote_name} in describe-stacks output"),
            )
        })
    }

    fn create_stack(&self, request: &StackRequest<'_>) -> Result<(), RemoteError> {
        self.json(CLOUDFORMATION, &template_command_args("create-stack", request))
            .map(|_| ())
    }

    fn update_stack(&self, request: &StackRequest<'_>) -> Result<(), RemoteError> {
        self.json(CLOUDFORMATION, &template_command_args("update-stack", request))
            .map(|_| ())
    }

    fn delete_stack(&self, remote_name: &str) -> Result<(), RemoteError> {
        self.json(CLOUDFORMATION, &stack_name_args("delete-stack", remote_name))
            .map(|_| ())
    }

    fn describe_events(&self, remote_name: &str) -> Result<Vec<StackEvent>, RemoteError> {
        let value = self.json(
            CLOUDFORMATION,
            &stack_name_args("describe-stack-events", remote_name),
        )?;
        parse_stack_events(value).map_err(|err| {
            RemoteError::new(
                "aws cloudformation describe-stack-events",
                format!("unexpected output shape: {err}"),
            )
        })
    }
}
