//! Workspace configuration (`cfut.json`).
//!
//! The config is a small JSON registry of stack aliases plus optional ECR and
//! deployment settings. It is located once per invocation by walking up from
//! the current directory, and never mutated after overrides are applied.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

mod init;
mod overrides;

pub use init::init_workspace;
pub use overrides::apply_overrides;

pub const CONFIG_FILE: &str = "cfut.json";

/// Alias used when a command is given no stack id.
pub const DEFAULT_STACK_ID: &str = "default";

/// Acknowledgment tokens CloudFormation requires for IAM-touching templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "CAPABILITY_IAM")]
    Iam,
    #[serde(rename = "CAPABILITY_NAMED_IAM")]
    NamedIam,
    #[serde(rename = "CAPABILITY_AUTO_EXPAND")]
    AutoExpand,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Iam => "CAPABILITY_IAM",
            Capability::NamedIam => "CAPABILITY_NAMED_IAM",
            Capability::AutoExpand => "CAPABILITY_AUTO_EXPAND",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stack entry under `templates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Remote CloudFormation stack name.
    pub name: String,
    /// Template file, relative to the workspace root.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<Capability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcrConfig {
    /// Account owning the repository, when it differs from the caller's.
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Repository name (not the full URL).
    pub repo: String,
    /// Tag pushed in addition to the git revision and `latest`.
    #[serde(default = "default_ecr_tag")]
    pub tag: String,
    /// Directory holding the Dockerfile.
    #[serde(default = "default_ecr_src")]
    pub src: String,
}

fn default_ecr_tag() -> String {
    "dev".to_string()
}

fn default_ecr_src() -> String {
    ".".to_string()
}

/// Tuning for the deploy state machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_poll_attempts: Option<u32>,
    /// Statuses from which `deploy` issues an update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_statuses: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfutConfig {
    #[serde(default)]
    pub profile: Option<String>,
    pub templates: BTreeMap<String, TemplateConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecr: Option<EcrConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeploySettings>,
}

impl CfutConfig {
    pub fn template(&self, id: &str) -> Option<&TemplateConfig> {
        self.templates.get(id)
    }

    /// Remote stack name for an alias; unknown aliases pass through verbatim.
    pub fn remote_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.template(id)
            .map(|template| template.name.as_str())
            .unwrap_or(id)
    }
}

/// Walk from `start` up to the filesystem root looking for `file_name`.
pub fn find_in_parents(start: &Path, file_name: &str) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(file_name);
        if candidate.exists() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn parse_config(text: &str) -> Result<CfutConfig> {
    serde_json::from_str(text).context("parse cfut config JSON")
}

/// Load `cfut.json` from a workspace root and apply `-d key=value` overrides.
pub fn load_config(root: &Path, defines: &[String]) -> Result<CfutConfig> {
    let path = config_path(root);
    if !path.is_file() {
        return Err(anyhow!(
            "config file '{CONFIG_FILE}' not found in {}, run `cfut init` to create it",
            root.display()
        ));
    }
    let text =
        fs::read_to_string(&path).with_context(|| format!("read config {}", path.display()))?;
    let config = parse_config(&text).with_context(|| format!("load {}", path.display()))?;
    if defines.is_empty() {
        return Ok(config);
    }
    apply_overrides(&config, defines)
}

/// Persist a config as 2-space indented JSON.
pub fn write_config(root: &Path, config: &CfutConfig) -> Result<()> {
    let path = config_path(root);
    let text = serde_json::to_string_pretty(config).context("serialize cfut config")?;
    fs::write(&path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Render a parameter value the way the AWS CLI expects it.
pub fn parameter_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
