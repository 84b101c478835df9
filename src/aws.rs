//! AWS CLI invocation.
//!
//! Every remote interaction is a subprocess of the `aws` binary. Commands are
//! echoed as `> aws ...` before they run. Passthrough commands inherit the
//! terminal; captured commands return parsed JSON or trimmed text, and failures
//! carry the CLI's own stderr as a [`RemoteError`] so callers can classify it.
use crate::remote_text::{classify, RemoteCondition};
use crate::util::{exit_status_string, format_command_line, require_binary};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::fmt;
use std::process::{Command, Output, Stdio};
use std::time::Instant;

const AWS_PROGRAM: &str = "aws";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    Yaml,
    Table,
    Json,
    Text,
}

impl OutputStyle {
    fn as_str(self) -> &'static str {
        match self {
            OutputStyle::Yaml => "yaml",
            OutputStyle::Table => "table",
            OutputStyle::Json => "json",
            OutputStyle::Text => "text",
        }
    }
}

/// `--output` style plus an optional JMESPath `--query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    pub style: OutputStyle,
    pub query: Option<String>,
}

impl OutputFormat {
    pub fn yaml() -> Self {
        Self {
            style: OutputStyle::Yaml,
            query: None,
        }
    }

    pub fn json() -> Self {
        Self {
            style: OutputStyle::Json,
            query: None,
        }
    }

    pub fn styled(style: OutputStyle, query: &str) -> Self {
        Self {
            style,
            query: Some(query.to_string()),
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["--output".to_string(), self.style.as_str().to_string()];
        if let Some(query) = &self.query {
            args.push("--query".to_string());
            args.push(query.clone());
        }
        args
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::yaml()
    }
}

/// A failed AWS CLI call: the command line and what the CLI said about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub command: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            message: message.into(),
        }
    }

    pub fn condition(&self) -> Option<RemoteCondition> {
        classify(&self.message)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` failed: {}", self.command, self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Runner for `aws <family> ...` bound to one profile.
#[derive(Debug, Clone)]
pub struct AwsCli {
    profile: Option<String>,
}

impl AwsCli {
    pub fn new(profile: Option<String>) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn profile_args(&self) -> Vec<String> {
        match &self.profile {
            Some(profile) => vec!["--profile".to_string(), profile.clone()],
            None => Vec::new(),
        }
    }

    /// `<family> <output args> <profile args> <subcommand...>`
    pub fn argv(
        &self,
        family: &str,
        output: Option<&OutputFormat>,
        subcommand: &[String],
    ) -> Vec<String> {
        let mut argv = vec![family.to_string()];
        if let Some(output) = output {
            argv.extend(output.args());
        }
        argv.extend(self.profile_args());
        argv.extend(subcommand.iter().cloned());
        argv
    }

    /// Run with the terminal attached so the user sees the CLI's own output.
    pub fn passthrough(
        &self,
        family: &str,
        subcommand: &[String],
        output: &OutputFormat,
    ) -> Result<()> {
        let argv = self.argv(family, Some(output), subcommand);
        let line = format_command_line(AWS_PROGRAM, &argv);
        println!("> {line}");
        let program = require_binary(AWS_PROGRAM)?;
        let start = Instant::now();
        let status = Command::new(program)
            .args(&argv)
            .env("AWS_PAGER", "less")
            .status()
            .map_err(|err| anyhow!("spawn `{line}`: {err}"))?;
        tracing::debug!(
            family,
            elapsed_ms = start.elapsed().as_millis() as u64,
            success = status.success(),
            "aws passthrough complete"
        );
        if !status.success() {
            return Err(anyhow!(
                "`{line}` exited with status {}",
                exit_status_string(&status)
            ));
        }
        Ok(())
    }

    /// Run with `--output json` and parse stdout.
    pub fn json(
        &self,
        family: &str,
        subcommand: &[String],
    ) -> Result<Value, RemoteError> {
        let (line, output) = self.capture(family, Some(&OutputFormat::json()), subcommand)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&stdout)
            .map_err(|err| RemoteError::new(line, format!("unparseable JSON output: {err}")))
    }

    /// Run and return trimmed stdout.
    pub fn text(
        &self,
        family: &str,
        subcommand: &[String],
        output: Option<&OutputFormat>,
    ) -> Result<String, RemoteError> {
        let (_, output) = self.capture(family, output, subcommand)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn capture(
        &self,
        family: &str,
        output: Option<&OutputFormat>,
        subcommand: &[String],
    ) -> Result<(String, Output), RemoteError> {
        let argv = self.argv(family, output, subcommand);
        let line = format_command_line(AWS_PROGRAM, &argv);
        println!("> {line}");
        let program =
            require_binary(AWS_PROGRAM).map_err(|err| RemoteError::new(&line, format!("{err:#}")))?;
        let start = Instant::now();
        let result = Command::new(program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| RemoteError::new(&line, format!("spawn failed: {err}")))?;
        tracing::debug!(
            family,
            elapsed_ms = start.elapsed().as_millis() as u64,
            stdout_bytes = result.stdout.len(),
            success = result.status.success(),
            "aws capture complete"
        );
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let message = match stderr.trim() {
                "" => format!("exit status {}", exit_status_string(&result.status)),
                trimmed => trimmed.to_string(),
            };
            return Err(RemoteError::new(line, message));
        }
        Ok((line, result))
    }
}
