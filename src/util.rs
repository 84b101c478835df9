use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;

/// Resolve an external tool on `PATH`.
pub fn require_binary(name: &str) -> Result<PathBuf> {
    which::which(name).with_context(|| format!("`{name}` not found on PATH"))
}

/// Render argv as a copy-pasteable shell line for `> ...` echoes.
pub fn format_command_line<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(program);
    parts.extend(args.iter().map(AsRef::as_ref));
    shell_words::join(parts)
}

/// Echo and run a tool with the terminal attached; a non-zero exit is an error.
pub fn run_checked(program: &str, args: &[String]) -> Result<()> {
    run_with_stdin(program, args, None)
}

/// Like [`run_checked`], feeding `input` on stdin (never echoed).
pub fn run_with_stdin(program: &str, args: &[String], input: Option<&str>) -> Result<()> {
    let line = format_command_line(program, args);
    println!("> {line}");
    let resolved = require_binary(program)?;
    let start = Instant::now();
    let mut command = Command::new(resolved);
    command.args(args);
    let status = match input {
        None => command.status().with_context(|| format!("spawn `{line}`"))?,
        Some(input) => {
            command.stdin(Stdio::piped());
            let mut child = command.spawn().with_context(|| format!("spawn `{line}`"))?;
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(input.as_bytes())
                    .with_context(|| format!("write stdin of `{line}`"))?;
            }
            child.wait().with_context(|| format!("wait for `{line}`"))?
        }
    };
    tracing::debug!(
        program,
        elapsed_ms = start.elapsed().as_millis() as u64,
        success = status.success(),
        "command complete"
    );
    if !status.success() {
        return Err(anyhow!(
            "command failed with status {}: {line}",
            exit_status_string(&status)
        ));
    }
    Ok(())
}

/// Trimmed stdout of a quiet helper command, or `None` if it fails.
pub fn capture_stdout(program: &str, args: &[&str]) -> Option<String> {
    let resolved = which::which(program).ok()?;
    let output = Command::new(resolved)
        .args(args)
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        tracing::debug!(program, "helper command failed");
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

pub fn exit_status_string(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        format!("{code}")
    } else {
        "terminated by signal".to_string()
    }
}
