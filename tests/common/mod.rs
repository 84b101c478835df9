//! Shared test infrastructure for integration tests.
//!
//! Runs the built `cfut` binary in a scratch workspace with a fake `aws`
//! script first on `PATH`. The script logs each invocation and answers
//! `describe-stacks` from a queue of statuses.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Status token the fake script turns into a "does not exist" error.
pub const MISSING: &str = "MISSING";

const FAKE_AWS: &str = r#"#!/bin/sh
state="$FAKE_AWS_STATE"
echo "$*" >> "$state/calls.log"
case "$*" in
  *describe-stack-events*)
    echo '{"StackEvents": [{"Timestamp": "2024-01-01T00:00:00Z", "LogicalResourceId": "Bucket", "ResourceType": "AWS::S3::Bucket", "ResourceStatus": "UPDATE_FAILED", "ResourceStatusReason": "denied"}]}'
    ;;
  *describe-stacks*)
    queue="$state/statuses"
    status=$(head -n 1 "$queue")
    if [ "$(wc -l < "$queue")" -gt 1 ]; then
      tail -n +2 "$queue" > "$queue.next" && mv "$queue.next" "$queue"
    fi
    if [ "$status" = "MISSING" ]; then
      echo "An error occurred (ValidationError) when calling the DescribeStacks operation: Stack with id fake does not exist" >&2
      exit 254
    fi
    echo "{\"Stacks\": [{\"StackName\": \"fake\", \"StackStatus\": \"$status\"}]}"
    ;;
  *update-stack*)
    if [ -f "$state/update_error" ]; then
      cat "$state/update_error" >&2
      exit 254
    fi
    echo '{"StackId": "arn:aws:cloudformation:eu-west-1:123456789012:stack/fake/1"}'
    ;;
  *create-stack*)
    echo '{"StackId": "arn:aws:cloudformation:eu-west-1:123456789012:stack/fake/1"}'
    ;;
  *)
    echo "fake aws output"
    ;;
esac
"#;

const TEMPLATE: &str = "AWSTemplateFormatVersion: '2010-09-09'\nResources: {}\n";

/// Scratch workspace plus fake `aws` state.
pub struct Workspace {
    dir: TempDir,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let bin = dir.path().join("bin");
        let state = dir.path().join("state");
        let root = dir.path().join("project");
        for path in [&bin, &state, &root] {
            fs::create_dir_all(path).expect("create dir");
        }
        let script = bin.join("aws");
        fs::write(&script, FAKE_AWS).expect("write fake aws");
        make_executable(&script);
        fs::write(state.join("statuses"), "").expect("write status queue");
        Self { dir }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    fn state(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn add_template(&self, relative: &str) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create template dir");
        }
        fs::write(path, TEMPLATE).expect("write template");
    }

    pub fn write_config(&self, json: &str) {
        fs::write(self.root().join("cfut.json"), json).expect("write cfut.json");
    }

    pub fn read_config(&self) -> serde_json::Value {
        let text = fs::read_to_string(self.root().join("cfut.json")).expect("read cfut.json");
        serde_json::from_str(&text).expect("parse cfut.json")
    }

    /// Statuses returned by successive `describe-stacks` calls; the last repeats.
    pub fn queue_statuses(&self, statuses: &[&str]) {
        let mut text = statuses.join("\n");
        text.push('\n');
        fs::write(self.state().join("statuses"), text).expect("write status queue");
    }

    pub fn fail_update_with(&self, message: &str) {
        fs::write(self.state().join("update_error"), message).expect("write update error");
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.state().join("calls.log"))
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.run_in(&self.root(), args)
    }

    pub fn run_in(&self, cwd: &Path, args: &[&str]) -> Output {
        let path = std::env::var_os("PATH").unwrap_or_default();
        let mut dirs = vec![self.dir.path().join("bin")];
        dirs.extend(std::env::split_paths(&path));
        Command::new(env!("CARGO_BIN_EXE_cfut"))
            .args(args)
            .current_dir(cwd)
            .env("PATH", std::env::join_paths(dirs).expect("join PATH"))
            .env("FAKE_AWS_STATE", self.state())
            .env_remove("AWS_DEFAULT_REGION")
            .env_remove("CFUT_LOG")
            .output()
            .expect("run cfut")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).expect("stat script").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod script");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}
