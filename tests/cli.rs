//! End-to-end runs of the `cfut` binary against a fake `aws` on `PATH`.
#![cfg(unix)]

mod common;

use common::{stderr, stdout, Workspace, MISSING};

const API_CONFIG: &str = r#"{
  "profile": "test",
  "templates": {
    "default": {"name": "fake", "path": "stack/api.yml",
                "capabilities": ["CAPABILITY_IAM"], "parameters": {"Env": "dev"}}
  },
  "deploy": {"poll_interval_secs": 0, "max_poll_attempts": 10}
}"#;

#[test]
fn init_registers_a_lone_template_as_default() {
    let ws = Workspace::new();
    ws.add_template("stack/api.yml");
    std::fs::write(ws.root().join("notes.yml"), "just: yaml\n").expect("write notes");

    let output = ws.run(&["init"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let config = ws.read_config();
    assert_eq!(config["profile"], "default");
    assert_eq!(config["templates"]["default"]["name"], "api");
    assert_eq!(config["templates"]["default"]["path"], "stack/api.yml");
    assert!(stdout(&output).contains("default: stack/api.yml => api"));

    let again = ws.run(&["init"]);
    assert!(!again.status.success());
    assert!(stderr(&again).contains("already exists"));
}

#[test]
fn overview_lists_stacks_from_a_subdirectory() {
    let ws = Workspace::new();
    ws.add_template("stack/api.yml");
    ws.write_config(API_CONFIG);

    let nested = ws.root().join("stack");
    let output = ws.run_in(&nested, &[]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Run cfut -h to get help."));
    assert!(out.contains("default: stack/api.yml => fake"));
}

#[test]
fn missing_config_is_reported_without_a_terminal() {
    let ws = Workspace::new();
    let output = ws.run(&["status"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("cfut init"));
    assert!(ws.calls().is_empty());
}

#[test]
fn deploy_creates_a_missing_stack_and_polls_to_completion() {
    let ws = Workspace::new();
    ws.add_template("stack/api.yml");
    ws.write_config(API_CONFIG);
    ws.queue_statuses(&[MISSING, "CREATE_IN_PROGRESS", "CREATE_COMPLETE"]);

    let output = ws.run(&["deploy", "-P", "Env=prod"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let calls = ws.calls();
    assert_eq!(calls.len(), 4, "calls: {calls:?}");
    let create = &calls[1];
    assert!(create.starts_with("cloudformation --output json --profile test create-stack"));
    assert!(create.contains("--template-body file://stack/api.yml"));
    assert!(create.contains("--capabilities CAPABILITY_IAM"));
    assert!(create.contains("ParameterKey=Env,ParameterValue=prod"));

    let out = stdout(&output);
    assert!(out.contains("Progress: CREATE_IN_PROGRESS"));
    assert!(out.contains("Complete: CREATE_COMPLETE"));
    assert!(out.contains("fake: created (CREATE_COMPLETE)"));
}

#[test]
fn deploy_with_nothing_to_update_succeeds_without_polling() {
    let ws = Workspace::new();
    ws.add_template("stack/api.yml");
    ws.write_config(API_CONFIG);
    ws.queue_statuses(&["UPDATE_ROLLBACK_COMPLETE"]);
    ws.fail_update_with(
        "An error occurred (ValidationError) when calling the UpdateStack operation: \
         No updates are to be performed.",
    );

    let output = ws.run(&["deploy"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let calls = ws.calls();
    assert_eq!(calls.len(), 2, "calls: {calls:?}");
    assert!(calls[1].contains("update-stack"));
    let out = stdout(&output);
    assert!(out.contains("fake: no updates are to be performed"));
    assert_eq!(out.to_lowercase().matches("no updates are to be performed").count(), 1);
}

#[test]
fn deploy_refuses_a_stack_in_rollback() {
    let ws = Workspace::new();
    ws.add_template("stack/api.yml");
    ws.write_config(API_CONFIG);
    ws.queue_statuses(&["ROLLBACK_COMPLETE"]);

    let output = ws.run(&["deploy"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("manual intervention required"));
    assert!(stdout(&output).contains("UPDATE_FAILED"));

    let calls = ws.calls();
    assert_eq!(calls.len(), 2, "calls: {calls:?}");
    assert!(calls[1].contains("describe-stack-events"));
    assert!(!calls.iter().any(|call| call.contains("update-stack")));
}

#[test]
fn delete_waits_until_the_stack_is_gone() {
    let ws = Workspace::new();
    ws.add_template("stack/api.yml");
    ws.write_config(API_CONFIG);
    ws.queue_statuses(&["DELETE_IN_PROGRESS", MISSING]);

    let output = ws.run(&["delete"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("fake: NOT_EXIST"));
    assert!(ws.calls()[0].ends_with("delete-stack --stack-name fake"));
}

#[test]
fn ls_echoes_and_forwards_extra_arguments() {
    let ws = Workspace::new();
    ws.write_config(API_CONFIG);

    let output = ws.run(&["-p", "prod", "ls", "--stack-name", "other"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("> aws cloudformation --output table --query"));
    assert!(out.contains("\"StackName\": \"fake\""));
    let calls = ws.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("--profile prod describe-stacks --stack-name other"));
}

#[test]
fn status_reports_each_configured_stack() {
    let ws = Workspace::new();
    ws.write_config(API_CONFIG);
    ws.queue_statuses(&[MISSING]);

    let output = ws.run(&["status"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("fake NOT_EXIST"));
}
