use super::init::discover_templates;
use super::*;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_workspace(name: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    let root = std::env::temp_dir().join(format!("{name}-{}-{now}", std::process::id()));
    fs::create_dir_all(&root).expect("create temp root");
    root
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, contents.as_bytes()).expect("write file");
}

const SAMPLE: &str = r#"{
  "profile": "dev",
  "templates": {
    "default": {
      "name": "app-stack",
      "path": "infra/app.yaml",
      "capabilities": ["CAPABILITY_IAM", "CAPABILITY_AUTO_EXPAND"],
      "parameters": {"Env": "dev", "Size": 3}
    }
  },
  "ecr": {"repo": "app"}
}"#;

#[test]
fn parses_sample_config_with_defaults() {
    let config = parse_config(SAMPLE).expect("parse");
    assert_eq!(config.profile.as_deref(), Some("dev"));
    let template = config.template("default").expect("default template");
    assert_eq!(template.name, "app-stack");
    assert_eq!(
        template.capabilities.as_deref(),
        Some(&[Capability::Iam, Capability::AutoExpand][..])
    );
    let ecr = config.ecr.as_ref().expect("ecr");
    assert_eq!(ecr.tag, "dev");
    assert_eq!(ecr.src, ".");
    assert!(ecr.account.is_none());
    assert!(config.deploy.is_none());
}

#[test]
fn remote_name_passes_unknown_alias_through() {
    let config = parse_config(SAMPLE).expect("parse");
    assert_eq!(config.remote_name("default"), "app-stack");
    assert_eq!(config.remote_name("someone-elses-stack"), "someone-elses-stack");
}

#[test]
fn rejects_unknown_capability() {
    let text = r#"{"templates": {"a": {"name": "a", "path": "a.yaml", "capabilities": ["CAPABILITY_ROOT"]}}}"#;
    assert!(parse_config(text).is_err());
}

#[test]
fn parameter_text_renders_non_strings_as_json() {
    assert_eq!(parameter_text(&Value::String("dev".into())), "dev");
    assert_eq!(parameter_text(&serde_json::json!(3)), "3");
    assert_eq!(parameter_text(&serde_json::json!(true)), "true");
}

#[test]
fn overrides_set_strings_and_literals() {
    let config = parse_config(SAMPLE).expect("parse");
    let defines = vec![
        "ecr.repo=other-repo".to_string(),
        "ecr.account=123456789012".to_string(),
        "deploy.max_poll_attempts=10".to_string(),
        "profile=prod".to_string(),
    ];
    let overridden = apply_overrides(&config, &defines).expect("apply");
    let ecr = overridden.ecr.as_ref().expect("ecr");
    assert_eq!(ecr.repo, "other-repo");
    assert_eq!(ecr.account.as_deref(), Some("123456789012"));
    assert_eq!(
        overridden.deploy.as_ref().and_then(|d| d.max_poll_attempts),
        Some(10)
    );
    assert_eq!(overridden.profile.as_deref(), Some("prod"));
    assert_eq!(config.profile.as_deref(), Some("dev"));
}

#[test]
fn overrides_reject_malformed_input() {
    let config = parse_config(SAMPLE).expect("parse");
    assert!(apply_overrides(&config, &["ecr.repo".to_string()]).is_err());
    assert!(apply_overrides(&config, &["ecr..repo=x".to_string()]).is_err());
    assert!(apply_overrides(&config, &["deploy.max_poll_attempts=soon".to_string()]).is_err());
    assert!(apply_overrides(&config, &["profile.inner=x".to_string()]).is_err());
}

#[test]
fn find_in_parents_walks_upward() {
    let root = temp_workspace("cfut-find-parents");
    write_file(&root.join(CONFIG_FILE), SAMPLE);
    let nested = root.join("a/b/c");
    fs::create_dir_all(&nested).expect("create nested");

    let found = find_in_parents(&nested, CONFIG_FILE).expect("found");
    assert_eq!(found, root.join(CONFIG_FILE));
    assert!(find_in_parents(&nested, "no-such-file.json").is_none());
}

#[test]
fn load_config_reports_missing_file() {
    let root = temp_workspace("cfut-load-missing");
    let err = load_config(&root, &[]).expect_err("missing config");
    assert!(err.to_string().contains("cfut init"));
}

#[test]
fn init_registers_single_template_as_default() {
    let root = temp_workspace("cfut-init-single");
    write_file(
        &root.join("infra/app.yaml"),
        "AWSTemplateFormatVersion: '2010-09-09'\nResources: {}\n",
    );
    write_file(&root.join("package.json"), "{\"name\": \"not-a-template\"}");

    let config = init_workspace(&root).expect("init");
    assert_eq!(config.templates.len(), 1);
    let template = config.template(DEFAULT_STACK_ID).expect("default");
    assert_eq!(template.name, "app");
    assert_eq!(template.path, "infra/app.yaml");

    let reloaded = load_config(&root, &[]).expect("reload");
    assert_eq!(reloaded, config);
    assert!(init_workspace(&root).is_err(), "second init must refuse");
}

#[test]
fn init_keys_multiple_templates_by_stem() {
    let root = temp_workspace("cfut-init-multi");
    write_file(
        &root.join("network.yml"),
        "AWSTemplateFormatVersion: '2010-09-09'\n",
    );
    write_file(
        &root.join("db/database.json"),
        "{\"AWSTemplateFormatVersion\": \"2010-09-09\"}",
    );
    write_file(
        &root.join(".hidden/ignored.yaml"),
        "AWSTemplateFormatVersion: '2010-09-09'\n",
    );

    let templates = discover_templates(&root).expect("discover");
    let keys: Vec<&str> = templates.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["database", "network"]);
    assert_eq!(templates["database"].path, "db/database.json");
}
