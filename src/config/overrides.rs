//! `-d section.key=value` overrides applied on top of `cfut.json`.
//!
//! Overrides edit the JSON tree and the result is deserialized again, so an
//! override can never produce a config the file itself could not hold.
use super::CfutConfig;
use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};

pub fn apply_overrides(config: &CfutConfig, defines: &[String]) -> Result<CfutConfig> {
    let mut tree = serde_json::to_value(config).context("serialize config for overrides")?;
    for define in defines {
        let (path, raw) = define
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid override {define:?}, expected key.path=value"))?;
        let keys: Vec<&str> = path.split('.').map(str::trim).collect();
        if keys.iter().any(|key| key.is_empty()) {
            return Err(anyhow!("invalid override path {path:?}"));
        }
        apply_one(&mut tree, &keys, raw).with_context(|| format!("apply override {define}"))?;
        tracing::debug!(path, "applied config override");
    }
    serde_json::from_value(tree).context("validate overridden config")
}

/// Set one value, first as a string and then as a JSON literal when the
/// string form does not fit the config schema (numbers, booleans).
fn apply_one(tree: &mut Value, keys: &[&str], raw: &str) -> Result<()> {
    let mut candidate = tree.clone();
    set_path(&mut candidate, keys, Value::String(raw.to_string()))?;
    if serde_json::from_value::<CfutConfig>(candidate.clone()).is_ok() {
        *tree = candidate;
        return Ok(());
    }

    let literal: Value = serde_json::from_str(raw)
        .map_err(|_| anyhow!("value {raw:?} does not fit the config schema"))?;
    let mut candidate = tree.clone();
    set_path(&mut candidate, keys, literal)?;
    serde_json::from_value::<CfutConfig>(candidate.clone())
        .map_err(|err| anyhow!("value {raw:?} does not fit the config schema: {err}"))?;
    *tree = candidate;
    Ok(())
}

fn set_path(tree: &mut Value, keys: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = keys.split_last() else {
        return Err(anyhow!("empty override path"));
    };
    let mut node = tree;
    for key in parents {
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        let object = node
            .as_object_mut()
            .ok_or_else(|| anyhow!("cannot descend into non-object at {key:?}"))?;
        node = object
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    let object = node
        .as_object_mut()
        .ok_or_else(|| anyhow!("cannot set {last:?} on a non-object"))?;
    object.insert(last.to_string(), value);
    Ok(())
}
