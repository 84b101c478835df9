//! DynamoDB table dump.
use crate::aws::AwsCli;
use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};

/// Strip DynamoDB type descriptors: `{"id": {"S": "a"}}` becomes `{"id": "a"}`.
pub fn simplify_items(scan: &Value) -> Result<Vec<Map<String, Value>>> {
    let items = scan
        .get("Items")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("scan output has no Items"))?;
    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| {
            item.iter()
                .map(|(key, typed)| {
                    let plain = typed
                        .as_object()
                        .and_then(|descriptor| descriptor.values().next())
                        .cloned()
                        .unwrap_or_else(|| typed.clone());
                    (key.clone(), plain)
                })
                .collect()
        })
        .collect())
}

pub fn dump_table(aws: &AwsCli, table: &str) -> Result<String> {
    let scan = aws
        .json(
            "dynamodb",
            &[
                "scan".to_string(),
                "--table-name".to_string(),
                table.to_string(),
            ],
        )
        .with_context(|| format!("scan table {table}"))?;
    let items = simplify_items(&scan)?;
    serde_yaml::to_string(&items).context("render items as YAML")
}
