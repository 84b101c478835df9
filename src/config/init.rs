use super::{config_path, write_config, CfutConfig, TemplateConfig, DEFAULT_STACK_ID};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const TEMPLATE_MARKER: &str = "AWSTemplateFormatVersion";
const TEMPLATE_EXTENSIONS: &[&str] = &["yml", "yaml", "json"];

/// Create `cfut.json` in `root` from the CloudFormation templates found below it.
pub fn init_workspace(root: &Path) -> Result<CfutConfig> {
    let path = config_path(root);
    if path.exists() {
        return Err(anyhow!(
            "config already exists at {}, delete it to run `init` again",
            path.display()
        ));
    }
    let config = CfutConfig {
        profile: Some("default".to_string()),
        templates: discover_templates(root)?,
        ecr: None,
        deploy: None,
    };
    write_config(root, &config)?;
    tracing::info!(
        templates = config.templates.len(),
        path = %path.display(),
        "initialized workspace"
    );
    Ok(config)
}

/// Find template files (by extension and marker) and key them by file stem.
/// A lone template is registered as the `default` alias.
pub fn discover_templates(root: &Path) -> Result<BTreeMap<String, TemplateConfig>> {
    let mut templates = BTreeMap::new();
    for file in collect_candidate_files(root)? {
        if !is_template(&file)? {
            continue;
        }
        let Some(stem) = file.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let relative = file.strip_prefix(root).unwrap_or(&file);
        let path = relative.to_string_lossy().replace('\\', "/");
        templates.insert(
            stem.to_string(),
            TemplateConfig {
                name: stem.to_string(),
                path,
                capabilities: None,
                parameters: None,
            },
        );
    }

    if templates.len() == 1 {
        if let Some((_, only)) = templates.pop_first() {
            templates.insert(DEFAULT_STACK_ID.to_string(), only);
        }
    }
    Ok(templates)
}

fn is_template(path: &Path) -> Result<bool> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).contains(TEMPLATE_MARKER))
}

fn collect_candidate_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if path.is_dir() {
            if !hidden {
                files.extend(collect_candidate_files(&path)?);
            }
        } else if path.is_file() && has_template_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_template_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext))
}
