//! ECR login, image build/push and image listing.
use crate::aws::{AwsCli, OutputFormat, OutputStyle};
use crate::config::EcrConfig;
use crate::session::Session;
use crate::util::{capture_stdout, run_checked, run_with_stdin};
use anyhow::{anyhow, Context, Result};
use serde_json::Value;

const GIT_REVISION_LEN: usize = 8;

/// Command-line replacements for fields of the `ecr` config section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EcrOverrides {
    pub account: Option<String>,
    pub region: Option<String>,
    pub repo: Option<String>,
    pub tag: Option<String>,
    pub src: Option<String>,
}

/// Merge overrides over the config section. `repo` must come from one of them.
pub fn effective_ecr(config: Option<&EcrConfig>, overrides: &EcrOverrides) -> Result<EcrConfig> {
    let repo = overrides
        .repo
        .clone()
        .or_else(|| config.map(|ecr| ecr.repo.clone()))
        .ok_or_else(|| anyhow!("no ECR repository configured (set `ecr.repo` or pass --repo)"))?;
    Ok(EcrConfig {
        account: overrides
            .account
            .clone()
            .or_else(|| config.and_then(|ecr| ecr.account.clone())),
        region: overrides
            .region
            .clone()
            .or_else(|| config.and_then(|ecr| ecr.region.clone())),
        repo,
        tag: overrides
            .tag
            .clone()
            .or_else(|| config.map(|ecr| ecr.tag.clone()))
            .unwrap_or_else(|| "dev".to_string()),
        src: overrides
            .src
            .clone()
            .or_else(|| config.map(|ecr| ecr.src.clone()))
            .unwrap_or_else(|| ".".to_string()),
    })
}

/// Registry host for one account and region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    pub account: String,
    pub region: String,
}

impl Registry {
    pub fn address(&self) -> String {
        format!("{}.dkr.ecr.{}.amazonaws.com", self.account, self.region)
    }

    pub fn image(&self, repo: &str) -> String {
        format!("{}/{repo}", self.address())
    }
}

/// Region precedence: config, `AWS_DEFAULT_REGION`, then the profile's region.
pub fn resolve_registry(session: &Session, ecr: &EcrConfig) -> Result<Registry> {
    let aws = session.aws();
    let region = match ecr
        .region
        .clone()
        .or_else(|| session.env().aws_default_region.clone())
    {
        Some(region) => region,
        None => profile_region(&aws)?,
    };
    let account = match ecr.account.clone() {
        Some(account) => account,
        None => caller_account(&aws)?,
    };
    Ok(Registry { account, region })
}

fn profile_region(aws: &AwsCli) -> Result<String> {
    let region = aws
        .text("configure", &["get".to_string(), "region".to_string()], None)
        .context("resolve AWS region")?;
    if region.is_empty() {
        return Err(anyhow!(
            "no AWS region configured for profile {}",
            aws.profile().unwrap_or("default")
        ));
    }
    Ok(region)
}

fn caller_account(aws: &AwsCli) -> Result<String> {
    let output = OutputFormat::styled(OutputStyle::Text, "Account");
    aws.text("sts", &["get-caller-identity".to_string()], Some(&output))
        .context("resolve AWS account")
}

/// `docker login` against the registry with a fresh ECR password.
pub fn login(aws: &AwsCli, registry: &Registry) -> Result<()> {
    let password = aws
        .text(
            "ecr",
            &[
                "get-login-password".to_string(),
                "--region".to_string(),
                registry.region.clone(),
            ],
            None,
        )
        .context("fetch ECR login password")?;
    let args = vec![
        "login".to_string(),
        "--password-stdin".to_string(),
        "--username".to_string(),
        "AWS".to_string(),
        registry.address(),
    ];
    run_with_stdin("docker", &args, Some(&password))
}

pub fn git_revision() -> Option<String> {
    capture_stdout("git", &["rev-parse", "HEAD"])
        .map(|rev| rev.chars().take(GIT_REVISION_LEN).collect())
}

/// Revision tag (when known), configured tag, then `latest`.
pub fn image_tags(image: &str, tag: &str, revision: Option<&str>) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(revision) = revision {
        tags.push(format!("{image}:{revision}"));
    }
    for name in [tag, "latest"] {
        let full = format!("{image}:{name}");
        if !tags.contains(&full) {
            tags.push(full);
        }
    }
    tags
}

pub fn build_args(tags: &[String], src: &str) -> Vec<String> {
    let mut args = vec!["build".to_string()];
    for tag in tags {
        args.push("-t".to_string());
        args.push(tag.clone());
    }
    args.push(src.to_string());
    args
}

pub fn push(session: &Session, ecr: &EcrConfig) -> Result<Vec<String>> {
    let registry = resolve_registry(session, ecr)?;
    login(&session.aws(), &registry)?;

    let revision = git_revision();
    if revision.is_none() {
        tracing::warn!("no git revision available; skipping revision tag");
    }
    let tags = image_tags(&registry.image(&ecr.repo), &ecr.tag, revision.as_deref());
    run_checked("docker", &build_args(&tags, &ecr.src))?;
    // Each tag is pushed separately for older docker clients.
    for tag in &tags {
        run_checked("docker", &["push".to_string(), tag.clone()])?;
    }
    Ok(tags)
}

/// One row of `ecrls`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRow {
    pub pushed_at: String,
    pub size_mb: u64,
    pub digest: String,
    pub tags: Vec<String>,
}

impl ImageRow {
    pub fn render(&self) -> String {
        format!(
            "{}\t{} MB\t{}\t{}",
            self.pushed_at,
            self.size_mb,
            self.digest,
            self.tags.join(",")
        )
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Rows from `ecr describe-images` JSON, oldest push first.
pub fn image_rows(value: &Value) -> Result<Vec<ImageRow>> {
    let details = value
        .get("imageDetails")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("describe-images output has no imageDetails"))?;
    let mut rows: Vec<(Value, ImageRow)> = details
        .iter()
        .map(|detail| {
            let pushed = detail.get("imagePushedAt").cloned().unwrap_or(Value::Null);
            let bytes = detail
                .get("imageSizeInBytes")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let digest = detail
                .get("imageDigest")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let digest = digest
                .split_once(':')
                .map_or(digest, |(_, hex)| hex)
                .to_string();
            let tags = detail
                .get("imageTags")
                .and_then(Value::as_array)
                .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            let row = ImageRow {
                pushed_at: scalar_text(&pushed),
                size_mb: bytes / (1024 * 1024),
                digest,
                tags,
            };
            (pushed, row)
        })
        .collect();
    rows.sort_by(|(left, _), (right, _)| match (left.as_f64(), right.as_f64()) {
        (Some(left), Some(right)) => left.total_cmp(&right),
        _ => scalar_text(left).cmp(&scalar_text(right)),
    });
    Ok(rows.into_iter().map(|(_, row)| row).collect())
}

pub fn list_images(session: &Session, ecr: &EcrConfig) -> Result<Vec<ImageRow>> {
    let registry = resolve_registry(session, ecr)?;
    let aws = session.aws();
    login(&aws, &registry)?;
    let value = aws
        .json(
            "ecr",
            &[
                "describe-images".to_string(),
                "--repository-name".to_string(),
                ecr.repo.clone(),
            ],
        )
        .context("list ECR images")?;
    image_rows(&value)
}
