//! Per-invocation context.
//!
//! Built once in `main` from the located workspace, the CLI flags and the
//! process environment, then passed by reference to every command.
use crate::aws::AwsCli;
use crate::config::{self, CfutConfig};
use crate::deploy::{PollPolicy, DEFAULT_READY_STATUSES};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables the tool consults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Overrides the profile's region when resolving ECR addresses.
    pub aws_default_region: Option<String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            aws_default_region: std::env::var("AWS_DEFAULT_REGION")
                .ok()
                .filter(|value| !value.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    root: PathBuf,
    config: CfutConfig,
    profile: Option<String>,
    env: Environment,
}

impl Session {
    /// The `-p` flag wins over the config's `profile`.
    pub fn new(
        root: PathBuf,
        config: CfutConfig,
        cli_profile: Option<String>,
        env: Environment,
    ) -> Self {
        let profile = cli_profile.or_else(|| config.profile.clone());
        Self {
            root,
            config,
            profile,
            env,
        }
    }

    pub fn load(
        root: PathBuf,
        defines: &[String],
        cli_profile: Option<String>,
        env: Environment,
    ) -> Result<Self> {
        let config = config::load_config(&root, defines)?;
        Ok(Self::new(root, config, cli_profile, env))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CfutConfig {
        &self.config
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn aws(&self) -> AwsCli {
        AwsCli::new(self.profile.clone())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        let mut policy = PollPolicy::default();
        if let Some(settings) = &self.config.deploy {
            if let Some(secs) = settings.poll_interval_secs {
                policy.interval = Duration::from_secs(secs);
            }
            policy.max_attempts = settings.max_poll_attempts;
        }
        policy
    }

    pub fn ready_statuses(&self) -> Vec<String> {
        self.config
            .deploy
            .as_ref()
            .and_then(|settings| settings.ready_statuses.clone())
            .unwrap_or_else(|| {
                DEFAULT_READY_STATUSES
                    .iter()
                    .map(|status| status.to_string())
                    .collect()
            })
    }
}
