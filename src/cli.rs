//! CLI argument parsing.
//!
//! Each subcommand is a short alias for one AWS or Docker CLI invocation, so
//! the argument types stay thin and all behavior lives in `commands`.
use crate::config::DEFAULT_STACK_ID;
use crate::ecr::EcrOverrides;
use clap::{Args, Parser, Subcommand};

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "cfut",
    version,
    about = "Short aliases for aws cloudformation, aws ecr and friends",
    after_help = "Examples:\n  cfut init\n  cfut deploy\n  cfut deploy api -P ImageTag=abc123\n  cfut events api\n  cfut -p prod status\n  cfut -d ecr.repo=my-repo ecrpush"
)]
pub struct RootArgs {
    /// AWS profile to use (overrides `profile` in cfut.json)
    #[arg(short, long, global = true, value_name = "PROFILE")]
    pub profile: Option<String>,

    /// Override configuration, e.g. -d ecr.repo=my-repo
    #[arg(short = 'd', long = "define", global = true, value_name = "KEY=VALUE")]
    pub define: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create cfut.json from the CloudFormation templates below this directory
    Init,
    /// Call with template: create-stack
    Create(StackArgs),
    /// Call with template: update-stack
    Update(StackArgs),
    /// Create or update stack depending on its current status
    Deploy(StackArgs),
    /// Call: describe-stacks
    Describe(IdArgs),
    /// Call: describe-stack-events
    Events(IdArgs),
    /// Call: describe-stack-resources
    Res(IdArgs),
    /// Call: delete-stack, then wait until the stack is gone
    Delete(IdArgs),
    /// Alias: describe-stacks
    Ls(PassthroughArgs),
    /// Get status for all stacks
    Status,
    /// Alias: dynamodb list-tables
    Dls(PassthroughArgs),
    /// Dump dynamodb table
    Ddump(DdumpArgs),
    /// Build and push to ECR repository
    Ecrpush(EcrArgs),
    /// List images in ECR repository
    Ecrls(EcrArgs),
    /// Do docker login to ECR
    Ecrlogin(EcrArgs),
}

/// A configured stack plus parameter overrides.
#[derive(Args, Debug)]
pub struct StackArgs {
    /// Alias of stack in cfut.json
    #[arg(default_value = DEFAULT_STACK_ID)]
    pub id: String,

    /// Template parameter override (repeatable); wins over cfut.json
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Nickname of stack; unknown names are used as the remote stack name
    #[arg(default_value = DEFAULT_STACK_ID)]
    pub id: String,
}

#[derive(Args, Debug)]
pub struct PassthroughArgs {
    /// Extra arguments appended to the AWS CLI command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub other_args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DdumpArgs {
    pub table: String,
}

/// Per-command replacements for the `ecr` config section.
#[derive(Args, Debug, Default)]
pub struct EcrArgs {
    /// AWS account in which ECR repo is (may be different than current account)
    #[arg(long)]
    pub account: Option<String>,

    /// AWS region for the ECR repo
    #[arg(long)]
    pub region: Option<String>,

    /// ECR repository name, e.g. my-repo. Not the full URL!
    #[arg(long)]
    pub repo: Option<String>,

    /// Tag to add in addition to git sha and 'latest'
    #[arg(long)]
    pub tag: Option<String>,

    /// Directory where Dockerfile is
    #[arg(long)]
    pub src: Option<String>,
}

impl From<EcrArgs> for EcrOverrides {
    fn from(args: EcrArgs) -> Self {
        EcrOverrides {
            account: args.account,
            region: args.region,
            repo: args.repo,
            tag: args.tag,
            src: args.src,
        }
    }
}
