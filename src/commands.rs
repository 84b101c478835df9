//! Subcommand handlers.
//!
//! Each handler maps one alias onto the AWS/Docker CLI, the deploy state
//! machine, or both. Handlers print user-facing output directly.
use crate::aws::{OutputFormat, OutputStyle};
use crate::cli::{DdumpArgs, EcrArgs, IdArgs, PassthroughArgs, StackArgs};
use crate::config::{CfutConfig, EcrConfig, CONFIG_FILE};
use crate::deploy::{DeployOutcome, Deployer, ThreadSleeper};
use crate::dynamo;
use crate::ecr::{self, EcrOverrides};
use crate::session::Session;
use crate::stack::resolve_stack;
use anyhow::{Context, Result};
use std::path::Path;

const CLOUDFORMATION: &str = "cloudformation";
const EVENTS_QUERY: &str =
    "StackEvents[*].[LogicalResourceId,ResourceType,ResourceStatus,Timestamp,ResourceStatusReason]";
const RESOURCES_QUERY: &str =
    "StackResources[*].[LogicalResourceId,ResourceType,PhysicalResourceId]";
const LS_QUERY: &str = "Stacks[*].[StackName,StackStatus,CreationTime]";
const DLS_QUERY: &str = "TableNames[*]";

/// Which mutating call a template command issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateAction {
    Create,
    Update,
    Deploy,
}

impl TemplateAction {
    fn verb(self) -> &'static str {
        match self {
            TemplateAction::Create => "create",
            TemplateAction::Update => "update",
            TemplateAction::Deploy => "deploy",
        }
    }
}

/// Printed when `cfut` runs without a subcommand.
pub fn print_overview(root: &Path, config: Option<&CfutConfig>) {
    println!("Run cfut -h to get help.");
    println!("Workspace: {}", root.display());
    match config {
        Some(config) => print_stacks(config),
        None => println!("No {CONFIG_FILE} in this workspace."),
    }
}

pub fn print_stacks(config: &CfutConfig) {
    for (alias, template) in &config.templates {
        println!("{alias}: {} => {}", template.path, template.name);
    }
}

pub fn template_command(session: &Session, action: TemplateAction, args: &StackArgs) -> Result<()> {
    let stack = resolve_stack(session.config(), &args.id, &args.params)?;
    let api = session.aws();
    let deployer = Deployer::new(&api, &ThreadSleeper)
        .with_policy(session.poll_policy())
        .with_ready_statuses(session.ready_statuses());
    tracing::info!(
        alias = %stack.name,
        stack = %stack.remote_name,
        action = action.verb(),
        "template command"
    );
    let outcome = match action {
        TemplateAction::Create => deployer.create(&stack),
        TemplateAction::Update => deployer.update(&stack),
        TemplateAction::Deploy => deployer.deploy(&stack),
    }
    .with_context(|| format!("{} stack {}", action.verb(), stack.name))?;
    if outcome == DeployOutcome::NoChangesNeeded {
        tracing::info!(stack = %stack.remote_name, "stack already up to date");
    }
    println!("{}: {outcome}", stack.remote_name);
    Ok(())
}

/// `describe`, `events`, `res`: one read-only call for a stack alias.
pub fn id_command(
    session: &Session,
    args: &IdArgs,
    subcommand: &str,
    output: &OutputFormat,
) -> Result<()> {
    let remote_name = session.config().remote_name(&args.id);
    session.aws().passthrough(
        CLOUDFORMATION,
        &[
            subcommand.to_string(),
            "--stack-name".to_string(),
            remote_name.to_string(),
        ],
        output,
    )
}

pub fn describe(session: &Session, args: &IdArgs) -> Result<()> {
    id_command(session, args, "describe-stacks", &OutputFormat::default())
}

pub fn events(session: &Session, args: &IdArgs) -> Result<()> {
    let output = OutputFormat::styled(OutputStyle::Table, EVENTS_QUERY);
    id_command(session, args, "describe-stack-events", &output)
}

pub fn resources(session: &Session, args: &IdArgs) -> Result<()> {
    let output = OutputFormat::styled(OutputStyle::Table, RESOURCES_QUERY);
    id_command(session, args, "describe-stack-resources", &output)
}

/// `delete-stack`, then poll until the stack no longer exists.
pub fn delete(session: &Session, args: &IdArgs) -> Result<()> {
    let remote_name = session.config().remote_name(&args.id);
    let api = session.aws();
    let status = Deployer::new(&api, &ThreadSleeper)
        .with_policy(session.poll_policy())
        .delete(remote_name)
        .with_context(|| format!("delete stack {remote_name}"))?;
    println!("{remote_name}: {status}");
    Ok(())
}

fn passthrough(
    session: &Session,
    family: &str,
    subcommand: &str,
    args: &PassthroughArgs,
    output: &OutputFormat,
) -> Result<()> {
    let mut argv = vec![subcommand.to_string()];
    argv.extend(args.other_args.iter().cloned());
    session.aws().passthrough(family, &argv, output)
}

pub fn ls(session: &Session, args: &PassthroughArgs) -> Result<()> {
    let output = OutputFormat::styled(OutputStyle::Table, LS_QUERY);
    passthrough(session, CLOUDFORMATION, "describe-stacks", args, &output)
}

pub fn dls(session: &Session, args: &PassthroughArgs) -> Result<()> {
    let output = OutputFormat::styled(OutputStyle::Yaml, DLS_QUERY);
    passthrough(session, "dynamodb", "list-tables", args, &output)
}

/// One line per configured stack: `<remote name> <status>`.
pub fn status(session: &Session) -> Result<()> {
    let api = session.aws();
    let deployer = Deployer::new(&api, &ThreadSleeper);
    for template in session.config().templates.values() {
        let status = deployer
            .current_status(&template.name)
            .with_context(|| format!("status of {}", template.name))?;
        println!("{} {status}", template.name);
    }
    Ok(())
}

pub fn ddump(session: &Session, args: &DdumpArgs) -> Result<()> {
    let yaml = dynamo::dump_table(&session.aws(), &args.table)?;
    println!("{yaml}");
    Ok(())
}

fn effective_ecr(session: &Session, args: EcrArgs) -> Result<EcrConfig> {
    let overrides = EcrOverrides::from(args);
    ecr::effective_ecr(session.config().ecr.as_ref(), &overrides)
}

pub fn ecr_login(session: &Session, args: EcrArgs) -> Result<()> {
    let ecr = effective_ecr(session, args)?;
    let registry = ecr::resolve_registry(session, &ecr)?;
    ecr::login(&session.aws(), &registry)
}

pub fn ecr_push(session: &Session, args: EcrArgs) -> Result<()> {
    let ecr = effective_ecr(session, args)?;
    let tags = ecr::push(session, &ecr)?;
    for tag in tags {
        println!("Pushed {tag}");
    }
    Ok(())
}

pub fn ecr_ls(session: &Session, args: EcrArgs) -> Result<()> {
    let ecr = effective_ecr(session, args)?;
    for row in ecr::list_images(session, &ecr)? {
        println!("{}", row.render());
    }
    Ok(())
}
