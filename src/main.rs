mod aws;
mod cli;
mod commands;
mod config;
mod deploy;
mod dynamo;
mod ecr;
mod remote_text;
mod session;
mod stack;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Command, RootArgs};
use commands::TemplateAction;
use config::CONFIG_FILE;
use session::{Environment, Session};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

const LOG_ENV: &str = "CFUT_LOG";

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = RootArgs::parse();

    let cwd = std::env::current_dir().context("read current directory")?;
    let root = locate_workspace(&cwd)?;
    let has_config = config::config_path(&root).is_file();
    tracing::debug!(root = %root.display(), has_config, "workspace located");

    let Some(command) = args.command else {
        let config = if has_config {
            Some(config::load_config(&root, &args.define)?)
        } else {
            None
        };
        commands::print_overview(&root, config.as_ref());
        return Ok(());
    };

    if matches!(command, Command::Init) {
        return init(&root);
    }
    if !has_config && io::stdin().is_terminal() && confirm_init(&root)? {
        return init(&root);
    }

    let session = Session::load(root, &args.define, args.profile, Environment::from_process())?;
    tracing::debug!(
        root = %session.root().display(),
        profile = session.profile().unwrap_or("-"),
        "session ready"
    );
    dispatch(&session, command)
}

/// Walk up from `cwd` to the directory holding `cfut.json` and make it the
/// working directory, so template paths resolve relative to it.
fn locate_workspace(cwd: &Path) -> Result<PathBuf> {
    let Some(found) = config::find_in_parents(cwd, CONFIG_FILE) else {
        return Ok(cwd.to_path_buf());
    };
    let root = found
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.to_path_buf());
    if root != cwd {
        std::env::set_current_dir(&root)
            .with_context(|| format!("change directory to {}", root.display()))?;
    }
    Ok(root)
}

fn confirm_init(root: &Path) -> Result<bool> {
    print!(
        "Config file {CONFIG_FILE} not found, create it in {} [y/n]? ",
        root.display()
    );
    io::stdout().flush().context("flush prompt")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("read answer")?;
    Ok(accepts(&answer))
}

fn accepts(answer: &str) -> bool {
    answer.trim().to_ascii_lowercase().starts_with('y')
}

fn init(root: &Path) -> Result<()> {
    let config = config::init_workspace(root)?;
    println!("Created {}", config::config_path(root).display());
    commands::print_stacks(&config);
    Ok(())
}

fn dispatch(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Init => init(session.root()),
        Command::Create(args) => {
            commands::template_command(session, TemplateAction::Create, &args)
        }
        Command::Update(args) => {
            commands::template_command(session, TemplateAction::Update, &args)
        }
        Command::Deploy(args) => {
            commands::template_command(session, TemplateAction::Deploy, &args)
        }
        Command::Describe(args) => commands::describe(session, &args),
        Command::Events(args) => commands::events(session, &args),
        Command::Res(args) => commands::resources(session, &args),
        Command::Delete(args) => commands::delete(session, &args),
        Command::Ls(args) => commands::ls(session, &args),
        Command::Status => commands::status(session),
        Command::Dls(args) => commands::dls(session, &args),
        Command::Ddump(args) => commands::ddump(session, &args),
        Command::Ecrpush(args) => commands::ecr_push(session, args),
        Command::Ecrls(args) => commands::ecr_ls(session, args),
        Command::Ecrlogin(args) => commands::ecr_login(session, args),
    }
}
