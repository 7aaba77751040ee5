#![forbid(unsafe_code)]

mod cmd;
mod context;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use context::Context;
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tally: collaborative task lists from the terminal",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// API base URL (overrides TALLY_API_URL and config.toml).
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Session",
        about = "Log in and store the session",
        long_about = "Log in with email and password. The session is stored in the tally config directory.",
        after_help = "EXAMPLES:\n    # Prompt for the password\n    tally login --email ada@example.com\n\n    # Non-interactive\n    TALLY_PASSWORD=secret tally login -e ada@example.com"
    )]
    Login(cmd::auth::LoginArgs),

    #[command(
        next_help_heading = "Session",
        about = "Create an account and log in",
        after_help = "EXAMPLES:\n    tally register -e ada@example.com --first-name Ada --last-name Lovelace"
    )]
    Register(cmd::auth::RegisterArgs),

    #[command(
        next_help_heading = "Session",
        about = "End the stored session",
        after_help = "EXAMPLES:\n    tally logout"
    )]
    Logout,

    #[command(
        next_help_heading = "Session",
        about = "Show the logged-in user",
        after_help = "EXAMPLES:\n    tally whoami\n\n    # Emit machine-readable output\n    tally whoami --json"
    )]
    Whoami,

    #[command(
        next_help_heading = "Workspaces",
        about = "List and manage workspaces",
        after_help = "EXAMPLES:\n    tally workspace list\n    tally workspace create \"Launch\""
    )]
    Workspace {
        #[command(subcommand)]
        command: cmd::workspace::WorkspaceCommand,
    },

    #[command(
        next_help_heading = "Workspaces",
        about = "List and manage collaborators",
        after_help = "EXAMPLES:\n    tally collab list 65f0c1d2e4\n    tally collab add 65f0c1d2e4 bo@example.com --role viewer"
    )]
    Collab {
        #[command(subcommand)]
        command: cmd::collab::CollabCommand,
    },

    #[command(
        next_help_heading = "Tasks",
        about = "List, create and change tasks",
        after_help = "EXAMPLES:\n    tally task list 65f0c1d2e4 --sort priority\n    tally task status 65f1a2b3c4 completed"
    )]
    Task {
        #[command(subcommand)]
        command: cmd::task::TaskCommand,
    },

    #[command(
        next_help_heading = "Tasks",
        about = "Follow a workspace's tasks live",
        long_about = "Subscribe to the push-event stream, load the task snapshot, and keep the filtered and sorted view current until interrupted.",
        after_help = "EXAMPLES:\n    # Redraw on every change\n    tally watch 65f0c1d2e4 --sort due-date\n\n    # NDJSON for scripts, for one minute\n    tally watch 65f0c1d2e4 --json --duration 60"
    )]
    Watch(cmd::watch::WatchArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    tally completions bash > ~/.local/share/bash-completion/completions/tally"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "tally=debug,info"
        } else {
            "tally=info,warn"
        })
    });

    let format = env::var("TALLY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, ctx: &Context) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Login(args) => cmd::auth::run_login(args, ctx),
        Commands::Register(args) => cmd::auth::run_register(args, ctx),
        Commands::Logout => cmd::auth::run_logout(ctx),
        Commands::Whoami => cmd::auth::run_whoami(ctx),
        Commands::Workspace { command } => cmd::workspace::run_workspace(command, ctx),
        Commands::Collab { command } => cmd::collab::run_collab(command, ctx),
        Commands::Task { command } => cmd::task::run_task(command, ctx),
        Commands::Watch(args) => cmd::watch::run_watch(args, ctx),
        Commands::Completions(args) => {
            cmd::completions::run_completions(args.shell, &mut Cli::command())
        }
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let ctx = match Context::load(cli.api_url.as_deref(), cli.format, cli.json) {
        Ok(ctx) => ctx,
        Err(err) => {
            report(resolve_output_mode(cli.format, cli.json, None), &err);
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(ctx.output, &err);
            ExitCode::FAILURE
        }
    }
}

fn report(mode: OutputMode, err: &anyhow::Error) {
    debug!("command failed: {err:?}");
    if render_error(mode, &CliError::describe(err)).is_err() {
        eprintln!("error: {err:#}");
    }
}
