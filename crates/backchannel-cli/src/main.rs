//! backchannel - relay turns to Claude Code and detect when it is done.

use anyhow::Result;
use backchannel_cli::{commands, config::Config, logging};
use backchannel_types::SessionMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use logging::{LogConfig, LogFormat};

/// backchannel - send prompts to Claude Code and collect complete replies.
#[derive(Parser, Debug)]
#[command(name = "backchannel")]
#[command(about = "Relay prompts to Claude Code and collect complete replies")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override session mode: fresh, continue, or resume:<session_id>
    #[arg(long, value_name = "MODE")]
    session_mode: Option<SessionMode>,

    /// Override the directory Claude runs in
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Enable verbose logging (INFO level for all targets)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (includes raw Claude output)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "poller=debug" or "process=trace").
    /// Can be specified multiple times. Targets are prefixed with "backchannel::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one turn in stream-json mode, reporting blocked tool uses
    Ask { prompt: String },
    /// Run one turn in plain print mode
    Print { prompt: String },
    /// Talk to Claude running in a tmux pane
    Pane {
        #[command(subcommand)]
        command: PaneCommand,
    },
    /// List recent Claude sessions for the working directory
    Sessions {
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
enum PaneCommand {
    /// Type text into the pane and print the output it produced
    Send { text: String },
    /// Show whether the tmux session exists
    Status,
    /// Send Ctrl+C to the pane
    Interrupt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Apply CLI overrides
    if let Some(mode) = cli.session_mode {
        config.session_mode = mode;
    }
    if let Some(cwd) = cli.cwd {
        config.working_dir = Some(cwd);
    }

    tracing::info!(
        target: "backchannel::startup",
        "Loaded configuration (claude: {}, session mode: {})",
        config.claude_path.display(),
        config.session_mode
    );

    match cli.command {
        Command::Ask { prompt } => {
            let cancel = CancellationToken::new();
            commands::cancel_on_ctrl_c(cancel.clone());
            let outcome = commands::ask(&config, &prompt, cancel).await?;
            println!("{}", outcome.result);
            if outcome.is_error {
                std::process::exit(1);
            }
        }
        Command::Print { prompt } => {
            println!("{}", commands::print(&config, &prompt).await?);
        }
        Command::Pane { command } => match command {
            PaneCommand::Send { text } => {
                println!("{}", commands::pane_send(&config, &text).await?);
            }
            PaneCommand::Status => {
                let status = commands::pane_status(&config).await?;
                println!("{}", commands::format_pane_status(&status));
            }
            PaneCommand::Interrupt => commands::pane_interrupt(&config).await?,
        },
        Command::Sessions { limit } => {
            let (cwd, sessions) = commands::sessions(&config, limit)?;
            println!("{}", commands::format_sessions(&cwd, &sessions));
        }
    }

    Ok(())
}
