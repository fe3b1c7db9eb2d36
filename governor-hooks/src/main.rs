//! `lz-governor`: pre/post tool-use hook binary.
//!
//! `pre` and `post` read one JSON request from stdin, print one JSON response
//! to stdout and always exit successfully. `history` offers operator access
//! to the persisted session histories.

use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use governor_config::GovernorConfig;
use governor_hooks::{Governor, HookError, encode_post_fault, encode_pre_fault, read_request};
use governor_memory::now_millis;
use governor_primitives::SessionId;
use tokio::io::AsyncWriteExt;

#[derive(Parser)]
#[command(
    name = "lz-governor",
    version,
    about = "Tool-call governor hooks for autonomous agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a call before it runs (PreToolUse)
    Pre,
    /// Record the outcome of a call (PostToolUse)
    Post,
    /// Inspect or reset a session history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print windowed statistics as JSON
    Stats {
        /// Session identifier
        #[arg(long)]
        session: String,
    },
    /// Empty the history of a session
    Clear {
        /// Session identifier
        #[arg(long)]
        session: String,
    },
}

#[derive(Clone, Copy)]
enum Hook {
    Pre,
    Post,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = GovernorConfig::from_env();
    governor_telemetry::init(config.debug());

    match cli.command {
        Command::Pre => run_hook(config, Hook::Pre).await,
        Command::Post => run_hook(config, Hook::Post).await,
        Command::History { action } => match run_history(config, action).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("lz-governor: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run_hook(config: GovernorConfig, hook: Hook) -> ExitCode {
    let output = match respond(config, hook).await {
        Ok(output) => output,
        Err(err) => match hook {
            Hook::Pre => encode_pre_fault(&err),
            Hook::Post => encode_post_fault(&err),
        },
    };

    let mut stdout = tokio::io::stdout();
    let written = async {
        stdout.write_all(output.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await
    }
    .await;
    if let Err(err) = written {
        tracing::warn!(error = %err, "failed to write hook response");
    }
    ExitCode::SUCCESS
}

async fn respond(config: GovernorConfig, hook: Hook) -> Result<String, HookError> {
    let raw = read_request(&mut tokio::io::stdin(), config.input_timeout()).await?;
    let governor = Governor::from_config(config)?;
    Ok(match hook {
        Hook::Pre => governor.run_pre_hook(&raw).await,
        Hook::Post => governor.run_post_hook(&raw).await,
    })
}

async fn run_history(config: GovernorConfig, action: HistoryAction) -> Result<()> {
    let governor = Governor::from_config(config).context("failed to open the history store")?;
    let session = match &action {
        HistoryAction::Stats { session } | HistoryAction::Clear { session } => session,
    };
    let session = SessionId::new(session).ok_or_else(|| anyhow!("session id must not be empty"))?;

    match action {
        HistoryAction::Stats { .. } => {
            let history = governor
                .store()
                .load(&session)
                .await
                .with_context(|| format!("failed to load history for {session}"))?;
            let window = governor.config().limits().oscillation_window_ms;
            let stats = history.stats(window, now_millis());
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        HistoryAction::Clear { .. } => {
            governor
                .store()
                .clear(&session)
                .await
                .with_context(|| format!("failed to clear history for {session}"))?;
            println!("cleared history for {session}");
        }
    }
    Ok(())
}
