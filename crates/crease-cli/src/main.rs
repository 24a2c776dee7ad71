//! # crease-replay
//!
//! Replays a JSON scoring script through a live session and prints the
//! viewer stream, one JSON message per line.
//!
//! ```text
//! crease-replay demos/opening_overs.json [--config live.json] [--json-logs]
//! ```
//!
//! A script is `{ "setup": MatchSetup, "steps": [...] }`. Each step is either
//! a scoring command (`{"command": "record_ball", ...}`) optionally marked
//! `"expect_error": true`, or `{"annotate": {sequence, text, language}}`.
//! The replay stops at the first unexpected outcome and exits non-zero.

use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};

use clap::Parser;
use crease_engine::InMemoryLedger;
use crease_live::{AllowAll, LiveSubscription, SessionManager};
use crease_types::{
    CommandEnvelope, LiveConfig, MatchSetup, Result, ScorerId, ScoringCommand, ScoringError,
    SequenceNumber,
};
use serde::Deserialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crease-replay")]
#[command(version, about = "Replay a scoring script through a live session", long_about = None)]
struct Cli {
    /// Scoring script to replay
    script: PathBuf,

    /// Live plane configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON on stderr
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Deserialize)]
struct Script {
    setup: MatchSetup,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Step {
    Annotate {
        annotate: AnnotateStep,
    },
    Command {
        #[serde(flatten)]
        command: ScoringCommand,
        #[serde(default)]
        expect_error: bool,
    },
}

#[derive(Debug, Deserialize)]
struct AnnotateStep {
    sequence: SequenceNumber,
    text: String,
    language: String,
}

/// What a finished replay left behind.
#[derive(Debug)]
struct ReplaySummary {
    steps: usize,
    rejected: usize,
    messages: usize,
    ledger_digest: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match run(&cli).await {
        Ok(summary) => {
            info!(
                steps = summary.steps,
                rejected = summary.rejected,
                messages = summary.messages,
                ledger_digest = %summary.ledger_digest,
                "Replay complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "Replay failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: &Cli) -> Result<ReplaySummary> {
    let config = match &cli.config {
        Some(path) => LiveConfig::from_json_file(path)?,
        None => LiveConfig::default(),
    };
    let raw = std::fs::read_to_string(&cli.script)?;
    let script: Script = serde_json::from_str(&raw)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    replay(script, config, &mut out).await
}

async fn replay(
    script: Script,
    config: LiveConfig,
    out: &mut impl Write,
) -> Result<ReplaySummary> {
    let manager = SessionManager::new(
        config,
        Arc::new(InMemoryLedger::new()),
        Arc::new(AllowAll),
    )?;
    let match_id = script.setup.match_id;
    manager.get_or_create(script.setup)?;
    let mut viewer = manager.subscribe(match_id, None)?;
    let scorer = ScorerId::new();

    let mut messages = print_pending(&mut viewer, out)?;
    let mut rejected = 0;
    let steps = script.steps.len();

    for (index, step) in script.steps.into_iter().enumerate() {
        match step {
            Step::Annotate { annotate } => {
                manager.annotate(
                    match_id,
                    annotate.sequence,
                    &annotate.text,
                    &annotate.language,
                )?;
            }
            Step::Command {
                command,
                expect_error,
            } => {
                let name = command.name();
                let outcome = manager
                    .execute(CommandEnvelope {
                        command_id: None,
                        scorer,
                        match_id,
                        command,
                    })
                    .await;
                match (outcome, expect_error) {
                    (Ok(_), false) => {}
                    (Err(err), true) => {
                        warn!(step = index, command = name, error = %err, "Rejected as expected");
                        rejected += 1;
                    }
                    (Err(err), false) => {
                        error!(step = index, command = name, "Unexpected rejection");
                        return Err(err);
                    }
                    (Ok(_), true) => {
                        return Err(ScoringError::invalid(format!(
                            "step {index} ({name}) was expected to fail"
                        )));
                    }
                }
            }
        }
        messages += print_pending(&mut viewer, out)?;
    }

    let snapshot = manager.snapshot(match_id)?;
    Ok(ReplaySummary {
        steps,
        rejected,
        messages,
        ledger_digest: snapshot.state.ledger_digest,
    })
}

/// Write every queued viewer message as a JSON line.
fn print_pending(viewer: &mut LiveSubscription, out: &mut impl Write) -> Result<usize> {
    let mut written = 0;
    while let Ok(message) = viewer.try_recv() {
        serde_json::to_writer(&mut *out, &message)?;
        writeln!(out)?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}
