use std::env::{self, VarError};

use clap::{Parser, Subcommand};
use log::*;
use tokio::task::JoinHandle;
use pos_engine::{
    pos_types::{IdempotencyKey, PendingRequest, ReconciliationRequest},
    DrainReport,
};

use crate::{
    config::{TerminalConfig, DISPLAY_ENVS},
    errors::TerminalError,
    hooks::create_terminal_event_handlers,
    terminal::Terminal,
};

#[derive(Parser, Debug)]
#[command(name = "pos-terminal", version, about = "Cashless POS terminal runtime")]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the background booking worker until Ctrl-C is pressed
    #[clap(name = "run")]
    Run,
    /// Run a single drain cycle over the pending bookings and print what happened
    #[clap(name = "drain")]
    Drain,
    /// List bookings the ledger has not confirmed yet
    #[clap(name = "pending")]
    Pending,
    /// List bookings that were rejected for good, or acknowledge one that was resolved by hand
    #[clap(name = "reconcile")]
    Reconcile {
        /// The idempotency key of the entry to acknowledge
        #[arg(short = 'a', long = "ack")]
        ack: Option<String>,
    },
    /// Print the current (non-secret) environment values
    #[clap(name = "env")]
    Env,
}

pub async fn run_command(command: Command, config: TerminalConfig) -> Result<(), TerminalError> {
    match command {
        Command::Env => {
            display_envs();
            Ok(())
        },
        Command::Run => run_worker(config).await,
        Command::Drain => drain_once(config).await,
        Command::Pending => {
            let terminal = Terminal::connect(config, Default::default()).await?;
            let pending = terminal.queue().pending().await?;
            println!("{}", format_pending(&pending));
            terminal.close().await
        },
        Command::Reconcile { ack } => {
            let terminal = Terminal::connect(config, Default::default()).await?;
            match ack {
                Some(key) => {
                    let key = key.parse::<IdempotencyKey>().map_err(|_| TerminalError::InvalidKey(key))?;
                    if terminal.queue().acknowledge(&key).await? {
                        println!("{key} acknowledged");
                    } else {
                        println!("{key} is not awaiting reconciliation");
                    }
                },
                None => {
                    let failed = terminal.queue().reconciliation().await?;
                    println!("{}", format_reconciliation(&failed));
                },
            }
            terminal.close().await
        },
    }
}

async fn run_worker(config: TerminalConfig) -> Result<(), TerminalError> {
    let handlers = create_terminal_event_handlers();
    let terminal = Terminal::connect(config, handlers.producers()).await?;
    let handler_tasks = handlers.start_handlers().await;
    let worker = terminal.queue().start_worker();
    info!("🚀️ Booking worker is running. Press Ctrl-C to stop.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("🚀️ Could not listen for Ctrl-C. {e}");
    }
    info!("🚀️ Stopping the booking worker");
    worker.abort();
    // The aborted worker drops its handle on the queue, and with it its event producers.
    if let Err(e) = worker.await {
        if !e.is_cancelled() {
            warn!("🚀️ The booking worker stopped with an error. {e}");
        }
    }
    shut_down(terminal, handler_tasks).await
}

async fn drain_once(config: TerminalConfig) -> Result<(), TerminalError> {
    let handlers = create_terminal_event_handlers();
    let terminal = Terminal::connect(config, handlers.producers()).await?;
    let handler_tasks = handlers.start_handlers().await;
    let report = terminal.queue().drain().await?;
    println!("{}", format_report(&report));
    shut_down(terminal, handler_tasks).await
}

/// Closes the terminal, which drops the last event producers, then waits for the handlers to log what was published.
async fn shut_down(terminal: Terminal, handler_tasks: Vec<JoinHandle<()>>) -> Result<(), TerminalError> {
    let closed = terminal.close().await;
    for task in handler_tasks {
        if let Err(e) = task.await {
            warn!("🚀️ An event handler stopped with an error. {e}");
        }
    }
    closed
}

pub fn format_report(report: &DrainReport) -> String {
    let mut lines = vec![format!(
        "{} confirmed, {} moved to reconciliation, {} still pending after {} sweeps",
        report.confirmed.len(),
        report.failed.len(),
        report.remaining,
        report.sweeps
    )];
    lines.extend(report.confirmed.iter().map(|t| {
        format!(
            "  confirmed {} {:<10} {:>10}  balance {} -> {}",
            t.idempotency_key,
            t.kind.to_string(),
            t.amount.to_string(),
            t.old_balance,
            t.new_balance
        )
    }));
    lines.extend(
        report
            .failed
            .iter()
            .map(|r| format!("  failed    {} {:<10} {}", r.idempotency_key, r.kind.to_string(), r.reason)),
    );
    lines.join("\n")
}

pub fn format_pending(pending: &[PendingRequest]) -> String {
    if pending.is_empty() {
        return "No pending bookings".to_string();
    }
    pending
        .iter()
        .map(|p| {
            format!(
                "{} {:<10} {:>10}  tag {:<16} attempts {:<3} since {}  {}",
                p.idempotency_key,
                p.kind.to_string(),
                p.intent.amount.to_string(),
                p.intent.tag.to_string(),
                p.attempts_done,
                p.created_at.format("%Y-%m-%d %H:%M:%S"),
                p.last_error.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_reconciliation(failed: &[ReconciliationRequest]) -> String {
    if failed.is_empty() {
        return "Nothing to reconcile".to_string();
    }
    failed
        .iter()
        .map(|r| {
            format!(
                "{} {:<10} {:>10}  tag {:<16} failed {}  {}",
                r.idempotency_key,
                r.kind.to_string(),
                r.intent.amount.to_string(),
                r.intent.tag.to_string(),
                r.failed_at.format("%Y-%m-%d %H:%M:%S"),
                r.reason
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn display_envs() {
    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
