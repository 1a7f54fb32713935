// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `drape`: the operator CLI (SPEC_FULL.md §6) — inspects and intervenes on
//! the state `drape-daemon` owns, without going through the mobile client.
//! Reads the session registry and usage ledger straight off disk rather than
//! over RPC, since this crate carries no dependency on the daemon or the
//! container/workspace crates.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use drape_core::{ProjectId, SessionKey, UserId};
use drape_storage::{start_of_month, SessionRegistry, UsageLedger};

#[derive(Parser)]
#[command(name = "drape", version = env!("BUILD_GIT_HASH"), about = "Operator CLI for a drape deployment")]
struct Cli {
    /// Root directory the daemon was started with (holds registry.json and usage.jsonl).
    #[arg(long, global = true, default_value = "/data/state")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List sessions, optionally scoped to one user.
    Sessions {
        #[arg(long)]
        user: Option<String>,
    },
    /// Drop a session's registry entry so the next request re-adopts or
    /// recreates its container.
    Release {
        #[arg(long)]
        user: String,
        #[arg(long)]
        project: String,
    },
    /// Print the current month's AI usage cost for a user, in EUR.
    Usage {
        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("drape: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Sessions { user } => {
            let registry = SessionRegistry::load(cli.state_dir.join("registry.json")).await;
            let sessions = match user {
                Some(user) => registry.list_for_user(&UserId::new(user)),
                None => registry.list_all(),
            };
            if sessions.is_empty() {
                println!("no sessions");
                return Ok(());
            }
            for session in sessions {
                println!(
                    "{}/{}  container={}  agent_url={}  last_used={}",
                    session.user_id, session.project_id, session.container_id, session.agent_url, session.last_used
                );
            }
            Ok(())
        }
        Command::Release { user, project } => {
            let registry = SessionRegistry::load(cli.state_dir.join("registry.json")).await;
            let key = SessionKey::new(UserId::new(user), ProjectId::new(project));
            if registry.get(&key).is_none() {
                anyhow::bail!("no session for {key}");
            }
            registry.remove(&key);
            registry.flush().await?;
            println!("released {key}");
            Ok(())
        }
        Command::Usage { user } => {
            let ledger = UsageLedger::load(cli.state_dir.join("usage.jsonl")).await;
            let user_id = UserId::new(user);
            let now = Utc::now();
            let total = ledger.sum_since(&user_id, start_of_month(now));
            println!("{user_id}: {total:.2} EUR this month");
            Ok(())
        }
    }
}
