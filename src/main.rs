mod cli;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use codegen_session::commands;
use codegen_session::display::renderer::Renderer;
use rand::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Replay {
            cassette,
            messages,
            workspace,
            tab_id,
            apply,
            json,
        } => {
            let workspace = if workspace.is_empty() {
                vec![current_dir()?]
            } else {
                workspace
            };
            let token = CancellationToken::new();
            let on_interrupt = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let renderer = Arc::new(Mutex::new(Renderer::new()));
            let report = commands::replay::replay(
                commands::replay::ReplayConfig {
                    cassette,
                    messages,
                    workspace,
                    tab_id: tab_id.unwrap_or_else(random_tab_id),
                    apply,
                    json,
                },
                &token,
                renderer,
            )
            .await?;
            if report.error.is_some() {
                std::process::exit(1);
            }
        }
        Command::Config { workspace } => {
            let root = match workspace {
                Some(w) => w,
                None => current_dir()?,
            };
            commands::settings::show(&root, &mut std::io::stdout())?;
        }
    }

    Ok(())
}

/// Structured logs go to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("failed to determine the current directory")
}

const ADJECTIVES: &[&str] = &[
    "swift", "quick", "bright", "calm", "clever", "crisp", "eager", "fresh", "keen", "lucid",
];

const NOUNS: &[&str] = &[
    "fox", "owl", "lynx", "hawk", "wolf", "otter", "heron", "crane", "raven", "finch",
];

/// Random adjective-noun-N tab id.
fn random_tab_id() -> String {
    let mut rng = rand::rng();
    let adj = ADJECTIVES.choose(&mut rng).copied().unwrap_or("swift");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("fox");
    let num: u32 = rng.random_range(0..100);
    format!("tab-{adj}-{noun}-{num}")
}
