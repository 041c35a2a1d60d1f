use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "codegen-session",
    about = "Drive server-backed code generation sessions from the terminal",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a session against a recorded cassette of service responses.
    Replay {
        /// Cassette file (TOML) scripting the generation service.
        #[arg(value_name = "CASSETTE")]
        cassette: PathBuf,

        /// Message to send; repeat for follow-up iterations. Defaults to the
        /// cassette's messages.
        #[arg(long = "message", short = 'm')]
        messages: Vec<String>,

        /// Workspace folder root; repeat for multi-root workspaces. Default: current directory.
        #[arg(long)]
        workspace: Vec<PathBuf>,

        /// Tab id for the session (random if not specified).
        #[arg(long)]
        tab_id: Option<String>,

        /// Write accepted changes to the workspace after the last iteration.
        #[arg(long)]
        apply: bool,

        /// Print the session results as JSON when done.
        #[arg(long)]
        json: bool,
    },

    /// Print the effective settings as TOML.
    Config {
        /// Workspace root to read `.codegen/config.toml` from. Default: current directory.
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
}
