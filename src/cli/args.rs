use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ushell - shell integration client for the completion daemon
#[derive(Parser)]
#[command(name = "ushell")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON output
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print completion candidates for a partially typed command line
    Complete {
        /// The command line as typed so far
        line: String,

        /// Cursor offset into the line (defaults to the end of the line)
        #[arg(long)]
        cursor: Option<usize>,

        /// The word being completed (defaults to the trailing token)
        #[arg(long)]
        word: Option<String>,
    },

    /// Print the session environment variables for a working directory
    Env {
        /// Working directory to query (defaults to the current directory)
        #[arg(long)]
        cwd: Option<PathBuf>,
    },
}
