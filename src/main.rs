use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use ushell::cli::args::{Cli, Commands};
use ushell::error::exit_codes;

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics go to stderr so candidate lines on stdout stay clean for
    // the shell machinery consuming them.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("USHELL_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> ushell::Result<()> {
    match cli.command {
        Commands::Complete { line, cursor, word } => {
            ushell::cli::complete(line, cursor, word, cli.json).await
        }
        Commands::Env { cwd } => ushell::cli::env(cwd, cli.json).await,
    }
}
