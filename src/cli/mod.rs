//! CLI command handlers.
//!
//! The binary is a thin shim over the library clients, meant for shell
//! bootstrap scripts and debugging. Each invocation builds a session, runs
//! one exchange, and tears the daemon down again; a resident shell
//! integration would instead hold one [`Session`] for its whole lifetime.

pub mod args;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::complete::CompletionClient;
use crate::config::SessionConfig;
use crate::envsync::ENV_PREFIX;
use crate::error::Result;
use crate::session::Session;

/// `ushell complete`: print one candidate per line (or a JSON array).
pub async fn complete(
    line: String,
    cursor: Option<usize>,
    word: Option<String>,
    json: bool,
) -> Result<()> {
    let cursor = cursor.unwrap_or(line.len());
    let word = word.unwrap_or_else(|| trailing_word(&line, cursor));

    let session = Arc::new(Session::new(SessionConfig::load()?));
    let client = CompletionClient::new(Arc::clone(&session));
    let result = client.complete(&line, cursor, &word).await;
    session.teardown().await;

    let candidates = result?;
    if json {
        println!("{}", serde_json::to_string(&candidates)?);
    } else {
        for candidate in candidates {
            println!("{candidate}");
        }
    }
    Ok(())
}

/// `ushell env`: print the prefixed NAME=VALUE pairs the daemon computed
/// for the working directory (or a JSON object).
pub async fn env(cwd: Option<PathBuf>, json: bool) -> Result<()> {
    let cwd = match cwd {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let session = Session::new(SessionConfig::load()?);
    let result = session.query_env(&cwd.to_string_lossy()).await;
    session.teardown().await;

    // BTreeMap for stable output order.
    let vars: BTreeMap<String, String> = result?
        .into_iter()
        .map(|(key, value)| (format!("{ENV_PREFIX}{key}"), value))
        .collect();

    if json {
        println!("{}", serde_json::to_string(&vars)?);
    } else {
        for (name, value) in vars {
            println!("{name}={value}");
        }
    }
    Ok(())
}

/// The word under completion when the caller did not name one: the token
/// the cursor sits at the end of, or empty after whitespace.
fn trailing_word(line: &str, cursor: usize) -> String {
    let mut cut = cursor.min(line.len());
    while cut > 0 && !line.is_char_boundary(cut) {
        cut -= 1;
    }
    line[..cut]
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .to_string()
}
