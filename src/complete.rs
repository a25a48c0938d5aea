//! Tab-completion client.
//!
//! Turns the in-progress command line into a completion request, drives the
//! exchange through the session, and post-filters the daemon's candidates
//! so the user experience matches native shell prefix matching.

use std::sync::Arc;

use crate::error::Result;
use crate::session::Session;

/// Appended to the last token when the user has already typed part of the
/// word being completed, so the daemon can tell a partial word apart from a
/// request for the next empty word.
pub const PARTIAL_WORD_MARKER: &str = "...";

/// Produces completion candidates for a partially typed command line.
pub struct CompletionClient {
    session: Arc<Session>,
}

impl CompletionClient {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Complete `word` at `cursor` within `line`.
    ///
    /// Returns the daemon's candidates filtered to case-insensitive prefix
    /// matches of `word`. When nothing matches, returns a single
    /// empty-string candidate: the host shell's completion machinery reads
    /// that as "suppress your own fallback", not as an error.
    ///
    /// # Errors
    ///
    /// Only a daemon spawn failure surfaces here; degraded exchanges come
    /// back as empty candidate lists (see [`Session::complete_tokens`]).
    pub async fn complete(&self, line: &str, cursor: usize, word: &str) -> Result<Vec<String>> {
        let tokens = request_tokens(line, cursor, word);
        let candidates = self.session.complete_tokens(tokens).await?;
        Ok(filter_candidates(candidates, word))
    }
}

/// Build the request token sequence from the typed line.
///
/// The line is cut at the cursor and split on whitespace. The first token is
/// the program name, so a platform executable suffix is stripped from it.
/// The last token is then marked: a partial word gets the
/// [`PARTIAL_WORD_MARKER`], an empty word becomes an explicit empty token.
fn request_tokens(line: &str, cursor: usize, word: &str) -> Vec<String> {
    let mut tokens: Vec<String> = prefix_at(line, cursor)
        .split_whitespace()
        .map(str::to_owned)
        .collect();

    if let Some(first) = tokens.first_mut() {
        *first = strip_exe_suffix(first, std::env::consts::EXE_SUFFIX);
    }

    if word.is_empty() {
        tokens.push(String::new());
    } else {
        match tokens.last_mut() {
            Some(last) => last.push_str(PARTIAL_WORD_MARKER),
            // Cursor and word disagree with the line; trust the word.
            None => tokens.push(format!("{word}{PARTIAL_WORD_MARKER}")),
        }
    }

    tokens
}

/// The line up to the cursor, clamped to a char boundary.
fn prefix_at(line: &str, cursor: usize) -> &str {
    let mut cut = cursor.min(line.len());
    while cut > 0 && !line.is_char_boundary(cut) {
        cut -= 1;
    }
    &line[..cut]
}

/// Strip a trailing executable suffix (e.g. `.exe`), case-insensitively.
fn strip_exe_suffix(token: &str, suffix: &str) -> String {
    if !suffix.is_empty()
        && token.len() > suffix.len()
        && let Some(tail) = token.get(token.len() - suffix.len()..)
        && tail.eq_ignore_ascii_case(suffix)
    {
        return token[..token.len() - suffix.len()].to_string();
    }
    token.to_string()
}

/// Case-insensitive prefix filter with the suppress-fallback convention.
fn filter_candidates(candidates: Vec<String>, word: &str) -> Vec<String> {
    let word = word.to_lowercase();
    let mut filtered: Vec<String> = candidates
        .into_iter()
        .filter(|c| c.to_lowercase().starts_with(&word))
        .collect();
    if filtered.is_empty() {
        filtered.push(String::new());
    }
    filtered
}
