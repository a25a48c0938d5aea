//! Wire protocol types and framing for daemon communication.
//!
//! This module defines the request variants and the line-oriented,
//! sentinel-delimited protocol spoken over the daemon's standard streams.
//!
//! ## Protocol Format
//!
//! Every value is one UTF-8 text line, newline-terminated. Two reserved
//! single-character lines frame an exchange:
//! - START (0x01) opens a request body and terminates a response normally
//! - CANCEL (0x02) closes a request body and, in a response, discards it
//!
//! A request is `START, [$$,] payload..., CANCEL`. The `$$` sentinel marks
//! an environment query; anything else is a completion request whose payload
//! lines are the split command-line tokens. A response is either a candidate
//! line sequence or alternating key/value lines, terminated by START, CANCEL,
//! or an empty line.
//!
//! Control markers must never appear as payload content; `encode_request`
//! rejects payload lines that would be mistaken for them.

use std::collections::HashMap;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, UshellError};

/// First payload token that marks a request as an environment query.
///
/// Generated only here, at the encoding edge; callers deal in [`RequestKind`].
pub const ENV_QUERY_SENTINEL: &str = "$$";

/// Reserved single-character line values that delimit protocol exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMarker {
    /// 0x01 - opens a request; terminates a response keeping its content.
    Start,
    /// 0x02 - closes a request; terminates a response discarding its content.
    Cancel,
}

impl ControlMarker {
    /// The marker as the line value it occupies on the wire.
    pub const fn as_line(self) -> &'static str {
        match self {
            ControlMarker::Start => "\u{01}",
            ControlMarker::Cancel => "\u{02}",
        }
    }

    /// Classify a decoded line, if it is a control marker.
    pub fn of_line(line: &str) -> Option<Self> {
        match line {
            "\u{01}" => Some(ControlMarker::Start),
            "\u{02}" => Some(ControlMarker::Cancel),
            _ => None,
        }
    }
}

/// A request to the completion daemon.
///
/// Both kinds share the same wire form (a framed line sequence); the daemon
/// distinguishes them by the [`ENV_QUERY_SENTINEL`] first token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Tab-completion candidates for a partially typed command line.
    Completion { tokens: Vec<String> },
    /// Session environment variables for the current working directory.
    EnvQuery { working_dir: String },
}

/// Validate a single payload line.
///
/// Raw newlines would desynchronize the line framing and a leading control
/// byte would be read as a terminator, so both are rejected. Empty lines are
/// permitted: requests are CANCEL-delimited, and the completion client sends
/// an explicit empty token to mean "complete the next word".
fn check_payload_line(line: &str) -> Result<()> {
    if line.contains('\n') || line.contains('\r') {
        return Err(UshellError::DaemonProtocol(format!(
            "payload line contains a raw newline: {:?}",
            line
        )));
    }
    if line.starts_with('\u{01}') || line.starts_with('\u{02}') {
        return Err(UshellError::DaemonProtocol(format!(
            "payload line begins with a control marker: {:?}",
            line
        )));
    }
    Ok(())
}

/// Encode a request into its wire lines: START, kind sentinel for env
/// queries, every payload line, CANCEL.
///
/// # Errors
///
/// Returns `DaemonProtocol` if a payload line fails [`check_payload_line`],
/// or if an environment query names an empty working directory.
pub fn encode_request(kind: &RequestKind) -> Result<Vec<String>> {
    let mut lines = vec![ControlMarker::Start.as_line().to_string()];

    match kind {
        RequestKind::Completion { tokens } => {
            for token in tokens {
                check_payload_line(token)?;
                lines.push(token.clone());
            }
        }
        RequestKind::EnvQuery { working_dir } => {
            if working_dir.is_empty() {
                return Err(UshellError::DaemonProtocol(
                    "environment query has an empty working directory".to_string(),
                ));
            }
            check_payload_line(working_dir)?;
            lines.push(ENV_QUERY_SENTINEL.to_string());
            lines.push(working_dir.clone());
        }
    }

    lines.push(ControlMarker::Cancel.as_line().to_string());
    Ok(lines)
}

/// Encode and write a request to the daemon's input stream, then flush.
///
/// Flushing is part of the contract: the daemon will not start answering
/// until it has seen the closing CANCEL line.
pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    kind: &RequestKind,
) -> Result<()> {
    let lines = encode_request(kind)?;
    let mut buf = String::new();
    for line in &lines {
        buf.push_str(line);
        buf.push('\n');
    }
    writer.write_all(buf.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one line from the daemon, without its trailing newline.
///
/// Returns `None` on EOF (the daemon closed its output).
async fn read_response_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> io::Result<Option<String>> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}

/// Decode a completion response: candidate lines until a terminator.
///
/// - START ends the response; everything read so far is kept.
/// - CANCEL ends the response; everything read so far is discarded.
/// - An empty line (or EOF) ends the response, keeping what was read.
pub async fn decode_completion_response<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> io::Result<Vec<String>> {
    let mut candidates = Vec::new();
    loop {
        let line = match read_response_line(reader).await? {
            Some(line) => line,
            None => return Ok(candidates),
        };
        match ControlMarker::of_line(&line) {
            Some(ControlMarker::Start) => return Ok(candidates),
            Some(ControlMarker::Cancel) => return Ok(Vec::new()),
            None if line.is_empty() => return Ok(candidates),
            None => candidates.push(line),
        }
    }
}

/// Decode an environment query response: alternating key and value lines.
///
/// An empty or START key line (or EOF at a key position) ends the response
/// successfully. CANCEL anywhere, a value line that is empty or a control
/// marker, or EOF where a value was expected invalidates the whole exchange
/// and yields an empty mapping. Repeated keys overwrite.
pub async fn decode_env_response<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> io::Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    loop {
        let key = match read_response_line(reader).await? {
            Some(line) => line,
            None => return Ok(vars),
        };
        match ControlMarker::of_line(&key) {
            Some(ControlMarker::Start) => return Ok(vars),
            Some(ControlMarker::Cancel) => return Ok(HashMap::new()),
            None if key.is_empty() => return Ok(vars),
            None => {}
        }

        let value = match read_response_line(reader).await? {
            Some(line) => line,
            None => return Ok(HashMap::new()),
        };
        if value.is_empty() || ControlMarker::of_line(&value).is_some() {
            // A key with no legitimate value means the pairing is broken;
            // partial results are not trustworthy.
            return Ok(HashMap::new());
        }

        vars.insert(key, value);
    }
}
