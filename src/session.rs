//! Session-scoped context for daemon conversations.
//!
//! One [`Session`] exists per interactive shell invocation. It owns the
//! single daemon handle and the set of environment variables created on the
//! session's behalf, and it serializes every daemon conversation behind one
//! mutex: the duplex stream carries exactly one request/response exchange at
//! a time, so the lock is held from request write through response drain.
//! Interleaved exchanges would corrupt both decodes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::config::SessionConfig;
use crate::daemon::manager::DaemonManager;
use crate::daemon::protocol::{self, RequestKind};
use crate::envsync::{Environment, ProcessEnv};
use crate::error::{Result, UshellError};

struct SessionInner {
    manager: DaemonManager,
    tracked_vars: HashSet<String>,
}

/// Shared per-session state, injected into both clients.
pub struct Session {
    inner: Mutex<SessionInner>,
    env: Arc<dyn Environment>,
}

impl Session {
    /// A session over the real process environment.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_environment(config, Arc::new(ProcessEnv))
    }

    /// A session over an explicit [`Environment`], for tests and embedding.
    pub fn with_environment(config: SessionConfig, env: Arc<dyn Environment>) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                manager: DaemonManager::new(config.daemon_command),
                tracked_vars: HashSet::new(),
            }),
            env,
        }
    }

    /// The environment this session materializes variables into.
    pub fn environment(&self) -> Arc<dyn Environment> {
        Arc::clone(&self.env)
    }

    /// Run a completion exchange for the given token sequence.
    ///
    /// A malformed or cancelled response, and any I/O failure once the
    /// daemon is up, degrade to an empty candidate list: a missing
    /// suggestion beats a blocked shell. Only spawn failures (and client
    /// bugs caught by request encoding) surface as errors.
    pub async fn complete_tokens(&self, tokens: Vec<String>) -> Result<Vec<String>> {
        let kind = RequestKind::Completion { tokens };
        let mut inner = self.inner.lock().await;
        let handle = inner.manager.handle()?;
        let (writer, reader) = handle.streams();

        match protocol::write_request(writer, &kind).await {
            Ok(()) => {}
            Err(UshellError::Io(e)) => {
                warn!("completion request not delivered: {}", e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        }

        match protocol::decode_completion_response(reader).await {
            Ok(candidates) => Ok(candidates),
            Err(e) => {
                warn!("completion response aborted: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Run an environment query exchange for the given working directory.
    ///
    /// Degrades to an empty mapping under the same policy as
    /// [`complete_tokens`](Session::complete_tokens).
    pub async fn query_env(&self, working_dir: &str) -> Result<HashMap<String, String>> {
        let kind = RequestKind::EnvQuery {
            working_dir: working_dir.to_string(),
        };
        let mut inner = self.inner.lock().await;
        let handle = inner.manager.handle()?;
        let (writer, reader) = handle.streams();

        match protocol::write_request(writer, &kind).await {
            Ok(()) => {}
            Err(UshellError::Io(e)) => {
                warn!("environment query not delivered: {}", e);
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e),
        }

        match protocol::decode_env_response(reader).await {
            Ok(vars) => Ok(vars),
            Err(e) => {
                warn!("environment response aborted: {}", e);
                Ok(HashMap::new())
            }
        }
    }

    /// Record a variable name for removal at teardown.
    pub async fn track_env_var(&self, name: String) {
        self.inner.lock().await.tracked_vars.insert(name);
    }

    /// Names currently tracked for teardown.
    pub async fn tracked_env_vars(&self) -> Vec<String> {
        self.inner.lock().await.tracked_vars.iter().cloned().collect()
    }

    /// Whether the session's daemon process is currently alive.
    pub async fn daemon_running(&self) -> bool {
        self.inner.lock().await.manager.is_running()
    }

    /// Process id of the session's daemon, if one is cached.
    pub async fn daemon_pid(&self) -> Option<u32> {
        self.inner.lock().await.manager.pid()
    }

    /// End-of-session cleanup: kill the daemon, then reverse every tracked
    /// environment binding. Best-effort on both counts; the session is
    /// already exiting.
    pub async fn teardown(&self) {
        let mut inner = self.inner.lock().await;
        inner.manager.teardown().await;
        for name in std::mem::take(&mut inner.tracked_vars) {
            self.env.remove_var(&name);
        }
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::daemon::DaemonCommand;
    use std::path::PathBuf;

    fn script_session(dir: &tempfile::TempDir, body: &str) -> Session {
        let script = dir.path().join("daemon.sh");
        std::fs::write(&script, body).unwrap();
        Session::new(SessionConfig::new(DaemonCommand::Script {
            interpreter: PathBuf::from("/bin/sh"),
            script,
        }))
    }

    // Replies to any request with two candidates and a blank terminator.
    const CANDIDATE_DAEMON: &str = r#"
CANCEL=$(printf '\002')
while IFS= read -r line; do
    if [ "$line" = "$CANCEL" ]; then
        printf 'alpha\nbeta\n\n'
    fi
done
"#;

    // Replies to any request with CANCEL.
    const CANCELLING_DAEMON: &str = r#"
CANCEL=$(printf '\002')
while IFS= read -r line; do
    if [ "$line" = "$CANCEL" ]; then
        printf 'stale\n\002\n'
    fi
done
"#;

    #[tokio::test]
    async fn test_completion_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let session = script_session(&dir, CANDIDATE_DAEMON);

        let got = session
            .complete_tokens(vec!["build".to_string()])
            .await
            .unwrap();
        assert_eq!(got, vec!["alpha", "beta"]);

        session.teardown().await;
    }

    #[tokio::test]
    async fn test_daemon_cancel_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let session = script_session(&dir, CANCELLING_DAEMON);

        let got = session
            .complete_tokens(vec!["build".to_string()])
            .await
            .unwrap();
        assert!(got.is_empty());

        session.teardown().await;
    }

    #[tokio::test]
    async fn test_spawn_failure_is_surfaced() {
        let session = Session::new(SessionConfig::new(DaemonCommand::Companion {
            program: PathBuf::from("/nonexistent/ushelld"),
        }));
        let err = session
            .complete_tokens(vec!["build".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, UshellError::DaemonSpawn(_)));
    }

    #[tokio::test]
    async fn test_teardown_stops_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let session = script_session(&dir, CANDIDATE_DAEMON);

        session
            .complete_tokens(vec!["build".to_string()])
            .await
            .unwrap();
        assert!(session.daemon_running().await);

        session.teardown().await;
        assert!(!session.daemon_running().await);
        assert!(session.daemon_pid().await.is_none());
    }
}
