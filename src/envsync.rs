//! Environment synchronization client.
//!
//! Keeps a namespaced slice of the session's environment variables in step
//! with whatever the daemon computes for the current working directory
//! (derived project and context variables). The feature is opt-in per
//! session: without the enable variable the client returns immediately and
//! never spawns the daemon.
//!
//! Every variable this client creates carries the `USHELL_` prefix and is
//! recorded in the session's tracked set, so teardown can remove exactly the
//! variables it owns without touching unrelated session state.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::session::Session;

/// Prefix for every variable materialized by the sync client.
pub const ENV_PREFIX: &str = "USHELL_";

/// Enable signal: sync is a no-op unless this variable is set non-empty.
pub const ENV_SYNC_VAR: &str = "USHELL_ENV_SYNC";

/// Access to session environment variables.
///
/// The clients go through this seam instead of `std::env` directly so tests
/// can observe materialization and teardown without mutating the process.
pub trait Environment: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
    fn set_var(&self, name: &str, value: &str);
    fn remove_var(&self, name: &str);
}

/// The real process environment.
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn set_var(&self, name: &str, value: &str) {
        // SAFETY: the shell integration invokes the clients sequentially
        // from its hook thread; nothing else reads or writes the process
        // environment while a sync is materializing variables.
        unsafe { std::env::set_var(name, value) }
    }

    fn remove_var(&self, name: &str) {
        // SAFETY: see set_var.
        unsafe { std::env::remove_var(name) }
    }
}

/// Materializes daemon-computed variables into the session environment.
pub struct EnvSyncClient {
    session: Arc<Session>,
}

impl EnvSyncClient {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Synchronize the namespaced variables for `working_dir`.
    ///
    /// Invoked on every prompt redraw. Repeated calls with an unchanged
    /// directory overwrite the same bindings; no diffing is attempted.
    /// Malformed or cancelled exchanges leave previously-set variables
    /// unchanged (the daemon's empty mapping simply sets nothing).
    ///
    /// # Errors
    ///
    /// Only a daemon spawn failure surfaces here.
    pub async fn sync(&self, working_dir: &str) -> Result<()> {
        let env = self.session.environment();
        if env.var(ENV_SYNC_VAR).is_none_or(|v| v.is_empty()) {
            return Ok(());
        }

        let vars = self.session.query_env(working_dir).await?;
        debug!(
            "environment sync for {:?}: {} variable(s)",
            working_dir,
            vars.len()
        );

        for (key, value) in vars {
            let name = format!("{ENV_PREFIX}{key}");
            env.set_var(&name, &value);
            self.session.track_env_var(name).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::daemon::DaemonCommand;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// In-memory environment for observing what sync does.
    pub(crate) struct FakeEnv {
        vars: Mutex<HashMap<String, String>>,
    }

    impl FakeEnv {
        pub(crate) fn new() -> Self {
            Self {
                vars: Mutex::new(HashMap::new()),
            }
        }

        pub(crate) fn with_var(name: &str, value: &str) -> Self {
            let env = Self::new();
            env.set_var(name, value);
            env
        }
    }

    impl Environment for FakeEnv {
        fn var(&self, name: &str) -> Option<String> {
            self.vars.lock().unwrap().get(name).cloned()
        }

        fn set_var(&self, name: &str, value: &str) {
            self.vars
                .lock()
                .unwrap()
                .insert(name.to_string(), value.to_string());
        }

        fn remove_var(&self, name: &str) {
            self.vars.lock().unwrap().remove(name);
        }
    }

    fn broken_daemon_config() -> SessionConfig {
        SessionConfig::new(DaemonCommand::Companion {
            program: PathBuf::from("/nonexistent/ushelld"),
        })
    }

    #[tokio::test]
    async fn test_sync_disabled_is_noop_without_daemon() {
        // The daemon command is unlaunchable; sync must not even try.
        let session = Arc::new(Session::with_environment(
            broken_daemon_config(),
            Arc::new(FakeEnv::new()),
        ));
        let client = EnvSyncClient::new(Arc::clone(&session));

        client.sync("/projects/game").await.unwrap();
        assert!(!session.daemon_running().await);
        assert!(session.tracked_env_vars().await.is_empty());
    }

    #[tokio::test]
    async fn test_sync_empty_enable_value_is_noop() {
        let session = Arc::new(Session::with_environment(
            broken_daemon_config(),
            Arc::new(FakeEnv::with_var(ENV_SYNC_VAR, "")),
        ));
        let client = EnvSyncClient::new(Arc::clone(&session));

        client.sync("/projects/game").await.unwrap();
        assert!(!session.daemon_running().await);
    }

    #[tokio::test]
    async fn test_sync_enabled_surfaces_spawn_failure() {
        let session = Arc::new(Session::with_environment(
            broken_daemon_config(),
            Arc::new(FakeEnv::with_var(ENV_SYNC_VAR, "1")),
        ));
        let client = EnvSyncClient::new(Arc::clone(&session));

        assert!(client.sync("/projects/game").await.is_err());
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;

        // Answers every request with two key/value pairs.
        const ENV_DAEMON: &str = r#"
CANCEL=$(printf '\002')
while IFS= read -r line; do
    if [ "$line" = "$CANCEL" ]; then
        printf 'PROJECT\ngame\nBRANCH\nmain\n\n'
    fi
done
"#;

        fn script_config(dir: &tempfile::TempDir) -> SessionConfig {
            let script = dir.path().join("daemon.sh");
            std::fs::write(&script, ENV_DAEMON).unwrap();
            SessionConfig::new(DaemonCommand::Script {
                interpreter: PathBuf::from("/bin/sh"),
                script,
            })
        }

        #[tokio::test]
        async fn test_sync_materializes_prefixed_vars_and_tracks_them() {
            let dir = tempfile::tempdir().unwrap();
            let env = Arc::new(FakeEnv::with_var(ENV_SYNC_VAR, "1"));
            let session = Arc::new(Session::with_environment(
                script_config(&dir),
                Arc::clone(&env) as Arc<dyn Environment>,
            ));
            let client = EnvSyncClient::new(Arc::clone(&session));

            client.sync("/projects/game").await.unwrap();

            assert_eq!(env.var("USHELL_PROJECT").as_deref(), Some("game"));
            assert_eq!(env.var("USHELL_BRANCH").as_deref(), Some("main"));

            let mut tracked = session.tracked_env_vars().await;
            tracked.sort();
            assert_eq!(tracked, vec!["USHELL_BRANCH", "USHELL_PROJECT"]);

            session.teardown().await;
        }

        #[tokio::test]
        async fn test_repeated_sync_overwrites_in_place() {
            let dir = tempfile::tempdir().unwrap();
            let env = Arc::new(FakeEnv::with_var(ENV_SYNC_VAR, "1"));
            let session = Arc::new(Session::with_environment(
                script_config(&dir),
                Arc::clone(&env) as Arc<dyn Environment>,
            ));
            let client = EnvSyncClient::new(Arc::clone(&session));

            client.sync("/projects/game").await.unwrap();
            client.sync("/projects/game").await.unwrap();

            assert_eq!(env.var("USHELL_PROJECT").as_deref(), Some("game"));
            assert_eq!(session.tracked_env_vars().await.len(), 2);

            session.teardown().await;
        }

        #[tokio::test]
        async fn test_teardown_removes_every_tracked_var() {
            let dir = tempfile::tempdir().unwrap();
            let env = Arc::new(FakeEnv::with_var(ENV_SYNC_VAR, "1"));
            let session = Arc::new(Session::with_environment(
                script_config(&dir),
                Arc::clone(&env) as Arc<dyn Environment>,
            ));
            let client = EnvSyncClient::new(Arc::clone(&session));

            client.sync("/projects/game").await.unwrap();
            session.teardown().await;

            assert_eq!(env.var("USHELL_PROJECT"), None);
            assert_eq!(env.var("USHELL_BRANCH"), None);
            // The enable flag is not ours to remove.
            assert_eq!(env.var(ENV_SYNC_VAR).as_deref(), Some("1"));
            assert!(session.tracked_env_vars().await.is_empty());
            assert!(!session.daemon_running().await);
        }
    }
}
