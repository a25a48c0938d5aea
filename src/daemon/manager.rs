//! Daemon process lifecycle management.
//!
//! One background helper process serves a whole interactive session. The
//! manager spawns it lazily on the first request, reuses the cached handle
//! while the process is alive, respawns transparently if it has died, and
//! kills it at session teardown. Liveness is probed lazily before each use;
//! there is no background watcher.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::error::{Result, UshellError};

/// Flag passed to the companion executable to put it in daemon mode.
pub const DAEMON_FLAG: &str = "--daemon";

/// File name of the companion executable, expected next to the current one.
pub const COMPANION_NAME: &str = "ushelld";

/// How the background helper process is launched.
///
/// This is a deployment choice, not a protocol concern: the default runs a
/// fixed companion executable in daemon mode, while a configured alternative
/// points an interpreter at a driver script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCommand {
    /// Run `program --daemon`.
    Companion { program: PathBuf },
    /// Run `interpreter script`.
    Script {
        interpreter: PathBuf,
        script: PathBuf,
    },
}

impl DaemonCommand {
    /// The default launch: a `ushelld` executable located next to the
    /// currently running one.
    pub fn default_companion() -> Result<Self> {
        let current_exe = std::env::current_exe()?;
        let program =
            current_exe.with_file_name(format!("{}{}", COMPANION_NAME, std::env::consts::EXE_SUFFIX));
        Ok(DaemonCommand::Companion { program })
    }

    /// The file that must exist for the launch to make sense.
    fn launch_target(&self) -> &Path {
        match self {
            DaemonCommand::Companion { program } => program,
            DaemonCommand::Script { script, .. } => script,
        }
    }

    fn build(&self) -> Command {
        match self {
            DaemonCommand::Companion { program } => {
                let mut cmd = Command::new(program);
                cmd.arg(DAEMON_FLAG);
                cmd
            }
            DaemonCommand::Script {
                interpreter,
                script,
            } => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(script);
                cmd
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            DaemonCommand::Companion { program } => {
                format!("{} {}", program.display(), DAEMON_FLAG)
            }
            DaemonCommand::Script {
                interpreter,
                script,
            } => format!("{} {}", interpreter.display(), script.display()),
        }
    }
}

/// Handle to the live daemon process and its duplex stream ends.
///
/// The write end is the daemon's standard input; the read end is its
/// standard output, buffered for line-based decoding. The handle is owned
/// exclusively by the [`DaemonManager`]; the stream is not safe for
/// concurrent independent conversations.
#[derive(Debug)]
pub struct DaemonHandle {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl DaemonHandle {
    fn spawn(command: &DaemonCommand) -> Result<Self> {
        let target = command.launch_target();
        if !target.exists() {
            return Err(UshellError::DaemonSpawn(format!(
                "daemon binary not found at {:?}",
                target
            )));
        }

        let mut child = command
            .build()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                UshellError::DaemonSpawn(format!("{}: {}", command.describe(), e))
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            UshellError::DaemonSpawn("daemon spawned without a piped stdin".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            UshellError::DaemonSpawn("daemon spawned without a piped stdout".to_string())
        })?;

        debug!("spawned completion daemon: {}", command.describe());

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Lazy liveness probe: has the process exited since we last looked?
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// OS process id, if the process has not been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Both ends of the duplex stream, for one full request/response cycle.
    pub fn streams(&mut self) -> (&mut ChildStdin, &mut BufReader<ChildStdout>) {
        (&mut self.stdin, &mut self.stdout)
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("failed to kill completion daemon: {}", e);
        }
    }
}

/// Owns the single daemon handle for a session.
///
/// State machine: `NoDaemon -> Spawning -> Alive -> (Dead -> Spawning)* ->
/// Terminated`. A dead process is only noticed on the next [`handle`] call.
///
/// [`handle`]: DaemonManager::handle
pub struct DaemonManager {
    command: DaemonCommand,
    handle: Option<DaemonHandle>,
}

impl DaemonManager {
    pub fn new(command: DaemonCommand) -> Self {
        Self {
            command,
            handle: None,
        }
    }

    /// Return a live daemon handle, spawning or respawning as needed.
    ///
    /// # Errors
    ///
    /// Returns `DaemonSpawn` if the process cannot be started. This is fatal
    /// to the calling operation: neither completion nor environment sync can
    /// function without the daemon.
    pub fn handle(&mut self) -> Result<&mut DaemonHandle> {
        let stale = match self.handle.as_mut() {
            Some(handle) => !handle.is_alive(),
            None => true,
        };
        if stale {
            if self.handle.take().is_some() {
                debug!("completion daemon exited, respawning");
            }
            let handle = DaemonHandle::spawn(&self.command)?;
            return Ok(self.handle.insert(handle));
        }
        // Probed alive just above.
        Ok(self.handle.as_mut().expect("cached daemon handle"))
    }

    /// Whether a cached daemon process is currently alive.
    pub fn is_running(&mut self) -> bool {
        self.handle.as_mut().is_some_and(|h| h.is_alive())
    }

    /// Process id of the cached daemon, if any.
    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().and_then(|h| h.pid())
    }

    /// Forcibly terminate the daemon, if one was ever spawned.
    ///
    /// Best-effort: the daemon is expected to exit cleanly on being killed
    /// and failures are logged, not propagated.
    pub async fn teardown(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.kill().await;
        }
    }
}
