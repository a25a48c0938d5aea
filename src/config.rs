//! Session configuration: how the completion daemon is launched.
//!
//! Resolution order, highest priority first:
//! 1. `USHELL_DAEMON` environment variable (path to the companion executable)
//! 2. the `[daemon]` table of the config file (`USHELL_CONFIG` override,
//!    otherwise `<config dir>/ushell/config.toml`)
//! 3. a `ushelld` executable next to the currently running one
//!
//! The config file can pick either launch shape:
//!
//! ```toml
//! [daemon]
//! program = "/opt/ushell/ushelld"
//! ```
//!
//! ```toml
//! [daemon]
//! interpreter = "/usr/bin/python3"
//! script = "/opt/ushell/driver.py"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::daemon::DaemonCommand;
use crate::error::{Result, UshellError};

/// Environment variable overriding the companion executable path.
pub const DAEMON_VAR: &str = "USHELL_DAEMON";

/// Environment variable overriding the config file location.
pub const CONFIG_VAR: &str = "USHELL_CONFIG";

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    daemon: DaemonSection,
}

#[derive(Debug, Default, Deserialize)]
struct DaemonSection {
    program: Option<PathBuf>,
    interpreter: Option<PathBuf>,
    script: Option<PathBuf>,
}

impl DaemonSection {
    /// Turn the section into a launch command, if it names one.
    fn command(self) -> Result<Option<DaemonCommand>> {
        match (self.program, self.interpreter, self.script) {
            (Some(program), None, None) => Ok(Some(DaemonCommand::Companion { program })),
            (None, Some(interpreter), Some(script)) => Ok(Some(DaemonCommand::Script {
                interpreter,
                script,
            })),
            (None, None, None) => Ok(None),
            (None, Some(_), None) | (None, None, Some(_)) => Err(UshellError::Config(
                "[daemon] needs both 'interpreter' and 'script'".to_string(),
            )),
            (Some(_), _, _) => Err(UshellError::Config(
                "[daemon] 'program' excludes 'interpreter'/'script'".to_string(),
            )),
        }
    }
}

/// Resolved per-session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How the background helper process is launched.
    pub daemon_command: DaemonCommand,
}

impl SessionConfig {
    pub fn new(daemon_command: DaemonCommand) -> Self {
        Self { daemon_command }
    }

    /// Resolve configuration from the environment, the config file, and the
    /// built-in default, in that order.
    pub fn load() -> Result<Self> {
        if let Ok(program) = std::env::var(DAEMON_VAR)
            && !program.is_empty()
        {
            return Ok(Self::new(DaemonCommand::Companion {
                program: PathBuf::from(program),
            }));
        }

        if let Some(path) = config_path()
            && path.exists()
            && let Some(command) = read_config_file(&path)?.daemon.command()?
        {
            return Ok(Self::new(command));
        }

        Ok(Self::new(DaemonCommand::default_companion()?))
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

/// Location of the config file, honoring the `USHELL_CONFIG` override.
fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_VAR)
        && !path.is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("ushell").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Option<DaemonCommand>> {
        let file: ConfigFile = toml::from_str(text).map_err(UshellError::from)?;
        file.daemon.command()
    }

    #[test]
    fn test_companion_program_config() {
        let command = parse("[daemon]\nprogram = \"/opt/ushell/ushelld\"\n")
            .unwrap()
            .unwrap();
        assert_eq!(
            command,
            DaemonCommand::Companion {
                program: PathBuf::from("/opt/ushell/ushelld"),
            }
        );
    }

    #[test]
    fn test_interpreter_script_config() {
        let command = parse(
            "[daemon]\ninterpreter = \"/usr/bin/python3\"\nscript = \"/opt/ushell/driver.py\"\n",
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            command,
            DaemonCommand::Script {
                interpreter: PathBuf::from("/usr/bin/python3"),
                script: PathBuf::from("/opt/ushell/driver.py"),
            }
        );
    }

    #[test]
    fn test_empty_config_selects_nothing() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("[daemon]\n").unwrap(), None);
    }

    #[test]
    fn test_script_without_interpreter_is_rejected() {
        let err = parse("[daemon]\nscript = \"/opt/ushell/driver.py\"\n").unwrap_err();
        assert!(matches!(err, UshellError::Config(_)));
    }

    #[test]
    fn test_program_excludes_script() {
        let err = parse(
            "[daemon]\nprogram = \"/opt/ushelld\"\ninterpreter = \"/bin/sh\"\nscript = \"/x\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, UshellError::Config(_)));
    }

    #[test]
    fn test_load_from_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[daemon]\nprogram = \"/opt/ushelld\"\n").unwrap();

        let file = read_config_file(&path).unwrap();
        assert!(file.daemon.command().unwrap().is_some());
    }
}
