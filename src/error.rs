use thiserror::Error;

/// Process exit codes used by the CLI shim.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const INTERNAL: i32 = 1;
    pub const USER_ERROR: i32 = 2;
}

#[derive(Error, Debug)]
pub enum UshellError {
    #[error("Failed to launch completion daemon: {0}")]
    DaemonSpawn(String),

    #[error("Daemon protocol error: {0}")]
    DaemonProtocol(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UshellError {
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors (bad arguments, broken config)
            UshellError::InvalidArgument(_) | UshellError::Config(_) | UshellError::Toml(_) => {
                exit_codes::USER_ERROR
            }

            // Internal errors
            UshellError::DaemonSpawn(_)
            | UshellError::DaemonProtocol(_)
            | UshellError::Io(_)
            | UshellError::Json(_) => exit_codes::INTERNAL,
        }
    }
}

pub type Result<T> = std::result::Result<T, UshellError>;
