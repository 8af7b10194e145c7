use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("DOM operation failed: {0}")]
    Dom(String),

    #[error("Host unavailable: {0}")]
    HostUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GuardError>;
