//! Error types for the Huntarr panel

/// Errors that can occur in the panel
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("No usable cycle state: {0}")]
    StaleOrEmptyState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PanelError {
    fn from(e: serde_json::Error) -> Self {
        PanelError::Parse(e.to_string())
    }
}

/// Result type alias for panel operations
pub type Result<T> = std::result::Result<T, PanelError>;
