use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The page re-rendered and the element reference no longer points at a live node.
    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl AutomationError {
    /// Whether the failure only means the DOM moved under us.
    pub fn is_stale(&self) -> bool {
        matches!(self, AutomationError::StaleElement(_))
    }
}

/// Failures of the credential handoff. Cryptographic failures are always fatal.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Cryptographic failure: {0}")]
    Crypto(String),

    #[error("Shared memory segment not found: {0}")]
    SegmentNotFound(String),

    #[error("Shared memory segment {name} holds {actual} bytes, expected at least {expected}")]
    SegmentTooSmall {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid shared memory payload: {0}")]
    InvalidPayload(String),

    #[error("Shared memory is not available on this platform: {0}")]
    Unsupported(String),

    #[error("Shared memory operation '{operation}' failed on {name}: {message}")]
    Os {
        name: String,
        operation: &'static str,
        message: String,
    },
}

impl From<reqwest::Error> for AutomationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AutomationError::Timeout(format!("WebDriver request timed out: {e}"))
        } else {
            AutomationError::Driver(format!("WebDriver transport failure: {e}"))
        }
    }
}
