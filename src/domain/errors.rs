use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    InvalidUri(String),
    FetchFailed(String),
    ScriptFailed(String),
    DiscoveryFailed(String),
    Unsupported(String),
    Io(String),
    Config(String),
    OutOfMemory,
    Cancelled,
    Timeout,
}

impl ProxyError {
    /// Integer error code reported through `get_error`. Zero is never returned here.
    pub fn code(&self) -> i32 {
        match self {
            ProxyError::InvalidUri(_) => 22,
            ProxyError::FetchFailed(_) => 61,
            ProxyError::ScriptFailed(_) => 8,
            ProxyError::DiscoveryFailed(_) => 2,
            ProxyError::Unsupported(_) => 95,
            ProxyError::Io(_) => 5,
            ProxyError::Config(_) => 22,
            ProxyError::OutOfMemory => 12,
            ProxyError::Cancelled => 125,
            ProxyError::Timeout => 110,
        }
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::InvalidUri(msg) => write!(f, "Invalid URI: {}", msg),
            ProxyError::FetchFailed(msg) => write!(f, "PAC fetch failed: {}", msg),
            ProxyError::ScriptFailed(msg) => write!(f, "PAC script failed: {}", msg),
            ProxyError::DiscoveryFailed(msg) => write!(f, "WPAD discovery failed: {}", msg),
            ProxyError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            ProxyError::Io(msg) => write!(f, "I/O error: {}", msg),
            ProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ProxyError::OutOfMemory => write!(f, "Out of memory"),
            ProxyError::Cancelled => write!(f, "Resolution cancelled"),
            ProxyError::Timeout => write!(f, "Operation timed out"),
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::OutOfMemory => ProxyError::OutOfMemory,
            std::io::ErrorKind::TimedOut => ProxyError::Timeout,
            _ => ProxyError::Io(e.to_string()),
        }
    }
}

impl From<url::ParseError> for ProxyError {
    fn from(e: url::ParseError) -> Self {
        ProxyError::InvalidUri(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
