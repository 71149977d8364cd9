use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },
    #[error("malformed body from {url}: {reason}")]
    Malformed { url: String, reason: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
}
