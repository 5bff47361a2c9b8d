//! Crate-wide error type for the sync pipeline.

#[derive(Debug)]
pub enum SyncError {
    Io(std::io::Error),
    /// Transport-level HTTP failure (connect, timeout, body read).
    Http(reqwest::Error),
    /// Non-throttling API error response.
    Api { status: u16, message: String },
    /// Throttling retries exhausted for one page fetch.
    Throttled,
    Json(serde_json::Error),
    Database(rusqlite::Error),
    /// Event record carries no PostedDate.
    MissingPostedDate,
    /// PostedDate present but not parseable as an ISO-8601 timestamp.
    DateParse { raw: String },
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Http(err)
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Json(err)
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Database(err)
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Io(e) => write!(f, "IO error: {}", e),
            SyncError::Http(e) => write!(f, "HTTP error: {}", e),
            SyncError::Api { status, message } => {
                write!(f, "API error (status {}): {}", status, message)
            }
            SyncError::Throttled => write!(f, "request throttled, retry attempts exhausted"),
            SyncError::Json(e) => write!(f, "JSON error: {}", e),
            SyncError::Database(e) => write!(f, "database error: {}", e),
            SyncError::MissingPostedDate => write!(f, "event record has no PostedDate"),
            SyncError::DateParse { raw } => write!(f, "unparseable PostedDate: {}", raw),
        }
    }
}

impl std::error::Error for SyncError {}
