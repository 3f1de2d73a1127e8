pub mod ftp;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// One server reply: the numeric code plus its human-readable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyStatus {
    pub code: u32,
    pub description: String,
}

impl ReplyStatus {
    pub fn new(code: u32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// Positive completion reply (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl fmt::Display for ReplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.description)
    }
}

/// Failures a transport call can produce. Capability gaps and legitimate
/// misses are separate variants so the session can react to them without
/// inspecting reply text.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server does not implement the requested command (FTP 502/504).
    #[error("operation not supported by the server: {0}")]
    Unsupported(ReplyStatus),
    /// The target file or folder is not available on the server (FTP 550).
    #[error("target unavailable: {0}")]
    Unavailable(ReplyStatus),
    /// Any other failure reply from the server.
    #[error("server rejected the operation: {0}")]
    Rejected(ReplyStatus),
    /// Connection or data-channel failure below the protocol level.
    #[error("transport failure: {0}")]
    Io(String),
}

impl TransportError {
    /// The server reply carried by this error, when there is one.
    pub fn status(&self) -> Option<&ReplyStatus> {
        match self {
            Self::Unsupported(status) | Self::Unavailable(status) | Self::Rejected(status) => {
                Some(status)
            }
            Self::Io(_) => None,
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// The wire collaborator a session drives. One protocol command per call;
/// every call reports the server's reply alongside its payload.
///
/// Implementations own connection management entirely. The session never
/// opens, closes or reuses connections through this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// LIST-style directory listing; `path` may end in a server-side glob.
    async fn list(&mut self, path: &str) -> TransportResult<(Vec<String>, ReplyStatus)>;

    /// RETR-style download of a whole file.
    async fn retrieve(&mut self, path: &str) -> TransportResult<(Vec<u8>, ReplyStatus)>;

    /// STOR-style upload, replacing any existing file at `path`.
    async fn store(&mut self, path: &str, data: &[u8]) -> TransportResult<ReplyStatus>;

    /// DELE-style file removal.
    async fn delete(&mut self, path: &str) -> TransportResult<ReplyStatus>;

    /// RNFR/RNTO-style rename. `new_name` is a bare name; the file stays in
    /// its folder.
    async fn rename(&mut self, path: &str, new_name: &str) -> TransportResult<ReplyStatus>;

    /// MKD-style folder creation.
    async fn make_directory(&mut self, path: &str) -> TransportResult<ReplyStatus>;

    /// RMD-style folder removal.
    async fn remove_directory(&mut self, path: &str) -> TransportResult<ReplyStatus>;

    /// MDTM-style modification-time query. The raw payload, when present,
    /// is `YYYYMMDDHHMMSS` in server time.
    async fn modified_time(&mut self, path: &str)
        -> TransportResult<(ReplyStatus, Option<String>)>;

    /// SIZE-style query for the byte count of a file.
    async fn size(&mut self, path: &str) -> TransportResult<(ReplyStatus, Option<u64>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_status_display() {
        let status = ReplyStatus::new(550, "File not found");
        assert_eq!(status.to_string(), "550 File not found");
    }

    #[test]
    fn test_reply_status_success_range() {
        assert!(ReplyStatus::new(226, "ok").is_success());
        assert!(ReplyStatus::new(250, "ok").is_success());
        assert!(!ReplyStatus::new(150, "opening").is_success());
        assert!(!ReplyStatus::new(550, "missing").is_success());
    }

    #[test]
    fn test_transport_error_exposes_reply() {
        let err = TransportError::Unavailable(ReplyStatus::new(550, "gone"));
        assert_eq!(err.status().map(|s| s.code), Some(550));

        let err = TransportError::Io("connection reset".into());
        assert!(err.status().is_none());
    }
}
