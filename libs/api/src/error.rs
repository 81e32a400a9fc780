/// Category of an ingest error. Lets the batch writer decide between
/// retry, drop and fail-fast without inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration or missing resource: permanent, never retried.
    Config,
    /// I/O or network error: transient, retried with backoff.
    Io,
    /// Backend rejected the call for throughput reasons: transient.
    Throttled,
    /// Record cannot be encoded for the wire: drop the record.
    Format,
}

impl ErrorKind {
    /// Transient kinds are worth another attempt of the same call.
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Config | ErrorKind::Format)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Throttled => f.write_str("throttled"),
            ErrorKind::Format => f.write_str("format"),
        }
    }
}

/// Unified error type for record serialization and storage backend calls.
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// Serialization failures convert via `From` as `Format`.
#[derive(Clone)]
pub struct IngestError {
    kind: ErrorKind,
    message: String,
}

impl IngestError {
    /// Configuration error: permanent, fail at startup.
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    /// I/O error: transient, may retry.
    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    /// Throughput exceeded on the backend side: transient.
    pub fn throttled(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Throttled, message: msg.into() }
    }

    /// Encoding error: bad record, skip it.
    pub fn format_err(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for IngestError {}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Format, message: e.to_string() } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds() {
        assert!(IngestError::io("reset").kind().is_transient());
        assert!(IngestError::throttled("slow down").kind().is_transient());
        assert!(!IngestError::config("no table").kind().is_transient());
        assert!(!IngestError::format_err("nan").kind().is_transient());
    }

    #[test]
    fn debug_carries_kind() {
        let e = IngestError::throttled("ProvisionedThroughputExceeded");
        assert_eq!(format!("{e:?}"), "[throttled] ProvisionedThroughputExceeded");
        assert_eq!(e.to_string(), "ProvisionedThroughputExceeded");
    }

    #[test]
    fn json_errors_are_format() {
        let e: IngestError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(e.kind(), ErrorKind::Format);
    }
}
