use thiserror::Error;

/// Common error types for the sync core
#[derive(Error, Debug, Clone)]
pub enum MehError {
    /// Durable storage errors
    #[error("{0}")]
    Storage(String),

    /// Configuration related errors
    #[error("{0}")]
    Configuration(String),

    /// Transport level failures (connection refused, DNS, TLS...)
    #[error("{0}")]
    Network(String),

    /// The remote API answered with a non-success status
    #[error("remote API returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// The remote API accepted the write (2xx) but its body could not be read
    #[error("{0}")]
    UnreadableResponse(String),

    /// Serialization/deserialization errors
    #[error("{0}")]
    Serialization(String),

    /// A replay or remote call did not finish in time
    #[error("{0}")]
    Timeout(String),

    /// Event handling errors
    #[error("{0}")]
    Event(String),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String)
}

impl MehError {
    /// Client errors (4xx) will never succeed on retry.
    pub fn is_rejection(&self) -> bool {
        matches!(self, MehError::Remote { status, .. } if (400..500).contains(status))
    }

    /// The server applied the write even though the call reported an error;
    /// sending it again would duplicate it.
    pub fn is_committed(&self) -> bool {
        matches!(self, MehError::UnreadableResponse(_))
    }
}

/// Convert from anyhow::Error
impl From<anyhow::Error> for MehError {
    fn from(err: anyhow::Error) -> Self {
        MehError::Generic(err.to_string())
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for MehError {
    fn from(err: std::io::Error) -> Self {
        MehError::Storage(err.to_string())
    }
}

/// Convert from serde_yaml::Error
impl From<serde_yaml::Error> for MehError {
    fn from(err: serde_yaml::Error) -> Self {
        MehError::Serialization(err.to_string())
    }
}

/// Convert from serde_json::Error
impl From<serde_json::Error> for MehError {
    fn from(err: serde_json::Error) -> Self {
        MehError::Serialization(err.to_string())
    }
}

/// Convert from rocksdb::Error
impl From<rocksdb::Error> for MehError {
    fn from(err: rocksdb::Error) -> Self {
        MehError::Storage(err.to_string())
    }
}

/// Convert from reqwest::Error
impl From<reqwest::Error> for MehError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return MehError::Timeout(err.to_string());
        }
        match err.status() {
            Some(status) => MehError::Remote { status: status.as_u16(), message: err.to_string() },
            None => MehError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_only_for_client_errors() {
        assert!(MehError::Remote { status: 422, message: "bad".into() }.is_rejection());
        assert!(!MehError::Remote { status: 503, message: "down".into() }.is_rejection());
        assert!(!MehError::Network("refused".into()).is_rejection());
    }

    #[test]
    fn test_only_unreadable_success_counts_as_committed() {
        assert!(MehError::UnreadableResponse("expected value".into()).is_committed());
        assert!(!MehError::Serialization("expected value".into()).is_committed());
        assert!(!MehError::Timeout("too slow".into()).is_committed());
    }
}
