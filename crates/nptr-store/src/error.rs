/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object is stored under the requested key.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The key cannot name a file inside the storage root.
    #[error("invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// The upload grew past the configured size cap.
    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    /// The storage root is missing or is not a directory.
    #[error("storage root {0} does not exist or is not a directory")]
    MissingRoot(std::path::PathBuf),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the error was caused by the caller rather than the filesystem.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::InvalidKey { .. } | Self::TooLarge { .. }
        )
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert!(StoreError::NotFound("a.txt".into()).is_client_error());
        assert!(StoreError::TooLarge { limit: 1 }.is_client_error());
        assert!(StoreError::InvalidKey { key: "..".into(), reason: "dot" }.is_client_error());
        let io = StoreError::Io(std::io::Error::other("disk full"));
        assert!(!io.is_client_error());
    }

    #[test]
    fn display_messages() {
        let err = StoreError::TooLarge { limit: 1024 };
        assert_eq!(err.to_string(), "upload exceeds the 1024 byte limit");
        let err = StoreError::NotFound("abc.txt".into());
        assert_eq!(err.to_string(), "object not found: abc.txt");
    }
}
