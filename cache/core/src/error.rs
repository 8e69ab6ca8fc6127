//! Error types for cache operations.

use std::fmt;

/// Errors that can occur during cache operations.
#[derive(Debug)]
pub enum CacheError {
    /// The key exceeds the maximum key length.
    KeyTooLong,

    /// The value exceeds the maximum value size.
    ValueTooLarge,

    /// Snapshot file I/O failed.
    SnapshotIo(std::io::Error),

    /// Snapshot header carried an unexpected magic number.
    BadMagic(u32),

    /// Snapshot header carried an unsupported format version.
    UnsupportedVersion(u32),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyTooLong => write!(f, "key too long"),
            Self::ValueTooLarge => write!(f, "value too large"),
            Self::SnapshotIo(e) => write!(f, "snapshot I/O error: {}", e),
            Self::BadMagic(m) => write!(f, "invalid snapshot file: bad magic {:#010x}", m),
            Self::UnsupportedVersion(v) => write!(f, "unsupported snapshot version: {}", v),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SnapshotIo(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        Self::SnapshotIo(e)
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", CacheError::KeyTooLong), "key too long");
        assert_eq!(format!("{}", CacheError::ValueTooLarge), "value too large");
        assert!(format!("{}", CacheError::BadMagic(0xdeadbeef)).contains("0xdeadbeef"));
        assert!(format!("{}", CacheError::UnsupportedVersion(9)).contains('9'));
    }

    #[test]
    fn test_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CacheError = io.into();
        assert!(matches!(err, CacheError::SnapshotIo(_)));
    }
}
