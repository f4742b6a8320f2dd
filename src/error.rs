//! Error types for the iplocation library

use crate::format::FormatError;
use std::fmt;

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Main error type for loading and strict lookups
///
/// Resolution through [`Database::resolve`](crate::Database::resolve)
/// never produces one of these; absence of data is an empty
/// [`Location`](crate::Location).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// File missing or unreadable
    Io(String),

    /// Header or prefix table describes regions the file does not contain
    Corrupt(FormatError),

    /// Text is not a dotted-quad IPv4 address (strict lookups only)
    InvalidAddress(String),

    /// Full validation was requested on open and found errors
    Validation(Vec<String>),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::Io(msg) => write!(f, "I/O error: {}", msg),
            DatabaseError::Corrupt(err) => write!(f, "Corrupt database: {}", err),
            DatabaseError::InvalidAddress(msg) => write!(f, "Invalid IPv4 address: {}", msg),
            DatabaseError::Validation(errors) => {
                write!(f, "Validation failed with {} error(s)", errors.len())?;
                if let Some(first) = errors.first() {
                    write!(f, ": {}", first)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for DatabaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatabaseError::Corrupt(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DatabaseError {
    fn from(err: std::io::Error) -> Self {
        DatabaseError::Io(err.to_string())
    }
}

impl From<FormatError> for DatabaseError {
    fn from(err: FormatError) -> Self {
        DatabaseError::Corrupt(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display() {
        let err = DatabaseError::Io("no such file".to_string());
        assert_eq!(err.to_string(), "I/O error: no such file");

        let err = DatabaseError::from(FormatError::FileTooSmall {
            size: 3,
            required: 16,
        });
        assert_eq!(
            err.to_string(),
            "Corrupt database: File too small: 3 bytes (need at least 16)"
        );
        assert!(err.source().is_some());

        let err = DatabaseError::Validation(vec!["bucket 1 unsorted".to_string()]);
        assert_eq!(
            err.to_string(),
            "Validation failed with 1 error(s): bucket 1 unsorted"
        );
    }

    #[test]
    fn test_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(DatabaseError::from(io), DatabaseError::Io(_)));
    }
}
