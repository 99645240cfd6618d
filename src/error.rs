use std::fmt;
use std::io;

/// Custom error type for acorndb operations
#[derive(Debug)]
pub enum Error {
    /// I/O error from underlying file operations
    Io(io::Error),
    /// Error when database file is locked by another process
    FileLocked(String),
    /// Error when the database file is corrupted or the catalog is inconsistent
    Corrupted(String),
    /// Invalid SQL at the syntactic layer
    Parse(String),
    /// DDL is inconsistent (duplicate columns, no primary key, bad type)
    Schema(String),
    /// Table or column not found, or an ambiguous unscoped name across joined sources
    Name(String),
    /// Value does not match the column type
    Type(String),
    /// Cell serialization or deserialization failure
    Serde(String),
    /// Tree insert/delete reported a non-success status
    Storage(String),
    /// Feature recognized by the parser but not yet executable
    NotImplemented(String),
    /// Invariant violated; aborts the run
    Fatal(String),
}

impl Error {
    /// Whether this error terminates a `run` instead of being returned as a
    /// per-statement result.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::FileLocked(_) | Error::Corrupted(_) | Error::Fatal(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {err}"),
            Error::FileLocked(msg) => write!(f, "Database file is locked: {msg}"),
            Error::Corrupted(msg) => write!(f, "Database corrupted: {msg}"),
            Error::Parse(msg) => write!(f, "Parse error: {msg}"),
            Error::Schema(msg) => write!(f, "Schema error: {msg}"),
            Error::Name(msg) => write!(f, "Name error: {msg}"),
            Error::Type(msg) => write!(f, "Type error: {msg}"),
            Error::Serde(msg) => write!(f, "Serde error: {msg}"),
            Error::Storage(msg) => write!(f, "Storage error: {msg}"),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {msg}"),
            Error::Fatal(msg) => write!(f, "Fatal error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// Result type for acorndb operations
pub type Result<T> = std::result::Result<T, Error>;
