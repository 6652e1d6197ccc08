//! Error types for puzzledb

use std::fmt;
use std::io;

/// Result type for puzzledb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in puzzledb operations
#[derive(Debug)]
pub enum Error {
    /// I/O error (file open/read/write/mmap failure)
    Io(io::Error),

    /// Catalogue or PDB file syntax/layout error
    Format(String),

    /// A tileset exceeds the index bound (`|T \ {0}| > 12`)
    Size(String),

    /// A BFS cell invariant was violated (e.g. a cell already set when unexpected)
    Invariant(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Format(msg) => write!(f, "Format error: {}", msg),
            Error::Size(msg) => write!(f, "Size error: {}", msg),
            Error::Invariant(msg) => write!(f, "Invariant violation: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}
