//! Error types for latchdb.

use std::fmt;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All recoverable failures surfaced by the crate.
///
/// Programmer errors (replacer misuse, pin-count underflow) are not
/// represented here; they panic instead of propagating.
#[derive(Debug)]
pub enum Error {
    /// I/O error from disk operations.
    Io(std::io::Error),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    NoFreeFrames,

    /// The page is not resident in the buffer pool.
    PageNotResident(u32),

    /// The provided page ID is the invalid sentinel.
    InvalidPageId,

    /// Attempted to delete a page whose pin count is nonzero.
    PagePinned(u32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::NoFreeFrames => write!(f, "No free frames available in buffer pool"),
            Error::PageNotResident(pid) => write!(f, "Page {} is not in the buffer pool", pid),
            Error::InvalidPageId => write!(f, "Invalid page ID"),
            Error::PagePinned(pid) => write!(f, "Page {} is pinned", pid),
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

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
