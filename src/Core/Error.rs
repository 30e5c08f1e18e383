// Crate-wide error type for pure cache-state operations.
//
// I/O heavy operations (disk overflow, backing-file setup) keep returning
// std::io::Result directly, since they're fundamentally syscalls. This type
// only covers the logical failure modes of the ring/cache/seek state
// machines.

use std::fmt;

/// Errors returned by cache-state operations (push/pop/seek): transient
/// back-pressure, control states, downstream refusal, resource errors and
/// seek rejection.
#[derive(Debug)]
pub enum CacheError {
    /// The ring is full and no disk overflow is configured (or it is also
    /// exhausted).
    NoSpace,
    /// A flush is in progress; retry once FLUSH_STOP has been processed.
    Flushing,
    /// The producer side has reached end-of-stream.
    Eos,
    /// Downstream refused a previous push (EOS / NOT_LINKED) and hasn't
    /// been re-armed by a SEGMENT event yet.
    NotLinked,
    /// A seek was rejected: unsupported rate, missing index, or an offset
    /// outside the retained window.
    SeekRejected(&'static str),
    /// A disk or mmap operation failed.
    Io(std::io::Error),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::NoSpace => write!(f, "cache is full and overflow is disabled or exhausted"),
            CacheError::Flushing => write!(f, "cache is flushing"),
            CacheError::Eos => write!(f, "end of stream"),
            CacheError::NotLinked => write!(f, "downstream is not accepting data"),
            CacheError::SeekRejected(reason) => write!(f, "seek rejected: {reason}"),
            CacheError::Io(e) => write!(f, "cache I/O error: {e}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Io(e)
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
