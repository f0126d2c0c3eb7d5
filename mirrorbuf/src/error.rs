use nix::errno::Errno;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorBufError {
    #[error(
        "capacity must be a power of two spanning at least one page ({page_size} bytes), \
         requested {capacity} elements of {element_size} bytes"
    )]
    InvalidCapacity {
        capacity: usize,
        element_size: usize,
        page_size: usize,
    },

    #[error("failed to create shared memory object: {errno}")]
    ObjectCreation { errno: Errno },

    #[error("failed to reserve virtual address space: {errno}")]
    Reserve { errno: Errno },

    #[error("failed to map {half} half of ring buffer: {errno}")]
    Map { half: Half, errno: Errno },
}

impl MirrorBufError {
    /// Platform error code behind the failure, if any.
    pub fn errno(&self) -> Option<Errno> {
        match *self {
            MirrorBufError::InvalidCapacity { .. } => None,
            MirrorBufError::ObjectCreation { errno }
            | MirrorBufError::Reserve { errno }
            | MirrorBufError::Map { errno, .. } => Some(errno),
        }
    }
}

/// Which of the two mappings of the mirrored region failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    First,
    Second,
}

impl fmt::Display for Half {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Half::First => f.write_str("first"),
            Half::Second => f.write_str("second"),
        }
    }
}

/// Returned by the blocking transfers when the requested amount of data or
/// space did not become available before the timeout.
///
/// Nothing was committed and the callback was not invoked; the call may be
/// retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("timed out waiting for {required} elements")]
pub struct TimedOut {
    pub required: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_accessor() {
        let err = MirrorBufError::Map {
            half: Half::Second,
            errno: Errno::ENOMEM,
        };
        assert_eq!(err.errno(), Some(Errno::ENOMEM));
        assert!(err.to_string().contains("second half"));

        let err = MirrorBufError::InvalidCapacity {
            capacity: 3,
            element_size: 8,
            page_size: 4096,
        };
        assert_eq!(err.errno(), None);
    }
}
