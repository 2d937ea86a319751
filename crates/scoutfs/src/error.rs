//! Error representations.
//!
//! Every operation in this crate ends in a single `ioctl(2)` and the kernel
//! reports failure as an errno. A handful of errnos are ones callers are
//! expected to branch on, so they get their own variants; everything else is
//! carried through untouched in [`Error::No`].

use crate::error::errno::*;
use std::io::ErrorKind::*;
use std::{fmt, io};

fn errno_from_ioerror(e: &io::Error) -> nix::errno::Errno {
    e.raw_os_error()
        .map(nix::errno::Errno::from_raw)
        .unwrap_or(match e.kind() {
            NotFound => ENOENT,
            PermissionDenied => EPERM,
            AlreadyExists => EEXIST,
            WouldBlock => EAGAIN,
            InvalidInput | InvalidData => EINVAL,
            UnexpectedEof => EIO,
            Unsupported => EOPNOTSUPP,
            _ => EIO,
        })
}

/// Error type returned by every operation in this crate.
#[derive(Debug)]
pub enum Error {
    /// The call would have blocked (`EAGAIN`).
    WouldBlock,
    /// The kernel rejected the request (`EINVAL`).
    InvalidArgument,
    /// The object or position does not exist (`ENOENT`).
    NotFound,
    /// The result does not fit in the supplied buffer (`EOVERFLOW`).
    Overflow,
    /// Any other errno, passed through as is.
    No(nix::errno::Errno),
    /// Host I/O errors and rejected caller arguments.
    Io(io::Error),
    /// A buffer was shorter than the fixed record it should hold.
    Framing {
        record: &'static str,
        needed: usize,
        got: usize,
    },
}

impl Error {
    /// Get an errno representation.
    pub fn errno(&self) -> nix::errno::Errno {
        match *self {
            Error::WouldBlock => EAGAIN,
            Error::InvalidArgument => EINVAL,
            Error::NotFound => ENOENT,
            Error::Overflow => EOVERFLOW,
            Error::No(e) => e,
            Error::Io(ref e) => errno_from_ioerror(e),
            Error::Framing { .. } => EPROTO,
        }
    }

    /// True for short-buffer decoding failures.
    pub fn is_framing(&self) -> bool {
        matches!(self, Error::Framing { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::WouldBlock => write!(f, "{}", string::EAGAIN),
            Error::InvalidArgument => write!(f, "{}", string::EINVAL),
            Error::NotFound => write!(f, "{}", string::ENOENT),
            Error::Overflow => write!(f, "{}", string::EOVERFLOW),
            Error::No(ref e) => write!(f, "System error: {}", e.desc()),
            Error::Io(ref e) => write!(f, "I/O error: {}", e),
            Error::Framing {
                record,
                needed,
                got,
            } => write!(
                f,
                "short {} record: need {} bytes, buffer holds {}",
                record, needed, got
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::No(ref e) => Some(e),
            Error::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<nix::errno::Errno> for Error {
    fn from(e: nix::errno::Errno) -> Self {
        match e {
            EAGAIN => Error::WouldBlock,
            EINVAL => Error::InvalidArgument,
            ENOENT => Error::NotFound,
            EOVERFLOW => Error::Overflow,
            e => Error::No(e),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            e => io::Error::from_raw_os_error(e.errno() as i32),
        }
    }
}

/// errno numbers re-exported from nix.
pub mod errno {
    pub use nix::errno::Errno::*;
}

/// Human readable strings for the errnos the gate classifies.
pub mod string {
    pub const EAGAIN: &str = "Operation would block";
    pub const EINVAL: &str = "Invalid argument";
    pub const ENOENT: &str = "No such file or directory";
    pub const EOVERFLOW: &str = "Value too large for defined data type";
}
