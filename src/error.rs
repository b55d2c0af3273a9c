//! Error types for the syscall bridge
//!
//! Host failures carry the error register value sampled right after the
//! failing call. Describing that value needs the host's `strerror`, so it
//! happens lazily through [`Errno::describe`].

use std::fmt;

use crate::codec;
use crate::host::HostAbi;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Text for the "no error" sentinel
pub const NO_ERROR_TEXT: &str = "no error";

/// Text used when the host has no description for a code
pub const UNKNOWN_ERROR_TEXT: &str = "unknown error";

/// Text for every failure of the unsupported build
pub const UNSUPPORTED_TEXT: &str = "unsupported (host build)";

/// A host error register value
///
/// Numeric values are host-defined; only zero versus nonzero has a fixed
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    pub const NONE: Errno = Errno(0);

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Resolve the code to text. Never fails.
    pub fn describe<H: HostAbi + ?Sized>(self, host: &mut H) -> String {
        if self.is_none() {
            return NO_ERROR_TEXT.to_string();
        }
        match host.strerror(self.0) {
            Some(raw) => String::from_utf8_lossy(codec::decode_bytes(&raw)).into_owned(),
            None => UNKNOWN_ERROR_TEXT.to_string(),
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "errno={}", self.0)
    }
}

/// Errors returned by bridge operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The host primitive reported failure
    Host(Errno),

    /// A write accepted zero bytes while data remained
    ///
    /// Kept apart from `Host` because the error register may still read
    /// zero when this happens.
    ShortWrite {
        remaining: usize,
    },

    /// `getcwd` was handed an empty destination
    ZeroSizedBuffer,

    /// The crate was built without a live host ABI
    Unsupported,
}

impl Error {
    /// The host error code, if this is a host error
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::Host(e) => Some(*e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(e) => write!(f, "host error ({})", e),
            Self::ShortWrite { remaining } => {
                write!(f, "short write: {} bytes left unwritten", remaining)
            }
            Self::ZeroSizedBuffer => write!(f, "zero-sized buffer"),
            Self::Unsupported => write!(f, "{}", UNSUPPORTED_TEXT),
        }
    }
}

impl std::error::Error for Error {}

impl From<Errno> for Error {
    fn from(e: Errno) -> Self {
        Self::Host(e)
    }
}

/// Outcome of running an applet against a simulated host
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Stdout output
    pub stdout: Vec<u8>,
    /// Stderr output
    pub stderr: Vec<u8>,
}

impl CommandResult {
    /// Create a result with given exit code
    pub fn with_code(code: i32) -> Self {
        Self {
            exit_code: code,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Check if the applet succeeded
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get stdout as string (lossy UTF-8)
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Get stderr as string (lossy UTF-8)
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}
