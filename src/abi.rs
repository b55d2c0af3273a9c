//! Host ABI types and constants
//!
//! The numbering here is fixed by the host and must match it bit for bit.
//! Flag values follow the newlib layout the host's `open` expects.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Name of the single function every applet exports
pub const ENTRY_SYMBOL: &str = "app_main";

/// Size of the scratch buffer used by `Syscalls::cwd`
pub const CWD_SCRATCH_LEN: usize = 256;

/// A file descriptor handed out by the host
///
/// Descriptors are not tracked by the bridge. Closing twice or using a
/// closed descriptor is whatever the host makes of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fd(i32);

impl Fd {
    pub const STDIN: Fd = Fd(0);
    pub const STDOUT: Fd = Fd(1);
    pub const STDERR: Fd = Fd(2);

    pub const fn from_raw(raw: i32) -> Self {
        Fd(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd {}", self.0)
    }
}

/// Open flags for the `open` syscall
///
/// Exactly one access mode (`RDONLY`, `WRONLY`, `RDWR`) is meaningful; the
/// behavior flags combine freely with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags(pub i32);

impl OpenFlags {
    pub const RDONLY: OpenFlags = OpenFlags(0);
    pub const WRONLY: OpenFlags = OpenFlags(1);
    pub const RDWR: OpenFlags = OpenFlags(2);

    pub const APPEND: OpenFlags = OpenFlags(0x0008);
    pub const CREAT: OpenFlags = OpenFlags(0x0200);
    pub const TRUNC: OpenFlags = OpenFlags(0x0400);
    pub const EXCL: OpenFlags = OpenFlags(0x0800);
    pub const NONBLOCK: OpenFlags = OpenFlags(0x4000);
    pub const CLOEXEC: OpenFlags = OpenFlags(0x40000);

    /// Mask selecting the access-mode bits
    pub const ACCESS_MASK: i32 = 0x3;

    pub const fn bits(self) -> i32 {
        self.0
    }

    /// The access-mode part of the flags (`RDONLY`, `WRONLY`, `RDWR`, or
    /// the invalid value 3)
    pub const fn access_mode(self) -> OpenFlags {
        OpenFlags(self.0 & Self::ACCESS_MASK)
    }

    /// Check a behavior flag. Not meaningful for access modes; use
    /// `access_mode` for those.
    pub const fn contains(self, flag: OpenFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn is_read(&self) -> bool {
        matches!(self.access_mode(), OpenFlags::RDONLY | OpenFlags::RDWR)
    }

    pub fn is_write(&self) -> bool {
        matches!(self.access_mode(), OpenFlags::WRONLY | OpenFlags::RDWR)
    }

    pub fn is_create(&self) -> bool {
        self.contains(Self::CREAT)
    }

    pub fn is_truncate(&self) -> bool {
        self.contains(Self::TRUNC)
    }

    pub fn is_exclusive(&self) -> bool {
        self.contains(Self::EXCL)
    }

    pub fn is_append(&self) -> bool {
        self.contains(Self::APPEND)
    }
}

impl BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: OpenFlags) {
        self.0 |= rhs.0;
    }
}

/// Reference point for `seek`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Whence {
    Set = 0,
    Cur = 1,
    End = 2,
}

impl Whence {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Set),
            1 => Some(Self::Cur),
            2 => Some(Self::End),
            _ => None,
        }
    }
}

/// Error register values the host uses (newlib numbering)
pub mod errno {
    pub const EPERM: i32 = 1;
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const EBADF: i32 = 9;
    pub const EACCES: i32 = 13;
    pub const EEXIST: i32 = 17;
    pub const ENOTDIR: i32 = 20;
    pub const EISDIR: i32 = 21;
    pub const EINVAL: i32 = 22;
    pub const EFBIG: i32 = 27;
    pub const ESPIPE: i32 = 29;
    pub const ERANGE: i32 = 34;
    pub const EOVERFLOW: i32 = 139;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values_match_host() {
        assert_eq!(OpenFlags::RDONLY.bits(), 0);
        assert_eq!(OpenFlags::WRONLY.bits(), 1);
        assert_eq!(OpenFlags::RDWR.bits(), 2);
        assert_eq!(OpenFlags::APPEND.bits(), 0x0008);
        assert_eq!(OpenFlags::CREAT.bits(), 0x0200);
        assert_eq!(OpenFlags::TRUNC.bits(), 0x0400);
        assert_eq!(OpenFlags::EXCL.bits(), 0x0800);
    }

    #[test]
    fn test_open_flags() {
        assert!(OpenFlags::RDONLY.is_read());
        assert!(!OpenFlags::RDONLY.is_write());

        assert!(OpenFlags::WRONLY.is_write());
        assert!(!OpenFlags::WRONLY.is_read());

        assert!(OpenFlags::RDWR.is_read());
        assert!(OpenFlags::RDWR.is_write());

        let create_write = OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC;
        assert_eq!(create_write.bits(), 0x0601);
        assert!(create_write.is_write());
        assert!(create_write.is_create());
        assert!(create_write.is_truncate());
        assert!(!create_write.is_append());
        assert_eq!(create_write.access_mode(), OpenFlags::WRONLY);
    }

    #[test]
    fn test_invalid_access_mode_is_neither() {
        let bogus = OpenFlags(3);
        assert!(!bogus.is_read());
        assert!(!bogus.is_write());
    }

    #[test]
    fn test_standard_fds() {
        assert_eq!(Fd::STDIN.raw(), 0);
        assert_eq!(Fd::STDOUT.raw(), 1);
        assert_eq!(Fd::STDERR.raw(), 2);
        assert_eq!(Fd::STDOUT.to_string(), "fd 1");
    }

    #[test]
    fn test_whence_codes() {
        assert_eq!(Whence::End.code(), 2);
        assert_eq!(Whence::from_code(1), Some(Whence::Cur));
        assert_eq!(Whence::from_code(7), None);
    }
}
