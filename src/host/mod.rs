//! Host ABI capability
//!
//! [`HostAbi`] is the raw primitive set the host runtime exposes, with the
//! host's own conventions left intact: negative results mean failure and
//! the reason sits in the error register until the next host call. The
//! bridge turns these into `Result`s; nothing above it sees the register.
//!
//! Implementations:
//!
//! | Type         | When                                            |
//! |--------------|-------------------------------------------------|
//! | `NativeHost` | applet builds (`applet` feature), real imports  |
//! | `SimHost`    | host-side tests and the simulator (`sim`)       |
//! | `&mut H`     | borrowing any of the above                      |

#[cfg(feature = "applet")]
mod native;

#[cfg(feature = "applet")]
pub use native::NativeHost;

use crate::codec::CBuf;

/// Host file offset type (`off_t`)
pub type Off = std::ffi::c_long;

/// The primitive operations a host provides
///
/// Paths arrive already encoded, so an implementation only ever sees
/// NUL-terminated strings, just like the host does.
pub trait HostAbi {
    /// `write(fd, buf, len)`: bytes written, negative on error
    fn write(&mut self, fd: i32, buf: &[u8]) -> isize;

    /// `read(fd, buf, len)`: bytes read, 0 at end of input, negative on error
    fn read(&mut self, fd: i32, buf: &mut [u8]) -> isize;

    /// `open(path, flags, mode)`: new descriptor, negative on error
    fn open(&mut self, path: &CBuf, flags: i32, mode: u32) -> i32;

    /// `close(fd)`: 0, negative on error
    fn close(&mut self, fd: i32) -> i32;

    /// `unlink(path)`: 0, negative on error
    fn unlink(&mut self, path: &CBuf) -> i32;

    /// `mkdir(path, mode)`: 0, negative on error
    fn mkdir(&mut self, path: &CBuf, mode: u32) -> i32;

    /// `chdir(path)`: 0, negative on error
    fn chdir(&mut self, path: &CBuf) -> i32;

    /// `getcwd(buf, size)`: the decoded path, or `None` where the host
    /// returned a null pointer
    fn getcwd(&mut self, buf: &mut [u8]) -> Option<Vec<u8>>;

    /// `lseek(fd, offset, whence)`: new offset, negative on error
    fn lseek(&mut self, fd: i32, offset: Off, whence: i32) -> Off;

    /// Current value of the error register
    fn errno(&mut self) -> i32;

    /// `strerror(code)`: description bytes, `None` if the host has none
    fn strerror(&mut self, code: i32) -> Option<Vec<u8>>;

    /// `sleep(seconds)`: seconds left unslept, 0 when the full time passed
    fn sleep(&mut self, seconds: u32) -> u32;

    /// `usleep(usec)`: 0, negative on error
    fn usleep(&mut self, usec: u32) -> i32;

    /// `exit(status)`: end the applet, unwinding back to the host's loader
    fn exit(&mut self, status: i32) -> !;

    /// `abort()`: end the applet abnormally
    fn abort(&mut self) -> !;
}

impl<H: HostAbi + ?Sized> HostAbi for &mut H {
    fn write(&mut self, fd: i32, buf: &[u8]) -> isize {
        (**self).write(fd, buf)
    }

    fn read(&mut self, fd: i32, buf: &mut [u8]) -> isize {
        (**self).read(fd, buf)
    }

    fn open(&mut self, path: &CBuf, flags: i32, mode: u32) -> i32 {
        (**self).open(path, flags, mode)
    }

    fn close(&mut self, fd: i32) -> i32 {
        (**self).close(fd)
    }

    fn unlink(&mut self, path: &CBuf) -> i32 {
        (**self).unlink(path)
    }

    fn mkdir(&mut self, path: &CBuf, mode: u32) -> i32 {
        (**self).mkdir(path, mode)
    }

    fn chdir(&mut self, path: &CBuf) -> i32 {
        (**self).chdir(path)
    }

    fn getcwd(&mut self, buf: &mut [u8]) -> Option<Vec<u8>> {
        (**self).getcwd(buf)
    }

    fn lseek(&mut self, fd: i32, offset: Off, whence: i32) -> Off {
        (**self).lseek(fd, offset, whence)
    }

    fn errno(&mut self) -> i32 {
        (**self).errno()
    }

    fn strerror(&mut self, code: i32) -> Option<Vec<u8>> {
        (**self).strerror(code)
    }

    fn sleep(&mut self, seconds: u32) -> u32 {
        (**self).sleep(seconds)
    }

    fn usleep(&mut self, usec: u32) -> i32 {
        (**self).usleep(usec)
    }

    fn exit(&mut self, status: i32) -> ! {
        (**self).exit(status)
    }

    fn abort(&mut self) -> ! {
        (**self).abort()
    }
}
