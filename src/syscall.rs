//! Syscall façade
//!
//! [`Syscalls`] is the operation set applets program against. Two types
//! implement it:
//!
//! - [`Bridge`] drives any [`HostAbi`]: validate arguments, make the raw
//!   call, treat a negative result as failure and sample the error register
//!   before anything else touches the host.
//! - [`Unsupported`] fails every operation with `Error::Unsupported`, so
//!   host-side builds link without a live host.
//!
//! [`System`] names whichever of the two the build is configured for.

use std::fmt;
use std::time::Duration;

use crate::abi::{CWD_SCRATCH_LEN, Fd, OpenFlags, Whence};
use crate::codec;
use crate::error::{Errno, Error, Result, UNSUPPORTED_TEXT};
use crate::host::{HostAbi, Off};

/// The operations available to an applet
pub trait Syscalls {
    /// Open `path`; `mode` only matters together with `OpenFlags::CREAT`
    fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> Result<Fd>;

    /// Read into `buf`; `Ok(0)` means end of input
    fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize>;

    /// Write from `buf`, possibly partially
    fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize>;

    fn close(&mut self, fd: Fd) -> Result<()>;

    fn unlink(&mut self, path: &str) -> Result<()>;

    fn mkdir(&mut self, path: &str, mode: u32) -> Result<()>;

    fn chdir(&mut self, path: &str) -> Result<()>;

    /// Current directory, using `buf` as the host's destination
    fn getcwd(&mut self, buf: &mut [u8]) -> Result<String>;

    /// Reposition `fd`, returning the new offset
    fn seek(&mut self, fd: Fd, offset: Off, whence: Whence) -> Result<Off>;

    /// Suspend for `seconds`, returning the seconds left if woken early
    fn sleep(&mut self, seconds: u32) -> Result<u32>;

    /// Suspend for `usec` microseconds; hosts may reject a full second or more
    fn usleep(&mut self, usec: u32) -> Result<()>;

    /// End the applet with `status`
    ///
    /// Returns only where the applet cannot be terminated, with the reason.
    fn exit(&mut self, status: i32) -> Error;

    /// End the applet abnormally; returns like `exit`
    fn abort(&mut self) -> Error;

    /// Render an error for humans. Never fails.
    fn describe(&mut self, err: &Error) -> String;

    /// Write every byte of `buf`, looping over partial writes
    ///
    /// A write that accepts nothing while data remains is reported as
    /// `Error::ShortWrite`, not as a host error.
    fn write_all(&mut self, fd: Fd, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(fd, buf)?;
            if n == 0 {
                log::trace!("write_all: {} stalled with {} bytes left", fd, buf.len());
                return Err(Error::ShortWrite {
                    remaining: buf.len(),
                });
            }
            buf = &buf[n.min(buf.len())..];
        }
        Ok(())
    }

    fn write_str(&mut self, fd: Fd, s: &str) -> Result<usize> {
        self.write(fd, s.as_bytes())
    }

    /// Sleep for `duration`: whole seconds through `sleep`, the rest through
    /// `usleep`. Seconds past `u32::MAX` are clamped.
    fn sleep_for(&mut self, duration: Duration) -> Result<()> {
        let seconds = u32::try_from(duration.as_secs()).unwrap_or(u32::MAX);
        if seconds > 0 && self.sleep(seconds)? > 0 {
            // Woken early; the remainder is moot
            return Ok(());
        }
        let usec = duration.subsec_micros();
        if usec > 0 {
            self.usleep(usec)?;
        }
        Ok(())
    }

    /// Current directory through a fixed 256-byte scratch buffer
    ///
    /// Longer paths fail however the host's `getcwd` reports it.
    fn cwd(&mut self) -> Result<String> {
        let mut scratch = [0u8; CWD_SCRATCH_LEN];
        self.getcwd(&mut scratch)
    }
}

/// The live façade over a host ABI
#[derive(Debug, Default)]
pub struct Bridge<H> {
    host: H,
}

impl<H: HostAbi> Bridge<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_inner(self) -> H {
        self.host
    }

    /// Sample the error register for the call that just failed
    fn last_error(&mut self, op: &'static str) -> Error {
        let errno = Errno(self.host.errno());
        log::trace!("{} failed: {}", op, errno);
        Error::Host(errno)
    }

    /// Map a `0 / negative` host status
    fn status(&mut self, op: &'static str, rc: i32) -> Result<()> {
        if rc < 0 {
            return Err(self.last_error(op));
        }
        Ok(())
    }
}

impl<H: HostAbi> Syscalls for Bridge<H> {
    fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> Result<Fd> {
        let cpath = codec::encode(path);
        let rc = self.host.open(&cpath, flags.bits(), mode);
        if rc < 0 {
            return Err(self.last_error("open"));
        }
        Ok(Fd::from_raw(rc))
    }

    fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.host.read(fd.raw(), buf);
        if n < 0 {
            return Err(self.last_error("read"));
        }
        Ok(n as usize)
    }

    fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.host.write(fd.raw(), buf);
        if n < 0 {
            return Err(self.last_error("write"));
        }
        Ok(n as usize)
    }

    fn close(&mut self, fd: Fd) -> Result<()> {
        let rc = self.host.close(fd.raw());
        self.status("close", rc)
    }

    fn unlink(&mut self, path: &str) -> Result<()> {
        let cpath = codec::encode(path);
        let rc = self.host.unlink(&cpath);
        self.status("unlink", rc)
    }

    fn mkdir(&mut self, path: &str, mode: u32) -> Result<()> {
        let cpath = codec::encode(path);
        let rc = self.host.mkdir(&cpath, mode);
        self.status("mkdir", rc)
    }

    fn chdir(&mut self, path: &str) -> Result<()> {
        let cpath = codec::encode(path);
        let rc = self.host.chdir(&cpath);
        self.status("chdir", rc)
    }

    fn getcwd(&mut self, buf: &mut [u8]) -> Result<String> {
        if buf.is_empty() {
            return Err(Error::ZeroSizedBuffer);
        }
        match self.host.getcwd(buf) {
            Some(path) => Ok(String::from_utf8_lossy(&path).into_owned()),
            None => Err(self.last_error("getcwd")),
        }
    }

    fn seek(&mut self, fd: Fd, offset: Off, whence: Whence) -> Result<Off> {
        let pos = self.host.lseek(fd.raw(), offset, whence.code());
        if pos < 0 {
            return Err(self.last_error("lseek"));
        }
        Ok(pos)
    }

    fn sleep(&mut self, seconds: u32) -> Result<u32> {
        Ok(self.host.sleep(seconds))
    }

    fn usleep(&mut self, usec: u32) -> Result<()> {
        let rc = self.host.usleep(usec);
        self.status("usleep", rc)
    }

    fn exit(&mut self, status: i32) -> Error {
        log::trace!("exit({})", status);
        self.host.exit(status)
    }

    fn abort(&mut self) -> Error {
        log::trace!("abort");
        self.host.abort()
    }

    fn describe(&mut self, err: &Error) -> String {
        match err {
            Error::Host(errno) => errno.describe(&mut self.host),
            other => other.to_string(),
        }
    }
}

/// Stand-in used when there is no host to talk to
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl Syscalls for Unsupported {
    fn open(&mut self, _path: &str, _flags: OpenFlags, _mode: u32) -> Result<Fd> {
        Err(Error::Unsupported)
    }

    fn read(&mut self, _fd: Fd, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::Unsupported)
    }

    fn write(&mut self, _fd: Fd, _buf: &[u8]) -> Result<usize> {
        Err(Error::Unsupported)
    }

    fn close(&mut self, _fd: Fd) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn unlink(&mut self, _path: &str) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn mkdir(&mut self, _path: &str, _mode: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn chdir(&mut self, _path: &str) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn getcwd(&mut self, _buf: &mut [u8]) -> Result<String> {
        Err(Error::Unsupported)
    }

    fn seek(&mut self, _fd: Fd, _offset: Off, _whence: Whence) -> Result<Off> {
        Err(Error::Unsupported)
    }

    fn sleep(&mut self, _seconds: u32) -> Result<u32> {
        Err(Error::Unsupported)
    }

    fn usleep(&mut self, _usec: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn exit(&mut self, _status: i32) -> Error {
        Error::Unsupported
    }

    fn abort(&mut self) -> Error {
        Error::Unsupported
    }

    /// Host codes cannot be described without a host
    fn describe(&mut self, err: &Error) -> String {
        match err {
            Error::Host(_) => UNSUPPORTED_TEXT.to_string(),
            other => other.to_string(),
        }
    }
}

/// The syscall implementation this build talks to
#[cfg(feature = "applet")]
pub type System = Bridge<crate::host::NativeHost>;

/// The syscall implementation this build talks to
#[cfg(not(feature = "applet"))]
pub type System = Unsupported;

/// Get the configured syscall implementation
pub fn system() -> System {
    System::default()
}

/// `fmt::Write` adapter over a descriptor
///
/// Each formatted piece goes out through `write_all`. The first failure is
/// kept so callers can report the real cause instead of `fmt::Error`.
pub struct FdWriter<'a, S: Syscalls + ?Sized> {
    sys: &'a mut S,
    fd: Fd,
    error: Option<Error>,
}

impl<'a, S: Syscalls + ?Sized> FdWriter<'a, S> {
    pub fn new(sys: &'a mut S, fd: Fd) -> Self {
        Self {
            sys,
            fd,
            error: None,
        }
    }

    /// The failure that stopped formatting, if any
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }
}

impl<S: Syscalls + ?Sized> fmt::Write for FdWriter<'_, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.sys.write_all(self.fd, s.as_bytes()).map_err(|e| {
            self.error = Some(e);
            fmt::Error
        })
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::abi::errno::{EBADF, EEXIST, EINVAL, ENOENT, ERANGE};
    use crate::sim::{SimHost, SimHostBuilder};
    use std::fmt::Write as _;

    fn bridge() -> Bridge<SimHost> {
        Bridge::new(SimHostBuilder::new().dir("/tmp").build())
    }

    #[test]
    fn test_open_missing_file_is_host_error() {
        let mut sys = bridge();
        let err = sys.open("/nope.txt", OpenFlags::RDONLY, 0).unwrap_err();
        assert_eq!(err, Error::Host(Errno(ENOENT)));
        assert_eq!(sys.describe(&err), "No such file or directory");
    }

    #[test]
    fn test_empty_read_skips_host() {
        let mut sys = bridge();
        let mut buf = [0u8; 0];
        assert_eq!(sys.read(Fd::from_raw(77), &mut buf), Ok(0));
        assert_eq!(sys.host().calls().read, 0);
    }

    #[test]
    fn test_empty_write_skips_host() {
        let mut sys = bridge();
        assert_eq!(sys.write(Fd::from_raw(77), b""), Ok(0));
        assert_eq!(sys.host().calls().write, 0);
    }

    #[test]
    fn test_read_bad_fd() {
        let mut sys = bridge();
        let mut buf = [0u8; 4];
        let err = sys.read(Fd::from_raw(42), &mut buf).unwrap_err();
        assert_eq!(err.errno(), Some(Errno(EBADF)));
    }

    #[test]
    fn test_getcwd_zero_sized_buffer_skips_host() {
        let mut sys = bridge();
        let mut buf = [0u8; 0];
        assert_eq!(sys.getcwd(&mut buf), Err(Error::ZeroSizedBuffer));
        assert_eq!(sys.host().calls().getcwd, 0);
    }

    #[test]
    fn test_getcwd_too_small_reports_range() {
        let mut sys = bridge();
        sys.chdir("/tmp").unwrap();
        let mut buf = [0u8; 4];
        let err = sys.getcwd(&mut buf).unwrap_err();
        assert_eq!(err, Error::Host(Errno(ERANGE)));
    }

    #[test]
    fn test_cwd_uses_scratch() {
        let mut sys = bridge();
        assert_eq!(sys.cwd().unwrap(), "/");
        sys.chdir("tmp").unwrap();
        assert_eq!(sys.cwd().unwrap(), "/tmp");
    }

    #[test]
    fn test_cwd_longer_than_scratch_fails() {
        let long = format!("/{}", "d".repeat(CWD_SCRATCH_LEN));
        let mut sys = Bridge::new(SimHostBuilder::new().dir(&long).cwd(&long).build());
        let err = sys.cwd().unwrap_err();
        assert_eq!(err.errno(), Some(Errno(ERANGE)));
    }

    #[test]
    fn test_mkdir_twice() {
        let mut sys = bridge();
        sys.mkdir("/tmp/a", 0o755).unwrap();
        let err = sys.mkdir("/tmp/a", 0o755).unwrap_err();
        assert_eq!(err.errno(), Some(Errno(EEXIST)));
    }

    #[test]
    fn test_write_all_over_partial_writes() {
        let host = SimHostBuilder::new().max_write(3).build();
        let mut sys = Bridge::new(host);
        let data = b"0123456789";
        sys.write_all(Fd::STDOUT, data).unwrap();
        assert_eq!(sys.host().stdout(), data);
        assert!(sys.host().calls().write <= data.len().div_ceil(3));
    }

    #[test]
    fn test_write_all_stall_is_short_write() {
        let host = SimHostBuilder::new().stalled_writes().build();
        let mut sys = Bridge::new(host);
        let err = sys.write_all(Fd::STDOUT, b"abc").unwrap_err();
        assert_eq!(err, Error::ShortWrite { remaining: 3 });
        assert_eq!(err.errno(), None);
    }

    #[test]
    fn test_write_all_empty_is_noop() {
        let mut sys = bridge();
        sys.write_all(Fd::STDOUT, b"").unwrap();
        assert_eq!(sys.host().calls().write, 0);
    }

    #[test]
    fn test_seek_on_stream_fails() {
        let mut sys = bridge();
        let err = sys.seek(Fd::STDOUT, 0, Whence::Set).unwrap_err();
        assert!(err.errno().is_some());
    }

    #[test]
    fn test_unsupported_fails_everything() {
        let mut sys = Unsupported;
        let mut buf = [0u8; 8];
        assert_eq!(sys.open("/a", OpenFlags::RDONLY, 0), Err(Error::Unsupported));
        assert_eq!(sys.read(Fd::STDIN, &mut buf), Err(Error::Unsupported));
        assert_eq!(sys.write(Fd::STDOUT, b"x"), Err(Error::Unsupported));
        assert_eq!(sys.write_all(Fd::STDOUT, b"x"), Err(Error::Unsupported));
        assert_eq!(sys.close(Fd::STDOUT), Err(Error::Unsupported));
        assert_eq!(sys.unlink("/a"), Err(Error::Unsupported));
        assert_eq!(sys.mkdir("/a", 0o755), Err(Error::Unsupported));
        assert_eq!(sys.chdir("/a"), Err(Error::Unsupported));
        assert_eq!(sys.getcwd(&mut buf), Err(Error::Unsupported));
        assert_eq!(sys.cwd(), Err(Error::Unsupported));
        assert_eq!(sys.seek(Fd::STDIN, 0, Whence::Set), Err(Error::Unsupported));
        assert_eq!(sys.sleep(1), Err(Error::Unsupported));
        assert_eq!(sys.usleep(10), Err(Error::Unsupported));
        assert_eq!(sys.sleep_for(Duration::from_millis(1500)), Err(Error::Unsupported));
        assert_eq!(sys.exit(0), Error::Unsupported);
        assert_eq!(sys.abort(), Error::Unsupported);
        assert_eq!(sys.describe(&Error::Unsupported), UNSUPPORTED_TEXT);
    }

    #[test]
    fn test_unsupported_describes_local_errors() {
        let mut sys = Unsupported;
        assert_eq!(
            sys.describe(&Error::ShortWrite { remaining: 5 }),
            "short write: 5 bytes left unwritten"
        );
        assert_eq!(sys.describe(&Error::ZeroSizedBuffer), "zero-sized buffer");
        assert_eq!(sys.describe(&Error::Host(Errno(ENOENT))), UNSUPPORTED_TEXT);
    }

    #[test]
    fn test_sleep_for_splits_duration() {
        let mut sys = bridge();
        sys.sleep_for(Duration::from_micros(2_250_000)).unwrap();
        let calls = *sys.host().calls();
        assert_eq!((calls.sleep, calls.usleep), (1, 1));
        assert_eq!(sys.host().slept(), Duration::from_micros(2_250_000));
    }

    #[test]
    fn test_sleep_for_whole_seconds_skips_usleep() {
        let mut sys = bridge();
        sys.sleep_for(Duration::from_secs(3)).unwrap();
        assert_eq!(sys.host().calls().usleep, 0);
        assert_eq!(sys.host().slept(), Duration::from_secs(3));
    }

    #[test]
    fn test_usleep_rejects_full_second() {
        let mut sys = bridge();
        let err = sys.usleep(1_000_000).unwrap_err();
        assert_eq!(err.errno(), Some(Errno(EINVAL)));
        assert_eq!(sys.host().slept(), Duration::ZERO);
    }

    #[cfg(not(feature = "applet"))]
    #[test]
    fn test_default_system_is_unsupported() {
        let mut sys = system();
        assert_eq!(sys.write_str(Fd::STDOUT, "hi"), Err(Error::Unsupported));
    }

    #[test]
    fn test_fd_writer_formats() {
        let mut sys = bridge();
        {
            let mut out = FdWriter::new(&mut sys, Fd::STDERR);
            write!(out, "{}: {}", "gotest", 42).unwrap();
            assert!(out.take_error().is_none());
        }
        assert_eq!(sys.host().stderr(), b"gotest: 42");
    }

    #[test]
    fn test_fd_writer_keeps_error() {
        let mut sys = Unsupported;
        let mut out = FdWriter::new(&mut sys, Fd::STDOUT);
        assert!(write!(out, "x").is_err());
        assert_eq!(out.take_error(), Some(Error::Unsupported));
    }
}
