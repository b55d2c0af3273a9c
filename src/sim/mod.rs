//! Simulated host
//!
//! An in-memory, POSIX-flavoured implementation of [`HostAbi`] used by the
//! test suite and the `applet-sim` binary. It keeps the host's conventions
//! intact: failing primitives return a negative value (or `None`) and leave
//! the reason in an error register that stays put until the next failure.
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ SimHost                                    │
//! │  descriptors: Slab<OpenFile>  0 1 2 3 ...  │
//! │  fs: MemoryFs        cwd: "/tmp"           │
//! │  stdin ─► read(0)    write(1) ─► stdout    │
//! │  errno: i32          write(2) ─► stderr    │
//! └────────────────────────────────────────────┘
//! ```
//!
//! Two knobs shape writes for exercising retry logic: a per-call cap on
//! accepted bytes, and stalled writes that accept nothing without touching
//! the error register.
//!
//! Sleeping advances a virtual clock instead of blocking. `exit` and `abort`
//! unwind out of the applet the way the real loader does; [`SimHost::run`]
//! catches that and reports the status.

pub mod fs;

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use slab::Slab;

use crate::abi::errno::{
    EACCES, EBADF, EEXIST, EFBIG, EINVAL, EIO, EISDIR, ENOENT, ENOTDIR, EOVERFLOW, EPERM, ERANGE,
    ESPIPE,
};
use crate::abi::{OpenFlags, Whence};
use crate::args::{ArgBlock, Args};
use crate::codec::{self, CBuf};
use crate::error::CommandResult;
use crate::host::{HostAbi, Off};
use crate::syscall::{Bridge, Syscalls};

pub use fs::{FsSnapshot, MemoryFs, Node};

/// Host-side description for a code, like the C library's table
pub fn strerror_text(code: i32) -> Option<&'static str> {
    let text = match code {
        EPERM => "Operation not permitted",
        ENOENT => "No such file or directory",
        EIO => "Input/output error",
        EBADF => "Bad file descriptor",
        EACCES => "Permission denied",
        EEXIST => "File exists",
        ENOTDIR => "Not a directory",
        EISDIR => "Is a directory",
        EINVAL => "Invalid argument",
        EFBIG => "File too large",
        ESPIPE => "Illegal seek",
        ERANGE => "Numerical result out of range",
        EOVERFLOW => "Value too large for defined data type",
        _ => return None,
    };
    Some(text)
}

/// An entry in the descriptor table
#[derive(Debug, Clone, PartialEq, Eq)]
enum OpenFile {
    Stdin,
    Stdout,
    Stderr,
    File {
        path: String,
        position: u64,
        flags: OpenFlags,
    },
}

/// How many times each primitive was invoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub write: usize,
    pub read: usize,
    pub open: usize,
    pub close: usize,
    pub unlink: usize,
    pub mkdir: usize,
    pub chdir: usize,
    pub getcwd: usize,
    pub lseek: usize,
    pub errno: usize,
    pub strerror: usize,
    pub sleep: usize,
    pub usleep: usize,
    pub exit: usize,
    pub abort: usize,
}

/// Exit status reported for `abort`, as a shell shows SIGABRT
pub const ABORT_STATUS: i32 = 134;

/// Unwind payload carrying the status of `exit` or `abort`
struct Termination(i32);

/// In-memory host runtime
#[derive(Debug)]
pub struct SimHost {
    fs: MemoryFs,
    cwd: String,

    /// Descriptor table; keys are the descriptors handed out
    files: Slab<OpenFile>,

    /// The error register
    errno: i32,

    stdin: Vec<u8>,
    stdin_pos: usize,
    stdout: Vec<u8>,
    stderr: Vec<u8>,

    /// Upper bound on bytes accepted per write
    max_write: Option<usize>,

    /// Accept zero bytes on every write
    stalled: bool,

    /// Virtual clock advanced by sleep and usleep
    slept: Duration,

    calls: CallCounts,
}

impl SimHost {
    /// Empty filesystem, cwd `/`, no fault injection
    pub fn new() -> Self {
        SimHostBuilder::new().build()
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    pub fn reset_calls(&mut self) {
        self.calls = CallCounts::default();
    }

    /// Current value of the error register, without counting as a call
    pub fn last_errno(&self) -> i32 {
        self.errno
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn take_stdout(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.stdout)
    }

    pub fn take_stderr(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.stderr)
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn fs(&self) -> &MemoryFs {
        &self.fs
    }

    /// Contents of a file, with `path` resolved against the cwd
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        MemoryFs::resolve(&self.cwd, path).and_then(|p| self.fs.contents(&p))
    }

    pub fn exists(&self, path: &str) -> bool {
        MemoryFs::resolve(&self.cwd, path).is_some_and(|p| self.fs.exists(&p))
    }

    /// Permission bits a file or directory was created with
    pub fn mode_of(&self, path: &str) -> Option<u32> {
        let path = MemoryFs::resolve(&self.cwd, path)?;
        self.fs.get(&path).map(Node::mode)
    }

    /// Total time the applet asked to sleep
    pub fn slept(&self) -> Duration {
        self.slept
    }

    /// Number of open descriptors, standard streams included
    pub fn open_descriptors(&self) -> usize {
        self.files.len()
    }

    /// Serialize the filesystem
    pub fn to_json(&self) -> serde_json::Result<String> {
        self.fs.to_json()
    }

    /// Run an applet against this host
    ///
    /// Arguments are laid out as a native `(argc, argv)` block and decoded
    /// through the same path the entry point uses. Captured output is moved
    /// into the result; the filesystem keeps whatever the applet left.
    ///
    /// An applet that calls `exit` or `abort` stops there and the status it
    /// passed becomes the exit code. Any other panic propagates.
    pub fn run<F>(&mut self, args: &[&str], applet: F) -> CommandResult
    where
        F: FnOnce(&mut dyn Syscalls, Args) -> i32,
    {
        let block = ArgBlock::new(args);
        let args = block.decode();
        log::debug!("run: argc={} argv={:?}", args.len(), args.to_strings());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut bridge = Bridge::new(&mut *self);
            applet(&mut bridge, args)
        }));
        let exit_code = match outcome {
            Ok(code) => code,
            Err(payload) => match payload.downcast::<Termination>() {
                Ok(termination) => termination.0,
                Err(other) => panic::resume_unwind(other),
            },
        };
        log::debug!("run: exit code {}", exit_code);

        CommandResult {
            exit_code,
            stdout: self.take_stdout(),
            stderr: self.take_stderr(),
        }
    }

    /// Load `code` into the error register and return the failure value
    fn fail(&mut self, code: i32) -> i32 {
        self.errno = code;
        -1
    }

    fn resolve(&self, path: &CBuf) -> Option<String> {
        let raw = String::from_utf8_lossy(path.host_view());
        MemoryFs::resolve(&self.cwd, &raw)
    }

    fn entry(&self, fd: i32) -> Option<&OpenFile> {
        usize::try_from(fd).ok().and_then(|key| self.files.get(key))
    }

    fn set_position(&mut self, fd: i32, to: u64) {
        if let Some(OpenFile::File { position, .. }) = self.files.get_mut(fd as usize) {
            *position = to;
        }
    }

    fn read_stdin(&mut self, buf: &mut [u8]) -> usize {
        let remaining = self.stdin.len() - self.stdin_pos;
        let to_read = remaining.min(buf.len());
        buf[..to_read].copy_from_slice(&self.stdin[self.stdin_pos..self.stdin_pos + to_read]);
        self.stdin_pos += to_read;
        to_read
    }
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostAbi for SimHost {
    fn write(&mut self, fd: i32, buf: &[u8]) -> isize {
        self.calls.write += 1;
        let entry = match self.entry(fd).cloned() {
            Some(OpenFile::Stdin) | None => return self.fail(EBADF) as isize,
            Some(entry) => entry,
        };
        if self.stalled {
            return 0;
        }
        let chunk = match self.max_write {
            Some(cap) => &buf[..buf.len().min(cap)],
            None => buf,
        };

        match entry {
            OpenFile::Stdout => self.stdout.extend_from_slice(chunk),
            OpenFile::Stderr => self.stderr.extend_from_slice(chunk),
            OpenFile::File {
                path,
                position,
                flags,
            } => {
                if !flags.is_write() {
                    return self.fail(EBADF) as isize;
                }
                let at = if flags.is_append() {
                    self.fs.len(&path).unwrap_or(0)
                } else {
                    position
                };
                if let Err(code) = self.fs.write_at(&path, at, chunk) {
                    return self.fail(code) as isize;
                }
                self.set_position(fd, at + chunk.len() as u64);
            }
            OpenFile::Stdin => return self.fail(EBADF) as isize,
        }
        chunk.len() as isize
    }

    fn read(&mut self, fd: i32, buf: &mut [u8]) -> isize {
        self.calls.read += 1;
        match self.entry(fd).cloned() {
            Some(OpenFile::Stdin) => self.read_stdin(buf) as isize,
            Some(OpenFile::File {
                path,
                position,
                flags,
            }) if flags.is_read() => {
                let n = self.fs.read_at(&path, position, buf);
                self.set_position(fd, position + n as u64);
                n as isize
            }
            _ => self.fail(EBADF) as isize,
        }
    }

    fn open(&mut self, path: &CBuf, flags: i32, mode: u32) -> i32 {
        self.calls.open += 1;
        let flags = OpenFlags(flags);
        if flags.access_mode().bits() == OpenFlags::ACCESS_MASK {
            return self.fail(EINVAL);
        }
        let Some(path) = self.resolve(path) else {
            return self.fail(ENOENT);
        };

        match self.fs.get(&path).map(Node::is_dir) {
            Some(true) => return self.fail(EISDIR),
            Some(false) => {
                if flags.is_create() && flags.is_exclusive() {
                    return self.fail(EEXIST);
                }
                if flags.is_truncate() && flags.is_write() {
                    if let Err(code) = self.fs.truncate(&path) {
                        return self.fail(code);
                    }
                }
            }
            None => {
                if !flags.is_create() {
                    return self.fail(ENOENT);
                }
                if let Err(code) = self.fs.create_file(&path, mode) {
                    return self.fail(code);
                }
            }
        }

        let fd = self.files.insert(OpenFile::File {
            path,
            position: 0,
            flags,
        });
        fd as i32
    }

    fn close(&mut self, fd: i32) -> i32 {
        self.calls.close += 1;
        if self.entry(fd).is_none() {
            return self.fail(EBADF);
        }
        self.files.remove(fd as usize);
        0
    }

    fn unlink(&mut self, path: &CBuf) -> i32 {
        self.calls.unlink += 1;
        let Some(path) = self.resolve(path) else {
            return self.fail(ENOENT);
        };
        match self.fs.remove_file(&path) {
            Ok(()) => 0,
            Err(code) => self.fail(code),
        }
    }

    fn mkdir(&mut self, path: &CBuf, mode: u32) -> i32 {
        self.calls.mkdir += 1;
        let Some(path) = self.resolve(path) else {
            return self.fail(ENOENT);
        };
        match self.fs.create_dir(&path, mode) {
            Ok(()) => 0,
            Err(code) => self.fail(code),
        }
    }

    fn chdir(&mut self, path: &CBuf) -> i32 {
        self.calls.chdir += 1;
        let Some(path) = self.resolve(path) else {
            return self.fail(ENOENT);
        };
        match self.fs.get(&path).map(Node::is_dir) {
            Some(true) => {
                self.cwd = path;
                0
            }
            Some(false) => self.fail(ENOTDIR),
            None => self.fail(ENOENT),
        }
    }

    fn getcwd(&mut self, buf: &mut [u8]) -> Option<Vec<u8>> {
        self.calls.getcwd += 1;
        if buf.is_empty() {
            self.fail(EINVAL);
            return None;
        }
        let len = self.cwd.len();
        if len + 1 > buf.len() {
            self.fail(ERANGE);
            return None;
        }
        buf[..len].copy_from_slice(self.cwd.as_bytes());
        buf[len] = 0;
        Some(codec::decode_bytes(buf).to_vec())
    }

    fn lseek(&mut self, fd: i32, offset: Off, whence: i32) -> Off {
        self.calls.lseek += 1;
        let (path, position) = match self.entry(fd).cloned() {
            Some(OpenFile::File { path, position, .. }) => (path, position),
            Some(_) => return self.fail(ESPIPE) as Off,
            None => return self.fail(EBADF) as Off,
        };
        let base = match Whence::from_code(whence) {
            Some(Whence::Set) => 0,
            Some(Whence::Cur) => position as i64,
            Some(Whence::End) => self.fs.len(&path).unwrap_or(0) as i64,
            None => return self.fail(EINVAL) as Off,
        };
        let Some(target) = base.checked_add(i64::from(offset)) else {
            return self.fail(EOVERFLOW) as Off;
        };
        if target < 0 {
            return self.fail(EINVAL) as Off;
        }
        let Ok(result) = Off::try_from(target) else {
            return self.fail(EOVERFLOW) as Off;
        };
        self.set_position(fd, target as u64);
        result
    }

    fn errno(&mut self) -> i32 {
        self.calls.errno += 1;
        self.errno
    }

    fn strerror(&mut self, code: i32) -> Option<Vec<u8>> {
        self.calls.strerror += 1;
        strerror_text(code).map(|text| text.as_bytes().to_vec())
    }

    fn sleep(&mut self, seconds: u32) -> u32 {
        self.calls.sleep += 1;
        self.slept += Duration::from_secs(u64::from(seconds));
        0
    }

    fn usleep(&mut self, usec: u32) -> i32 {
        self.calls.usleep += 1;
        if usec >= 1_000_000 {
            return self.fail(EINVAL);
        }
        self.slept += Duration::from_micros(u64::from(usec));
        0
    }

    fn exit(&mut self, status: i32) -> ! {
        self.calls.exit += 1;
        panic::resume_unwind(Box::new(Termination(status)))
    }

    fn abort(&mut self) -> ! {
        self.calls.abort += 1;
        panic::resume_unwind(Box::new(Termination(ABORT_STATUS)))
    }
}

/// Builder for [`SimHost`]
///
/// ```ignore
/// let host = SimHostBuilder::new()
///     .dir("/tmp")
///     .file("/etc/motd", b"hello\n")
///     .cwd("/tmp")
///     .max_write(3)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct SimHostBuilder {
    fs: MemoryFs,
    cwd: String,
    stdin: Vec<u8>,
    max_write: Option<usize>,
    stalled: bool,
}

impl SimHostBuilder {
    pub fn new() -> Self {
        Self {
            fs: MemoryFs::new(),
            cwd: "/".to_string(),
            stdin: Vec::new(),
            max_write: None,
            stalled: false,
        }
    }

    /// Start from a JSON filesystem snapshot, replacing anything seeded so far
    pub fn snapshot_json(mut self, json: &str) -> serde_json::Result<Self> {
        self.fs = MemoryFs::from_json(json)?;
        Ok(self)
    }

    /// Working directory; created on `build` if missing
    pub fn cwd(mut self, path: &str) -> Self {
        self.cwd = MemoryFs::resolve("/", path).unwrap_or_else(|| "/".to_string());
        self
    }

    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = data.into();
        self
    }

    /// Seed a directory and its ancestors
    pub fn dir(mut self, path: &str) -> Self {
        if let Some(path) = MemoryFs::resolve("/", path) {
            if let Err(code) = self.fs.create_dir_all(&path) {
                log::warn!("sim: cannot seed directory {}: errno={}", path, code);
            }
        }
        self
    }

    /// Seed a file, creating its parent directories
    pub fn file(mut self, path: &str, data: impl AsRef<[u8]>) -> Self {
        if let Some(path) = MemoryFs::resolve("/", path) {
            if let Err(code) = self.fs.put_file(&path, data.as_ref()) {
                log::warn!("sim: cannot seed file {}: errno={}", path, code);
            }
        }
        self
    }

    /// Accept at most `cap` bytes per write call
    pub fn max_write(mut self, cap: usize) -> Self {
        self.max_write = Some(cap);
        self
    }

    /// Every write accepts zero bytes and leaves the error register alone
    pub fn stalled_writes(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn build(mut self) -> SimHost {
        if let Err(code) = self.fs.create_dir_all(&self.cwd) {
            log::warn!("sim: cannot create cwd {}: errno={}; using /", self.cwd, code);
            self.cwd = "/".to_string();
        }

        let mut files = Slab::new();
        files.insert(OpenFile::Stdin);
        files.insert(OpenFile::Stdout);
        files.insert(OpenFile::Stderr);

        SimHost {
            fs: self.fs,
            cwd: self.cwd,
            files,
            errno: 0,
            stdin: self.stdin,
            stdin_pos: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
            max_write: self.max_write,
            stalled: self.stalled,
            slept: Duration::ZERO,
            calls: CallCounts::default(),
        }
    }
}

impl Default for SimHostBuilder {
    fn default() -> Self {
        Self::new()
    }
}
