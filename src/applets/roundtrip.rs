//! roundtrip - file I/O self-test
//!
//! Writes a known line to a scratch file, reads it back and compares.
//! Takes the scratch path as its first argument, defaulting to
//! [`DEFAULT_PATH`]. Progress goes to stdout; the first failure is
//! reported on stderr as `roundtrip: <step>: <description>` and the applet
//! exits with 1.

use crate::abi::{Fd, OpenFlags};
use crate::args::Args;
use crate::error::Error;
use crate::io::write_fmt;
use crate::syscall::Syscalls;

pub const DEFAULT_PATH: &str = "/flash/roundtrip_test.txt";

/// The line written and expected back
pub const PAYLOAD: &[u8] = b"hello from roundtrip\n";

const READ_BUF_LEN: usize = 64;

/// Why the self-test stopped
enum Failure {
    Step(&'static str, Error),
    Check(&'static str),
}

pub fn run<S: Syscalls + ?Sized>(sys: &mut S, args: Args) -> i32 {
    let _ = sys.write_all(Fd::STDOUT, b"roundtrip: start\n");

    let failure = match check(sys, &args) {
        Ok(()) => {
            let _ = sys.write_all(Fd::STDOUT, b"roundtrip: OK\n");
            return 0;
        }
        Err(failure) => failure,
    };

    let message = match failure {
        Failure::Step(step, err) => format!("{}: {}", step, sys.describe(&err)),
        Failure::Check(what) => what.to_string(),
    };
    let _ = write_fmt(sys, Fd::STDERR, format_args!("roundtrip: {}\n", message));
    1
}

fn check<S: Syscalls + ?Sized>(sys: &mut S, args: &Args) -> Result<(), Failure> {
    if args.is_empty() {
        return Err(Failure::Check("empty argv"));
    }

    if let Ok(cwd) = sys.cwd() {
        let _ = write_fmt(sys, Fd::STDOUT, format_args!("cwd: {}\n", cwd));
    }

    let path = args.get_str(1).map_or_else(|| DEFAULT_PATH.to_string(), |p| p.into_owned());

    // A leftover from an earlier run is fine; a missing file is too
    let _ = sys.unlink(&path);

    let flags = OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC;
    let fd = sys
        .open(&path, flags, 0o644)
        .map_err(|e| Failure::Step("open(O_WRONLY|O_CREAT|O_TRUNC)", e))?;
    if let Err(e) = sys.write_all(fd, PAYLOAD) {
        let _ = sys.close(fd);
        return Err(Failure::Step("write", e));
    }
    sys.close(fd)
        .map_err(|e| Failure::Step("close(write fd)", e))?;

    let fd = sys
        .open(&path, OpenFlags::RDONLY, 0)
        .map_err(|e| Failure::Step("open(O_RDONLY)", e))?;
    let mut buf = [0u8; READ_BUF_LEN];
    let read = sys.read(fd, &mut buf);
    let _ = sys.close(fd);
    let n = read.map_err(|e| Failure::Step("read", e))?;

    if &buf[..n] != PAYLOAD {
        return Err(Failure::Check("content mismatch"));
    }
    Ok(())
}
