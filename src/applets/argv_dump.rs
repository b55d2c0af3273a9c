//! argv_dump - print each argument with its index
//!
//! ```text
//! argv_dump: argv
//! 0: argv_dump
//! 1: first
//! ```

use crate::abi::Fd;
use crate::args::Args;
use crate::error::Result;
use crate::io::write_fmt;
use crate::syscall::Syscalls;

pub fn run<S: Syscalls + ?Sized>(sys: &mut S, args: Args) -> i32 {
    match dump(sys, &args) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn dump<S: Syscalls + ?Sized>(sys: &mut S, args: &Args) -> Result<()> {
    sys.write_all(Fd::STDOUT, b"argv_dump: argv\n")?;
    for (i, arg) in args.iter().enumerate() {
        write_fmt(sys, Fd::STDOUT, format_args!("{}: ", i))?;
        sys.write_all(Fd::STDOUT, arg)?;
        sys.write_all(Fd::STDOUT, b"\n")?;
    }
    Ok(())
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::sim::SimHost;
    use crate::syscall::Unsupported;

    #[test]
    fn test_dump() {
        let mut host = SimHost::new();
        let result = host.run(&["argv_dump", "x", "y z"], |sys, args| run(sys, args));
        assert!(result.is_success());
        assert_eq!(
            result.stdout_str(),
            "argv_dump: argv\n0: argv_dump\n1: x\n2: y z\n"
        );
    }

    #[test]
    fn test_dump_without_args() {
        let mut host = SimHost::new();
        let result = host.run(&[], |sys, args| run(sys, args));
        assert_eq!(result.stdout_str(), "argv_dump: argv\n");
    }

    #[test]
    fn test_dump_fails_without_host() {
        assert_eq!(run(&mut Unsupported, Args::default()), 1);
    }
}
