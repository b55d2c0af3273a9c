//! Console output and the applet entry point
//!
//! The `hprint!` family formats to the standard streams of the configured
//! [`System`](crate::System). Console output has nobody to report a failure
//! to, so these macros drop write errors; everything else in the crate
//! returns them. Use [`write_fmt`] when the caller does care.
//!
//! [`applet_main!`](crate::applet_main) emits the exported `app_main` symbol
//! the host looks up, decodes the argument block and hands control to a
//! function generic over [`Syscalls`].

use std::fmt;

use crate::abi::Fd;
use crate::error::Result;
use crate::syscall::{FdWriter, Syscalls, system};

/// Format `args` to `fd` through `write_all`
///
/// Returns the first bridge error. A `Display` impl that fails on its own
/// stops formatting without producing an error here.
pub fn write_fmt<S: Syscalls + ?Sized>(sys: &mut S, fd: Fd, args: fmt::Arguments<'_>) -> Result<()> {
    let mut out = FdWriter::new(sys, fd);
    match fmt::Write::write_fmt(&mut out, args) {
        Ok(()) => Ok(()),
        Err(_) => out.take_error().map_or(Ok(()), Err),
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    let _ = write_fmt(&mut system(), Fd::STDOUT, args);
}

#[doc(hidden)]
pub fn _eprint(args: fmt::Arguments<'_>) {
    let _ = write_fmt(&mut system(), Fd::STDERR, args);
}

/// Print to the host's stdout
#[macro_export]
macro_rules! hprint {
    ($($arg:tt)*) => {
        $crate::io::_print(format_args!($($arg)*))
    };
}

/// Print to the host's stdout, with a newline
#[macro_export]
macro_rules! hprintln {
    () => {
        $crate::hprint!("\n")
    };
    ($($arg:tt)*) => {
        $crate::io::_print(format_args!("{}\n", format_args!($($arg)*)))
    };
}

/// Print to the host's stderr
#[macro_export]
macro_rules! heprint {
    ($($arg:tt)*) => {
        $crate::io::_eprint(format_args!($($arg)*))
    };
}

/// Print to the host's stderr, with a newline
#[macro_export]
macro_rules! heprintln {
    () => {
        $crate::heprint!("\n")
    };
    ($($arg:tt)*) => {
        $crate::io::_eprint(format_args!("{}\n", format_args!($($arg)*)))
    };
}

/// Export `app_main` for the host, running `$main` with decoded arguments
///
/// `$main` has the shape `fn(&mut S, Args) -> i32` for some `S: Syscalls`;
/// it receives the build's [`System`](crate::System).
///
/// ```ignore
/// fn main<S: Syscalls + ?Sized>(sys: &mut S, args: Args) -> i32 {
///     0
/// }
///
/// applet_bridge::applet_main!(main);
/// ```
#[macro_export]
macro_rules! applet_main {
    ($main:path) => {
        /// Entry point called once by the host
        ///
        /// # Safety
        ///
        /// `argv` must hold `argc` pointer words, each null or addressing a
        /// NUL-terminated string, valid for the duration of the call.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn app_main(
            argc: i32,
            argv: *const *const ::core::ffi::c_char,
        ) -> i32 {
            // SAFETY: forwarded from the host's calling convention
            let args = unsafe { $crate::Args::from_raw(argc, argv) };
            let mut sys = $crate::system();
            $main(&mut sys, args)
        }
    };
}
