//! applet-bridge - syscall bridge for applets under a minimal C host ABI
//!
//! An applet is a compiled module loaded by a host runtime that exposes
//! only a handful of C functions (`write`, `open`, `getcwd`, `__errno`, ...)
//! and calls one exported `app_main(argc, argv)`. This crate turns that
//! surface into safe values: strings in, `Result`s out, typed errors, and
//! decoded arguments.
//!
//! Layers, leaves first:
//!
//! | Module    | Role                                                    |
//! |-----------|---------------------------------------------------------|
//! | `codec`   | NUL-terminated host strings ⇄ byte slices               |
//! | `error`   | error register values and their descriptions            |
//! | `host`    | the raw host primitives as a trait ([`HostAbi`])        |
//! | `syscall` | the safe façade ([`Syscalls`], [`Bridge`])              |
//! | `args`    | `(argc, argv)` decoding                                 |
//! | `io`      | console macros and [`applet_main!`]                     |
//! | `sim`     | in-memory host for tests and the simulator (`sim`)      |
//! | `applets` | sample applets                                          |
//!
//! Build variants:
//! - with the `applet` feature, [`System`] is a [`Bridge`] over the host's
//!   real imports;
//! - without it, [`System`] is [`Unsupported`] and every operation fails
//!   with [`Error::Unsupported`], so the crate builds and tests anywhere.
//!
//! ```ignore
//! use applet_bridge::{Args, Fd, Syscalls};
//!
//! fn main<S: Syscalls + ?Sized>(sys: &mut S, args: Args) -> i32 {
//!     match sys.write_all(Fd::STDOUT, b"hello\n") {
//!         Ok(()) => 0,
//!         Err(_) => 1,
//!     }
//! }
//!
//! applet_bridge::applet_main!(main);
//! ```

pub mod abi;
pub mod applets;
pub mod args;
pub mod codec;
pub mod error;
pub mod host;
pub mod io;
#[cfg(feature = "sim")]
pub mod sim;
pub mod syscall;

pub use abi::{Fd, OpenFlags, Whence};
pub use args::{ArgBlock, Args};
pub use error::{CommandResult, Errno, Error, Result};
pub use host::{HostAbi, Off};
#[cfg(feature = "sim")]
pub use sim::{SimHost, SimHostBuilder};
pub use syscall::{Bridge, FdWriter, Syscalls, System, Unsupported, system};

#[cfg(feature = "applet")]
pub use host::NativeHost;
