//! Sample applets
//!
//! Small programs written against [`Syscalls`] only, so the same code runs
//! under a live host, the simulator, or the unsupported fallback.

use crate::args::Args;
use crate::syscall::Syscalls;

pub mod argv_dump;
pub mod roundtrip;

/// Signature every registered applet is callable through
pub type AppletFn = fn(&mut dyn Syscalls, Args) -> i32;

fn run_argv_dump(sys: &mut dyn Syscalls, args: Args) -> i32 {
    argv_dump::run(sys, args)
}

fn run_roundtrip(sys: &mut dyn Syscalls, args: Args) -> i32 {
    roundtrip::run(sys, args)
}

/// Registered applets, by name
pub const APPLETS: &[(&str, AppletFn)] = &[
    ("argv_dump", run_argv_dump),
    ("roundtrip", run_roundtrip),
];

/// Look up an applet by name
pub fn find(name: &str) -> Option<AppletFn> {
    APPLETS
        .iter()
        .find(|(applet, _)| *applet == name)
        .map(|(_, f)| *f)
}

/// Names of all registered applets
pub fn names() -> impl Iterator<Item = &'static str> {
    APPLETS.iter().map(|(name, _)| *name)
}
