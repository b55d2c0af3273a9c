//! Live host imports
//!
//! Only compiled for applet builds. Every function here is a direct call
//! into the host; pointers never outlive the call that receives them.

use std::ffi::{c_char, c_int, c_uint, c_void};

use super::{HostAbi, Off};
use crate::codec::{self, CBuf};

#[allow(non_camel_case_types)]
mod sys {
    use super::*;

    pub type size_t = usize;
    pub type ssize_t = isize;

    #[cfg_attr(target_arch = "wasm32", link(wasm_import_module = "env"))]
    unsafe extern "C" {
        pub fn write(fd: c_int, buf: *const c_void, count: size_t) -> ssize_t;
        pub fn read(fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t;
        pub fn open(path: *const c_char, flags: c_int, mode: c_int) -> c_int;
        pub fn close(fd: c_int) -> c_int;
        pub fn unlink(path: *const c_char) -> c_int;
        pub fn mkdir(path: *const c_char, mode: c_uint) -> c_int;
        pub fn chdir(path: *const c_char) -> c_int;
        pub fn getcwd(buf: *mut c_char, size: size_t) -> *mut c_char;
        pub fn lseek(fd: c_int, offset: Off, whence: c_int) -> Off;

        // Job-local error register
        pub fn __errno() -> *mut c_int;
        pub fn strerror(errnum: c_int) -> *const c_char;

        pub fn sleep(seconds: c_uint) -> c_uint;
        pub fn usleep(usec: c_uint) -> c_int;

        // Both unwind back to the host's loader
        pub fn exit(status: c_int) -> !;
        pub fn abort() -> !;
    }
}

/// The host runtime the applet is loaded into
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeHost;

impl HostAbi for NativeHost {
    fn write(&mut self, fd: i32, buf: &[u8]) -> isize {
        // SAFETY: buf is valid for buf.len() bytes for the whole call
        unsafe { sys::write(fd, buf.as_ptr().cast(), buf.len()) }
    }

    fn read(&mut self, fd: i32, buf: &mut [u8]) -> isize {
        // SAFETY: buf is writable for buf.len() bytes for the whole call
        unsafe { sys::read(fd, buf.as_mut_ptr().cast(), buf.len()) }
    }

    fn open(&mut self, path: &CBuf, flags: i32, mode: u32) -> i32 {
        // SAFETY: CBuf is always NUL-terminated
        unsafe { sys::open(path.as_ptr(), flags, mode as c_int) }
    }

    fn close(&mut self, fd: i32) -> i32 {
        // SAFETY: plain integer argument, no memory is shared
        unsafe { sys::close(fd) }
    }

    fn unlink(&mut self, path: &CBuf) -> i32 {
        // SAFETY: CBuf is always NUL-terminated and outlives the call
        unsafe { sys::unlink(path.as_ptr()) }
    }

    fn mkdir(&mut self, path: &CBuf, mode: u32) -> i32 {
        // SAFETY: CBuf is always NUL-terminated and outlives the call
        unsafe { sys::mkdir(path.as_ptr(), mode) }
    }

    fn chdir(&mut self, path: &CBuf) -> i32 {
        // SAFETY: CBuf is always NUL-terminated and outlives the call
        unsafe { sys::chdir(path.as_ptr()) }
    }

    fn getcwd(&mut self, buf: &mut [u8]) -> Option<Vec<u8>> {
        // SAFETY: buf is writable for buf.len() bytes; on success the host
        // returns a NUL-terminated string inside it
        unsafe {
            let p = sys::getcwd(buf.as_mut_ptr().cast(), buf.len());
            if p.is_null() {
                None
            } else {
                Some(codec::decode_ptr(p))
            }
        }
    }

    fn lseek(&mut self, fd: i32, offset: Off, whence: i32) -> Off {
        // SAFETY: plain integer arguments, no memory is shared
        unsafe { sys::lseek(fd, offset, whence) }
    }

    fn errno(&mut self) -> i32 {
        // SAFETY: the host returns either null or its live register
        unsafe {
            let p = sys::__errno();
            if p.is_null() { 0 } else { *p }
        }
    }

    fn strerror(&mut self, code: i32) -> Option<Vec<u8>> {
        // SAFETY: the host returns either null or a static C string
        unsafe {
            let p = sys::strerror(code);
            if p.is_null() {
                None
            } else {
                Some(codec::decode_ptr(p))
            }
        }
    }

    fn sleep(&mut self, seconds: u32) -> u32 {
        // SAFETY: plain integer argument, no memory is shared
        unsafe { sys::sleep(seconds) }
    }

    fn usleep(&mut self, usec: u32) -> i32 {
        // SAFETY: plain integer argument, no memory is shared
        unsafe { sys::usleep(usec) }
    }

    fn exit(&mut self, status: i32) -> ! {
        // SAFETY: the host tears the applet down; nothing on this side runs
        // afterwards
        unsafe { sys::exit(status) }
    }

    fn abort(&mut self) -> ! {
        // SAFETY: as for exit
        unsafe { sys::abort() }
    }
}
