//! Raw memory codec
//!
//! The host only understands NUL-terminated byte strings; everything on the
//! bridge side is length-delimited. These functions are the only place the
//! two representations meet.

use std::ffi::{CStr, c_char};

/// An encoded host string: the logical bytes followed by exactly one NUL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CBuf {
    bytes: Vec<u8>,
}

impl CBuf {
    /// Logical length, not counting the terminator
    pub fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pointer suitable for a `const char *` host parameter
    ///
    /// Valid for as long as `self` is alive and unmodified.
    pub fn as_ptr(&self) -> *const c_char {
        self.bytes.as_ptr().cast()
    }

    /// The encoded bytes, terminator included
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes
    }

    /// What the host will see: the bytes before the first NUL
    pub fn host_view(&self) -> &[u8] {
        decode_bytes(&self.bytes)
    }
}

/// Encode bytes for the host
///
/// The result is `input.len() + 1` bytes long. Embedded NULs are copied
/// as-is, so the host sees the string truncated at the first one.
pub fn encode(input: impl AsRef<[u8]>) -> CBuf {
    let input = input.as_ref();
    let mut bytes = Vec::with_capacity(input.len() + 1);
    bytes.extend_from_slice(input);
    bytes.push(0);
    CBuf { bytes }
}

/// Decode a host string held in a bridge-owned buffer
///
/// Stops at the first NUL. A buffer without one decodes in full, since the
/// slice bounds are known here.
pub fn decode_bytes(buf: &[u8]) -> &[u8] {
    match buf.iter().position(|&b| b == 0) {
        Some(end) => &buf[..end],
        None => buf,
    }
}

/// Decode a host string from a raw address
///
/// A null pointer decodes to an empty string.
///
/// # Safety
///
/// A non-null `ptr` must point to a readable, NUL-terminated byte sequence
/// that stays valid for the duration of the call.
pub unsafe fn decode_ptr(ptr: *const c_char) -> Vec<u8> {
    if ptr.is_null() {
        return Vec::new();
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract
    unsafe { CStr::from_ptr(ptr) }.to_bytes().to_vec()
}
