//! Argument decoding
//!
//! The host calls `app_main(argc, argv)` with `argv` pointing at `argc`
//! pointer-sized words, each the address of a NUL-terminated string. The
//! layout is the conventional native one:
//!
//! ```text
//! argv ──► [ptr0][ptr1][ptr2] ... [ptr argc-1][null]
//!            │     │     │
//!            ▼     ▼     ▼
//!          "cat\0" "-n\0" "file.txt\0"
//! ```
//!
//! A null word inside the first `argc` decodes to an empty argument so that
//! positions stay aligned.

use std::borrow::Cow;
use std::ffi::c_char;
use std::{ptr, slice};

use crate::codec::{self, CBuf};

/// Decoded applet arguments, in invocation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    items: Vec<Vec<u8>>,
}

impl Args {
    /// Decode the host's `(argc, argv)` pair
    ///
    /// `argc <= 0` or a null `argv` yields no arguments.
    ///
    /// # Safety
    ///
    /// When `argc > 0` and `argv` is non-null, `argv` must point to at least
    /// `argc` readable pointer words, and each non-null word must address a
    /// NUL-terminated string. Both must stay valid for the duration of the
    /// call.
    pub unsafe fn from_raw(argc: i32, argv: *const *const c_char) -> Self {
        // SAFETY: forwarded from the caller
        match unsafe { ArgvView::from_raw(argc, argv) } {
            Some(view) => view.decode(),
            None => Self::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Raw bytes of one argument
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.items.get(index).map(Vec::as_slice)
    }

    /// One argument as text; invalid UTF-8 is replaced
    pub fn get_str(&self, index: usize) -> Option<Cow<'_, str>> {
        self.get(index).map(String::from_utf8_lossy)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.items.iter().map(Vec::as_slice)
    }

    /// All arguments as text; invalid UTF-8 is replaced
    pub fn to_strings(&self) -> Vec<String> {
        self.iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect()
    }
}

impl From<Vec<Vec<u8>>> for Args {
    fn from(items: Vec<Vec<u8>>) -> Self {
        Self { items }
    }
}

/// A bounded view over the host's pointer array
///
/// Built once at the boundary from `(argc, argv)`; afterwards every access
/// goes through the slice, never back through the raw pointer.
#[derive(Debug, Clone, Copy)]
pub struct ArgvView<'a> {
    words: &'a [*const c_char],
}

impl<'a> ArgvView<'a> {
    /// Returns `None` when there is nothing to decode
    ///
    /// # Safety
    ///
    /// Same contract as [`Args::from_raw`], for the lifetime `'a`.
    pub unsafe fn from_raw(argc: i32, argv: *const *const c_char) -> Option<Self> {
        if argc <= 0 || argv.is_null() {
            return None;
        }
        // SAFETY: argv covers argc words per the caller's contract
        let words = unsafe { slice::from_raw_parts(argv, argc as usize) };
        Some(Self { words })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Decode every word, null entries becoming empty arguments
    pub fn decode(&self) -> Args {
        let items = self
            .words
            .iter()
            // SAFETY: non-null words address NUL-terminated strings, as
            // promised when the view was built
            .map(|&p| unsafe { codec::decode_ptr(p) })
            .collect();
        Args { items }
    }
}

/// Owned `(argc, argv)` layout for handing arguments to an entry point
///
/// Strings are encoded once and the pointer array refers into them, followed
/// by a terminating null word. Slots given as `None` become null words.
pub struct ArgBlock {
    /// Keeps the pointed-to strings alive
    _strings: Vec<Option<CBuf>>,
    pointers: Vec<*const c_char>,
}

impl ArgBlock {
    /// Calculate the layout for given arguments
    pub fn new<S: AsRef<[u8]>>(args: &[S]) -> Self {
        let slots: Vec<Option<&[u8]>> = args.iter().map(|a| Some(a.as_ref())).collect();
        Self::with_slots(&slots)
    }

    /// Like `new`, with explicit null slots
    pub fn with_slots(slots: &[Option<&[u8]>]) -> Self {
        let strings: Vec<Option<CBuf>> = slots.iter().map(|s| s.map(codec::encode)).collect();
        let mut pointers: Vec<*const c_char> = strings
            .iter()
            .map(|s| s.as_ref().map_or(ptr::null(), CBuf::as_ptr))
            .collect();
        pointers.push(ptr::null());
        Self {
            _strings: strings,
            pointers,
        }
    }

    pub fn argc(&self) -> i32 {
        (self.pointers.len() - 1) as i32
    }

    /// Valid while `self` is alive
    pub fn argv(&self) -> *const *const c_char {
        self.pointers.as_ptr()
    }

    /// Decode the block back through the host-facing path
    pub fn decode(&self) -> Args {
        // SAFETY: the pointer array and strings are owned by self
        unsafe { Args::from_raw(self.argc(), self.argv()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_in_order() {
        let block = ArgBlock::new(&["cat", "-n", "file.txt"]);
        let args = block.decode();
        assert_eq!(args.len(), 3);
        assert_eq!(args.to_strings(), vec!["cat", "-n", "file.txt"]);
    }

    #[test]
    fn test_null_slots_become_empty() {
        let slots: Vec<Option<&[u8]>> = vec![
            Some(&b"prog"[..]),
            Some(&b"a"[..]),
            None,
            Some(&b"b"[..]),
            Some(&b"c"[..]),
            None,
            Some(&b"d"[..]),
        ];
        let block = ArgBlock::with_slots(&slots);
        let args = block.decode();

        assert_eq!(args.len(), 7);
        assert_eq!(args.get(2), Some(&b""[..]));
        assert_eq!(args.get(5), Some(&b""[..]));
        assert_eq!(args.to_strings(), vec!["prog", "a", "", "b", "c", "", "d"]);
    }

    #[test]
    fn test_zero_count_is_empty() {
        let block = ArgBlock::new(&["ignored"]);
        let args = unsafe { Args::from_raw(0, block.argv()) };
        assert!(args.is_empty());
    }

    #[test]
    fn test_negative_count_is_empty() {
        let block = ArgBlock::new(&["ignored"]);
        let args = unsafe { Args::from_raw(-3, block.argv()) };
        assert!(args.is_empty());
    }

    #[test]
    fn test_null_argv_is_empty() {
        let args = unsafe { Args::from_raw(4, ptr::null()) };
        assert!(args.is_empty());
        assert!(unsafe { ArgvView::from_raw(4, ptr::null()) }.is_none());
    }

    #[test]
    fn test_count_shorter_than_array() {
        let block = ArgBlock::new(&["one", "two", "three"]);
        let args = unsafe { Args::from_raw(2, block.argv()) };
        assert_eq!(args.to_strings(), vec!["one", "two"]);
    }

    #[test]
    fn test_block_is_null_terminated() {
        let block = ArgBlock::new(&["echo", "hello"]);
        assert_eq!(block.argc(), 2);
        let terminator = unsafe { *block.argv().add(2) };
        assert!(terminator.is_null());
    }

    #[test]
    fn test_non_utf8_argument() {
        let slots: Vec<Option<&[u8]>> = vec![Some(&[0x66u8, 0xff, 0x6f][..])];
        let args = ArgBlock::with_slots(&slots).decode();
        assert_eq!(args.get(0), Some(&[0x66, 0xff, 0x6f][..]));
        assert_eq!(args.get_str(0).unwrap(), "f\u{fffd}o");
    }

    #[test]
    fn test_embedded_nul_truncates_argument() {
        let args = ArgBlock::new(&[&b"ab\0cd"[..]]).decode();
        assert_eq!(args.get(0), Some(&b"ab"[..]));
    }

    #[test]
    fn test_view_len() {
        let block = ArgBlock::new(&["a", "b"]);
        let view = unsafe { ArgvView::from_raw(block.argc(), block.argv()) }.unwrap();
        assert_eq!(view.len(), 2);
        assert!(!view.is_empty());
    }
}
