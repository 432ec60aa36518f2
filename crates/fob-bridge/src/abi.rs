//! `#[repr(C)]` layouts shared with foreign code.
//!
//! Everything here mirrors `include/fob_bridge.h`. Strings are a pointer and a
//! byte length with no terminator; an empty string is `(NULL, 0)`. Arrays
//! follow the same rule. Structures emitted by the bridge stay owned by the
//! bridge until they are passed to their destroy function. Structures passed
//! in by foreign code (hook payloads) stay owned by the caller.

use std::ffi::{c_char, c_void};
use std::ptr;

use crate::handle::Handle;

/// Borrowed or owned UTF-8 text, not NUL terminated.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Str {
    pub data: *const c_char,
    pub len: usize,
}

impl Str {
    pub const EMPTY: Str = Str {
        data: ptr::null(),
        len: 0,
    };

    /// View a Rust string without copying. The caller keeps it alive.
    pub fn borrowed(s: &str) -> Str {
        if s.is_empty() {
            Str::EMPTY
        } else {
            Str {
                data: s.as_ptr().cast(),
                len: s.len(),
            }
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct Location {
    pub file: Str,
    pub namespace: Str,
    pub line: i64,
    pub column: i64,
    pub length: i64,
    pub line_text: Str,
    pub suggestion: Str,
}

#[repr(C)]
#[derive(Debug)]
pub struct Note {
    pub text: Str,
    /// Null when the note has no location.
    pub location: *mut Location,
}

#[repr(C)]
#[derive(Debug)]
pub struct Message {
    pub id: Str,
    pub plugin_name: Str,
    pub text: Str,
    pub location: *mut Location,
    pub notes: *mut Note,
    pub notes_len: usize,
}

#[repr(C)]
#[derive(Debug)]
pub struct OutputFile {
    pub path: Str,
    pub hash: Str,
    pub contents: *const u8,
    pub contents_len: usize,
}

#[repr(C)]
#[derive(Debug)]
pub struct BuildResult {
    pub output_files: *mut OutputFile,
    pub output_files_len: usize,
    pub errors: *mut Message,
    pub errors_len: usize,
    pub warnings: *mut Message,
    pub warnings_len: usize,
}

/// Result of `fob_context_create`, returned by value.
#[repr(C)]
#[derive(Debug)]
pub struct ContextResult {
    pub is_err: bool,
    pub errors: *mut Message,
    pub errors_len: usize,
}

/// Diagnostics returned by a foreign hook. Owned by the foreign side, which
/// gets it back through the hook's release callback when it registered one.
#[repr(C)]
#[derive(Debug)]
pub struct HookResult {
    pub errors: *const Message,
    pub errors_len: usize,
    pub warnings: *const Message,
    pub warnings_len: usize,
}

pub type BuildAsyncCallback = Option<unsafe extern "C" fn(result: *mut BuildResult, data: *mut c_void)>;

pub type PluginSetupCallback = Option<unsafe extern "C" fn(session: Handle, data: *mut c_void)>;

pub type PluginOnStartCallback = Option<unsafe extern "C" fn(data: *mut c_void) -> *const HookResult>;

pub type PluginOnEndCallback =
    Option<unsafe extern "C" fn(result: *const BuildResult, data: *mut c_void) -> *const HookResult>;

/// Hands a hook payload back to its owner once the bridge has copied it.
pub type PluginHookResultRelease =
    Option<unsafe extern "C" fn(result: *const HookResult, data: *mut c_void)>;

pub type PluginDestructor = Option<unsafe extern "C" fn(data: *mut c_void)>;

/// Opaque foreign pointer carried across threads.
///
/// The bridge never dereferences it; it is only handed back to the foreign
/// callbacks it was registered with, which must tolerate being called from
/// any thread.
#[derive(Debug, Clone, Copy)]
pub struct UserData(pub *mut c_void);

unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

impl UserData {
    pub fn null() -> Self {
        UserData(ptr::null_mut())
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }
}
