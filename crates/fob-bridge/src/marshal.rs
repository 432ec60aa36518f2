//! Conversion between engine values and their [`abi`] layouts.
//!
//! Outbound values are copied into fresh boxed allocations owned by the
//! bridge; `destroy_*` frees the whole tree. Inbound values (hook payloads,
//! foreign strings) are read in place and copied into engine values before
//! the call that received them returns.

use std::ptr;

use fob_engine::{BuildResult, HookResult, Location, Message, Note, OutputFile};

use crate::abi;
use crate::error::{BridgeError, Result};

fn bytes_into_raw(bytes: &[u8]) -> (*const u8, usize) {
    if bytes.is_empty() {
        return (ptr::null(), 0);
    }
    let boxed: Box<[u8]> = bytes.into();
    let len = boxed.len();
    (Box::into_raw(boxed).cast::<u8>().cast_const(), len)
}

unsafe fn free_bytes(data: *const u8, len: usize) {
    if !data.is_null() {
        drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(data.cast_mut(), len)) });
    }
}

fn str_into_raw(s: &str) -> abi::Str {
    let (data, len) = bytes_into_raw(s.as_bytes());
    abi::Str {
        data: data.cast(),
        len,
    }
}

unsafe fn free_str(s: abi::Str) {
    unsafe { free_bytes(s.data.cast(), s.len) }
}

fn vec_into_raw<T>(items: Vec<T>) -> (*mut T, usize) {
    if items.is_empty() {
        return (ptr::null_mut(), 0);
    }
    let boxed = items.into_boxed_slice();
    let len = boxed.len();
    (Box::into_raw(boxed).cast::<T>(), len)
}

unsafe fn vec_from_raw<T>(data: *mut T, len: usize) -> Vec<T> {
    if data.is_null() {
        Vec::new()
    } else {
        unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(data, len)) }.into_vec()
    }
}

/// Borrow a foreign byte range.
///
/// # Safety
///
/// When non-null, `data` must point to `len` readable bytes that outlive the
/// returned slice.
pub unsafe fn bytes_from_raw<'a>(data: *const u8, len: usize, what: &'static str) -> Result<&'a [u8]> {
    if len == 0 {
        return Ok(&[]);
    }
    if data.is_null() {
        return Err(BridgeError::NullPointer(what));
    }
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

/// Copy a foreign string byte for byte. Invalid UTF-8 is rejected.
///
/// # Safety
///
/// See [`bytes_from_raw`].
pub unsafe fn string_from_raw(data: *const u8, len: usize, what: &'static str) -> Result<String> {
    let bytes = unsafe { bytes_from_raw(data, len, what)? };
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|err| BridgeError::InvalidUtf8 {
            what,
            offset: err.valid_up_to(),
        })
}

unsafe fn str_to_string(s: &abi::Str, what: &'static str) -> Result<String> {
    unsafe { string_from_raw(s.data.cast(), s.len, what) }
}

/// Borrow a foreign array, treating `NULL` as empty when `len` is zero.
unsafe fn slice_from_raw<'a, T>(data: *const T, len: usize, what: &'static str) -> Result<&'a [T]> {
    if len == 0 {
        return Ok(&[]);
    }
    if data.is_null() {
        return Err(BridgeError::NullPointer(what));
    }
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

fn line_number_into_raw(n: u32) -> i64 {
    i64::from(n)
}

fn line_number_from_raw(n: i64) -> u32 {
    u32::try_from(n.max(0)).unwrap_or(u32::MAX)
}

fn location_into_raw(location: Option<&Location>) -> *mut abi::Location {
    let Some(location) = location else {
        return ptr::null_mut();
    };
    Box::into_raw(Box::new(abi::Location {
        file: str_into_raw(&location.file),
        namespace: str_into_raw(&location.namespace),
        line: line_number_into_raw(location.line),
        column: line_number_into_raw(location.column),
        length: line_number_into_raw(location.length),
        line_text: str_into_raw(&location.line_text),
        suggestion: str_into_raw(&location.suggestion),
    }))
}

unsafe fn free_location(location: *mut abi::Location) {
    if location.is_null() {
        return;
    }
    let location = unsafe { Box::from_raw(location) };
    unsafe {
        free_str(location.file);
        free_str(location.namespace);
        free_str(location.line_text);
        free_str(location.suggestion);
    }
}

unsafe fn location_from_raw(location: *const abi::Location) -> Result<Option<Location>> {
    let Some(location) = (unsafe { location.as_ref() }) else {
        return Ok(None);
    };
    Ok(Some(Location {
        file: unsafe { str_to_string(&location.file, "location file")? },
        namespace: unsafe { str_to_string(&location.namespace, "location namespace")? },
        line: line_number_from_raw(location.line),
        column: line_number_from_raw(location.column),
        length: line_number_from_raw(location.length),
        line_text: unsafe { str_to_string(&location.line_text, "location line text")? },
        suggestion: unsafe { str_to_string(&location.suggestion, "location suggestion")? },
    }))
}

/// Copy `message` into a bridge-owned [`abi::Message`].
pub fn message_to_raw(message: &Message) -> abi::Message {
    let notes: Vec<abi::Note> = message
        .notes
        .iter()
        .map(|note| abi::Note {
            text: str_into_raw(&note.text),
            location: location_into_raw(note.location.as_ref()),
        })
        .collect();
    let (notes, notes_len) = vec_into_raw(notes);

    abi::Message {
        id: str_into_raw(&message.id),
        plugin_name: str_into_raw(&message.plugin_name),
        text: str_into_raw(&message.text),
        location: location_into_raw(message.location.as_ref()),
        notes,
        notes_len,
    }
}

/// Copy a message laid out by either side back into an engine [`Message`].
///
/// # Safety
///
/// Every pointer reachable from `message` must be null or valid for its
/// stated length.
pub unsafe fn message_from_raw(message: &abi::Message) -> Result<Message> {
    let notes = unsafe { slice_from_raw(message.notes.cast_const(), message.notes_len, "notes")? }
        .iter()
        .map(|note| -> Result<Note> {
            Ok(Note {
                text: unsafe { str_to_string(&note.text, "note text")? },
                location: unsafe { location_from_raw(note.location)? },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Message {
        id: unsafe { str_to_string(&message.id, "message id")? },
        plugin_name: unsafe { str_to_string(&message.plugin_name, "message plugin name")? },
        text: unsafe { str_to_string(&message.text, "message text")? },
        location: unsafe { location_from_raw(message.location)? },
        notes,
    })
}

/// Free everything [`message_to_raw`] allocated.
///
/// # Safety
///
/// `message` must come from [`message_to_raw`] and not have been freed.
pub unsafe fn free_message(message: abi::Message) {
    unsafe {
        free_str(message.id);
        free_str(message.plugin_name);
        free_str(message.text);
        free_location(message.location);
        for note in vec_from_raw(message.notes, message.notes_len) {
            free_str(note.text);
            free_location(note.location);
        }
    }
}

fn messages_into_raw(messages: &[Message]) -> (*mut abi::Message, usize) {
    vec_into_raw(messages.iter().map(message_to_raw).collect())
}

unsafe fn free_messages(data: *mut abi::Message, len: usize) {
    for message in unsafe { vec_from_raw(data, len) } {
        unsafe { free_message(message) };
    }
}

unsafe fn messages_from_raw(data: *const abi::Message, len: usize) -> Result<Vec<Message>> {
    unsafe { slice_from_raw(data, len, "messages")? }
        .iter()
        .map(|m| unsafe { message_from_raw(m) })
        .collect()
}

/// Move `result` into a bridge-owned [`abi::BuildResult`].
///
/// The pointer is never null. Free it with [`destroy_build_result`].
pub fn build_result_into_raw(result: &BuildResult) -> *mut abi::BuildResult {
    let files: Vec<abi::OutputFile> = result
        .output_files
        .iter()
        .map(|file| {
            let (contents, contents_len) = bytes_into_raw(&file.contents);
            abi::OutputFile {
                path: str_into_raw(&file.path),
                hash: str_into_raw(&file.hash),
                contents,
                contents_len,
            }
        })
        .collect();
    let (output_files, output_files_len) = vec_into_raw(files);
    let (errors, errors_len) = messages_into_raw(&result.errors);
    let (warnings, warnings_len) = messages_into_raw(&result.warnings);

    Box::into_raw(Box::new(abi::BuildResult {
        output_files,
        output_files_len,
        errors,
        errors_len,
        warnings,
        warnings_len,
    }))
}

/// Copy a marshaled build result back into engine form.
///
/// # Safety
///
/// `result` must be null or point to a valid [`abi::BuildResult`].
pub unsafe fn build_result_from_raw(result: *const abi::BuildResult) -> Result<BuildResult> {
    let Some(result) = (unsafe { result.as_ref() }) else {
        return Ok(BuildResult::default());
    };
    let files = unsafe {
        slice_from_raw(
            result.output_files.cast_const(),
            result.output_files_len,
            "output files",
        )?
    };

    let mut output_files = Vec::with_capacity(files.len());
    for file in files {
        output_files.push(OutputFile {
            path: unsafe { str_to_string(&file.path, "output path")? },
            hash: unsafe { str_to_string(&file.hash, "output hash")? },
            contents: unsafe { bytes_from_raw(file.contents, file.contents_len, "output contents")? }
                .to_vec(),
        });
    }

    Ok(BuildResult {
        output_files,
        errors: unsafe { messages_from_raw(result.errors, result.errors_len)? },
        warnings: unsafe { messages_from_raw(result.warnings, result.warnings_len)? },
    })
}

/// Free a result produced by [`build_result_into_raw`]. Null is ignored.
///
/// # Safety
///
/// `result` must be null or come from [`build_result_into_raw`] and not have
/// been freed.
pub unsafe fn destroy_build_result(result: *mut abi::BuildResult) {
    if result.is_null() {
        return;
    }
    let result = unsafe { Box::from_raw(result) };
    unsafe {
        for file in vec_from_raw(result.output_files, result.output_files_len) {
            free_str(file.path);
            free_str(file.hash);
            free_bytes(file.contents, file.contents_len);
        }
        free_messages(result.errors, result.errors_len);
        free_messages(result.warnings, result.warnings_len);
    }
}

impl abi::ContextResult {
    pub fn ok() -> Self {
        Self {
            is_err: false,
            errors: ptr::null_mut(),
            errors_len: 0,
        }
    }
}

pub fn context_result_from_messages(errors: &[Message]) -> abi::ContextResult {
    let (data, len) = messages_into_raw(errors);
    abi::ContextResult {
        is_err: true,
        errors: data,
        errors_len: len,
    }
}

/// # Safety
///
/// `result` must come from this module and not have been freed.
pub unsafe fn destroy_context_result(result: abi::ContextResult) {
    unsafe { free_messages(result.errors, result.errors_len) }
}

/// Copy a foreign hook payload. Null means no diagnostics.
///
/// # Safety
///
/// `result` must be null or point to a valid [`abi::HookResult`] whose
/// contents stay alive for the duration of the call.
pub unsafe fn hook_result_from_raw(result: *const abi::HookResult) -> Result<HookResult> {
    let Some(result) = (unsafe { result.as_ref() }) else {
        return Ok(HookResult::default());
    };
    Ok(HookResult {
        errors: unsafe { messages_from_raw(result.errors, result.errors_len)? },
        warnings: unsafe { messages_from_raw(result.warnings, result.warnings_len)? },
    })
}
