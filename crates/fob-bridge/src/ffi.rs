//! The exported C ABI.
//!
//! Every function here forwards to one process-wide [`Bridge`] backed by
//! [`RolldownEngine`], created on first use. Contract violations (bad
//! handles, null callbacks, null pointers with a length) are logged and abort
//! the process: there is no error channel a caller could act on.
//!
//! See `include/fob_bridge.h` for the C declarations.

use std::ffi::{c_char, c_void};

use fob_engine::RolldownEngine;
use fob_engine::logging::{LogLevel, init_logging};
use once_cell::sync::Lazy;

use crate::abi::{self, UserData};
use crate::bridge::{Bridge, ContextCreated};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::handle::Handle;
use crate::marshal;

static BRIDGE: Lazy<Bridge<RolldownEngine>> = Lazy::new(|| {
    let config = BridgeConfig::load().unwrap_or_else(|err| {
        tracing::warn!(%err, "ignoring bridge configuration");
        BridgeConfig::default()
    });
    check(Bridge::new(RolldownEngine::new(), &config))
});

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

fn bridge() -> &'static Bridge<RolldownEngine> {
    &BRIDGE
}

#[cold]
fn fault(err: &BridgeError) -> ! {
    tracing::error!(%err, "fob bridge contract violation");
    eprintln!("fob-bridge: {err}");
    std::process::abort()
}

fn check<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => fault(&err),
    }
}

unsafe fn read_string(data: *const c_char, len: usize, what: &'static str) -> String {
    check(unsafe { marshal::string_from_raw(data.cast(), len, what) })
}

// Options

#[unsafe(no_mangle)]
pub extern "C" fn fob_options_create() -> Handle {
    bridge().options_create()
}

#[unsafe(no_mangle)]
pub extern "C" fn fob_options_set_bundle(options: Handle, enabled: bool) {
    check(bridge().options_set_bundle(options, enabled));
}

/// # Safety
///
/// `input` and `output` must each be null or point to the given number of
/// readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fob_options_append_entry_point(
    options: Handle,
    input: *const c_char,
    input_len: usize,
    output: *const c_char,
    output_len: usize,
) {
    let input = unsafe { read_string(input, input_len, "entry point input") };
    let output = unsafe { read_string(output, output_len, "entry point output") };
    check(bridge().options_append_entry_point(options, input, output));
}

/// # Safety
///
/// `dir` must be null or point to `len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fob_options_set_working_dir(options: Handle, dir: *const c_char, len: usize) {
    let dir = unsafe { read_string(dir, len, "working directory") };
    check(bridge().options_set_working_dir(options, dir));
}

#[unsafe(no_mangle)]
pub extern "C" fn fob_options_add_plugin(options: Handle, plugin: Handle) {
    check(bridge().options_add_plugin(options, plugin));
}

#[unsafe(no_mangle)]
pub extern "C" fn fob_options_destroy(options: Handle) {
    check(bridge().options_destroy(options));
}

// Contexts

/// # Safety
///
/// `out_context` must point to writable memory for one handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fob_context_create(options: Handle, out_context: *mut Handle) -> abi::ContextResult {
    if out_context.is_null() {
        fault(&BridgeError::NullPointer("out_context"));
    }
    match check(bridge().context_create(options)) {
        ContextCreated::Ready(context) => {
            unsafe { out_context.write(context) };
            abi::ContextResult::ok()
        }
        ContextCreated::Failed(errors) => {
            unsafe { out_context.write(0) };
            marshal::context_result_from_messages(&errors)
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn fob_context_build(context: Handle) -> *mut abi::BuildResult {
    marshal::build_result_into_raw(&check(bridge().context_build(context)))
}

#[unsafe(no_mangle)]
pub extern "C" fn fob_context_build_async(
    context: Handle,
    callback: abi::BuildAsyncCallback,
    data: *mut c_void,
) {
    let callback = check(callback.ok_or(BridgeError::NullCallback("build completion")));
    let data = UserData(data);
    check(bridge().context_build_async(context, move |result| {
        let raw = marshal::build_result_into_raw(&result);
        unsafe { callback(raw, data.as_ptr()) };
    }));
}

#[unsafe(no_mangle)]
pub extern "C" fn fob_context_cancel(context: Handle) {
    check(bridge().context_cancel(context));
}

#[unsafe(no_mangle)]
pub extern "C" fn fob_context_destroy(context: Handle) {
    check(bridge().context_destroy(context));
}

// One-shot builds

#[unsafe(no_mangle)]
pub extern "C" fn fob_build(options: Handle) -> *mut abi::BuildResult {
    marshal::build_result_into_raw(&check(bridge().build(options)))
}

#[unsafe(no_mangle)]
pub extern "C" fn fob_build_async(options: Handle, callback: abi::BuildAsyncCallback, data: *mut c_void) {
    let callback = check(callback.ok_or(BridgeError::NullCallback("build completion")));
    let data = UserData(data);
    check(bridge().build_async(options, move |result| {
        let raw = marshal::build_result_into_raw(&result);
        unsafe { callback(raw, data.as_ptr()) };
    }));
}

// Results

/// # Safety
///
/// `result` must be null or a pointer returned by this library that has not
/// been destroyed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fob_build_result_destroy(result: *mut abi::BuildResult) {
    unsafe { marshal::destroy_build_result(result) }
}

/// # Safety
///
/// `result` must have been returned by [`fob_context_create`] and not been
/// destroyed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fob_context_result_destroy(result: abi::ContextResult) {
    unsafe { marshal::destroy_context_result(result) }
}

// Plugins

/// # Safety
///
/// `name` must be null or point to `len` readable bytes. `data` is passed
/// back untouched to `setup`, hooks and `destructor`, possibly from other
/// threads.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fob_plugin_create(
    name: *const c_char,
    len: usize,
    setup: abi::PluginSetupCallback,
    data: *mut c_void,
    destructor: abi::PluginDestructor,
) -> Handle {
    let name = unsafe { read_string(name, len, "plugin name") };
    check(bridge().plugin_create(name, setup, UserData(data), destructor))
}

#[unsafe(no_mangle)]
pub extern "C" fn fob_plugin_destroy(plugin: Handle) {
    check(bridge().plugin_destroy(plugin));
}

/// Register an on-start hook. Only valid inside a plugin setup callback.
///
/// `release`, when not null, receives every non-null payload the hook
/// returns once the bridge has copied it.
#[unsafe(no_mangle)]
pub extern "C" fn fob_plugin_builder_on_start(
    session: Handle,
    callback: abi::PluginOnStartCallback,
    release: abi::PluginHookResultRelease,
    data: *mut c_void,
) {
    check(bridge().plugin_builder_on_start(session, callback, release, UserData(data)));
}

/// Register an on-end hook. The result passed to it is only valid during the call.
///
/// `release`, when not null, receives every non-null payload the hook
/// returns once the bridge has copied it.
#[unsafe(no_mangle)]
pub extern "C" fn fob_plugin_builder_on_end(
    session: Handle,
    callback: abi::PluginOnEndCallback,
    release: abi::PluginHookResultRelease,
    data: *mut c_void,
) {
    check(bridge().plugin_builder_on_end(session, callback, release, UserData(data)));
}

// Process

/// Library version as a NUL-terminated string with static lifetime.
///
/// # Safety
///
/// `len` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fob_version(len: *mut usize) -> *const c_char {
    if !len.is_null() {
        unsafe { len.write(VERSION.len() - 1) };
    }
    VERSION.as_ptr().cast()
}

/// Install the log subscriber. An empty or unknown level means `info`.
///
/// # Safety
///
/// `level` must be null or point to `len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fob_init_logging(level: *const c_char, len: usize) {
    let level = unsafe { read_string(level, len, "log level") };
    match level.parse::<LogLevel>() {
        Ok(parsed) => {
            init_logging(parsed);
        }
        Err(err) => {
            init_logging(LogLevel::default());
            if !level.is_empty() {
                tracing::warn!(%err, "falling back to info logging");
            }
        }
    }
}
