//! Shared fixtures for fob-bridge integration tests.
//!
//! Foreign callbacks need user data that outlives every context that might
//! call them, so fixtures here are leaked on purpose.

#![allow(dead_code)]

use std::ffi::c_void;
use std::fs;
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, mpsc};
use std::time::Duration;

use fob_bridge::{Handle, UserData, abi};
use tempfile::TempDir;

pub const TIMEOUT: Duration = Duration::from_secs(30);

pub type OnStartFn = unsafe extern "C" fn(*mut c_void) -> *const abi::HookResult;
pub type OnEndFn = unsafe extern "C" fn(*const abi::BuildResult, *mut c_void) -> *const abi::HookResult;
pub type ReleaseFn = unsafe extern "C" fn(*const abi::HookResult, *mut c_void);

#[derive(Clone, Copy)]
pub enum Hook {
    Start(OnStartFn, UserData),
    End(OnEndFn, UserData),
    /// On-start hook whose payloads go back through a release callback.
    StartReleased(OnStartFn, ReleaseFn, UserData),
}

/// Counts calls into a foreign plugin and holds the hooks its setup
/// registers.
#[derive(Default)]
pub struct TestPlugin {
    pub setups: AtomicUsize,
    pub destructs: AtomicUsize,
    pub sessions: Mutex<Vec<Handle>>,
    pub hooks: Vec<Hook>,
}

impl TestPlugin {
    pub fn leak(hooks: Vec<Hook>) -> &'static TestPlugin {
        Box::leak(Box::new(TestPlugin {
            hooks,
            ..Default::default()
        }))
    }

    pub fn data(&'static self) -> *mut c_void {
        self as *const TestPlugin as *mut c_void
    }

    /// # Safety
    ///
    /// `data` must come from [`TestPlugin::data`].
    pub unsafe fn from_data(data: *mut c_void) -> &'static TestPlugin {
        unsafe { &*(data as *const TestPlugin) }
    }

    pub fn setups(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }

    pub fn destructs(&self) -> usize {
        self.destructs.load(Ordering::SeqCst)
    }

    /// Record a setup call and return the hooks to register.
    pub fn record_setup(&self, session: Handle) -> Vec<Hook> {
        self.setups.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().unwrap().push(session);
        self.hooks.clone()
    }
}

pub unsafe extern "C" fn test_plugin_destructor(data: *mut c_void) {
    let plugin = unsafe { TestPlugin::from_data(data) };
    plugin.destructs.fetch_add(1, Ordering::SeqCst);
}

/// A hook payload with fixed diagnostics, alive for the whole test run.
pub fn leaked_hook_result(errors: &[&'static str], warnings: &[&'static str]) -> &'static abi::HookResult {
    fn messages(texts: &[&'static str]) -> (*const abi::Message, usize) {
        if texts.is_empty() {
            return (ptr::null(), 0);
        }
        let messages: Vec<abi::Message> = texts
            .iter()
            .map(|text| abi::Message {
                id: abi::Str::EMPTY,
                plugin_name: abi::Str::EMPTY,
                text: abi::Str::borrowed(text),
                location: ptr::null_mut(),
                notes: ptr::null_mut(),
                notes_len: 0,
            })
            .collect();
        let leaked = Box::leak(messages.into_boxed_slice());
        (leaked.as_ptr(), leaked.len())
    }

    let (errors, errors_len) = messages(errors);
    let (warnings, warnings_len) = messages(warnings);
    Box::leak(Box::new(abi::HookResult {
        errors,
        errors_len,
        warnings,
        warnings_len,
    }))
}

/// On-start hook returning the [`abi::HookResult`] its data points at.
pub unsafe extern "C" fn return_payload(data: *mut c_void) -> *const abi::HookResult {
    data as *const abi::HookResult
}

pub fn payload_data(payload: &'static abi::HookResult) -> UserData {
    UserData(payload as *const abi::HookResult as *mut c_void)
}

/// On-start hook handing out a freshly allocated payload on every call and
/// freeing it when the bridge gives it back.
pub struct Allocating {
    pub text: &'static str,
    pub handed_out: AtomicUsize,
    pub released: AtomicUsize,
}

impl Allocating {
    pub fn leak(text: &'static str) -> &'static Allocating {
        Box::leak(Box::new(Allocating {
            text,
            handed_out: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }))
    }

    pub fn hook(&'static self) -> Hook {
        Hook::StartReleased(
            allocate_payload,
            free_payload,
            UserData(self as *const Allocating as *mut c_void),
        )
    }
}

unsafe extern "C" fn allocate_payload(data: *mut c_void) -> *const abi::HookResult {
    let allocating = unsafe { &*(data as *const Allocating) };
    allocating.handed_out.fetch_add(1, Ordering::SeqCst);
    let warnings: Box<[abi::Message]> = vec![abi::Message {
        id: abi::Str::EMPTY,
        plugin_name: abi::Str::EMPTY,
        text: abi::Str::borrowed(allocating.text),
        location: ptr::null_mut(),
        notes: ptr::null_mut(),
        notes_len: 0,
    }]
    .into_boxed_slice();
    let warnings_len = warnings.len();
    Box::into_raw(Box::new(abi::HookResult {
        errors: ptr::null(),
        errors_len: 0,
        warnings: Box::into_raw(warnings).cast::<abi::Message>().cast_const(),
        warnings_len,
    }))
}

unsafe extern "C" fn free_payload(result: *const abi::HookResult, data: *mut c_void) {
    let allocating = unsafe { &*(data as *const Allocating) };
    let result = unsafe { Box::from_raw(result.cast_mut()) };
    drop(unsafe {
        Box::from_raw(ptr::slice_from_raw_parts_mut(
            result.warnings.cast_mut(),
            result.warnings_len,
        ))
    });
    allocating.released.fetch_add(1, Ordering::SeqCst);
}

/// On-start hook that reports in and waits to be released.
pub struct Gate {
    started: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

pub struct GateControl {
    pub started: mpsc::Receiver<()>,
    pub release: mpsc::Sender<()>,
}

impl Gate {
    pub fn leak() -> (&'static Gate, GateControl) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Box::leak(Box::new(Gate {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        }));
        (
            gate,
            GateControl {
                started: started_rx,
                release: release_tx,
            },
        )
    }

    pub fn hook(&'static self) -> Hook {
        Hook::Start(gate_on_start, UserData(self as *const Gate as *mut c_void))
    }
}

unsafe extern "C" fn gate_on_start(data: *mut c_void) -> *const abi::HookResult {
    let gate = unsafe { &*(data as *const Gate) };
    let _ = gate.started.lock().unwrap().send(());
    let _ = gate.release.lock().unwrap().recv_timeout(TIMEOUT);
    ptr::null()
}

/// On-end hook counting the output files it was shown.
pub struct EndObserver {
    pub calls: AtomicUsize,
    pub last_output_count: AtomicUsize,
    pub last_error_count: AtomicUsize,
}

impl EndObserver {
    pub fn leak() -> &'static EndObserver {
        Box::leak(Box::new(EndObserver {
            calls: AtomicUsize::new(0),
            last_output_count: AtomicUsize::new(0),
            last_error_count: AtomicUsize::new(0),
        }))
    }

    pub fn hook(&'static self) -> Hook {
        Hook::End(observe_on_end, UserData(self as *const EndObserver as *mut c_void))
    }
}

unsafe extern "C" fn observe_on_end(
    result: *const abi::BuildResult,
    data: *mut c_void,
) -> *const abi::HookResult {
    let observer = unsafe { &*(data as *const EndObserver) };
    let result = unsafe { &*result };
    observer
        .last_output_count
        .store(result.output_files_len, Ordering::SeqCst);
    observer
        .last_error_count
        .store(result.errors_len, Ordering::SeqCst);
    observer.calls.fetch_add(1, Ordering::SeqCst);
    ptr::null()
}

/// Project with `src/index.js` importing `src/util.js`.
pub fn create_test_project() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    create_test_file(dir.path(), "src/util.js", "export const answer = 42;\n");
    create_test_file(
        dir.path(),
        "src/index.js",
        "import { answer } from './util.js';\nconsole.log(answer);\n",
    );
    dir
}

pub fn create_test_file(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}
