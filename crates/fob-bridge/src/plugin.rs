//! Foreign plugins.
//!
//! A [`PluginDescriptor`] holds the foreign setup callback, its user data and
//! an optional destructor. It is turned into an engine [`Plugin`] each time it
//! is attached to an options object, so one descriptor can serve many
//! contexts.
//!
//! Setup runs once per engine setup pass. The foreign callback receives a
//! session handle that is only valid while the callback runs; hooks
//! registered through it are buffered in the session and handed to the
//! engine after the callback returns.
//!
//! Every session that ran the descriptor's setup holds it alive until that
//! session is disposed. The foreign destructor runs exactly once: when the
//! last live session is disposed, or on explicit destroy if no session is
//! live at that point. Once it has run, the descriptor's setup is no longer
//! called and its hooks are skipped.
//!
//! Hook payloads belong to the foreign side. When a hook was registered with
//! a release callback, the bridge hands each non-null payload back to it
//! once the payload has been copied.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fob_engine::{BuildResult, HookResult, Message, Plugin, PluginBuild};
use parking_lot::Mutex;

use crate::abi::{self, UserData};
use crate::error::{BridgeError, Result};
use crate::handle::{Handle, HandleTable, Namespace};
use crate::marshal;

type SetupFn = unsafe extern "C" fn(session: Handle, data: *mut std::ffi::c_void);
type OnStartFn = unsafe extern "C" fn(data: *mut std::ffi::c_void) -> *const abi::HookResult;
type OnEndFn = unsafe extern "C" fn(
    result: *const abi::BuildResult,
    data: *mut std::ffi::c_void,
) -> *const abi::HookResult;
type ReleaseFn = unsafe extern "C" fn(result: *const abi::HookResult, data: *mut std::ffi::c_void);

/// A hook registered during setup, waiting to be handed to the engine.
#[derive(Clone, Copy)]
pub enum HookRegistration {
    OnStart {
        callback: OnStartFn,
        release: Option<ReleaseFn>,
        data: UserData,
    },
    OnEnd {
        callback: OnEndFn,
        release: Option<ReleaseFn>,
        data: UserData,
    },
}

pub type SessionTable = HandleTable<Vec<HookRegistration>>;

pub fn session_table() -> SessionTable {
    HandleTable::new(Namespace::PluginSession)
}

pub struct PluginDescriptor {
    name: String,
    setup: SetupFn,
    user_data: UserData,
    destructor: abi::PluginDestructor,
    live_sessions: Mutex<usize>,
    destroyed: AtomicBool,
}

impl PluginDescriptor {
    pub fn new(
        name: String,
        setup: abi::PluginSetupCallback,
        user_data: UserData,
        destructor: abi::PluginDestructor,
    ) -> Result<Self> {
        let setup = setup.ok_or(BridgeError::NullCallback("plugin setup"))?;
        Ok(Self {
            name,
            setup,
            user_data,
            destructor,
            live_sessions: Mutex::new(0),
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Sessions that ran setup and have not been disposed yet.
    pub fn live_sessions(&self) -> usize {
        *self.live_sessions.lock()
    }

    /// Explicit destroy. Runs the destructor now if no session is live,
    /// otherwise leaves it to the last session's dispose.
    pub fn release(&self) {
        let fire = {
            let live = self.live_sessions.lock();
            if *live > 0 {
                tracing::debug!(plugin = %self.name, live = *live, "plugin teardown deferred to live sessions");
                false
            } else {
                self.mark_destroyed()
            }
        };
        if fire {
            self.run_destructor();
        }
    }

    /// Engine plugin whose setup runs this descriptor's foreign setup.
    pub fn to_engine_plugin(self: &Arc<Self>, sessions: &Arc<SessionTable>) -> Plugin {
        let descriptor = Arc::clone(self);
        let sessions = Arc::clone(sessions);
        Plugin::new(self.name.clone(), move |build| {
            descriptor.run_setup(&sessions, build)
        })
    }

    fn attach_session(&self) -> bool {
        let mut live = self.live_sessions.lock();
        if self.is_destroyed() {
            return false;
        }
        *live += 1;
        true
    }

    fn detach_session(&self) {
        let fire = {
            let mut live = self.live_sessions.lock();
            *live = live.saturating_sub(1);
            *live == 0 && self.mark_destroyed()
        };
        if fire {
            self.run_destructor();
        }
    }

    /// Flip the one-shot flag. Only the first caller gets `true`.
    fn mark_destroyed(&self) -> bool {
        self.destroyed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn run_destructor(&self) {
        tracing::debug!(plugin = %self.name, "tearing down plugin");
        if let Some(destructor) = self.destructor {
            unsafe { destructor(self.user_data.as_ptr()) };
        }
    }

    fn run_setup(self: &Arc<Self>, sessions: &SessionTable, build: &mut dyn PluginBuild) {
        if !self.attach_session() {
            tracing::warn!(plugin = %self.name, "skipping setup of destroyed plugin");
            return;
        }

        let session = sessions.insert(Vec::new());
        unsafe { (self.setup)(session, self.user_data.as_ptr()) };
        let registrations = sessions.delete(session).unwrap_or_default();
        tracing::debug!(
            plugin = %self.name,
            hooks = registrations.len(),
            "plugin setup finished"
        );

        for registration in registrations {
            let descriptor = Arc::clone(self);
            match registration {
                HookRegistration::OnStart { callback, release, data } => build.on_start(Box::new(
                    move || descriptor.dispatch_on_start(callback, release, data),
                )),
                HookRegistration::OnEnd { callback, release, data } => build.on_end(Box::new(
                    move |result: &BuildResult| descriptor.dispatch_on_end(callback, release, data, result),
                )),
            }
        }

        let descriptor = Arc::clone(self);
        build.on_dispose(Box::new(move || descriptor.detach_session()));
    }

    fn dispatch_on_start(&self, callback: OnStartFn, release: Option<ReleaseFn>, data: UserData) -> HookResult {
        if self.is_destroyed() {
            tracing::warn!(plugin = %self.name, "skipping on_start hook of destroyed plugin");
            return HookResult::ok();
        }
        let payload = unsafe { callback(data.as_ptr()) };
        self.copy_payload(payload, release, data)
    }

    fn dispatch_on_end(
        &self,
        callback: OnEndFn,
        release: Option<ReleaseFn>,
        data: UserData,
        result: &BuildResult,
    ) -> HookResult {
        if self.is_destroyed() {
            tracing::warn!(plugin = %self.name, "skipping on_end hook of destroyed plugin");
            return HookResult::ok();
        }
        let view = marshal::build_result_into_raw(result);
        let payload = unsafe { callback(view, data.as_ptr()) };
        let copied = self.copy_payload(payload, release, data);
        unsafe { marshal::destroy_build_result(view) };
        copied
    }

    fn copy_payload(&self, payload: *const abi::HookResult, release: Option<ReleaseFn>, data: UserData) -> HookResult {
        let copied = match unsafe { marshal::hook_result_from_raw(payload) } {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(plugin = %self.name, %err, "plugin returned a malformed hook result");
                HookResult::error(
                    Message::new(format!("Plugin returned a malformed hook result: {err}"))
                        .with_id("malformed-hook-result"),
                )
            }
        };
        if let (Some(release), false) = (release, payload.is_null()) {
            unsafe { release(payload, data.as_ptr()) };
        }
        copied
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("live_sessions", &self.live_sessions())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Buffer an on-start hook in a live setup session.
pub fn register_on_start(
    sessions: &SessionTable,
    session: Handle,
    callback: abi::PluginOnStartCallback,
    release: abi::PluginHookResultRelease,
    data: UserData,
) -> Result<()> {
    let callback = callback.ok_or(BridgeError::NullCallback("on_start"))?;
    sessions.update(session, |hooks| {
        hooks.push(HookRegistration::OnStart { callback, release, data })
    })
}

/// Buffer an on-end hook in a live setup session.
pub fn register_on_end(
    sessions: &SessionTable,
    session: Handle,
    callback: abi::PluginOnEndCallback,
    release: abi::PluginHookResultRelease,
    data: UserData,
) -> Result<()> {
    let callback = callback.ok_or(BridgeError::NullCallback("on_end"))?;
    sessions.update(session, |hooks| {
        hooks.push(HookRegistration::OnEnd { callback, release, data })
    })
}
