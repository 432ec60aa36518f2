//! Plugin surface of the engine.
//!
//! A [`Plugin`] is a name plus a setup function. The engine calls `setup` once
//! per setup pass (context creation, or a one-shot build) with a
//! [`PluginBuild`] through which the plugin registers its hooks. The engine
//! then drives those hooks through [`PluginHooks`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::message::Message;
use crate::result::BuildResult;

/// Diagnostics returned by a hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookResult {
    pub errors: Vec<Message>,
    pub warnings: Vec<Message>,
}

impl HookResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(message: Message) -> Self {
        Self {
            errors: vec![message],
            warnings: Vec::new(),
        }
    }

    pub fn warning(message: Message) -> Self {
        Self {
            errors: Vec::new(),
            warnings: vec![message],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Fill in `plugin_name` on messages that don't name their origin.
    fn attribute_to(mut self, plugin_name: &str) -> Self {
        for msg in self.errors.iter_mut().chain(self.warnings.iter_mut()) {
            if msg.plugin_name.is_empty() {
                msg.plugin_name = plugin_name.to_string();
            }
        }
        self
    }
}

pub type OnStartCallback = Box<dyn Fn() -> HookResult + Send + Sync>;
pub type OnEndCallback = Box<dyn Fn(&BuildResult) -> HookResult + Send + Sync>;
pub type OnDisposeCallback = Box<dyn FnOnce() + Send>;

type SetupFn = dyn Fn(&mut dyn PluginBuild) + Send + Sync;

/// Registration interface handed to [`Plugin`] setup functions.
pub trait PluginBuild {
    /// Runs at the start of every build pass, before any module is loaded.
    /// Errors abort the pass.
    fn on_start(&mut self, callback: OnStartCallback);

    /// Runs after every build pass with the pass's result. Diagnostics are
    /// appended to the result.
    fn on_end(&mut self, callback: OnEndCallback);

    /// Runs once when the build session that ran this setup is torn down.
    fn on_dispose(&mut self, callback: OnDisposeCallback);
}

/// A named unit of build pipeline customization.
#[derive(Clone)]
pub struct Plugin {
    name: String,
    setup: Arc<SetupFn>,
}

impl Plugin {
    pub fn new<F>(name: impl Into<String>, setup: F) -> Self
    where
        F: Fn(&mut dyn PluginBuild) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            setup: Arc::new(setup),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn setup(&self, build: &mut dyn PluginBuild) {
        (self.setup)(build)
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin").field("name", &self.name).finish()
    }
}

struct NamedHook<T> {
    plugin_name: String,
    callback: T,
}

/// Hooks collected from one setup pass over a list of plugins.
#[derive(Default)]
pub struct PluginHooks {
    on_start: Vec<NamedHook<OnStartCallback>>,
    on_end: Vec<NamedHook<OnEndCallback>>,
    on_dispose: Mutex<Vec<OnDisposeCallback>>,
}

struct Registrar<'a> {
    plugin_name: &'a str,
    hooks: &'a mut PluginHooks,
}

impl PluginBuild for Registrar<'_> {
    fn on_start(&mut self, callback: OnStartCallback) {
        self.hooks.on_start.push(NamedHook {
            plugin_name: self.plugin_name.to_string(),
            callback,
        });
    }

    fn on_end(&mut self, callback: OnEndCallback) {
        self.hooks.on_end.push(NamedHook {
            plugin_name: self.plugin_name.to_string(),
            callback,
        });
    }

    fn on_dispose(&mut self, callback: OnDisposeCallback) {
        self.hooks.on_dispose.get_mut().push(callback);
    }
}

impl PluginHooks {
    /// Run every plugin's setup function, in order.
    pub fn setup(plugins: &[Plugin]) -> Self {
        let mut hooks = PluginHooks::default();
        for plugin in plugins {
            tracing::debug!(plugin = plugin.name(), "running plugin setup");
            let mut registrar = Registrar {
                plugin_name: plugin.name(),
                hooks: &mut hooks,
            };
            plugin.setup(&mut registrar);
        }
        hooks
    }

    pub fn on_start_count(&self) -> usize {
        self.on_start.len()
    }

    pub fn on_end_count(&self) -> usize {
        self.on_end.len()
    }

    /// Run all on-start hooks and merge their diagnostics.
    pub fn run_on_start(&self) -> HookResult {
        let mut merged = HookResult::default();
        for hook in &self.on_start {
            let res = (hook.callback)().attribute_to(&hook.plugin_name);
            merged.errors.extend(res.errors);
            merged.warnings.extend(res.warnings);
        }
        merged
    }

    /// Run all on-end hooks against `result`, appending their diagnostics.
    pub fn run_on_end(&self, result: &mut BuildResult) {
        for hook in &self.on_end {
            let res = (hook.callback)(result).attribute_to(&hook.plugin_name);
            result.errors.extend(res.errors);
            result.warnings.extend(res.warnings);
        }
    }

    /// Run the on-dispose hooks. Only the first call does anything.
    pub fn dispose(&self) {
        let callbacks = std::mem::take(&mut *self.on_dispose.lock());
        if !callbacks.is_empty() {
            tracing::debug!(count = callbacks.len(), "running plugin dispose hooks");
        }
        for callback in callbacks {
            callback();
        }
    }
}
