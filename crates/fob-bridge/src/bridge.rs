//! Handle-based dispatch over an [`Engine`].
//!
//! [`Bridge`] is what the C ABI drives, and it can be used directly from
//! Rust. It owns one [`HandleTable`] per kind of object, the engine, and the
//! tokio runtime builds run on.

use std::sync::Arc;

use fob_engine::{BuildContext, BuildOptions, BuildResult, Engine, Message};
use tokio::runtime::Runtime;

use crate::abi::{self, UserData};
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::handle::{Handle, HandleTable, Namespace};
use crate::plugin::{self, PluginDescriptor, SessionTable};
use crate::runtime::build_runtime;

/// Outcome of [`Bridge::context_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextCreated {
    Ready(Handle),
    /// The engine rejected the options. No handle was issued.
    Failed(Vec<Message>),
}

/// Handle registry plus dispatch for one engine.
///
/// Handles issued by one `Bridge` mean nothing to another.
pub struct Bridge<E: Engine> {
    engine: Arc<E>,
    runtime: Runtime,
    options: HandleTable<BuildOptions>,
    contexts: HandleTable<Arc<E::Context>>,
    plugins: HandleTable<Arc<PluginDescriptor>>,
    sessions: Arc<SessionTable>,
}

impl<E: Engine> Bridge<E> {
    /// Start the runtime and install logging when `config` asks for it.
    pub fn new(engine: E, config: &BridgeConfig) -> Result<Self> {
        if let Some(level) = config.log_level {
            fob_engine::logging::init_logging(level);
        }
        Ok(Self {
            engine: Arc::new(engine),
            runtime: build_runtime(config)?,
            options: HandleTable::new(Namespace::Options),
            contexts: HandleTable::new(Namespace::Context),
            plugins: HandleTable::new(Namespace::Plugin),
            sessions: Arc::new(plugin::session_table()),
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    // Options

    /// Register empty build options: no entry points, bundling off.
    pub fn options_create(&self) -> Handle {
        self.options.insert(BuildOptions::new())
    }

    /// Toggle bundling. When off, bare package imports stay external.
    pub fn options_set_bundle(&self, options: Handle, enabled: bool) -> Result<()> {
        self.options.update(options, |opts| opts.bundle = enabled)
    }

    /// Append an entry point. Order is kept.
    pub fn options_append_entry_point(
        &self,
        options: Handle,
        input_path: String,
        output_path: String,
    ) -> Result<()> {
        self.options.update(options, |opts| {
            opts.entry_points
                .push(fob_engine::EntryPoint::new(input_path, output_path))
        })
    }

    /// Set the directory relative paths resolve against.
    pub fn options_set_working_dir(&self, options: Handle, dir: String) -> Result<()> {
        self.options.update(options, |opts| {
            let updated = std::mem::take(opts).working_dir(dir);
            *opts = updated;
        })
    }

    /// Attach a registered plugin. The plugin stays attached even if it is
    /// destroyed later; its hooks are then skipped.
    pub fn options_add_plugin(&self, options: Handle, plugin: Handle) -> Result<()> {
        let descriptor = self.plugins.load(plugin)?;
        let engine_plugin = descriptor.to_engine_plugin(&self.sessions);
        self.options
            .update(options, |opts| opts.plugins.push(engine_plugin))
    }

    /// Copy of the options as they stand now.
    pub fn options_snapshot(&self, options: Handle) -> Result<BuildOptions> {
        self.options.load(options)
    }

    /// Release an options object. Releasing twice is a no-op.
    pub fn options_destroy(&self, options: Handle) -> Result<()> {
        self.options.check_namespace(options)?;
        self.options.delete(options);
        Ok(())
    }

    // One-shot builds

    /// One-shot build on the calling thread.
    pub fn build(&self, options: Handle) -> Result<BuildResult> {
        let options = self.options.load(options)?;
        Ok(self.runtime.block_on(self.engine.build(options)))
    }

    /// Build on a runtime worker and hand the result to `on_complete`.
    ///
    /// `on_complete` runs exactly once, on a thread that may call back into
    /// the bridge's blocking API.
    pub fn build_async<F>(&self, options: Handle, on_complete: F) -> Result<()>
    where
        F: FnOnce(BuildResult) + Send + 'static,
    {
        let options = self.options.load(options)?;
        let engine = Arc::clone(&self.engine);
        let handle = self.runtime.handle().clone();
        self.runtime.spawn_blocking(move || {
            let result = handle.block_on(engine.build(options));
            on_complete(result);
        });
        Ok(())
    }

    // Contexts

    /// Snapshot `options` into a new context and run plugin setup once.
    pub fn context_create(&self, options: Handle) -> Result<ContextCreated> {
        let options = self.options.load(options)?;
        match self.engine.context(options) {
            Ok(context) => Ok(ContextCreated::Ready(self.contexts.insert(Arc::new(context)))),
            Err(err) => {
                tracing::debug!(errors = err.errors.len(), "context creation failed");
                Ok(ContextCreated::Failed(err.errors))
            }
        }
    }

    /// Run one pass on the calling thread.
    pub fn context_build(&self, context: Handle) -> Result<BuildResult> {
        let context = self.contexts.load(context)?;
        Ok(self.runtime.block_on(context.rebuild()))
    }

    /// Rebuild on a runtime worker. See [`build_async`](Self::build_async).
    pub fn context_build_async<F>(&self, context: Handle, on_complete: F) -> Result<()>
    where
        F: FnOnce(BuildResult) + Send + 'static,
    {
        let context = self.contexts.load(context)?;
        let handle = self.runtime.handle().clone();
        self.runtime.spawn_blocking(move || {
            let result = handle.block_on(context.rebuild());
            on_complete(result);
        });
        Ok(())
    }

    /// Cancel passes already running. Later passes are unaffected.
    pub fn context_cancel(&self, context: Handle) -> Result<()> {
        self.contexts.load(context)?.cancel();
        Ok(())
    }

    /// Release a context and dispose it. Releasing twice is a no-op.
    ///
    /// Passes still running are cancelled; plugin teardown waits for them.
    pub fn context_destroy(&self, context: Handle) -> Result<()> {
        self.contexts.check_namespace(context)?;
        if let Some(context) = self.contexts.delete(context) {
            context.dispose();
        }
        Ok(())
    }

    // Plugins

    /// Register a foreign plugin. `setup` must not be null.
    pub fn plugin_create(
        &self,
        name: String,
        setup: abi::PluginSetupCallback,
        user_data: UserData,
        destructor: abi::PluginDestructor,
    ) -> Result<Handle> {
        let descriptor = PluginDescriptor::new(name, setup, user_data, destructor)?;
        tracing::debug!(plugin = descriptor.name(), "registered plugin");
        Ok(self.plugins.insert(Arc::new(descriptor)))
    }

    /// Unregister a plugin so it can no longer be attached.
    ///
    /// Contexts already running its hooks keep them. The foreign destructor
    /// runs now if no context holds the plugin, otherwise when the last one
    /// is destroyed.
    pub fn plugin_destroy(&self, plugin: Handle) -> Result<()> {
        self.plugins.check_namespace(plugin)?;
        match self.plugins.delete(plugin) {
            Some(descriptor) => {
                descriptor.release();
                Ok(())
            }
            None => Err(crate::BridgeError::InvalidHandle {
                namespace: Namespace::Plugin,
                handle: plugin,
            }),
        }
    }

    /// Buffer an on-start hook in a live setup session.
    pub fn plugin_builder_on_start(
        &self,
        session: Handle,
        callback: abi::PluginOnStartCallback,
        release: abi::PluginHookResultRelease,
        user_data: UserData,
    ) -> Result<()> {
        plugin::register_on_start(&self.sessions, session, callback, release, user_data)
    }

    /// Buffer an on-end hook in a live setup session.
    pub fn plugin_builder_on_end(
        &self,
        session: Handle,
        callback: abi::PluginOnEndCallback,
        release: abi::PluginHookResultRelease,
        user_data: UserData,
    ) -> Result<()> {
        plugin::register_on_end(&self.sessions, session, callback, release, user_data)
    }
}

impl<E: Engine> std::fmt::Debug for Bridge<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("options", &self.options)
            .field("contexts", &self.contexts)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}
