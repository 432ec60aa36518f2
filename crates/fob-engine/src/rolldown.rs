//! [`Engine`] implementation backed by Rolldown.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rolldown::{BundlerBuilder, BundlerOptions, InputItem, IsExternal};
use rolldown_common::Output;

use crate::cancel::CancelSignal;
use crate::diagnostics;
use crate::engine::{BuildContext, ContextError, Engine};
use crate::message::Message;
use crate::options::BuildOptions;
use crate::plugin::{HookResult, PluginHooks};
use crate::result::{BuildResult, OutputFile};

/// Reported when a pass observes a cancellation request.
pub const CANCELED_TEXT: &str = "The build was canceled";

/// Reported when a disposed context is asked to rebuild.
pub const DISPOSED_TEXT: &str = "The build context has been disposed";

/// Externalizes bare package imports when bundling is disabled.
const BARE_IMPORT_PATTERN: &str = "^[^./]";

#[derive(Debug, Clone, Copy, Default)]
pub struct RolldownEngine;

impl RolldownEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Engine for RolldownEngine {
    type Context = RolldownContext;

    async fn build(&self, options: BuildOptions) -> BuildResult {
        match self.context(options) {
            Ok(context) => {
                let result = context.rebuild().await;
                context.dispose();
                result
            }
            Err(err) => BuildResult::from_errors(err.errors),
        }
    }

    fn context(&self, options: BuildOptions) -> Result<RolldownContext, ContextError> {
        options.validate().map_err(ContextError::new)?;
        let hooks = PluginHooks::setup(&options.plugins);
        tracing::debug!(
            entry_points = options.entry_points.len(),
            plugins = options.plugins.len(),
            on_start = hooks.on_start_count(),
            on_end = hooks.on_end_count(),
            "created build context"
        );
        Ok(RolldownContext {
            options,
            hooks: Arc::new(hooks),
            cancel: CancelSignal::new(),
            passes: Mutex::new(PassState::default()),
        })
    }
}

#[derive(Debug, Default)]
struct PassState {
    active: usize,
    disposed: bool,
}

/// A long-lived Rolldown build session.
///
/// Dispose hooks never run while a pass is in flight: disposing a busy
/// context cancels its passes, and the last one to finish runs the hooks.
pub struct RolldownContext {
    options: BuildOptions,
    hooks: Arc<PluginHooks>,
    cancel: CancelSignal,
    passes: Mutex<PassState>,
}

impl RolldownContext {
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn is_disposed(&self) -> bool {
        self.passes.lock().disposed
    }

    /// Number of passes currently running.
    pub fn active_passes(&self) -> usize {
        self.passes.lock().active
    }

    fn enter_pass(&self) -> Option<PassGuard<'_>> {
        let mut passes = self.passes.lock();
        if passes.disposed {
            return None;
        }
        passes.active += 1;
        Some(PassGuard { context: self })
    }

    fn leave_pass(&self) {
        let dispose_now = {
            let mut passes = self.passes.lock();
            passes.active -= 1;
            passes.active == 0 && passes.disposed
        };
        if dispose_now {
            tracing::debug!("last pass finished on a disposed context");
            self.hooks.dispose();
        }
    }
}

struct PassGuard<'a> {
    context: &'a RolldownContext,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.context.leave_pass();
    }
}

#[async_trait]
impl BuildContext for RolldownContext {
    async fn rebuild(&self) -> BuildResult {
        let Some(pass) = self.enter_pass() else {
            return BuildResult::from_errors(vec![Message::new(DISPOSED_TEXT)]);
        };

        let token = self.cancel.token();

        let hooks = Arc::clone(&self.hooks);
        let start = off_runtime(move || hooks.run_on_start())
            .await
            .unwrap_or_else(|| HookResult::error(interrupted()));
        let mut result = BuildResult {
            warnings: start.warnings,
            ..Default::default()
        };

        if !start.errors.is_empty() {
            result.errors = start.errors;
        } else if token.is_cancelled() {
            result.errors.push(canceled());
        } else if !self.options.entry_points.is_empty() {
            tokio::select! {
                bundled = bundle(&self.options) => match bundled {
                    Ok((files, warnings)) => {
                        result.output_files = files;
                        result.warnings.extend(warnings);
                    }
                    Err(errors) => result.errors.extend(errors),
                },
                _ = token.cancelled() => result.errors.push(canceled()),
            }
        }

        let hooks = Arc::clone(&self.hooks);
        let result = off_runtime(move || {
            hooks.run_on_end(&mut result);
            result
        })
        .await
        .unwrap_or_else(|| BuildResult::from_errors(vec![interrupted()]));

        tracing::debug!(
            outputs = result.output_files.len(),
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "build pass finished"
        );
        drop(pass);
        result
    }

    fn cancel(&self) {
        tracing::debug!("cancelling in-flight build passes");
        self.cancel.cancel();
    }

    fn dispose(&self) {
        let dispose_now = {
            let mut passes = self.passes.lock();
            if !passes.disposed {
                passes.disposed = true;
                tracing::debug!(active = passes.active, "disposing build context");
                self.cancel.cancel();
            }
            passes.active == 0
        };
        if dispose_now {
            self.hooks.dispose();
        }
    }
}

impl Drop for RolldownContext {
    fn drop(&mut self) {
        self.hooks.dispose();
    }
}

/// Run plugin hooks on the blocking pool. Hooks may block, and foreign hooks
/// may drive a runtime of their own, neither of which is allowed on a thread
/// inside the runtime. `None` means the runtime shut down first.
async fn off_runtime<R, F>(f: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => Some(value),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => {
            tracing::error!(%err, "plugin hooks did not run");
            None
        }
    }
}

fn interrupted() -> Message {
    Message::new("The build was interrupted by runtime shutdown").with_id("interrupted")
}

fn canceled() -> Message {
    Message::new(CANCELED_TEXT).with_id("canceled")
}

fn bundler_options(options: &BuildOptions) -> BundlerOptions {
    let input = options
        .entry_points
        .iter()
        .map(|entry| InputItem {
            name: Some(entry.output_name()),
            import: entry.input_path.clone(),
        })
        .collect();

    let mut bundler_options = BundlerOptions {
        input: Some(input),
        cwd: options.working_dir.clone(),
        ..Default::default()
    };

    if !options.bundle {
        bundler_options.external = Some(IsExternal::from(vec![BARE_IMPORT_PATTERN.to_string()]));
    }

    bundler_options
}

async fn bundle(options: &BuildOptions) -> Result<(Vec<OutputFile>, Vec<Message>), Vec<Message>> {
    let mut bundler = BundlerBuilder::default()
        .with_options(bundler_options(options))
        .build()
        .map_err(|e| diagnostics::from_rolldown(&e))?;

    let output = bundler
        .generate()
        .await
        .map_err(|e| diagnostics::from_rolldown(&e))?;

    let files = output
        .assets
        .iter()
        .map(|item| {
            let (filename, contents) = match item {
                Output::Chunk(chunk) => (chunk.filename.to_string(), chunk.code.as_bytes().to_vec()),
                Output::Asset(asset) => (asset.filename.to_string(), asset.source.as_bytes().to_vec()),
            };
            OutputFile::new(output_path(options.working_dir.as_deref(), &filename), contents)
        })
        .collect();

    let warnings = output
        .warnings
        .iter()
        .flat_map(|w| diagnostics::from_rolldown(w))
        .collect();

    Ok((files, warnings))
}

fn output_path(working_dir: Option<&Path>, filename: &str) -> String {
    match working_dir {
        Some(dir) => dir.join(filename).to_string_lossy().into_owned(),
        None => filename.to_string(),
    }
}
