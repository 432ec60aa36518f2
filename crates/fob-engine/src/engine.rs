//! The fixed API surface every engine implements.

use async_trait::async_trait;
use thiserror::Error;

use crate::message::Message;
use crate::options::BuildOptions;
use crate::result::BuildResult;

/// Context creation failed; no context exists.
#[derive(Debug, Clone, Error)]
#[error("failed to create build context ({} error(s))", errors.len())]
pub struct ContextError {
    pub errors: Vec<Message>,
}

impl ContextError {
    pub fn new(errors: Vec<Message>) -> Self {
        Self { errors }
    }
}

/// A build engine.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    type Context: BuildContext;

    /// One-shot build: set up plugins, run one pass, tear down.
    async fn build(&self, options: BuildOptions) -> BuildResult;

    /// Create a long-lived context. Plugin setup runs here, once.
    fn context(&self, options: BuildOptions) -> Result<Self::Context, ContextError>;
}

/// A long-lived build session.
#[async_trait]
pub trait BuildContext: Send + Sync + 'static {
    /// Run one build pass. Concurrent calls are allowed and independent.
    async fn rebuild(&self) -> BuildResult;

    /// Ask in-flight passes to stop at their next checkpoint.
    fn cancel(&self);

    /// Release resources and run plugin dispose hooks. Idempotent.
    fn dispose(&self);
}
