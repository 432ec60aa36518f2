//! Build engine surface used by the fob bridge.
//!
//! The [`Engine`] and [`BuildContext`] traits are the fixed API the bridge
//! drives. [`RolldownEngine`] implements them on top of Rolldown. Plugins are
//! expressed with [`Plugin`] and register their hooks through
//! [`PluginBuild`].
//!
//! ```rust,no_run
//! use fob_engine::{BuildContext, BuildOptions, Engine, RolldownEngine};
//!
//! # async fn run() {
//! let engine = RolldownEngine::new();
//! let options = BuildOptions::new()
//!     .bundle(true)
//!     .entry_point("src/index.js", "index.js")
//!     .working_dir("/path/to/project");
//!
//! let context = engine.context(options).expect("valid options");
//! let result = context.rebuild().await;
//! for error in &result.errors {
//!     eprintln!("{error}");
//! }
//! context.dispose();
//! # }
//! ```

pub mod cancel;
pub mod diagnostics;
pub mod engine;
pub mod message;
pub mod options;
pub mod plugin;
pub mod result;
pub mod rolldown;

#[cfg(feature = "logging")]
pub mod logging;

pub use cancel::{CancelSignal, CancelToken};
pub use engine::{BuildContext, ContextError, Engine};
pub use message::{Location, Message, Note};
pub use options::{BuildOptions, EntryPoint};
pub use plugin::{
    HookResult, OnDisposeCallback, OnEndCallback, OnStartCallback, Plugin, PluginBuild,
    PluginHooks,
};
pub use result::{BuildResult, OutputFile};
pub use rolldown::{CANCELED_TEXT, DISPOSED_TEXT, RolldownContext, RolldownEngine};
