//! Handle-based C ABI over the fob build engine.
//!
//! Foreign runtimes drive builds through the functions in [`ffi`], declared
//! in `include/fob_bridge.h`. Everything they touch is an opaque handle into
//! a [`Bridge`], and every structure handed back is owned by the bridge until
//! its destroy function is called.
//!
//! The same machinery is usable from Rust through [`Bridge`], which returns
//! contract violations as [`BridgeError`] instead of aborting.
//!
//! # Configuration
//!
//! The process-wide bridge reads `FOB_BRIDGE_WORKER_THREADS`,
//! `FOB_BRIDGE_THREAD_NAME` and `FOB_BRIDGE_LOG_LEVEL`; see [`BridgeConfig`].

pub mod abi;
pub mod bridge;
pub mod config;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod marshal;
pub mod plugin;
pub mod runtime;

pub use abi::UserData;
pub use bridge::{Bridge, ContextCreated};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use handle::{Handle, HandleTable, Namespace};
pub use plugin::PluginDescriptor;
