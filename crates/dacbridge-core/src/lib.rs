//! # dacbridge-core
//!
//! The native side of a managed-runtime debugger extension.
//!
//! This crate sits between a host debugger (a live process or a crash dump)
//! and an out-of-process analysis component that reconstructs managed-runtime
//! state from memory. It provides:
//! - The data access contract the analysis component calls back into
//!   ([`target::MemoryTarget`])
//! - Discovery and start of a secondary runtime that runs managed helper code
//!   ([`hosting`])
//! - Symbol store management, runtime artifact paths and a private scratch
//!   directory ([`symbols`])
//! - Line, local variable and sequence point lookups over legacy and
//!   portable symbol files ([`pdb`])
//!
//! ## Platform Support
//!
//! - **Windows** (desktop family): legacy symbol binder first, thread contexts
//!   captured by switching the host's current thread
//! - **Linux**: portable symbols only, per-thread contexts from the host, data
//!   access library served through a scratch-directory symlink
//! - **macOS**: as Linux, without the symlink
//!
//! ## Threading
//!
//! Every operation runs on the host's command thread, one call at a time.
//! All process-wide state lives in one [`BridgeContext`] that is shared via
//! `Rc`; only its scratch directory handle is `Send + Sync`.
//!
//! ## Collaborators
//!
//! The host debugger, the runtime loader and the legacy symbol binder are
//! traits ([`DebugHost`], [`hosting::RuntimeLoader`],
//! [`pdb::native::NativeSymbolBinder`]) bound by the embedding frontend.

pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod hosting;
pub mod pdb;
pub mod symbols;
pub mod target;
pub mod types;

pub use config::BridgeConfig;
pub use context::BridgeContext;
// Re-export commonly used types
pub use error::{BridgeError, HResult, Result};
pub use host::DebugHost;
pub use pdb::SymbolReader;
pub use target::MemoryTarget;
pub use types::{Address, MemoryRange, MethodToken, ModuleDescriptor, Platform};
