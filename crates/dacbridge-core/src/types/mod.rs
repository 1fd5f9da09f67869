//! # Types
//!
//! Plain value types shared by every component of the bridge.
//!
//! These types keep addresses, ranges, tokens and platform rules apart from
//! the raw integers and strings the data access contract passes around.

pub mod address;
pub mod module;
pub mod platform;

// Re-export all public types
pub use address::{Address, MemoryRange};
pub use module::{HostModule, MethodToken, ModuleDescriptor};
pub use platform::{Architecture, Platform, RUNTIME_LIBRARY_STEM};
