//! # Hosting
//!
//! Everything needed to run the managed helper code: choosing a runtime
//! installation ([`locator`]), building its trust list ([`tpa`]), starting it
//! ([`bootstrap`]) and binding the helper entry points ([`helpers`]).

pub mod bootstrap;
pub mod helpers;
pub mod locator;
pub mod tpa;

pub use bootstrap::{HostSeed, HostingState, RuntimeLoader, RuntimeProperties};
pub use helpers::{
    Delegate, HelperTable, HostedRuntime, MetadataRequest, NativeModuleImage, PortableLoadRequest, ReadMemory,
    ReaderHandle, SymbolStoreOptions,
};
pub use locator::HostRuntime;
pub use tpa::TrustedAssemblies;
