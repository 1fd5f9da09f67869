//! # Symbols
//!
//! Symbol acquisition and the files it produces: the per-process scratch
//! directory, the two runtime artifact paths, and the symbol store that can
//! download both.

pub mod paths;
pub mod scratch;
pub mod store;

pub use paths::{Artifact, CachedPaths};
pub use scratch::ScratchDirectory;
pub use store::{read_memory_for_symbols, StoreState};
