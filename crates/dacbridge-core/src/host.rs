//! # Host Debugging Environment
//!
//! The interface this bridge consumes from the debugger it is loaded into.
//!
//! The host owns the real process/dump access: module tables, memory, the
//! notion of a "current thread", register contexts and the configured symbol
//! path. Different hosts offer different subsets, so every capability that is
//! not universally available has a default implementation reporting
//! [`BridgeError::ServiceUnavailable`] or [`BridgeError::Unsupported`].
//!
//! ## Threading
//!
//! All methods are called from the host's command-dispatch thread, one call
//! at a time. Implementations that need mutable state use interior
//! mutability; the bridge never holds a host call across another one.

use std::path::Path;

use crate::error::{BridgeError, Result};
use crate::types::{Address, HostModule};

/// Services of the host debugger
pub trait DebugHost
{
    /// Machine type of the target (`IMAGE_FILE_MACHINE_*`).
    fn processor_type(&self) -> Result<u32>;

    /// Load address of the module listed under `name`.
    fn module_base(&self, name: &str) -> Result<Address>;

    /// Full module-table entry for the module listed under `name`.
    fn module_by_name(&self, name: &str) -> Result<HostModule>;

    /// Read target memory into `buffer`, returning the number of bytes read.
    fn read_virtual(&self, address: Address, buffer: &mut [u8]) -> Result<usize>;

    /// `true` when the target is a crash dump rather than a live process.
    fn is_dump(&self) -> bool
    {
        false
    }

    /// OS thread id of the host's current thread.
    fn current_thread_system_id(&self) -> Result<u32>;

    /// Engine-internal id of the host's current thread.
    fn current_thread_id(&self) -> Result<u32>
    {
        Err(BridgeError::ServiceUnavailable("current thread id".to_string()))
    }

    /// Translate an OS thread id into the engine-internal id.
    fn thread_id_by_system_id(&self, system_id: u32) -> Result<u32>
    {
        Err(BridgeError::ServiceUnavailable(format!(
            "thread id lookup for system id {system_id}"
        )))
    }

    /// Make `id` the host's current thread.
    fn set_current_thread_id(&self, id: u32) -> Result<()>
    {
        Err(BridgeError::ServiceUnavailable(format!("switching to thread {id}")))
    }

    /// Capture the register context of the host's current thread.
    ///
    /// `context` is zeroed by the caller and must be filled according to
    /// `context_flags`.
    fn current_thread_context(&self, context_flags: u32, context: &mut [u8]) -> Result<()>
    {
        let _ = (context_flags, context);
        Err(BridgeError::ServiceUnavailable("current thread context".to_string()))
    }

    /// Capture the register context of the thread with OS id `system_id`
    /// without touching the current thread.
    fn thread_context_by_system_id(&self, system_id: u32, context_flags: u32, context: &mut [u8]) -> Result<()>
    {
        let _ = (context_flags, context);
        Err(BridgeError::ServiceUnavailable(format!(
            "thread context by id for thread {system_id}"
        )))
    }

    /// Unwind `context` by one frame for thread `system_id`.
    fn virtual_unwind(&self, system_id: u32, context: &mut [u8]) -> Result<()>
    {
        let _ = context;
        Err(BridgeError::ServiceUnavailable(format!(
            "virtual unwind for thread {system_id}"
        )))
    }

    /// The host's configured symbol search path.
    fn symbol_path(&self) -> Result<String>
    {
        Err(BridgeError::ServiceUnavailable("symbol path".to_string()))
    }

    /// Hand a downloaded native symbol file to the host's own symbol loader.
    fn add_module_symbol(&self, symbol_file: &Path) -> Result<()>
    {
        Err(BridgeError::Unsupported(format!(
            "host cannot load symbol file {}",
            symbol_file.display()
        )))
    }
}
