//! # Hosted Helper Entry Points
//!
//! The managed helper routines run inside the secondary runtime and are
//! reached through delegates resolved by (assembly, type, method) name.
//! [`HelperTable`] holds the full set; it is only ever built complete, either
//! by [`HelperTable::bind`] against a started runtime or by a controlling
//! frontend that seeds it directly.
//!
//! ## Entry Points
//!
//! | Type                 | Method                  |
//! |----------------------|-------------------------|
//! | `SOS.SymbolReader`   | `InitializeSymbolStore` |
//! | `SOS.SymbolReader`   | `DisplaySymbolStore`    |
//! | `SOS.SymbolReader`   | `DisableSymbolStore`    |
//! | `SOS.SymbolReader`   | `LoadNativeSymbols`     |
//! | `SOS.SymbolReader`   | `LoadSymbolsForModule`  |
//! | `SOS.SymbolReader`   | `Dispose`               |
//! | `SOS.SymbolReader`   | `ResolveSequencePoint`  |
//! | `SOS.SymbolReader`   | `GetLocalVariableName`  |
//! | `SOS.SymbolReader`   | `GetLineByILOffset`     |
//! | `SOS.MetadataHelper` | `GetMetadataLocator`    |

use std::any::Any;
use std::fmt;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, error};

use crate::error::{BridgeError, HResult, Result};
use crate::types::{Address, MemoryRange, MethodToken};

/// Managed assembly holding the helper types.
pub const HELPER_ASSEMBLY: &str = "SOS.NETCore";
/// Type hosting the symbol-reading entry points.
pub const SYMBOL_READER_TYPE: &str = "SOS.SymbolReader";
/// Type hosting the metadata entry point.
pub const METADATA_HELPER_TYPE: &str = "SOS.MetadataHelper";

/// Every entry point as (type, method), in binding order.
pub const ENTRY_POINTS: [(&str, &str); 10] = [
    (SYMBOL_READER_TYPE, "InitializeSymbolStore"),
    (SYMBOL_READER_TYPE, "DisplaySymbolStore"),
    (SYMBOL_READER_TYPE, "DisableSymbolStore"),
    (SYMBOL_READER_TYPE, "LoadNativeSymbols"),
    (SYMBOL_READER_TYPE, "LoadSymbolsForModule"),
    (SYMBOL_READER_TYPE, "Dispose"),
    (SYMBOL_READER_TYPE, "ResolveSequencePoint"),
    (SYMBOL_READER_TYPE, "GetLocalVariableName"),
    (SYMBOL_READER_TYPE, "GetLineByILOffset"),
    (METADATA_HELPER_TYPE, "GetMetadataLocator"),
];

/// Memory-read callback handed to the helpers; returns bytes read, 0 on failure.
pub type ReadMemory = Rc<dyn Fn(Address, &mut [u8]) -> usize>;

/// Settings forwarded to the symbol store initialization entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolStoreOptions
{
    /// Verbose symbol-server logging
    pub logging: bool,
    /// Use the public Microsoft symbol server
    pub msdl: bool,
    /// Use the internal symbol server
    pub symweb: bool,
    /// Explicit symbol server URL
    pub symbol_server: Option<String>,
    /// Local download cache
    pub cache_directory: Option<PathBuf>,
    /// Host-style symbol path to parse instead of the toggles above
    pub windows_symbol_path: Option<String>,
}

impl SymbolStoreOptions
{
    /// Options that only parse the host's symbol path, with every server
    /// toggle off.
    pub fn from_symbol_path(symbol_path: impl Into<String>) -> Self
    {
        Self {
            windows_symbol_path: Some(symbol_path.into()),
            ..Self::default()
        }
    }
}

/// Handle of a symbol reader living in the secondary runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderHandle(NonZeroU64);

impl ReaderHandle
{
    /// Wrap a raw handle; zero means "no reader".
    pub fn new(raw: u64) -> Option<Self>
    {
        NonZeroU64::new(raw).map(ReaderHandle)
    }

    /// The raw handle value.
    pub fn raw(self) -> u64
    {
        self.0.get()
    }
}

impl fmt::Display for ReaderHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:x}", self.0)
    }
}

/// Arguments of `LoadSymbolsForModule`
pub struct PortableLoadRequest<'a>
{
    /// Module file name; `None` for modules loaded from memory
    pub module_name: Option<&'a str>,
    /// The image is mapped with its on-disk layout
    pub is_file_layout: bool,
    /// PE image in the target
    pub pe: MemoryRange,
    /// In-memory symbol file in the target, if any
    pub pdb: Option<MemoryRange>,
    /// Reads target memory
    pub read_memory: ReadMemory,
}

/// Arguments of `LoadNativeSymbols`
pub struct NativeModuleImage<'a>
{
    /// Where downloaded files are staged
    pub temp_directory: &'a Path,
    /// Path of the module as recorded by the host
    pub module_path: &'a Path,
    /// Load address of the module
    pub address: Address,
    /// Mapped size of the module
    pub size: u64,
    /// Reads target memory
    pub read_memory: ReadMemory,
}

/// Arguments of `GetMetadataLocator`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest<'a>
{
    /// Path of the image whose metadata is wanted
    pub image_path: &'a str,
    /// PE timestamp of the image
    pub image_timestamp: u32,
    /// PE size of the image
    pub image_size: u32,
    /// Module version id
    pub mvid: [u8; 16],
    /// RVA of the metadata
    pub md_rva: u32,
    /// Request flags
    pub flags: u32,
}

/// `InitializeSymbolStore(options) -> success`
pub type InitializeSymbolStoreFn = Box<dyn Fn(&SymbolStoreOptions) -> bool>;
/// `DisplaySymbolStore(write_line)`
pub type DisplaySymbolStoreFn = Box<dyn Fn(&mut dyn FnMut(&str))>;
/// `DisableSymbolStore()`
pub type DisableSymbolStoreFn = Box<dyn Fn()>;
/// `LoadNativeSymbols(image, on_symbol_file(module_file_name, symbol_file_path))`
pub type LoadNativeSymbolsFn = Box<dyn Fn(&NativeModuleImage<'_>, &mut dyn FnMut(&str, &Path))>;
/// `LoadSymbolsForModule(request) -> reader`
pub type LoadSymbolsForModuleFn = Box<dyn Fn(&PortableLoadRequest<'_>) -> Option<ReaderHandle>>;
/// `Dispose(reader)`
pub type DisposeFn = Box<dyn Fn(ReaderHandle)>;
/// `ResolveSequencePoint(reader, file, line) -> (method, il_offset)`
pub type ResolveSequencePointFn = Box<dyn Fn(ReaderHandle, &str, u32) -> Option<(MethodToken, u32)>>;
/// `GetLocalVariableName(reader, method, index) -> name`
pub type GetLocalVariableNameFn = Box<dyn Fn(ReaderHandle, MethodToken, u32) -> Option<String>>;
/// `GetLineByILOffset(reader, method, il_offset) -> (line, file)`
pub type GetLineByIlOffsetFn = Box<dyn Fn(ReaderHandle, MethodToken, u64) -> Option<(u32, String)>>;
/// `GetMetadataLocator(request, buffer) -> bytes written`
pub type GetMetadataLocatorFn = Box<dyn Fn(&MetadataRequest<'_>, &mut [u8]) -> std::result::Result<usize, HResult>>;

/// Type-erased delegate as produced by a [`HostedRuntime`]
///
/// A delegate is one of the `*Fn` aliases of this module boxed as [`Any`];
/// anything else is treated as an entry point with the wrong signature.
pub type Delegate = Box<dyn Any>;

/// A started secondary runtime instance
pub trait HostedRuntime
{
    /// Resolve the static method `type_name::method` of `assembly`.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: no such method
    /// - `Propagated`: the runtime's own failure status
    fn create_delegate(&self, assembly: &str, type_name: &str, method: &str) -> Result<Delegate>;
}

/// Complete, immutable table of hosted entry points
pub struct HelperTable
{
    /// `SymbolReader.InitializeSymbolStore`
    pub initialize_symbol_store: InitializeSymbolStoreFn,
    /// `SymbolReader.DisplaySymbolStore`
    pub display_symbol_store: DisplaySymbolStoreFn,
    /// `SymbolReader.DisableSymbolStore`
    pub disable_symbol_store: DisableSymbolStoreFn,
    /// `SymbolReader.LoadNativeSymbols`
    pub load_native_symbols: LoadNativeSymbolsFn,
    /// `SymbolReader.LoadSymbolsForModule`
    pub load_symbols_for_module: LoadSymbolsForModuleFn,
    /// `SymbolReader.Dispose`
    pub dispose: DisposeFn,
    /// `SymbolReader.ResolveSequencePoint`
    pub resolve_sequence_point: ResolveSequencePointFn,
    /// `SymbolReader.GetLocalVariableName`
    pub get_local_variable_name: GetLocalVariableNameFn,
    /// `SymbolReader.GetLineByILOffset`
    pub get_line_by_il_offset: GetLineByIlOffsetFn,
    /// `MetadataHelper.GetMetadataLocator`
    pub get_metadata_locator: GetMetadataLocatorFn,
}

impl fmt::Debug for HelperTable
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("HelperTable").finish_non_exhaustive()
    }
}

impl HelperTable
{
    /// Resolve every entry point from `runtime`.
    ///
    /// ## Errors
    ///
    /// - `HostFailure`: any entry point is missing or has the wrong signature;
    ///   nothing is kept in that case
    pub fn bind(runtime: &dyn HostedRuntime) -> Result<Self>
    {
        let [initialize, display, disable, load_native, load_module, dispose, resolve, local_name, line, metadata] =
            ENTRY_POINTS;

        let table = Self {
            initialize_symbol_store: resolve_entry(runtime, initialize)?,
            display_symbol_store: resolve_entry(runtime, display)?,
            disable_symbol_store: resolve_entry(runtime, disable)?,
            load_native_symbols: resolve_entry(runtime, load_native)?,
            load_symbols_for_module: resolve_entry(runtime, load_module)?,
            dispose: resolve_entry(runtime, dispose)?,
            resolve_sequence_point: resolve_entry(runtime, resolve)?,
            get_local_variable_name: resolve_entry(runtime, local_name)?,
            get_line_by_il_offset: resolve_entry(runtime, line)?,
            get_metadata_locator: resolve_entry(runtime, metadata)?,
        };
        debug!("Bound {} hosted entry points", ENTRY_POINTS.len());
        Ok(table)
    }
}

fn resolve_entry<T: 'static>(runtime: &dyn HostedRuntime, (type_name, method): (&str, &str)) -> Result<T>
{
    let delegate = runtime
        .create_delegate(HELPER_ASSEMBLY, type_name, method)
        .map_err(|err| {
            error!("Failed to resolve {type_name}.{method}: {err}");
            BridgeError::HostFailure(format!("entry point {type_name}.{method} unavailable: {err}"))
        })?;

    delegate.downcast::<T>().map(|entry| *entry).map_err(|_| {
        error!("Entry point {type_name}.{method} has an unexpected signature");
        BridgeError::HostFailure(format!("entry point {type_name}.{method} has an unexpected signature"))
    })
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_reader_handle_zero_is_none()
    {
        assert!(ReaderHandle::new(0).is_none());
        assert_eq!(ReaderHandle::new(0x42).map(ReaderHandle::raw), Some(0x42));
    }

    #[test]
    fn test_entry_points_all_from_helper_types()
    {
        assert_eq!(
            ENTRY_POINTS
                .iter()
                .filter(|(type_name, _)| *type_name == SYMBOL_READER_TYPE)
                .count(),
            9
        );
        assert_eq!(ENTRY_POINTS[9], (METADATA_HELPER_TYPE, "GetMetadataLocator"));
    }

    #[test]
    fn test_options_from_symbol_path_turn_servers_off()
    {
        let options = SymbolStoreOptions::from_symbol_path("srv*c:\\symbols");
        assert!(!options.msdl && !options.symweb && !options.logging);
        assert!(options.symbol_server.is_none());
        assert_eq!(options.windows_symbol_path.as_deref(), Some("srv*c:\\symbols"));
    }
}
