//! Shared fixtures for the integration tests: a scriptable host, a scripted
//! helper table, a fake runtime loader and a fake legacy symbol binder.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Once;

use dacbridge_core::config::BridgeConfig;
use dacbridge_core::context::BridgeContext;
use dacbridge_core::error::{BridgeError, HResult, Result};
use dacbridge_core::host::DebugHost;
use dacbridge_core::hosting::helpers::{
    HelperTable, HostedRuntime, MetadataRequest, NativeModuleImage, PortableLoadRequest, ReaderHandle,
};
use dacbridge_core::hosting::{Delegate, RuntimeLoader, RuntimeProperties, SymbolStoreOptions};
use dacbridge_core::pdb::native::{ImageAddressing, ImageReader, NativeSymbolBinder, NativeSymbolReader, INVALID_IL_OFFSET};
use dacbridge_core::pdb::scope::LexicalScope;
use dacbridge_core::pdb::sequence::{SequencePoint, SymbolDocument};
use dacbridge_core::types::{Address, HostModule, MethodToken, Platform};
use dacbridge_utils::{LogFormat, LogLevel};

/// `IMAGE_FILE_MACHINE_AMD64`
pub const MACHINE_AMD64: u32 = 0x8664;

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// In-memory host debugger
#[derive(Default)]
pub struct FakeHost
{
    pub modules: RefCell<HashMap<String, HostModule>>,
    pub memory: RefCell<Vec<(u64, Vec<u8>)>>,
    pub dump: Cell<bool>,
    pub reads: Cell<u32>,
    /// Fail reads running past the end of a mapped segment
    pub strict_reads: Cell<bool>,
    /// Engine id of the current thread
    pub current_thread: Cell<u32>,
    /// OS id -> engine id
    pub threads: RefCell<HashMap<u32, u32>>,
    /// Every engine id passed to `set_current_thread_id`
    pub switches: RefCell<Vec<u32>>,
    /// Engine id that refuses to become current
    pub refuse_switch_to: Cell<Option<u32>>,
    /// Engine id current at each context capture
    pub captured_on: RefCell<Vec<u32>>,
    pub capture_fails: Cell<bool>,
    /// OS ids passed to `thread_context_by_system_id`
    pub by_id_requests: RefCell<Vec<u32>>,
    pub unwinds: RefCell<Vec<u32>>,
    pub symbol_path: RefCell<Option<String>>,
    pub added_symbols: RefCell<Vec<PathBuf>>,
}

impl FakeHost
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn add_module(&self, name: &str, base: u64, size: u64, image_path: impl Into<PathBuf>)
    {
        let index = u32::try_from(self.modules.borrow().len()).unwrap();
        self.modules.borrow_mut().insert(
            name.to_string(),
            HostModule {
                index,
                base: Address::new(base),
                size,
                image_path: image_path.into(),
            },
        );
    }

    pub fn map_memory(&self, base: u64, bytes: Vec<u8>)
    {
        self.memory.borrow_mut().push((base, bytes));
    }

    pub fn add_thread(&self, system_id: u32, engine_id: u32)
    {
        self.threads.borrow_mut().insert(system_id, engine_id);
    }

    pub fn set_symbol_path(&self, path: &str)
    {
        *self.symbol_path.borrow_mut() = Some(path.to_string());
    }
}

impl DebugHost for FakeHost
{
    fn processor_type(&self) -> Result<u32>
    {
        Ok(MACHINE_AMD64)
    }

    fn module_base(&self, name: &str) -> Result<Address>
    {
        self.module_by_name(name).map(|module| module.base)
    }

    fn module_by_name(&self, name: &str) -> Result<HostModule>
    {
        self.modules
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("module {name}")))
    }

    fn read_virtual(&self, address: Address, buffer: &mut [u8]) -> Result<usize>
    {
        self.reads.set(self.reads.get() + 1);
        let address = address.value();
        for (base, bytes) in self.memory.borrow().iter() {
            let end = base + bytes.len() as u64;
            if address >= *base && address < end {
                let start = usize::try_from(address - base).unwrap();
                let len = buffer.len().min(bytes.len() - start);
                if self.strict_reads.get() && len < buffer.len() {
                    return Err(BridgeError::Propagated(HResult::E_FAIL));
                }
                buffer[..len].copy_from_slice(&bytes[start..start + len]);
                return Ok(len);
            }
        }
        Err(BridgeError::Propagated(HResult::E_FAIL))
    }

    fn is_dump(&self) -> bool
    {
        self.dump.get()
    }

    fn current_thread_system_id(&self) -> Result<u32>
    {
        let current = self.current_thread.get();
        self.threads
            .borrow()
            .iter()
            .find(|(_, engine)| **engine == current)
            .map(|(system, _)| *system)
            .ok_or_else(|| BridgeError::NotFound("current thread".to_string()))
    }

    fn current_thread_id(&self) -> Result<u32>
    {
        Ok(self.current_thread.get())
    }

    fn thread_id_by_system_id(&self, system_id: u32) -> Result<u32>
    {
        self.threads
            .borrow()
            .get(&system_id)
            .copied()
            .ok_or_else(|| BridgeError::NotFound(format!("thread {system_id}")))
    }

    fn set_current_thread_id(&self, id: u32) -> Result<()>
    {
        self.switches.borrow_mut().push(id);
        if self.refuse_switch_to.get() == Some(id) {
            return Err(BridgeError::Propagated(HResult::E_ACCESSDENIED));
        }
        self.current_thread.set(id);
        Ok(())
    }

    fn current_thread_context(&self, _context_flags: u32, context: &mut [u8]) -> Result<()>
    {
        let current = self.current_thread.get();
        self.captured_on.borrow_mut().push(current);
        if self.capture_fails.get() {
            return Err(BridgeError::Propagated(HResult::E_FAIL));
        }
        if let Some(first) = context.first_mut() {
            *first = u8::try_from(current).unwrap_or(u8::MAX);
        }
        Ok(())
    }

    fn thread_context_by_system_id(&self, system_id: u32, _context_flags: u32, context: &mut [u8]) -> Result<()>
    {
        self.by_id_requests.borrow_mut().push(system_id);
        context.fill(0xcc);
        Ok(())
    }

    fn virtual_unwind(&self, system_id: u32, _context: &mut [u8]) -> Result<()>
    {
        self.unwinds.borrow_mut().push(system_id);
        Ok(())
    }

    fn symbol_path(&self) -> Result<String>
    {
        self.symbol_path
            .borrow()
            .clone()
            .ok_or_else(|| BridgeError::ServiceUnavailable("symbol path".to_string()))
    }

    fn add_module_symbol(&self, symbol_file: &Path) -> Result<()>
    {
        self.added_symbols.borrow_mut().push(symbol_file.to_path_buf());
        Ok(())
    }
}

/// Route bridge warnings to stdout once per test binary.
pub fn init_test_logging()
{
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if dacbridge_utils::init_logging_with_level(LogLevel::Warn, LogFormat::Pretty).is_ok() {
            dacbridge_utils::debug!("Test logging ready");
        }
    });
}

/// Config for `platform` with every directory below `scratch`.
pub fn config(platform: Platform, scratch: &Path) -> BridgeConfig
{
    init_test_logging();
    BridgeConfig::for_platform(platform)
        .with_temp_root(scratch)
        .with_module_directory(scratch.join("module"))
        .with_runtime_roots(vec![scratch.join("no-runtime-root")])
}

/// Context over `host` with the given platform rules.
pub fn context(platform: Platform, host: &Rc<FakeHost>, scratch: &Path) -> BridgeContext
{
    let host: Rc<dyn DebugHost> = Rc::clone(host) as Rc<dyn DebugHost>;
    BridgeContext::new(config(platform, scratch), host)
}

// ---------------------------------------------------------------------------
// Hosted helpers
// ---------------------------------------------------------------------------

/// Scripted behavior and call log of the hosted helpers
#[derive(Default)]
pub struct HelperScript
{
    pub reject_store: Cell<bool>,
    pub store_options: RefCell<Vec<SymbolStoreOptions>>,
    pub display_lines: RefCell<Vec<String>>,
    pub disable_calls: Cell<u32>,
    /// (module file name, symbol file) pairs reported by `LoadNativeSymbols`
    pub downloads: RefCell<Vec<(String, PathBuf)>>,
    /// Module paths offered to `LoadNativeSymbols`
    pub native_requests: RefCell<Vec<PathBuf>>,
    /// Raw handle returned by `LoadSymbolsForModule`; zero means no symbols
    pub reader_handle: Cell<u64>,
    /// (module name, file layout, has pdb) of each `LoadSymbolsForModule`
    pub portable_requests: RefCell<Vec<(Option<String>, bool, bool)>>,
    /// First byte read through the memory callback of each portable load
    pub first_bytes: RefCell<Vec<u8>>,
    pub disposed: RefCell<Vec<u64>>,
    pub line: RefCell<Option<(u32, String)>>,
    pub local_names: RefCell<HashMap<u32, String>>,
    pub sequence_point: Cell<Option<(u32, u32)>>,
    pub metadata: RefCell<Option<std::result::Result<Vec<u8>, HResult>>>,
}

impl HelperScript
{
    pub fn new() -> Rc<Self>
    {
        let script = Self::default();
        script.reader_handle.set(0x10);
        Rc::new(script)
    }

    /// A complete table whose entry points follow this script.
    pub fn table(self: &Rc<Self>) -> HelperTable
    {
        let init = Rc::clone(self);
        let display = Rc::clone(self);
        let disable = Rc::clone(self);
        let native = Rc::clone(self);
        let load = Rc::clone(self);
        let dispose = Rc::clone(self);
        let resolve = Rc::clone(self);
        let local = Rc::clone(self);
        let line = Rc::clone(self);
        let metadata = Rc::clone(self);

        HelperTable {
            initialize_symbol_store: Box::new(move |options: &SymbolStoreOptions| {
                init.store_options.borrow_mut().push(options.clone());
                !init.reject_store.get()
            }),
            display_symbol_store: Box::new(move |write_line: &mut dyn FnMut(&str)| {
                for line in display.display_lines.borrow().iter() {
                    write_line(line.as_str());
                }
            }),
            disable_symbol_store: Box::new(move || disable.disable_calls.set(disable.disable_calls.get() + 1)),
            load_native_symbols: Box::new(move |image: &NativeModuleImage<'_>, on_symbol_file: &mut dyn FnMut(&str, &Path)| {
                native.native_requests.borrow_mut().push(image.module_path.to_path_buf());
                for (module_file, symbol_file) in native.downloads.borrow().iter() {
                    on_symbol_file(module_file.as_str(), symbol_file.as_path());
                }
            }),
            load_symbols_for_module: Box::new(move |request: &PortableLoadRequest<'_>| {
                load.portable_requests.borrow_mut().push((
                    request.module_name.map(str::to_string),
                    request.is_file_layout,
                    request.pdb.is_some(),
                ));
                let mut byte = [0_u8; 1];
                if (request.read_memory)(request.pe.start, &mut byte) == 1 {
                    load.first_bytes.borrow_mut().push(byte[0]);
                }
                ReaderHandle::new(load.reader_handle.get())
            }),
            dispose: Box::new(move |handle: ReaderHandle| dispose.disposed.borrow_mut().push(handle.raw())),
            resolve_sequence_point: Box::new(move |_: ReaderHandle, _: &str, _: u32| {
                resolve
                    .sequence_point
                    .get()
                    .map(|(method, offset)| (MethodToken(method), offset))
            }),
            get_local_variable_name: Box::new(move |_: ReaderHandle, _: MethodToken, index: u32| local.local_names.borrow().get(&index).cloned()),
            get_line_by_il_offset: Box::new(move |_: ReaderHandle, _: MethodToken, _: u64| line.line.borrow().clone()),
            get_metadata_locator: Box::new(move |_: &MetadataRequest<'_>, buffer: &mut [u8]| match metadata.metadata.borrow().as_ref() {
                Some(Ok(bytes)) => {
                    let len = bytes.len().min(buffer.len());
                    buffer[..len].copy_from_slice(&bytes[..len]);
                    Ok(len)
                }
                Some(Err(status)) => Err(*status),
                None => Err(HResult::E_FAIL),
            }),
        }
    }
}

/// Split a table into delegates keyed by method name.
pub fn delegates(table: HelperTable) -> HashMap<&'static str, Delegate>
{
    let HelperTable {
        initialize_symbol_store,
        display_symbol_store,
        disable_symbol_store,
        load_native_symbols,
        load_symbols_for_module,
        dispose,
        resolve_sequence_point,
        get_local_variable_name,
        get_line_by_il_offset,
        get_metadata_locator,
    } = table;

    HashMap::from([
        ("InitializeSymbolStore", Box::new(initialize_symbol_store) as Delegate),
        ("DisplaySymbolStore", Box::new(display_symbol_store) as Delegate),
        ("DisableSymbolStore", Box::new(disable_symbol_store) as Delegate),
        ("LoadNativeSymbols", Box::new(load_native_symbols) as Delegate),
        ("LoadSymbolsForModule", Box::new(load_symbols_for_module) as Delegate),
        ("Dispose", Box::new(dispose) as Delegate),
        ("ResolveSequencePoint", Box::new(resolve_sequence_point) as Delegate),
        ("GetLocalVariableName", Box::new(get_local_variable_name) as Delegate),
        ("GetLineByILOffset", Box::new(get_line_by_il_offset) as Delegate),
        ("GetMetadataLocator", Box::new(get_metadata_locator) as Delegate),
    ])
}

/// A started runtime handing out delegates once each
pub struct FakeRuntime
{
    delegates: RefCell<HashMap<&'static str, Delegate>>,
    pub requests: Rc<RefCell<Vec<(String, String, String)>>>,
}

impl FakeRuntime
{
    pub fn new(delegates: HashMap<&'static str, Delegate>, requests: Rc<RefCell<Vec<(String, String, String)>>>) -> Self
    {
        Self {
            delegates: RefCell::new(delegates),
            requests,
        }
    }
}

impl HostedRuntime for FakeRuntime
{
    fn create_delegate(&self, assembly: &str, type_name: &str, method: &str) -> Result<Delegate>
    {
        self.requests
            .borrow_mut()
            .push((assembly.to_string(), type_name.to_string(), method.to_string()));
        self.delegates
            .borrow_mut()
            .remove(method)
            .ok_or_else(|| BridgeError::NotFound(format!("{type_name}.{method}")))
    }
}

/// Arguments of the one `RuntimeLoader::start` call
#[derive(Debug, Clone)]
pub struct StartRecord
{
    pub runtime_library: PathBuf,
    pub entry_executable: PathBuf,
    pub domain_name: String,
    pub properties: RuntimeProperties,
}

/// Loader that "starts" a [`FakeRuntime`]
#[derive(Default)]
pub struct FakeLoader
{
    pub delegates: RefCell<Option<HashMap<&'static str, Delegate>>>,
    pub fail_with: RefCell<Option<BridgeError>>,
    pub starts: Rc<RefCell<Vec<StartRecord>>>,
    pub requests: Rc<RefCell<Vec<(String, String, String)>>>,
}

impl FakeLoader
{
    pub fn serving(script: &Rc<HelperScript>) -> Self
    {
        Self {
            delegates: RefCell::new(Some(delegates(script.table()))),
            ..Self::default()
        }
    }

    pub fn without(script: &Rc<HelperScript>, method: &str) -> Self
    {
        let mut delegates = delegates(script.table());
        delegates.remove(method);
        Self {
            delegates: RefCell::new(Some(delegates)),
            ..Self::default()
        }
    }

    pub fn failing(err: BridgeError) -> Self
    {
        Self {
            fail_with: RefCell::new(Some(err)),
            ..Self::default()
        }
    }
}

impl RuntimeLoader for FakeLoader
{
    fn start(
        &self,
        runtime_library: &Path,
        entry_executable: &Path,
        domain_name: &str,
        properties: &RuntimeProperties,
    ) -> Result<Box<dyn HostedRuntime>>
    {
        self.starts.borrow_mut().push(StartRecord {
            runtime_library: runtime_library.to_path_buf(),
            entry_executable: entry_executable.to_path_buf(),
            domain_name: domain_name.to_string(),
            properties: properties.clone(),
        });
        if let Some(err) = self.fail_with.borrow_mut().take() {
            return Err(err);
        }
        let delegates = self.delegates.borrow_mut().take().unwrap_or_default();
        Ok(Box::new(FakeRuntime::new(delegates, Rc::clone(&self.requests))))
    }
}

/// Shared-runtime root with the given version directories, plus the module
/// directory `module` holding the helper assembly.
pub fn runtime_layout(scratch: &Path, versions: &[&str]) -> PathBuf
{
    let root = scratch.join("shared").join("Microsoft.NETCore.App");
    for version in versions {
        let dir = root.join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("System.Runtime.dll"), b"").unwrap();
        std::fs::write(dir.join("System.Private.CoreLib.ni.dll"), b"").unwrap();
        std::fs::write(dir.join("System.Private.CoreLib.dll"), b"").unwrap();
    }

    let module = scratch.join("module");
    std::fs::create_dir_all(&module).unwrap();
    std::fs::write(module.join("SOS.NETCore.dll"), b"").unwrap();
    std::fs::write(module.join("Helpers.dll"), b"").unwrap();
    root
}

// ---------------------------------------------------------------------------
// Legacy symbols
// ---------------------------------------------------------------------------

/// Open legacy symbol file backed by plain collections
#[derive(Clone, Default)]
pub struct FakeNativeReader
{
    pub points: HashMap<u32, Vec<SequencePoint>>,
    pub scopes: HashMap<u32, LexicalScope>,
    pub documents: Vec<SymbolDocument>,
    /// document id -> (requested line -> closest line)
    pub closest_lines: HashMap<u32, HashMap<u32, u32>>,
    /// (document id, line) -> (method, il offset)
    pub positions: HashMap<(u32, u32), (u32, u32)>,
}

impl NativeSymbolReader for FakeNativeReader
{
    fn sequence_points(&self, method: MethodToken) -> Result<Vec<SequencePoint>>
    {
        Ok(self.points.get(&method.0).cloned().unwrap_or_default())
    }

    fn root_scope(&self, method: MethodToken) -> Result<LexicalScope>
    {
        self.scopes
            .get(&method.0)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("scope of {method}")))
    }

    fn documents(&self) -> Result<Vec<SymbolDocument>>
    {
        Ok(self.documents.clone())
    }

    fn find_closest_line(&self, document: &SymbolDocument, line: u32) -> Result<u32>
    {
        self.closest_lines
            .get(&document.id.0)
            .and_then(|lines| lines.get(&line))
            .copied()
            .ok_or_else(|| BridgeError::NotFound(format!("line {line} of {document}")))
    }

    fn method_at_position(&self, document: &SymbolDocument, line: u32) -> Result<MethodToken>
    {
        self.positions
            .get(&(document.id.0, line))
            .map(|(method, _)| MethodToken(*method))
            .ok_or_else(|| BridgeError::NotFound(format!("method at {document}:{line}")))
    }

    fn il_offset_at_position(&self, _method: MethodToken, document: &SymbolDocument, line: u32) -> Result<u32>
    {
        Ok(self
            .positions
            .get(&(document.id.0, line))
            .map_or(INVALID_IL_OFFSET, |(_, offset)| *offset))
    }
}

/// What the binder saw when asked for a reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindRecord
{
    pub module_name: String,
    pub symbol_path: String,
    pub addressing: ImageAddressing,
    /// First two image bytes read through the image reader
    pub signature: Vec<u8>,
}

/// Binder that opens a clone of its reader, or fails when it has none
#[derive(Default)]
pub struct FakeBinder
{
    pub reader: Option<FakeNativeReader>,
    pub binds: Rc<RefCell<Vec<BindRecord>>>,
}

impl NativeSymbolBinder for FakeBinder
{
    fn reader_from_callback(
        &self,
        module_name: &str,
        symbol_path: &str,
        image: Box<dyn ImageReader>,
    ) -> Result<Box<dyn NativeSymbolReader>>
    {
        let mut signature = vec![0_u8; 2];
        let read = image.read_at(0, &mut signature)?;
        signature.truncate(read);
        self.binds.borrow_mut().push(BindRecord {
            module_name: module_name.to_string(),
            symbol_path: symbol_path.to_string(),
            addressing: image.addressing(),
            signature,
        });

        self.reader
            .clone()
            .map(|reader| Box::new(reader) as Box<dyn NativeSymbolReader>)
            .ok_or_else(|| BridgeError::NotFound(format!("symbols for {module_name}")))
    }
}

/// Minimal PE32+ header page declaring `size_of_image`.
pub fn pe_header(size_of_image: u32) -> Vec<u8>
{
    let mut image = vec![0_u8; 0x200];
    image[0] = b'M';
    image[1] = b'Z';
    image[0x3c..0x40].copy_from_slice(&0x80_u32.to_le_bytes());

    image[0x80..0x84].copy_from_slice(b"PE\0\0");
    let file_header = 0x84;
    image[file_header..file_header + 2].copy_from_slice(&0x8664_u16.to_le_bytes());
    image[file_header + 16..file_header + 18].copy_from_slice(&112_u16.to_le_bytes());

    let optional = file_header + 20;
    image[optional..optional + 2].copy_from_slice(&0x20b_u16.to_le_bytes());
    image[optional + 56..optional + 60].copy_from_slice(&size_of_image.to_le_bytes());
    image
}
