//! # PDB Resolution Engine
//!
//! Answers source-level questions about one managed module: which line an
//! IL offset belongs to, what a local variable is called, and which IL
//! offset a source line compiles to.
//!
//! ## Reader Selection
//!
//! A [`SymbolReader`] opens at most one reader per module:
//!
//! 1. A reader opened earlier is reused for the module's lifetime
//! 2. On the desktop family, the legacy binder is tried first
//! 3. Otherwise (or when that fails) the hosted portable reader is used
//!
//! Dynamic modules and in-memory modules without an in-memory symbol file
//! are refused before anything is opened.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::rc::Rc;
//!
//! use dacbridge_core::context::BridgeContext;
//! use dacbridge_core::pdb::SymbolReader;
//! use dacbridge_core::types::{MethodToken, ModuleDescriptor};
//!
//! # fn demo(ctx: Rc<BridgeContext>, module: &ModuleDescriptor) -> dacbridge_core::Result<()> {
//! let mut reader = SymbolReader::new(ctx);
//! reader.load_symbols(module)?;
//! let line = reader.line_by_il_offset(MethodToken(0x0600_0001), 0x10)?;
//! println!("{}:{}", line.file, line.line);
//! # Ok(())
//! # }
//! ```

pub mod native;
pub mod pe_memory;
pub mod portable;
pub mod scope;
pub mod sequence;

use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use self::native::{ImageAddressing, NativeSymbolReader};
use self::pe_memory::PeMemoryReader;
use self::portable::PortableReader;
use crate::context::BridgeContext;
use crate::error::{BridgeError, Result};
use crate::hosting::helpers::PortableLoadRequest;
use crate::types::{MethodToken, ModuleDescriptor};

/// A live debug frame that can produce local variable values
pub trait IlFrame
{
    /// Value handle produced by the frame.
    type Value;

    /// Value of local slot `slot`, or `None` when the frame has none.
    fn local_variable(&self, slot: u32) -> Option<Self::Value>;
}

/// Source position of an IL offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine
{
    /// Line number
    pub line: u32,
    /// Document URL
    pub file: String,
}

/// A resolved local variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable<V>
{
    /// Declared (or synthesized) name
    pub name: String,
    /// Live value from the frame
    pub value: V,
}

/// Code location of a source line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencePointLocation
{
    /// Method containing the line
    pub method: MethodToken,
    /// IL offset of the line inside the method
    pub il_offset: u32,
}

/// Which kind of reader serves a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderKind
{
    /// Legacy binder
    Native,
    /// Hosted portable reader
    Portable,
}

enum ReaderState
{
    Unresolved,
    Native(Box<dyn NativeSymbolReader>),
    Portable(PortableReader),
    Failed(String),
}

/// Per-module symbol state
pub struct SymbolReader
{
    ctx: Rc<BridgeContext>,
    state: ReaderState,
}

impl SymbolReader
{
    /// Nothing opened yet.
    pub fn new(ctx: Rc<BridgeContext>) -> Self
    {
        Self {
            ctx,
            state: ReaderState::Unresolved,
        }
    }

    /// Kind of the open reader, if any.
    pub fn kind(&self) -> Option<ReaderKind>
    {
        match self.state {
            ReaderState::Native(_) => Some(ReaderKind::Native),
            ReaderState::Portable(_) => Some(ReaderKind::Portable),
            ReaderState::Unresolved | ReaderState::Failed(_) => None,
        }
    }

    /// Open symbols for `module`, or reuse the reader opened earlier.
    ///
    /// A failed attempt may be repeated; a successful one is final.
    ///
    /// ## Errors
    ///
    /// - `Unsupported`: dynamic module, or in-memory module without symbols
    /// - The portable path's error when no reader could be opened
    pub fn load_symbols(&mut self, module: &ModuleDescriptor) -> Result<ReaderKind>
    {
        if let Some(kind) = self.kind() {
            return Ok(kind);
        }

        if module.is_dynamic {
            warn!("Cannot load symbols for dynamic module");
            return Err(BridgeError::Unsupported("symbols for a dynamic module".to_string()));
        }
        if module.is_in_memory && module.in_memory_pdb.is_none() {
            warn!("Cannot load symbols for in-memory module without symbols");
            return Err(BridgeError::Unsupported(
                "symbols for an in-memory module without symbol file".to_string(),
            ));
        }

        if self.ctx.config.platform.is_desktop() && !module.is_in_memory {
            match self.open_native(module) {
                Ok(reader) => {
                    self.state = ReaderState::Native(reader);
                    return Ok(ReaderKind::Native);
                }
                Err(err) => debug!("Legacy symbols unavailable, trying portable: {err}"),
            }
        }

        match self.open_portable(module) {
            Ok(reader) => {
                debug!("Opened portable symbols (reader {})", reader.handle());
                self.state = ReaderState::Portable(reader);
                Ok(ReaderKind::Portable)
            }
            Err(err) => {
                self.state = ReaderState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    fn open_native(&self, module: &ModuleDescriptor) -> Result<Box<dyn NativeSymbolReader>>
    {
        let binder = self
            .ctx
            .native_binder
            .as_deref()
            .ok_or_else(|| BridgeError::ServiceUnavailable("no legacy symbol binder registered".to_string()))?;
        let name = module
            .file_name
            .as_deref()
            .ok_or_else(|| BridgeError::NotFound("module file name".to_string()))?;
        let symbol_path = self.ctx.host.symbol_path()?;

        let addressing = if module.is_file_layout {
            ImageAddressing::FileOffset
        } else {
            ImageAddressing::Rva
        };
        let image = PeMemoryReader::new(
            Rc::clone(&self.ctx.host),
            module.pe_image.start,
            module.pe_image.size,
            addressing,
        )?;

        binder.reader_from_callback(name, &symbol_path, Box::new(image))
    }

    fn open_portable(&self, module: &ModuleDescriptor) -> Result<PortableReader>
    {
        self.ctx.initialize_hosting()?;
        self.ctx.initialize_local_symbol_store();
        let helpers = self.ctx.helpers()?;

        let request = PortableLoadRequest {
            module_name: module.hosted_name(),
            is_file_layout: module.is_file_layout,
            pe: module.pe_image,
            pdb: module.in_memory_pdb,
            read_memory: self.ctx.symbol_memory_reader(),
        };

        let handle = (helpers.load_symbols_for_module)(&request).ok_or_else(|| {
            BridgeError::NotFound(format!(
                "portable symbols for {}",
                module.file_name.as_deref().unwrap_or("<in-memory module>")
            ))
        })?;
        Ok(PortableReader::new(handle, helpers))
    }

    fn no_symbols(&self) -> BridgeError
    {
        match &self.state {
            ReaderState::Failed(reason) => BridgeError::NotFound(format!("no symbols loaded: {reason}")),
            _ => BridgeError::NotFound("no symbols loaded".to_string()),
        }
    }

    /// Source line for `il_offset` of `method`.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: no symbols are loaded or the offset has no visible line
    pub fn line_by_il_offset(&self, method: MethodToken, il_offset: u32) -> Result<SourceLine>
    {
        match &self.state {
            ReaderState::Native(reader) => native::line_by_il_offset(reader.as_ref(), method, il_offset),
            ReaderState::Portable(reader) => reader.line_by_il_offset(method, il_offset),
            ReaderState::Unresolved | ReaderState::Failed(_) => Err(self.no_symbols()),
        }
    }

    /// Name and live value of local `index` of `method` in `frame`.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: no symbols, no such local, or no live value
    pub fn local_variable<F: IlFrame>(
        &self,
        method: MethodToken,
        index: u32,
        frame: &F,
    ) -> Result<LocalVariable<F::Value>>
    {
        match &self.state {
            ReaderState::Native(reader) => native::named_local(reader.as_ref(), method, index, frame),
            ReaderState::Portable(reader) => {
                let name = reader.local_variable_name(method, index)?;
                let value = frame
                    .local_variable(index)
                    .ok_or_else(|| BridgeError::NotFound(format!("value of local {name}")))?;
                Ok(LocalVariable { name, value })
            }
            ReaderState::Unresolved | ReaderState::Failed(_) => Err(self.no_symbols()),
        }
    }

    /// Method and IL offset that `line` of `file` compiles to.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: no symbols, no matching document, or no code at the line
    pub fn resolve_sequence_point(&self, file: &str, line: u32) -> Result<SequencePointLocation>
    {
        match &self.state {
            ReaderState::Native(reader) => native::resolve_sequence_point(reader.as_ref(), file, line),
            ReaderState::Portable(reader) => reader.resolve_sequence_point(file, line),
            ReaderState::Unresolved | ReaderState::Failed(_) => Err(self.no_symbols()),
        }
    }
}

impl fmt::Debug for SymbolReader
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("SymbolReader").field("kind", &self.kind()).finish_non_exhaustive()
    }
}
