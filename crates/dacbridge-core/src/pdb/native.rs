//! # Legacy Format Symbols
//!
//! Seams for the platform's legacy symbol binder and the queries answered
//! on top of it.
//!
//! The binder reads the module's PE image straight out of the target through
//! an [`ImageReader`], then hands back a [`NativeSymbolReader`] exposing raw
//! sequence points, lexical scopes and documents. The lookups in this module
//! turn those into answers.

use tracing::trace;

use super::scope::{find_local, LexicalScope};
use super::sequence::{SequencePoint, SequencePointTable, SymbolDocument};
use super::{IlFrame, LocalVariable, SequencePointLocation, SourceLine};
use crate::error::{BridgeError, Result};
use crate::types::MethodToken;

/// IL offset value a reader returns when a position maps to no instruction.
pub const INVALID_IL_OFFSET: u32 = u32::MAX;

/// How positions passed to an [`ImageReader`] are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAddressing
{
    /// Offsets into the on-disk file layout
    FileOffset,
    /// Relative virtual addresses of the loaded layout
    Rva,
}

/// Reads a module's PE image on behalf of the binder
pub trait ImageReader
{
    /// How `position` in [`ImageReader::read_at`] is interpreted.
    fn addressing(&self) -> ImageAddressing;

    /// Read image bytes at `position`, returning the number of bytes read.
    fn read_at(&self, position: u64, buffer: &mut [u8]) -> Result<usize>;
}

/// The legacy symbol binder
pub trait NativeSymbolBinder
{
    /// Find and open the symbol file for `module_name` along `symbol_path`.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: no matching symbol file
    fn reader_from_callback(
        &self,
        module_name: &str,
        symbol_path: &str,
        image: Box<dyn ImageReader>,
    ) -> Result<Box<dyn NativeSymbolReader>>;
}

/// An open legacy symbol file
pub trait NativeSymbolReader
{
    /// Sequence points of `method`, in any order.
    fn sequence_points(&self, method: MethodToken) -> Result<Vec<SequencePoint>>;

    /// Root lexical scope of `method`.
    fn root_scope(&self, method: MethodToken) -> Result<LexicalScope>;

    /// Every source document of the module.
    fn documents(&self) -> Result<Vec<SymbolDocument>>;

    /// Closest line at or after `line` that has code in `document`.
    fn find_closest_line(&self, document: &SymbolDocument, line: u32) -> Result<u32>;

    /// Method containing `line` of `document`.
    fn method_at_position(&self, document: &SymbolDocument, line: u32) -> Result<MethodToken>;

    /// IL offset of `line` of `document` inside `method`, or
    /// [`INVALID_IL_OFFSET`].
    fn il_offset_at_position(&self, method: MethodToken, document: &SymbolDocument, line: u32) -> Result<u32>;
}

/// Source line of the last visible sequence point at or before `il_offset`.
///
/// ## Errors
///
/// - `NotFound`: the method has no sequence points, or none visible at or
///   before the offset
pub fn line_by_il_offset(reader: &dyn NativeSymbolReader, method: MethodToken, il_offset: u32) -> Result<SourceLine>
{
    let table = SequencePointTable::new(reader.sequence_points(method)?);
    if table.is_empty() {
        return Err(BridgeError::NotFound(format!("sequence points of method {method}")));
    }

    table
        .line_for_offset(il_offset)
        .map(|point| SourceLine {
            line: point.line,
            file: point.document.url.clone(),
        })
        .ok_or_else(|| BridgeError::NotFound(format!("source line for {method}+0x{il_offset:x}")))
}

/// Name and live value of local `index` of `method`.
///
/// ## Errors
///
/// - `NotFound`: no scope declares the local, or the frame has no value for
///   it
pub fn named_local<F: IlFrame>(
    reader: &dyn NativeSymbolReader,
    method: MethodToken,
    index: u32,
    frame: &F,
) -> Result<LocalVariable<F::Value>>
{
    let root = reader.root_scope(method)?;
    find_local(&root, index, |slot| frame.local_variable(slot))
        .map(|(name, value)| LocalVariable { name, value })
        .ok_or_else(|| BridgeError::NotFound(format!("local {index} of method {method}")))
}

/// Method and IL offset for `line` of source file `file`.
///
/// The first document matching `file` whose closest line can be found
/// decides the answer.
///
/// ## Errors
///
/// - `NotFound`: no document matches, or the position has no IL offset
pub fn resolve_sequence_point(reader: &dyn NativeSymbolReader, file: &str, line: u32) -> Result<SequencePointLocation>
{
    for document in reader.documents()?.iter().filter(|doc| doc.matches_file(file)) {
        let closest = match reader.find_closest_line(document, line) {
            Ok(closest) => closest,
            Err(err) => {
                trace!("No line near {line} in {document}: {err}");
                continue;
            }
        };

        let method = reader.method_at_position(document, closest)?;
        let il_offset = reader.il_offset_at_position(method, document, closest)?;
        if il_offset == INVALID_IL_OFFSET {
            return Err(BridgeError::NotFound(format!("IL offset for {file}:{closest}")));
        }
        return Ok(SequencePointLocation { method, il_offset });
    }

    Err(BridgeError::NotFound(format!("{file}:{line}")))
}
