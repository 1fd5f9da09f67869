//! Portable-format symbols, read by the hosted helper.

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::{SequencePointLocation, SourceLine};
use crate::error::{BridgeError, Result};
use crate::hosting::helpers::{HelperTable, ReaderHandle};
use crate::types::MethodToken;

/// A symbol reader living in the secondary runtime
///
/// The helper-side reader is disposed when this value is dropped.
pub struct PortableReader
{
    handle: ReaderHandle,
    helpers: Rc<HelperTable>,
}

impl PortableReader
{
    /// Take ownership of the helper-side reader `handle`.
    pub fn new(handle: ReaderHandle, helpers: Rc<HelperTable>) -> Self
    {
        Self { handle, helpers }
    }

    /// The helper-side handle.
    pub fn handle(&self) -> ReaderHandle
    {
        self.handle
    }

    /// Source line for `il_offset` of `method`.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: the helper has no line, or reports line zero
    pub fn line_by_il_offset(&self, method: MethodToken, il_offset: u32) -> Result<SourceLine>
    {
        match (self.helpers.get_line_by_il_offset)(self.handle, method, u64::from(il_offset)) {
            Some((line, file)) if line != 0 => Ok(SourceLine { line, file }),
            _ => Err(BridgeError::NotFound(format!("source line for {method}+0x{il_offset:x}"))),
        }
    }

    /// Declared name of local `index` of `method`.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: the helper has no name for it
    pub fn local_variable_name(&self, method: MethodToken, index: u32) -> Result<String>
    {
        (self.helpers.get_local_variable_name)(self.handle, method, index)
            .ok_or_else(|| BridgeError::NotFound(format!("local {index} of method {method}")))
    }

    /// Method and IL offset for `line` of `file`.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: the helper could not resolve the position
    pub fn resolve_sequence_point(&self, file: &str, line: u32) -> Result<SequencePointLocation>
    {
        (self.helpers.resolve_sequence_point)(self.handle, file, line)
            .map(|(method, il_offset)| SequencePointLocation { method, il_offset })
            .ok_or_else(|| BridgeError::NotFound(format!("{file}:{line}")))
    }
}

impl fmt::Debug for PortableReader
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("PortableReader").field("handle", &self.handle).finish()
    }
}

impl Drop for PortableReader
{
    fn drop(&mut self)
    {
        trace!("Disposing symbol reader {}", self.handle);
        (self.helpers.dispose)(self.handle);
    }
}
