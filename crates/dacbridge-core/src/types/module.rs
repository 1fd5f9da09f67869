//! Module and symbol identity types.

use std::fmt;
use std::path::PathBuf;

use super::address::{Address, MemoryRange};

/// A native module as listed in the host debugger's module table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostModule
{
    /// Index in the host's module list
    pub index: u32,
    /// Load address
    pub base: Address,
    /// Size of the mapped image in bytes
    pub size: u64,
    /// Full path of the image file as recorded by the host
    pub image_path: PathBuf,
}

/// Metadata token of a method definition (`0x06xxxxxx`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodToken(pub u32);

impl MethodToken
{
    /// Raw token value.
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

impl fmt::Display for MethodToken
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Everything the analysis component knows about a managed module whose
/// symbols are being requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor
{
    /// File name (or path) of the module; `None` when the runtime has none
    pub file_name: Option<String>,
    /// Module was emitted at run time
    pub is_dynamic: bool,
    /// Module was loaded from a byte array rather than a file
    pub is_in_memory: bool,
    /// The PE image is mapped with its on-disk layout rather than loaded
    pub is_file_layout: bool,
    /// Where the PE image lives in the target
    pub pe_image: MemoryRange,
    /// In-memory symbol file that came with an in-memory module, if any
    pub in_memory_pdb: Option<MemoryRange>,
}

impl ModuleDescriptor
{
    /// Describe an ordinary module loaded from `file_name` at `pe_image`.
    pub fn from_file(file_name: impl Into<String>, pe_image: MemoryRange) -> Self
    {
        Self {
            file_name: Some(file_name.into()),
            is_dynamic: false,
            is_in_memory: false,
            is_file_layout: false,
            pe_image,
            in_memory_pdb: None,
        }
    }

    /// Name passed to the hosted helper: in-memory modules must go unnamed.
    pub fn hosted_name(&self) -> Option<&str>
    {
        if self.is_in_memory {
            None
        } else {
            self.file_name.as_deref()
        }
    }
}
