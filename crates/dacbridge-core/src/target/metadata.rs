//! Metadata ranges known to be missing from a crash dump.
//!
//! Some dump writers leave out the metadata pages of loaded assemblies and
//! the host then serves zeros for them. Reads overlapping a registered range
//! are refused instead.

use smallvec::SmallVec;

use crate::types::{Address, MemoryRange};

/// Registered absent metadata ranges
#[derive(Debug, Clone, Default)]
pub struct MetadataRegions
{
    regions: SmallVec<[MemoryRange; 8]>,
}

impl MetadataRegions
{
    /// Add a range; empty ranges are ignored.
    pub fn register(&mut self, region: MemoryRange)
    {
        if !region.is_empty() && !self.regions.contains(&region) {
            self.regions.push(region);
        }
    }

    /// `true` when `[address, address + len)` touches any registered range.
    pub fn overlaps(&self, address: Address, len: u64) -> bool
    {
        self.regions.iter().any(|region| region.overlaps(address, len))
    }

    /// Number of registered ranges.
    pub fn len(&self) -> usize
    {
        self.regions.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool
    {
        self.regions.is_empty()
    }
}
