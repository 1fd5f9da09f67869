//! Target address and address-range types.

use std::fmt;
use std::ops::Add;

/// Strongly typed address in the inspected process
///
/// This wrapper around `u64` keeps target addresses apart from sizes, offsets
/// and token values, which all travel through the same contract methods as
/// plain integers. Addresses are always 64-bit here, even for 32-bit targets,
/// matching the data access contract.
///
/// ## Example
///
/// ```rust
/// use dacbridge_core::types::Address;
///
/// let base = Address::from(0x7ff0_0000);
/// assert_eq!((base + 0x3c).value(), 0x7ff0_003c);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// Usable in const contexts, unlike `Address::from`.
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// `true` for the null address.
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ```rust
    /// use dacbridge_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::from(0x1100)));
    /// assert_eq!(addr.checked_add(u64::MAX), None);
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

/// A half-open `[start, start + size)` range of target memory
///
/// Used for PE images, in-memory PDBs and the metadata ranges that a crash
/// dump is known not to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryRange
{
    /// First byte of the range
    pub start: Address,
    /// Length in bytes
    pub size: u64,
}

impl MemoryRange
{
    /// Create a range from its start and length.
    pub const fn new(start: Address, size: u64) -> Self
    {
        Self { start, size }
    }

    /// One past the last byte, saturating at the top of the address space.
    pub fn end(&self) -> u64
    {
        self.start.value().saturating_add(self.size)
    }

    /// `true` for a zero-length range.
    pub const fn is_empty(&self) -> bool
    {
        self.size == 0
    }

    /// Check whether `address` falls inside the range.
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.start && address.value() < self.end()
    }

    /// Check whether `[address, address + len)` shares at least one byte with
    /// this range.
    ///
    /// ```rust
    /// use dacbridge_core::types::{Address, MemoryRange};
    ///
    /// let metadata = MemoryRange::new(Address::new(0x2000), 0x100);
    /// assert!(metadata.overlaps(Address::new(0x1ff0), 0x20));
    /// assert!(!metadata.overlaps(Address::new(0x2100), 0x10));
    /// assert!(!metadata.overlaps(Address::new(0x2000), 0));
    /// ```
    pub fn overlaps(&self, address: Address, len: u64) -> bool
    {
        if len == 0 || self.is_empty() {
            return false;
        }
        let end = address.value().saturating_add(len);
        address.value() < self.end() && self.start.value() < end
    }
}

impl fmt::Display for MemoryRange
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "[{}, 0x{:016x})", self.start, self.end())
    }
}
