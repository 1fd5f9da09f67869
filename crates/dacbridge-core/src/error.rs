//! # Error Types
//!
//! General error handling for the bridge.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages. Every error also maps onto the status-code
//! convention of the data access contract through [`BridgeError::status`],
//! so callers sitting on the ABI boundary never have to invent codes.

use std::fmt;

use thiserror::Error;

/// Status code in the data access contract convention
///
/// Non-negative values are success, negative values are failure. The bridge
/// only ever produces the fixed set of constants below, but codes returned by
/// a collaborator are passed through unchanged via
/// [`BridgeError::Propagated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(i32);

#[allow(clippy::cast_possible_wrap)]
impl HResult
{
    /// Success
    pub const S_OK: Self = HResult(0);
    /// Success, with nothing to report
    pub const S_FALSE: Self = HResult(1);
    /// The method is part of the contract but has no implementation here
    pub const E_NOTIMPL: Self = HResult(0x8000_4001_u32 as i32);
    /// A collaborator the call depends on is not ready
    pub const E_UNEXPECTED: Self = HResult(0x8000_FFFF_u32 as i32);
    /// The read touched memory that is known to be absent
    pub const E_ACCESSDENIED: Self = HResult(0x8007_0005_u32 as i32);
    /// Generic failure
    pub const E_FAIL: Self = HResult(0x8000_4005_u32 as i32);
    /// Allocation failure
    pub const E_OUTOFMEMORY: Self = HResult(0x8007_000E_u32 as i32);
    /// An argument was rejected
    pub const E_INVALIDARG: Self = HResult(0x8007_0057_u32 as i32);

    /// Wrap a raw status value.
    pub const fn from_raw(raw: i32) -> Self
    {
        HResult(raw)
    }

    /// The raw status value.
    pub const fn raw(self) -> i32
    {
        self.0
    }

    /// `true` for every non-negative status.
    pub const fn is_success(self) -> bool
    {
        self.0 >= 0
    }

    /// `true` for every negative status.
    pub const fn is_failure(self) -> bool
    {
        self.0 < 0
    }

    /// Convert into a `Result`, keeping failures as [`BridgeError::Propagated`].
    ///
    /// ```rust
    /// use dacbridge_core::error::{BridgeError, HResult};
    ///
    /// assert!(HResult::S_OK.into_result().is_ok());
    /// assert!(matches!(HResult::E_FAIL.into_result(), Err(BridgeError::Propagated(_))));
    /// ```
    pub fn into_result(self) -> Result<()>
    {
        if self.is_success() {
            Ok(())
        } else {
            Err(BridgeError::Propagated(self))
        }
    }
}

impl fmt::Display for HResult
{
    #[allow(clippy::cast_sign_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.0 as u32)
    }
}

/// Main error type for bridge operations
///
/// This enum represents all the ways a bridge operation can fail.
///
/// ## Error Categories
///
/// 1. **Readiness errors**: ServiceUnavailable
/// 2. **Lookup errors**: NotFound
/// 3. **Contract errors**: Unsupported, InvalidArgument
/// 4. **Hosting errors**: HostFailure
/// 5. **Memory errors**: AccessDenied
/// 6. **Collaborator errors**: Propagated, Failed
/// 7. **I/O errors**: Io (for scratch directory and runtime discovery)
#[derive(Error, Debug)]
pub enum BridgeError
{
    /// A collaborator the operation depends on is not ready yet
    ///
    /// This happens when:
    /// - The host environment does not offer the capability at all
    /// - The hosted helpers have not been bound yet
    /// - No runtime loader or native binder was registered
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A module, runtime, symbol file, document or variable is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request is valid but this bridge does not implement it
    ///
    /// Dynamic modules and the write/TLS/set-context parts of the data access
    /// contract end up here.
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// The secondary runtime could not be started or bound
    ///
    /// Once this has been reported, every hosting-dependent feature stays
    /// disabled for the rest of the process.
    #[error("Hosting failed: {0}")]
    HostFailure(String),

    /// The read overlaps a metadata range that is not present in the dump
    #[error("Access denied: {size} bytes at 0x{address:016x} fall in absent metadata")]
    AccessDenied
    {
        /// Start of the refused read
        address: u64,
        /// Length of the refused read
        size: usize,
    },

    /// Invalid argument passed to a bridge function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic failure reported by a collaborator without a status code
    #[error("Operation failed: {0}")]
    Failed(String),

    /// A collaborator's own failure status, passed through unchanged
    #[error("Collaborator returned {0}")]
    Propagated(HResult),

    /// I/O error (scratch directory, runtime directory probing, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError
{
    /// Map this error onto the data access contract's status convention.
    ///
    /// ```rust
    /// use dacbridge_core::error::{BridgeError, HResult};
    ///
    /// let err = BridgeError::Unsupported("SetTLSValue".into());
    /// assert_eq!(err.status(), HResult::E_NOTIMPL);
    /// ```
    pub fn status(&self) -> HResult
    {
        match self {
            BridgeError::ServiceUnavailable(_) => HResult::E_UNEXPECTED,
            BridgeError::Unsupported(_) => HResult::E_NOTIMPL,
            BridgeError::AccessDenied { .. } => HResult::E_ACCESSDENIED,
            BridgeError::InvalidArgument(_) => HResult::E_INVALIDARG,
            BridgeError::Propagated(status) => *status,
            BridgeError::NotFound(_) | BridgeError::HostFailure(_) | BridgeError::Failed(_) | BridgeError::Io(_) => {
                HResult::E_FAIL
            }
        }
    }

    /// `true` when the error means "no source information" rather than a
    /// broken session.
    pub fn is_not_found(&self) -> bool
    {
        matches!(self, BridgeError::NotFound(_))
    }
}

/// Convenience type alias for `Result<T, BridgeError>`
///
/// ```rust
/// use dacbridge_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Collapse a bridge result into a bare status code for the ABI boundary.
pub fn status_of<T>(result: &Result<T>) -> HResult
{
    match result {
        Ok(_) => HResult::S_OK,
        Err(err) => err.status(),
    }
}
