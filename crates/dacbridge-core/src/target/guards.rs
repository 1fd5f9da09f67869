//! # RAII Guards for Target Operations
//!
//! Guards that put host state back when dropped, so that the state is
//! restored even when the operation in between fails.
//!
//! ## Guards
//!
//! - **CurrentThreadGuard**: switches the host's current thread and switches
//!   it back on drop

use tracing::warn;

use crate::error::Result;
use crate::host::DebugHost;

/// RAII guard that makes another thread current and restores the original
/// one when dropped.
///
/// The restore outcome never replaces the outcome of the work done while the
/// guard was alive: a failed restore is logged and otherwise ignored.
///
/// ## Example
///
/// ```rust,no_run
/// use dacbridge_core::target::guards::CurrentThreadGuard;
/// # use dacbridge_core::host::DebugHost;
/// # fn demo(host: &dyn DebugHost) -> dacbridge_core::Result<()> {
/// let original = host.current_thread_id()?;
/// let _guard = CurrentThreadGuard::switch(host, original, 7)?;
/// // thread 7 is current until the guard goes away
/// # Ok(())
/// # }
/// ```
pub struct CurrentThreadGuard<'a>
{
    host: &'a dyn DebugHost,
    original: u32,
    active: bool,
}

impl<'a> CurrentThreadGuard<'a>
{
    /// Make `requested` current; `original` is restored on drop.
    ///
    /// ## Errors
    ///
    /// Whatever the host reports for the switch. No guard is created then,
    /// so nothing is restored.
    pub fn switch(host: &'a dyn DebugHost, original: u32, requested: u32) -> Result<Self>
    {
        host.set_current_thread_id(requested)?;
        Ok(Self {
            host,
            original,
            active: true,
        })
    }

    /// Restore the original thread now and report the outcome.
    ///
    /// Dropping the guard afterwards is a no-op.
    pub fn restore(mut self) -> Result<()>
    {
        self.active = false;
        self.host.set_current_thread_id(self.original)
    }
}

impl Drop for CurrentThreadGuard<'_>
{
    fn drop(&mut self)
    {
        if self.active {
            if let Err(err) = self.host.set_current_thread_id(self.original) {
                warn!("Failed to restore current thread {}: {err}", self.original);
            }
        }
    }
}
