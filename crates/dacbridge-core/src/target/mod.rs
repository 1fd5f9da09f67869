//! # Memory/Thread Target Bridge
//!
//! [`MemoryTarget`] implements the data access contract the analysis
//! component calls back into: machine type, pointer size, module bases,
//! memory reads, thread contexts and metadata lookup.
//!
//! ## Platform Differences
//!
//! - **Desktop family**: module names are looked up without extension, and
//!   thread contexts are captured by temporarily switching the host's current
//!   thread. Stack unwinding is not offered.
//! - **Other platforms**: the host captures contexts by thread id directly
//!   and unwinds frames itself.
//!
//! Writing memory, TLS access, setting contexts and the generic request
//! channel are part of the contract but always report `Unsupported`.

pub mod guards;
pub mod metadata;

use std::rc::Rc;

use tracing::{debug, trace};

use self::guards::CurrentThreadGuard;
use crate::context::BridgeContext;
use crate::error::{BridgeError, Result};
use crate::hosting::helpers::MetadataRequest;
use crate::types::Address;

/// The bridge's implementation of the data access contract
#[derive(Debug, Clone)]
pub struct MemoryTarget
{
    ctx: Rc<BridgeContext>,
}

impl MemoryTarget
{
    /// Target over the given context.
    pub fn new(ctx: Rc<BridgeContext>) -> Self
    {
        Self { ctx }
    }

    /// The context this target reads through.
    pub fn context(&self) -> &Rc<BridgeContext>
    {
        &self.ctx
    }

    /// Machine type of the target (`IMAGE_FILE_MACHINE_*`).
    pub fn machine_type(&self) -> Result<u32>
    {
        self.ctx.host.processor_type()
    }

    /// Pointer size of the target in bytes.
    pub fn pointer_size(&self) -> u32
    {
        self.ctx.config.architecture.pointer_size_bytes()
    }

    /// Load address of the module `name`.
    ///
    /// The desktop host lists modules without extension, so everything from
    /// the last `.` on is dropped there.
    pub fn image_base(&self, name: &str) -> Result<Address>
    {
        let lookup = if self.ctx.config.platform.is_desktop() {
            name.rfind('.').map_or(name, |dot| &name[..dot])
        } else {
            name
        };
        trace!("Looking up image base of {lookup}");
        self.ctx.host.module_base(lookup)
    }

    /// Read target memory into `buffer`.
    ///
    /// ## Errors
    ///
    /// - `AccessDenied`: the target is a dump and the read overlaps a
    ///   registered absent metadata range
    /// - Whatever the host reports for the read
    pub fn read_virtual(&self, address: Address, buffer: &mut [u8]) -> Result<usize>
    {
        if self.ctx.host.is_dump()
            && self
                .ctx
                .metadata_regions
                .borrow()
                .overlaps(address, buffer.len() as u64)
        {
            trace!("Refusing read of absent metadata at {address}");
            return Err(BridgeError::AccessDenied {
                address: address.value(),
                size: buffer.len(),
            });
        }
        self.ctx.host.read_virtual(address, buffer)
    }

    /// Not supported.
    pub fn write_virtual(&self, address: Address, data: &[u8]) -> Result<usize>
    {
        Err(BridgeError::Unsupported(format!(
            "WriteVirtual of {} bytes at {address}",
            data.len()
        )))
    }

    /// Not supported.
    pub fn tls_value(&self, thread_id: u32, index: u32) -> Result<u64>
    {
        Err(BridgeError::Unsupported(format!(
            "GetTLSValue({index}) for thread {thread_id}"
        )))
    }

    /// Not supported.
    pub fn set_tls_value(&self, thread_id: u32, index: u32, value: u64) -> Result<()>
    {
        let _ = value;
        Err(BridgeError::Unsupported(format!(
            "SetTLSValue({index}) for thread {thread_id}"
        )))
    }

    /// OS thread id of the host's current thread.
    pub fn current_thread_id(&self) -> Result<u32>
    {
        self.ctx.host.current_thread_system_id()
    }

    /// Capture the register context of the thread with OS id `thread_id`.
    ///
    /// On the desktop family the host's current thread is switched to the
    /// requested one for the capture and always switched back afterwards; the
    /// capture's outcome is returned, never the restore's.
    pub fn thread_context(&self, thread_id: u32, context_flags: u32, context: &mut [u8]) -> Result<()>
    {
        let host = self.ctx.host.as_ref();
        if !self.ctx.config.platform.is_desktop() {
            return host.thread_context_by_system_id(thread_id, context_flags, context);
        }

        let original = host.current_thread_id()?;
        let requested = host.thread_id_by_system_id(thread_id)?;
        let guard = CurrentThreadGuard::switch(host, original, requested)?;

        context.fill(0);
        let captured = host.current_thread_context(context_flags, context);
        drop(guard);

        if let Err(err) = &captured {
            debug!("Context capture for thread {thread_id} failed: {err}");
        }
        captured
    }

    /// Not supported.
    pub fn set_thread_context(&self, thread_id: u32, context: &[u8]) -> Result<()>
    {
        Err(BridgeError::Unsupported(format!(
            "SetThreadContext of {} bytes for thread {thread_id}",
            context.len()
        )))
    }

    /// Not supported.
    pub fn request(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<()>
    {
        let _ = (input, output);
        Err(BridgeError::Unsupported(format!("Request 0x{code:x}")))
    }

    /// Unwind `context` of thread `thread_id` by one frame.
    ///
    /// ## Errors
    ///
    /// - `Unsupported`: on the desktop family
    pub fn virtual_unwind(&self, thread_id: u32, context: &mut [u8]) -> Result<()>
    {
        if self.ctx.config.platform.is_desktop() {
            return Err(BridgeError::Unsupported(format!("VirtualUnwind for thread {thread_id}")));
        }
        self.ctx.host.virtual_unwind(thread_id, context)
    }

    /// Locate metadata for an image through the hosted helper.
    ///
    /// Starts hosting when needed and runs the local symbol store fallback.
    ///
    /// ## Errors
    ///
    /// - Any hosting error
    /// - `Propagated`: the helper's own failure status
    pub fn get_metadata(&self, request: &MetadataRequest<'_>, buffer: &mut [u8]) -> Result<usize>
    {
        self.ctx.initialize_hosting()?;
        self.ctx.initialize_local_symbol_store();
        let helpers = self.ctx.helpers()?;

        let written = (helpers.get_metadata_locator)(request, buffer).map_err(BridgeError::Propagated)?;
        debug!("Metadata for {}: {written} bytes", request.image_path);
        Ok(written)
    }
}
