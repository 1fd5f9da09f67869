//! # Bridge Context
//!
//! The single owned value that carries every piece of process-wide state:
//! the chosen hosting runtime, the hosting lifecycle, the latched artifact
//! paths, the scratch directory, the symbol store flags and the crash-dump
//! metadata ranges.
//!
//! A context is created once when the bridge is loaded and shared by
//! reference counting between the [`MemoryTarget`](crate::target::MemoryTarget)
//! and every [`SymbolReader`](crate::pdb::SymbolReader). It is deliberately
//! `!Send`: all operations run on the host's command thread. The one piece
//! that may be touched from elsewhere, the scratch directory, is reachable
//! through [`BridgeContext::scratch_directory`] as an `Arc`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::rc::Rc;
//!
//! use dacbridge_core::config::BridgeConfig;
//! use dacbridge_core::context::BridgeContext;
//! use dacbridge_core::host::DebugHost;
//!
//! # fn host() -> Rc<dyn DebugHost> { unimplemented!() }
//! let ctx = Rc::new(BridgeContext::new(BridgeConfig::from_env(), host()));
//! let exit_hook = ctx.scratch_directory();
//! // ... run commands ...
//! exit_hook.shutdown();
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::host::DebugHost;
use crate::hosting::bootstrap::{HostingState, RuntimeLoader};
use crate::hosting::locator::HostRuntime;
use crate::pdb::native::NativeSymbolBinder;
use crate::symbols::paths::CachedPaths;
use crate::symbols::scratch::ScratchDirectory;
use crate::symbols::store::StoreState;
use crate::target::metadata::MetadataRegions;
use crate::types::MemoryRange;

/// Process-wide bridge state
pub struct BridgeContext
{
    pub(crate) config: BridgeConfig,
    pub(crate) host: Rc<dyn DebugHost>,
    pub(crate) loader: Option<Box<dyn RuntimeLoader>>,
    pub(crate) native_binder: Option<Box<dyn NativeSymbolBinder>>,
    pub(crate) host_runtime: OnceCell<HostRuntime>,
    pub(crate) hosting: RefCell<HostingState>,
    pub(crate) paths: CachedPaths,
    pub(crate) scratch: Arc<ScratchDirectory>,
    pub(crate) store: StoreState,
    pub(crate) metadata_regions: RefCell<MetadataRegions>,
}

impl BridgeContext
{
    /// Fresh context over `host`; nothing is discovered or started yet.
    pub fn new(config: BridgeConfig, host: Rc<dyn DebugHost>) -> Self
    {
        debug!(
            "Creating bridge context for {} ({})",
            config.platform, config.architecture
        );
        let scratch = Arc::new(ScratchDirectory::new(config.temp_root.clone()));
        Self {
            config,
            host,
            loader: None,
            native_binder: None,
            host_runtime: OnceCell::new(),
            hosting: RefCell::new(HostingState::Uninitialized),
            paths: CachedPaths::default(),
            scratch,
            store: StoreState::default(),
            metadata_regions: RefCell::new(MetadataRegions::default()),
        }
    }

    /// Register the loader used to start the secondary runtime.
    #[must_use]
    pub fn with_runtime_loader(mut self, loader: Box<dyn RuntimeLoader>) -> Self
    {
        self.loader = Some(loader);
        self
    }

    /// Register the binder for the legacy symbol format.
    #[must_use]
    pub fn with_native_binder(mut self, binder: Box<dyn NativeSymbolBinder>) -> Self
    {
        self.native_binder = Some(binder);
        self
    }

    /// The configuration this context was built with.
    pub fn config(&self) -> &BridgeConfig
    {
        &self.config
    }

    /// The host debugging environment.
    pub fn host(&self) -> &Rc<dyn DebugHost>
    {
        &self.host
    }

    /// Shared handle on the scratch directory, for process-exit hooks.
    pub fn scratch_directory(&self) -> Arc<ScratchDirectory>
    {
        Arc::clone(&self.scratch)
    }

    /// Record a metadata range that is known to be absent from a crash dump.
    ///
    /// Reads overlapping it are refused so that the analysis component falls
    /// back to the metadata lookup.
    pub fn register_metadata_region(&self, region: MemoryRange)
    {
        debug!("Registered absent metadata region {region}");
        self.metadata_regions.borrow_mut().register(region);
    }
}

impl fmt::Debug for BridgeContext
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("BridgeContext")
            .field("config", &self.config)
            .field("host_runtime", &self.host_runtime.get())
            .field("hosting_initialized", &self.is_hosting_initialized())
            .field("paths", &self.paths)
            .field("scratch", &self.scratch.current())
            .finish_non_exhaustive()
    }
}

impl Drop for BridgeContext
{
    fn drop(&mut self)
    {
        self.scratch.shutdown();
    }
}
