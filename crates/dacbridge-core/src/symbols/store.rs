//! # Symbol Store Orchestrator
//!
//! Remote and local symbol acquisition through the hosted helpers.
//!
//! The store is off until one of three things turns it on:
//!
//! - [`BridgeContext::enable_symbol_store`] with explicit settings
//! - a frontend seed that reports it as already enabled
//! - the one-shot local fallback, which forwards the host's own symbol path
//!   (desktop family only)
//!
//! Nothing in here is fatal to the session: failures are logged and the
//! caller carries on without downloaded symbols.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, error, info};

use crate::context::BridgeContext;
use crate::error::{BridgeError, Result};
use crate::host::DebugHost;
use crate::hosting::helpers::{NativeModuleImage, ReadMemory, SymbolStoreOptions};
use crate::symbols::paths::Artifact;
use crate::types::Address;

/// Symbol store flags
#[derive(Debug, Default)]
pub struct StoreState
{
    enabled: Cell<bool>,
    local_fallback_done: Cell<bool>,
}

impl StoreState
{
    /// `true` while the store is initialized.
    pub fn is_enabled(&self) -> bool
    {
        self.enabled.get()
    }

    pub(crate) fn set_enabled(&self, enabled: bool)
    {
        self.enabled.set(enabled);
    }
}

/// Read target memory on behalf of a helper.
///
/// Failures are reported as zero bytes read, never as errors.
pub fn read_memory_for_symbols(host: &dyn DebugHost, address: Address, buffer: &mut [u8]) -> usize
{
    let len = buffer.len();
    match host.read_virtual(address, buffer) {
        Ok(read) => read.min(len),
        Err(err) => {
            debug!("Symbol read of {len} bytes at {address} failed: {err}");
            0
        }
    }
}

impl BridgeContext
{
    /// Initialize the symbol store with explicit settings.
    ///
    /// Starts hosting first when needed.
    ///
    /// ## Errors
    ///
    /// - Any hosting error
    /// - `Failed`: the helper rejected the settings
    pub fn enable_symbol_store(&self, options: &SymbolStoreOptions) -> Result<()>
    {
        self.initialize_hosting()?;
        let helpers = self.helpers()?;

        if !(helpers.initialize_symbol_store)(options) {
            error!("Error initializing symbol server support");
            return Err(BridgeError::Failed("symbol server initialization rejected".to_string()));
        }

        self.store.set_enabled(true);
        info!("Symbol store enabled");
        Ok(())
    }

    /// Turn the store off; no-op when it is not enabled.
    pub fn disable_symbol_store(&self)
    {
        if !self.store.enabled.replace(false) {
            return;
        }
        match self.helpers() {
            Ok(helpers) => (helpers.disable_symbol_store)(),
            Err(err) => debug!("Symbol store disabled without helpers: {err}"),
        }
    }

    /// Lines describing the store configuration; empty when not enabled.
    pub fn display_symbol_store(&self) -> Vec<String>
    {
        let mut lines = Vec::new();
        if !self.store.is_enabled() {
            return lines;
        }
        if let Ok(helpers) = self.helpers() {
            (helpers.display_symbol_store)(&mut |line| lines.push(line.to_string()));
        }
        lines
    }

    /// `true` while the store is initialized.
    pub fn is_symbol_store_enabled(&self) -> bool
    {
        self.store.is_enabled()
    }

    /// Forward the host's symbol path to the store, once per process.
    ///
    /// Only the desktop family does this, only when the store is not already
    /// enabled, and only when the host's symbol path is non-empty.
    pub fn initialize_local_symbol_store(&self)
    {
        if !self.config.platform.is_desktop() || self.store.is_enabled() {
            return;
        }
        if self.store.local_fallback_done.replace(true) {
            return;
        }

        let symbol_path = match self.host.symbol_path() {
            Ok(path) => path,
            Err(err) => {
                debug!("No host symbol path: {err}");
                return;
            }
        };
        if symbol_path.is_empty() {
            return;
        }

        let Ok(helpers) = self.helpers() else {
            return;
        };
        if (helpers.initialize_symbol_store)(&SymbolStoreOptions::from_symbol_path(symbol_path)) {
            self.store.set_enabled(true);
        } else {
            error!("Host symbol path parsing failed");
        }
    }

    /// Offer the target's runtime module to the helper's download routine.
    ///
    /// Does nothing unless the store is enabled. Resolved data access and
    /// debugging interface files latch the matching artifact path when it is
    /// still unset; any other file is handed to the host.
    ///
    /// ## Errors
    ///
    /// - `ServiceUnavailable`: hosting is not ready
    /// - `NotFound`: the runtime module is not loaded
    /// - `Io`: the scratch directory could not be created
    pub fn load_runtime_symbols(&self) -> Result<()>
    {
        if !self.store.is_enabled() {
            return Ok(());
        }
        let helpers = self.helpers()?;

        let name = self.config.platform.runtime_module_name();
        let module = self.host.module_by_name(&name)?;
        let temp_directory = self.scratch.path()?;

        let image = NativeModuleImage {
            temp_directory: &temp_directory,
            module_path: &module.image_path,
            address: module.base,
            size: module.size,
            read_memory: self.symbol_memory_reader(),
        };
        debug!("Downloading symbols for {}", module.image_path.display());
        (helpers.load_native_symbols)(&image, &mut |module_file, symbol_file| {
            self.on_symbol_file(module_file, symbol_file);
        });
        Ok(())
    }

    /// Download callback: a helper resolved `symbol_file` for `module_file`.
    pub fn on_symbol_file(&self, module_file: &str, symbol_file: &Path)
    {
        let platform = self.config.platform;
        if module_file == platform.runtime_library_name() {
            return;
        }

        for artifact in [Artifact::Dac, Artifact::Dbi] {
            if module_file == artifact.file_name(platform) {
                if self.paths.latch(artifact, symbol_file) {
                    debug!("Downloaded {}: {}", artifact.stem(), symbol_file.display());
                }
                return;
            }
        }

        if let Err(err) = self.host.add_module_symbol(symbol_file) {
            debug!("Host did not take {}: {err}", symbol_file.display());
        }
    }

    /// Safe-read callback over the host, for the helpers.
    pub fn symbol_memory_reader(&self) -> ReadMemory
    {
        let host = Rc::clone(&self.host);
        Rc::new(move |address, buffer| read_memory_for_symbols(host.as_ref(), address, buffer))
    }
}
