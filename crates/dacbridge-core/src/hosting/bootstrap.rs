//! # Host Bootstrap
//!
//! Starts the one secondary runtime instance of the process and binds the
//! helper entry points, or accepts a table seeded by a controlling frontend.
//!
//! ## State
//!
//! ```text
//! Uninitialized --initialize_hosting--> Ready
//!       |                                 ^
//!       |                                 |
//!       +------initialize_by_host---------+
//!       |
//!       +--initialize_hosting fails--> Failed (every later call fails)
//! ```
//!
//! `Ready` is terminal: the runtime is never stopped or restarted and its
//! entry-point table never changes.

use std::env;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, error, info};

use super::helpers::{HelperTable, HostedRuntime, HELPER_ASSEMBLY};
use super::tpa::TrustedAssemblies;
use crate::context::BridgeContext;
use crate::error::{BridgeError, Result};
use crate::symbols::paths::Artifact;
use crate::types::Platform;

/// Application domain name of the secondary runtime.
pub const HOST_DOMAIN_NAME: &str = "sos";

/// Compatibility switch passed to the secondary runtime.
pub const APP_DOMAIN_COMPAT_SWITCH: &str = "UseLatestBehaviorWhenTFMNotSpecified";

/// Start properties of the secondary runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProperties
{
    /// `TRUSTED_PLATFORM_ASSEMBLIES`
    pub trusted_platform_assemblies: String,
    /// `APP_PATHS`
    pub app_paths: String,
    /// `APP_NI_PATHS`
    pub app_ni_paths: String,
    /// `NATIVE_DLL_SEARCH_DIRECTORIES`
    pub native_dll_search_directories: String,
    /// `AppDomainCompatSwitch`
    pub app_domain_compat_switch: String,
}

impl RuntimeProperties
{
    /// Properties for a runtime in `runtime_directory` that also probes
    /// `module_directory`.
    pub fn new(trusted: &TrustedAssemblies, module_directory: &Path, runtime_directory: &Path, platform: Platform) -> Self
    {
        let separator = platform.path_list_separator();
        let app_paths = format!(
            "{}{separator}{}",
            module_directory.display(),
            runtime_directory.display()
        );

        Self {
            trusted_platform_assemblies: trusted.join(separator),
            native_dll_search_directories: app_paths.clone(),
            app_paths,
            app_ni_paths: runtime_directory.display().to_string(),
            app_domain_compat_switch: APP_DOMAIN_COMPAT_SWITCH.to_string(),
        }
    }

    /// (key, value) pairs in the order the runtime expects them.
    pub fn pairs(&self) -> [(&'static str, &str); 5]
    {
        [
            ("TRUSTED_PLATFORM_ASSEMBLIES", self.trusted_platform_assemblies.as_str()),
            ("APP_PATHS", self.app_paths.as_str()),
            ("APP_NI_PATHS", self.app_ni_paths.as_str()),
            ("NATIVE_DLL_SEARCH_DIRECTORIES", self.native_dll_search_directories.as_str()),
            ("AppDomainCompatSwitch", self.app_domain_compat_switch.as_str()),
        ]
    }
}

/// Loads a runtime library and starts an instance of it
pub trait RuntimeLoader
{
    /// Load `runtime_library` and initialize one instance.
    ///
    /// ## Errors
    ///
    /// - `HostFailure`: the library or its hosting exports are unusable
    /// - `Propagated`: the runtime's own initialization status
    fn start(
        &self,
        runtime_library: &Path,
        entry_executable: &Path,
        domain_name: &str,
        properties: &RuntimeProperties,
    ) -> Result<Box<dyn HostedRuntime>>;
}

/// Everything a controlling frontend can hand over in place of discovery
#[derive(Debug)]
pub struct HostSeed
{
    /// Complete helper table
    pub helpers: HelperTable,
    /// Scratch directory to use instead of creating one
    pub temp_directory: Option<PathBuf>,
    /// Data access library path
    pub dac_file_path: Option<PathBuf>,
    /// Debugging interface library path
    pub dbi_file_path: Option<PathBuf>,
    /// Whether the frontend already initialized the symbol store
    pub symbol_store_enabled: bool,
}

/// Bound helpers plus the runtime keeping them alive
pub struct HostedHelpers
{
    helpers: Rc<HelperTable>,
    _runtime: Option<Box<dyn HostedRuntime>>,
}

/// Hosting lifecycle of a [`BridgeContext`]
#[derive(Default)]
pub enum HostingState
{
    /// Nothing attempted yet
    #[default]
    Uninitialized,
    /// Helpers are bound
    Ready(HostedHelpers),
    /// Start or binding failed; the reason is reported on every later call
    Failed(String),
}

impl BridgeContext
{
    /// Start the secondary runtime and bind its helpers, once.
    ///
    /// Returns immediately when hosting is ready, including when a frontend
    /// seeded it through [`BridgeContext::initialize_by_host`].
    ///
    /// ## Errors
    ///
    /// - The locator's error on the first failing call
    /// - `ServiceUnavailable`: no [`RuntimeLoader`] was registered
    /// - `HostFailure`: the runtime did not start, an entry point is missing,
    ///   or a previous attempt already failed
    pub fn initialize_hosting(&self) -> Result<()>
    {
        match &*self.hosting.borrow() {
            HostingState::Ready(_) => return Ok(()),
            HostingState::Failed(reason) => return Err(BridgeError::HostFailure(reason.clone())),
            HostingState::Uninitialized => {}
        }

        match self.start_hosting() {
            Ok(ready) => {
                *self.hosting.borrow_mut() = HostingState::Ready(ready);
                info!("Hosted helpers ready");
                Ok(())
            }
            Err(err) => {
                error!("Failed to initialize hosting: {err}");
                *self.hosting.borrow_mut() = HostingState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    fn start_hosting(&self) -> Result<HostedHelpers>
    {
        let loader = self
            .loader
            .as_deref()
            .ok_or_else(|| BridgeError::ServiceUnavailable("no runtime loader registered".to_string()))?;
        let runtime = self.host_runtime()?.clone();

        let entry_executable = env::current_exe().map_err(|err| {
            BridgeError::HostFailure(format!("could not get full path to current executable: {err}"))
        })?;

        let mut trusted = TrustedAssemblies::new([HELPER_ASSEMBLY]);
        trusted.add_directory(&self.config.module_directory);
        trusted.add_directory(&runtime.directory);
        debug!("Trust list has {} entries", trusted.entries().len());

        let properties = RuntimeProperties::new(
            &trusted,
            &self.config.module_directory,
            &runtime.directory,
            self.config.platform,
        );

        let hosted = loader
            .start(&runtime.library_path, &entry_executable, HOST_DOMAIN_NAME, &properties)
            .map_err(|err| match err {
                BridgeError::Propagated(_) | BridgeError::HostFailure(_) => err,
                other => BridgeError::HostFailure(format!(
                    "failed to load {}: {other}",
                    runtime.library_path.display()
                )),
            })?;

        let helpers = HelperTable::bind(hosted.as_ref())?;
        Ok(HostedHelpers {
            helpers: Rc::new(helpers),
            _runtime: Some(hosted),
        })
    }

    /// Accept helpers, paths and store state from a controlling frontend.
    ///
    /// Discovery, runtime start and entry-point binding are skipped entirely.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: hosting is already ready
    pub fn initialize_by_host(&self, seed: HostSeed) -> Result<()>
    {
        if self.is_hosting_initialized() {
            return Err(BridgeError::InvalidArgument("hosting is already initialized".to_string()));
        }

        if let Some(dir) = seed.temp_directory {
            self.scratch.seed(dir);
        }
        if let Some(path) = seed.dac_file_path {
            self.paths.latch(Artifact::Dac, path);
        }
        if let Some(path) = seed.dbi_file_path {
            self.paths.latch(Artifact::Dbi, path);
        }
        self.store.set_enabled(seed.symbol_store_enabled);

        *self.hosting.borrow_mut() = HostingState::Ready(HostedHelpers {
            helpers: Rc::new(seed.helpers),
            _runtime: None,
        });
        info!("Hosting seeded by the frontend");
        Ok(())
    }

    /// `true` once helpers are bound or seeded.
    pub fn is_hosting_initialized(&self) -> bool
    {
        matches!(&*self.hosting.borrow(), HostingState::Ready(_))
    }

    /// The bound helper table.
    ///
    /// ## Errors
    ///
    /// - `ServiceUnavailable`: hosting is not ready
    pub fn helpers(&self) -> Result<Rc<HelperTable>>
    {
        match &*self.hosting.borrow() {
            HostingState::Ready(ready) => Ok(Rc::clone(&ready.helpers)),
            _ => Err(BridgeError::ServiceUnavailable("hosted helpers are not bound".to_string())),
        }
    }
}
