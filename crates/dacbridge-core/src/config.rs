//! # Bridge Configuration
//!
//! Everything the bridge needs to know about its surroundings before the
//! first command runs: which platform rules apply, where the bridge itself is
//! installed, where shared runtimes live and where scratch files go.
//!
//! ## Environment Variables
//!
//! - `DACBRIDGE_MODULE_DIR`: directory containing the bridge and its managed
//!   companion (default: directory of the current executable)
//! - `DACBRIDGE_RUNTIME_ROOT`: single shared-runtime root, replacing the
//!   platform's candidate list
//! - `DACBRIDGE_TEMP_DIR`: parent of the per-process scratch directory
//!   (default: the OS temp directory)
//! - `PROGRAMFILES` (Windows only): base of the shared-runtime root
//!
//! ## Example
//!
//! ```rust
//! use dacbridge_core::config::BridgeConfig;
//! use dacbridge_core::types::Platform;
//!
//! let config = BridgeConfig::for_platform(Platform::Linux).with_runtime_roots(vec!["/opt/dotnet/shared/Microsoft.NETCore.App".into()]);
//! assert_eq!(config.runtime_preferences[0], (2, 1));
//! ```

use std::env;
use std::path::PathBuf;

use tracing::debug;

use crate::types::{Architecture, Platform};

/// Ordered (major, minor) preference list for the hosting runtime.
///
/// The oldest long-term-support line comes first; later entries are only used
/// when nothing earlier is installed.
pub const DEFAULT_RUNTIME_PREFERENCES: &[(u32, u32)] = &[(2, 1), (2, 2), (3, 0)];

/// Shared-runtime roots probed on Linux, in order.
///
/// The Red Hat software-collection layouts come before the standard one.
pub const LINUX_RUNTIME_ROOTS: &[&str] = &[
    "/rh-dotnet21/root/usr/bin/dotnet/shared/Microsoft.NETCore.App",
    "/rh-dotnet20/root/usr/bin/dotnet/shared/Microsoft.NETCore.App",
    "/usr/share/dotnet/shared/Microsoft.NETCore.App",
];

/// Shared-runtime root on macOS.
pub const MACOS_RUNTIME_ROOT: &str = "/usr/local/share/dotnet/shared/Microsoft.NETCore.App";

/// Shared-runtime root below `%PROGRAMFILES%` on Windows.
pub const WINDOWS_RUNTIME_SUBDIR: &str = "dotnet\\shared\\Microsoft.NETCore.App";

/// Bridge configuration
///
/// Constructed once by the frontend and moved into the
/// [`BridgeContext`](crate::context::BridgeContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig
{
    /// Platform rules in effect
    pub platform: Platform,
    /// Target architecture (drives the reported pointer size)
    pub architecture: Architecture,
    /// Directory holding the bridge and its managed companion library
    pub module_directory: PathBuf,
    /// Ordered shared-runtime root candidates; the first existing one wins,
    /// otherwise the last one is used
    pub runtime_roots: Vec<PathBuf>,
    /// Ordered (major, minor) pairs tried when picking a hosting runtime
    pub runtime_preferences: Vec<(u32, u32)>,
    /// Parent directory of the scratch directory
    pub temp_root: PathBuf,
}

impl BridgeConfig
{
    /// Defaults for `platform`, without consulting the environment beyond
    /// `PROGRAMFILES` on Windows.
    pub fn for_platform(platform: Platform) -> Self
    {
        Self {
            platform,
            architecture: Architecture::current(),
            module_directory: default_module_directory(),
            runtime_roots: default_runtime_roots(platform),
            runtime_preferences: DEFAULT_RUNTIME_PREFERENCES.to_vec(),
            temp_root: env::temp_dir(),
        }
    }

    /// Defaults for the running platform with `DACBRIDGE_*` overrides applied.
    pub fn from_env() -> Self
    {
        let mut config = Self::for_platform(Platform::current());

        if let Some(dir) = env::var_os("DACBRIDGE_MODULE_DIR") {
            config.module_directory = PathBuf::from(dir);
        }
        if let Some(root) = env::var_os("DACBRIDGE_RUNTIME_ROOT") {
            config.runtime_roots = vec![PathBuf::from(root)];
        }
        if let Some(temp) = env::var_os("DACBRIDGE_TEMP_DIR") {
            config.temp_root = PathBuf::from(temp);
        }

        debug!("Bridge configuration: {:?}", config);
        config
    }

    /// Override the directory holding the bridge and its companion library.
    #[must_use]
    pub fn with_module_directory(mut self, dir: impl Into<PathBuf>) -> Self
    {
        self.module_directory = dir.into();
        self
    }

    /// Replace the shared-runtime root candidates.
    #[must_use]
    pub fn with_runtime_roots(mut self, roots: Vec<PathBuf>) -> Self
    {
        self.runtime_roots = roots;
        self
    }

    /// Replace the (major, minor) preference list.
    #[must_use]
    pub fn with_runtime_preferences(mut self, preferences: Vec<(u32, u32)>) -> Self
    {
        self.runtime_preferences = preferences;
        self
    }

    /// Override the parent directory of the scratch directory.
    #[must_use]
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self
    {
        self.temp_root = root.into();
        self
    }

    /// Override the target architecture.
    #[must_use]
    pub fn with_architecture(mut self, architecture: Architecture) -> Self
    {
        self.architecture = architecture;
        self
    }
}

impl Default for BridgeConfig
{
    fn default() -> Self
    {
        Self::for_platform(Platform::current())
    }
}

fn default_module_directory() -> PathBuf
{
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Platform's shared-runtime root candidates.
///
/// On Windows this is empty when `PROGRAMFILES` is not set, which makes
/// runtime location fail later with a clear diagnostic.
pub fn default_runtime_roots(platform: Platform) -> Vec<PathBuf>
{
    match platform {
        Platform::Windows => env::var_os("PROGRAMFILES")
            .map(|base| vec![PathBuf::from(base).join(WINDOWS_RUNTIME_SUBDIR)])
            .unwrap_or_default(),
        Platform::Linux => LINUX_RUNTIME_ROOTS.iter().map(PathBuf::from).collect(),
        Platform::MacOs => vec![PathBuf::from(MACOS_RUNTIME_ROOT)],
    }
}
