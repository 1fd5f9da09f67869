//! # Host Runtime Locator
//!
//! Chooses the runtime installation that will host the helper code.
//!
//! ## Discovery Chain
//!
//! 1. A runtime resolved earlier in this process is reused unchanged
//! 2. The first existing shared-runtime root is picked (the last candidate
//!    when none exists)
//! 3. Version-named subdirectories are matched against the ordered
//!    (major, minor) preference list; the first pair with any match wins and
//!    its highest patch is used
//! 4. With no match, the directory of the runtime loaded in the target is used
//!
//! The winner is cached on the [`BridgeContext`] for the rest of the process.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::context::BridgeContext;
use crate::error::{BridgeError, Result};

/// Runtime chosen to host the helper code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRuntime
{
    /// Directory of the runtime installation
    pub directory: PathBuf,
    /// Full path of the runtime library inside `directory`
    pub library_path: PathBuf,
}

/// Parse a runtime version directory name as `major.minor.patch`.
///
/// Only a numeric prefix of the patch component is considered, so
/// pre-release directories parse as their base version.
///
/// ```rust
/// use dacbridge_core::hosting::locator::parse_runtime_version;
///
/// assert_eq!(parse_runtime_version("2.1.5"), Some((2, 1, 5)));
/// assert_eq!(parse_runtime_version("3.0.0-preview8"), Some((3, 0, 0)));
/// assert_eq!(parse_runtime_version("2.1"), None);
/// ```
pub fn parse_runtime_version(name: &str) -> Option<(u32, u32, u32)>
{
    let mut parts = name.splitn(3, '.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let rest = parts.next()?;

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let patch = rest[..digits].parse().ok()?;
    Some((major, minor, patch))
}

/// Find the highest-patch `major.minor.*` subdirectory of `root`.
///
/// Entries are visited in name order; on equal patch numbers the later entry
/// wins.
pub fn find_runtime_version(root: &Path, major: u32, minor: u32) -> Option<PathBuf>
{
    let entries = fs::read_dir(root).ok()?;
    let mut names: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    let mut best: Option<(u32, &str)> = None;
    for name in &names {
        let Some((found_major, found_minor, patch)) = parse_runtime_version(name) else {
            continue;
        };
        if found_major != major || found_minor != minor {
            continue;
        }
        match best {
            Some((highest, _)) if patch < highest => {}
            _ => best = Some((patch, name)),
        }
    }

    best.map(|(_, name)| root.join(name))
}

/// Walk `preferences` in order and return the first version directory found.
pub fn select_runtime_directory(root: &Path, preferences: &[(u32, u32)]) -> Option<PathBuf>
{
    preferences.iter().find_map(|&(major, minor)| {
        let found = find_runtime_version(root, major, minor);
        if found.is_none() {
            debug!("No {major}.{minor}.x runtime under {}", root.display());
        }
        found
    })
}

/// First existing candidate root, or the last candidate when none exists.
pub fn probe_runtime_root(candidates: &[PathBuf]) -> Option<PathBuf>
{
    candidates
        .iter()
        .find(|candidate| candidate.exists())
        .or_else(|| candidates.last())
        .cloned()
}

impl BridgeContext
{
    /// The runtime chosen to host helper code, resolved once per process.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: no shared-runtime root is configured, or no preferred
    ///   version is installed and the target's runtime module is not loaded
    pub fn host_runtime(&self) -> Result<&HostRuntime>
    {
        self.host_runtime.get_or_try_init(|| self.locate_host_runtime())
    }

    fn locate_host_runtime(&self) -> Result<HostRuntime>
    {
        let Some(root) = probe_runtime_root(&self.config.runtime_roots) else {
            error!("No shared runtime location is known for {}", self.config.platform);
            return Err(BridgeError::NotFound("shared runtime root".to_string()));
        };

        let directory = match select_runtime_directory(&root, &self.config.runtime_preferences) {
            Some(directory) => directory,
            None => {
                debug!("No preferred runtime installed, hosting on the target's runtime");
                self.target_runtime_directory()?
            }
        };

        let library_path = directory.join(self.config.platform.runtime_library_name());
        info!("Hosting runtime: {}", directory.display());
        Ok(HostRuntime {
            directory,
            library_path,
        })
    }

    /// Directory of the runtime module loaded in the target.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: the runtime module is not loaded (yet) or its image file
    ///   does not exist
    pub fn target_runtime_directory(&self) -> Result<PathBuf>
    {
        let name = self.config.platform.runtime_module_name();
        let module = self.host.module_by_name(&name).map_err(|err| {
            error!("Runtime module ({name}) not loaded yet: {err}");
            BridgeError::NotFound(format!("runtime module {name}"))
        })?;

        let image = if self.config.platform.is_desktop() {
            if !module.image_path.is_file() {
                error!("Runtime module {} does not exist", module.image_path.display());
                return Err(BridgeError::NotFound(module.image_path.display().to_string()));
            }
            module.image_path
        } else {
            fs::canonicalize(&module.image_path).map_err(|err| {
                error!("Failed to resolve {}: {err}", module.image_path.display());
                BridgeError::NotFound(module.image_path.display().to_string())
            })?
        };

        image
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| BridgeError::NotFound(format!("directory of {}", image.display())))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn runtime_root(versions: &[&str]) -> tempfile::TempDir
    {
        let root = tempfile::tempdir().unwrap();
        for version in versions {
            fs::create_dir(root.path().join(version)).unwrap();
        }
        root
    }

    #[test]
    fn test_parse_runtime_version_rejects_short_names()
    {
        assert_eq!(parse_runtime_version("2"), None);
        assert_eq!(parse_runtime_version("x.1.2"), None);
        assert_eq!(parse_runtime_version("2.1.x"), None);
        assert_eq!(parse_runtime_version("10.20.30"), Some((10, 20, 30)));
    }

    #[test]
    fn test_highest_patch_of_first_preference_wins()
    {
        let root = runtime_root(&["2.1.3", "2.1.12", "2.2.8", "3.0.1"]);
        let found = select_runtime_directory(root.path(), &[(2, 1), (2, 2), (3, 0)]).unwrap();
        assert_eq!(found, root.path().join("2.1.12"));
    }

    #[test]
    fn test_later_preference_used_when_earlier_missing()
    {
        let root = runtime_root(&["2.2.0", "2.2.7", "3.0.9"]);
        let found = select_runtime_directory(root.path(), &[(2, 1), (2, 2), (3, 0)]).unwrap();
        assert_eq!(found, root.path().join("2.2.7"));
    }

    #[test]
    fn test_no_matching_version()
    {
        let root = runtime_root(&["1.0.4", "5.0.0"]);
        assert!(select_runtime_directory(root.path(), &[(2, 1), (2, 2), (3, 0)]).is_none());
        assert!(find_runtime_version(&root.path().join("missing"), 2, 1).is_none());
    }

    #[test]
    fn test_files_are_not_versions()
    {
        let root = runtime_root(&[]);
        fs::write(root.path().join("2.1.9"), b"").unwrap();
        assert!(find_runtime_version(root.path(), 2, 1).is_none());
    }

    #[test]
    fn test_probe_runtime_root()
    {
        let existing = tempfile::tempdir().unwrap();
        let missing = existing.path().join("missing");
        let last = existing.path().join("last");

        let found = probe_runtime_root(&[missing.clone(), existing.path().to_path_buf(), last.clone()]);
        assert_eq!(found.as_deref(), Some(existing.path()));
        assert_eq!(probe_runtime_root(&[missing, last.clone()]), Some(last));
        assert_eq!(probe_runtime_root(&[]), None);
    }
}
