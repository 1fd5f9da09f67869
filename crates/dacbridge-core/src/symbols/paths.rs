//! # Runtime Artifact Paths
//!
//! The two native runtime artifacts the analysis component needs: the data
//! access library and the debugging interface library. Each path is latched
//! at most once; a later candidate never replaces a latched one.
//!
//! ## Resolution Order
//!
//! 1. A path latched earlier (seeded, computed or reported by a download)
//! 2. `<target runtime directory>/<platform library name>`, which the
//!    non-desktop family only accepts when the file exists
//! 3. A runtime-only symbol download sweep, whose callback may latch it

use std::io;
use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;
use tracing::{debug, error};

use crate::context::BridgeContext;
use crate::error::{BridgeError, Result};
use crate::types::Platform;

/// Runtime artifact located next to the target's runtime module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact
{
    /// Data access library (`mscordaccore`)
    Dac,
    /// Debugging interface library (`mscordbi`)
    Dbi,
}

impl Artifact
{
    /// File-name stem of the artifact.
    pub const fn stem(self) -> &'static str
    {
        match self {
            Artifact::Dac => "mscordaccore",
            Artifact::Dbi => "mscordbi",
        }
    }

    /// Platform file name of the artifact.
    pub fn file_name(self, platform: Platform) -> String
    {
        platform.library_name(self.stem())
    }
}

/// Set-once artifact path slots
#[derive(Debug, Default)]
pub struct CachedPaths
{
    dac: OnceCell<PathBuf>,
    dbi: OnceCell<PathBuf>,
}

impl CachedPaths
{
    fn slot(&self, artifact: Artifact) -> &OnceCell<PathBuf>
    {
        match artifact {
            Artifact::Dac => &self.dac,
            Artifact::Dbi => &self.dbi,
        }
    }

    /// The latched path, if any.
    pub fn get(&self, artifact: Artifact) -> Option<&Path>
    {
        self.slot(artifact).get().map(PathBuf::as_path)
    }

    /// Latch `path` unless a path is already latched.
    ///
    /// Returns `true` when `path` was stored.
    pub fn latch(&self, artifact: Artifact, path: impl Into<PathBuf>) -> bool
    {
        self.slot(artifact).set(path.into()).is_ok()
    }
}

impl BridgeContext
{
    /// Path of the data access library matching the target's runtime.
    ///
    /// On Linux the returned path is a symlink inside the scratch directory,
    /// so that the library does not pick up the runtime's optional tracing
    /// provider sitting next to the real file.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: neither the runtime directory nor a download produced it
    pub fn dac_file_path(&self) -> Result<PathBuf>
    {
        self.artifact_path(Artifact::Dac)
    }

    /// Path of the debugging interface library matching the target's runtime.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: neither the runtime directory nor a download produced it
    pub fn dbi_file_path(&self) -> Result<PathBuf>
    {
        self.artifact_path(Artifact::Dbi)
    }

    fn artifact_path(&self, artifact: Artifact) -> Result<PathBuf>
    {
        if let Some(path) = self.paths.get(artifact) {
            return Ok(path.to_path_buf());
        }

        if let Some(path) = self.probe_artifact(artifact) {
            let path = if artifact == Artifact::Dac && self.config.platform == Platform::Linux {
                self.link_into_scratch(&path)
            } else {
                path
            };
            self.paths.latch(artifact, path);
        }

        if self.paths.get(artifact).is_none() {
            debug!("{} not next to the runtime, trying a symbol download", artifact.stem());
            if let Err(err) = self.load_runtime_symbols() {
                debug!("Runtime symbol download failed: {err}");
            }
        }

        self.paths
            .get(artifact)
            .map(Path::to_path_buf)
            .ok_or_else(|| BridgeError::NotFound(artifact.file_name(self.config.platform)))
    }

    fn probe_artifact(&self, artifact: Artifact) -> Option<PathBuf>
    {
        let directory = match self.target_runtime_directory() {
            Ok(directory) => directory,
            Err(err) => {
                debug!("No runtime directory for {}: {err}", artifact.stem());
                return None;
            }
        };

        let path = directory.join(artifact.file_name(self.config.platform));
        if !self.config.platform.is_desktop() && !path.exists() {
            return None;
        }
        Some(path)
    }

    fn link_into_scratch(&self, target: &Path) -> PathBuf
    {
        let link = self.scratch.path().and_then(|dir| {
            let name = target.file_name().ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
            let link = dir.join(name);
            symlink(target, &link)?;
            Ok(link)
        });

        match link {
            Ok(link) => link,
            Err(err) => {
                error!("Failed to link {} into the scratch directory: {err}", target.display());
                target.to_path_buf()
            }
        }
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()>
{
    if link.symlink_metadata().is_ok() {
        std::fs::remove_file(link)?;
    }
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> io::Result<()>
{
    Err(io::Error::from(io::ErrorKind::Unsupported))
}
