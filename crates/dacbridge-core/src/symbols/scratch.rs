//! # Scratch Directory
//!
//! One private directory per process, named after the process id, where
//! downloaded symbol files and the runtime-artifact symlink are staged.
//!
//! The directory is created on first use. [`ScratchDirectory::shutdown`] is
//! the only operation that may run off the command thread (from a
//! process-exit hook), so the path lives behind a mutex and is taken out in
//! one step; whoever takes it does the cleanup, everyone else sees `None`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

/// Prefix of the per-process directory name.
pub const SCRATCH_PREFIX: &str = "dacbridge";

/// Lazily created per-process scratch directory
#[derive(Debug)]
pub struct ScratchDirectory
{
    root: PathBuf,
    path: Mutex<Option<PathBuf>>,
}

impl ScratchDirectory
{
    /// Scratch directory to be created below `root` on first use.
    pub fn new(root: impl Into<PathBuf>) -> Self
    {
        Self {
            root: root.into(),
            path: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<PathBuf>>
    {
        self.path.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Path of the scratch directory, creating it if needed.
    ///
    /// ## Errors
    ///
    /// - `Io`: the directory could not be created
    pub fn path(&self) -> io::Result<PathBuf>
    {
        let mut slot = self.lock();
        if let Some(path) = slot.as_ref() {
            return Ok(path.clone());
        }

        let path = self.root.join(format!("{SCRATCH_PREFIX}{}", std::process::id()));
        fs::create_dir_all(&path)?;
        debug!("Created scratch directory {}", path.display());
        *slot = Some(path.clone());
        Ok(path)
    }

    /// Adopt a directory chosen by a controlling frontend.
    ///
    /// Ignored when a directory is already in use.
    pub fn seed(&self, path: impl Into<PathBuf>) -> bool
    {
        let mut slot = self.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(path.into());
        true
    }

    /// The directory currently in use, without creating one.
    pub fn current(&self) -> Option<PathBuf>
    {
        self.lock().clone()
    }

    /// Delete every staged file and the directory itself.
    ///
    /// Safe to call when the directory was never created, and any number of
    /// times; only the first call after creation does any work.
    pub fn shutdown(&self)
    {
        let Some(path) = self.lock().take() else {
            return;
        };

        if let Err(err) = remove_staged(&path) {
            warn!("Failed to clean up scratch directory {}: {err}", path.display());
        } else {
            debug!("Removed scratch directory {}", path.display());
        }
    }
}

fn remove_staged(path: &Path) -> io::Result<()>
{
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            // Symlinks are removed as links; their targets are left alone.
            fs::remove_file(entry.path())?;
        }
    }

    fs::remove_dir(path)
}
