//! # Trust List
//!
//! Builds the list of library files the secondary runtime may load as
//! pre-verified code.
//!
//! Each directory is walked twice: first for optimized (`.ni.dll`) images,
//! then for plain `.dll` files. A base name is only ever added once across
//! all directories, so an optimized image shadows its plain twin and the
//! first directory shadows the later ones.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

const OPTIMIZED_SUFFIX: &str = ".ni.dll";
const PLAIN_SUFFIX: &str = ".dll";

/// De-duplicated, ordered trust list
#[derive(Debug, Clone, Default)]
pub struct TrustedAssemblies
{
    seen: HashSet<String>,
    entries: Vec<PathBuf>,
}

impl TrustedAssemblies
{
    /// Empty list that will never contain the given base names.
    pub fn new<'a>(excluded: impl IntoIterator<Item = &'a str>) -> Self
    {
        Self {
            seen: excluded.into_iter().map(str::to_ascii_lowercase).collect(),
            entries: Vec::new(),
        }
    }

    /// Add the libraries of `directory`.
    ///
    /// A missing or unreadable directory adds nothing.
    pub fn add_directory(&mut self, directory: &Path)
    {
        let mut files: Vec<String> = match fs::read_dir(directory) {
            Ok(entries) => entries
                .filter_map(std::result::Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|kind| !kind.is_dir()))
                .filter_map(|entry| entry.file_name().into_string().ok())
                .collect(),
            Err(err) => {
                debug!("Skipping trust-list directory {}: {err}", directory.display());
                return;
            }
        };
        files.sort();

        let before = self.entries.len();
        for suffix in [OPTIMIZED_SUFFIX, PLAIN_SUFFIX] {
            for file in &files {
                let Some(base) = strip_suffix_ignore_case(file, suffix) else {
                    continue;
                };
                if suffix == PLAIN_SUFFIX && strip_suffix_ignore_case(file, OPTIMIZED_SUFFIX).is_some() {
                    continue;
                }
                if self.seen.insert(base.to_ascii_lowercase()) {
                    trace!("Trusting {file}");
                    self.entries.push(directory.join(file));
                }
            }
        }
        debug!(
            "Trusted {} libraries from {}",
            self.entries.len() - before,
            directory.display()
        );
    }

    /// Trusted files in insertion order.
    pub fn entries(&self) -> &[PathBuf]
    {
        &self.entries
    }

    /// `true` when nothing has been trusted.
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// The list as one string, entries separated by `separator`.
    pub fn join(&self, separator: char) -> String
    {
        let mut joined = String::new();
        for entry in &self.entries {
            if !joined.is_empty() {
                joined.push(separator);
            }
            joined.push_str(&entry.to_string_lossy());
        }
        joined
    }
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str>
{
    let split = name.len().checked_sub(suffix.len())?;
    if !name.is_char_boundary(split) {
        return None;
    }
    let (base, tail) = name.split_at(split);
    (!base.is_empty() && tail.eq_ignore_ascii_case(suffix)).then_some(base)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn directory_with(files: &[&str]) -> tempfile::TempDir
    {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            fs::write(dir.path().join(file), b"").unwrap();
        }
        dir
    }

    fn names(list: &TrustedAssemblies) -> Vec<String>
    {
        list.entries()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_optimized_image_shadows_plain()
    {
        let dir = directory_with(&["System.Runtime.dll", "System.Runtime.ni.dll", "System.Linq.dll"]);
        let mut list = TrustedAssemblies::default();
        list.add_directory(dir.path());
        assert_eq!(names(&list), vec!["System.Runtime.ni.dll", "System.Linq.dll"]);
    }

    #[test]
    fn test_lone_optimized_image_listed_once()
    {
        let dir = directory_with(&["Foo.ni.dll"]);
        let mut list = TrustedAssemblies::default();
        list.add_directory(dir.path());
        assert_eq!(names(&list), vec!["Foo.ni.dll"]);
    }

    #[test]
    fn test_base_name_deduplicated_across_directories()
    {
        let first = directory_with(&["Foo.dll"]);
        let second = directory_with(&["Foo.ni.dll", "Bar.dll"]);
        let mut list = TrustedAssemblies::default();
        list.add_directory(first.path());
        list.add_directory(second.path());
        assert_eq!(
            list.entries(),
            [first.path().join("Foo.dll"), second.path().join("Bar.dll")]
        );
    }

    #[test]
    fn test_excluded_and_non_library_files()
    {
        let dir = directory_with(&["SOS.NETCore.dll", "readme.txt", "libcoreclr.so", "Helper.dll"]);
        let mut list = TrustedAssemblies::new(["SOS.NETCore"]);
        list.add_directory(dir.path());
        assert_eq!(names(&list), vec!["Helper.dll"]);
    }

    #[test]
    fn test_join_with_separator()
    {
        let dir = directory_with(&["A.dll", "B.dll"]);
        let mut list = TrustedAssemblies::default();
        list.add_directory(dir.path());
        let joined = list.join(':');
        assert_eq!(joined.matches(':').count(), 1);
        assert!(joined.ends_with("B.dll"));
        assert_eq!(TrustedAssemblies::default().join(';'), "");
    }

    #[test]
    fn test_missing_directory_adds_nothing()
    {
        let dir = tempfile::tempdir().unwrap();
        let mut list = TrustedAssemblies::default();
        list.add_directory(&dir.path().join("missing"));
        assert!(list.is_empty());
    }
}
