//! Operating-system family and CPU architecture of the bridge.
//!
//! Both are plain values rather than `cfg` switches so that the platform
//! rules (library naming, which symbol format is tried first, how thread
//! contexts are captured) can be selected at run time and exercised in tests
//! on any build host.

use std::fmt;

/// Operating system the host debugger runs on
///
/// Windows is the *desktop* family: it has the legacy PDB binder, host module
/// names without extensions, and no per-thread-id context API. Linux and macOS
/// form the non-desktop family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform
{
    /// Windows debugger engine
    Windows,
    /// Linux, any distribution layout
    Linux,
    /// macOS
    MacOs,
}

impl Platform
{
    /// Platform of the running build.
    pub const fn current() -> Self
    {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// `true` for the desktop family (Windows).
    pub const fn is_desktop(self) -> bool
    {
        matches!(self, Platform::Windows)
    }

    /// Platform file name of a shared library.
    ///
    /// ```rust
    /// use dacbridge_core::types::Platform;
    ///
    /// assert_eq!(Platform::Windows.library_name("mscordbi"), "mscordbi.dll");
    /// assert_eq!(Platform::Linux.library_name("mscordbi"), "libmscordbi.so");
    /// assert_eq!(Platform::MacOs.library_name("mscordbi"), "libmscordbi.dylib");
    /// ```
    pub fn library_name(self, stem: &str) -> String
    {
        match self {
            Platform::Windows => format!("{stem}.dll"),
            Platform::Linux => format!("lib{stem}.so"),
            Platform::MacOs => format!("lib{stem}.dylib"),
        }
    }

    /// Name under which the host's module table lists the runtime.
    ///
    /// The Windows engine strips extensions from module names; the other
    /// hosts use the file name.
    pub fn runtime_module_name(self) -> String
    {
        if self.is_desktop() {
            RUNTIME_LIBRARY_STEM.to_string()
        } else {
            self.library_name(RUNTIME_LIBRARY_STEM)
        }
    }

    /// File name of the runtime library (`coreclr.dll`, `libcoreclr.so`, ...).
    pub fn runtime_library_name(self) -> String
    {
        self.library_name(RUNTIME_LIBRARY_STEM)
    }

    /// Separator used in the runtime's path-list start properties.
    pub const fn path_list_separator(self) -> char
    {
        match self {
            Platform::Windows => ';',
            Platform::Linux | Platform::MacOs => ':',
        }
    }
}

impl fmt::Display for Platform
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Platform::Windows => write!(f, "windows"),
            Platform::Linux => write!(f, "linux"),
            Platform::MacOs => write!(f, "macos"),
        }
    }
}

/// Stem of the runtime library's file name.
pub const RUNTIME_LIBRARY_STEM: &str = "coreclr";

/// CPU architecture of the inspected target
///
/// The bridge is built per target architecture, so this mostly decides the
/// pointer size reported to the data access component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture
{
    /// 64-bit x86 (AMD64)
    X86_64,
    /// 64-bit ARM
    Arm64,
    /// 32-bit x86
    X86,
    /// 32-bit ARM
    Arm,
}

impl Architecture
{
    /// Get the architecture of the running bridge binary
    ///
    /// Unknown architectures fall back to `X86_64`, the only layout every
    /// supported host can read.
    pub const fn current() -> Self
    {
        if cfg!(target_arch = "aarch64") {
            Architecture::Arm64
        } else if cfg!(target_arch = "x86") {
            Architecture::X86
        } else if cfg!(target_arch = "arm") {
            Architecture::Arm
        } else {
            Architecture::X86_64
        }
    }

    /// Size of a pointer in bytes for this architecture.
    #[must_use]
    pub const fn pointer_size_bytes(self) -> u32
    {
        match self {
            Architecture::X86_64 | Architecture::Arm64 => 8,
            Architecture::X86 | Architecture::Arm => 4,
        }
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::Arm64 => write!(f, "arm64"),
            Architecture::X86 => write!(f, "x86"),
            Architecture::Arm => write!(f, "arm"),
        }
    }
}
