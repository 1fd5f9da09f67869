//! Build script for dacbridge-core
//!
//! This script checks build requirements before compilation:
//! - Minimum Rust version (1.70.0, for `once_cell`-style APIs and let-else)
//! - Target platform (Windows, Linux or macOS)
//!
//! ## Requirements
//!
//! - **Rust**: 1.70.0 or newer
//! - **Windows**: any host debugger engine with the data access contract
//! - **Linux / macOS**: a host debugger plugin offering per-thread contexts

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    // Check minimum Rust version
    match (rustc_version::version(), rustc_version::Version::parse("1.70.0")) {
        (Ok(rustc_version), Ok(min_rust_version)) => {
            if rustc_version < min_rust_version {
                panic!("dacbridge-core requires Rust {min_rust_version} or newer, found {rustc_version}");
            }
        }
        _ => {
            // If we can't get version (e.g., in some build environments), just warn
            println!("cargo:warning=could not verify Rust version");
        }
    }

    // Judge the target OS, not the build host
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    match target_os.as_str() {
        "windows" | "linux" | "macos" => {}
        "freebsd" | "netbsd" => {
            println!("cargo:warning=dacbridge-core: {target_os} has no known shared runtime location; hosting will fail");
        }
        other => {
            println!("cargo:warning=dacbridge-core: untested target OS '{other}'");
        }
    }
}
