//! Preflight checks for host tools.
//!
//! Validates that the host has the external commands the installer shells out
//! to, so a missing `lsblk` is reported up front instead of as a cryptic spawn
//! failure halfway through a media scan.
//!
//! # Example
//!
//! ```rust
//! use distro_install::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("lsblk") {
//!     println!("util-linux not installed");
//! }
//!
//! let tools = &[("mount", "util-linux"), ("systemctl", "systemd")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Result};

/// Check if a command exists in PATH.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Tools needed for media discovery. Each tuple is (command_name, package_name).
pub const MEDIA_TOOLS: &[(&str, &str)] = &[
    ("mount", "util-linux"),
    ("umount", "util-linux"),
    ("lsblk", "util-linux"),
];

/// Tools needed to configure a systemd sysroot.
pub const SYSTEMD_TOOLS: &[(&str, &str)] = &[("systemctl", "systemd")];

/// Check that specific tools are available.
///
/// Returns an error listing every missing tool with the package providing it.
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let missing = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .collect::<Vec<_>>();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

pub fn check_media_tools() -> Result<()> {
    check_required_tools(MEDIA_TOOLS)
}
