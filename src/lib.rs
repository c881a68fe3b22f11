//! Installation media discovery and sysroot configuration for Linux installs.
//!
//! This crate provides the installer-side pieces shared by LevitateOS front
//! ends:
//!
//! - **Media discovery** - scan directories for ISO images, find media on
//!   optical drives, verify `.discinfo` and `.treeinfo` markers
//! - **Error policy** - caller-injected strategy deciding abort vs continue
//! - **Configuration tasks** - declarative timezone and NTP setup applied to a
//!   target sysroot
//! - **Preflight checks** - host tool validation before touching devices
//!
//! # Architecture
//!
//! ```text
//! distro-install (this crate)
//!     │
//!     ├── media       IsoScanner, mount_image, find_optical_media
//!     │     └── uses: Mounter, DeviceTree, ErrorPolicy
//!     ├── task        ConfigureTimezoneTask, ConfigureNtpTask, Op executor
//!     │     └── uses: ServiceManager (Systemd | OpenRc)
//!     └── config      TOML settings for the distro-install binary
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use distro_install::{Arch, AbortOnError, IsoScanner, SystemMounter};
//!
//! let mounter = SystemMounter;
//! let scanner = IsoScanner::new(&mounter, Arch::current());
//! if let Some(name) = scanner.find_first_image(path, &mut AbortOnError)? {
//!     println!("{name}");
//! }
//! ```

pub mod arch;
pub mod config;
pub mod devicetree;
pub mod error;
pub mod logging;
pub mod media;
pub mod preflight;
pub mod process;
pub mod service;
pub mod task;

#[cfg(test)]
mod testing;

pub use arch::Arch;
pub use devicetree::{Device, DeviceTree, LsblkDeviceTree};
pub use error::{
    AbortOnError, ErrorDecision, ErrorPolicy, InstallError, InstallResult, MountError, RetryPolicy,
};
pub use media::{IsoScanner, Mounter, SystemMounter};
pub use service::{InitSystem, ServiceManager};
pub use task::{ConfigurationTask, ConfigureNtpTask, ConfigureTimezoneTask, Op};
