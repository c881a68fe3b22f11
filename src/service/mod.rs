//! Service management inside a target sysroot.
//!
//! The installer never talks to the running host's init system. Each backend
//! answers "is this service shipped in the sysroot" and flips its enablement
//! state for the next boot.

mod openrc;
mod systemd;

use std::path::Path;

use serde::Deserialize;

use crate::error::InstallResult;

pub use openrc::OpenRc;
pub use systemd::Systemd;

/// Init-system backend used by configuration tasks.
pub trait ServiceManager {
    /// Whether `service` is installed in the sysroot at `root`.
    fn is_installed(&self, service: &str, root: &Path) -> bool;

    fn enable(&self, service: &str, root: &Path) -> InstallResult<()>;

    fn disable(&self, service: &str, root: &Path) -> InstallResult<()>;
}

/// Init system of the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitSystem {
    #[default]
    Systemd,
    OpenRc,
}

impl InitSystem {
    /// The backend for this init system.
    pub fn manager(self) -> Box<dyn ServiceManager> {
        match self {
            Self::Systemd => Box::new(Systemd),
            Self::OpenRc => Box::new(OpenRc::default()),
        }
    }
}
