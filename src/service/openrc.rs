//! OpenRC backend: enablement is a runlevel symlink to the init script.

use std::fs;
use std::io;
use std::path::Path;

use super::ServiceManager;
use crate::error::{InstallError, InstallResult};

/// OpenRC backend enabling services in a single runlevel.
#[derive(Debug, Clone)]
pub struct OpenRc {
    runlevel: String,
}

impl Default for OpenRc {
    fn default() -> Self {
        Self::new("default")
    }
}

impl OpenRc {
    pub fn new(runlevel: impl Into<String>) -> Self {
        Self {
            runlevel: runlevel.into(),
        }
    }
}

impl ServiceManager for OpenRc {
    fn is_installed(&self, service: &str, root: &Path) -> bool {
        root.join("etc/init.d").join(service).exists()
    }

    /// Creates `/etc/runlevels/<runlevel>/<service> -> /etc/init.d/<service>`.
    fn enable(&self, service: &str, root: &Path) -> InstallResult<()> {
        let runlevel_dir = root.join("etc/runlevels").join(&self.runlevel);
        fs::create_dir_all(&runlevel_dir)
            .map_err(|e| InstallError::io("creating runlevel", &runlevel_dir, e))?;

        let link = runlevel_dir.join(service);
        if !link.exists() && !link.is_symlink() {
            std::os::unix::fs::symlink(format!("/etc/init.d/{service}"), &link)
                .map_err(|e| InstallError::io("enabling service", &link, e))?;
        }
        tracing::info!(service, runlevel = %self.runlevel, "openrc service enabled");
        Ok(())
    }

    /// Removes the service from every runlevel.
    fn disable(&self, service: &str, root: &Path) -> InstallResult<()> {
        let runlevels = root.join("etc/runlevels");
        let entries = match fs::read_dir(&runlevels) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(InstallError::io("reading runlevels", &runlevels, e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| InstallError::io("reading runlevels", &runlevels, e))?;
            let link = entry.path().join(service);
            if link.is_symlink() {
                fs::remove_file(&link)
                    .map_err(|e| InstallError::io("disabling service", &link, e))?;
            }
        }
        tracing::info!(service, "openrc service disabled");
        Ok(())
    }
}
