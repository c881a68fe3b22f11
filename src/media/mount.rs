//! Mount and unmount seam.
//!
//! Everything in [`crate::media`] mounts through a [`Mounter`] so the scan and
//! retry logic can be exercised without root privileges.

use std::path::Path;

use crate::error::MountError;
use crate::process::Cmd;

/// Filesystem type of installation images.
pub const ISO9660: &str = "iso9660";

/// Mount options and flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
    /// Comma separated option string passed to `mount -o`.
    pub options: Option<String>,
}

impl MountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: impl Into<String>) -> Self {
        Self {
            options: Some(options.into()),
        }
    }

    /// Read-only, the only way install media are ever mounted.
    pub fn read_only() -> Self {
        Self::with_options("ro")
    }
}

/// Trait for mounting and unmounting filesystems.
pub trait Mounter {
    /// Mount `source` on `target`. `fstype` of `None` lets the kernel probe.
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fstype: Option<&str>,
        options: &MountOptions,
    ) -> Result<(), MountError>;

    /// Unmount whatever is mounted on `target`.
    fn unmount(&self, target: &Path) -> Result<(), MountError>;
}

/// Mount through the host `mount`/`umount` binaries.
///
/// Regular files are attached via a loop device, which `mount` sets up on its
/// own when handed an image path.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMounter;

impl Mounter for SystemMounter {
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fstype: Option<&str>,
        options: &MountOptions,
    ) -> Result<(), MountError> {
        if !target.is_dir() {
            std::fs::create_dir_all(target).map_err(|e| MountError::MountPoint {
                path: target.to_path_buf(),
                source: e,
            })?;
        }

        let mut cmd = Cmd::new("mount");
        if let Some(fstype) = fstype {
            cmd = cmd.args(["-t", fstype]);
        }
        if let Some(opts) = &options.options {
            cmd = cmd.args(["-o", opts.as_str()]);
        }
        let cmd = cmd.arg_path(source).arg_path(target);

        tracing::debug!(source = %source.display(), target = %target.display(), "mounting");
        cmd.run().map_err(|e| MountError::Mount {
            device: source.to_path_buf(),
            target: target.to_path_buf(),
            stderr: format!("{e:#}"),
        })?;
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<(), MountError> {
        tracing::debug!(target = %target.display(), "unmounting");
        Cmd::new("umount")
            .arg_path(target)
            .run()
            .map_err(|e| MountError::Unmount {
                target: target.to_path_buf(),
                stderr: format!("{e:#}"),
            })?;
        Ok(())
    }
}
