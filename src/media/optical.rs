//! Find installation media on optical drives and ISO9660-formatted devices.
//!
//! USB sticks written from an ISO image carry an `iso9660` filesystem without
//! being optical drives, so both kinds are candidates.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::discinfo::verify_media;
use crate::arch::Arch;
use crate::devicetree::{Device, DeviceKind, DeviceTree, FormatKind};
use crate::error::{InstallError, InstallResult, MountError};

const SCRATCH_PREFIX: &str = "install-media.";

/// A device format mounted on a private scratch directory.
///
/// Dropping the guard unmounts (if mounted) and removes the directory, on
/// every exit path.
pub struct ScratchMount<'a, T: DeviceTree + ?Sized> {
    tree: &'a T,
    device: &'a Device,
    dir: PathBuf,
    mounted: bool,
}

impl<'a, T: DeviceTree + ?Sized> ScratchMount<'a, T> {
    /// Create a unique scratch directory under `base` for `device`.
    pub fn create(tree: &'a T, device: &'a Device, base: &Path) -> InstallResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(base)
            .map_err(|e| InstallError::io("creating scratch directory", base, e))?
            .keep();
        Ok(Self {
            tree,
            device,
            dir,
            mounted: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn mount(&mut self) -> Result<(), MountError> {
        self.tree.mount_format(self.device, &self.dir)?;
        self.mounted = true;
        Ok(())
    }
}

impl<T: DeviceTree + ?Sized> Drop for ScratchMount<'_, T> {
    fn drop(&mut self) {
        if self.mounted {
            if let Err(e) = self.tree.unmount_format(self.device, &self.dir) {
                // Leave the directory alone; removing a live mount point fails anyway.
                warn!(device = %self.device.name, error = %e, "unmount failed");
                return;
            }
        }
        if let Err(e) = fs::remove_dir(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "can't remove scratch directory");
        }
    }
}

/// Optical drives first, then other ISO9660-formatted devices, each once.
fn optical_candidates(devices: Vec<Device>) -> Vec<Device> {
    let (optical, rest): (Vec<_>, Vec<_>) = devices
        .into_iter()
        .partition(|d| d.kind == DeviceKind::Cdrom);
    let iso = rest
        .into_iter()
        .filter(|d| d.format.kind == FormatKind::Iso9660);

    let mut seen = HashSet::new();
    optical
        .into_iter()
        .chain(iso)
        .filter(|d| seen.insert(d.name.clone()))
        .collect()
}

/// Return the first device carrying valid install media for `arch`.
///
/// Uncontrollable devices and devices whose format cannot be mounted are
/// never mounted. Scratch directories are created under `scratch_base`
/// (the system temp dir when `None`).
pub fn find_optical_media<T: DeviceTree + ?Sized>(
    tree: &mut T,
    arch: &Arch,
    scratch_base: Option<&Path>,
) -> Option<Device> {
    let base = scratch_base
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);

    for mut device in optical_candidates(tree.devices()) {
        if !device.controllable {
            debug!(device = %device.name, "not controllable, skipping");
            continue;
        }

        tree.handle_format(&mut device);
        if !device.format.mountable {
            debug!(device = %device.name, "no mountable media");
            continue;
        }

        if check_device(&*tree, &device, arch, &base) {
            info!(device = %device.name, "found installation media");
            return Some(device);
        }
    }

    None
}

fn check_device<T: DeviceTree + ?Sized>(tree: &T, device: &Device, arch: &Arch, base: &Path) -> bool {
    let mut scratch = match ScratchMount::create(tree, device, base) {
        Ok(s) => s,
        Err(e) => {
            warn!(device = %device.name, error = %e, "no scratch directory");
            return false;
        }
    };
    if let Err(e) = scratch.mount() {
        debug!(device = %device.name, error = %e, "mount failed");
        return false;
    }
    verify_media(scratch.path(), arch, None)
}

/// Devices that might hold an ISO image on a filesystem (hard-drive installs):
/// partitions with an existing, mountable format.
pub fn potential_hdiso_sources<T: DeviceTree + ?Sized>(tree: &T) -> Vec<Device> {
    tree.devices()
        .into_iter()
        .filter(|d| d.kind == DeviceKind::Partition && d.format.exists && d.format.mountable)
        .collect()
}
