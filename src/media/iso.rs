//! Locate a usable installation ISO in a directory.
//!
//! Each candidate is probed for the ISO9660 signature, mounted read-only on
//! the scan mount point and inspected (`.discinfo`, `.treeinfo`, image size).
//! The scan mount point is a single fixed path, so only one scan may run on a
//! host at a time; callers serialize scans (see [`super::lock::ScanLock`]).

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::discinfo::{read_discinfo, DISCINFO};
use super::mount::{MountOptions, Mounter, ISO9660};
use super::treeinfo::has_valid_repo_metadata;
use crate::arch::Arch;
use crate::error::{consult, ErrorPolicy, InstallError, InstallResult, ISO_SECTOR_SIZE};

/// Where candidate images are mounted while being inspected.
pub const DEFAULT_SCAN_MOUNT_POINT: &str = "/mnt/install/cdimage";

/// Extension that marks a path as a specific image rather than a directory.
pub const ISO_EXTENSION: &str = "iso";

/// Byte offset of the standard identifier in the primary volume descriptor
/// (sector 16, after the one-byte descriptor type).
const ISO9660_MAGIC_OFFSET: u64 = 16 * ISO_SECTOR_SIZE + 1;
const ISO9660_MAGIC: &[u8; 5] = b"CD001";

/// Check the content signature of `path`. The file name is not consulted.
pub fn is_iso_image(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    if !file.metadata().map(|m| m.is_file()).unwrap_or(false) {
        return false;
    }
    let mut magic = [0u8; 5];
    file.seek(SeekFrom::Start(ISO9660_MAGIC_OFFSET))
        .and_then(|_| file.read_exact(&mut magic))
        .map(|_| &magic == ISO9660_MAGIC)
        .unwrap_or(false)
}

/// Scans directories for the first acceptable installation image.
pub struct IsoScanner<'a> {
    mounter: &'a dyn Mounter,
    arch: Arch,
    mount_point: PathBuf,
    base_repos: Vec<String>,
    probe: fn(&Path) -> bool,
}

impl<'a> IsoScanner<'a> {
    pub fn new(mounter: &'a dyn Mounter, arch: Arch) -> Self {
        Self {
            mounter,
            arch,
            mount_point: PathBuf::from(DEFAULT_SCAN_MOUNT_POINT),
            base_repos: Vec::new(),
            probe: is_iso_image,
        }
    }

    pub fn with_mount_point(mut self, mount_point: impl Into<PathBuf>) -> Self {
        self.mount_point = mount_point.into();
        self
    }

    /// Extra variant names accepted as the base repository.
    pub fn with_base_repos(mut self, names: Vec<String>) -> Self {
        self.base_repos = names;
        self
    }

    /// Replace the content signature probe.
    pub fn with_probe(mut self, probe: fn(&Path) -> bool) -> Self {
        self.probe = probe;
        self
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    pub fn arch(&self) -> &Arch {
        &self.arch
    }

    /// Return the file name of the first acceptable image under `path`.
    ///
    /// `path` may be a directory (its entries are candidates, non-recursively)
    /// or a specific `.iso` file. A missing path yields `None`. The only error
    /// is an [`InstallError::InvalidImageSize`] the policy chose to abort on.
    /// No mount is left active on return.
    pub fn find_first_image(
        &self,
        path: &Path,
        policy: &mut dyn ErrorPolicy,
    ) -> InstallResult<Option<String>> {
        if !path.exists() {
            debug!(path = %path.display(), "image source does not exist");
            return Ok(None);
        }

        let (dir, candidates) = if path.is_file() && has_iso_extension(path) {
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (dir, vec![name])
        } else {
            match list_candidates(path) {
                Ok(names) => (path.to_path_buf(), names),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "can't list image directory");
                    return Ok(None);
                }
            }
        };

        for name in candidates {
            let image = dir.join(&name);
            if self.check_candidate(&image, policy)? {
                info!(image = %name, "found disc");
                return Ok(Some(name));
            }
        }

        Ok(None)
    }

    fn check_candidate(&self, image: &Path, policy: &mut dyn ErrorPolicy) -> InstallResult<bool> {
        debug!(image = %image.display(), "checking");
        if !(self.probe)(image) {
            return Ok(false);
        }

        debug!(image = %image.display(), mount_point = %self.mount_point.display(), "mounting");
        if let Err(e) = self.mounter.mount(
            image,
            &self.mount_point,
            Some(ISO9660),
            &MountOptions::read_only(),
        ) {
            debug!(image = %image.display(), error = %e, "mount failed, skipping");
            return Ok(false);
        }

        let verdict = self.inspect_mounted(image, policy);
        self.release();
        verdict
    }

    /// Decide on the image currently mounted on the scan mount point.
    fn inspect_mounted(&self, image: &Path, policy: &mut dyn ErrorPolicy) -> InstallResult<bool> {
        let marker = self.mount_point.join(DISCINFO);
        if File::open(&marker).is_err() {
            debug!(image = %image.display(), "no readable .discinfo");
            return Ok(false);
        }

        let descriptor = match read_discinfo(&self.mount_point) {
            Ok(d) => d,
            Err(e) => {
                warn!(image = %image.display(), error = %e, ".discinfo file can't be loaded");
                return Ok(false);
            }
        };

        debug!(disc_arch = %descriptor.arch, "read .discinfo");
        if !descriptor.matches_arch(&self.arch) {
            warn!(
                image = %image.display(),
                expected = %self.arch,
                actual = %descriptor.arch,
                "architectures mismatch"
            );
            return Ok(false);
        }

        if !has_valid_repo_metadata(&self.mount_point, &self.base_repos) {
            warn!(image = %image.display(), "no repository metadata, skipping");
            return Ok(false);
        }

        let size = match fs::metadata(image) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(image = %image.display(), error = %e, "can't read image size, skipping");
                return Ok(false);
            }
        };
        if size % ISO_SECTOR_SIZE != 0 {
            warn!(image = %image.display(), size, "image appears to be corrupted");
            consult(
                policy,
                InstallError::InvalidImageSize {
                    path: image.to_path_buf(),
                    size,
                },
            )?;
        }

        Ok(true)
    }

    fn release(&self) {
        if let Err(e) = self.mounter.unmount(&self.mount_point) {
            warn!(mount_point = %self.mount_point.display(), error = %e, "unmount failed");
        }
    }
}

fn has_iso_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ISO_EXTENSION)
}

fn list_candidates(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => debug!(name = ?raw, "skipping non UTF-8 entry"),
        }
    }
    names.sort();
    Ok(names)
}
