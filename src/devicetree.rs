//! Block device view consumed by media discovery.
//!
//! The storage subsystem owns devices; discovery only reads their attributes
//! and asks the tree to activate, mount and unmount formats. [`DeviceTree`] is
//! that contract. [`LsblkDeviceTree`] implements it on top of `lsblk` for hosts
//! without a richer storage layer.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{InstallError, InstallResult, MountError};
use crate::media::mount::{MountOptions, Mounter};
use crate::process::Cmd;

/// What kind of block device this is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Optical drive (CD/DVD/BD).
    Cdrom,
    Disk,
    Partition,
    Loop,
    Other(String),
}

impl DeviceKind {
    fn from_lsblk(kind: &str) -> Self {
        match kind {
            "rom" => DeviceKind::Cdrom,
            "disk" => DeviceKind::Disk,
            "part" => DeviceKind::Partition,
            "loop" => DeviceKind::Loop,
            other => DeviceKind::Other(other.to_string()),
        }
    }
}

/// Filesystem (or other on-disk format) found on a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// No recognizable format.
    None,
    Iso9660,
    Udf,
    Other(String),
}

impl FormatKind {
    pub fn from_fstype(fstype: Option<&str>) -> Self {
        match fstype.map(str::trim) {
            None | Some("") => FormatKind::None,
            Some("iso9660") => FormatKind::Iso9660,
            Some("udf") => FormatKind::Udf,
            Some(other) => FormatKind::Other(other.to_string()),
        }
    }

    /// Filesystem type string for `mount -t`.
    pub fn fstype(&self) -> Option<&str> {
        match self {
            FormatKind::None => None,
            FormatKind::Iso9660 => Some("iso9660"),
            FormatKind::Udf => Some("udf"),
            FormatKind::Other(s) => Some(s.as_str()),
        }
    }
}

/// Filesystems the installer knows how to mount for inspection.
const MOUNTABLE_FSTYPES: &[&str] = &[
    "iso9660", "udf", "vfat", "exfat", "ext2", "ext3", "ext4", "xfs", "btrfs", "ntfs", "ntfs3",
];

/// Format attributes of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFormat {
    pub kind: FormatKind,
    /// The format is present on disk (not merely planned).
    pub exists: bool,
    /// The format supports mount/unmount.
    pub mountable: bool,
}

impl DeviceFormat {
    pub fn new(kind: FormatKind) -> Self {
        let mountable = kind
            .fstype()
            .is_some_and(|fs| MOUNTABLE_FSTYPES.contains(&fs));
        let exists = kind != FormatKind::None;
        Self {
            kind,
            exists,
            mountable,
        }
    }
}

/// A block device as reported by the device tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub path: PathBuf,
    pub kind: DeviceKind,
    pub format: DeviceFormat,
    /// The installer may act on this device (media present, not hidden).
    pub controllable: bool,
}

/// Device-tree contract consumed by media discovery.
pub trait DeviceTree {
    /// Snapshot of all known devices.
    fn devices(&self) -> Vec<Device>;

    /// Activate format handling for `device`, refreshing its format in
    /// place. A no-op when the format is already active.
    fn handle_format(&mut self, device: &mut Device);

    fn mount_format(&self, device: &Device, mountpoint: &Path) -> Result<(), MountError>;

    fn unmount_format(&self, device: &Device, mountpoint: &Path) -> Result<(), MountError>;
}

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    fstype: Option<String>,
    #[serde(default)]
    size: Option<LsblkSize>,
}

/// Older util-linux prints sizes as strings even with `--bytes`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LsblkSize {
    Number(u64),
    Text(String),
}

impl LsblkSize {
    fn bytes(&self) -> u64 {
        match self {
            LsblkSize::Number(n) => *n,
            LsblkSize::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

const LSBLK_COLUMNS: &str = "NAME,TYPE,FSTYPE,SIZE";

fn lsblk(device: Option<&Path>) -> InstallResult<Vec<Device>> {
    let mut cmd = Cmd::new("lsblk").args([
        "--json",
        "--list",
        "--paths",
        "--bytes",
        "--output",
        LSBLK_COLUMNS,
    ]);
    if let Some(device) = device {
        cmd = cmd.arg_path(device);
    }
    let rendered = cmd.display();
    let out = cmd.run().map_err(|e| InstallError::Command {
        command: rendered.clone(),
        reason: format!("{e:#}"),
    })?;
    parse_lsblk(&out.stdout).map_err(|e| InstallError::Command {
        command: rendered,
        reason: format!("unparseable output: {e}"),
    })
}

fn parse_lsblk(json: &str) -> Result<Vec<Device>, serde_json::Error> {
    let parsed: LsblkOutput = serde_json::from_str(json)?;
    Ok(parsed
        .blockdevices
        .into_iter()
        .map(|dev| {
            let size = dev.size.as_ref().map(LsblkSize::bytes).unwrap_or(0);
            let format = DeviceFormat::new(FormatKind::from_fstype(dev.fstype.as_deref()));
            Device {
                path: PathBuf::from(&dev.name),
                name: dev.name,
                kind: DeviceKind::from_lsblk(&dev.kind),
                format,
                // An empty tray reports size 0.
                controllable: size > 0,
            }
        })
        .collect())
}

/// [`DeviceTree`] built from `lsblk` output, mounting through a [`Mounter`].
pub struct LsblkDeviceTree<M: Mounter> {
    devices: Vec<Device>,
    mounter: M,
}

impl<M: Mounter> LsblkDeviceTree<M> {
    /// Probe the host's block devices.
    pub fn probe(mounter: M) -> InstallResult<Self> {
        let devices = lsblk(None)?;
        debug!(count = devices.len(), "probed block devices");
        Ok(Self { devices, mounter })
    }

    /// Build from captured `lsblk --json` output.
    pub fn from_json(json: &str, mounter: M) -> InstallResult<Self> {
        let devices = parse_lsblk(json).map_err(|e| InstallError::Command {
            command: "lsblk".to_string(),
            reason: format!("unparseable output: {e}"),
        })?;
        Ok(Self { devices, mounter })
    }
}

impl<M: Mounter> DeviceTree for LsblkDeviceTree<M> {
    fn devices(&self) -> Vec<Device> {
        self.devices.clone()
    }

    fn handle_format(&mut self, device: &mut Device) {
        if device.format.exists {
            return;
        }
        // Media may have been inserted since the probe; look again.
        match lsblk(Some(&device.path)) {
            Ok(found) => {
                if let Some(fresh) = found.into_iter().find(|d| d.name == device.name) {
                    device.format = fresh.format.clone();
                    device.controllable = fresh.controllable;
                    if let Some(known) = self.devices.iter_mut().find(|d| d.name == device.name) {
                        *known = fresh;
                    }
                }
            }
            Err(e) => warn!(device = %device.name, error = %e, "can't refresh device format"),
        }
    }

    fn mount_format(&self, device: &Device, mountpoint: &Path) -> Result<(), MountError> {
        self.mounter.mount(
            &device.path,
            mountpoint,
            device.format.kind.fstype(),
            &MountOptions::read_only(),
        )
    }

    fn unmount_format(&self, _device: &Device, mountpoint: &Path) -> Result<(), MountError> {
        self.mounter.unmount(mountpoint)
    }
}
