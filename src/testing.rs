//! Test doubles shared by the media, device and task tests.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::devicetree::{Device, DeviceTree};
use crate::error::{InstallError, InstallResult, ISO_SECTOR_SIZE, MountError};
use crate::media::discinfo::DISCINFO;
use crate::media::mount::{MountOptions, Mounter};
use crate::service::ServiceManager;

/// Write a file of `size` bytes carrying the ISO9660 signature.
pub(crate) fn write_iso(path: &Path, size: u64) {
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .unwrap();
    file.seek(SeekFrom::Start(16 * ISO_SECTOR_SIZE)).unwrap();
    file.write_all(b"\x01CD001\x01").unwrap();
    file.set_len(size).unwrap();
}

/// Lay out the contents of install media for `arch` under `dir`.
pub(crate) fn media_tree(dir: &Path, arch: &str, with_repo: bool) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join(DISCINFO),
        format!("1700000000.123456\nLevitateOS 1.0\n{arch}\n"),
    )
    .unwrap();
    fs::write(
        dir.join(".treeinfo"),
        format!("[release]\nversion = 1.0\n[tree]\narch = {arch}\nvariants = BaseOS\n[variant-BaseOS]\nrepository = BaseOS\n"),
    )
    .unwrap();
    if with_repo {
        let repodata = dir.join("BaseOS/repodata");
        fs::create_dir_all(&repodata).unwrap();
        fs::write(repodata.join("repomd.xml"), "<repomd/>").unwrap();
    }
    dir.to_path_buf()
}

fn copy_tree(src: &Path, dst: &Path) {
    fs::create_dir_all(dst).unwrap();
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if from.is_dir() {
            copy_tree(&from, &to);
        } else {
            fs::copy(&from, &to).unwrap();
        }
    }
}

fn clear_dir(dir: &Path) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            fs::remove_dir_all(&path).unwrap();
        } else {
            fs::remove_file(&path).unwrap();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MountEvent {
    Mount { source: PathBuf, target: PathBuf },
    Unmount { target: PathBuf },
}

#[derive(Default)]
struct FakeState {
    trees: HashMap<PathBuf, PathBuf>,
    failing: HashSet<PathBuf>,
    active: HashMap<PathBuf, PathBuf>,
    events: Vec<MountEvent>,
}

/// Mounter that "mounts" by copying a prepared tree onto the target and
/// "unmounts" by emptying it again. Records every call.
#[derive(Default)]
pub(crate) struct FakeMounter {
    state: Mutex<FakeState>,
}

impl FakeMounter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Contents presented when `source` is mounted.
    pub(crate) fn add_tree(&self, source: &Path, tree: PathBuf) {
        self.state
            .lock()
            .unwrap()
            .trees
            .insert(source.to_path_buf(), tree);
    }

    pub(crate) fn fail_mount(&self, source: &Path) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(source.to_path_buf());
    }

    pub(crate) fn clear_failure(&self, source: &Path) {
        self.state.lock().unwrap().failing.remove(source);
    }

    /// Mount points that are currently mounted.
    pub(crate) fn active(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().active.keys().cloned().collect()
    }

    pub(crate) fn events(&self) -> Vec<MountEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub(crate) fn mount_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, MountEvent::Mount { .. }))
            .count()
    }

    pub(crate) fn unmount_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, MountEvent::Unmount { .. }))
            .count()
    }
}

impl Mounter for FakeMounter {
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        _fstype: Option<&str>,
        _options: &MountOptions,
    ) -> Result<(), MountError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(MountEvent::Mount {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
        });

        let busy = state.active.contains_key(target);
        if busy || state.failing.contains(source) || !target.is_dir() {
            return Err(MountError::Mount {
                device: source.to_path_buf(),
                target: target.to_path_buf(),
                stderr: if busy { "target busy" } else { "wrong fs type" }.to_string(),
            });
        }

        if let Some(tree) = state.trees.get(source) {
            copy_tree(tree, target);
        }
        state
            .active
            .insert(target.to_path_buf(), source.to_path_buf());
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<(), MountError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(MountEvent::Unmount {
            target: target.to_path_buf(),
        });
        if state.active.remove(target).is_none() {
            return Err(MountError::Unmount {
                target: target.to_path_buf(),
                stderr: "not mounted".to_string(),
            });
        }
        clear_dir(target);
        Ok(())
    }
}

/// Device tree backed by a fixed device list and a [`FakeMounter`] keyed by
/// device path.
pub(crate) struct FakeDeviceTree {
    pub(crate) devices: Vec<Device>,
    pub(crate) mounter: FakeMounter,
    pub(crate) handled: Vec<String>,
    /// Devices whose format becomes mountable only after activation.
    pub(crate) activate: HashSet<String>,
}

impl FakeDeviceTree {
    pub(crate) fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            mounter: FakeMounter::new(),
            handled: Vec::new(),
            activate: HashSet::new(),
        }
    }
}

impl DeviceTree for FakeDeviceTree {
    fn devices(&self) -> Vec<Device> {
        self.devices.clone()
    }

    fn handle_format(&mut self, device: &mut Device) {
        self.handled.push(device.name.clone());
        if self.activate.contains(&device.name) {
            device.format.mountable = true;
            device.format.exists = true;
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

/// Service manager that records enable/disable calls as `"<verb> <service>"`.
pub(crate) struct RecordingServices {
    installed: bool,
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl RecordingServices {
    pub(crate) fn new(installed: bool) -> Self {
        Self {
            installed,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every enable/disable call fails after being recorded.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(true)
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, verb: &str, service: &str) -> InstallResult<()> {
        self.calls.lock().unwrap().push(format!("{verb} {service}"));
        if self.fail {
            return Err(InstallError::Command {
                command: format!("{verb} {service}"),
                reason: "unit not found".to_string(),
            });
        }
        Ok(())
    }
}

impl ServiceManager for RecordingServices {
    fn is_installed(&self, _service: &str, _root: &Path) -> bool {
        self.installed
    }

    fn enable(&self, service: &str, _root: &Path) -> InstallResult<()> {
        self.record("enable", service)
    }

    fn disable(&self, service: &str, _root: &Path) -> InstallResult<()> {
        self.record("disable", service)
    }
}
