//! Op executor - interprets [`Op`] variants against a sysroot.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::Op;
use crate::error::{InstallError, InstallResult};
use crate::service::ServiceManager;

/// Resolve a sysroot-relative path. A leading `/` is stripped so absolute
/// target paths can never escape to the host root.
pub fn sysroot_path(sysroot: &Path, path: &str) -> PathBuf {
    sysroot.join(path.trim_start_matches('/'))
}

/// Execute a single operation.
pub fn execute_op(sysroot: &Path, op: &Op, services: &dyn ServiceManager) -> InstallResult<()> {
    tracing::debug!(?op, sysroot = %sysroot.display(), "executing");
    match op {
        Op::WriteFile(path, content) => {
            let full = sysroot_path(sysroot, path);
            handle_writefile(&full, content).map_err(|e| InstallError::io("writing", &full, e))
        }
        Op::Symlink(link, target) => {
            let full = sysroot_path(sysroot, link);
            handle_symlink(&full, target).map_err(|e| InstallError::io("symlinking", &full, e))
        }
        Op::RemoveFile(path) => {
            let full = sysroot_path(sysroot, path);
            handle_remove(&full).map_err(|e| InstallError::io("removing", &full, e))
        }
        Op::EnableService(name) => services.enable(name, sysroot),
        Op::DisableService(name) => services.disable(name, sysroot),
    }
}

fn handle_writefile(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

/// Existing entries at `link` are replaced.
fn handle_symlink(link: &Path, target: &str) -> io::Result<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)?;
    }
    handle_remove(link)?;
    std::os::unix::fs::symlink(target, link)
}

fn handle_remove(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingServices;
    use tempfile::TempDir;

    #[test]
    fn test_sysroot_path_strips_root() {
        let root = Path::new("/mnt/sysimage");
        assert_eq!(
            sysroot_path(root, "/etc/adjtime"),
            PathBuf::from("/mnt/sysimage/etc/adjtime")
        );
        assert_eq!(
            sysroot_path(root, "etc/adjtime"),
            PathBuf::from("/mnt/sysimage/etc/adjtime")
        );
    }

    #[test]
    fn test_writefile_replaces_content() {
        let temp = TempDir::new().unwrap();
        let services = RecordingServices::new(false);

        execute_op(temp.path(), &Op::WriteFile("etc/x.conf".into(), "one\n".into()), &services)
            .unwrap();
        execute_op(temp.path(), &Op::WriteFile("etc/x.conf".into(), "two\n".into()), &services)
            .unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("etc/x.conf")).unwrap(),
            "two\n"
        );
    }

    #[test]
    fn test_symlink_overwrites_existing() {
        let temp = TempDir::new().unwrap();
        let services = RecordingServices::new(false);
        fs::create_dir_all(temp.path().join("etc")).unwrap();
        fs::write(temp.path().join("etc/localtime"), "binary zone data").unwrap();

        execute_op(
            temp.path(),
            &Op::Symlink("etc/localtime".into(), "../usr/share/zoneinfo/UTC".into()),
            &services,
        )
        .unwrap();

        let target = fs::read_link(temp.path().join("etc/localtime")).unwrap();
        assert_eq!(target, PathBuf::from("../usr/share/zoneinfo/UTC"));
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let temp = TempDir::new().unwrap();
        let services = RecordingServices::new(false);
        execute_op(temp.path(), &Op::RemoveFile("etc/nothing".into()), &services).unwrap();
    }

    #[test]
    fn test_service_ops_delegate() {
        let temp = TempDir::new().unwrap();
        let services = RecordingServices::new(true);
        execute_op(temp.path(), &Op::EnableService("chronyd".into()), &services).unwrap();
        execute_op(temp.path(), &Op::DisableService("sshd".into()), &services).unwrap();
        assert_eq!(services.calls(), vec!["enable chronyd", "disable sshd"]);
    }

    #[test]
    fn test_write_failure_reports_path() {
        let temp = TempDir::new().unwrap();
        let services = RecordingServices::new(false);
        fs::create_dir_all(temp.path().join("etc/adjtime")).unwrap();

        let err = execute_op(
            temp.path(),
            &Op::WriteFile("etc/adjtime".into(), "UTC\n".into()),
            &services,
        )
        .unwrap_err();
        assert!(err.to_string().contains("etc/adjtime"));
    }
}
