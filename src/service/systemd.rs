//! systemd backend: unit-file probe and `systemctl --root` enablement.

use std::path::Path;

use super::ServiceManager;
use crate::error::{InstallError, InstallResult};
use crate::process::Cmd;

/// Unit directories searched inside the sysroot, in systemd's precedence order.
const UNIT_DIRS: &[&str] = &[
    "etc/systemd/system",
    "usr/lib/systemd/system",
    "lib/systemd/system",
];

/// systemd backend. Enablement goes through `systemctl --root`, which edits
/// the sysroot's symlinks without needing a running systemd.
#[derive(Debug, Clone, Copy, Default)]
pub struct Systemd;

fn unit_name(service: &str) -> String {
    if service.contains('.') {
        service.to_string()
    } else {
        format!("{service}.service")
    }
}

impl Systemd {
    fn systemctl(&self, verb: &str, service: &str, root: &Path) -> InstallResult<()> {
        let unit = unit_name(service);
        let cmd = Cmd::new("systemctl")
            .arg("--root")
            .arg_path(root)
            .arg(verb)
            .arg(&unit)
            .error_msg(format!("systemctl {verb} {unit} failed"));
        let command = cmd.display();
        cmd.run().map_err(|e| InstallError::Command {
            command,
            reason: format!("{e:#}"),
        })?;
        tracing::info!(unit = %unit, verb, "systemd unit updated");
        Ok(())
    }
}

impl ServiceManager for Systemd {
    fn is_installed(&self, service: &str, root: &Path) -> bool {
        let unit = unit_name(service);
        UNIT_DIRS.iter().any(|dir| {
            let path = root.join(dir).join(&unit);
            path.exists() || path.is_symlink()
        })
    }

    fn enable(&self, service: &str, root: &Path) -> InstallResult<()> {
        self.systemctl("enable", service, root)
    }

    fn disable(&self, service: &str, root: &Path) -> InstallResult<()> {
        self.systemctl("disable", service, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_unit_name() {
        assert_eq!(unit_name("chronyd"), "chronyd.service");
        assert_eq!(unit_name("chronyd.service"), "chronyd.service");
        assert_eq!(unit_name("fstrim.timer"), "fstrim.timer");
    }

    #[test]
    fn test_is_installed_checks_unit_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        assert!(!Systemd.is_installed("chronyd", root));

        let dir = root.join("usr/lib/systemd/system");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("chronyd.service"), "[Unit]\n").unwrap();

        assert!(Systemd.is_installed("chronyd", root));
        assert!(!Systemd.is_installed("ntpd", root));
    }
}
