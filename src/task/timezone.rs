//! Timezone configuration: `/etc/localtime` and the `/etc/adjtime` clock mode.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::executor::{execute_op, sysroot_path};
use super::{symlink, write_file, ConfigurationTask, Op};
use crate::arch::Arch;
use crate::error::{InstallError, InstallResult};
use crate::service::ServiceManager;

/// Zone used when the requested one is unusable.
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

const ZONEINFO_DIR: &str = "usr/share/zoneinfo";
const LOCALTIME: &str = "etc/localtime";
const ADJTIME: &str = "etc/adjtime";

/// First two lines written when `/etc/adjtime` is missing or unreadable.
const ADJTIME_DEFAULTS: [&str; 2] = ["0.0 0 0.0", "0"];

#[derive(Debug, Clone)]
pub struct ConfigureTimezoneTask {
    sysroot: PathBuf,
    timezone: Option<String>,
    is_utc: bool,
    arch: Arch,
}

impl ConfigureTimezoneTask {
    pub fn new(
        sysroot: impl Into<PathBuf>,
        timezone: Option<String>,
        is_utc: bool,
        arch: Arch,
    ) -> Self {
        Self {
            sysroot: sysroot.into(),
            timezone,
            is_utc,
            arch,
        }
    }

    /// The zone that will be linked: the requested one when it names a zone
    /// file under the sysroot, [`DEFAULT_TIMEZONE`] otherwise.
    pub fn resolved_timezone(&self) -> &str {
        match self.timezone.as_deref() {
            Some(tz) if is_valid_timezone(&self.sysroot, tz) => tz,
            requested => {
                tracing::warn!(
                    requested = requested.unwrap_or(""),
                    fallback = DEFAULT_TIMEZONE,
                    "timezone not valid, using default"
                );
                DEFAULT_TIMEZONE
            }
        }
    }

    /// Plan the ops without touching the sysroot.
    pub fn ops(&self) -> InstallResult<Vec<Op>> {
        let tz = self.resolved_timezone();
        let zone_file = self.sysroot.join(ZONEINFO_DIR).join(tz);
        if !zone_file.is_file() {
            return Err(InstallError::timezone(
                format!("timezone file {} does not exist", zone_file.display()),
                None,
            ));
        }

        let mut ops = vec![symlink(LOCALTIME, format!("../{ZONEINFO_DIR}/{tz}"))];
        if self.arch.is_s390() {
            tracing::debug!(arch = %self.arch, "skipping /etc/adjtime");
        } else {
            ops.push(write_file(ADJTIME, self.adjtime_content()));
        }
        Ok(ops)
    }

    fn adjtime_content(&self) -> String {
        let path = sysroot_path(&self.sysroot, ADJTIME);
        let existing = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "adjtime unreadable, using defaults");
                String::new()
            }
        };

        let mut lines = existing.lines();
        let first = lines.next().unwrap_or(ADJTIME_DEFAULTS[0]);
        let second = lines.next().unwrap_or(ADJTIME_DEFAULTS[1]);
        let mode = if self.is_utc { "UTC" } else { "LOCAL" };
        format!("{first}\n{second}\n{mode}\n")
    }
}

/// Non-empty, relative, no `..`, and present as a file under the sysroot.
fn is_valid_timezone(sysroot: &Path, tz: &str) -> bool {
    let path = Path::new(tz);
    if tz.is_empty() || !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return false;
    }
    sysroot.join(ZONEINFO_DIR).join(path).is_file()
}

impl ConfigurationTask for ConfigureTimezoneTask {
    fn name(&self) -> &str {
        "Configure timezone"
    }

    fn run(&self, services: &dyn ServiceManager) -> InstallResult<()> {
        for op in self.ops()? {
            execute_op(&self.sysroot, &op, services).map_err(|e| {
                let message = format!("cannot apply {op:?}");
                match e {
                    InstallError::Io { source, .. } => InstallError::timezone(message, Some(source)),
                    other => InstallError::timezone(format!("{message}: {other}"), None),
                }
            })?;
        }
        tracing::info!(sysroot = %self.sysroot.display(), is_utc = self.is_utc, "timezone configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingServices;
    use tempfile::TempDir;

    fn sysroot(zones: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for zone in zones {
            let path = temp.path().join(ZONEINFO_DIR).join(zone);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "TZif2").unwrap();
        }
        fs::create_dir_all(temp.path().join("etc")).unwrap();
        temp
    }

    fn run(root: &Path, tz: Option<&str>, is_utc: bool, arch: &str) -> InstallResult<()> {
        ConfigureTimezoneTask::new(root, tz.map(String::from), is_utc, Arch::new(arch))
            .run(&RecordingServices::new(false))
    }

    fn adjtime_last_line(root: &Path) -> String {
        let text = fs::read_to_string(root.join(ADJTIME)).unwrap();
        text.lines().last().unwrap().to_string()
    }

    #[test]
    fn test_valid_zone_is_linked() {
        let temp = sysroot(&["Europe/Prague", DEFAULT_TIMEZONE]);
        run(temp.path(), Some("Europe/Prague"), true, "x86_64").unwrap();

        let link = fs::read_link(temp.path().join(LOCALTIME)).unwrap();
        assert_eq!(link, PathBuf::from("../usr/share/zoneinfo/Europe/Prague"));
        assert_eq!(adjtime_last_line(temp.path()), "UTC");
    }

    #[test]
    fn test_invalid_zone_falls_back() {
        let temp = sysroot(&[DEFAULT_TIMEZONE]);
        for tz in [Some("BahBlah"), Some(""), None, Some("../../etc/passwd"), Some("/UTC")] {
            run(temp.path(), tz, true, "x86_64").unwrap();
            let link = fs::read_link(temp.path().join(LOCALTIME)).unwrap();
            assert_eq!(link, PathBuf::from("../usr/share/zoneinfo/America/New_York"));
        }
    }

    #[test]
    fn test_adjtime_keeps_first_lines() {
        let temp = sysroot(&[DEFAULT_TIMEZONE]);
        fs::write(temp.path().join(ADJTIME), "0.013 1700000000 0.0\n1700000000\nUTC\n").unwrap();

        run(temp.path(), None, false, "x86_64").unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join(ADJTIME)).unwrap(),
            "0.013 1700000000 0.0\n1700000000\nLOCAL\n"
        );
    }

    #[test]
    fn test_adjtime_defaults_when_missing() {
        let temp = sysroot(&[DEFAULT_TIMEZONE]);
        run(temp.path(), None, true, "aarch64").unwrap();
        assert_eq!(
            fs::read_to_string(temp.path().join(ADJTIME)).unwrap(),
            "0.0 0 0.0\n0\nUTC\n"
        );
    }

    #[test]
    fn test_s390_skips_adjtime() {
        let temp = sysroot(&[DEFAULT_TIMEZONE]);
        run(temp.path(), None, true, "s390x").unwrap();
        assert!(temp.path().join(LOCALTIME).is_symlink());
        assert!(!temp.path().join(ADJTIME).exists());
    }

    #[test]
    fn test_missing_zone_data_is_fatal() {
        let temp = sysroot(&[]);
        let err = run(temp.path(), Some("Europe/Prague"), true, "x86_64").unwrap_err();
        assert!(matches!(err, InstallError::TimezoneConfiguration { .. }));
        assert!(!temp.path().join(LOCALTIME).is_symlink());
    }

    #[test]
    fn test_adjtime_write_failure() {
        let temp = sysroot(&[DEFAULT_TIMEZONE]);
        fs::create_dir_all(temp.path().join(ADJTIME)).unwrap();

        let err = run(temp.path(), None, true, "x86_64").unwrap_err();

        assert!(matches!(
            err,
            InstallError::TimezoneConfiguration { source: Some(_), .. }
        ));
        assert!(temp.path().join(LOCALTIME).is_symlink());
    }
}
