//! `.discinfo` marker file: identifies install media by timestamp and
//! architecture.
//!
//! ```text
//! 1700000000.123456      <- timestamp
//! LevitateOS 1.0         <- description, ignored
//! x86_64                 <- architecture
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::arch::Arch;
use crate::error::{InstallError, InstallResult};

/// Marker file name at the media root.
pub const DISCINFO: &str = ".discinfo";

/// Parsed `.discinfo` contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    /// Path of the marker file.
    pub path: PathBuf,
    pub is_file: bool,
    pub timestamp: Option<String>,
    pub description: String,
    pub arch: String,
}

impl MediaDescriptor {
    /// Whether these media were built for `arch`.
    pub fn matches_arch(&self, arch: &Arch) -> bool {
        arch == self.arch.as_str()
    }
}

/// Read the first three lines of the marker, trimmed, missing lines as empty
/// strings.
fn read_marker_lines(path: &Path) -> std::io::Result<[String; 3]> {
    let content = fs::read_to_string(path)?;
    let mut lines = content.lines().map(|l| l.trim().to_string());
    Ok([
        lines.next().unwrap_or_default(),
        lines.next().unwrap_or_default(),
        lines.next().unwrap_or_default(),
    ])
}

/// Strictly parse the marker at `tree/.discinfo`.
///
/// Fails when the file is unreadable, shorter than three lines, or names no
/// architecture.
pub fn read_discinfo(tree: &Path) -> InstallResult<MediaDescriptor> {
    let path = tree.join(DISCINFO);
    let content =
        fs::read_to_string(&path).map_err(|e| InstallError::io("reading .discinfo", &path, e))?;

    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    if lines.len() < 3 {
        return Err(InstallError::Discinfo {
            path,
            reason: format!("expected at least 3 lines, found {}", lines.len()),
        });
    }
    let arch = lines[2].trim();
    if arch.is_empty() {
        return Err(InstallError::Discinfo {
            path,
            reason: "architecture line is empty".to_string(),
        });
    }

    let timestamp = Some(lines[0].trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(MediaDescriptor {
        is_file: path.is_file(),
        timestamp,
        description: lines[1].trim().to_string(),
        arch: arch.to_string(),
        path,
    })
}

/// Check whether the tree mounted at `tree` is install media for `arch`.
///
/// With `timestamp`, the marker's timestamp must match as well. An unreadable
/// marker is a plain `false`.
pub fn verify_media(tree: &Path, arch: &Arch, timestamp: Option<&str>) -> bool {
    let path = tree.join(DISCINFO);
    let [stamp, _description, media_arch] = match read_marker_lines(&path) {
        Ok(lines) => lines,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no readable media marker");
            return false;
        }
    };

    let arch_ok = arch == media_arch.as_str();
    match timestamp {
        Some(expected) => {
            let ok = stamp == expected && arch_ok;
            if !ok {
                debug!(
                    expected_timestamp = expected,
                    actual_timestamp = %stamp,
                    expected_arch = %arch,
                    actual_arch = %media_arch,
                    "media marker does not match"
                );
            }
            ok
        }
        None => {
            if !arch_ok {
                debug!(expected_arch = %arch, actual_arch = %media_arch, "media architecture mismatch");
            }
            arch_ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree_with(content: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(DISCINFO), content).unwrap();
        temp
    }

    #[test]
    fn test_verify_media_arch_only() {
        let tree = tree_with("1700000000.1\nLevitateOS 1.0\nx86_64\n");
        assert!(verify_media(tree.path(), &Arch::new("x86_64"), None));
        assert!(!verify_media(tree.path(), &Arch::new("aarch64"), None));
    }

    #[test]
    fn test_verify_media_with_timestamp() {
        let tree = tree_with("1700000000.1\nLevitateOS 1.0\nx86_64\n");
        let arch = Arch::new("x86_64");
        assert!(verify_media(tree.path(), &arch, Some("1700000000.1")));
        assert!(!verify_media(tree.path(), &arch, Some("1600000000.0")));
        assert!(!verify_media(
            tree.path(),
            &Arch::new("s390x"),
            Some("1700000000.1")
        ));
    }

    #[test]
    fn test_verify_media_strips_trailing_whitespace() {
        let tree = tree_with("1700000000.1  \r\ndesc\nx86_64 \t\n");
        assert!(verify_media(
            tree.path(),
            &Arch::new("x86_64"),
            Some("1700000000.1")
        ));
    }

    #[test]
    fn test_both_readers_strip_leading_whitespace() {
        let tree = tree_with("  1700000000.1\ndesc\n  x86_64\n");
        let arch = Arch::new("x86_64");
        assert!(verify_media(tree.path(), &arch, Some("1700000000.1")));
        assert!(read_discinfo(tree.path()).unwrap().matches_arch(&arch));
    }

    #[test]
    fn test_verify_media_missing_marker() {
        let temp = TempDir::new().unwrap();
        assert!(!verify_media(temp.path(), &Arch::new("x86_64"), None));
    }

    #[test]
    fn test_verify_media_is_idempotent() {
        let tree = tree_with("1700000000.1\nLevitateOS 1.0\nx86_64\n");
        let arch = Arch::new("x86_64");
        for stamp in [None, Some("1700000000.1"), Some("nope")] {
            let first = verify_media(tree.path(), &arch, stamp);
            let second = verify_media(tree.path(), &arch, stamp);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_verify_media_short_file_is_rejected() {
        let tree = tree_with("1700000000.1\n");
        assert!(!verify_media(tree.path(), &Arch::new("x86_64"), None));
    }

    #[test]
    fn test_read_discinfo_parses_fields() {
        let tree = tree_with("1700000000.1\nLevitateOS 1.0\nx86_64\nALL\n");
        let desc = read_discinfo(tree.path()).unwrap();
        assert_eq!(desc.timestamp.as_deref(), Some("1700000000.1"));
        assert_eq!(desc.description, "LevitateOS 1.0");
        assert_eq!(desc.arch, "x86_64");
        assert!(desc.is_file);
        assert!(desc.matches_arch(&Arch::new("x86_64")));
    }

    #[test]
    fn test_read_discinfo_rejects_short_marker() {
        let tree = tree_with("1700000000.1\nLevitateOS\n");
        let err = read_discinfo(tree.path()).unwrap_err();
        assert!(matches!(err, InstallError::Discinfo { .. }));
    }

    #[test]
    fn test_read_discinfo_rejects_empty_arch() {
        let tree = tree_with("1700000000.1\nLevitateOS\n   \n");
        assert!(read_discinfo(tree.path()).is_err());
    }
}
