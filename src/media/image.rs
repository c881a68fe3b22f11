//! Resolve and mount the installation image, retrying under policy control.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::iso::IsoScanner;
use super::mount::{MountOptions, Mounter, ISO9660};
use crate::error::{consult, ErrorPolicy, InstallError, InstallResult};

/// Mount the image at (or found under) `source` read-only on `target`.
///
/// `source` is either an image file, used as is, or a directory searched with
/// `scanner`. Every failure to find or mount an image is reported to `policy`
/// as [`InstallError::MissingImage`]; the loop retries until a mount succeeds
/// or the policy aborts. Returns the mounted image path.
pub fn mount_image(
    source: &Path,
    target: &Path,
    scanner: &IsoScanner<'_>,
    mounter: &dyn Mounter,
    policy: &mut dyn ErrorPolicy,
) -> InstallResult<PathBuf> {
    loop {
        let image = if source.is_file() {
            source.to_path_buf()
        } else {
            match scanner.find_first_image(source, policy)? {
                Some(name) => source.join(name),
                None => {
                    consult(
                        policy,
                        InstallError::MissingImage {
                            path: source.to_path_buf(),
                            reason: Some("no acceptable image found".to_string()),
                        },
                    )?;
                    debug!(source = %source.display(), "retrying image search");
                    continue;
                }
            }
        };

        match mounter.mount(&image, target, Some(ISO9660), &MountOptions::read_only()) {
            Ok(()) => {
                info!(image = %image.display(), target = %target.display(), "mounted installation image");
                return Ok(image);
            }
            Err(e) => {
                consult(
                    policy,
                    InstallError::MissingImage {
                        path: image,
                        reason: Some(e.to_string()),
                    },
                )?;
                debug!(source = %source.display(), "retrying image mount");
            }
        }
    }
}
