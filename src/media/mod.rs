//! Installation media discovery.
//!
//! - [`discinfo`] - `.discinfo` marker parsing and media verification
//! - [`treeinfo`] - `.treeinfo` install tree metadata and repository checks
//! - [`iso`] - scan a directory for the first usable ISO image
//! - [`image`] - mount an image with policy-driven retry
//! - [`optical`] - find media on optical drives and ISO9660 devices
//! - [`mount`] - the [`Mounter`](mount::Mounter) seam
//! - [`lock`] - single-flight guard for scans

pub mod discinfo;
pub mod image;
pub mod iso;
pub mod lock;
pub mod mount;
pub mod optical;
pub mod treeinfo;

pub use discinfo::{read_discinfo, verify_media, MediaDescriptor};
pub use image::mount_image;
pub use iso::{is_iso_image, IsoScanner};
pub use mount::{MountOptions, Mounter, SystemMounter};
pub use optical::{find_optical_media, potential_hdiso_sources};
pub use treeinfo::{has_valid_repo_metadata, InstallTreeMetadata};
