//! Installer configuration loaded from TOML.
//!
//! Every key is optional. The raw `*Toml` structs mirror the file and reject
//! unknown keys; [`parse_config`] validates them into an [`InstallConfig`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::arch::Arch;
use crate::media::iso::DEFAULT_SCAN_MOUNT_POINT;
use crate::media::treeinfo::DEFAULT_BASE_REPOS;
use crate::service::InitSystem;
use crate::task::ntp::{DEFAULT_NTP_CONFIG, DEFAULT_NTP_SERVICE};
use crate::task::TimeSource;

/// Default number of retries the CLI's policy grants before aborting.
pub const DEFAULT_RETRIES: u32 = 0;

#[derive(Debug, Clone)]
pub struct InstallConfig {
    pub arch: Arch,
    pub media: MediaSettings,
    pub timezone: TimezoneSettings,
    pub ntp: NtpSettings,
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub scan_mount_point: PathBuf,
    /// Base for optical scratch directories; system temp dir when `None`.
    pub scratch_dir: Option<PathBuf>,
    pub base_repos: Vec<String>,
    pub retries: u32,
}

#[derive(Debug, Clone)]
pub struct TimezoneSettings {
    pub zone: Option<String>,
    pub is_utc: bool,
}

#[derive(Debug, Clone)]
pub struct NtpSettings {
    pub enabled: bool,
    pub service: String,
    pub config_file: String,
    pub init: InitSystem,
    pub sources: Vec<TimeSource>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            arch: Arch::current(),
            media: MediaSettings {
                scan_mount_point: PathBuf::from(DEFAULT_SCAN_MOUNT_POINT),
                scratch_dir: None,
                base_repos: DEFAULT_BASE_REPOS.iter().map(|s| s.to_string()).collect(),
                retries: DEFAULT_RETRIES,
            },
            timezone: TimezoneSettings {
                zone: None,
                is_utc: false,
            },
            ntp: NtpSettings {
                enabled: true,
                service: DEFAULT_NTP_SERVICE.to_string(),
                config_file: DEFAULT_NTP_CONFIG.to_string(),
                init: InitSystem::default(),
                sources: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    system: Option<SystemToml>,
    media: Option<MediaToml>,
    timezone: Option<TimezoneToml>,
    ntp: Option<NtpToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SystemToml {
    arch: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MediaToml {
    scan_mount_point: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    base_repos: Option<Vec<String>>,
    retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimezoneToml {
    zone: Option<String>,
    is_utc: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NtpToml {
    enabled: Option<bool>,
    service: Option<String>,
    config_file: Option<String>,
    init: Option<InitSystem>,
    sources: Option<Vec<TimeSource>>,
}

/// Load the configuration at `path`, or the defaults when `None`.
pub fn load_config(path: Option<&Path>) -> Result<InstallConfig> {
    let Some(path) = path else {
        return Ok(InstallConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading installer config '{}'", path.display()))?;
    parse_config(&text, path)
}

/// Parse and validate config text. `origin` is only used in messages.
pub fn parse_config(text: &str, origin: &Path) -> Result<InstallConfig> {
    let parsed: ConfigToml = toml::from_str(text)
        .with_context(|| format!("parsing installer config '{}'", origin.display()))?;
    let mut config = InstallConfig::default();

    if let Some(arch) = parsed.system.and_then(|s| s.arch) {
        let arch = arch.trim();
        if arch.is_empty() {
            bail!("invalid installer config '{}': system.arch is empty", origin.display());
        }
        config.arch = Arch::new(arch);
    }

    if let Some(media) = parsed.media {
        if let Some(mount_point) = media.scan_mount_point {
            if !mount_point.is_absolute() {
                bail!(
                    "invalid installer config '{}': media.scan_mount_point must be absolute, got '{}'",
                    origin.display(),
                    mount_point.display()
                );
            }
            config.media.scan_mount_point = mount_point;
        }
        config.media.scratch_dir = media.scratch_dir;
        if let Some(repos) = media.base_repos {
            let repos = repos
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect::<Vec<_>>();
            if repos.is_empty() {
                bail!(
                    "invalid installer config '{}': media.base_repos must name at least one repository",
                    origin.display()
                );
            }
            config.media.base_repos = repos;
        }
        if let Some(retries) = media.retries {
            config.media.retries = retries;
        }
    }

    if let Some(tz) = parsed.timezone {
        config.timezone.zone = tz.zone.filter(|z| !z.trim().is_empty());
        if let Some(is_utc) = tz.is_utc {
            config.timezone.is_utc = is_utc;
        }
    }

    if let Some(ntp) = parsed.ntp {
        if let Some(enabled) = ntp.enabled {
            config.ntp.enabled = enabled;
        }
        if let Some(service) = ntp.service {
            config.ntp.service = service.trim().to_string();
        }
        if let Some(config_file) = ntp.config_file {
            config.ntp.config_file = config_file;
        }
        if let Some(init) = ntp.init {
            config.ntp.init = init;
        }
        if let Some(sources) = ntp.sources {
            if let Some(bad) = sources.iter().find(|s| s.hostname.trim().is_empty()) {
                bail!(
                    "invalid installer config '{}': ntp source of type '{}' has an empty hostname",
                    origin.display(),
                    bad.kind
                );
            }
            config.ntp.sources = sources;
        }
    }

    Ok(config)
}
