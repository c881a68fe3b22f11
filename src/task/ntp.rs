//! NTP service enablement and time source configuration.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use super::executor::{execute_op, sysroot_path};
use super::{disable_service, enable_service, write_file, ConfigurationTask, Op};
use crate::error::{InstallError, InstallResult};
use crate::service::ServiceManager;

pub const DEFAULT_NTP_SERVICE: &str = "chronyd";
pub const DEFAULT_NTP_CONFIG: &str = "etc/chrony.conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSourceKind {
    Server,
    Pool,
}

impl fmt::Display for TimeSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Server => "server",
            Self::Pool => "pool",
        })
    }
}

/// One `server` or `pool` entry of the NTP configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeSource {
    #[serde(rename = "type")]
    pub kind: TimeSourceKind,
    pub hostname: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl TimeSource {
    pub fn new(kind: TimeSourceKind, hostname: impl Into<String>) -> Self {
        Self {
            kind,
            hostname: hostname.into(),
            options: Vec::new(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// `server <host> <opts...>` with no trailing space when there are no options.
impl fmt::Display for TimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.hostname)?;
        for option in &self.options {
            write!(f, " {option}")?;
        }
        Ok(())
    }
}

/// Render the full configuration file, one line per source in input order.
pub fn render_sources(sources: &[TimeSource]) -> String {
    sources.iter().map(|s| format!("{s}\n")).collect()
}

#[derive(Debug, Clone)]
pub struct ConfigureNtpTask {
    sysroot: PathBuf,
    ntp_enabled: bool,
    sources: Vec<TimeSource>,
    service: String,
    config_path: String,
}

impl ConfigureNtpTask {
    pub fn new(sysroot: impl Into<PathBuf>, ntp_enabled: bool, sources: Vec<TimeSource>) -> Self {
        Self {
            sysroot: sysroot.into(),
            ntp_enabled,
            sources,
            service: DEFAULT_NTP_SERVICE.to_string(),
            config_path: DEFAULT_NTP_CONFIG.to_string(),
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Sysroot-relative path of the NTP configuration file.
    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Plan the ops. Only the service probe touches the sysroot.
    pub fn ops(&self, services: &dyn ServiceManager) -> Vec<Op> {
        let mut ops = Vec::new();

        if services.is_installed(&self.service, &self.sysroot) {
            ops.push(if self.ntp_enabled {
                enable_service(&self.service)
            } else {
                disable_service(&self.service)
            });
        } else {
            tracing::debug!(service = %self.service, "NTP service not installed");
        }

        if self.ntp_enabled && !self.sources.is_empty() {
            ops.push(write_file(&self.config_path, render_sources(&self.sources)));
        }
        ops
    }
}

impl ConfigurationTask for ConfigureNtpTask {
    fn name(&self) -> &str {
        "Configure NTP"
    }

    /// Never fails: every op failure is logged and the remaining ops still run.
    fn run(&self, services: &dyn ServiceManager) -> InstallResult<()> {
        for op in self.ops(services) {
            let result = execute_op(&self.sysroot, &op, services).map_err(|e| match (&op, e) {
                (Op::WriteFile(..), InstallError::Io { source, .. }) => InstallError::NtpConfig {
                    path: sysroot_path(&self.sysroot, &self.config_path),
                    source,
                },
                (_, other) => other,
            });
            if let Err(e) = result {
                tracing::warn!(error = %e, "NTP configuration step failed");
            }
        }
        Ok(())
    }
}
