//! Declarative configuration tasks applied to a target sysroot.
//!
//! A task inspects the sysroot, plans a list of [`Op`]s describing WHAT
//! should change, and hands them to the [`executor`]. Tasks own their failure
//! policy: the timezone task stops at the first failed op, the NTP task logs
//! and carries on.
//!
//! # Example
//!
//! ```rust,ignore
//! use distro_install::task::{ConfigurationTask, timezone::ConfigureTimezoneTask};
//! use distro_install::service::Systemd;
//!
//! let task = ConfigureTimezoneTask::new("/mnt/sysimage", Some("Europe/Prague".into()), true, arch);
//! task.run(&Systemd)?;
//! ```

pub mod executor;
pub mod ntp;
pub mod timezone;

use crate::error::InstallResult;
use crate::service::ServiceManager;

pub use ntp::{ConfigureNtpTask, TimeSource, TimeSourceKind};
pub use timezone::ConfigureTimezoneTask;

/// A one-shot configuration step run against a sysroot.
///
/// Tasks are immutable input bundles; running one twice converges on the same
/// sysroot state.
pub trait ConfigurationTask {
    /// Name for logging and identification.
    fn name(&self) -> &str;

    /// Apply the task. Only fatal failures are returned.
    fn run(&self, services: &dyn ServiceManager) -> InstallResult<()>;
}

/// Sysroot-relative operations. Paths are relative to the sysroot; a leading
/// `/` is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Write a file with given content, replacing any existing file.
    WriteFile(String, String),

    /// Create a symlink (link_path, target), replacing any existing entry.
    Symlink(String, String),

    /// Remove a file if present.
    RemoveFile(String),

    /// Enable a service in the sysroot.
    EnableService(String),

    /// Disable a service in the sysroot.
    DisableService(String),
}

/// Write a file.
pub fn write_file(path: impl Into<String>, content: impl Into<String>) -> Op {
    Op::WriteFile(path.into(), content.into())
}

/// Create a symlink.
pub fn symlink(link: impl Into<String>, target: impl Into<String>) -> Op {
    Op::Symlink(link.into(), target.into())
}

pub fn remove_file(path: impl Into<String>) -> Op {
    Op::RemoveFile(path.into())
}

pub fn enable_service(name: impl Into<String>) -> Op {
    Op::EnableService(name.into())
}

pub fn disable_service(name: impl Into<String>) -> Op {
    Op::DisableService(name.into())
}

/// Run `tasks` in order, stopping at the first fatal failure.
pub fn run_tasks(
    tasks: &[&dyn ConfigurationTask],
    services: &dyn ServiceManager,
) -> InstallResult<()> {
    for task in tasks {
        tracing::info!(task = task.name(), "running configuration task");
        task.run(services)?;
    }
    Ok(())
}
