//! Error types and the injected error-recovery policy.
//!
//! Media discovery never decides on its own whether a failure should stop the
//! installation. Recoverable conditions are handed to an [`ErrorPolicy`],
//! which answers [`ErrorDecision::Abort`] (propagate) or
//! [`ErrorDecision::Continue`] (suppress and retry/continue). An interactive
//! front end can prompt the operator; a batch install can abort or retry a
//! bounded number of times.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// ISO9660 logical sector size. Valid images are a whole number of sectors.
pub const ISO_SECTOR_SIZE: u64 = 2048;

/// Result alias for library operations.
pub type InstallResult<T> = Result<T, InstallError>;

/// Errors produced by media discovery and configuration tasks.
#[derive(Debug, Error)]
pub enum InstallError {
    /// No usable installation image could be found or mounted.
    #[error("missing installation image at {}{}", path.display(), fmt_reason(reason))]
    MissingImage {
        path: PathBuf,
        reason: Option<String>,
    },

    /// Image size is not a whole number of ISO sectors; it is likely truncated.
    #[error("{} appears to be corrupted: size {size} is not a multiple of {} bytes", path.display(), ISO_SECTOR_SIZE)]
    InvalidImageSize { path: PathBuf, size: u64 },

    /// Timezone could not be applied to the target system.
    #[error("timezone configuration failed: {message}")]
    TimezoneConfiguration {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// NTP configuration file could not be written.
    #[error("failed to write NTP configuration {}", path.display())]
    NtpConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The `.discinfo` marker could not be parsed.
    #[error("invalid media marker {}: {reason}", path.display())]
    Discinfo { path: PathBuf, reason: String },

    /// The `.treeinfo` metadata could not be read or lacks a required field.
    #[error("invalid install tree metadata {}: {reason}", path.display())]
    TreeInfo { path: PathBuf, reason: String },

    #[error(transparent)]
    Mount(#[from] MountError),

    #[error("{operation} failed for {}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An external command needed by a service manager failed.
    #[error("command `{command}` failed: {reason}")]
    Command { command: String, reason: String },
}

fn fmt_reason(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(": {r}"))
        .unwrap_or_default()
}

impl InstallError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn timezone(message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self::TimezoneConfiguration {
            message: message.into(),
            source,
        }
    }
}

/// Failures from mounting or unmounting a filesystem.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("mounting {} on {} failed: {stderr}", device.display(), target.display())]
    Mount {
        device: PathBuf,
        target: PathBuf,
        stderr: String,
    },

    #[error("unmounting {} failed: {stderr}", target.display())]
    Unmount { target: PathBuf, stderr: String },

    #[error("creating mount point {}", path.display())]
    MountPoint {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What the caller should do with a recoverable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDecision {
    /// Propagate the failure to the caller.
    Abort,
    /// Suppress the failure and retry or carry on.
    Continue,
}

/// Strategy consulted for recoverable media failures.
pub trait ErrorPolicy {
    fn decide(&mut self, error: &InstallError) -> ErrorDecision;
}

impl<F> ErrorPolicy for F
where
    F: FnMut(&InstallError) -> ErrorDecision,
{
    fn decide(&mut self, error: &InstallError) -> ErrorDecision {
        self(error)
    }
}

/// Always propagate. Suitable for unattended installs with no retry budget.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortOnError;

impl ErrorPolicy for AbortOnError {
    fn decide(&mut self, _error: &InstallError) -> ErrorDecision {
        ErrorDecision::Abort
    }
}

/// Continue up to `max_retries` times, then abort.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            attempts: 0,
        }
    }

    /// Number of failures this policy has been consulted about.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl ErrorPolicy for RetryPolicy {
    fn decide(&mut self, error: &InstallError) -> ErrorDecision {
        self.attempts += 1;
        if self.attempts > self.max_retries {
            tracing::error!(%error, attempts = self.attempts, "giving up");
            ErrorDecision::Abort
        } else {
            tracing::warn!(%error, attempt = self.attempts, max = self.max_retries, "retrying");
            ErrorDecision::Continue
        }
    }
}

/// Route `error` through `policy`: `Err` when the policy aborts, `Ok` when it
/// suppresses the failure.
pub fn consult(policy: &mut dyn ErrorPolicy, error: InstallError) -> InstallResult<()> {
    match policy.decide(&error) {
        ErrorDecision::Abort => Err(error),
        ErrorDecision::Continue => Ok(()),
    }
}
