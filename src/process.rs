//! Thin wrapper around `std::process::Command` for host tools.
//!
//! ```rust,ignore
//! let out = Cmd::new("lsblk").args(["--json", "--list"]).error_msg("lsblk failed").run()?;
//! ```

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Builder for a host command whose failure should carry a readable message.
#[derive(Debug)]
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            error_msg: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.as_os_str().to_os_string());
        self
    }

    /// Message prefixed to the error when the command exits non-zero.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Rendered command line, for logs and errors.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Run to completion, failing on non-zero exit.
    pub fn run(self) -> Result<CmdOutput> {
        let rendered = self.display();
        tracing::debug!(command = %rendered, "running");

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .with_context(|| format!("failed to spawn `{}`", rendered))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let prefix = self
                .error_msg
                .unwrap_or_else(|| format!("`{}` failed", rendered));
            bail!("{} ({}): {}", prefix, output.status, stderr);
        }

        Ok(CmdOutput { stdout, stderr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_args() {
        let cmd = Cmd::new("mount")
            .args(["-t", "iso9660"])
            .arg_path(Path::new("/isos/a.iso"));
        assert_eq!(cmd.display(), "mount -t iso9660 /isos/a.iso");
    }

    #[test]
    fn test_run_captures_stdout() {
        let out = Cmd::new("echo").arg("hello").run().unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_run_failure_uses_error_msg() {
        let err = Cmd::new("false")
            .error_msg("false is false")
            .run()
            .unwrap_err();
        assert!(err.to_string().contains("false is false"));
    }
}
