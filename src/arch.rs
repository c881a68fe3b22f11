//! Architecture names as they appear in `.discinfo` and `.treeinfo`.
//!
//! The running architecture is computed once by the caller and passed to the
//! validators explicitly, which keeps them pure and testable against any
//! architecture.

use std::fmt;

/// An architecture identifier in installer-media notation (`x86_64`, `i386`,
/// `ppc64le`, `s390x`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arch(String);

impl Arch {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Architecture of the running system.
    pub fn current() -> Self {
        Self::from_rust_arch(std::env::consts::ARCH)
    }

    /// Map a Rust target architecture to the name install media use.
    pub fn from_rust_arch(arch: &str) -> Self {
        let name = match arch {
            "x86" => "i386",
            "arm" => "armhfp",
            "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
            "powerpc64" => "ppc64",
            "powerpc" => "ppc",
            other => other,
        };
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// IBM Z has no hardware clock to configure.
    pub fn is_s390(&self) -> bool {
        self.0.starts_with("s390")
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Arch {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Arch {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
