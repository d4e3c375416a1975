//! Host platform detection.

use std::fmt;

use sysinfo::System;

use crate::error::{Error, Result};

/// Operating systems with a known Chrome profile layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// Detects the platform this binary was built for.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOs`] for anything other than Linux, macOS or Windows.
    pub fn current() -> Result<Self> {
        Self::from_os(std::env::consts::OS)
    }

    /// Maps a `std::env::consts::OS` value to a platform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOs`] for unknown names.
    pub fn from_os(os: &str) -> Result<Self> {
        match os {
            "linux" => Ok(Self::Linux),
            "macos" => Ok(Self::MacOs),
            "windows" => Ok(Self::Windows),
            other => Err(Error::UnsupportedOs(other.to_string())),
        }
    }

    /// Platform name with version and architecture, e.g. `macOS 14.2 (aarch64)`.
    #[must_use]
    pub fn describe(self) -> String {
        let version = System::os_version().unwrap_or_else(|| "unknown".to_string());
        format!("{self} {version} ({})", std::env::consts::ARCH)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linux => "Linux",
            Self::MacOs => "macOS",
            Self::Windows => "Windows",
        };
        f.write_str(name)
    }
}
