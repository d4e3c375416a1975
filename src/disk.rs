//! Free-space lookup for the download directory.

use std::path::{Path, PathBuf};

use sysinfo::Disks;

use crate::error::{Error, Result};

const MB: u64 = 1024 * 1024;

/// Space on the volume that holds a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    /// Bytes available to the current user.
    pub free: u64,
    /// Volume size in bytes.
    pub total: u64,
}

impl DiskUsage {
    #[must_use]
    pub const fn free_mb(&self) -> u64 {
        self.free / MB
    }

    /// Fraction of the volume still free, `0.0` for an empty volume.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn free_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.free as f64 / self.total as f64
        }
    }

    /// Whether strictly more than `threshold_mb` megabytes are free.
    #[must_use]
    pub const fn exceeds(&self, threshold_mb: u64) -> bool {
        self.free > threshold_mb.saturating_mul(MB)
    }
}

/// Source of disk usage figures, abstracted for tests.
pub trait SpaceProbe: Send + Sync {
    /// Returns usage of the volume containing `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if no mounted volume contains the path.
    fn usage(&self, path: &Path) -> Result<DiskUsage>;
}

/// Reads the mounted volume list through `sysinfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl SystemProbe {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SpaceProbe for SystemProbe {
    fn usage(&self, path: &Path) -> Result<DiskUsage> {
        let path = std::fs::canonicalize(path)?;
        let disks = Disks::new_with_refreshed_list();
        let mounts: Vec<(PathBuf, DiskUsage)> = disks
            .list()
            .iter()
            .map(|disk| {
                (
                    disk.mount_point().to_path_buf(),
                    DiskUsage {
                        free: disk.available_space(),
                        total: disk.total_space(),
                    },
                )
            })
            .collect();

        volume_for(&path, &mounts).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no mounted volume contains {}", path.display()),
            ))
        })
    }
}

/// Picks the mount with the longest mount point that prefixes `path`.
fn volume_for(path: &Path, mounts: &[(PathBuf, DiskUsage)]) -> Option<DiskUsage> {
    mounts
        .iter()
        .filter(|(mount, _)| path.starts_with(mount))
        .max_by_key(|(mount, _)| mount.components().count())
        .map(|(_, usage)| *usage)
}
