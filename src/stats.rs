//! End-of-session report.

use std::fmt;
use std::time::Duration;

use crate::format::{format_bytes, format_duration};
use crate::sites::Site;

/// Totals reported when a pool session shuts down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub site: Site,
    /// Tracks whose download was triggered.
    pub tracks: usize,
    /// Free space lost on the download volume during the session.
    pub bytes_consumed: u64,
    pub elapsed: Duration,
}

impl SessionSummary {
    /// Builds a summary from free-space snapshots.
    ///
    /// Other processes may write to the same volume, so the figure is best
    /// effort; it saturates at zero when free space grew.
    #[must_use]
    pub const fn new(
        site: Site,
        tracks: usize,
        free_at_start: u64,
        free_at_end: u64,
        elapsed: Duration,
    ) -> Self {
        Self {
            site,
            tracks,
            bytes_consumed: free_at_start.saturating_sub(free_at_end),
            elapsed,
        }
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total files downloaded: {} / {} in {}",
            self.tracks,
            format_bytes(self.bytes_consumed),
            format_duration(self.elapsed)
        )
    }
}
