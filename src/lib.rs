//! recordpool-dl - download tracks from DJ record pool websites by driving
//! Chrome over WebDriver.
//!
//! Each supported site has a [`SiteAdapter`] that knows its markup. A
//! [`Downloader`] asks the operator how far to go, collects the tracks of the
//! current page through the adapter, starts their downloads in the browser
//! and pages through the listing.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use recordpool_dl::{AppConfig, Downloader, Operator, Platform, PoolSession, Site, adapter_for};
//!
//! # async fn example(operator: Arc<dyn Operator>) -> recordpool_dl::Result<()> {
//! let config = AppConfig::load_or_create(&AppConfig::default_path())?;
//! let adapter = adapter_for(Site::Beatjunkies, None, &config.download)?;
//! let session = PoolSession::launch(Site::Beatjunkies, &config, adapter.numbering()).await?;
//!
//! let mut downloader = Downloader::new(
//!     session,
//!     adapter,
//!     operator,
//!     config.download.clone(),
//!     Platform::current()?,
//! );
//! downloader.run().await?;
//! if let Some(summary) = downloader.shutdown().await {
//!     println!("{summary}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod disk;
pub mod download;
pub mod driver;
pub mod error;
pub mod format;
pub mod logging;
pub mod notify;
pub mod operator;
pub mod platform;
pub mod session;
pub mod sites;
pub mod stats;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export main types for convenience
pub use config::{AppConfig, BrowserConfig, DownloadConfig, PathConfig};
pub use disk::{DiskUsage, SpaceProbe, SystemProbe};
pub use download::{DownloadProgress, Downloader, NoProgress};
pub use driver::{Driver, ElementHandle, Locator};
pub use error::{Error, Result};
pub use format::{format_bytes, format_duration, format_ratio};
pub use operator::Operator;
pub use platform::Platform;
pub use session::{PageCursor, PageNumbering, PoolSession};
pub use sites::{Listing, Site, SiteAdapter, TrackRef, adapter_for};
pub use stats::SessionSummary;
