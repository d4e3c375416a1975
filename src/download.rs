//! The download loop shared by every site.

use std::sync::Arc;

use crate::config::DownloadConfig;
use crate::error::Result;
use crate::notify;
use crate::operator::{Operator, is_affirmative, parse_count};
use crate::platform::Platform;
use crate::session::PoolSession;
use crate::sites::{Listing, SiteAdapter};
use crate::stats::SessionSummary;

/// Page the browser shows to follow running downloads.
const DOWNLOADS_PAGE: &str = "chrome://downloads/";

/// Trait for receiving download progress updates.
///
/// All methods have default no-op implementations for convenience.
pub trait DownloadProgress: Send + Sync {
    /// Called once the tracks of a page are known, before the first download.
    fn on_page_start(&self, _page: u32, _tracks: usize) {}

    /// Called after each download has been started. `done` counts from 1.
    fn on_track(&self, _done: usize) {}

    /// Called when every download of the page has been started.
    fn on_page_complete(&self, _page: u32, _downloaded: usize) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Drives one site adapter through a session, asking the operator how far
/// to go.
pub struct Downloader {
    session: PoolSession,
    adapter: Box<dyn SiteAdapter>,
    operator: Arc<dyn Operator>,
    progress: Arc<dyn DownloadProgress>,
    config: DownloadConfig,
    platform: Platform,
}

impl Downloader {
    /// Creates a downloader without progress reporting.
    #[must_use]
    pub fn new(
        session: PoolSession,
        adapter: Box<dyn SiteAdapter>,
        operator: Arc<dyn Operator>,
        config: DownloadConfig,
        platform: Platform,
    ) -> Self {
        Self {
            session,
            adapter,
            operator,
            progress: Arc::new(NoProgress),
            config,
            platform,
        }
    }

    /// Reports per-page progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn DownloadProgress>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn session(&self) -> &PoolSession {
        &self.session
    }

    /// Opens the start page, lets the adapter prepare and then runs the loop
    /// matching the site's layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the disk fills up or the browser fails.
    pub async fn run(&mut self) -> Result<()> {
        log::info!(
            "Initialized {} on {}",
            self.session.site(),
            self.platform.describe()
        );
        log::info!("Download path: '{}'", self.session.download_dir().display());

        self.session.start(self.adapter.start_url()).await?;
        self.adapter
            .prepare(&mut self.session, self.operator.as_ref())
            .await?;

        match self.adapter.listing() {
            Listing::SingleOrder => self.download_order().await,
            Listing::Paginated => self.run_loop().await,
        }
    }

    /// Asks for the mode: 0 (or anything unparseable) pages one at a time,
    /// a positive number downloads that many pages unattended.
    ///
    /// # Errors
    ///
    /// Propagates errors from the page loops.
    pub async fn run_loop(&mut self) -> Result<()> {
        self.operator.heading("Choose mode:");
        self.operator.info(" 0: Single page");
        self.operator.info(">0: Multiple pages");
        match parse_count(&self.operator.ask("Mode:").await) {
            0 => self.single_page_loop().await,
            pages => self.multi_page_loop(pages).await,
        }
    }

    /// Downloads one page at a time, asking how many tracks to take and
    /// whether to continue after each page.
    ///
    /// # Errors
    ///
    /// Returns an error if the disk fills up or the browser fails.
    pub async fn single_page_loop(&mut self) -> Result<()> {
        self.session.update_cursor().await?;
        loop {
            self.operator
                .heading(&format!("--- Page: {} ---", self.session.page()));
            let answer = self
                .operator
                .ask("Give number of tracks to download from current page (0 = all)")
                .await;
            self.download_page(parse_count(&answer)).await?;

            if !self.adapter.next_page(&mut self.session).await? {
                self.operator.alert("No more pages!");
                return Ok(());
            }

            self.chime();
            if !is_affirmative(&self.operator.ask("Continue?").await) {
                return Ok(());
            }
        }
    }

    /// Downloads `pages` pages without asking, then offers another batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the disk fills up or the browser fails.
    pub async fn multi_page_loop(&mut self, pages: usize) -> Result<()> {
        let mut pages = pages;
        while pages > 0 {
            self.session.update_cursor().await?;
            let batch = u32::try_from(pages).unwrap_or(u32::MAX);
            let last_page = self.session.page().saturating_add(batch - 1);

            for _ in 0..pages {
                self.operator.heading(&format!(
                    "--- Page: {} / {last_page} ---",
                    self.session.page()
                ));
                self.download_page(0).await?;
                if !self.adapter.next_page(&mut self.session).await? {
                    self.operator.alert("No more pages!");
                    return Ok(());
                }
            }

            self.chime();
            self.operator.heading("Continue for pages?");
            pages = parse_count(&self.operator.ask("Pages:").await);
        }
        Ok(())
    }

    /// Downloads the tracks of the current page, at most `max` when `max > 0`.
    ///
    /// Returns the number of downloads started.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DiskFull`] before touching any track when the
    /// download volume is below the configured minimum.
    pub async fn download_page(&mut self, max: usize) -> Result<usize> {
        self.session.check_disk_space()?;
        let page = self.session.page();

        self.operator.notice("Getting download links...");
        let tracks = self.adapter.get_tracks(&mut self.session, max).await?;
        if tracks.is_empty() {
            self.operator.alert("No files to download!");
            log::info!("Page {page}: no files to download");
            return Ok(0);
        }

        self.operator.notice("Downloading files...");
        self.progress.on_page_start(page, tracks.len());
        let mut count = 0;
        for (index, track) in tracks.iter().enumerate() {
            if self.adapter.download(&self.session, track).await? {
                count += 1;
            }
            self.progress.on_track(index + 1);
        }

        // downloads run in the browser; give the last ones a moment to start
        tokio::time::sleep(self.config.settle()).await;

        self.session.record_downloads(count);
        self.progress.on_page_complete(page, count);
        log::info!("Page {page}: downloaded {count} files.");
        Ok(count)
    }

    /// Downloads a whole order in one go and keeps the browser open on its
    /// downloads page until the operator confirms they have finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the disk fills up or the browser fails.
    pub async fn download_order(&mut self) -> Result<()> {
        self.download_page(0).await?;
        self.session.open_page(DOWNLOADS_PAGE).await?;
        self.operator
            .ask("Wait until downloads have finished and press Enter...")
            .await;
        Ok(())
    }

    /// Closes the browser and returns the session totals. Safe to call more
    /// than once.
    pub async fn shutdown(&mut self) -> Option<SessionSummary> {
        self.session.shutdown().await
    }

    fn chime(&self) {
        if self.config.chime {
            notify::play_chime(self.platform);
        }
    }
}
