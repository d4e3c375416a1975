//! Browser session manager: owns the driver, the page cursor and the
//! running totals for one run against one site.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::config::AppConfig;
use crate::disk::{DiskUsage, SpaceProbe, SystemProbe};
use crate::driver::{ChromeLaunch, Driver, WebDriver};
use crate::error::{Error, Result};
use crate::format::{format_bytes, format_ratio};
use crate::sites::Site;
use crate::stats::SessionSummary;

/// First all-digit path segment.
static PATH_PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|/)(\d+)(?:/|$)").expect("valid regex"));

/// How a listing encodes its page number in the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumbering {
    /// `.../page/3/`: the first path segment made only of digits.
    PathSegment,
    /// `...?p=3`: a query parameter.
    Query(&'static str),
}

impl PageNumbering {
    /// Page number encoded in `url`, defaulting to 1.
    #[must_use]
    pub fn page_of(self, url: &str) -> u32 {
        self.number_span(url)
            .and_then(|(start, end)| url[start..end].parse::<u32>().ok())
            .filter(|&page| page > 0)
            .unwrap_or(1)
    }

    /// `url` with its page number replaced by `page`.
    ///
    /// Returns `None` for path numbering when the URL has no numeric segment.
    /// Query numbering appends the parameter if it is missing.
    #[must_use]
    pub fn with_page(self, url: &str, page: u32) -> Option<String> {
        if let Some((start, end)) = self.number_span(url) {
            return Some(format!("{}{page}{}", &url[..start], &url[end..]));
        }
        match self {
            Self::PathSegment => None,
            Self::Query(name) => {
                let separator = if url.contains('?') { '&' } else { '?' };
                Some(format!("{url}{separator}{name}={page}"))
            }
        }
    }

    /// Byte range of the page number inside `url`.
    fn number_span(self, url: &str) -> Option<(usize, usize)> {
        match self {
            Self::PathSegment => {
                let path_end = url.find(['?', '#']).unwrap_or(url.len());
                let digits = PATH_PAGE_RE.captures(&url[..path_end])?.get(1)?;
                Some((digits.start(), digits.end()))
            }
            Self::Query(name) => {
                let re = Regex::new(&format!(r"[?&]{}=(\d+)", regex::escape(name))).ok()?;
                let digits = re.captures(url)?.get(1)?;
                Some((digits.start(), digits.end()))
            }
        }
    }
}

/// Where in a paginated listing the session currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub url: String,
    pub page: u32,
}

/// One run against one record pool site.
pub struct PoolSession {
    site: Site,
    driver: Option<Box<dyn Driver>>,
    probe: Box<dyn SpaceProbe>,
    numbering: PageNumbering,
    cursor: PageCursor,
    download_dir: PathBuf,
    min_free_mb: u64,
    free_at_start: u64,
    total_tracks: usize,
    started: Instant,
}

impl PoolSession {
    /// Wraps an already running driver.
    ///
    /// Creates the download directory and snapshots its free space.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or measured.
    pub fn new(
        site: Site,
        driver: Box<dyn Driver>,
        probe: Box<dyn SpaceProbe>,
        download_dir: PathBuf,
        min_free_mb: u64,
        numbering: PageNumbering,
    ) -> Result<Self> {
        std::fs::create_dir_all(&download_dir)?;
        let free_at_start = probe.usage(&download_dir)?.free;
        Ok(Self {
            site,
            driver: Some(driver),
            probe,
            numbering,
            cursor: PageCursor {
                url: String::new(),
                page: 1,
            },
            download_dir,
            min_free_mb,
            free_at_start,
            total_tracks: 0,
            started: Instant::now(),
        })
    }

    /// Starts Chrome with the configured profile, saving downloads into the
    /// site's folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BrowserRunning`] if Chrome already holds the profile,
    /// or any I/O or WebDriver error from the launch.
    pub async fn launch(site: Site, config: &AppConfig, numbering: PageNumbering) -> Result<Self> {
        let download_dir = config.paths.site_dir(site.folder());
        std::fs::create_dir_all(&download_dir)?;

        let launch = ChromeLaunch {
            webdriver_url: config.browser.webdriver_url.clone(),
            chromedriver: config.browser.chromedriver.clone(),
            user_data_dir: crate::config::expand_home(&config.paths.chrome_profile),
            profile_directory: config.paths.profile_directory.clone(),
            download_dir: download_dir.clone(),
        };
        let driver = WebDriver::launch(&launch).await?;
        driver
            .set_implicit_wait(Duration::from_millis(config.browser.implicit_wait_ms))
            .await?;

        Self::new(
            site,
            Box::new(driver),
            Box::new(SystemProbe::new()),
            download_dir,
            config.download.min_free_mb,
            numbering,
        )
    }

    /// Loads the site's start page and initialises the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if navigation fails.
    pub async fn start(&mut self, url: &str) -> Result<()> {
        self.driver()?.goto(url).await?;
        self.update_cursor().await?;
        log::info!("Started {} at {}", self.site, self.cursor.url);
        Ok(())
    }

    #[must_use]
    pub const fn site(&self) -> Site {
        self.site
    }

    #[must_use]
    pub const fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.cursor.page
    }

    #[must_use]
    pub const fn numbering(&self) -> PageNumbering {
        self.numbering
    }

    #[must_use]
    pub const fn total_tracks(&self) -> usize {
        self.total_tracks
    }

    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// The live browser.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] after [`Self::shutdown`].
    pub fn driver(&self) -> Result<&dyn Driver> {
        self.driver.as_deref().ok_or(Error::SessionClosed)
    }

    /// Current usage of the download volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the volume cannot be measured.
    pub fn disk_usage(&self) -> Result<DiskUsage> {
        self.probe.usage(&self.download_dir)
    }

    /// Whether more than `threshold_mb` megabytes are free at the download path.
    ///
    /// # Errors
    ///
    /// Returns an error if the volume cannot be measured.
    pub fn has_free_space(&self, threshold_mb: u64) -> Result<bool> {
        let usage = self.disk_usage()?;
        log::debug!(
            "free disk space: {} ({})",
            format_bytes(usage.free),
            format_ratio(usage.free_ratio())
        );
        Ok(usage.exceeds(threshold_mb))
    }

    /// Fails with [`Error::DiskFull`] unless the configured minimum is free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DiskFull`] or a measurement error.
    pub fn check_disk_space(&self) -> Result<()> {
        if self.has_free_space(self.min_free_mb)? {
            return Ok(());
        }
        Err(Error::DiskFull {
            free_mb: self.disk_usage()?.free_mb(),
            threshold_mb: self.min_free_mb,
        })
    }

    /// Navigates to `url` and refreshes the cursor from where the browser landed.
    ///
    /// # Errors
    ///
    /// Returns an error if navigation fails.
    pub async fn open_page(&mut self, url: &str) -> Result<()> {
        self.driver()?.goto(url).await?;
        self.update_cursor().await?;
        Ok(())
    }

    /// Re-fetches the cursor URL.
    ///
    /// # Errors
    ///
    /// Returns an error if navigation fails.
    pub async fn reload_current_page(&self) -> Result<()> {
        self.driver()?.goto(&self.cursor.url).await
    }

    /// Reloads the cursor URL if the browser has drifted away from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be read or navigation fails.
    pub async fn ensure_on_cursor(&self) -> Result<()> {
        let actual = self.driver()?.current_url().await?;
        if actual != self.cursor.url {
            log::info!("Browser drifted to {actual}, reloading {}", self.cursor.url);
            self.reload_current_page().await?;
        }
        Ok(())
    }

    /// Reads the browser's actual URL and derives the page number from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be read.
    pub async fn update_cursor(&mut self) -> Result<&PageCursor> {
        let url = self.driver()?.current_url().await?;
        self.cursor = PageCursor {
            page: self.numbering.page_of(&url),
            url,
        };
        Ok(&self.cursor)
    }

    /// Adds to the running total of downloaded tracks.
    pub const fn record_downloads(&mut self, count: usize) {
        self.total_tracks += count;
    }

    /// Closes the browser and reports totals.
    ///
    /// Returns `None` without doing anything if the session is already closed.
    pub async fn shutdown(&mut self) -> Option<SessionSummary> {
        let driver = self.driver.take()?;
        if let Err(e) = driver.quit().await {
            log::warn!("Closing browser failed: {e}");
        }

        let free_at_end = match self.probe.usage(&self.download_dir) {
            Ok(usage) => usage.free,
            Err(e) => {
                log::warn!("Could not measure free space at shutdown: {e}");
                self.free_at_start
            }
        };
        let summary = SessionSummary::new(
            self.site,
            self.total_tracks,
            self.free_at_start,
            free_at_end,
            self.started.elapsed(),
        );
        log::info!("{summary}");
        Some(summary)
    }
}
