use std::time::Duration;

use async_trait::async_trait;

use super::{Listing, Site, SiteAdapter, TrackRef, click_download, fetch_link, or_skip};
use crate::driver::{Condition, Locator};
use crate::error::Result;
use crate::operator::Operator;
use crate::session::PoolSession;

/// Implicit wait while the receipt page renders.
const RECEIPT_WAIT: Duration = Duration::from_secs(10);

/// Pause after opening a prepared download link.
const LINK_PAUSE: Duration = Duration::from_secs(2);

pub(crate) const EXPAND: &str = "bfd-download-dropdown";
pub(crate) const DOWNLOADS: &str = "downloads";
pub(crate) const ITEM: &str = "download-title";
pub(crate) const ITEM_BUTTON: &str = "item-button";

/// A Bandcamp order receipt. Every item sits on one page and becomes
/// downloadable once Bandcamp has prepared the archive.
#[derive(Debug)]
pub struct Bandcamp {
    url: String,
    link_timeout: Duration,
}

impl Bandcamp {
    /// `link_timeout` bounds the wait for each item to be prepared.
    #[must_use]
    pub const fn new(url: String, link_timeout: Duration) -> Self {
        Self { url, link_timeout }
    }
}

#[async_trait]
impl SiteAdapter for Bandcamp {
    fn site(&self) -> Site {
        Site::Bandcamp
    }

    fn start_url(&self) -> &str {
        &self.url
    }

    fn listing(&self) -> Listing {
        Listing::SingleOrder
    }

    async fn prepare(&mut self, session: &mut PoolSession, _operator: &dyn Operator) -> Result<()> {
        log::info!("Checking to expand downloads...");
        let driver = session.driver()?;
        driver.set_implicit_wait(RECEIPT_WAIT).await?;
        let expand = or_skip(driver.find_all(None, &Locator::class(EXPAND)).await, "expand")?;
        match expand.first() {
            Some(&dropdown) => {
                log::info!("Expanding downloads...");
                or_skip(driver.click(dropdown).await, "expand")?;
            }
            None => log::info!("Download expand element not found"),
        }
        Ok(())
    }

    async fn get_tracks(&mut self, session: &mut PoolSession, max: usize) -> Result<Vec<TrackRef>> {
        let driver = session.driver()?;
        let downloads = match driver
            .wait_for(None, &Locator::class(DOWNLOADS), Condition::Present, RECEIPT_WAIT)
            .await
        {
            Ok(downloads) => downloads,
            Err(e) if e.is_transient() => {
                log::error!("No downloads found on the receipt page: {e}");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut items = or_skip(
            driver.find_all(Some(downloads), &Locator::class(ITEM)).await,
            "download items",
        )?;
        if max > 0 {
            items.truncate(max);
        }
        log::info!("Found {} items", items.len());

        let button = Locator::class(ITEM_BUTTON);
        let mut tracks = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let ready = driver
                .wait_for(Some(item), &button, Condition::Clickable, self.link_timeout)
                .await;
            let element = match ready {
                Ok(element) => element,
                Err(e) if e.is_transient() => {
                    log::warn!("Item {} was not prepared: {e}", index + 1);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let href = match driver.attr(element, "href").await {
                Ok(href) => href,
                Err(e) if e.is_transient() => {
                    log::warn!("Item {} went away: {e}", index + 1);
                    continue;
                }
                Err(e) => return Err(e),
            };
            match href.filter(|u| !u.is_empty()) {
                Some(url) => {
                    log::debug!("url: {url}");
                    tracks.push(TrackRef::Link(url));
                }
                None => tracks.push(TrackRef::Element(element)),
            }
        }
        Ok(tracks)
    }

    async fn download(&self, session: &PoolSession, track: &TrackRef) -> Result<bool> {
        match track {
            TrackRef::Link(url) => fetch_link(session, url, LINK_PAUSE).await,
            TrackRef::Element(handle) => click_download(session, *handle, LINK_PAUSE).await,
        }
    }

    async fn next_page(&mut self, _session: &mut PoolSession) -> Result<bool> {
        Ok(false)
    }
}
