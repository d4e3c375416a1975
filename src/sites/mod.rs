//! Record pool sites and the adapter contract they implement.

mod bandcamp;
mod beatjunkies;
mod bpmsupreme;
mod djcity;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DownloadConfig;
use crate::driver::{Condition, ElementHandle, Locator};
use crate::error::{Error, Result};
use crate::operator::Operator;
use crate::session::{PageCursor, PageNumbering, PoolSession};

pub use bandcamp::Bandcamp;
pub use beatjunkies::Beatjunkies;
pub use bpmsupreme::BpmSupreme;
pub use djcity::DjCity;

/// Pause after a click-triggered download.
pub(crate) const CLICK_PAUSE: Duration = Duration::from_millis(500);

/// Attempts for navigating to a download URL.
const LINK_ATTEMPTS: u32 = 3;

/// Base delay between download navigation attempts; grows linearly.
const LINK_BACKOFF: Duration = Duration::from_secs(5);

/// Bounded wait for a site's "next page" control.
pub(crate) const NEXT_WAIT: Duration = Duration::from_secs(5);

/// Supported record pool websites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    Bandcamp,
    Beatjunkies,
    BpmSupreme,
    DjCity,
}

impl Site {
    pub const ALL: [Self; 4] = [Self::Bandcamp, Self::Beatjunkies, Self::BpmSupreme, Self::DjCity];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bandcamp => "Bandcamp",
            Self::Beatjunkies => "Beatjunkies",
            Self::BpmSupreme => "BPMSupreme",
            Self::DjCity => "DJCity",
        }
    }

    /// Folder under the download root.
    #[must_use]
    pub const fn folder(self) -> &'static str {
        match self {
            Self::Bandcamp => "BANDCAMP",
            Self::Beatjunkies => "BEATJUNKIES",
            Self::BpmSupreme => "BPMSUPREME",
            Self::DjCity => "DJCITY",
        }
    }

    /// Whether a command line argument is a Bandcamp order receipt URL.
    #[must_use]
    pub fn is_order_url(arg: &str) -> bool {
        arg.contains("bandcamp.com/download")
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Site {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|site| site.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownSite(wanted.to_string()))
    }
}

/// A page-scoped handle to one downloadable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackRef {
    /// A control on the current page that starts the download when clicked.
    Element(ElementHandle),
    /// A URL that starts the download when opened.
    Link(String),
}

/// How a site's content is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// A paginated listing walked page by page.
    Paginated,
    /// One order receipt with every item on a single page.
    SingleOrder,
}

/// Site-specific scraping behind one contract. The orchestrator holds no
/// site knowledge beyond this trait.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn site(&self) -> Site;

    fn start_url(&self) -> &str;

    fn listing(&self) -> Listing {
        Listing::Paginated
    }

    fn numbering(&self) -> PageNumbering {
        PageNumbering::PathSegment
    }

    /// One-time setup before scraping, such as narrowing the listing.
    async fn prepare(&mut self, _session: &mut PoolSession, _operator: &dyn Operator) -> Result<()> {
        Ok(())
    }

    /// Tracks on the current page in page order, ignore-listed items
    /// removed, at most `max` of them when `max > 0`. Empty if the page
    /// never finished loading.
    async fn get_tracks(&mut self, session: &mut PoolSession, max: usize) -> Result<Vec<TrackRef>>;

    /// Starts the download of one track. Returns false when the track was
    /// skipped because its control went away or its link kept failing.
    async fn download(&self, session: &PoolSession, track: &TrackRef) -> Result<bool> {
        match track {
            TrackRef::Element(handle) => click_download(session, *handle, CLICK_PAUSE).await,
            TrackRef::Link(url) => fetch_link(session, url, CLICK_PAUSE).await,
        }
    }

    /// Advances to the next page. Returns false at the end of the listing.
    async fn next_page(&mut self, session: &mut PoolSession) -> Result<bool>;
}

/// Builds the adapter for `site`. Bandcamp needs its order receipt URL.
///
/// # Errors
///
/// Returns [`Error::Config`] when Bandcamp is selected without a URL.
pub fn adapter_for(
    site: Site,
    order_url: Option<String>,
    config: &DownloadConfig,
) -> Result<Box<dyn SiteAdapter>> {
    Ok(match site {
        Site::Bandcamp => {
            let url = order_url
                .ok_or_else(|| Error::Config("Bandcamp needs a download URL".to_string()))?;
            Box::new(Bandcamp::new(url, config.order_link_timeout()))
        }
        Site::Beatjunkies => Box::new(Beatjunkies::new()),
        Site::BpmSupreme => Box::new(BpmSupreme::new()),
        Site::DjCity => Box::new(DjCity::new(config.rating_range())),
    })
}

/// Keeps candidates whose label is not ignore-listed, in order, truncated
/// to `max` when `max > 0`.
pub(crate) fn select_tracks<T>(
    candidates: impl IntoIterator<Item = (String, T)>,
    ignore: &[&str],
    max: usize,
) -> Vec<T> {
    let kept = candidates
        .into_iter()
        .filter(|(label, _)| !ignore.contains(&label.as_str()))
        .map(|(_, track)| track);
    if max > 0 {
        kept.take(max).collect()
    } else {
        kept.collect()
    }
}

/// Treats a page-level DOM failure as "nothing here" so one re-rendered
/// item does not end the page.
pub(crate) fn or_skip<T: Default>(result: Result<T>, what: &str) -> Result<T> {
    match result {
        Err(e) if e.is_transient() => {
            log::debug!("Skipping {what}: {e}");
            Ok(T::default())
        }
        other => other,
    }
}

/// Script-clicks a download control, skipping it if the page re-rendered
/// or the control cannot be used.
pub(crate) async fn click_download(
    session: &PoolSession,
    handle: ElementHandle,
    pause: Duration,
) -> Result<bool> {
    match session.driver()?.script_click(handle).await {
        Ok(()) => {}
        Err(e) if e.is_transient() => {
            log::debug!("Skipping download control: {e}");
            return Ok(false);
        }
        Err(e) => return Err(e),
    }
    tokio::time::sleep(pause).await;
    Ok(true)
}

/// Opens a download URL, retrying a few times before giving up on the item.
pub(crate) async fn fetch_link(session: &PoolSession, url: &str, pause: Duration) -> Result<bool> {
    let driver = session.driver()?;
    for attempt in 1..=LINK_ATTEMPTS {
        match driver.goto(url).await {
            Ok(()) => {
                tokio::time::sleep(pause).await;
                return Ok(true);
            }
            Err(e @ (Error::WebDriver(_) | Error::Timeout(_))) => {
                log::warn!("Download attempt {attempt}/{LINK_ATTEMPTS} for {url} failed: {e}");
                if attempt < LINK_ATTEMPTS {
                    tokio::time::sleep(LINK_BACKOFF * attempt).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
    log::warn!("Giving up on {url}");
    Ok(false)
}

/// Activates the "next" control and falls back to rewriting the page number
/// in the URL when the control is unusable or does not navigate.
pub(crate) async fn follow_next(session: &mut PoolSession, control: &Locator) -> Result<bool> {
    session.ensure_on_cursor().await?;
    let before = session.cursor().clone();

    let clicked = {
        let driver = session.driver()?;
        match driver.wait_for(None, control, Condition::Clickable, NEXT_WAIT).await {
            Ok(element) => driver.click(element).await,
            Err(e) => Err(e),
        }
    };

    match clicked {
        Ok(()) => {
            session.update_cursor().await?;
            if session.cursor().url != before.url {
                return Ok(true);
            }
            log::info!("Next control did not navigate, using page URL");
        }
        Err(e) if e.is_transient() => {
            log::info!("Next control unusable ({e}), using page URL");
        }
        Err(e) => return Err(e),
    }

    advance_by_url(session, &before).await
}

/// Navigates to `from.page + 1` by rewriting the page number in `from.url`.
///
/// Returns false when no URL can be derived, it equals the current one, or
/// the browser did not end up on a later page.
pub(crate) async fn advance_by_url(session: &mut PoolSession, from: &PageCursor) -> Result<bool> {
    let Some(next) = from
        .page
        .checked_add(1)
        .and_then(|page| session.numbering().with_page(&from.url, page))
    else {
        return Ok(false);
    };
    if next == from.url {
        return Ok(false);
    }
    session.open_page(&next).await?;
    Ok(session.page() > from.page)
}
