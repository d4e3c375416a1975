use std::ops::RangeInclusive;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use super::{Site, SiteAdapter, TrackRef, or_skip};
use crate::driver::{Condition, ElementHandle, Locator};
use crate::error::{Error, Result};
use crate::operator::{Operator, is_negative};
use crate::session::{PageNumbering, PoolSession};

const LISTING_URL: &str = "https://www.djcity.com/uk/digital/records.aspx";
const START_URL: &str = "https://www.djcity.com/uk/digital/records.aspx?p=1";
const LOADED_WAIT: Duration = Duration::from_secs(10);

pub(crate) const LISTING: &str = "float_left page_left";
pub(crate) const DETAIL_LINK: &str = "downloadBtn";
pub(crate) const RATING: &str = "rating-stars";
pub(crate) const DOWNLOADS: &str = "float_right reviw_tdonw";
pub(crate) const SIGN_IN: &str = "Sign In";
pub(crate) const LOGIN_BUTTON: &str = "ctl00_PageContent_ctl00_ctrlLogin_LoginButton";

/// Genre names accepted from the operator and their listing filter codes.
const GENRES: [(&str, &str); 7] = [
    ("hiphop", "c1"),
    ("house", "c2"),
    ("latin", "c3"),
    ("pop", "c4"),
    ("r&b", "c5"),
    ("reggae", "c6"),
    ("other", "c8"),
];

const DEFAULT_GENRES: [&str; 5] = ["hiphop", "house", "r&b", "pop", "other"];

/// Query suffix restricting the listing to `genres`. Unknown names are skipped.
#[must_use]
pub fn genre_filter(genres: &[&str]) -> String {
    let mut filter = String::from("&f=ddfilter");
    for genre in genres {
        if let Some((_, code)) = GENRES.iter().find(|(name, _)| name == genre) {
            filter.push_str(&format!("&{code}=on"));
        }
    }
    filter
}

/// Known genres from a comma separated answer, in the order given.
#[must_use]
pub fn parse_genres(input: &str) -> Vec<&'static str> {
    input
        .split(',')
        .map(|g| g.trim().to_lowercase())
        .filter_map(|g| GENRES.iter().find(|(name, _)| *name == g).map(|(name, _)| *name))
        .collect()
}

/// DJCity: downloads unlock after rating a track on its detail page.
#[derive(Debug)]
pub struct DjCity {
    ratings: RangeInclusive<u8>,
    filter: String,
}

impl DjCity {
    /// `ratings` are the star values a review may submit.
    #[must_use]
    pub const fn new(ratings: RangeInclusive<u8>) -> Self {
        Self {
            ratings,
            filter: String::new(),
        }
    }

    /// Active genre filter suffix, empty when every genre is listed.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    fn rating(&self) -> u8 {
        rand::thread_rng().gen_range(self.ratings.clone())
    }

    fn page_url(&self, page: u32) -> String {
        format!("{LISTING_URL}?p={page}{}", self.filter)
    }

    async fn check_login(&self, session: &mut PoolSession, operator: &dyn Operator) -> Result<()> {
        let driver = session.driver()?;
        let Some(sign_in) = driver
            .find_all(None, &Locator::link_text(SIGN_IN))
            .await?
            .into_iter()
            .next()
        else {
            return Ok(());
        };

        operator.info("Not logged in, doing sign in...");
        log::info!("Signing in to {}", Site::DjCity);
        driver.click(sign_in).await?;
        let login = driver.find(None, &Locator::id(LOGIN_BUTTON)).await?;
        driver.click(login).await?;

        if driver.current_url().await? != START_URL {
            driver.goto(START_URL).await?;
        }
        session.update_cursor().await?;
        Ok(())
    }

    async fn choose_genres(&mut self, session: &mut PoolSession, operator: &dyn Operator) -> Result<()> {
        let answer = operator.ask("Use default genres (y/n)?").await;
        let genres = if is_negative(&answer) {
            let names: Vec<&str> = GENRES.iter().map(|(name, _)| *name).collect();
            operator.info(&names.join(", "));
            let chosen = parse_genres(&operator.ask("Choose genres:").await);
            if chosen.is_empty() {
                operator.info("No genres specified, using all...");
                return Ok(());
            }
            chosen
        } else {
            DEFAULT_GENRES.to_vec()
        };

        operator.notice(&format!("Genres: {}", genres.join(", ")));
        self.filter = genre_filter(&genres);
        log::info!("Genre filter: {}", self.filter);
        let url = self.page_url(session.page());
        session.open_page(&url).await
    }

    /// Rates the track on the current detail page and returns its download
    /// links, or nothing if it was rated before.
    async fn review(&self, session: &PoolSession) -> Result<Vec<String>> {
        let driver = session.driver()?;
        let Some(stars) = driver
            .find_all(None, &Locator::class(RATING))
            .await?
            .into_iter()
            .next()
        else {
            log::debug!("Already reviewed, skipping");
            return Ok(Vec::new());
        };

        let value = self.rating();
        let star = driver
            .find(Some(stars), &Locator::css(format!("[data-value=\"{value}\"]")))
            .await?;
        driver.click(star).await?;

        let mut links = Vec::new();
        for container in driver.find_all(None, &Locator::class(DOWNLOADS)).await? {
            if let Some(url) = link_in(session, container).await? {
                links.push(url);
            }
        }
        Ok(links)
    }
}

async fn link_in(session: &PoolSession, container: ElementHandle) -> Result<Option<String>> {
    let driver = session.driver()?;
    let anchor = match driver.find(Some(container), &Locator::css("a")).await {
        Ok(anchor) => anchor,
        Err(Error::NoSuchElement(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    let href = or_skip(driver.attr(anchor, "href").await, "download link")?;
    Ok(href.filter(|u| !u.is_empty()))
}

#[async_trait]
impl SiteAdapter for DjCity {
    fn site(&self) -> Site {
        Site::DjCity
    }

    fn start_url(&self) -> &str {
        START_URL
    }

    fn numbering(&self) -> PageNumbering {
        PageNumbering::Query("p")
    }

    async fn prepare(&mut self, session: &mut PoolSession, operator: &dyn Operator) -> Result<()> {
        self.check_login(session, operator).await?;
        self.choose_genres(session, operator).await
    }

    async fn get_tracks(&mut self, session: &mut PoolSession, max: usize) -> Result<Vec<TrackRef>> {
        let details = {
            let driver = session.driver()?;
            let listing = match driver
                .wait_for(None, &Locator::class(LISTING), Condition::Present, LOADED_WAIT)
                .await
            {
                Ok(listing) => listing,
                Err(e) if e.is_transient() => {
                    log::info!("Listing not found: {e}");
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e),
            };
            let mut details = Vec::new();
            let buttons = driver
                .find_all(Some(listing), &Locator::class(DETAIL_LINK))
                .await;
            for button in or_skip(buttons, "listing")? {
                if max > 0 && details.len() >= max {
                    break;
                }
                let href = or_skip(driver.attr(button, "href").await, "detail link")?;
                if let Some(url) = href.filter(|u| !u.is_empty()) {
                    details.push(url);
                }
            }
            details
        };

        let mut tracks = Vec::new();
        for (index, url) in details.iter().enumerate() {
            log::debug!("Reviewing {} / {}: {url}", index + 1, details.len());
            match session.driver()?.goto(url).await {
                Ok(()) => {}
                Err(e) if e.is_transient() || matches!(e, Error::WebDriver(_)) => {
                    log::warn!("Could not open {url}: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            }
            match self.review(session).await {
                Ok(links) => tracks.extend(links.into_iter().map(TrackRef::Link)),
                Err(e) if e.is_transient() => log::warn!("Could not review {url}: {e}"),
                Err(e) => return Err(e),
            }
        }
        Ok(tracks)
    }

    async fn next_page(&mut self, session: &mut PoolSession) -> Result<bool> {
        let from = session.page();
        let Some(next) = from.checked_add(1) else {
            return Ok(false);
        };
        let url = self.page_url(next);
        if url == session.cursor().url {
            return Ok(false);
        }
        session.open_page(&url).await?;
        Ok(session.page() > from)
    }
}
