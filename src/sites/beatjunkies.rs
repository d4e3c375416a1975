use std::time::Duration;

use async_trait::async_trait;

use super::{Site, SiteAdapter, TrackRef, follow_next, or_skip, select_tracks};
use crate::driver::{Condition, Locator};
use crate::error::Result;
use crate::session::PoolSession;

const START_URL: &str = "https://www.beatjunkies.com/record-pool/page/1/";
const LOADED_WAIT: Duration = Duration::from_secs(10);

pub(crate) const PLAYLIST: &str = "widget widget-beats playlist";
pub(crate) const DOWNLOAD_ARROW: &str = "glyphicon glyphicon-arrow-down icon-right inline-exclude";
pub(crate) const NEXT: &str = "nextpostslink";

/// Beatjunkies: download arrows are plain links, pages live at `/page/N/`.
#[derive(Debug, Default)]
pub struct Beatjunkies;

impl Beatjunkies {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SiteAdapter for Beatjunkies {
    fn site(&self) -> Site {
        Site::Beatjunkies
    }

    fn start_url(&self) -> &str {
        START_URL
    }

    async fn get_tracks(&mut self, session: &mut PoolSession, max: usize) -> Result<Vec<TrackRef>> {
        let driver = session.driver()?;
        let playlist = match driver
            .wait_for(None, &Locator::class(PLAYLIST), Condition::Present, LOADED_WAIT)
            .await
        {
            Ok(playlist) => playlist,
            Err(e) if e.is_transient() => {
                log::info!("Playlist not found: {e}");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut candidates = Vec::new();
        let arrows = driver
            .find_all(Some(playlist), &Locator::class(DOWNLOAD_ARROW))
            .await;
        for arrow in or_skip(arrows, "playlist")? {
            let href = or_skip(driver.attr(arrow, "href").await, "download arrow")?;
            if let Some(url) = href.filter(|u| !u.is_empty()) {
                candidates.push((String::new(), TrackRef::Link(url)));
            }
        }

        Ok(select_tracks(candidates, &[], max))
    }

    async fn next_page(&mut self, session: &mut PoolSession) -> Result<bool> {
        session.ensure_on_cursor().await?;
        let next = Locator::class(NEXT);
        if or_skip(session.driver()?.find_all(None, &next).await, "next link")?.is_empty() {
            return Ok(false);
        }
        follow_next(session, &next).await
    }
}
