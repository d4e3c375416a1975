use std::time::Duration;

use async_trait::async_trait;

use super::{Site, SiteAdapter, TrackRef, follow_next, or_skip, select_tracks};
use crate::driver::{Condition, Locator};
use crate::error::Result;
use crate::operator::Operator;
use crate::session::PoolSession;

const START_URL: &str = "https://www.bpmsupreme.com/store/newreleases/audio/smart";
const LOADED_WAIT: Duration = Duration::from_secs(5);

const IGNORE: [&str; 5] = [
    "Short Edit",
    "Clean Short Edit",
    "Dirty Short Edit",
    "Quick Hit Clean",
    "Quick Hit",
];

pub(crate) const TRACK_ROW: &str = ".tag";
pub(crate) const PLAYLIST: &str = ".genreslist";
pub(crate) const VERSION: &str = ".//*[@class='ng-binding ng-scope']";
pub(crate) const NEXT: &str = "//a[@aria-label='Next']";

/// BPM Supreme: each track row lists its versions; clicking a version label
/// downloads it.
#[derive(Debug, Default)]
pub struct BpmSupreme;

impl BpmSupreme {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SiteAdapter for BpmSupreme {
    fn site(&self) -> Site {
        Site::BpmSupreme
    }

    fn start_url(&self) -> &str {
        START_URL
    }

    async fn prepare(&mut self, _session: &mut PoolSession, operator: &dyn Operator) -> Result<()> {
        operator
            .ask("Choose genres manually and press Enter to continue...")
            .await;
        Ok(())
    }

    async fn get_tracks(&mut self, session: &mut PoolSession, max: usize) -> Result<Vec<TrackRef>> {
        let driver = session.driver()?;
        let row = Locator::css(TRACK_ROW);
        match driver.wait_for(None, &row, Condition::Visible, LOADED_WAIT).await {
            Ok(_) => {}
            Err(e) if e.is_transient() => {
                log::info!("Tracks did not load: {e}");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        }

        let playlist = match driver.find(None, &Locator::css(PLAYLIST)).await {
            Ok(playlist) => playlist,
            Err(e) if e.is_transient() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let version = Locator::xpath(VERSION);
        let mut candidates = Vec::new();
        for tag in or_skip(driver.find_all(Some(playlist), &row).await, "track rows")? {
            for element in or_skip(driver.find_all(Some(tag), &version).await, "track row")? {
                if let Some(label) = or_skip(driver.text(element).await.map(Some), "version")? {
                    candidates.push((label, TrackRef::Element(element)));
                }
            }
        }

        Ok(select_tracks(candidates, &IGNORE, max))
    }

    async fn next_page(&mut self, session: &mut PoolSession) -> Result<bool> {
        follow_next(session, &Locator::xpath(NEXT)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeDriver, FakeNode, FakePage};
    use crate::operator::scripted::ScriptedOperator;
    use crate::session::PageNumbering;
    use crate::session::tests::{FixedProbe, session_with};
    use tempfile::TempDir;

    const PAGE: &str = "https://www.bpmsupreme.com/store/newreleases/audio/smart/1";

    fn row(versions: &[&str]) -> FakeNode {
        versions.iter().fold(FakeNode::new("row"), |node, label| {
            node.child(Locator::xpath(VERSION), FakeNode::new(label))
        })
    }

    fn listing() -> FakePage {
        let playlist = FakeNode::new("playlist")
            .child(Locator::css(TRACK_ROW), row(&["Dirty", "Short Edit", "Clean"]))
            .child(Locator::css(TRACK_ROW), row(&["Quick Hit", "Intro Dirty"]))
            .child(Locator::css(TRACK_ROW), row(&["Quick Hit Clean", "Acapella"]));
        FakePage::new()
            .with(Locator::css(TRACK_ROW), FakeNode::new("marker"))
            .with(Locator::css(PLAYLIST), playlist)
    }

    async fn texts(session: &PoolSession, tracks: &[TrackRef]) -> Vec<String> {
        let mut out = Vec::new();
        for track in tracks {
            let TrackRef::Element(handle) = track else {
                panic!("expected element")
            };
            out.push(session.driver().unwrap().text(*handle).await.unwrap());
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn versions_filtered_in_page_order() {
        let dir = TempDir::new().unwrap();
        let driver = FakeDriver::new("about:blank").page(PAGE, listing());
        let mut session = session_with(&dir, &driver, FixedProbe::plenty(), PageNumbering::PathSegment);
        session.start(PAGE).await.unwrap();

        let mut adapter = BpmSupreme::new();
        let tracks = adapter.get_tracks(&mut session, 0).await.unwrap();

        assert_eq!(
            texts(&session, &tracks).await,
            vec!["Dirty", "Clean", "Intro Dirty", "Acapella"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn max_limits_returned_versions() {
        let dir = TempDir::new().unwrap();
        let driver = FakeDriver::new("about:blank").page(PAGE, listing());
        let mut session = session_with(&dir, &driver, FixedProbe::plenty(), PageNumbering::PathSegment);
        session.start(PAGE).await.unwrap();

        let tracks = BpmSupreme::new().get_tracks(&mut session, 3).await.unwrap();

        assert_eq!(texts(&session, &tracks).await, vec!["Dirty", "Clean", "Intro Dirty"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unloaded_page_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let driver = FakeDriver::new("about:blank");
        let mut session = session_with(&dir, &driver, FixedProbe::plenty(), PageNumbering::PathSegment);
        session.start(PAGE).await.unwrap();

        let tracks = BpmSupreme::new().get_tracks(&mut session, 0).await.unwrap();
        assert!(tracks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rerendered_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        let driver = FakeDriver::new("about:blank")
            .page(PAGE, listing())
            .stale_lookup(Locator::xpath(VERSION));
        let mut session = session_with(&dir, &driver, FixedProbe::plenty(), PageNumbering::PathSegment);
        session.start(PAGE).await.unwrap();

        let tracks = BpmSupreme::new().get_tracks(&mut session, 0).await.unwrap();

        assert!(tracks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn download_script_clicks_version() {
        let dir = TempDir::new().unwrap();
        let driver = FakeDriver::new("about:blank").page(PAGE, listing());
        let mut session = session_with(&dir, &driver, FixedProbe::plenty(), PageNumbering::PathSegment);
        session.start(PAGE).await.unwrap();
        let adapter = {
            let mut adapter = BpmSupreme::new();
            let tracks = adapter.get_tracks(&mut session, 1).await.unwrap();
            adapter.download(&session, &tracks[0]).await.unwrap();
            adapter
        };

        assert_eq!(driver.clicks(), vec!["Dirty"]);
        assert_eq!(adapter.site(), Site::BpmSupreme);
    }

    #[tokio::test]
    async fn prepare_waits_for_operator() {
        let dir = TempDir::new().unwrap();
        let driver = FakeDriver::new("about:blank");
        let mut session = session_with(&dir, &driver, FixedProbe::plenty(), PageNumbering::PathSegment);
        let operator = ScriptedOperator::new(&[""]);

        BpmSupreme::new().prepare(&mut session, &operator).await.unwrap();

        assert_eq!(operator.questions().len(), 1);
    }
}
