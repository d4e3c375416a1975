//! Browser automation abstraction.
//!
//! Site adapters talk to the browser only through [`Driver`], so they can be
//! exercised against an in-memory page in tests. Elements are exposed as
//! [`ElementHandle`]s, which are scoped to the page they were found on: any
//! navigation invalidates them and later use reports [`Error::StaleElement`].

mod webdriver;

#[cfg(test)]
pub(crate) mod fake;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

pub use webdriver::{ChromeLaunch, WebDriver};

/// Interval between polls while waiting for an element.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How to find elements on a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
    LinkText(String),
    Id(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    pub fn link_text(text: impl Into<String>) -> Self {
        Self::LinkText(text.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Matches elements carrying all of the space-separated classes.
    #[must_use]
    pub fn class(names: &str) -> Self {
        let selector: String = names.split_whitespace().map(|c| format!(".{c}")).collect();
        Self::Css(selector)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css `{s}`"),
            Self::XPath(s) => write!(f, "xpath `{s}`"),
            Self::LinkText(s) => write!(f, "link `{s}`"),
            Self::Id(s) => write!(f, "id `{s}`"),
        }
    }
}

/// Opaque reference to an element on the currently loaded page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub(crate) u64);

/// Rendering state used by waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementState {
    pub displayed: bool,
    pub enabled: bool,
}

/// What a wait requires of the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Present,
    Visible,
    Clickable,
}

impl Condition {
    #[must_use]
    pub const fn is_met(self, state: ElementState) -> bool {
        match self {
            Self::Present => true,
            Self::Visible => state.displayed,
            Self::Clickable => state.displayed && state.enabled,
        }
    }
}

/// A browser session that can navigate, query and click.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigates to `url` and waits for the page load.
    async fn goto(&self, url: &str) -> Result<()>;

    /// The URL the browser is actually showing.
    async fn current_url(&self) -> Result<String>;

    /// All elements matching `locator`, in document order, below `scope`
    /// or in the whole page.
    async fn find_all(
        &self,
        scope: Option<ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>>;

    async fn state(&self, element: ElementHandle) -> Result<ElementState>;

    /// Visible text of the element.
    async fn text(&self, element: ElementHandle) -> Result<String>;

    async fn attr(&self, element: ElementHandle, name: &str) -> Result<Option<String>>;

    /// Native click, subject to the browser's interactability checks.
    async fn click(&self, element: ElementHandle) -> Result<()>;

    /// Clicks from JavaScript, which works on obstructed elements.
    async fn script_click(&self, element: ElementHandle) -> Result<()>;

    async fn set_implicit_wait(&self, wait: Duration) -> Result<()>;

    /// Ends the browser session.
    async fn quit(&self) -> Result<()>;

    /// Forgets handles the caller will not use again.
    fn release(&self, _handles: &[ElementHandle]) {}

    /// First element matching `locator`.
    async fn find(&self, scope: Option<ElementHandle>, locator: &Locator) -> Result<ElementHandle> {
        self.find_all(scope, locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoSuchElement(locator.to_string()))
    }

    /// Polls until an element matching `locator` satisfies `condition`.
    ///
    /// Transient lookup failures count as "not yet". Returns
    /// [`Error::Timeout`] once `timeout` has elapsed.
    async fn wait_for(
        &self,
        scope: Option<ElementHandle>,
        locator: &Locator,
        condition: Condition,
        timeout: Duration,
    ) -> Result<ElementHandle> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.find_all(scope, locator).await {
                Ok(found) => {
                    for (index, &element) in found.iter().enumerate() {
                        match self.state(element).await {
                            Ok(state) if condition.is_met(state) => {
                                self.release(&found[..index]);
                                self.release(&found[index + 1..]);
                                return Ok(element);
                            }
                            Ok(_) => {}
                            Err(e) if e.is_transient() => {}
                            Err(e) => {
                                self.release(&found);
                                return Err(e);
                            }
                        }
                    }
                    self.release(&found);
                }
                Err(e) if e.is_transient() => {}
                Err(e) => return Err(e),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Timeout(locator.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
