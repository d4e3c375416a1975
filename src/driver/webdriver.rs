//! [`Driver`] implementation backed by a WebDriver server (chromedriver).

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::{CmdError, ErrorStatus, NewSessionError};
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use serde_json::{Map, Value, json};
use tokio::process::{Child, Command};

use super::{Driver, ElementHandle, ElementState, Locator};
use crate::error::{Error, Result};

/// Time given to a freshly spawned chromedriver before connecting.
const CHROMEDRIVER_STARTUP: Duration = Duration::from_millis(1000);

/// Everything needed to start Chrome with a persistent profile.
#[derive(Debug, Clone)]
pub struct ChromeLaunch {
    pub webdriver_url: String,
    /// Spawned before connecting when set.
    pub chromedriver: Option<PathBuf>,
    pub user_data_dir: PathBuf,
    pub profile_directory: String,
    pub download_dir: PathBuf,
}

impl ChromeLaunch {
    /// W3C capabilities: reuse the profile, save downloads without prompting.
    #[must_use]
    pub fn capabilities(&self) -> Map<String, Value> {
        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({
                "args": [
                    format!("user-data-dir={}", self.user_data_dir.display()),
                    format!("profile-directory={}", self.profile_directory),
                    "disable-infobars",
                ],
                "prefs": {
                    "download.default_directory": self.download_dir.display().to_string(),
                    "download.prompt_for_download": false,
                    "download.directory_upgrade": true,
                    "safebrowsing.enabled": true,
                },
            }),
        );
        caps
    }
}

/// A live Chrome session.
pub struct WebDriver {
    client: Client,
    elements: Mutex<HashMap<u64, Element>>,
    next_handle: AtomicU64,
    /// URL the registered elements were found on.
    page: Mutex<String>,
    chromedriver: Mutex<Option<Child>>,
}

impl WebDriver {
    /// Starts chromedriver if configured and opens a browser session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BrowserRunning`] when Chrome refuses the profile because
    /// it is already in use, [`Error::WebDriverSession`] for other failures.
    pub async fn launch(launch: &ChromeLaunch) -> Result<Self> {
        let chromedriver = match &launch.chromedriver {
            Some(path) => {
                let mut command = Command::new(path);
                if let Some(port) = port_of(&launch.webdriver_url) {
                    command.arg(format!("--port={port}"));
                }
                let child = command
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()?;
                log::info!("Started {}", path.display());
                tokio::time::sleep(CHROMEDRIVER_STARTUP).await;
                Some(child)
            }
            None => None,
        };

        let client = ClientBuilder::native()
            .capabilities(launch.capabilities())
            .connect(&launch.webdriver_url)
            .await
            .map_err(session_error)?;

        Ok(Self {
            client,
            elements: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            page: Mutex::new(String::new()),
            chromedriver: Mutex::new(chromedriver),
        })
    }

    fn register(&self, element: Element) -> ElementHandle {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.elements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, element);
        ElementHandle(id)
    }

    fn element(&self, handle: ElementHandle) -> Result<Element> {
        self.elements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle.0)
            .cloned()
            .ok_or(Error::StaleElement)
    }

    fn forget_elements(&self) {
        self.elements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Drops the registry when the browser has moved to another page, which
    /// also catches navigations started by clicks.
    fn observe_page(&self, url: &str) {
        let mut page = self.page.lock().unwrap_or_else(PoisonError::into_inner);
        if *page != url {
            url.clone_into(&mut *page);
            drop(page);
            self.forget_elements();
        }
    }
}

#[async_trait]
impl Driver for WebDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        self.forget_elements();
        self.client.goto(url).await.map_err(|e| classify(e, url))?;
        // records where the browser landed
        self.current_url().await.map(|_| ())
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .client
            .current_url()
            .await
            .map_err(|e| classify(e, "current url"))?
            .to_string();
        self.observe_page(&url);
        Ok(url)
    }

    async fn find_all(
        &self,
        scope: Option<ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>> {
        let query = to_fantoccini(locator);
        let found = match scope {
            Some(handle) => self.element(handle)?.find_all(query).await,
            None => self.client.find_all(query).await,
        };
        let found = match found {
            Ok(found) => found,
            Err(e) if e.is_no_such_element() => Vec::new(),
            Err(e) => return Err(classify(e, &locator.to_string())),
        };
        Ok(found.into_iter().map(|el| self.register(el)).collect())
    }

    fn release(&self, handles: &[ElementHandle]) {
        let mut elements = self.elements.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in handles {
            elements.remove(&handle.0);
        }
    }

    async fn state(&self, element: ElementHandle) -> Result<ElementState> {
        let el = self.element(element)?;
        let displayed = el.is_displayed().await.map_err(|e| classify(e, "element"))?;
        let enabled = el.is_enabled().await.map_err(|e| classify(e, "element"))?;
        Ok(ElementState { displayed, enabled })
    }

    async fn text(&self, element: ElementHandle) -> Result<String> {
        self.element(element)?
            .text()
            .await
            .map_err(|e| classify(e, "element text"))
    }

    async fn attr(&self, element: ElementHandle, name: &str) -> Result<Option<String>> {
        self.element(element)?
            .attr(name)
            .await
            .map_err(|e| classify(e, name))
    }

    async fn click(&self, element: ElementHandle) -> Result<()> {
        self.element(element)?
            .click()
            .await
            .map_err(|e| classify(e, "click"))
    }

    async fn script_click(&self, element: ElementHandle) -> Result<()> {
        let el = self.element(element)?;
        self.client
            .execute("arguments[0].click();", vec![serde_json::to_value(&el)?])
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "script click"))
    }

    async fn set_implicit_wait(&self, wait: Duration) -> Result<()> {
        self.client
            .update_timeouts(TimeoutConfiguration::new(None, None, Some(wait)))
            .await
            .map_err(|e| classify(e, "implicit wait"))
    }

    async fn quit(&self) -> Result<()> {
        self.forget_elements();
        let closed = self
            .client
            .clone()
            .close()
            .await
            .map_err(|e| classify(e, "close"));
        let child = self
            .chromedriver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut child) = child {
            if let Err(e) = child.start_kill() {
                log::debug!("Could not stop chromedriver: {e}");
            }
        }
        closed
    }
}

fn to_fantoccini(locator: &Locator) -> fantoccini::Locator<'_> {
    match locator {
        Locator::Css(s) => fantoccini::Locator::Css(s),
        Locator::XPath(s) => fantoccini::Locator::XPath(s),
        Locator::LinkText(s) => fantoccini::Locator::LinkText(s),
        Locator::Id(s) => fantoccini::Locator::Id(s),
    }
}

/// Maps WebDriver command failures onto the crate's page-level error kinds.
fn classify(err: CmdError, what: &str) -> Error {
    if err.is_no_such_element() {
        return Error::NoSuchElement(what.to_string());
    }
    match &err {
        CmdError::WaitTimeout => Error::Timeout(what.to_string()),
        CmdError::Standard(wd) => match wd.error {
            ErrorStatus::StaleElementReference => Error::StaleElement,
            ErrorStatus::ElementClickIntercepted => Error::ClickIntercepted,
            ErrorStatus::ElementNotInteractable => Error::NotInteractable,
            ErrorStatus::Timeout => Error::Timeout(what.to_string()),
            _ => Error::WebDriver(err.to_string()),
        },
        _ => Error::WebDriver(err.to_string()),
    }
}

fn session_error(err: NewSessionError) -> Error {
    let message = err.to_string();
    if profile_in_use(&message) {
        Error::BrowserRunning
    } else {
        Error::WebDriverSession(message)
    }
}

/// Chrome's complaints when another instance owns the user data directory.
fn profile_in_use(message: &str) -> bool {
    const MARKERS: [&str; 3] = [
        "user data directory is already in use",
        "DevToolsActivePort file doesn't exist",
        "Chrome failed to start: exited normally",
    ];
    MARKERS.iter().any(|m| message.contains(m))
}

/// Port of a `http://host:port/...` URL.
fn port_of(url: &str) -> Option<u16> {
    let authority = url.split("://").nth(1)?.split('/').next()?;
    authority.rsplit_once(':')?.1.parse().ok()
}
