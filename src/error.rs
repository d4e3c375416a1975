//! Error types for the recordpool-dl library.

use thiserror::Error;

/// Errors that can occur while driving a record pool session.
#[derive(Error, Debug)]
pub enum Error {
    /// The host operating system has no known browser/profile layout.
    #[error("Unsupported OS: '{0}'")]
    UnsupportedOs(String),

    /// Chrome refused the persistent profile because another instance holds it.
    #[error("Chrome already running. Close Chrome and try again...")]
    BrowserRunning,

    /// Not enough free space left in the download directory.
    #[error("Disk is full! {free_mb} MB free, at least {threshold_mb} MB required")]
    DiskFull {
        /// Free space at the download path in megabytes.
        free_mb: u64,
        /// Configured minimum in megabytes.
        threshold_mb: u64,
    },

    /// Creating the WebDriver session failed.
    #[error("Could not start browser session: {0}")]
    WebDriverSession(String),

    /// A WebDriver command failed in a way we don't classify.
    #[error("WebDriver error: {0}")]
    WebDriver(String),

    /// The element reference no longer belongs to the rendered page.
    #[error("Stale element reference")]
    StaleElement,

    /// Another element would receive the click.
    #[error("Element click intercepted")]
    ClickIntercepted,

    /// The element exists but cannot be interacted with.
    #[error("Element not interactable")]
    NotInteractable,

    /// No element matched the locator.
    #[error("No such element: {0}")]
    NoSuchElement(String),

    /// A bounded wait elapsed.
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// The browser session was already shut down.
    #[error("Browser session is closed")]
    SessionClosed,

    /// Site name not recognised.
    #[error("Unsupported record pool: {0}")]
    UnknownSite(String),

    /// Configuration could not be loaded or saved.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while building WebDriver capabilities or script arguments.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true for page-level conditions that adapters absorb instead of
    /// propagating: the DOM moved under us, or a control was not usable.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StaleElement
                | Self::ClickIntercepted
                | Self::NotInteractable
                | Self::NoSuchElement(_)
                | Self::Timeout(_)
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// A specialized `Result` type for recordpool-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
