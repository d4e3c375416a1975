//! Configuration resolved once at startup and passed to the session.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::platform::Platform;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "RECORDPOOL_CONFIG";

/// Download behaviour shared by every site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Downloads are refused when free space is at or below this many megabytes.
    pub min_free_mb: u64,
    /// Pause after a page's downloads were triggered, in milliseconds.
    pub settle_ms: u64,
    /// Lowest rating submitted on review-gated sites.
    pub rating_min: u8,
    /// Highest rating submitted on review-gated sites.
    pub rating_max: u8,
    /// How long to wait for an order item to finish preparing its download.
    pub order_link_timeout_secs: u64,
    /// Whether to play a chime after a page completes.
    pub chime: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            min_free_mb: 1024,
            settle_ms: 2000,
            rating_min: 3,
            rating_max: 5,
            order_link_timeout_secs: 600,
            chime: true,
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pause after each page.
    #[must_use]
    pub const fn with_settle_ms(mut self, ms: u64) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Enables or disables the completion chime.
    #[must_use]
    pub const fn with_chime(mut self, chime: bool) -> Self {
        self.chime = chime;
        self
    }

    /// Ratings to submit, with the bounds put in order if the file has them
    /// reversed.
    #[must_use]
    pub fn rating_range(&self) -> RangeInclusive<u8> {
        self.rating_min.min(self.rating_max)..=self.rating_max.max(self.rating_min)
    }

    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    #[must_use]
    pub const fn order_link_timeout(&self) -> Duration {
        Duration::from_secs(self.order_link_timeout_secs)
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint, usually a running `chromedriver`.
    pub webdriver_url: String,
    /// Optional `chromedriver` executable to spawn before connecting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chromedriver: Option<PathBuf>,
    /// Implicit wait applied to element lookups, in milliseconds.
    pub implicit_wait_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            chromedriver: None,
            implicit_wait_ms: 500,
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Root directory; each site downloads into its own folder below it.
    pub download_root: PathBuf,
    /// Existing Chrome user data directory with the logged-in sessions.
    pub chrome_profile: PathBuf,
    /// Profile inside `chrome_profile`.
    pub profile_directory: String,
    /// Directory for the per-site log files.
    pub log_dir: PathBuf,
}

impl PathConfig {
    /// Default locations for the given platform.
    #[must_use]
    pub fn for_platform(platform: Platform) -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let chrome_profile = match platform {
            Platform::MacOs => home.join("Library/Application Support/Google/Chrome"),
            Platform::Windows => dirs::data_local_dir()
                .unwrap_or_else(|| home.join("AppData").join("Local"))
                .join("Google")
                .join("Chrome")
                .join("User Data"),
            Platform::Linux => dirs::config_dir()
                .unwrap_or_else(|| home.join(".config"))
                .join("google-chrome"),
        };
        let log_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recordpool-dl");

        Self {
            download_root: home.join("Dropbox").join("DJ MUSIC SORT"),
            chrome_profile,
            profile_directory: "Default".to_string(),
            log_dir,
        }
    }

    /// Download directory for one site.
    #[must_use]
    pub fn site_dir(&self, folder: &str) -> PathBuf {
        expand_home(&self.download_root).join(folder)
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self::for_platform(Platform::current().unwrap_or(Platform::Linux))
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location: `$RECORDPOOL_CONFIG`, else the user config directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV).map_or_else(
            || {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("recordpool-dl")
                    .join("config.toml")
            },
            PathBuf::from,
        )
    }

    /// Parses a TOML document; missing sections fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the document is malformed.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Loads the config at `path`, writing a default file first if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, written or parsed.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config = Self::from_toml(&contents)?;
            log::info!("Loaded config from {}", path.display());
            return Ok(config);
        }

        let config = Self::default();
        config.save(path)?;
        log::info!("Wrote default config to {}", path.display());
        Ok(config)
    }

    /// Writes the config as TOML, replacing the file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or any file operation fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, toml::to_string_pretty(self)?)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// Expands a leading `~` to the home directory.
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_download_config() {
        let config = DownloadConfig::default();
        assert_eq!(config.min_free_mb, 1024);
        assert_eq!(config.rating_min, 3);
        assert_eq!(config.rating_max, 5);
        assert_eq!(config.order_link_timeout(), Duration::from_secs(600));
        assert!(config.chime);
    }

    #[test]
    fn download_config_builder_pattern() {
        let config = DownloadConfig::new().with_settle_ms(0).with_chime(false);

        assert_eq!(config.settle(), Duration::ZERO);
        assert!(!config.chime);
    }

    #[test]
    fn reversed_rating_bounds_are_ordered() {
        let config = DownloadConfig {
            rating_min: 5,
            rating_max: 4,
            ..DownloadConfig::default()
        };
        assert_eq!(config.rating_range(), 4..=5);
        assert_eq!(DownloadConfig::default().rating_range(), 3..=5);
    }

    #[test]
    fn mac_profile_lives_in_application_support() {
        let paths = PathConfig::for_platform(Platform::MacOs);
        assert!(paths.chrome_profile.ends_with("Library/Application Support/Google/Chrome"));
        assert_eq!(paths.profile_directory, "Default");
    }

    #[test]
    fn windows_profile_is_user_data() {
        let paths = PathConfig::for_platform(Platform::Windows);
        assert!(paths.chrome_profile.ends_with("User Data"));
    }

    #[test]
    fn site_dir_is_below_root() {
        let paths = PathConfig {
            download_root: PathBuf::from("/music"),
            ..PathConfig::for_platform(Platform::Linux)
        };
        assert_eq!(paths.site_dir("DJCITY"), PathBuf::from("/music/DJCITY"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [download]
            min_free_mb = 2048
            "#,
        )
        .unwrap();
        assert_eq!(config.download.min_free_mb, 2048);
        assert_eq!(config.download.rating_max, 5);
        assert_eq!(config.browser.webdriver_url, "http://localhost:9515");
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = AppConfig::from_toml("[download\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn load_or_create_writes_template_then_reads_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");

        let created = AppConfig::load_or_create(&path).unwrap();
        assert!(path.exists());

        let loaded = AppConfig::load_or_create(&path).unwrap();
        assert_eq!(loaded.download.min_free_mb, created.download.min_free_mb);
        assert_eq!(loaded.paths.download_root, created.paths.download_root);
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home(Path::new("/tmp/x")), PathBuf::from("/tmp/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/Music")), home.join("Music"));
        }
    }
}
