//! Per-site log file.

use std::error::Error as StdError;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use env_logger::{Builder, Env, Target};

use crate::error::Result;
use crate::sites::Site;

/// Environment variable overriding the log filter, `info` by default.
pub const LOG_ENV: &str = "RECORDPOOL_LOG";

const TIMESTAMP: &str = "%Y.%m.%d %H:%M:%S";

/// `<dir>/<Site>.log`
#[must_use]
pub fn log_path(dir: &Path, site: Site) -> PathBuf {
    dir.join(format!("{}.log", site.name()))
}

/// Sends all log output to a fresh `<Site>.log` in `dir`, replacing the file
/// of the previous run.
///
/// Returns the log file path. If a logger is already installed it is left
/// in place.
///
/// # Errors
///
/// Returns an error if the directory or the file cannot be created.
pub fn init(dir: &Path, site: Site) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = log_path(dir, site);
    let file = File::create(&path)?;

    let installed = Builder::from_env(Env::default().filter_or(LOG_ENV, "info"))
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format(TIMESTAMP),
                record.level(),
                record.args()
            )
        })
        .try_init();
    if installed.is_err() {
        log::debug!("Logger already initialised, keeping it");
    }
    Ok(path)
}

/// The error followed by each of its sources, one per line.
#[must_use]
pub fn error_chain(error: &dyn StdError) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[test]
    fn log_file_named_after_site() {
        let path = log_path(Path::new("/var/log/pools"), Site::DjCity);
        assert_eq!(path, PathBuf::from("/var/log/pools/DJCity.log"));
    }

    #[test]
    fn init_truncates_previous_log() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("logs");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(log_path(&nested, Site::Beatjunkies), "old run\n").unwrap();

        let path = init(&nested, Site::Beatjunkies).unwrap();

        assert_eq!(path, nested.join("Beatjunkies.log"));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("old run"));
    }

    #[test]
    fn chain_lists_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::from(io);
        let text = error_chain(&err);
        assert_eq!(text, "I/O error: denied\n  caused by: denied");
    }
}
