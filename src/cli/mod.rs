//! Interactive terminal front end for `recordpool`.

mod progress;

use std::sync::Arc;

use async_trait::async_trait;
use console::{Term, style};

use crate::{
    AppConfig, Downloader, Error, Operator, Platform, PoolSession, Result, Site, adapter_for,
    format_bytes, format_ratio, logging,
};

pub use progress::{BarProgress, print_summary};

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Wrong answers tolerated at the site menu before giving up.
const MENU_ATTEMPTS: usize = 5;

/// Operator prompts on stdout, answers from stdin.
#[derive(Debug, Clone)]
pub struct TermOperator {
    term: Term,
}

impl TermOperator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    fn say(&self, line: &str) {
        if let Err(e) = self.term.write_line(line) {
            log::debug!("Writing to terminal failed: {e}");
        }
    }
}

impl Default for TermOperator {
    fn default() -> Self {
        Self::new()
    }
}

fn read_answer() -> std::io::Result<String> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line)
}

#[async_trait]
impl Operator for TermOperator {
    async fn ask(&self, question: &str) -> String {
        self.say(&style(question).bold().to_string());
        // read on a blocking thread so Ctrl-C can still cancel the run
        match tokio::task::spawn_blocking(read_answer).await {
            Ok(Ok(line)) => line.trim().to_string(),
            Ok(Err(e)) => {
                log::debug!("Reading input failed: {e}");
                String::new()
            }
            Err(e) => {
                log::debug!("Input task failed: {e}");
                String::new()
            }
        }
    }

    fn heading(&self, message: &str) {
        self.say(&style(message).bold().to_string());
    }

    fn info(&self, message: &str) {
        self.say(message);
    }

    fn notice(&self, message: &str) {
        self.say(&style(message).yellow().to_string());
    }

    fn alert(&self, message: &str) {
        self.say(&style(message).red().to_string());
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Help,
    /// A site name, a Bandcamp download URL, or nothing to pick from a menu.
    Run(Option<String>),
}

#[must_use]
pub fn parse_args(args: &[String]) -> Invocation {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Invocation::Help;
    }
    Invocation::Run(
        args.iter()
            .map(|a| a.trim())
            .find(|a| !a.is_empty())
            .map(str::to_string),
    )
}

pub fn print_usage() {
    eprintln!("Usage: recordpool [SITE | BANDCAMP_DOWNLOAD_URL]");
    eprintln!();
    eprintln!("Sites:");
    for site in Site::ALL {
        eprintln!("  {site}");
    }
    eprintln!();
    eprintln!("Without an argument a site menu is shown.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RECORDPOOL_CONFIG   Config file (default: <config dir>/recordpool-dl/config.toml)");
    eprintln!("  RECORDPOOL_LOG      Log filter (default: info)");
}

/// Resolves the site to run and, for Bandcamp, the order receipt URL.
///
/// # Errors
///
/// Returns [`Error::UnknownSite`] for an unrecognised name or too many wrong
/// menu answers, and [`Error::Config`] when no Bandcamp URL is given.
pub async fn resolve_target(
    arg: Option<String>,
    operator: &dyn Operator,
) -> Result<(Site, Option<String>)> {
    let site = match arg {
        Some(url) if Site::is_order_url(&url) => return Ok((Site::Bandcamp, Some(url))),
        Some(name) => name.parse::<Site>()?,
        None => choose_site(operator).await?,
    };

    if site != Site::Bandcamp {
        return Ok((site, None));
    }
    let url = operator.ask("Give Bandcamp download URL:").await;
    if url.is_empty() {
        return Err(Error::Config("Bandcamp needs a download URL".to_string()));
    }
    Ok((site, Some(url)))
}

async fn choose_site(operator: &dyn Operator) -> Result<Site> {
    let mut last = String::new();
    for _ in 0..MENU_ATTEMPTS {
        operator.heading("Choose record pool:");
        for (number, site) in Site::ALL.iter().enumerate() {
            operator.info(&format!("{}: {site}", number + 1));
        }
        last = operator.ask("Pool:").await;
        if let Some(site) = last
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| Site::ALL.get(index))
        {
            return Ok(*site);
        }
        operator.alert("Give a valid option...");
    }
    Err(Error::UnknownSite(last))
}

/// Resolves once Ctrl-C is pressed. Never resolves if the handler cannot be
/// installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Could not listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

fn report_error(err: &Error) -> i32 {
    log::error!("{}", logging::error_chain(err));
    eprintln!("{} {err}", style("Error:").red().bold());
    EXIT_ERROR
}

fn report_aborted() -> i32 {
    log::info!("Aborted");
    println!("\n{}", style("Aborted").bold());
    EXIT_INTERRUPTED
}

fn print_banner(session: &PoolSession) {
    println!("\n{}", style(format!("/// {} ///", session.site())).cyan());
    println!(
        "path: {}",
        style(session.download_dir().display()).yellow()
    );
    match session.disk_usage() {
        Ok(usage) => println!(
            "disk: {} ({}) free",
            format_bytes(usage.free),
            format_ratio(usage.free_ratio())
        ),
        Err(e) => log::warn!("Could not measure free space: {e}"),
    }
}

/// Runs the command line tool and returns the process exit code.
pub async fn run(args: Vec<String>) -> i32 {
    let target = match parse_args(&args) {
        Invocation::Help => {
            print_usage();
            return EXIT_OK;
        }
        Invocation::Run(target) => target,
    };

    println!("{}", style("RECORDPOOL DL").cyan().bold());

    let platform = match Platform::current() {
        Ok(platform) => platform,
        Err(e) => return report_error(&e),
    };
    let config_path = AppConfig::default_path();
    let config = match AppConfig::load_or_create(&config_path) {
        Ok(config) => config,
        Err(e) => return report_error(&e),
    };

    let operator = Arc::new(TermOperator::new());
    let resolved = tokio::select! {
        resolved = resolve_target(target, operator.as_ref()) => resolved,
        () = interrupted() => return report_aborted(),
    };
    let (site, order_url) = match resolved {
        Ok(target) => target,
        Err(e) => return report_error(&e),
    };

    match logging::init(&config.paths.log_dir, site) {
        Ok(path) => log::info!("Logging to {}", path.display()),
        Err(e) => eprintln!("Could not open log file: {e}"),
    }
    log::info!("Loaded config from {}", config_path.display());

    let adapter = match adapter_for(site, order_url, &config.download) {
        Ok(adapter) => adapter,
        Err(e) => return report_error(&e),
    };
    let launched = tokio::select! {
        launched = PoolSession::launch(site, &config, adapter.numbering()) => launched,
        () = interrupted() => return report_aborted(),
    };
    let session = match launched {
        Ok(session) => session,
        Err(e) => return report_error(&e),
    };
    print_banner(&session);

    let mut downloader = Downloader::new(
        session,
        adapter,
        operator,
        config.download.clone(),
        platform,
    )
    .with_progress(Arc::new(BarProgress::new()));

    let outcome = tokio::select! {
        result = downloader.run() => Some(result),
        () = interrupted() => None,
    };

    if let Some(summary) = downloader.shutdown().await {
        print_summary(&summary);
    }

    match outcome {
        Some(Ok(())) => EXIT_OK,
        Some(Err(e)) => report_error(&e),
        None => report_aborted(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::scripted::ScriptedOperator;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| (*a).to_string()).collect()
    }

    #[test]
    fn help_flags() {
        assert_eq!(parse_args(&args(&["-h"])), Invocation::Help);
        assert_eq!(parse_args(&args(&["djcity", "--help"])), Invocation::Help);
    }

    #[test]
    fn first_argument_is_target() {
        assert_eq!(parse_args(&args(&[])), Invocation::Run(None));
        assert_eq!(
            parse_args(&args(&[" DJCity "])),
            Invocation::Run(Some("DJCity".to_string()))
        );
    }

    #[tokio::test]
    async fn order_url_selects_bandcamp() {
        let operator = ScriptedOperator::new(&[]);
        let url = "https://bandcamp.com/download?from=receipt&payment_id=1".to_string();

        let target = resolve_target(Some(url.clone()), &operator).await.unwrap();

        assert_eq!(target, (Site::Bandcamp, Some(url)));
        assert!(operator.questions().is_empty());
    }

    #[tokio::test]
    async fn bandcamp_by_name_asks_for_url() {
        let operator = ScriptedOperator::new(&["https://bandcamp.com/download?id=9"]);

        let target = resolve_target(Some("bandcamp".into()), &operator).await.unwrap();

        assert_eq!(
            target,
            (Site::Bandcamp, Some("https://bandcamp.com/download?id=9".to_string()))
        );
    }

    #[tokio::test]
    async fn bandcamp_without_url_fails() {
        let operator = ScriptedOperator::new(&[""]);
        let result = resolve_target(Some("Bandcamp".into()), &operator).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn unknown_name_fails() {
        let operator = ScriptedOperator::new(&[]);
        let result = resolve_target(Some("zipdj".into()), &operator).await;
        assert!(matches!(result, Err(Error::UnknownSite(name)) if name == "zipdj"));
    }

    #[tokio::test]
    async fn menu_retries_until_valid() {
        let operator = ScriptedOperator::new(&["9", "x", "3"]);

        let target = resolve_target(None, &operator).await.unwrap();

        assert_eq!(target, (Site::BpmSupreme, None));
        assert_eq!(operator.questions().len(), 3);
        assert!(operator.said("4: DJCity"));
        assert!(operator.said("Give a valid option..."));
    }

    #[tokio::test]
    async fn menu_gives_up_eventually() {
        let operator = ScriptedOperator::new(&[]);
        let result = resolve_target(None, &operator).await;
        assert!(matches!(result, Err(Error::UnknownSite(_))));
        assert_eq!(operator.questions().len(), MENU_ATTEMPTS);
    }
}
