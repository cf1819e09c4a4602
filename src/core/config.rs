use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// Crawl policy constants
// ---------------------------------------------------------------------------

/// Hard ceiling on concurrent per-URL workers. The adaptive scheduler tunes
/// itself inside `[1, MAX_CONCURRENT_REQUESTS]`.
pub const MAX_CONCURRENT_REQUESTS: usize = 5;

/// Base total timeout for a page fetch, in seconds. Scaled at runtime by the
/// scheduler's timeout factor.
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Timeout for a robots.txt probe, in seconds.
pub const ROBOTS_TIMEOUT_SECS: u64 = 3;

/// A page with more `<script>` tags than this and too little static text is
/// escalated to the headless render fallback.
pub const JS_RENDER_THRESHOLD: usize = 3;

/// Minimum visible-text length for a page to be worth indexing.
pub const MIN_CONTENT_LENGTH: usize = 50;

/// A URL whose error_count reaches this value is no longer claimable.
pub const MAX_ERROR_COUNT: i64 = 3;

/// Daily attempt cap per non-whitelisted domain.
pub const DOMAIN_LIMIT: i64 = 50;

/// Seconds after which an already-visited URL on a priority domain becomes
/// re-eligible for claiming.
pub const PRIORITY_INTERVAL_SECS: i64 = 48 * 3600;

/// Stored page text is truncated to this many characters.
pub const PAGE_CONTENT_MAX_CHARS: usize = 5000;

/// Browser-like request headers sent with every page fetch.
pub const ACCEPT_HEADER: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
pub const ACCEPT_LANGUAGE_HEADER: &str = "en-US,en;q=0.5";
pub const REFERER_HEADER: &str = "https://www.google.com/";

/// Desktop and mobile user agents rotated across fetches.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/116.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36 Edg/117.0.2045.60",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1",
];

/// Keywords whose repeated occurrence marks a page as spam.
pub const SPAM_KEYWORDS: &[&str] = &["xxx", "viagra", "casino", "porn", "adult"];

/// Binary/asset extensions that are never worth fetching.
pub static SKIP_EXTENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(jpg|jpeg|png|gif|pdf|zip|rar|exe|mp4|mp3|avi|wmv|svg|css|js|woff2?|ico)$")
        .expect("asset extension pattern is valid")
});

// ---------------------------------------------------------------------------
// Environment-sourced settings
// ---------------------------------------------------------------------------

pub const ENV_MYSQL_HOST: &str = "MYSQL_HOST";
pub const ENV_MYSQL_PORT: &str = "MYSQL_PORT";
pub const ENV_MYSQL_USER: &str = "MYSQL_USER";
pub const ENV_MYSQL_PASSWORD: &str = "MYSQL_PASSWORD";
pub const ENV_MYSQL_DATABASE: &str = "MYSQL_DATABASE";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Queue-store (MySQL) connection settings, resolved from the environment.
#[derive(Clone, Debug)]
pub struct MysqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl MysqlSettings {
    pub fn from_env() -> Self {
        Self {
            host: env_or(ENV_MYSQL_HOST, "127.0.0.1"),
            port: env_or(ENV_MYSQL_PORT, "3306").parse().unwrap_or(3306),
            user: env_or(ENV_MYSQL_USER, "webpatrol"),
            password: std::env::var(ENV_MYSQL_PASSWORD).unwrap_or_default(),
            database: env_or(ENV_MYSQL_DATABASE, "webpatrol"),
        }
    }

    /// Connection URL for the sqlx MySQL driver. The password is never logged.
    pub fn connect_url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

// ---------------------------------------------------------------------------
// CrawlerConfig: the explicit dependency handed to stores and workers
// ---------------------------------------------------------------------------

/// Runtime crawl configuration. Constants above are policy; this struct holds
/// the parts that differ per deployment (paths, seeds, domain sets) so tests
/// can substitute their own.
#[derive(Clone, Debug)]
pub struct CrawlerConfig {
    pub mysql: MysqlSettings,
    pub data_dir: PathBuf,
    /// Domains whose visited URLs are periodically re-crawled.
    pub priority_domains: Vec<String>,
    /// Domain suffixes exempt from the daily attempt cap.
    pub whitelisted_domains: Vec<String>,
    /// URLs inserted on first startup against an empty queue.
    pub seed_urls: Vec<String>,
}

impl CrawlerConfig {
    pub fn from_env() -> Self {
        Self {
            mysql: MysqlSettings::from_env(),
            data_dir: PathBuf::from("data"),
            priority_domains: vec!["haberler.com".to_string()],
            whitelisted_domains: vec![
                "gov.tr".to_string(),
                "edu.tr".to_string(),
                "tbb.org.tr".to_string(),
                "gov".to_string(),
                "edu".to_string(),
            ],
            seed_urls: vec!["https://www.shiftdelete.net/".to_string()],
        }
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("webpatrol_pages.db")
    }

    pub fn log_dir(&self) -> &Path {
        &self.data_dir
    }

    /// A domain is whitelisted when it ends in any configured suffix.
    pub fn is_whitelisted(&self, domain: &str) -> bool {
        self.whitelisted_domains
            .iter()
            .any(|suffix| domain.ends_with(suffix.as_str()))
    }
}
