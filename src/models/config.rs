//! Application configuration structures.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Retry policy for individual requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Where the dataset and error report are written
    #[serde(default)]
    pub output: OutputConfig,

    /// SMTP settings for notifications
    #[serde(default)]
    pub email: EmailConfig,

    /// Notification recipients and their keyword filters
    #[serde(default)]
    pub recipients: Vec<Recipient>,

    /// Job sources, in registration order
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Sources that take part in a run.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.alternate_user_agent.trim().is_empty() {
            return Err(AppError::validation(
                "crawler.alternate_user_agent is empty",
            ));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.connect_timeout_secs == 0 {
            return Err(AppError::validation(
                "crawler.connect_timeout_secs must be > 0",
            ));
        }
        if self.crawler.max_connections == 0 {
            return Err(AppError::validation("crawler.max_connections must be > 0"));
        }
        if self.crawler.deadline_secs == 0 {
            return Err(AppError::validation("crawler.deadline_secs must be > 0"));
        }
        if !self.crawler.calls_per_second.is_finite() {
            return Err(AppError::validation(
                "crawler.calls_per_second must be a finite number",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(AppError::validation("source with empty name"));
            }
            if !names.insert(source.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            source.validate()?;
        }

        let mut addresses = HashSet::new();
        for recipient in &self.recipients {
            recipient.validate()?;
            if !addresses.insert(recipient.address.to_lowercase()) {
                return Err(AppError::validation(format!(
                    "duplicate recipient '{}'",
                    recipient.address
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            retry: RetryConfig::default(),
            output: OutputConfig::default(),
            email: EmailConfig::default(),
            recipients: Vec::new(),
            sources: defaults::sources(),
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// User-Agent used after a 403 response
    #[serde(default = "defaults::alternate_user_agent")]
    pub alternate_user_agent: String,

    /// Total request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Global request rate across all sources (<= 0 disables throttling)
    #[serde(default = "defaults::calls_per_second")]
    pub calls_per_second: f64,

    /// Maximum simultaneous requests
    #[serde(default = "defaults::max_connections")]
    pub max_connections: usize,

    /// Overall deadline for one crawl in seconds
    #[serde(default = "defaults::deadline")]
    pub deadline_secs: u64,
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            alternate_user_agent: defaults::alternate_user_agent(),
            timeout_secs: defaults::timeout(),
            connect_timeout_secs: defaults::connect_timeout(),
            calls_per_second: defaults::calls_per_second(),
            max_connections: defaults::max_connections(),
            deadline_secs: defaults::deadline(),
        }
    }
}

/// Retry policy for a single fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per fetch, including the first one
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base of the exponential backoff in milliseconds
    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    /// Add random jitter in `[0, base_delay)` to each delay
    #[serde(default = "defaults::enabled")]
    pub jitter: bool,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay(),
            jitter: true,
        }
    }
}

/// Dataset output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write output files at all
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Output directory
    #[serde(default = "defaults::output_dir")]
    pub dir: String,

    /// CSV dataset file name
    #[serde(default = "defaults::csv_file")]
    pub csv_file: String,

    /// JSON source error report file name
    #[serde(default = "defaults::errors_file")]
    pub errors_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: defaults::output_dir(),
            csv_file: defaults::csv_file(),
            errors_file: defaults::errors_file(),
        }
    }
}

/// SMTP settings. Credentials come from `SMTP_USERNAME` / `SMTP_PASSWORD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "defaults::smtp_host")]
    pub smtp_host: String,

    #[serde(default = "defaults::smtp_port")]
    pub smtp_port: u16,

    /// Sender address; defaults to the SMTP username
    #[serde(default)]
    pub from: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: defaults::smtp_host(),
            smtp_port: defaults::smtp_port(),
            from: None,
        }
    }
}

/// A notification recipient and the keywords they are interested in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    pub address: String,
    pub keywords: BTreeSet<String>,
}

impl Recipient {
    pub fn new<I, S>(address: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            address: address.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    fn validate(&self) -> Result<()> {
        let address = self.address.trim();
        if address.is_empty() || !address.contains('@') {
            return Err(AppError::validation(format!(
                "invalid recipient address '{}'",
                self.address
            )));
        }
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(AppError::validation(format!(
                "recipient '{}' has no keywords",
                self.address
            )));
        }
        Ok(())
    }
}

/// One configured job source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source name, used as provenance on records
    pub name: String,

    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(flatten)]
    pub kind: SourceKind,
}

impl SourceConfig {
    fn validate(&self) -> Result<()> {
        match &self.kind {
            SourceKind::Html(html) => {
                if html.url.trim().is_empty() {
                    return Err(AppError::validation(format!(
                        "source '{}': url is empty",
                        self.name
                    )));
                }
                if html.row_selector.trim().is_empty() || html.title_selector.trim().is_empty()
                {
                    return Err(AppError::validation(format!(
                        "source '{}': row_selector and title_selector are required",
                        self.name
                    )));
                }
                if let Some(pages) = &html.pages {
                    if pages.start > pages.end {
                        return Err(AppError::validation(format!(
                            "source '{}': pages.start > pages.end",
                            self.name
                        )));
                    }
                    if !html.url.contains("{page}") {
                        return Err(AppError::validation(format!(
                            "source '{}': pages set but url has no {{page}} placeholder",
                            self.name
                        )));
                    }
                }
            }
            SourceKind::Json(json) => {
                if json.url.trim().is_empty() {
                    return Err(AppError::validation(format!(
                        "source '{}': url is empty",
                        self.name
                    )));
                }
                if json.link_field.is_none() && json.link_template.is_none() {
                    return Err(AppError::validation(format!(
                        "source '{}': link_field or link_template is required",
                        self.name
                    )));
                }
                if json.max_pages == 0 {
                    return Err(AppError::validation(format!(
                        "source '{}': max_pages must be > 0",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Source family and its extraction rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    Html(HtmlSource),
    Json(JsonSource),
}

/// Listing page scraped with CSS selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlSource {
    /// Page URL, may contain a `{page}` placeholder
    pub url: String,

    /// Inclusive page range substituted into `{page}`
    #[serde(default)]
    pub pages: Option<PageRange>,

    /// CSS selector for one listing
    pub row_selector: String,

    /// CSS selector for the title, relative to the row
    pub title_selector: String,

    /// CSS selector for the link element (defaults to the title, then the row)
    #[serde(default)]
    pub link_selector: Option<String>,

    /// HTML attribute for link extraction
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,

    /// Fixed company name
    #[serde(default)]
    pub company: Option<String>,

    /// CSS selector for the company name, relative to the row
    #[serde(default)]
    pub company_selector: Option<String>,

    /// Extra fields: name -> CSS selector relative to the row
    #[serde(default)]
    pub extra_selectors: BTreeMap<String, String>,

    /// Stop paging at the first page without rows
    #[serde(default = "defaults::enabled")]
    pub stop_on_empty: bool,

    #[serde(default = "defaults::enabled")]
    pub verify_tls: bool,

    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Inclusive page range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

/// Paginated JSON API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSource {
    pub url: String,

    /// Query parameter carrying the page number; no paging when unset
    #[serde(default)]
    pub page_param: Option<String>,

    #[serde(default = "defaults::start_page")]
    pub start_page: u32,

    /// Upper bound on requested pages
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,

    /// Dot path to the item array; empty means the root is the array
    #[serde(default)]
    pub items_path: String,

    /// Item field holding the title
    pub title_field: String,

    /// Item field holding the link
    #[serde(default)]
    pub link_field: Option<String>,

    /// Link built from item fields, e.g. `https://x.test/jobs/{id}`
    #[serde(default)]
    pub link_template: Option<String>,

    #[serde(default)]
    pub company: Option<String>,

    #[serde(default)]
    pub company_field: Option<String>,

    /// Static query parameters
    #[serde(default)]
    pub query: BTreeMap<String, String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default = "defaults::enabled")]
    pub verify_tls: bool,
}

mod defaults {
    use std::collections::BTreeMap;

    use super::{HtmlSource, JsonSource, PageRange, SourceConfig, SourceKind};

    pub fn enabled() -> bool {
        true
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
    }
    pub fn alternate_user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn connect_timeout() -> u64 {
        20
    }
    pub fn calls_per_second() -> f64 {
        2.0
    }
    pub fn max_connections() -> usize {
        50
    }
    pub fn deadline() -> u64 {
        300
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn base_delay() -> u64 {
        1000
    }

    // Output defaults
    pub fn output_dir() -> String {
        "output".into()
    }
    pub fn csv_file() -> String {
        "jobs.csv".into()
    }
    pub fn errors_file() -> String {
        "scrape_errors.json".into()
    }

    // Email defaults
    pub fn smtp_host() -> String {
        "smtp.gmail.com".into()
    }
    pub fn smtp_port() -> u16 {
        465
    }

    // Source defaults
    pub fn link_attr() -> String {
        "href".into()
    }
    pub fn start_page() -> u32 {
        1
    }
    pub fn max_pages() -> u32 {
        20
    }

    pub fn sources() -> Vec<SourceConfig> {
        vec![
            SourceConfig {
                name: "azercell".into(),
                enabled: true,
                kind: SourceKind::Html(HtmlSource {
                    url: "https://www.azercell.com/az/about-us/career.html".into(),
                    pages: None,
                    row_selector: "section.section_vacancies a.vacancies__link".into(),
                    title_selector: "h4.vacancies__name".into(),
                    link_selector: None,
                    link_attr: link_attr(),
                    company: Some("Azercell".into()),
                    company_selector: None,
                    extra_selectors: BTreeMap::from([(
                        "location".to_string(),
                        "span.vacancies__location".to_string(),
                    )]),
                    stop_on_empty: true,
                    verify_tls: true,
                    headers: BTreeMap::new(),
                }),
            },
            SourceConfig {
                name: "abb".into(),
                enabled: true,
                kind: SourceKind::Json(JsonSource {
                    url: "https://careers.abb-bank.az/api/vacancy/v2/get".into(),
                    page_param: Some("page".into()),
                    start_page: 0,
                    max_pages: max_pages(),
                    items_path: "data".into(),
                    title_field: "title".into(),
                    link_field: Some("url".into()),
                    link_template: None,
                    company: Some("ABB".into()),
                    company_field: None,
                    query: BTreeMap::new(),
                    headers: BTreeMap::new(),
                    verify_tls: true,
                }),
            },
            SourceConfig {
                name: "hellojob".into(),
                enabled: true,
                kind: SourceKind::Html(HtmlSource {
                    url: "https://www.hellojob.az/vakansiyalar?page={page}".into(),
                    pages: Some(PageRange { start: 1, end: 12 }),
                    row_selector: "a.vacancies__item".into(),
                    title_selector: "h3".into(),
                    link_selector: None,
                    link_attr: link_attr(),
                    company: None,
                    company_selector: Some("p.vacancy_item_company".into()),
                    extra_selectors: BTreeMap::new(),
                    stop_on_empty: false,
                    verify_tls: true,
                    headers: BTreeMap::new(),
                }),
            },
        ]
    }
}
