use anyhow::{ensure, Result};
use std::time::Duration;

/// Pages fetched concurrently before the next chunk may start
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Attempts per logical request before it is skipped
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Base unit for exponential backoff (wait = unit * 2^attempt)
pub const DEFAULT_BACKOFF_UNIT_SECS: u64 = 1;

/// Participants requested per page
pub const DEFAULT_PAGE_LIMIT: u32 = 60;

/// Number of pages the participant listing spans
pub const DEFAULT_TOTAL_PAGES: u32 = 26;

/// Concurrent entry-page fetches when scraping HTML directories
pub const DEFAULT_PAGE_CONCURRENCY: usize = 8;

/// The paginated API answers with exactly this content type; anything else is discarded
pub const EXPECTED_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

pub const USER_AGENT: &str = concat!("harvester/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_PARTICIPANTS_FILE: &str = "participants.csv";
pub const DEFAULT_UPDATED_FILE: &str = "participants_updated.csv";
pub const DEFAULT_EXHIBITORS_FILE: &str = "exhibitors_info.csv";
pub const DEFAULT_PARTNERS_FILE: &str = "company_info.csv";

/// Columns written by `fetch`, in order
pub const PARTICIPANT_COLUMNS: [&str; 7] = [
    "Delegate ID",
    "Participant URL",
    "First Name",
    "Last Name",
    "Company Name",
    "Company Website",
    "Position",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            unit: Duration::from_secs(DEFAULT_BACKOFF_UNIT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub session_id: String,
    pub token: String,
}

impl Credentials {
    pub fn cookie_header(&self) -> String {
        format!("PHPSESSID={}; token={}", self.session_id, self.token)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    pub pages: String,
    pub info: String,
    pub interests: String,
    pub activities: String,
}

/// Everything a run needs, collected once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoints: Endpoints,
    /// Joined with a delegate id to form the participant detail URL
    pub participant_base_url: String,
    pub credentials: Option<Credentials>,
    pub auth: bool,
    pub page_limit: u32,
    pub total_pages: u32,
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    pub request_timeout: Option<Duration>,
    /// `None` enriches every record at once
    pub enrich_concurrency: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            participant_base_url: String::new(),
            credentials: None,
            auth: false,
            page_limit: DEFAULT_PAGE_LIMIT,
            total_pages: DEFAULT_TOTAL_PAGES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            request_timeout: None,
            enrich_concurrency: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.chunk_size > 0, "chunk size must be at least 1");
        ensure!(self.retry.max_retries > 0, "max retries must be at least 1");
        ensure!(self.page_limit > 0, "page limit must be at least 1");
        if let Some(cap) = self.enrich_concurrency {
            ensure!(cap > 0, "enrichment concurrency cap must be at least 1");
        }
        if self.auth {
            match &self.credentials {
                Some(c) if !c.session_id.is_empty() && !c.token.is_empty() => {}
                _ => anyhow::bail!("auth is enabled but PHPSESSID and TOKEN are not both set"),
            }
        }
        Ok(())
    }

    /// Cookie header to attach, if authentication is switched on
    pub fn auth_cookie(&self) -> Option<String> {
        if self.auth {
            self.credentials.as_ref().map(Credentials::cookie_header)
        } else {
            None
        }
    }
}
