use crate::client::ApiClient;
use crate::page::{collect_entry_links, FlatRecord, PageParser, PartnerPageParser};
use crate::sink::read_rows;
use crate::transport::Transport;
use anyhow::{bail, Context, Result};
use futures::future::join_all;
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

/// Fetches and parses entry pages in rounds of at most `concurrency` pages;
/// a round is fully joined before the next begins. Pages that could not be
/// fetched are left out and output order follows `urls`.
pub async fn scrape_pages<T: Transport>(
    client: &ApiClient<T>,
    urls: &[String],
    parser: &dyn PageParser,
    concurrency: usize,
) -> Vec<FlatRecord> {
    let mut records = Vec::with_capacity(urls.len());
    for (round, batch) in urls.chunks(concurrency.max(1)).enumerate() {
        let parsed = join_all(batch.iter().map(|url| async move {
            let html = client.get_text(url, url).await?;
            let record = parser.parse(url, &html);
            client.stats().inc_entries_parsed();
            debug!(
                url = %url,
                company = record.get("Company Name").unwrap_or_default(),
                "Parsed entry page"
            );
            Some(record)
        }))
        .await;

        let before = records.len();
        records.extend(parsed.into_iter().flatten());
        info!(
            round = round + 1,
            parsed = records.len() - before,
            requested = batch.len(),
            "Entry round complete"
        );
    }
    records
}

/// Resolves directory hrefs (usually site-relative) against the site root
pub fn resolve_links(base_url: &str, hrefs: &[String]) -> Result<Vec<String>> {
    let base = Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
    let mut urls = Vec::with_capacity(hrefs.len());
    for href in hrefs {
        match base.join(href) {
            Ok(url) => urls.push(url.to_string()),
            Err(e) => warn!(href = %href, error = %e, "Skipping unresolvable entry link"),
        }
    }
    Ok(urls)
}

pub struct DirectoryScraper<'a, T> {
    client: &'a ApiClient<T>,
    concurrency: usize,
}

impl<'a, T: Transport> DirectoryScraper<'a, T> {
    pub fn new(client: &'a ApiClient<T>, concurrency: usize) -> Self {
        Self {
            client,
            concurrency,
        }
    }

    /// Lists the directory at `listing_url`, then scrapes every entry page
    pub async fn scrape(
        &self,
        listing_url: &str,
        base_url: &str,
        parser: &dyn PageParser,
    ) -> Result<Vec<FlatRecord>> {
        let Some(listing) = self.client.get_text("directory listing", listing_url).await else {
            warn!(url = listing_url, "Directory listing unavailable, nothing to scrape");
            return Ok(Vec::new());
        };

        let hrefs = collect_entry_links(&listing);
        let urls = resolve_links(base_url, &hrefs)?;
        info!(entries = urls.len(), "Found directory entries");

        Ok(scrape_pages(self.client, &urls, parser, self.concurrency).await)
    }

    /// Scrapes partner pages listed in `column` of a CSV file. With
    /// `partner_base_url`, each URL is rebuilt from its last path segment.
    pub async fn scrape_urls(
        &self,
        input: &Path,
        column: &str,
        partner_base_url: Option<&str>,
        parser: &dyn PageParser,
    ) -> Result<Vec<FlatRecord>> {
        let urls = read_url_column(input, column)?;
        let urls: Vec<String> = match partner_base_url {
            Some(base) => urls.iter().map(|u| rebase_url(base, u)).collect(),
            None => urls,
        };
        info!(entries = urls.len(), "Loaded partner URLs");
        Ok(scrape_pages(self.client, &urls, parser, self.concurrency).await)
    }
}

/// Non-empty values of one CSV column, in file order
pub fn read_url_column(path: &Path, column: &str) -> Result<Vec<String>> {
    let (headers, rows) = read_rows(path)?;
    if !headers.iter().any(|h| h == column) {
        bail!("Column {column:?} not found in {}", path.display());
    }
    Ok(rows
        .into_iter()
        .filter_map(|mut row| row.remove(column))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect())
}

pub fn rebase_url(base: &str, url: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        PartnerPageParser::slug(url)
    )
}
