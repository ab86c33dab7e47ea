use crate::client::{ApiClient, ContentTypeCheck};
use crate::extract::extract_participants;
use crate::models::{PageRequest, ParticipantRecord};
use crate::transport::Transport;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::ops::RangeInclusive;
use tracing::{debug, info};

/// Splits pages `1..=total` into consecutive runs of at most `chunk_size` pages.
pub fn chunk_pages(total: u32, chunk_size: usize) -> Vec<RangeInclusive<u32>> {
    let size = chunk_size.max(1) as u32;
    let mut chunks = Vec::new();
    let mut start = 1u32;
    while start <= total {
        let end = start.saturating_add(size - 1).min(total);
        chunks.push(start..=end);
        if end == u32::MAX {
            break;
        }
        start = end + 1;
    }
    chunks
}

pub struct ParticipantFetcher<'a, T> {
    client: &'a ApiClient<T>,
}

impl<'a, T: Transport> ParticipantFetcher<'a, T> {
    pub fn new(client: &'a ApiClient<T>) -> Self {
        Self { client }
    }

    /// Fetches one page and returns its records. The records belong to this
    /// call alone, so concurrent pages never touch each other's output.
    pub async fn fetch_page(&self, page: u32) -> Vec<ParticipantRecord> {
        let config = self.client.config();
        let request = PageRequest {
            page,
            limit: config.page_limit,
        };
        let payload = match serde_json::to_value(request) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };

        let label = format!("page {page}");
        debug!(page, "Fetching page");
        let body = self
            .client
            .post_json(
                &label,
                &config.endpoints.pages,
                &payload,
                ContentTypeCheck::paginated_api(),
            )
            .await;

        match body {
            Some(body) => {
                let records = extract_participants(&body, &config.participant_base_url);
                self.client.stats().inc_pages_fetched();
                self.client.stats().add_records(records.len() as u64);
                debug!(page, records = records.len(), "Page extracted");
                records
            }
            None => {
                self.client.stats().inc_pages_skipped();
                Vec::new()
            }
        }
    }

    /// Fetches every configured page: chunks one after another, pages within a
    /// chunk concurrently. A chunk is fully joined before the next one starts.
    pub async fn fetch_all(&self) -> Vec<ParticipantRecord> {
        let config = self.client.config();
        let chunks = chunk_pages(config.total_pages, config.chunk_size);
        info!(
            total_pages = config.total_pages,
            chunks = chunks.len(),
            chunk_size = config.chunk_size,
            "Starting paginated fetch"
        );

        let pb = make_progress_bar(config.total_pages as u64);
        let progress = &pb;
        let mut participants = Vec::new();
        for (index, chunk) in chunks.into_iter().enumerate() {
            let (first, last) = (*chunk.start(), *chunk.end());
            let pages = join_all(chunk.map(|page| async move {
                let records = self.fetch_page(page).await;
                progress.inc(1);
                records
            }))
            .await;

            let before = participants.len();
            participants.extend(pages.into_iter().flatten());
            info!(
                chunk = index + 1,
                first_page = first,
                last_page = last,
                records = participants.len() - before,
                "Chunk complete"
            );
        }
        pb.finish_and_clear();

        info!(records = participants.len(), "Paginated fetch complete");
        participants
    }
}

fn make_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::default_bar().template("    {spinner:.cyan} Pages [{bar:30.cyan/blue}] {pos}/{len}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(chunks: &[RangeInclusive<u32>]) -> Vec<usize> {
        chunks.iter().map(|c| c.clone().count()).collect()
    }

    #[test]
    fn chunks_of_250_pages() {
        let chunks = chunk_pages(250, 100);
        assert_eq!(sizes(&chunks), vec![100, 100, 50]);
        assert_eq!(chunks[0], 1..=100);
        assert_eq!(chunks[1], 101..=200);
        assert_eq!(chunks[2], 201..=250);
    }

    #[test]
    fn exact_multiple() {
        assert_eq!(chunk_pages(200, 100), vec![1..=100, 101..=200]);
    }

    #[test]
    fn fewer_pages_than_chunk() {
        assert_eq!(chunk_pages(26, 100), vec![1..=26]);
    }

    #[test]
    fn zero_pages() {
        assert!(chunk_pages(0, 100).is_empty());
    }

    #[test]
    fn chunk_size_one() {
        assert_eq!(chunk_pages(3, 1), vec![1..=1, 2..=2, 3..=3]);
    }

    #[test]
    fn chunks_cover_every_page_once() {
        let pages: Vec<u32> = chunk_pages(1234, 77).into_iter().flatten().collect();
        assert_eq!(pages, (1..=1234).collect::<Vec<_>>());
    }
}
