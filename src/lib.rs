//! Harvester: concurrent, retrying extraction of event data into CSV
//!
//! The crate drives three pipelines against an event platform:
//!
//! 1. **Fetch** -- Walk the paginated participant API in fixed-size chunks of
//!    concurrent page requests and write one CSV row per participant
//! 2. **Update** -- Read a participant CSV back, look up profile info, interests
//!    and activities for every record concurrently, and write an enriched CSV
//! 3. **Directory scraping** -- Collect entry links from an HTML exhibitor
//!    directory (or a CSV list of partner pages), parse each page into a flat
//!    record, and write the results
//!
//! # Architecture
//!
//! - **Bounded rounds** -- Pages are fetched chunk by chunk; a chunk is fully
//!   joined before the next one starts
//! - **Retry with backoff** -- Transient transport failures are retried with
//!   exponentially growing waits; everything else skips the request
//! - **Disjoint ownership** -- Concurrent page fetches return their own records
//!   and enrichment sources write disjoint columns, so nothing is shared mutably
//! - **Transport seam** -- All HTTP goes through [`transport::Transport`], which
//!   tests replace with scripted responses
//! - **Atomic statistics** -- Lock-free counters for pages, records and retries
//!
//! # Key Modules
//!
//! - [`config`] -- Run configuration and defaults
//! - [`error`] -- Request failure classification
//! - [`transport`] -- HTTP seam and the reqwest implementation
//! - [`retry`] -- Exponential backoff retrier
//! - [`client`] -- Transport plus retrier plus response validation
//! - [`fetch`] -- Chunked paginated participant fetch
//! - [`extract`] -- Page payload to participant records
//! - [`enrich`] -- Per-participant detail lookups
//! - [`page`] -- HTML entry page parsers
//! - [`exhibitors`] -- Directory and partner page scraping
//! - [`sink`] -- CSV output and input
//! - [`models`] -- Participant and enrichment types
//! - [`stats`] -- Thread-safe atomic counters
//!
//! # Example Usage
//!
//! ```bash
//! # Fetch all participant pages and append them to participants.csv
//! harvester fetch --base-url https://api.example/participants --total-pages 26
//!
//! # Enrich an existing participant file
//! harvester update -i participants.csv --auth
//!
//! # Scrape an exhibitor directory
//! harvester exhibitors --listing-url https://show.example/exhibitors --site-url https://show.example
//! ```

pub mod client;
pub mod config;
pub mod enrich;
pub mod error;
pub mod exhibitors;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod page;
pub mod retry;
pub mod sink;
pub mod stats;
pub mod transport;
