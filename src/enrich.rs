//! Per-participant detail lookups.
//!
//! Each participant gets three independent requests (profile info, interests,
//! activities). Every source owns a disjoint set of output columns, which is
//! what lets the three lookups for one record run concurrently and merge
//! without synchronization. [`Enricher::new`] refuses overlapping sources.

use crate::client::{ApiClient, ContentTypeCheck};
use crate::config::Config;
use crate::models::{Enrichment, EnrichmentColumn, ParticipantRecord};
use crate::transport::Transport;
use anyhow::{bail, Result};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Layout of a detail endpoint's response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{data: [{title, values: [..]}]}`; each recognised title fills its column
    TitledValues,
    /// `{data: {list: [{name}]}}`; all names joined into every mapped column
    NamedList,
}

/// Source label to output column, validated against the closed column set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    entries: Vec<(String, EnrichmentColumn)>,
}

impl LabelMap {
    pub fn new(pairs: &[(&str, EnrichmentColumn)]) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(label, column)| (label.to_string(), *column))
                .collect(),
        }
    }

    pub fn column_for(&self, label: &str) -> Option<EnrichmentColumn> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, c)| *c)
    }

    pub fn columns(&self) -> BTreeSet<EnrichmentColumn> {
        self.entries.iter().map(|(_, c)| *c).collect()
    }
}

#[derive(Debug, Clone)]
pub struct EnrichmentSource {
    pub name: &'static str,
    pub url: String,
    pub shape: ResponseShape,
    pub labels: LabelMap,
}

impl EnrichmentSource {
    /// Maps a raw response onto this source's columns. Every mapped column is
    /// present in the result, empty when the response carried nothing for it.
    pub fn map_response(&self, data: &Value) -> Enrichment {
        let mut result = Enrichment::new();
        for column in self.labels.columns() {
            result.set(column, String::new());
        }

        match self.shape {
            ResponseShape::TitledValues => {
                let items = data.get("data").and_then(Value::as_array);
                for item in items.into_iter().flatten() {
                    let Some(title) = item.get("title").and_then(Value::as_str) else {
                        continue;
                    };
                    if let Some(column) = self.labels.column_for(title) {
                        result.set(column, join_values(item.get("values")));
                    }
                }
            }
            ResponseShape::NamedList => {
                let names: Vec<&str> = data
                    .get("data")
                    .and_then(|d| d.get("list"))
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(|item| item.get("name").and_then(Value::as_str))
                    .collect();
                if !names.is_empty() {
                    let joined = names.join(", ");
                    for column in self.labels.columns() {
                        result.set(column, joined.clone());
                    }
                }
            }
        }
        result
    }
}

fn join_values(values: Option<&Value>) -> String {
    let Some(values) = values.and_then(Value::as_array) else {
        return String::new();
    };
    values
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// The three lookups every participant receives, pointed at the configured endpoints.
pub fn default_sources(config: &Config) -> [EnrichmentSource; 3] {
    use EnrichmentColumn::*;
    [
        EnrichmentSource {
            name: "info",
            url: config.endpoints.info.clone(),
            shape: ResponseShape::TitledValues,
            labels: LabelMap::new(&[
                ("Country", Country),
                ("Attendee Type", AttendeeType),
                ("Company type", CompanyType),
                ("Twitter", Twitter),
                ("Linkedin", Linkedin),
                ("YouTube", YouTube),
                ("Facebook", Facebook),
            ]),
        },
        EnrichmentSource {
            name: "interests",
            url: config.endpoints.interests.clone(),
            shape: ResponseShape::NamedList,
            labels: LabelMap::new(&[("Interests", Interests)]),
        },
        EnrichmentSource {
            name: "activities",
            url: config.endpoints.activities.clone(),
            shape: ResponseShape::NamedList,
            labels: LabelMap::new(&[("Activities", Activities)]),
        },
    ]
}

pub struct Enricher<'a, T> {
    client: &'a ApiClient<T>,
    sources: [EnrichmentSource; 3],
}

impl<'a, T: Transport> Enricher<'a, T> {
    pub fn new(client: &'a ApiClient<T>, sources: [EnrichmentSource; 3]) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for source in &sources {
            for column in source.labels.columns() {
                if !seen.insert(column) {
                    bail!(
                        "enrichment column {column} is mapped by more than one source ({})",
                        source.name
                    );
                }
            }
        }
        Ok(Self { client, sources })
    }

    pub fn with_default_sources(client: &'a ApiClient<T>) -> Result<Self> {
        let sources = default_sources(client.config());
        Self::new(client, sources)
    }

    async fn lookup(&self, source: &EnrichmentSource, delegate_id: &str) -> Enrichment {
        let payload = json!({ "id": delegate_id });
        let label = format!("{} for {delegate_id}", source.name);
        let data = self
            .client
            .post_json(&label, &source.url, &payload, ContentTypeCheck::Any)
            .await
            .unwrap_or(Value::Null);
        source.map_response(&data)
    }

    /// Runs the three lookups for one record concurrently. Their merged result
    /// replaces whatever enrichment the record carried before. A record with
    /// no identifier gets every column blank and no requests.
    pub async fn enrich_one(&self, mut record: ParticipantRecord) -> ParticipantRecord {
        if !record.has_identifier() {
            let mut blank = Enrichment::new();
            for column in self.sources.iter().flat_map(|s| s.labels.columns()) {
                blank.set(column, String::new());
            }
            record.enrichment = blank;
            debug!("Record without Delegate ID kept unenriched");
            return record;
        }

        let [info, interests, activities] = &self.sources;
        let id = record.delegate_id.as_str();
        let (a, b, c) = tokio::join!(
            self.lookup(info, id),
            self.lookup(interests, id),
            self.lookup(activities, id),
        );
        let mut fields = Enrichment::new();
        for part in [a, b, c] {
            fields.merge(part);
        }
        record.enrichment = fields;
        self.client.stats().inc_enriched();
        debug!(delegate_id = %record.delegate_id, "Record enriched");
        record
    }

    /// Enriches every record, preserving input order. Without a cap all
    /// records are in flight at once; with one, at most `cap` records are.
    pub async fn enrich_all(&self, records: Vec<ParticipantRecord>) -> Vec<ParticipantRecord> {
        let total = records.len();
        let cap = self.client.config().enrich_concurrency;
        info!(records = total, cap = ?cap, "Starting enrichment");

        let enriched: Vec<ParticipantRecord> = match cap {
            None => join_all(records.into_iter().map(|r| self.enrich_one(r))).await,
            Some(cap) => {
                stream::iter(records)
                    .map(|r| self.enrich_one(r))
                    .buffered(cap.max(1))
                    .collect()
                    .await
            }
        };

        info!(records = enriched.len(), "Enrichment complete");
        enriched
    }
}
