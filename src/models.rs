use crate::config::PARTICIPANT_COLUMNS;
use crate::sink::Tabular;
use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Body of one paginated API call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

/// Output columns an enrichment lookup may fill. The set is closed: labels
/// coming back from the detail API can only land in one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnrichmentColumn {
    Country,
    AttendeeType,
    CompanyType,
    Twitter,
    Linkedin,
    YouTube,
    Facebook,
    Interests,
    Activities,
}

impl EnrichmentColumn {
    pub const ALL: [EnrichmentColumn; 9] = [
        EnrichmentColumn::Country,
        EnrichmentColumn::AttendeeType,
        EnrichmentColumn::CompanyType,
        EnrichmentColumn::Twitter,
        EnrichmentColumn::Linkedin,
        EnrichmentColumn::YouTube,
        EnrichmentColumn::Facebook,
        EnrichmentColumn::Interests,
        EnrichmentColumn::Activities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentColumn::Country => "Country",
            EnrichmentColumn::AttendeeType => "Attendee Type",
            EnrichmentColumn::CompanyType => "Company Type",
            EnrichmentColumn::Twitter => "Twitter",
            EnrichmentColumn::Linkedin => "Linkedin",
            EnrichmentColumn::YouTube => "YouTube",
            EnrichmentColumn::Facebook => "Facebook",
            EnrichmentColumn::Interests => "Interests",
            EnrichmentColumn::Activities => "Activities",
        }
    }
}

impl fmt::Display for EnrichmentColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrichmentColumn {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match EnrichmentColumn::ALL.iter().find(|c| c.as_str() == s) {
            Some(column) => Ok(*column),
            None => bail!("unknown enrichment column: {s:?}"),
        }
    }
}

/// Header of the `update` output: the input header (minus any enrichment
/// columns from an earlier run) followed by every enrichment column.
pub fn updated_columns<S: AsRef<str>>(input: &[S]) -> Vec<String> {
    let mut columns: Vec<String> = input
        .iter()
        .map(AsRef::<str>::as_ref)
        .filter(|c| c.parse::<EnrichmentColumn>().is_err())
        .map(str::to_string)
        .collect();
    columns.extend(EnrichmentColumn::ALL.iter().map(|c| c.as_str().to_string()));
    columns
}

/// Enrichment values keyed by their output column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    fields: BTreeMap<EnrichmentColumn, String>,
}

impl Enrichment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: EnrichmentColumn, value: impl Into<String>) {
        self.fields.insert(column, value.into());
    }

    pub fn get(&self, column: EnrichmentColumn) -> Option<&str> {
        self.fields.get(&column).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Folds another lookup's fields in. Lookups own disjoint column sets, so
    /// an overlap means two sources were configured for the same column.
    pub fn merge(&mut self, other: Enrichment) {
        for (column, value) in other.fields {
            debug_assert!(
                !self.fields.contains_key(&column),
                "enrichment column {column} written twice"
            );
            self.fields.insert(column, value);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantRecord {
    pub delegate_id: String,
    pub participant_url: String,
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub company_website: String,
    pub position: String,
    pub enrichment: Enrichment,
    /// Input columns outside the participant and enrichment sets, carried through `update`
    pub extra: BTreeMap<String, String>,
}

impl ParticipantRecord {
    /// Rebuilds a record from a header-keyed CSV row. A blank delegate id is
    /// kept as is; such records are written back without lookups.
    pub fn from_row(row: &HashMap<String, String>) -> Self {
        let field = |name: &str| row.get(name).cloned().unwrap_or_default();

        let mut enrichment = Enrichment::new();
        let mut extra = BTreeMap::new();
        for (column, value) in row {
            if PARTICIPANT_COLUMNS.contains(&column.as_str()) {
                continue;
            }
            match column.parse::<EnrichmentColumn>() {
                Ok(c) => enrichment.set(c, value.clone()),
                Err(_) => {
                    extra.insert(column.clone(), value.clone());
                }
            }
        }

        Self {
            delegate_id: field("Delegate ID"),
            participant_url: field("Participant URL"),
            first_name: field("First Name"),
            last_name: field("Last Name"),
            company_name: field("Company Name"),
            company_website: field("Company Website"),
            position: field("Position"),
            enrichment,
            extra,
        }
    }

    pub fn has_identifier(&self) -> bool {
        !self.delegate_id.trim().is_empty()
    }
}

impl Tabular for ParticipantRecord {
    fn value(&self, column: &str) -> Option<&str> {
        let identity = match column {
            "Delegate ID" => Some(&self.delegate_id),
            "Participant URL" => Some(&self.participant_url),
            "First Name" => Some(&self.first_name),
            "Last Name" => Some(&self.last_name),
            "Company Name" => Some(&self.company_name),
            "Company Website" => Some(&self.company_website),
            "Position" => Some(&self.position),
            _ => None,
        };
        match identity {
            Some(value) => Some(value.as_str()),
            None => match column.parse::<EnrichmentColumn>() {
                Ok(c) => self.enrichment.get(c),
                Err(_) => self.extra.get(column).map(String::as_str),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_serializes_as_page_and_limit() {
        let body = serde_json::to_value(PageRequest { page: 3, limit: 60 }).unwrap();
        assert_eq!(body, serde_json::json!({"page": 3, "limit": 60}));
    }

    #[test]
    fn enrichment_column_parse_roundtrip() {
        for column in EnrichmentColumn::ALL {
            assert_eq!(column.as_str().parse::<EnrichmentColumn>().unwrap(), column);
        }
        assert!("Company type".parse::<EnrichmentColumn>().is_err());
    }

    #[test]
    fn updated_columns_extend_fetch_columns() {
        let columns = updated_columns(&PARTICIPANT_COLUMNS);
        assert_eq!(columns.len(), 16);
        assert_eq!(&columns[..7], &PARTICIPANT_COLUMNS);
        assert_eq!(columns[7], "Country");
        assert_eq!(columns[15], "Activities");
    }

    #[test]
    fn updated_columns_keep_extra_input_columns() {
        let input = ["Delegate ID", "Badge", "Country", "Position"];
        let columns = updated_columns(&input);
        assert_eq!(&columns[..3], &["Delegate ID", "Badge", "Position"]);
        assert_eq!(columns.len(), 12);
        assert_eq!(columns.iter().filter(|c| *c == "Country").count(), 1);
    }

    #[test]
    fn merge_disjoint_enrichments() {
        let mut a = Enrichment::new();
        a.set(EnrichmentColumn::Country, "France");
        let mut b = Enrichment::new();
        b.set(EnrichmentColumn::Interests, "AI, Travel");
        a.merge(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.get(EnrichmentColumn::Interests), Some("AI, Travel"));
    }

    #[test]
    fn from_row_splits_identity_enrichment_and_extra() {
        let mut row = HashMap::new();
        row.insert("First Name".to_string(), "Ada".to_string());
        let record = ParticipantRecord::from_row(&row);
        assert_eq!(record.delegate_id, "");
        assert!(!record.has_identifier());

        row.insert("Delegate ID".to_string(), "77".to_string());
        row.insert("Country".to_string(), "UK".to_string());
        row.insert("Badge".to_string(), "VIP".to_string());
        let record = ParticipantRecord::from_row(&row);
        assert!(record.has_identifier());
        assert_eq!(record.delegate_id, "77");
        assert_eq!(record.first_name, "Ada");
        assert_eq!(record.position, "");
        assert_eq!(record.enrichment.get(EnrichmentColumn::Country), Some("UK"));
        assert_eq!(record.extra.len(), 1);
        assert_eq!(record.value("Badge"), Some("VIP"));
    }

    #[test]
    fn tabular_values_cover_identity_and_enrichment() {
        let mut record = ParticipantRecord {
            delegate_id: "9".to_string(),
            company_name: "Acme".to_string(),
            ..Default::default()
        };
        record.enrichment.set(EnrichmentColumn::Twitter, "@acme");
        assert_eq!(record.value("Delegate ID"), Some("9"));
        assert_eq!(record.value("Company Name"), Some("Acme"));
        assert_eq!(record.value("Twitter"), Some("@acme"));
        assert_eq!(record.value("Facebook"), None);
        assert_eq!(record.value("Nope"), None);
    }
}
