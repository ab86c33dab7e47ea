use crate::models::ParticipantRecord;
use serde_json::Value;

/// Maps one page payload shaped `{data: {list: [...]}}` into participant records.
///
/// A payload without a `data.list` array yields nothing. Missing fields
/// become empty strings.
pub fn extract_participants(payload: &Value, participant_base_url: &str) -> Vec<ParticipantRecord> {
    let Some(entries) = payload
        .get("data")
        .and_then(|d| d.get("list"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let base = participant_base_url.trim_end_matches('/');
    entries
        .iter()
        .map(|entry| {
            let delegate_id = text_field(entry, "id");
            ParticipantRecord {
                participant_url: format!("{base}/{delegate_id}"),
                first_name: text_field(entry, "firstName"),
                last_name: text_field(entry, "lastName"),
                company_name: text_field(entry, "company_name"),
                company_website: text_field(entry, "company_website"),
                position: text_field(entry, "position"),
                delegate_id,
                ..Default::default()
            }
        })
        .collect()
}

/// Renders a scalar JSON field as text; absent, null and structured values read as empty.
pub(crate) fn text_field(entry: &Value, key: &str) -> String {
    match entry.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}
