use chrono::{DateTime, Local, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How entries are identified for deletion and duplicate handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryIdentity {
    /// Every entry is kept; identity is the creation instant.
    Timestamp,
    /// One entry per calendar day; adding to an existing day replaces it.
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub consumed: u32,
    pub burnt: u32,
}

impl Entry {
    pub fn net(&self) -> i64 {
        i64::from(self.consumed) - i64::from(self.burnt)
    }

    /// Calendar day this entry counts towards under the given identity policy.
    pub fn day(&self, identity: EntryIdentity) -> NaiveDate {
        match identity {
            EntryIdentity::Timestamp => self.timestamp.with_timezone(&Local).date_naive(),
            EntryIdentity::Date => self.date,
        }
    }

    pub fn id(&self, identity: EntryIdentity) -> String {
        match identity {
            EntryIdentity::Timestamp => self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            EntryIdentity::Date => self.date.to_string(),
        }
    }
}

/// Net calories per finalized day, keyed by ISO date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryRecord {
    pub days: BTreeMap<NaiveDate, i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Deficit,
    Excess,
}

impl Classification {
    /// Zero counts as a deficit.
    pub fn of_net(net: i64) -> Self {
        if net <= 0 {
            Self::Deficit
        } else {
            Self::Excess
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deficit => "deficit",
            Self::Excess => "excess",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TodayRow {
    pub id: String,
    pub entry: Entry,
    pub net: i64,
    pub remaining_after: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TodayView {
    pub date: NaiveDate,
    pub rows: Vec<TodayRow>,
    pub remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DailySummary {
    NoEntries {
        bmr: i64,
    },
    Totals {
        bmr: i64,
        total_consumed: i64,
        total_burnt: i64,
        net_intake: i64,
        remaining: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizedDay {
    pub date: NaiveDate,
    pub net: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResetOutcome {
    Unchanged,
    Applied {
        cleared: usize,
        finalized: Vec<FinalizedDay>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub net: i64,
    pub classification: Classification,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary {
    pub rows: Vec<HistoryRow>,
    pub total_net: i64,
    pub classification: Classification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

#[derive(Debug, Deserialize)]
pub struct AddEntryRequest {
    #[serde(default)]
    pub date: String,
    #[serde(default, deserialize_with = "whole_number")]
    pub consumed: Option<i64>,
    #[serde(default, deserialize_with = "whole_number")]
    pub burnt: Option<i64>,
}

/// Accepts an integer or a numeric string; anything else becomes `None` so
/// the ledger reports it as a validation error.
fn whole_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
pub struct EntryForm {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub consumed: String,
    #[serde(default)]
    pub burnt: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteEntryRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TodayResponse {
    pub view: TodayView,
    pub summary: DailySummary,
    pub notice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub source: HistorySource,
    pub summary: HistorySummary,
    pub trend: Option<Trend>,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySource {
    Local,
    Remote,
}

#[derive(Debug, Serialize)]
pub struct SaveResultResponse {
    pub date: NaiveDate,
    pub net: i64,
    pub synced: bool,
    pub notice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    #[serde(flatten)]
    pub outcome: ResetOutcome,
    pub notice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteEntryResponse {
    pub removed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_request(body: &str) -> AddEntryRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn kcal_fields_accept_integers_and_numeric_text() {
        let request = add_request(r#"{"date":"2026-06-01","consumed":2000,"burnt":" 300 "}"#);
        assert_eq!(request.consumed, Some(2000));
        assert_eq!(request.burnt, Some(300));
    }

    #[test]
    fn non_numeric_kcal_fields_become_missing() {
        let request = add_request(r#"{"date":"2026-06-01","consumed":"abc","burnt":12.5}"#);
        assert_eq!(request.consumed, None);
        assert_eq!(request.burnt, None);

        let request = add_request(r#"{"date":"2026-06-01","consumed":null,"burnt":[1]}"#);
        assert_eq!(request.consumed, None);
        assert_eq!(request.burnt, None);

        let request = add_request(r#"{"date":"2026-06-01"}"#);
        assert_eq!(request.consumed, None);
        assert_eq!(request.burnt, None);
    }

    #[test]
    fn negative_kcal_is_kept_for_the_ledger_to_reject() {
        assert_eq!(add_request(r#"{"consumed":-5}"#).consumed, Some(-5));
    }
}
